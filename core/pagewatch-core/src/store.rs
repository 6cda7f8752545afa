//! File-backed notification persistence.
//!
//! The daemon is the only writer; presenter surfaces read. Exactly one
//! record exists at a time — each completion event overwrites the previous
//! one, no history is kept.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "notification_data": { "title": "...", "message": "...", ... }
//! }
//! ```
//!
//! # Defensive Design
//!
//! Readers may race the writer, so loading tolerates:
//! - Missing files (empty store)
//! - Empty files (empty store)
//! - Corrupt JSON (empty store, warning logged)
//! - Version mismatches (empty store)
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a reader never observes a partial write.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Result, WatchError};

const STORE_VERSION: u32 = 1;

/// The single persisted payload describing the most recent completion event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub title: String,
    pub message: String,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
}

/// The on-disk JSON structure.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    /// Schema version. Only files with a matching version are loaded.
    version: u32,
    #[serde(default)]
    notification_data: Option<NotificationRecord>,
}

/// The persisted notification record, optionally backed by a file.
///
/// Create with [`RecordStore::load`] to read from disk, or
/// [`RecordStore::new_in_memory`] for tests.
pub struct RecordStore {
    record: Option<NotificationRecord>,
    file_path: Option<PathBuf>,
}

impl RecordStore {
    pub fn new_in_memory() -> Self {
        RecordStore {
            record: None,
            file_path: None,
        }
    }

    pub fn new(file_path: &Path) -> Self {
        RecordStore {
            record: None,
            file_path: Some(file_path.to_path_buf()),
        }
    }

    pub fn load(file_path: &Path) -> Self {
        if !file_path.exists() {
            return RecordStore::new(file_path);
        }

        let content = match fs_err::read_to_string(file_path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read notification store");
                return RecordStore::new(file_path);
            }
        };

        if content.trim().is_empty() {
            return RecordStore::new(file_path);
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(store_file) if store_file.version == STORE_VERSION => RecordStore {
                record: store_file.notification_data,
                file_path: Some(file_path.to_path_buf()),
            },
            Ok(store_file) => {
                tracing::warn!(
                    version = store_file.version,
                    expected = STORE_VERSION,
                    "Unsupported notification store version, starting empty"
                );
                RecordStore::new(file_path)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Corrupt notification store, starting empty");
                RecordStore::new(file_path)
            }
        }
    }

    /// Overwrites the stored record and persists it.
    pub fn put(&mut self, record: NotificationRecord) -> Result<()> {
        self.record = Some(record);
        self.save()
    }

    pub fn latest(&self) -> Option<&NotificationRecord> {
        self.record.as_ref()
    }

    fn save(&self) -> Result<()> {
        let file_path = match &self.file_path {
            Some(path) => path,
            None => return Ok(()),
        };

        let store_file = StoreFile {
            version: STORE_VERSION,
            notification_data: self.record.clone(),
        };
        let content = serde_json::to_string_pretty(&store_file)
            .map_err(|err| WatchError::json("serialize notification store", err))?;

        let parent_dir = file_path.parent().ok_or_else(|| {
            WatchError::io(
                "notification store path has no parent",
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent directory"),
            )
        })?;
        fs_err::create_dir_all(parent_dir)
            .map_err(|err| WatchError::io("create store directory", err))?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|err| WatchError::io("create temp store file", err))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|err| WatchError::io("write temp store file", err))?;
        temp_file
            .flush()
            .map_err(|err| WatchError::io("flush temp store file", err))?;
        temp_file
            .persist(file_path)
            .map_err(|err| WatchError::io("persist notification store", err.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> NotificationRecord {
        NotificationRecord {
            title: title.to_string(),
            message: "Your query has finished generating a response".to_string(),
            source_url: "https://example.com/search/q".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn put_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.json");

        let mut store = RecordStore::load(&path);
        store.put(record("first")).unwrap();
        store.put(record("second")).unwrap();

        // A fresh reader sees only the second payload.
        let reloaded = RecordStore::load(&path);
        assert_eq!(reloaded.latest().unwrap().title, "second");
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::load(&dir.path().join("notifications.json"));
        assert!(store.latest().is_none());
    }

    #[test]
    fn corrupt_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = RecordStore::load(&path);
        assert!(store.latest().is_none());
    }

    #[test]
    fn version_mismatch_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.json");
        std::fs::write(
            &path,
            r#"{"version": 99, "notification_data": {"title": "t", "message": "m", "source_url": "u", "created_at": "2026-08-01T12:00:00Z"}}"#,
        )
        .unwrap();
        let store = RecordStore::load(&path);
        assert!(store.latest().is_none());
    }

    #[test]
    fn record_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.json");

        let mut store = RecordStore::load(&path);
        store.put(record("kept")).unwrap();
        drop(store);

        let reloaded = RecordStore::load(&path);
        let kept = reloaded.latest().unwrap();
        assert_eq!(kept.title, "kept");
        assert_eq!(kept.source_url, "https://example.com/search/q");
    }

    #[test]
    fn in_memory_store_does_not_touch_disk() {
        let mut store = RecordStore::new_in_memory();
        store.put(record("memory")).unwrap();
        assert_eq!(store.latest().unwrap().title, "memory");
    }
}
