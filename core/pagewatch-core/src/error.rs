//! Error types for pagewatch-core operations.

use std::path::PathBuf;

/// All errors that can occur in pagewatch-core operations.
///
/// Most failures in this system degrade to a log line rather than
/// propagating; this type covers the ones callers do need to handle
/// (paths, I/O, malformed files).
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl WatchError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        WatchError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        WatchError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using WatchError.
pub type Result<T> = std::result::Result<T, WatchError>;
