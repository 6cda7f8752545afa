//! Record display and the View/Dismiss action loop.

use std::io::BufRead;
use std::time::Duration;

use chrono::Local;
use tracing::warn;

use pagewatch_core::config;
use pagewatch_core::store::{NotificationRecord, RecordStore};

use crate::client;

/// Loads the persisted record. Absence is not an error: the surface shows
/// empty fields.
fn load_record() -> Option<NotificationRecord> {
    let path = match config::store_path() {
        Ok(path) => path,
        Err(err) => {
            warn!(error = %err, "Failed to resolve notification store path");
            return None;
        }
    };
    RecordStore::load(&path).latest().cloned()
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    View,
    Dismiss,
    /// No interactive stdin (spawned by the daemon): stay up until closed.
    Wait,
}

fn read_action() -> Action {
    let stdin = std::io::stdin();
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => Action::Wait,
        Ok(_) => parse_action(&line),
        Err(_) => Action::Wait,
    }
}

fn parse_action(line: &str) -> Action {
    match line.trim().to_ascii_lowercase().as_str() {
        "v" | "view" => Action::View,
        _ => Action::Dismiss,
    }
}

fn print_record(record: &Option<NotificationRecord>, with_timestamp: bool) {
    let (title, message) = match record {
        Some(record) => (record.title.as_str(), record.message.as_str()),
        None => ("", ""),
    };
    println!("{}", title);
    println!("{}", message);

    if with_timestamp {
        if let Some(record) = record {
            let local = record.created_at.with_timezone(&Local);
            println!("{}", local.format("%x at %X"));
        }
    }

    println!();
    println!("[v] View    [d] Dismiss");
}

/// The auto-popped notification window. View waits for the daemon's
/// acknowledgment before closing.
pub fn run_alert() {
    let record = load_record();
    print_record(&record, false);

    match read_action() {
        Action::View => {
            if let Err(err) = client::focus_source_tab() {
                warn!(error = %err, "Failed to request tab focus");
            }
        }
        Action::Dismiss => {}
        Action::Wait => {
            // Spawned headless by the daemon; its auto-close ends us.
            loop {
                std::thread::sleep(Duration::from_secs(3600));
            }
        }
    }
}

/// The toolbar popup. View fires the focus request without waiting for a
/// response, then closes.
pub fn run_popup() {
    let record = load_record();
    print_record(&record, true);

    if read_action() == Action::View {
        if let Err(err) = client::focus_source_tab_no_wait() {
            warn!(error = %err, "Failed to request tab focus");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_accepts_short_and_long_forms() {
        assert_eq!(parse_action("v\n"), Action::View);
        assert_eq!(parse_action("  VIEW  \n"), Action::View);
    }

    #[test]
    fn anything_else_dismisses() {
        assert_eq!(parse_action("d\n"), Action::Dismiss);
        assert_eq!(parse_action("\n"), Action::Dismiss);
        assert_eq!(parse_action("q\n"), Action::Dismiss);
    }
}
