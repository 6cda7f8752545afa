//! Per-tab reply socket.
//!
//! The daemon pushes tab signals (tab_focused, activate) through here, and
//! anything may ask `check_status`. One JSON line per connection, matching
//! the daemon's newline framing.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use pagewatch_core::config;
use pagewatch_protocol::{StatusReply, TabRequest};

use crate::watch::Input;

/// Binds the reply socket for `tab_id` and spawns the accept loop.
/// Returns the socket path to hand to the daemon in `detector_ready`.
pub fn spawn(
    tab_id: u64,
    tx: Sender<Input>,
    monitoring: Arc<AtomicBool>,
) -> Result<String, String> {
    let dir = config::agents_dir().map_err(|err| err.to_string())?;
    fs_err::create_dir_all(&dir)
        .map_err(|err| format!("Failed to create agents directory: {}", err))?;
    let path = dir.join(format!("tab-{}.sock", tab_id));
    spawn_at(&path, tx, monitoring)?;
    Ok(path.to_string_lossy().into_owned())
}

fn spawn_at(
    path: &Path,
    tx: Sender<Input>,
    monitoring: Arc<AtomicBool>,
) -> Result<(), String> {
    if path.exists() {
        fs_err::remove_file(path)
            .map_err(|err| format!("Failed to remove stale reply socket: {}", err))?;
    }
    let listener = UnixListener::bind(path)
        .map_err(|err| format!("Failed to bind reply socket {}: {}", path.display(), err))?;

    let path: PathBuf = path.to_path_buf();
    thread::spawn(move || {
        debug!(path = %path.display(), "Reply socket listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => handle_connection(stream, &tx, &monitoring),
                Err(err) => warn!(error = %err, "Failed to accept reply connection"),
            }
        }
    });
    Ok(())
}

fn handle_connection(stream: UnixStream, tx: &Sender<Input>, monitoring: &Arc<AtomicBool>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    if let Err(err) = reader.read_line(&mut line) {
        debug!(error = %err, "Failed to read tab signal");
        return;
    }
    if line.trim().is_empty() {
        return;
    }

    let request = match serde_json::from_str::<TabRequest>(line.trim()) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "Ignoring unparseable tab signal");
            return;
        }
    };

    match request {
        TabRequest::CheckStatus => {
            let reply = StatusReply {
                is_monitoring: monitoring.load(Ordering::SeqCst),
            };
            let mut stream = reader.into_inner();
            if let Ok(payload) = serde_json::to_vec(&reply) {
                let _ = stream.write_all(&payload);
                let _ = stream.write_all(b"\n");
            }
        }
        other => {
            let _ = tx.send(Input::Tab(other));
        }
    }
}
