//! Tab operations over per-agent reply sockets.
//!
//! Each watch agent announces itself with `detector_ready`, handing the
//! daemon a unix socket path it listens on. "Does the tab exist" becomes
//! "does its agent still accept connections", and activation is a pushed
//! [`TabRequest`] the agent turns into a page-side focus command.

use std::collections::HashMap;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use pagewatch_protocol::TabRequest;

use crate::hosts::{TabHost, TabId};

const WRITE_TIMEOUT_MS: u64 = 600;

#[derive(Debug, Clone)]
struct Endpoint {
    pid: u32,
    reply_socket: PathBuf,
}

#[derive(Default)]
pub struct SocketTabHost {
    registry: Mutex<HashMap<u64, Endpoint>>,
}

impl SocketTabHost {
    pub fn new() -> Self {
        SocketTabHost::default()
    }

    fn endpoint(&self, tab: TabId) -> Option<Endpoint> {
        self.registry.lock().unwrap().get(&tab.0).cloned()
    }

    fn push(&self, tab: TabId, request: &TabRequest) -> Result<(), String> {
        let endpoint = self
            .endpoint(tab)
            .ok_or_else(|| format!("tab {} is not registered", tab.0))?;

        let mut stream = UnixStream::connect(&endpoint.reply_socket).map_err(|err| {
            format!(
                "failed to reach agent for tab {} (pid {}): {}",
                tab.0, endpoint.pid, err
            )
        })?;
        let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

        serde_json::to_writer(&mut stream, request)
            .map_err(|err| format!("failed to write tab signal: {}", err))?;
        stream
            .write_all(b"\n")
            .map_err(|err| format!("failed to flush tab signal: {}", err))?;
        Ok(())
    }
}

impl TabHost for SocketTabHost {
    fn register_tab(&self, tab: TabId, pid: u32, reply_socket: PathBuf) {
        debug!(tab = tab.0, pid, socket = %reply_socket.display(), "Tab registered");
        self.registry
            .lock()
            .unwrap()
            .insert(tab.0, Endpoint { pid, reply_socket });
    }

    fn tab_exists(&self, tab: TabId) -> bool {
        match self.endpoint(tab) {
            // A stale socket file with no listener fails the connect, so a
            // dead agent reads as a missing tab.
            Some(endpoint) => UnixStream::connect(&endpoint.reply_socket).is_ok(),
            None => false,
        }
    }

    fn activate_tab(&self, tab: TabId) -> Result<(), String> {
        self.push(tab, &TabRequest::Activate)
    }

    fn send(&self, tab: TabId, request: &TabRequest) -> Result<(), String> {
        self.push(tab, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::os::unix::net::UnixListener;

    #[test]
    fn unregistered_tab_does_not_exist() {
        let host = SocketTabHost::new();
        assert!(!host.tab_exists(TabId(1)));
        assert!(host.send(TabId(1), &TabRequest::TabFocused).is_err());
    }

    #[test]
    fn registered_tab_with_dead_socket_does_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let host = SocketTabHost::new();
        host.register_tab(TabId(2), 4242, dir.path().join("tab-2.sock"));
        assert!(!host.tab_exists(TabId(2)));
    }

    #[test]
    fn signals_arrive_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("tab-3.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            BufReader::new(stream).read_line(&mut line).unwrap();
            line
        });

        let host = SocketTabHost::new();
        host.register_tab(TabId(3), 4242, socket_path);
        host.send(TabId(3), &TabRequest::TabFocused).unwrap();

        let line = server.join().unwrap();
        let parsed: TabRequest = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(parsed, TabRequest::TabFocused);
    }
}
