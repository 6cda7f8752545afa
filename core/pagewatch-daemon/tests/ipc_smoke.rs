use pagewatch_protocol::{Method, NotifyParams, Request, Response, PROTOCOL_VERSION};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_daemon(home: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_pagewatch-daemon"))
        .env("HOME", home)
        // Point at a binary that cannot spawn: popup failures must degrade
        // silently without failing the request.
        .env("PAGEWATCH_PRESENTER_BIN", "/nonexistent/presenter")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn pagewatch-daemon")
}

fn socket_path(home: &Path) -> PathBuf {
    home.join(".pagewatch").join("daemon.sock")
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for daemon socket at {}", path.display());
}

fn send_request(socket: &Path, request: Request) -> Response {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to daemon socket");
    serde_json::to_writer(&mut stream, &request).expect("Failed to serialize request");
    stream.write_all(b"\n").expect("Failed to write request");
    stream.flush().ok();
    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Response {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).expect("Failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes).expect("Failed to parse response JSON")
}

fn notify_request(id: &str, title: &str, tab_id: u64) -> Request {
    Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::ShowNotification,
        id: Some(id.to_string()),
        params: Some(
            serde_json::to_value(NotifyParams {
                title: Some(title.to_string()),
                message: Some("Answer ready".to_string()),
                url: "https://x/y".to_string(),
                tab_id,
            })
            .expect("serialize notify params"),
        ),
    }
}

#[test]
fn daemon_ipc_notification_smoke() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let socket = socket_path(home.path());
    let child = spawn_daemon(home.path());
    let _guard = DaemonGuard { child };

    wait_for_socket(&socket, Duration::from_secs(2));

    let health = send_request(
        &socket,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::GetHealth,
            id: Some("health-check".to_string()),
            params: None,
        },
    );
    assert!(health.ok, "health response was not ok");
    let status = health
        .data
        .as_ref()
        .and_then(|data| data.get("status"))
        .and_then(|value| value.as_str())
        .unwrap_or("missing");
    assert_eq!(status, "ok");

    let permission = send_request(
        &socket,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::CheckPermission,
            id: Some("perm-check".to_string()),
            params: None,
        },
    );
    assert!(permission.ok);
    assert_eq!(
        permission
            .data
            .as_ref()
            .and_then(|data| data.get("permission_level"))
            .and_then(|value| value.as_str()),
        Some("granted")
    );

    // Focus before any notification: a no-op that still reports success.
    let focus = send_request(
        &socket,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::FocusSourceTab,
            id: Some("focus-0".to_string()),
            params: None,
        },
    );
    assert!(focus.ok);
    assert_eq!(
        focus
            .data
            .as_ref()
            .and_then(|data| data.get("success"))
            .and_then(|value| value.as_bool()),
        Some(true)
    );

    let first = send_request(&socket, notify_request("notify-1", "first", 7));
    assert!(first.ok, "notification was rejected: {:?}", first.error);

    let badge = send_request(
        &socket,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::GetBadge,
            id: Some("badge-check".to_string()),
            params: None,
        },
    );
    assert_eq!(
        badge
            .data
            .as_ref()
            .and_then(|data| data.get("text"))
            .and_then(|value| value.as_str()),
        Some("✓")
    );

    // Second notification overwrites the persisted record.
    let second = send_request(&socket, notify_request("notify-2", "second", 8));
    assert!(second.ok);

    let store_path = home.path().join(".pagewatch").join("notifications.json");
    let content = std::fs::read_to_string(&store_path).expect("store file written");
    let parsed: serde_json::Value = serde_json::from_str(&content).expect("store file is JSON");
    assert_eq!(
        parsed
            .get("notification_data")
            .and_then(|record| record.get("title"))
            .and_then(|value| value.as_str()),
        Some("second")
    );

    // Focus against the recorded tab: its agent never registered, so the
    // daemon aborts internally but still acknowledges.
    let focus = send_request(
        &socket,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::FocusSourceTab,
            id: Some("focus-1".to_string()),
            params: None,
        },
    );
    assert!(focus.ok);

    let mismatch = send_request(
        &socket,
        Request {
            protocol_version: PROTOCOL_VERSION + 1,
            method: Method::GetHealth,
            id: Some("bad-version".to_string()),
            params: None,
        },
    );
    assert!(!mismatch.ok);
    assert_eq!(
        mismatch.error.as_ref().map(|err| err.code.as_str()),
        Some("protocol_mismatch")
    );
}
