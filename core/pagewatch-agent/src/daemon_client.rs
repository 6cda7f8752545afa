//! Client helper for talking to the pagewatch daemon.
//!
//! Notification delivery is at-most-once and best-effort: sends are never
//! retried and failures surface as log lines, not errors to the page.

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use rand::RngCore;

use pagewatch_core::config;
use pagewatch_protocol::{
    DetectorHello, Method, NotifyParams, Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

const ENABLE_ENV: &str = "PAGEWATCH_DAEMON_ENABLED";
const SOCKET_ENV: &str = "PAGEWATCH_DAEMON_SOCKET";
const READ_TIMEOUT_MS: u64 = 600;
const WRITE_TIMEOUT_MS: u64 = 600;

pub fn daemon_enabled() -> bool {
    match env::var(ENABLE_ENV) {
        Ok(value) => matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"),
        Err(_) => true,
    }
}

fn socket_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    config::socket_path().map_err(|err| err.to_string())
}

/// Fire-and-forget completion notification. The daemon's acknowledgment is
/// deliberately ignored: there is no timeout waiting on it and no retry.
pub fn show_notification(url: &str, tab_id: u64) -> Result<(), String> {
    if !daemon_enabled() {
        return Err("Daemon disabled".to_string());
    }

    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::ShowNotification,
        id: Some(make_request_id(tab_id)),
        params: Some(
            serde_json::to_value(NotifyParams {
                title: None,
                message: None,
                url: url.to_string(),
                tab_id,
            })
            .map_err(|err| format!("Failed to serialize notification: {}", err))?,
        ),
    };

    let mut stream = connect()?;
    serde_json::to_writer(&mut stream, &request)
        .map_err(|err| format!("Failed to write notification: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to flush notification: {}", err))?;
    Ok(())
}

/// Startup announcement registering this tab's reply socket.
pub fn announce_ready(tab_id: u64, reply_socket: &str) -> Result<(), String> {
    if !daemon_enabled() {
        return Err("Daemon disabled".to_string());
    }

    let hello = DetectorHello {
        tab_id,
        pid: std::process::id(),
        reply_socket: reply_socket.to_string(),
    };
    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::DetectorReady,
        id: Some(make_request_id(tab_id)),
        params: Some(
            serde_json::to_value(hello)
                .map_err(|err| format!("Failed to serialize hello: {}", err))?,
        ),
    };

    let response = send_request(request)?;
    if response.ok {
        Ok(())
    } else {
        let message = response
            .error
            .map(|err| format!("{}: {}", err.code, err.message))
            .unwrap_or_else(|| "Unknown daemon error".to_string());
        Err(message)
    }
}

/// The vestigial permission probe; the daemon always answers "granted".
pub fn check_permission() -> Option<String> {
    if !daemon_enabled() {
        return None;
    }

    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::CheckPermission,
        id: Some("permission-check".to_string()),
        params: None,
    };

    let response = send_request(request).ok()?;
    response
        .data
        .as_ref()
        .and_then(|data| data.get("permission_level"))
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
}

pub fn daemon_health() -> Option<bool> {
    if !daemon_enabled() {
        return None;
    }

    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::GetHealth,
        id: Some("health-check".to_string()),
        params: None,
    };

    let response = send_request(request).ok()?;
    if !response.ok {
        return Some(false);
    }

    let status = response
        .data
        .as_ref()
        .and_then(|data| data.get("status"))
        .and_then(|value| value.as_str());

    Some(matches!(status, Some("ok")))
}

fn connect() -> Result<UnixStream, String> {
    let socket = socket_path()?;
    let stream = UnixStream::connect(&socket)
        .map_err(|err| format!("Failed to connect to daemon socket: {}", err))?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));
    Ok(stream)
}

fn send_request(request: Request) -> Result<Response, String> {
    let mut stream = connect()?;
    serde_json::to_writer(&mut stream, &request)
        .map_err(|err| format!("Failed to write request: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to flush request: {}", err))?;
    stream.flush().ok();

    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("Response exceeded maximum size".to_string());
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

fn make_request_id(tab_id: u64) -> String {
    let mut random = rand::thread_rng();
    let rand = random.next_u64();
    format!("req-{}-{}-{:x}", Utc::now().timestamp_millis(), tab_id, rand)
}
