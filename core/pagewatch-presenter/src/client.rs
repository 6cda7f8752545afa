//! Minimal daemon client for the presenter surfaces.

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use pagewatch_core::config;
use pagewatch_protocol::{Method, Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION};

const SOCKET_ENV: &str = "PAGEWATCH_DAEMON_SOCKET";
const READ_TIMEOUT_MS: u64 = 2_000;

fn socket_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    config::socket_path().map_err(|err| err.to_string())
}

fn focus_request() -> Request {
    Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::FocusSourceTab,
        id: Some("presenter-view".to_string()),
        params: None,
    }
}

/// Sends `focus_source_tab` and waits for the acknowledgment.
pub fn focus_source_tab() -> Result<(), String> {
    let mut stream = connect()?;
    write_request(&mut stream, &focus_request())?;
    let response = read_response(&mut stream)?;
    if response.ok {
        Ok(())
    } else {
        Err(response
            .error
            .map(|err| format!("{}: {}", err.code, err.message))
            .unwrap_or_else(|| "Unknown daemon error".to_string()))
    }
}

/// Sends `focus_source_tab` without waiting for a response.
pub fn focus_source_tab_no_wait() -> Result<(), String> {
    let mut stream = connect()?;
    write_request(&mut stream, &focus_request())
}

fn connect() -> Result<UnixStream, String> {
    let socket = socket_path()?;
    let stream = UnixStream::connect(&socket)
        .map_err(|err| format!("Failed to connect to daemon socket: {}", err))?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    Ok(stream)
}

fn write_request(stream: &mut UnixStream, request: &Request) -> Result<(), String> {
    serde_json::to_writer(&mut *stream, request)
        .map_err(|err| format!("Failed to write request: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to flush request: {}", err))?;
    stream.flush().ok();
    Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    #[test]
    fn view_round_trips_against_a_fake_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buffer = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                match stream.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        buffer.extend_from_slice(&chunk[..n]);
                        if buffer.contains(&b'\n') {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            let request: Request =
                serde_json::from_slice(&buffer[..buffer.len() - 1]).expect("request parses");
            assert_eq!(request.method, Method::FocusSourceTab);

            let response = Response::ok(request.id, serde_json::json!({ "success": true }));
            let mut payload = serde_json::to_vec(&response).unwrap();
            payload.push(b'\n');
            let _ = stream.write_all(&payload);
        });

        std::env::set_var(SOCKET_ENV, socket.to_str().unwrap());
        let result = focus_source_tab();
        std::env::remove_var(SOCKET_ENV);

        server.join().unwrap();
        assert!(result.is_ok());
    }
}
