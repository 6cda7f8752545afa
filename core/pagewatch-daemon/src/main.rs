//! pagewatch daemon entrypoint.
//!
//! A small, single-writer service that owns notification state: a socket
//! listener, strict request validation, the persisted notification record,
//! the toolbar badge, and the popup window lifecycle.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pagewatch_core::config::{self, WatchConfig};
use pagewatch_core::store::RecordStore;
use pagewatch_protocol::{
    parse_hello, parse_notify, ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES,
    PROTOCOL_VERSION,
};

mod hosts;
mod process_window;
mod socket_tabs;
mod state;

use process_window::ProcessWindowHost;
use socket_tabs::SocketTabHost;
use state::SharedState;

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

fn main() {
    init_logging();

    let socket_path = match config::socket_path() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve daemon socket path");
            std::process::exit(1);
        }
    };

    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    info!(path = %socket_path.display(), "pagewatch daemon started");

    let watch_config = load_config();
    let store = match config::store_path() {
        Ok(path) => RecordStore::load(&path),
        Err(err) => {
            warn!(error = %err, "Failed to resolve store path; notifications will not persist");
            RecordStore::new_in_memory()
        }
    };

    let shared_state = Arc::new(SharedState::new(
        watch_config,
        store,
        Arc::new(ProcessWindowHost::new()),
        Arc::new(SocketTabHost::new()),
    ));

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&shared_state);
                thread::spawn(|| handle_connection(stream, state));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var("PAGEWATCH_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config() -> WatchConfig {
    let path = match config::config_path() {
        Ok(path) => path,
        Err(err) => {
            warn!(error = %err, "Failed to resolve config path; using defaults");
            return WatchConfig::default();
        }
    };
    match WatchConfig::load(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            WatchConfig::default()
        }
    }
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, state: Arc<SharedState>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, state);
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    if buffer.is_empty() {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let request_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, state: Arc<SharedState>) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    match request.method {
        Method::GetHealth => Response::ok(
            request.id,
            serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
                "has_notification": state.latest_record().is_some(),
            }),
        ),
        Method::GetBadge => {
            let (text, color) = state.badge_snapshot();
            Response::ok(
                request.id,
                serde_json::json!({ "text": text, "color": color }),
            )
        }
        Method::ShowNotification => {
            let params = match request.params {
                Some(params) => params,
                None => {
                    return Response::error(
                        request.id,
                        "invalid_params",
                        "notification payload is required",
                    )
                }
            };
            let params = match parse_notify(params) {
                Ok(params) => params,
                Err(err) => return Response::error_with_info(request.id, err),
            };
            info!(tab = params.tab_id, url = %params.url, "Notification requested");
            state.show_notification(params);
            Response::ok(request.id, serde_json::json!({ "accepted": true }))
        }
        Method::DetectorReady => {
            let params = match request.params {
                Some(params) => params,
                None => {
                    return Response::error(
                        request.id,
                        "invalid_params",
                        "detector_ready payload is required",
                    )
                }
            };
            let hello = match parse_hello(params) {
                Ok(hello) => hello,
                Err(err) => return Response::error_with_info(request.id, err),
            };
            state.register_detector(&hello);
            Response::ok(request.id, serde_json::json!({ "registered": true }))
        }
        // Vestigial permission probe: there is no real permission model.
        Method::CheckPermission => Response::ok(
            request.id,
            serde_json::json!({ "permission_level": "granted" }),
        ),
        Method::FocusSourceTab => {
            state.focus_source_tab();
            Response::ok(request.id, serde_json::json!({ "success": true }))
        }
        Method::IconClicked => {
            state.icon_clicked();
            Response::ok(request.id, serde_json::json!({ "success": true }))
        }
    }
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
