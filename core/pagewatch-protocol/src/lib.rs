//! IPC protocol types and validation for the pagewatch daemon.
//!
//! This crate is shared by the daemon and its clients (watch agent,
//! presenter) to prevent schema drift. The daemon remains the authority on
//! validation, but clients reuse the same types to construct valid requests.
//!
//! Three wire surfaces live here:
//!
//! - the daemon socket vocabulary ([`Method`], [`Request`], [`Response`])
//! - tab signals pushed to an agent's reply socket ([`TabRequest`])
//! - the page wire the agent speaks over stdio ([`PageEvent`], [`UiCommand`])

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetBadge,
    ShowNotification,
    DetectorReady,
    CheckPermission,
    FocusSourceTab,
    IconClicked,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// Params for `show_notification`. Title and message fall back to the
/// daemon's configured defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub url: String,
    pub tab_id: u64,
}

impl NotifyParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.url.trim().is_empty() {
            return Err(ErrorInfo::new("missing_field", "url is required"));
        }
        Ok(())
    }
}

pub fn parse_notify(params: Value) -> Result<NotifyParams, ErrorInfo> {
    let parsed: NotifyParams = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("notification payload is invalid JSON: {}", err),
        )
    })?;
    parsed.validate()?;
    Ok(parsed)
}

/// Params for `detector_ready`: registers the agent's tab and the unix
/// socket the daemon can push tab signals back through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorHello {
    pub tab_id: u64,
    pub pid: u32,
    pub reply_socket: String,
}

impl DetectorHello {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.pid == 0 {
            return Err(ErrorInfo::new("invalid_pid", "pid is required"));
        }
        if self.reply_socket.trim().is_empty() {
            return Err(ErrorInfo::new("missing_field", "reply_socket is required"));
        }
        Ok(())
    }
}

pub fn parse_hello(params: Value) -> Result<DetectorHello, ErrorInfo> {
    let parsed: DetectorHello = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("detector_ready payload is invalid JSON: {}", err),
        )
    })?;
    parsed.validate()?;
    Ok(parsed)
}

/// Signals pushed to a watch agent over its reply socket. `CheckStatus` is
/// the only one that expects a reply ([`StatusReply`]); the rest are
/// fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum TabRequest {
    TabFocused,
    Activate,
    CheckStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusReply {
    pub is_monitoring: bool,
}

/// Snapshot of the observed page's class attributes, streamed by the
/// in-page shim on every relevant DOM mutation. The busy-indicator check is
/// evaluated against the most recent snapshot on every tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub classes: Vec<String>,
}

/// Inbound page events on the agent's stdin, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageEvent {
    FormSubmit,
    ActionClick,
    KeyDown {
        key: String,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        in_text_input: bool,
    },
    Mutation {
        snapshot: PageSnapshot,
    },
    Focus {
        focused: bool,
    },
    Visibility {
        visible: bool,
    },
}

/// Outbound UI commands on the agent's stdout, one JSON object per line.
/// The shim owns the actual DOM work (banner element, fade transition,
/// document title, window focus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UiCommand {
    ShowBanner { text: String },
    DismissBanner { fade_ms: u64 },
    SetTitle { title: String },
    RestoreTitle,
    Activate,
}
