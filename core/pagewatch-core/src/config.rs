//! Runtime configuration and filesystem paths.
//!
//! Everything lives under `~/.pagewatch`. The config file is TOML with every
//! field defaulted, so a missing file yields a fully working setup. Callers
//! that hit a malformed file are expected to warn and fall back to
//! [`WatchConfig::default`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

pub const CONFIG_FILE: &str = "config.toml";
pub const SOCKET_NAME: &str = "daemon.sock";
pub const STORE_FILE: &str = "notifications.json";

/// Returns the pagewatch base directory (`~/.pagewatch`).
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".pagewatch"))
        .ok_or(WatchError::HomeDirNotFound)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(base_dir()?.join(CONFIG_FILE))
}

pub fn socket_path() -> Result<PathBuf> {
    Ok(base_dir()?.join(SOCKET_NAME))
}

pub fn store_path() -> Result<PathBuf> {
    Ok(base_dir()?.join(STORE_FILE))
}

pub fn log_dir() -> Result<PathBuf> {
    Ok(base_dir()?.join("logs"))
}

/// Directory holding per-tab agent reply sockets.
pub fn agents_dir() -> Result<PathBuf> {
    Ok(base_dir()?.join("agents"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    pub detector: DetectorConfig,
    pub indicator: IndicatorConfig,
    pub notify: NotifyConfig,
    pub coordinator: CoordinatorConfig,
}

impl WatchConfig {
    /// Loads the config file, returning defaults if it does not exist.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(WatchConfig::default());
        }
        let content = fs_err::read_to_string(path)
            .map_err(|err| WatchError::io(format!("read {}", path.display()), err))?;
        toml::from_str(&content).map_err(|err| WatchError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
    }
}

/// Timings for the monitoring state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// Cadence of indicator re-evaluation while a session is active.
    pub poll_interval_ms: u64,
    /// Delay between a trigger and session start, letting the page settle.
    pub settle_delay_ms: u64,
    /// Give up if the indicator never appears within this window.
    pub no_indicator_timeout_ms: u64,
    /// The indicator must stay absent this long before completion fires.
    pub stability_window_ms: u64,
    /// Hard ceiling on session lifetime regardless of indicator state.
    pub safety_ceiling_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            poll_interval_ms: 300,
            settle_delay_ms: 300,
            no_indicator_timeout_ms: 5_000,
            stability_window_ms: 1_000,
            safety_ceiling_ms: 120_000,
        }
    }
}

impl DetectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn no_indicator_timeout(&self) -> Duration {
        Duration::from_millis(self.no_indicator_timeout_ms)
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }

    pub fn safety_ceiling(&self) -> Duration {
        Duration::from_millis(self.safety_ceiling_ms)
    }
}

/// Busy-indicator matching rule. The class names are page-specific and
/// treated as opaque configuration; the defaults target the page this tool
/// shipped for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorConfig {
    pub marker_class: String,
    pub keywords: Vec<String>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            marker_class: "animate-pplxIndicator".to_string(),
            keywords: vec![
                "pplx".to_string(),
                "typing".to_string(),
                "indicator".to_string(),
            ],
        }
    }
}

/// Notification content and local-feedback timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub title: String,
    pub message: String,
    pub banner_text: String,
    pub flash_text: String,
    pub flash_cadence_ms: u64,
    pub flash_duration_ms: u64,
    pub banner_focused_ms: u64,
    pub banner_unfocused_ms: u64,
    pub banner_fade_ms: u64,
    /// Optional path to the completion sound clip.
    pub sound_path: Option<PathBuf>,
    /// Playback is cut off after this long regardless of clip length.
    pub sound_max_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        NotifyConfig {
            title: "Response complete".to_string(),
            message: "Your query has finished generating a response".to_string(),
            banner_text: "Response complete! ✓".to_string(),
            flash_text: "🔴 RESPONSE READY!".to_string(),
            flash_cadence_ms: 1_000,
            flash_duration_ms: 30_000,
            banner_focused_ms: 3_000,
            banner_unfocused_ms: 5_000,
            banner_fade_ms: 500,
            sound_path: None,
            sound_max_ms: 3_000,
        }
    }
}

impl NotifyConfig {
    pub fn flash_cadence(&self) -> Duration {
        Duration::from_millis(self.flash_cadence_ms)
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }

    pub fn banner_duration(&self, focused: bool) -> Duration {
        if focused {
            Duration::from_millis(self.banner_focused_ms)
        } else {
            Duration::from_millis(self.banner_unfocused_ms)
        }
    }

    pub fn sound_max(&self) -> Duration {
        Duration::from_millis(self.sound_max_ms)
    }
}

/// Daemon-side timings and badge appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    pub badge_text: String,
    pub badge_color: String,
    pub badge_clear_ms: u64,
    pub popup_auto_close_ms: u64,
    pub popup_width: u32,
    pub popup_height: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            badge_text: "✓".to_string(),
            badge_color: "#4CAF50".to_string(),
            badge_clear_ms: 30_000,
            popup_auto_close_ms: 15_000,
            popup_width: 360,
            popup_height: 180,
        }
    }
}

impl CoordinatorConfig {
    pub fn badge_clear(&self) -> Duration {
        Duration::from_millis(self.badge_clear_ms)
    }

    pub fn popup_auto_close(&self) -> Duration {
        Duration::from_millis(self.popup_auto_close_ms)
    }
}
