//! Platform seams for the daemon.
//!
//! Tab activation and popup window management belong to the browser side of
//! the fence; the daemon only talks to them through these traits so the
//! relay logic can be tested against fakes, and so a stricter variant can be
//! substituted without touching the state machine.

use std::path::PathBuf;

use pagewatch_protocol::TabRequest;

/// Identifies the observed browser tab, assigned by the in-page shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u64);

/// Identifies one popup window (in the process host: the presenter's pid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u32);

/// Creation parameters for the alert popup. No screen coordinates: the
/// platform picks the placement.
#[derive(Debug, Clone, Copy)]
pub struct PopupSpec {
    pub width: u32,
    pub height: u32,
    pub focused: bool,
}

pub trait WindowHost: Send + Sync {
    fn open_popup(&self, spec: &PopupSpec) -> Result<WindowId, String>;
    /// Existence probe used before removal, so a manually closed window is
    /// never an error.
    fn window_exists(&self, id: WindowId) -> bool;
    fn close_window(&self, id: WindowId) -> Result<(), String>;
}

pub trait TabHost: Send + Sync {
    fn register_tab(&self, tab: TabId, pid: u32, reply_socket: PathBuf);
    fn tab_exists(&self, tab: TabId) -> bool;
    fn activate_tab(&self, tab: TabId) -> Result<(), String>;
    fn send(&self, tab: TabId, request: &TabRequest) -> Result<(), String>;
}
