//! Popup windows as presenter processes.
//!
//! The daemon "opens a window" by spawning `pagewatch-presenter alert`; the
//! window id is the child pid, the existence probe is child liveness, and
//! closing is kill + reap. `PAGEWATCH_PRESENTER_BIN` overrides the binary
//! (used by tests and by terminal-wrapper setups); otherwise the presenter
//! is expected next to the daemon executable.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use tracing::debug;

use crate::hosts::{PopupSpec, WindowHost, WindowId};

const PRESENTER_BIN_ENV: &str = "PAGEWATCH_PRESENTER_BIN";
const PRESENTER_BIN_NAME: &str = "pagewatch-presenter";

pub struct ProcessWindowHost {
    presenter: PathBuf,
    children: Mutex<HashMap<u32, Child>>,
}

impl ProcessWindowHost {
    pub fn new() -> Self {
        ProcessWindowHost {
            presenter: resolve_presenter_bin(),
            children: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for ProcessWindowHost {
    fn default() -> Self {
        ProcessWindowHost::new()
    }
}

fn resolve_presenter_bin() -> PathBuf {
    if let Ok(path) = env::var(PRESENTER_BIN_ENV) {
        return PathBuf::from(path);
    }
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(PRESENTER_BIN_NAME)))
        .unwrap_or_else(|| PathBuf::from(PRESENTER_BIN_NAME))
}

impl WindowHost for ProcessWindowHost {
    fn open_popup(&self, spec: &PopupSpec) -> Result<WindowId, String> {
        let mut command = Command::new(&self.presenter);
        command
            .arg("alert")
            .arg("--width")
            .arg(spec.width.to_string())
            .arg("--height")
            .arg(spec.height.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn().map_err(|err| {
            format!(
                "failed to spawn presenter {}: {}",
                self.presenter.display(),
                err
            )
        })?;

        let pid = child.id();
        self.children.lock().unwrap().insert(pid, child);
        debug!(
            pid,
            width = spec.width,
            height = spec.height,
            focused = spec.focused,
            "Presenter popup spawned"
        );
        Ok(WindowId(pid))
    }

    fn window_exists(&self, id: WindowId) -> bool {
        let mut children = self.children.lock().unwrap();
        match children.get_mut(&id.0) {
            // try_wait reaps an exited child without blocking.
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn close_window(&self, id: WindowId) -> Result<(), String> {
        let mut children = self.children.lock().unwrap();
        let mut child = children
            .remove(&id.0)
            .ok_or_else(|| format!("unknown popup window {}", id.0))?;

        // Kill can fail if the child already exited; wait reaps either way.
        if let Err(err) = child.kill() {
            debug!(pid = id.0, error = %err, "Popup process already gone");
        }
        child
            .wait()
            .map_err(|err| format!("failed to reap presenter {}: {}", id.0, err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper_host() -> ProcessWindowHost {
        ProcessWindowHost {
            presenter: PathBuf::from("/bin/sleep"),
            children: Mutex::new(HashMap::new()),
        }
    }

    fn spec() -> PopupSpec {
        PopupSpec {
            width: 360,
            height: 180,
            focused: true,
        }
    }

    #[test]
    fn open_probe_close_lifecycle() {
        let host = sleeper_host();
        // /bin/sleep treats "alert" as an invalid interval and exits fast,
        // which is fine: the child still spawns and can be reaped.
        let window = host.open_popup(&spec()).unwrap();
        assert!(host.close_window(window).is_ok());
        assert!(!host.window_exists(window));
    }

    #[test]
    fn unknown_window_does_not_exist() {
        let host = sleeper_host();
        assert!(!host.window_exists(WindowId(999_999)));
        assert!(host.close_window(WindowId(999_999)).is_err());
    }

    #[test]
    fn missing_binary_is_an_open_error() {
        let host = ProcessWindowHost {
            presenter: PathBuf::from("/nonexistent/pagewatch-presenter"),
            children: Mutex::new(HashMap::new()),
        };
        assert!(host.open_popup(&spec()).is_err());
    }
}
