//! File logging for the agent.
//!
//! The agent's stdout is the page wire, so diagnostics go to a daily log
//! file under `~/.pagewatch/logs` instead. Returns a guard that must stay
//! alive for the duration of the process.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use pagewatch_core::config;

pub fn init() -> Option<WorkerGuard> {
    let log_dir = config::log_dir().ok()?;
    if fs_err::create_dir_all(&log_dir).is_err() {
        return None;
    }

    let appender = tracing_appender::rolling::daily(log_dir, "agent.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    Some(guard)
}
