//! # pagewatch-core
//!
//! Core library for pagewatch, providing the logic shared by the watch
//! agent, the daemon, and the presenter.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Components wrap with
//!   their own threads where needed.
//! - **Not thread-safe**: Callers provide their own synchronization
//!   (`Mutex`, `Arc`).
//! - **Graceful degradation**: Missing or corrupt files return empty/default
//!   values, not errors. Detection failures read as "not busy".
//! - **Pure transitions**: The monitoring state machine advances as a
//!   function of (state, indicator sample, elapsed time) so it can be tested
//!   without a live page.

pub mod config;
pub mod error;
pub mod indicator;
pub mod notify;
pub mod session;
pub mod store;

pub use config::WatchConfig;
pub use error::{Result, WatchError};
pub use indicator::IndicatorRule;
pub use notify::{BannerTimer, FlashAction, NotifyPlan, TitleFlasher};
pub use session::{MonitoringSession, Phase, Tick};
pub use store::{NotificationRecord, RecordStore};
