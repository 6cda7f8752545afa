//! The monitoring state machine.
//!
//! One [`MonitoringSession`] covers one detection attempt, from trigger to
//! completion or timeout. The machine is advanced by [`MonitoringSession::tick`]
//! with the current indicator sample and clock reading, so the full lifecycle
//! can be exercised in tests without a page or timers.
//!
//! ```text
//! WaitingForIndicator → IndicatorActive → IndicatorStopped → Complete
//! any state ──(elapsed > safety ceiling)──────────────────→ TimedOut
//! WaitingForIndicator ──(timeout, indicator never seen)───→ TimedOut
//! IndicatorStopped ──(indicator reappears)────────────────→ IndicatorActive
//! ```

use std::time::Instant;

use crate::config::DetectorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForIndicator,
    IndicatorActive,
    IndicatorStopped,
    Complete,
    TimedOut,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::TimedOut)
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    /// The response finished; notify exactly once and drop the session.
    Complete,
    /// Detection gave up; drop the session silently.
    TimedOut,
}

#[derive(Debug)]
pub struct MonitoringSession {
    started_at: Instant,
    ever_seen: bool,
    stopped_at: Option<Instant>,
    phase: Phase,
}

impl MonitoringSession {
    pub fn new(now: Instant) -> Self {
        MonitoringSession {
            started_at: now,
            ever_seen: false,
            stopped_at: None,
            phase: Phase::WaitingForIndicator,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Whether the indicator was observed at least once in this session.
    pub fn indicator_ever_seen(&self) -> bool {
        self.ever_seen
    }

    /// Advances the machine one step. Ticking a terminal session returns the
    /// terminal outcome again without further transitions.
    pub fn tick(&mut self, indicator_visible: bool, now: Instant, timing: &DetectorConfig) -> Tick {
        match self.phase {
            Phase::Complete => return Tick::Complete,
            Phase::TimedOut => return Tick::TimedOut,
            _ => {}
        }

        // Safety ceiling applies in every state, even while the indicator is
        // still visible. Guards against the heuristic never going absent.
        if now.duration_since(self.started_at) > timing.safety_ceiling() {
            self.phase = Phase::TimedOut;
            return Tick::TimedOut;
        }

        match self.phase {
            Phase::WaitingForIndicator => {
                if indicator_visible {
                    self.ever_seen = true;
                    self.phase = Phase::IndicatorActive;
                } else if now.duration_since(self.started_at) > timing.no_indicator_timeout() {
                    self.phase = Phase::TimedOut;
                    return Tick::TimedOut;
                }
                Tick::Continue
            }
            Phase::IndicatorActive => {
                if !indicator_visible {
                    self.phase = Phase::IndicatorStopped;
                    self.stopped_at = Some(now);
                }
                Tick::Continue
            }
            Phase::IndicatorStopped => {
                if indicator_visible {
                    // Flicker debounce: the stop clock resets entirely.
                    self.phase = Phase::IndicatorActive;
                    self.stopped_at = None;
                    return Tick::Continue;
                }
                match self.stopped_at {
                    Some(stopped_at)
                        if now.duration_since(stopped_at) >= timing.stability_window() =>
                    {
                        self.phase = Phase::Complete;
                        Tick::Complete
                    }
                    Some(_) => Tick::Continue,
                    // Cannot happen; re-record rather than guess elapsed time.
                    None => {
                        self.stopped_at = Some(now);
                        Tick::Continue
                    }
                }
            }
            Phase::Complete => Tick::Complete,
            Phase::TimedOut => Tick::TimedOut,
        }
    }
}
