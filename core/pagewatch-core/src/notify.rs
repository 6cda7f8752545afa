//! Completion feedback planning: what happens when a session completes,
//! and the small schedulers behind the title flash and the in-page banner.
//!
//! These are plain state objects driven by the agent's tick loop; nothing
//! here owns a timer or touches the page directly.

use std::time::{Duration, Instant};

use crate::config::NotifyConfig;

/// What the notification routine should do for a given focus state.
///
/// The remote notification, sound, and title flash only fire when the page
/// is unfocused; the banner always shows, just for a shorter time when the
/// user is already looking at the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyPlan {
    pub notify_daemon: bool,
    pub play_sound: bool,
    pub flash_title: bool,
    pub banner_duration: Duration,
}

impl NotifyPlan {
    pub fn for_focus(focused: bool, config: &NotifyConfig) -> Self {
        NotifyPlan {
            notify_daemon: !focused,
            play_sound: !focused,
            flash_title: !focused,
            banner_duration: config.banner_duration(focused),
        }
    }
}

/// Title updates emitted by the flash loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashAction {
    ShowFlash,
    ShowOriginal,
    /// Final action: put the original title back and stop.
    Restore,
}

/// Alternates the document title with the attention string on a fixed
/// cadence, for a bounded duration, restoring the original title when
/// stopped (by the deadline or by the page regaining focus).
#[derive(Debug)]
pub struct TitleFlasher {
    deadline: Instant,
    next_toggle_at: Instant,
    cadence: Duration,
    showing_flash: bool,
    done: bool,
}

impl TitleFlasher {
    pub fn new(now: Instant, config: &NotifyConfig) -> Self {
        TitleFlasher {
            deadline: now + config.flash_duration(),
            next_toggle_at: now + config.flash_cadence(),
            cadence: config.flash_cadence(),
            showing_flash: false,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Returns the title action due at `now`, if any.
    pub fn tick(&mut self, now: Instant) -> Option<FlashAction> {
        if self.done {
            return None;
        }
        if now >= self.deadline {
            self.done = true;
            return Some(FlashAction::Restore);
        }
        if now >= self.next_toggle_at {
            self.next_toggle_at += self.cadence;
            self.showing_flash = !self.showing_flash;
            return Some(if self.showing_flash {
                FlashAction::ShowFlash
            } else {
                FlashAction::ShowOriginal
            });
        }
        None
    }

    /// Stops the loop early (focus regained). Idempotent.
    pub fn stop(&mut self) -> Option<FlashAction> {
        if self.done {
            return None;
        }
        self.done = true;
        Some(FlashAction::Restore)
    }
}

/// Auto-dismiss deadline for the in-page banner.
#[derive(Debug, Clone, Copy)]
pub struct BannerTimer {
    dismiss_at: Instant,
}

impl BannerTimer {
    pub fn new(now: Instant, duration: Duration) -> Self {
        BannerTimer {
            dismiss_at: now + duration,
        }
    }

    pub fn due(&self, now: Instant) -> bool {
        now >= self.dismiss_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NotifyConfig {
        NotifyConfig::default()
    }

    #[test]
    fn unfocused_plan_does_everything() {
        let plan = NotifyPlan::for_focus(false, &config());
        assert!(plan.notify_daemon);
        assert!(plan.play_sound);
        assert!(plan.flash_title);
        assert_eq!(plan.banner_duration, Duration::from_millis(5_000));
    }

    #[test]
    fn focused_plan_only_shows_the_banner() {
        let plan = NotifyPlan::for_focus(true, &config());
        assert!(!plan.notify_daemon);
        assert!(!plan.play_sound);
        assert!(!plan.flash_title);
        assert_eq!(plan.banner_duration, Duration::from_millis(3_000));
    }

    #[test]
    fn flasher_alternates_on_cadence() {
        let base = Instant::now();
        let mut flasher = TitleFlasher::new(base, &config());

        assert_eq!(flasher.tick(base + Duration::from_millis(500)), None);
        assert_eq!(
            flasher.tick(base + Duration::from_millis(1_000)),
            Some(FlashAction::ShowFlash)
        );
        assert_eq!(flasher.tick(base + Duration::from_millis(1_500)), None);
        assert_eq!(
            flasher.tick(base + Duration::from_millis(2_000)),
            Some(FlashAction::ShowOriginal)
        );
    }

    #[test]
    fn flasher_restores_at_deadline() {
        let base = Instant::now();
        let mut flasher = TitleFlasher::new(base, &config());
        assert_eq!(
            flasher.tick(base + Duration::from_millis(30_000)),
            Some(FlashAction::Restore)
        );
        assert!(flasher.is_done());
        assert_eq!(flasher.tick(base + Duration::from_millis(31_000)), None);
    }

    #[test]
    fn stop_restores_once() {
        let base = Instant::now();
        let mut flasher = TitleFlasher::new(base, &config());
        assert_eq!(flasher.stop(), Some(FlashAction::Restore));
        assert_eq!(flasher.stop(), None);
        assert_eq!(flasher.tick(base + Duration::from_millis(1_000)), None);
    }

    #[test]
    fn banner_timer_fires_at_deadline() {
        let base = Instant::now();
        let timer = BannerTimer::new(base, Duration::from_millis(3_000));
        assert!(!timer.due(base + Duration::from_millis(2_999)));
        assert!(timer.due(base + Duration::from_millis(3_000)));
    }
}
