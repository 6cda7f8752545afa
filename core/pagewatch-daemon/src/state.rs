//! Cross-tab state owned by the daemon.
//!
//! [`SessionState`] is the whole of it: which tab last reported a
//! completion, and which popup window is currently tracked. It lives in an
//! explicit struct behind a mutex rather than as ambient globals, and it is
//! lost on daemon restart by design.
//!
//! There is no queue. A new notification overwrites the in-flight one:
//! badge and popup timers are re-armed via epoch counters, the persisted
//! record is replaced, and the previous popup is closed before the new one
//! opens so it cannot linger untracked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Utc;
use tracing::{info, warn};

use pagewatch_core::config::WatchConfig;
use pagewatch_core::store::{NotificationRecord, RecordStore};
use pagewatch_protocol::{DetectorHello, NotifyParams, TabRequest};

use crate::hosts::{PopupSpec, TabHost, TabId, WindowHost, WindowId};

/// Which tab last notified, and which popup is tracked. At most one popup
/// id is tracked at a time.
#[derive(Debug, Default)]
pub struct SessionState {
    pub last_notified_tab: Option<TabId>,
    pub open_popup: Option<WindowId>,
}

/// Toolbar badge: either showing the configured text/color, or empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeState {
    pub text: String,
    pub color: String,
}

pub struct SharedState {
    config: WatchConfig,
    store: Mutex<RecordStore>,
    session: Mutex<SessionState>,
    badge: Mutex<Option<BadgeState>>,
    windows: Arc<dyn WindowHost>,
    tabs: Arc<dyn TabHost>,
    popup_epoch: AtomicU64,
    badge_epoch: AtomicU64,
}

impl SharedState {
    pub fn new(
        config: WatchConfig,
        store: RecordStore,
        windows: Arc<dyn WindowHost>,
        tabs: Arc<dyn TabHost>,
    ) -> Self {
        SharedState {
            config,
            store: Mutex::new(store),
            session: Mutex::new(SessionState::default()),
            badge: Mutex::new(None),
            windows,
            tabs,
            popup_epoch: AtomicU64::new(0),
            badge_epoch: AtomicU64::new(0),
        }
    }

    /// Handles `show_notification`: badge, persisted record, popup window.
    /// Returns immediately; window creation and auto-close are best-effort.
    pub fn show_notification(self: &Arc<Self>, params: NotifyParams) {
        let tab = TabId(params.tab_id);

        let badge_epoch = {
            let mut badge = self.badge.lock().unwrap();
            *badge = Some(BadgeState {
                text: self.config.coordinator.badge_text.clone(),
                color: self.config.coordinator.badge_color.clone(),
            });
            self.badge_epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.spawn_badge_clear(badge_epoch);

        let record = NotificationRecord {
            title: params
                .title
                .unwrap_or_else(|| self.config.notify.title.clone()),
            message: params
                .message
                .unwrap_or_else(|| self.config.notify.message.clone()),
            source_url: params.url,
            created_at: Utc::now(),
        };
        if let Err(err) = self.store.lock().unwrap().put(record) {
            warn!(error = %err, "Failed to persist notification record");
        }

        let opened = {
            let mut session = self.session.lock().unwrap();
            session.last_notified_tab = Some(tab);

            // Close-before-replace: a superseded popup must not linger
            // untracked with a dead auto-close timer.
            if let Some(previous) = session.open_popup.take() {
                if self.windows.window_exists(previous) {
                    if let Err(err) = self.windows.close_window(previous) {
                        warn!(window = previous.0, error = %err, "Failed to close superseded popup");
                    }
                }
            }

            let epoch = self.popup_epoch.fetch_add(1, Ordering::SeqCst) + 1;
            let spec = PopupSpec {
                width: self.config.coordinator.popup_width,
                height: self.config.coordinator.popup_height,
                focused: true,
            };
            match self.windows.open_popup(&spec) {
                Ok(window) => {
                    info!(window = window.0, tab = tab.0, "Notification popup shown");
                    session.open_popup = Some(window);
                    Some((window, epoch))
                }
                Err(err) => {
                    warn!(error = %err, "Failed to open notification popup");
                    None
                }
            }
        };

        if let Some((window, epoch)) = opened {
            self.spawn_popup_auto_close(window, epoch);
        }
    }

    /// Handles `focus_source_tab`. Always succeeds from the caller's view;
    /// stale tab references abort silently after the popup is closed.
    pub fn focus_source_tab(&self) {
        let mut session = self.session.lock().unwrap();

        let tab = match session.last_notified_tab {
            Some(tab) => tab,
            None => return,
        };

        if let Some(popup) = session.open_popup.take() {
            if let Err(err) = self.windows.close_window(popup) {
                warn!(window = popup.0, error = %err, "Failed to close popup on view");
            }
        }

        if !self.tabs.tab_exists(tab) {
            warn!(tab = tab.0, "Source tab no longer exists");
            return;
        }

        if let Err(err) = self.tabs.activate_tab(tab) {
            warn!(tab = tab.0, error = %err, "Failed to activate source tab");
            return;
        }
        if let Err(err) = self.tabs.send(tab, &TabRequest::TabFocused) {
            warn!(tab = tab.0, error = %err, "Failed to relay tab_focused");
        }
    }

    /// Handles a toolbar icon click: bring the source tab forward, nothing
    /// else.
    pub fn icon_clicked(&self) {
        let tab = match self.session.lock().unwrap().last_notified_tab {
            Some(tab) => tab,
            None => return,
        };
        if let Err(err) = self.tabs.activate_tab(tab) {
            warn!(tab = tab.0, error = %err, "Failed to activate tab on icon click");
        }
    }

    pub fn register_detector(&self, hello: &DetectorHello) {
        self.tabs.register_tab(
            TabId(hello.tab_id),
            hello.pid,
            hello.reply_socket.clone().into(),
        );
        info!(tab = hello.tab_id, pid = hello.pid, "Detector ready");
    }

    /// Current badge as (text, color); text is empty when cleared.
    pub fn badge_snapshot(&self) -> (String, String) {
        match self.badge.lock().unwrap().as_ref() {
            Some(badge) => (badge.text.clone(), badge.color.clone()),
            None => (String::new(), self.config.coordinator.badge_color.clone()),
        }
    }

    fn spawn_badge_clear(self: &Arc<Self>, epoch: u64) {
        let state = Arc::clone(self);
        let delay = self.config.coordinator.badge_clear();
        thread::spawn(move || {
            thread::sleep(delay);
            state.clear_badge(epoch);
        });
    }

    fn spawn_popup_auto_close(self: &Arc<Self>, window: WindowId, epoch: u64) {
        let state = Arc::clone(self);
        let delay = self.config.coordinator.popup_auto_close();
        thread::spawn(move || {
            thread::sleep(delay);
            state.auto_close_popup(window, epoch);
        });
    }

    /// Clears the badge unless a newer notification re-armed the timer.
    pub(crate) fn clear_badge(&self, epoch: u64) {
        if self.badge_epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        *self.badge.lock().unwrap() = None;
    }

    /// Auto-close path for the popup window. Re-checks existence first so a
    /// manual close before the timer fires is not an error.
    pub(crate) fn auto_close_popup(&self, window: WindowId, epoch: u64) {
        if self.popup_epoch.load(Ordering::SeqCst) != epoch {
            return;
        }

        let mut session = self.session.lock().unwrap();
        if session.open_popup != Some(window) {
            return;
        }

        if !self.windows.window_exists(window) {
            info!(window = window.0, "Popup already closed");
            session.open_popup = None;
            return;
        }

        if let Err(err) = self.windows.close_window(window) {
            warn!(window = window.0, error = %err, "Failed to auto-close popup");
        }
        session.open_popup = None;
    }

    #[cfg(test)]
    pub(crate) fn popup_epoch(&self) -> u64 {
        self.popup_epoch.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn badge_epoch_value(&self) -> u64 {
        self.badge_epoch.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn session_snapshot(&self) -> (Option<TabId>, Option<WindowId>) {
        let session = self.session.lock().unwrap();
        (session.last_notified_tab, session.open_popup)
    }

    pub fn latest_record(&self) -> Option<NotificationRecord> {
        self.store.lock().unwrap().latest().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct FakeWindows {
        next_id: AtomicU32,
        alive: Mutex<HashSet<u32>>,
        opened: Mutex<Vec<u32>>,
        closed: Mutex<Vec<u32>>,
        fail_open: bool,
    }

    impl FakeWindows {
        fn mark_closed_externally(&self, window: WindowId) {
            self.alive.lock().unwrap().remove(&window.0);
        }
    }

    impl WindowHost for FakeWindows {
        fn open_popup(&self, _spec: &PopupSpec) -> Result<WindowId, String> {
            if self.fail_open {
                return Err("window host unavailable".to_string());
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.alive.lock().unwrap().insert(id);
            self.opened.lock().unwrap().push(id);
            Ok(WindowId(id))
        }

        fn window_exists(&self, id: WindowId) -> bool {
            self.alive.lock().unwrap().contains(&id.0)
        }

        fn close_window(&self, id: WindowId) -> Result<(), String> {
            self.closed.lock().unwrap().push(id.0);
            self.alive.lock().unwrap().remove(&id.0);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTabs {
        existing: Mutex<HashSet<u64>>,
        activated: Mutex<Vec<u64>>,
        sent: Mutex<Vec<(u64, TabRequest)>>,
    }

    impl TabHost for FakeTabs {
        fn register_tab(&self, tab: TabId, _pid: u32, _reply_socket: PathBuf) {
            self.existing.lock().unwrap().insert(tab.0);
        }

        fn tab_exists(&self, tab: TabId) -> bool {
            self.existing.lock().unwrap().contains(&tab.0)
        }

        fn activate_tab(&self, tab: TabId) -> Result<(), String> {
            self.activated.lock().unwrap().push(tab.0);
            Ok(())
        }

        fn send(&self, tab: TabId, request: &TabRequest) -> Result<(), String> {
            self.sent.lock().unwrap().push((tab.0, *request));
            Ok(())
        }
    }

    fn notify_params(tab_id: u64) -> NotifyParams {
        NotifyParams {
            title: Some("Done".to_string()),
            message: Some("Answer ready".to_string()),
            url: "https://x/y".to_string(),
            tab_id,
        }
    }

    fn state_with(
        windows: Arc<FakeWindows>,
        tabs: Arc<FakeTabs>,
    ) -> Arc<SharedState> {
        Arc::new(SharedState::new(
            WatchConfig::default(),
            RecordStore::new_in_memory(),
            windows,
            tabs,
        ))
    }

    #[test]
    fn notification_persists_record_and_tracks_tab() {
        let windows = Arc::new(FakeWindows::default());
        let tabs = Arc::new(FakeTabs::default());
        let state = state_with(Arc::clone(&windows), Arc::clone(&tabs));

        state.show_notification(notify_params(7));

        let record = state.latest_record().unwrap();
        assert_eq!(record.title, "Done");
        assert_eq!(record.source_url, "https://x/y");
        let (tab, popup) = state.session_snapshot();
        assert_eq!(tab, Some(TabId(7)));
        assert!(popup.is_some());
        let (text, color) = state.badge_snapshot();
        assert_eq!(text, "✓");
        assert_eq!(color, "#4CAF50");
    }

    #[test]
    fn second_notification_overwrites_the_record() {
        let state = state_with(
            Arc::new(FakeWindows::default()),
            Arc::new(FakeTabs::default()),
        );

        let mut first = notify_params(1);
        first.title = Some("first".to_string());
        state.show_notification(first);

        let mut second = notify_params(2);
        second.title = Some("second".to_string());
        state.show_notification(second);

        assert_eq!(state.latest_record().unwrap().title, "second");
    }

    #[test]
    fn second_notification_closes_previous_popup() {
        let windows = Arc::new(FakeWindows::default());
        let state = state_with(Arc::clone(&windows), Arc::new(FakeTabs::default()));

        state.show_notification(notify_params(1));
        let (_, first_popup) = state.session_snapshot();
        state.show_notification(notify_params(2));

        assert_eq!(
            windows.closed.lock().unwrap().as_slice(),
            &[first_popup.unwrap().0]
        );
        assert_eq!(windows.opened.lock().unwrap().len(), 2);
    }

    #[test]
    fn focus_without_notification_is_a_noop() {
        let windows = Arc::new(FakeWindows::default());
        let tabs = Arc::new(FakeTabs::default());
        let state = state_with(Arc::clone(&windows), Arc::clone(&tabs));

        state.focus_source_tab();

        assert!(windows.closed.lock().unwrap().is_empty());
        assert!(tabs.activated.lock().unwrap().is_empty());
        assert!(tabs.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn focus_activates_tab_and_relays_signal() {
        let windows = Arc::new(FakeWindows::default());
        let tabs = Arc::new(FakeTabs::default());
        tabs.register_tab(TabId(7), 4242, PathBuf::from("/tmp/tab-7.sock"));
        let state = state_with(Arc::clone(&windows), Arc::clone(&tabs));

        state.show_notification(notify_params(7));
        state.focus_source_tab();

        assert_eq!(tabs.activated.lock().unwrap().as_slice(), &[7]);
        assert_eq!(
            tabs.sent.lock().unwrap().as_slice(),
            &[(7, TabRequest::TabFocused)]
        );
        let (_, popup) = state.session_snapshot();
        assert!(popup.is_none(), "popup must be closed on view");
    }

    #[test]
    fn focus_aborts_when_tab_is_gone() {
        let windows = Arc::new(FakeWindows::default());
        let tabs = Arc::new(FakeTabs::default());
        let state = state_with(Arc::clone(&windows), Arc::clone(&tabs));

        // Tab 9 never registered: notification recorded it, but it has
        // since vanished.
        state.show_notification(notify_params(9));
        state.focus_source_tab();

        assert!(tabs.activated.lock().unwrap().is_empty());
        assert!(tabs.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn icon_click_activates_last_notified_tab() {
        let tabs = Arc::new(FakeTabs::default());
        tabs.register_tab(TabId(7), 4242, PathBuf::from("/tmp/tab-7.sock"));
        let state = state_with(Arc::new(FakeWindows::default()), Arc::clone(&tabs));

        state.show_notification(notify_params(7));
        state.icon_clicked();

        assert_eq!(tabs.activated.lock().unwrap().as_slice(), &[7]);
        assert!(tabs.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn auto_close_skips_removal_when_window_already_gone() {
        let windows = Arc::new(FakeWindows::default());
        let state = state_with(Arc::clone(&windows), Arc::new(FakeTabs::default()));

        state.show_notification(notify_params(1));
        let (_, popup) = state.session_snapshot();
        let popup = popup.unwrap();
        let epoch = state.popup_epoch();

        windows.mark_closed_externally(popup);
        state.auto_close_popup(popup, epoch);

        assert!(windows.closed.lock().unwrap().is_empty());
        let (_, tracked) = state.session_snapshot();
        assert!(tracked.is_none());
    }

    #[test]
    fn auto_close_with_stale_epoch_is_ignored() {
        let windows = Arc::new(FakeWindows::default());
        let state = state_with(Arc::clone(&windows), Arc::new(FakeTabs::default()));

        state.show_notification(notify_params(1));
        let (_, first_popup) = state.session_snapshot();
        let first_epoch = state.popup_epoch();
        state.show_notification(notify_params(2));

        // The first timer fires late; the second notification owns the
        // popup now.
        state.auto_close_popup(first_popup.unwrap(), first_epoch);

        let (_, tracked) = state.session_snapshot();
        assert!(tracked.is_some());
    }

    #[test]
    fn badge_clear_honors_epoch() {
        let state = state_with(
            Arc::new(FakeWindows::default()),
            Arc::new(FakeTabs::default()),
        );

        state.show_notification(notify_params(1));
        let stale = state.badge_epoch_value();
        state.show_notification(notify_params(2));

        state.clear_badge(stale);
        assert_eq!(state.badge_snapshot().0, "✓");

        state.clear_badge(state.badge_epoch_value());
        assert_eq!(state.badge_snapshot().0, "");
    }

    #[test]
    fn popup_open_failure_leaves_nothing_tracked() {
        let windows = Arc::new(FakeWindows {
            fail_open: true,
            ..FakeWindows::default()
        });
        let state = state_with(Arc::clone(&windows), Arc::new(FakeTabs::default()));

        state.show_notification(notify_params(3));

        let (tab, popup) = state.session_snapshot();
        assert_eq!(tab, Some(TabId(3)));
        assert!(popup.is_none());
        // The record still persists: popup failure degrades silently.
        assert!(state.latest_record().is_some());
    }
}
