//! The watch loop: page events in, UI commands out.
//!
//! [`Watcher`] holds everything the agent knows about the page (latest
//! class-list snapshot, focus, visibility) plus the active
//! [`MonitoringSession`] and the feedback schedulers. It is driven entirely
//! by [`Watcher::handle_page`] / [`Watcher::handle_tab`] / [`Watcher::tick`]
//! with explicit clock readings, so the whole lifecycle runs in tests
//! without threads. [`run`] wires it to stdin/stdout, the reply socket, the
//! daemon client, and the audio cue.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use pagewatch_core::config::{self, WatchConfig};
use pagewatch_core::indicator::IndicatorRule;
use pagewatch_core::notify::{BannerTimer, FlashAction, NotifyPlan, TitleFlasher};
use pagewatch_core::session::{MonitoringSession, Tick};
use pagewatch_protocol::{PageEvent, PageSnapshot, TabRequest, UiCommand};

use crate::audio;
use crate::daemon_client;
use crate::reply_socket;

/// Sink for UI commands headed back to the page shim.
pub trait UiSink {
    fn send(&mut self, command: UiCommand);
}

/// Out-of-page feedback on completion (daemon message, sound).
pub trait Notifier {
    fn notify(&mut self, url: &str);
    fn play_sound(&mut self);
}

#[derive(Debug)]
pub enum Input {
    Page(PageEvent),
    Tab(TabRequest),
    Shutdown,
}

pub struct Watcher<S, N> {
    config: WatchConfig,
    rule: IndicatorRule,
    sink: S,
    notifier: N,
    url: String,
    snapshot: PageSnapshot,
    focused: bool,
    pending_start: Option<Instant>,
    session: Option<MonitoringSession>,
    banner: Option<BannerTimer>,
    flasher: Option<TitleFlasher>,
}

impl<S: UiSink, N: Notifier> Watcher<S, N> {
    pub fn new(config: WatchConfig, url: String, sink: S, notifier: N) -> Self {
        let rule = IndicatorRule::from_config(&config.indicator);
        Watcher {
            config,
            rule,
            sink,
            notifier,
            url,
            snapshot: PageSnapshot::default(),
            focused: true,
            pending_start: None,
            session: None,
            banner: None,
            flasher: None,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.session.is_some()
    }

    pub fn handle_page(&mut self, event: PageEvent, now: Instant) {
        match event {
            PageEvent::FormSubmit | PageEvent::ActionClick => self.arm_start(now),
            PageEvent::KeyDown {
                key,
                shift,
                in_text_input,
            } => {
                if key == "Enter" && !shift && in_text_input {
                    self.arm_start(now);
                }
            }
            PageEvent::Mutation { snapshot } => {
                self.snapshot = snapshot;
                if self.session.is_none() && self.rule.is_busy(&self.snapshot) {
                    debug!("Indicator revealed by mutation");
                    self.arm_start(now);
                }
            }
            PageEvent::Focus { focused } => {
                self.focused = focused;
                if focused {
                    self.dismiss_banner();
                    self.stop_flash();
                }
            }
            PageEvent::Visibility { visible } => {
                if visible {
                    self.dismiss_banner();
                }
            }
        }
    }

    pub fn handle_tab(&mut self, request: TabRequest, _now: Instant) {
        match request {
            TabRequest::TabFocused => self.dismiss_banner(),
            TabRequest::Activate => self.sink.send(UiCommand::Activate),
            // Answered at the socket layer; nothing to do here.
            TabRequest::CheckStatus => {}
        }
    }

    pub fn tick(&mut self, now: Instant) {
        // A pending trigger matures into a session once the page settled.
        if let Some(armed_at) = self.pending_start {
            if now.duration_since(armed_at) >= self.config.detector.settle_delay() {
                self.pending_start = None;
                if self.session.is_none() {
                    info!("Monitoring session started");
                    self.session = Some(MonitoringSession::new(now));
                }
            }
        }

        if let Some(session) = self.session.as_mut() {
            let visible = self.rule.is_busy(&self.snapshot);
            match session.tick(visible, now, &self.config.detector) {
                Tick::Continue => {}
                Tick::Complete => {
                    info!("Response complete");
                    self.session = None;
                    self.on_complete(now);
                }
                Tick::TimedOut => {
                    debug!("Monitoring session timed out");
                    self.session = None;
                }
            }
        }

        if let Some(flasher) = self.flasher.as_mut() {
            if let Some(action) = flasher.tick(now) {
                self.sink.send(flash_command(&self.config, action));
            }
            if flasher.is_done() {
                self.flasher = None;
            }
        }

        if let Some(banner) = self.banner {
            if banner.due(now) {
                self.dismiss_banner();
            }
        }
    }

    fn arm_start(&mut self, now: Instant) {
        // Idempotent: an active session or an already-armed trigger wins.
        if self.session.is_some() || self.pending_start.is_some() {
            return;
        }
        self.pending_start = Some(now);
    }

    fn on_complete(&mut self, now: Instant) {
        let plan = NotifyPlan::for_focus(self.focused, &self.config.notify);

        if plan.notify_daemon {
            self.notifier.notify(&self.url);
        }
        if plan.play_sound {
            self.notifier.play_sound();
        }
        if plan.flash_title {
            self.flasher = Some(TitleFlasher::new(now, &self.config.notify));
        }

        self.sink.send(UiCommand::ShowBanner {
            text: self.config.notify.banner_text.clone(),
        });
        self.banner = Some(BannerTimer::new(now, plan.banner_duration));
    }

    fn dismiss_banner(&mut self) {
        if self.banner.take().is_some() {
            self.sink.send(UiCommand::DismissBanner {
                fade_ms: self.config.notify.banner_fade_ms,
            });
        }
    }

    fn stop_flash(&mut self) {
        if let Some(mut flasher) = self.flasher.take() {
            if let Some(action) = flasher.stop() {
                self.sink.send(flash_command(&self.config, action));
            }
        }
    }
}

fn flash_command(config: &WatchConfig, action: FlashAction) -> UiCommand {
    match action {
        FlashAction::ShowFlash => UiCommand::SetTitle {
            title: config.notify.flash_text.clone(),
        },
        FlashAction::ShowOriginal | FlashAction::Restore => UiCommand::RestoreTitle,
    }
}

/// Writes UI commands as JSON lines on stdout for the page shim.
struct StdoutSink;

impl UiSink for StdoutSink {
    fn send(&mut self, command: UiCommand) {
        match serde_json::to_string(&command) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                if writeln!(stdout, "{}", line).and_then(|_| stdout.flush()).is_err() {
                    warn!("Failed to write UI command to stdout");
                }
            }
            Err(err) => warn!(error = %err, "Failed to serialize UI command"),
        }
    }
}

struct DaemonNotifier {
    tab_id: u64,
    config: WatchConfig,
}

impl Notifier for DaemonNotifier {
    fn notify(&mut self, url: &str) {
        if let Err(err) = daemon_client::show_notification(url, self.tab_id) {
            warn!(error = %err, "Failed to send notification to daemon");
        }
    }

    fn play_sound(&mut self) {
        if let Some(path) = self.config.notify.sound_path.clone() {
            audio::play_cue(path, self.config.notify.sound_max());
        }
    }
}

pub fn run(tab_id: u64, url: &str) -> Result<(), String> {
    let watch_config = load_config();
    let poll_interval = watch_config.detector.poll_interval();

    let (tx, rx) = mpsc::channel::<Input>();
    let monitoring = Arc::new(AtomicBool::new(false));

    let reply_socket = reply_socket::spawn(tab_id, tx.clone(), Arc::clone(&monitoring))?;
    spawn_stdin_reader(tx);

    match daemon_client::announce_ready(tab_id, &reply_socket) {
        Ok(()) => debug!(tab = tab_id, "Announced to daemon"),
        Err(err) => warn!(error = %err, "Daemon did not accept detector_ready"),
    }
    if let Some(level) = daemon_client::check_permission() {
        debug!(permission = %level, "Notification permission status");
    }

    let notifier = DaemonNotifier {
        tab_id,
        config: watch_config.clone(),
    };
    let mut watcher = Watcher::new(watch_config, url.to_string(), StdoutSink, notifier);

    let mut next_tick = Instant::now() + poll_interval;
    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(Input::Page(event)) => watcher.handle_page(event, Instant::now()),
            Ok(Input::Tab(request)) => watcher.handle_tab(request, Instant::now()),
            Ok(Input::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        // Tick on cadence even when page events keep the channel busy.
        let now = Instant::now();
        if now >= next_tick {
            watcher.tick(now);
            next_tick = now + poll_interval;
        }
        monitoring.store(watcher.is_monitoring(), Ordering::SeqCst);
    }

    info!("Page wire closed, agent exiting");
    Ok(())
}

fn load_config() -> WatchConfig {
    match config::config_path().and_then(|path| WatchConfig::load(&path)) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            WatchConfig::default()
        }
    }
}

fn spawn_stdin_reader(tx: Sender<Input>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "Failed to read page event");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PageEvent>(&line) {
                Ok(event) => {
                    if tx.send(Input::Page(event)).is_err() {
                        break;
                    }
                }
                Err(err) => debug!(error = %err, "Ignoring unparseable page event"),
            }
        }
        let _ = tx.send(Input::Shutdown);
    });
}
