//! Event adapter between focus/idle sources, the accumulator and the menu.

use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::accounting::{Accumulator, Clock, Ledger, SystemClock};
use crate::error::SourceError;
use crate::focus::{FocusEvent, FocusSource};
use crate::idle::{ActivityState, IdleSource, NeverIdle};
use crate::logging::Journal;
use crate::menu::{Presenter, UsageMenu};

/// Requests from the presentation side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Render the current usage menu.
    Show,
    /// Clear the usage history.
    Clear,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "s" | "show" => Ok(Command::Show),
            "c" | "clear" => Ok(Command::Clear),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}' (show, clear, quit)", other)),
        }
    }
}

/// Live subscriptions to both sources, handed out by [`Tracker::enable`].
pub struct Subscription {
    focus_rx: broadcast::Receiver<FocusEvent>,
    idle_rx: broadcast::Receiver<ActivityState>,
}

/// Feeds source notifications into an [`Accumulator`] and builds usage menus.
pub struct Tracker<C: Clock = SystemClock> {
    accumulator: Accumulator<C>,
    /// Latest display name seen for each application id.
    names: HashMap<String, String>,
    focus: Box<dyn FocusSource>,
    idle: Box<dyn IdleSource>,
    min_minutes: f64,
    journal: Option<Journal>,
    enabled: bool,
    /// Set once the focus subscription closes; its `current` is stale from then on.
    focus_closed: bool,
}

impl Tracker<SystemClock> {
    pub fn new(focus: Box<dyn FocusSource>, idle: Box<dyn IdleSource>, min_minutes: f64) -> Self {
        Self::with_clock(SystemClock, focus, idle, min_minutes)
    }
}

impl<C: Clock> Tracker<C> {
    pub fn with_clock(
        clock: C,
        focus: Box<dyn FocusSource>,
        idle: Box<dyn IdleSource>,
        min_minutes: f64,
    ) -> Self {
        Self {
            accumulator: Accumulator::with_clock(clock),
            names: HashMap::new(),
            focus,
            idle,
            min_minutes,
            journal: None,
            enabled: false,
            focus_closed: false,
        }
    }

    /// Record focus and idle events in `journal`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn current_app(&self) -> Option<&str> {
        self.accumulator.current_app()
    }

    pub fn is_idle(&self) -> bool {
        self.accumulator.is_idle()
    }

    /// Start both sources and subscribe to them.
    ///
    /// A failing idle source is replaced by [`NeverIdle`]; a failing focus
    /// source is an error since nothing could be accounted.
    pub fn enable(&mut self) -> Result<Subscription, SourceError> {
        // Subscribe first so no change between start and subscribe is lost
        let focus_rx = self.focus.subscribe();
        self.focus.start()?;

        let mut idle_rx = self.idle.subscribe();
        if let Err(e) = self.idle.start() {
            warn!("Idle source failed to start ({}), tracking focus only", e);
            self.idle = Box::new(NeverIdle::new());
            idle_rx = self.idle.subscribe();
        }

        self.enabled = true;
        self.focus_closed = false;
        info!("Tracking enabled");

        let focused = self.focus.current();
        self.handle_focus(focused);
        let state = self.idle.current();
        self.handle_idle(&state);

        Ok(Subscription { focus_rx, idle_rx })
    }

    /// Stop both sources. Safe to call repeatedly or before `enable`.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.focus.stop();
        self.idle.stop();
        info!("Tracking disabled");
    }

    /// Apply a focus notification.
    pub fn handle_focus(&mut self, event: FocusEvent) {
        let app_id = event.map(|app| {
            self.names.insert(app.id.clone(), app.name);
            app.id
        });

        if app_id.as_deref() == self.accumulator.current_app() {
            // Re-focusing the same app changes nothing worth journaling
            self.accumulator.on_focus_changed(app_id);
            return;
        }

        self.journal(|journal| journal.log_focus_change(app_id.as_deref()));
        self.accumulator.on_focus_changed(app_id);
    }

    /// Apply an idle notification.
    pub fn handle_idle(&mut self, state: &ActivityState) {
        let is_idle = state.is_idle();
        if is_idle == self.accumulator.is_idle() {
            return;
        }

        if is_idle {
            info!("User idle, pausing {:?}", self.accumulator.current_app());
            self.journal(|journal| journal.log_idle_start());
        } else {
            info!("User active, resuming {:?}", self.accumulator.current_app());
            self.journal(|journal| journal.log_idle_end());
        }
        self.accumulator.on_idle_changed(is_idle);
    }

    /// Flush the open interval and return the ledger.
    pub fn snapshot(&mut self) -> Ledger {
        self.accumulator.snapshot()
    }

    /// Take a fresh snapshot and turn it into menu rows.
    pub fn present(&mut self) -> UsageMenu {
        let ledger = self.accumulator.snapshot();
        UsageMenu::build(&ledger, &self.names, self.min_minutes)
    }

    /// Clear the usage history while keeping the focused app's clock running.
    pub fn clear(&mut self) {
        let focused = if self.focus_closed {
            None
        } else {
            self.focus.current().map(|app| {
                self.names.insert(app.id.clone(), app.name);
                app.id
            })
        };
        self.accumulator.reset(focused);
        self.journal(|journal| journal.log_reset());

        // Reset leaves the cursor active; respect an ongoing idle period
        if self.idle.current().is_idle() {
            self.accumulator.on_idle_changed(true);
        }
        info!("Usage history cleared");
    }

    /// Final snapshot, journaled, then tear down the sources.
    pub fn shutdown(&mut self) -> Ledger {
        let ledger = self.accumulator.snapshot();
        self.journal(|journal| journal.log_session_end(&ledger));
        self.disable();
        ledger
    }

    /// Process notifications and commands until `Quit` or the command
    /// channel closes, then disable the tracker.
    pub async fn run(
        &mut self,
        subscription: Subscription,
        mut commands: mpsc::Receiver<Command>,
        presenter: &mut dyn Presenter,
    ) {
        let Subscription {
            mut focus_rx,
            mut idle_rx,
        } = subscription;
        let mut focus_open = true;
        let mut idle_open = true;

        loop {
            tokio::select! {
                biased;

                received = focus_rx.recv(), if focus_open => match received {
                    Ok(event) => self.handle_focus(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {} focus changes, resynchronising", missed);
                        let current = self.focus.current();
                        self.handle_focus(current);
                    }
                    Err(RecvError::Closed) => {
                        warn!("Focus source closed, no application is tracked from now on");
                        focus_open = false;
                        self.focus_closed = true;
                        self.handle_focus(None);
                    }
                },
                received = idle_rx.recv(), if idle_open => match received {
                    Ok(state) => self.handle_idle(&state),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {} idle changes, resynchronising", missed);
                        let state = self.idle.current();
                        self.handle_idle(&state);
                    }
                    Err(RecvError::Closed) => {
                        warn!("Idle source closed, tracking focus only");
                        idle_open = false;
                        self.handle_idle(&ActivityState::Active);
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Show) => {
                        let menu = self.present();
                        if let Err(e) = presenter.render(&menu) {
                            warn!("Failed to render usage menu: {}", e);
                        }
                    }
                    Some(Command::Clear) => self.clear(),
                    Some(Command::Quit) | None => {
                        debug!("Stopping event loop");
                        break;
                    }
                },
            }
        }

        self.disable();
    }

    fn journal(&mut self, write: impl FnOnce(&mut Journal) -> anyhow::Result<()>) {
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = write(journal) {
                warn!("Failed to write journal: {:#}", e);
            }
        }
    }
}

impl<C: Clock> Drop for Tracker<C> {
    fn drop(&mut self) {
        self.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::ManualClock;
    use crate::focus::AppInfo;
    use crate::menu::{TextPresenter, EMPTY_PLACEHOLDER};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scriptable source shared between the test and the tracker.
    struct FakeInner<T> {
        tx: Mutex<Option<broadcast::Sender<T>>>,
        current: Mutex<T>,
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: AtomicBool,
    }

    struct FakeSource<T> {
        inner: Arc<FakeInner<T>>,
    }

    impl<T: Clone> FakeSource<T> {
        fn new(initial: T) -> Self {
            let (tx, _) = broadcast::channel(16);
            Self {
                inner: Arc::new(FakeInner {
                    tx: Mutex::new(Some(tx)),
                    current: Mutex::new(initial),
                    starts: AtomicUsize::new(0),
                    stops: AtomicUsize::new(0),
                    fail_start: AtomicBool::new(false),
                }),
            }
        }

        fn handle(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }

        fn set(&self, value: T) {
            *self.inner.current.lock().unwrap() = value;
        }

        fn emit(&self, value: T) {
            self.set(value.clone());
            if let Some(tx) = self.inner.tx.lock().unwrap().as_ref() {
                let _ = tx.send(value);
            }
        }

        fn close(&self) {
            self.inner.tx.lock().unwrap().take();
        }

        fn subscribe_inner(&self) -> broadcast::Receiver<T> {
            match self.inner.tx.lock().unwrap().as_ref() {
                Some(tx) => tx.subscribe(),
                None => broadcast::channel(1).1,
            }
        }

        fn start_inner(&self) -> Result<(), SourceError> {
            if self.inner.fail_start.load(Ordering::SeqCst) {
                return Err(SourceError::Unavailable("scripted failure".to_string()));
            }
            self.inner.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stops(&self) -> usize {
            self.inner.stops.load(Ordering::SeqCst)
        }
    }

    impl FocusSource for FakeSource<FocusEvent> {
        fn current(&self) -> FocusEvent {
            self.inner.current.lock().unwrap().clone()
        }
        fn subscribe(&self) -> broadcast::Receiver<FocusEvent> {
            self.subscribe_inner()
        }
        fn start(&self) -> Result<(), SourceError> {
            self.start_inner()
        }
        fn stop(&self) {
            self.inner.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl IdleSource for FakeSource<ActivityState> {
        fn current(&self) -> ActivityState {
            self.inner.current.lock().unwrap().clone()
        }
        fn subscribe(&self) -> broadcast::Receiver<ActivityState> {
            self.subscribe_inner()
        }
        fn start(&self) -> Result<(), SourceError> {
            self.start_inner()
        }
        fn stop(&self) {
            self.inner.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        clock: ManualClock,
        focus: FakeSource<FocusEvent>,
        idle: FakeSource<ActivityState>,
        tracker: Tracker<ManualClock>,
    }

    fn app(id: &str) -> FocusEvent {
        Some(AppInfo::new(id.to_lowercase(), id))
    }

    fn idle_now() -> ActivityState {
        ActivityState::Idle {
            since: chrono::Utc::now(),
        }
    }

    fn harness(initial: FocusEvent) -> Harness {
        let clock = ManualClock::new();
        let focus = FakeSource::new(initial);
        let idle = FakeSource::new(ActivityState::Active);
        let tracker = Tracker::with_clock(
            clock.clone(),
            Box::new(focus.handle()),
            Box::new(idle.handle()),
            1.0,
        );
        Harness {
            clock,
            focus,
            idle,
            tracker,
        }
    }

    fn minutes(ledger: &Ledger, id: &str) -> f64 {
        ledger.get(id).unwrap_or(0.0)
    }

    #[test]
    fn test_enable_seeds_current_focus() {
        let mut h = harness(app("Code"));
        let _sub = h.tracker.enable().unwrap();
        assert_eq!(h.tracker.current_app(), Some("code"));

        h.clock.advance_minutes(7);
        assert_eq!(minutes(&h.tracker.snapshot(), "code"), 7.0);
    }

    #[test]
    fn test_enable_applies_initial_idle() {
        let mut h = harness(app("Code"));
        h.idle.set(idle_now());
        let _sub = h.tracker.enable().unwrap();
        assert!(h.tracker.is_idle());

        h.clock.advance_minutes(7);
        assert!(h.tracker.snapshot().is_empty());
    }

    #[test]
    fn test_focus_source_failure_is_an_error() {
        let mut h = harness(None);
        h.focus.inner.fail_start.store(true, Ordering::SeqCst);
        assert!(h.tracker.enable().is_err());
    }

    #[test]
    fn test_idle_start_failure_degrades_to_focus_only() {
        let mut h = harness(app("Code"));
        h.idle.set(idle_now());
        h.idle.inner.fail_start.store(true, Ordering::SeqCst);

        let _sub = h.tracker.enable().unwrap();
        assert!(!h.tracker.is_idle());
        h.clock.advance_minutes(3);
        assert_eq!(minutes(&h.tracker.snapshot(), "code"), 3.0);
    }

    #[test]
    fn test_scenario_through_adapter() {
        let mut h = harness(app("A"));
        let _sub = h.tracker.enable().unwrap();

        h.clock.advance_minutes(10);
        h.tracker.handle_focus(app("B"));
        h.clock.advance_minutes(15);
        h.tracker.handle_idle(&idle_now());
        h.clock.advance_minutes(15);
        h.tracker.handle_idle(&ActivityState::Active);
        h.clock.advance_minutes(10);

        let ledger = h.tracker.snapshot();
        assert_eq!(minutes(&ledger, "a"), 10.0);
        assert_eq!(minutes(&ledger, "b"), 25.0);
    }

    #[test]
    fn test_unresolvable_focus_stops_the_clock() {
        let mut h = harness(app("A"));
        let _sub = h.tracker.enable().unwrap();

        h.clock.advance_minutes(4);
        h.tracker.handle_focus(None);
        h.clock.advance_minutes(20);

        let ledger = h.tracker.snapshot();
        assert_eq!(ledger.len(), 1);
        assert_eq!(minutes(&ledger, "a"), 4.0);
    }

    #[test]
    fn test_present_uses_display_names() {
        let mut h = harness(Some(AppInfo::new("org.mozilla.firefox", "Firefox")));
        let _sub = h.tracker.enable().unwrap();
        h.clock.advance_minutes(2);

        let UsageMenu::Usage { rows, total } = h.tracker.present() else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app_id, "org.mozilla.firefox");
        assert_eq!(rows[0].name, "Firefox");
        assert_eq!(total, "2 minutes");
    }

    #[test]
    fn test_clear_keeps_focused_app_running() {
        let mut h = harness(app("A"));
        let _sub = h.tracker.enable().unwrap();
        h.clock.advance_minutes(10);
        h.tracker.handle_focus(app("B"));
        h.focus.set(app("B"));
        h.clock.advance_minutes(10);

        h.tracker.clear();
        h.clock.advance_minutes(6);

        let ledger = h.tracker.snapshot();
        assert_eq!(ledger.len(), 1);
        assert_eq!(minutes(&ledger, "b"), 6.0);
    }

    #[test]
    fn test_clear_while_idle_keeps_excluding_idle_time() {
        let mut h = harness(app("A"));
        let _sub = h.tracker.enable().unwrap();
        h.clock.advance_minutes(5);
        h.idle.set(idle_now());
        h.tracker.handle_idle(&idle_now());

        h.tracker.clear();
        h.clock.advance_minutes(30);
        assert!(h.tracker.is_idle());
        assert_eq!(minutes(&h.tracker.snapshot(), "a"), 0.0);

        h.tracker.handle_idle(&ActivityState::Active);
        h.clock.advance_minutes(2);
        assert_eq!(minutes(&h.tracker.snapshot(), "a"), 2.0);
    }

    #[test]
    fn test_disable_is_idempotent() {
        let mut h = harness(None);
        h.tracker.disable();
        assert_eq!(h.focus.stops(), 0);

        let _sub = h.tracker.enable().unwrap();
        h.tracker.disable();
        h.tracker.disable();
        assert_eq!(h.focus.stops(), 1);
        assert_eq!(h.idle.stops(), 1);

        drop(h.tracker);
        assert_eq!(h.focus.stops(), 1);
    }

    #[test]
    fn test_run_applies_events_then_commands() {
        let mut h = harness(app("A"));
        let sub = h.tracker.enable().unwrap();
        h.clock.advance_minutes(5);
        h.focus.emit(app("B"));

        let (tx, rx) = mpsc::channel(8);
        tx.try_send(Command::Show).unwrap();
        tx.try_send(Command::Quit).unwrap();

        let mut presenter = TextPresenter::new(Vec::new());
        tokio_test::block_on(h.tracker.run(sub, rx, &mut presenter));

        let text = String::from_utf8(presenter.into_inner()).unwrap();
        assert!(text.starts_with("A "));
        assert!(text.contains("5 minutes"));
        assert_eq!(h.tracker.current_app(), Some("b"));
        assert_eq!(h.focus.stops(), 1);
        assert_eq!(h.idle.stops(), 1);
    }

    #[test]
    fn test_run_degrades_when_idle_source_closes() {
        let mut h = harness(app("A"));
        h.idle.set(idle_now());
        let sub = h.tracker.enable().unwrap();
        assert!(h.tracker.is_idle());
        h.idle.close();

        let (tx, rx) = mpsc::channel(8);
        tx.try_send(Command::Quit).unwrap();

        let mut presenter = TextPresenter::new(Vec::new());
        tokio_test::block_on(h.tracker.run(sub, rx, &mut presenter));

        assert!(!h.tracker.is_idle());
        h.clock.advance_minutes(3);
        assert_eq!(minutes(&h.tracker.snapshot(), "a"), 3.0);
    }

    #[test]
    fn test_run_clear_and_empty_menu() {
        let mut h = harness(None);
        let sub = h.tracker.enable().unwrap();
        h.tracker.handle_focus(app("A"));
        h.clock.advance_minutes(9);

        let (tx, rx) = mpsc::channel(8);
        tx.try_send(Command::Clear).unwrap();
        tx.try_send(Command::Show).unwrap();
        drop(tx);

        let mut presenter = TextPresenter::new(Vec::new());
        tokio_test::block_on(h.tracker.run(sub, rx, &mut presenter));

        let text = String::from_utf8(presenter.into_inner()).unwrap();
        assert_eq!(text.trim_end(), EMPTY_PLACEHOLDER);
    }

    #[test]
    fn test_shutdown_returns_final_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().to_path_buf()).unwrap();
        let mut h = harness(app("A"));
        h.tracker = Tracker::with_clock(
            h.clock.clone(),
            Box::new(h.focus.handle()),
            Box::new(h.idle.handle()),
            1.0,
        )
        .with_journal(journal);

        let _sub = h.tracker.enable().unwrap();
        h.clock.advance_minutes(12);
        let ledger = h.tracker.shutdown();

        assert_eq!(minutes(&ledger, "a"), 12.0);
        assert_eq!(h.focus.stops(), 1);
        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(written, 1);
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!("".parse::<Command>(), Ok(Command::Show));
        assert_eq!(" Show ".parse::<Command>(), Ok(Command::Show));
        assert_eq!("c".parse::<Command>(), Ok(Command::Clear));
        assert_eq!("QUIT".parse::<Command>(), Ok(Command::Quit));
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn test_clear_after_focus_source_closed_tracks_nothing() {
        let mut h = harness(app("A"));
        let sub = h.tracker.enable().unwrap();
        h.clock.advance_minutes(4);
        h.focus.close();

        let (tx, rx) = mpsc::channel(8);
        tx.try_send(Command::Clear).unwrap();
        tx.try_send(Command::Quit).unwrap();

        let mut presenter = TextPresenter::new(Vec::new());
        tokio_test::block_on(h.tracker.run(sub, rx, &mut presenter));

        assert_eq!(h.tracker.current_app(), None);
        h.clock.advance_minutes(10);
        assert!(h.tracker.snapshot().is_empty());
    }

    #[test]
    fn test_reenable_after_idle_run_counts_active_time() {
        use crate::idle::{IdleDetector, IdleProbe, IdleSample};
        use std::time::Duration;

        #[derive(Clone)]
        struct SharedProbe(Arc<Mutex<IdleSample>>);
        impl IdleProbe for SharedProbe {
            fn sample(&self) -> Option<IdleSample> {
                Some(*self.0.lock().unwrap())
            }
        }

        let idle_for = |secs| IdleSample {
            input_idle: Duration::from_secs(secs),
            screen_locked: false,
        };
        let probe = SharedProbe(Arc::new(Mutex::new(idle_for(600))));
        let detector = IdleDetector::new(
            probe.clone(),
            Duration::from_secs(60),
            Duration::from_millis(5),
        );

        let clock = ManualClock::new();
        let focus = FakeSource::new(app("A"));
        let mut tracker = Tracker::with_clock(
            clock.clone(),
            Box::new(focus.handle()),
            Box::new(detector),
            1.0,
        );

        let _sub = tracker.enable().unwrap();
        assert!(tracker.is_idle());
        tracker.disable();

        *probe.0.lock().unwrap() = idle_for(0);
        let _sub = tracker.enable().unwrap();
        assert!(!tracker.is_idle());

        clock.advance_minutes(3);
        assert_eq!(minutes(&tracker.snapshot(), "a"), 3.0);
    }
}
