//! Focus-time accumulator: the ledger plus the timing state machine.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::ledger::{AppId, Ledger};

/// The single piece of mutable timing state besides the ledger.
///
/// An interval is open only in `Open`, i.e. when an app is focused and the
/// user is not idle.
#[derive(Debug, Clone, PartialEq)]
enum Cursor {
    /// Active, but no trackable application has focus.
    Untracked,
    /// Active with `app` focused since `since`.
    Open { app: AppId, since: DateTime<Utc> },
    /// Idle; remembers which app (if any) will resume when activity returns.
    Idle { app: Option<AppId> },
}

/// Accumulates wall-clock minutes per focused application.
#[derive(Debug)]
pub struct Accumulator<C: Clock = SystemClock> {
    clock: C,
    ledger: Ledger,
    cursor: Cursor,
}

impl Accumulator<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Accumulator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Accumulator<C> {
    /// Create an accumulator with an empty ledger and nothing tracked.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            ledger: Ledger::new(),
            cursor: Cursor::Untracked,
        }
    }

    /// The application currently holding focus, if known.
    pub fn current_app(&self) -> Option<&str> {
        match &self.cursor {
            Cursor::Untracked => None,
            Cursor::Open { app, .. } => Some(app),
            Cursor::Idle { app } => app.as_deref(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.cursor, Cursor::Idle { .. })
    }

    /// Close the current interval and start one for `new_app`.
    ///
    /// While idle only the remembered app changes.
    pub fn on_focus_changed(&mut self, new_app: Option<AppId>) {
        if let Cursor::Idle { app } = &mut self.cursor {
            debug!("Focus changed to {:?} while idle", new_app);
            *app = new_app;
            return;
        }

        let now = self.clock.now();
        self.flush(now);
        debug!("Focus changed to {:?}", new_app);
        self.cursor = open_at(new_app, now);
    }

    /// Suspend timing when the user goes idle, resume it when they return.
    pub fn on_idle_changed(&mut self, is_idle: bool) {
        if is_idle == self.is_idle() {
            return;
        }

        let now = self.clock.now();
        if is_idle {
            self.flush(now);
            let app = self.current_app().map(str::to_string);
            debug!("Idle started, suspending {:?}", app);
            self.cursor = Cursor::Idle { app };
        } else {
            let app = match &mut self.cursor {
                Cursor::Idle { app } => app.take(),
                Cursor::Untracked | Cursor::Open { .. } => None,
            };
            debug!("Activity resumed for {:?}", app);
            self.cursor = open_at(app, now);
        }
    }

    /// Commit elapsed time of the open interval and return a copy of the ledger.
    ///
    /// The interval stays open, re-based at the current instant.
    pub fn snapshot(&mut self) -> Ledger {
        let now = self.clock.now();
        self.flush(now);
        self.ledger.clone()
    }

    /// Empty the ledger and restart tracking from `focused`, not idle.
    pub fn reset(&mut self, focused: Option<AppId>) {
        let now = self.clock.now();
        self.ledger.clear();
        debug!("Ledger reset, now tracking {:?}", focused);
        self.cursor = open_at(focused, now);
    }

    /// Credit the open interval (if any) up to `now` and re-base it.
    fn flush(&mut self, now: DateTime<Utc>) {
        let Cursor::Open { app, since } = &mut self.cursor else {
            return;
        };

        let elapsed = now - *since;
        if elapsed < Duration::zero() {
            warn!(
                "Clock moved backwards by {}ms while tracking {}; ignoring span",
                -elapsed.num_milliseconds(),
                app
            );
        }
        self.ledger.credit(app, minutes_in(elapsed));
        *since = now;
    }
}

/// Exact length of `span` in minutes, negative spans count as zero.
fn minutes_in(span: Duration) -> f64 {
    if span <= Duration::zero() {
        return 0.0;
    }
    match span.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 60_000_000_000.0,
        // Only spans of centuries overflow nanoseconds
        None => span.num_milliseconds() as f64 / 60_000.0,
    }
}

fn open_at(app: Option<AppId>, now: DateTime<Utc>) -> Cursor {
    match app {
        Some(app) => Cursor::Open { app, since: now },
        None => Cursor::Untracked,
    }
}
