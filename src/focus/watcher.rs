//! Polling focus watcher that broadcasts only actual changes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{FocusEvent, FocusProbe, FocusSource};
use crate::error::SourceError;

/// Shared state between the watcher and its polling thread.
struct WatchState {
    /// Whether the polling thread should keep running.
    running: AtomicBool,
    /// Bumped on every start; a polling thread exits once it is outdated.
    generation: AtomicU64,
    /// Last application observed by the probe.
    current: Mutex<FocusEvent>,
}

impl WatchState {
    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn current(&self) -> FocusEvent {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record `next`; returns true when it differs from what was focused.
    fn replace(&self, next: &FocusEvent) -> bool {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if same_app(&current, next) {
            return false;
        }
        *current = next.clone();
        true
    }
}

/// Focus source that polls a [`FocusProbe`] on a background thread.
pub struct FocusWatcher<P: FocusProbe> {
    /// Delay between probe queries.
    poll_interval: Duration,
    /// Platform probe.
    probe: Arc<P>,
    /// Shared state.
    state: Arc<WatchState>,
    /// Broadcast sender for focus changes.
    focus_tx: broadcast::Sender<FocusEvent>,
}

impl<P: FocusProbe> FocusWatcher<P> {
    /// Create a watcher, reading the initially focused application.
    pub fn new(probe: P, poll_interval: Duration) -> Self {
        let (focus_tx, _) = broadcast::channel(64);
        let initial = probe.focused_app();

        Self {
            poll_interval,
            probe: Arc::new(probe),
            state: Arc::new(WatchState {
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                current: Mutex::new(initial),
            }),
            focus_tx,
        }
    }
}

impl<P: FocusProbe> FocusSource for FocusWatcher<P> {
    fn current(&self) -> FocusEvent {
        self.state.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<FocusEvent> {
        self.focus_tx.subscribe()
    }

    fn start(&self) -> Result<(), SourceError> {
        if self.state.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Starting focus watcher, polling every {:?}", self.poll_interval);
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let probe = Arc::clone(&self.probe);
        let state = Arc::clone(&self.state);
        let poll_interval = self.poll_interval;
        let focus_tx = self.focus_tx.clone();
        let spawned = thread::Builder::new()
            .name("focus-watcher".to_string())
            .spawn(move || {
                run_focus_watcher(probe, state, generation, poll_interval, focus_tx);
            });

        if let Err(e) = spawned {
            self.state.running.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }

    fn stop(&self) {
        if self.state.running.swap(false, Ordering::SeqCst) {
            info!("Focus watcher stopped");
        }
    }
}

impl<P: FocusProbe> Drop for FocusWatcher<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn same_app(a: &FocusEvent, b: &FocusEvent) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.id == b.id,
        (None, None) => true,
        _ => false,
    }
}

/// Poll the probe until stopped or restarted, broadcasting every change of
/// application.
fn run_focus_watcher<P: FocusProbe>(
    probe: Arc<P>,
    state: Arc<WatchState>,
    generation: u64,
    poll_interval: Duration,
    focus_tx: broadcast::Sender<FocusEvent>,
) {
    while state.is_current(generation) {
        thread::sleep(poll_interval);
        if !state.is_current(generation) {
            break;
        }

        let focused = probe.focused_app();
        if state.replace(&focused) {
            debug!(
                "Focus moved to {}",
                focused.as_ref().map_or("<none>", |app| app.id.as_str())
            );
            // No subscribers is not an error
            let _ = focus_tx.send(focused);
        }
    }

    debug!("Focus watcher thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::AppInfo;
    use std::collections::VecDeque;

    /// Probe that replays a script, then repeats the last answer.
    struct ScriptedProbe {
        script: Mutex<VecDeque<FocusEvent>>,
        last: Mutex<FocusEvent>,
    }

    impl ScriptedProbe {
        fn new(script: Vec<FocusEvent>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
            }
        }
    }

    impl FocusProbe for ScriptedProbe {
        fn focused_app(&self) -> FocusEvent {
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                *last = next;
            }
            last.clone()
        }
    }

    fn app(id: &str) -> FocusEvent {
        Some(AppInfo::new(id, id.to_uppercase()))
    }

    #[test]
    fn test_initial_focus_is_read_on_creation() {
        let watcher = FocusWatcher::new(
            ScriptedProbe::new(vec![app("term")]),
            Duration::from_millis(5),
        );
        assert_eq!(watcher.current(), app("term"));
    }

    #[test]
    fn test_broadcasts_only_changes() {
        let probe = ScriptedProbe::new(vec![
            app("term"),
            app("term"),
            Some(AppInfo::new("term", "Renamed Terminal")),
            app("code"),
            app("code"),
            None,
        ]);
        let watcher = FocusWatcher::new(probe, Duration::from_millis(1));
        let mut rx = watcher.subscribe();
        watcher.start().unwrap();

        assert_eq!(rx.blocking_recv().unwrap(), app("code"));
        assert_eq!(rx.blocking_recv().unwrap(), None);

        watcher.stop();
        assert_eq!(watcher.current(), None);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let watcher = FocusWatcher::new(ScriptedProbe::new(vec![]), Duration::from_millis(1));
        watcher.stop();
        watcher.start().unwrap();
        watcher.start().unwrap();
        watcher.stop();
        watcher.stop();
    }

    #[test]
    fn test_restart_retires_previous_poller() {
        use std::sync::atomic::AtomicUsize;

        struct CountingProbe(Arc<AtomicUsize>);
        impl FocusProbe for CountingProbe {
            fn focused_app(&self) -> FocusEvent {
                self.0.fetch_add(1, Ordering::SeqCst);
                None
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let watcher = FocusWatcher::new(CountingProbe(Arc::clone(&calls)), Duration::from_millis(20));
        for _ in 0..5 {
            watcher.start().unwrap();
            watcher.stop();
        }
        watcher.start().unwrap();

        thread::sleep(Duration::from_millis(50));
        calls.store(0, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));
        watcher.stop();

        // One poller makes about 10 calls in 200ms; six would make ~60
        let polled = calls.load(Ordering::SeqCst);
        assert!(polled <= 15, "polled {polled} times");
    }
}
