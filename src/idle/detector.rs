//! Threshold-based idle detector polling an [`IdleProbe`].

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{ActivityState, IdleProbe, IdleSample, IdleSource};
use crate::error::SourceError;

/// Shared state for idle detection.
struct IdleState {
    /// Whether the detector is running.
    running: AtomicBool,
    /// Bumped on every start; a checker thread exits once it is outdated.
    generation: AtomicU64,
    /// Current idle state.
    is_idle: AtomicBool,
    /// Start of the current idle period (Unix epoch milliseconds).
    idle_since_ms: AtomicI64,
}

impl IdleState {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            is_idle: AtomicBool::new(false),
            idle_since_ms: AtomicI64::new(0),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply a sample, broadcasting if it is a transition.
    fn apply(
        &self,
        sample: &IdleSample,
        threshold: Duration,
        state_tx: &broadcast::Sender<ActivityState>,
    ) {
        let is_now_idle = is_idle(sample, threshold);
        if self.is_idle.load(Ordering::SeqCst) == is_now_idle {
            return;
        }

        let new_state = if is_now_idle {
            let since = Utc::now() - chrono::Duration::from_std(sample.input_idle).unwrap_or_default();
            self.idle_since_ms.store(since.timestamp_millis(), Ordering::SeqCst);
            debug!(
                "User became idle (input idle for {:?}, locked: {})",
                sample.input_idle, sample.screen_locked
            );
            ActivityState::Idle { since }
        } else {
            debug!("User became active");
            ActivityState::Active
        };

        // Another checker may have raced us to the same transition
        if self.is_idle.swap(is_now_idle, Ordering::SeqCst) == is_now_idle {
            return;
        }
        let _ = state_tx.send(new_state);
    }
}

/// Idle detector: the user is idle while the screen is locked or input has
/// been quiet for at least the threshold.
pub struct IdleDetector<P: IdleProbe> {
    /// Idle threshold duration.
    threshold: Duration,
    /// Delay between probe queries.
    check_interval: Duration,
    /// Platform probe.
    probe: Arc<P>,
    /// Shared state.
    state: Arc<IdleState>,
    /// Broadcast sender for state changes.
    state_tx: broadcast::Sender<ActivityState>,
}

impl<P: IdleProbe> IdleDetector<P> {
    /// Create a new idle detector with the given threshold.
    pub fn new(probe: P, threshold: Duration, check_interval: Duration) -> Self {
        let (state_tx, _) = broadcast::channel(16);

        Self {
            threshold,
            check_interval,
            probe: Arc::new(probe),
            state: Arc::new(IdleState::new()),
            state_tx,
        }
    }
}

impl<P: IdleProbe> IdleSource for IdleDetector<P> {
    fn current(&self) -> ActivityState {
        if self.state.is_idle.load(Ordering::SeqCst) {
            let since_ms = self.state.idle_since_ms.load(Ordering::SeqCst);
            let since = DateTime::from_timestamp_millis(since_ms).unwrap_or_else(Utc::now);
            ActivityState::Idle { since }
        } else {
            ActivityState::Active
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ActivityState> {
        self.state_tx.subscribe()
    }

    fn start(&self) -> Result<(), SourceError> {
        if self.state.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Starting idle detector with threshold {:?}", self.threshold);
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // State may be stale from an earlier run; refresh before anyone reads it
        if let Some(sample) = self.probe.sample() {
            self.state.apply(&sample, self.threshold, &self.state_tx);
        }

        let probe = Arc::clone(&self.probe);
        let state = Arc::clone(&self.state);
        let threshold = self.threshold;
        let check_interval = self.check_interval;
        let state_tx = self.state_tx.clone();
        let spawned = thread::Builder::new()
            .name("idle-checker".to_string())
            .spawn(move || {
                run_idle_checker(probe, state, generation, threshold, check_interval, state_tx);
            });

        if let Err(e) = spawned {
            self.state.running.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }

    fn stop(&self) {
        if self.state.running.swap(false, Ordering::SeqCst) {
            info!("Idle detector stopped");
        }
    }
}

impl<P: IdleProbe> Drop for IdleDetector<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_idle(sample: &IdleSample, threshold: Duration) -> bool {
    sample.screen_locked || sample.input_idle >= threshold
}

/// Run the idle state checker thread until stopped or restarted.
fn run_idle_checker<P: IdleProbe>(
    probe: Arc<P>,
    state: Arc<IdleState>,
    generation: u64,
    threshold: Duration,
    check_interval: Duration,
    state_tx: broadcast::Sender<ActivityState>,
) {
    let mut probe_failing = false;

    while state.is_current(generation) {
        thread::sleep(check_interval);
        if !state.is_current(generation) {
            break;
        }

        let Some(sample) = probe.sample() else {
            if !probe_failing {
                warn!("Failed to query idle state, keeping previous state");
                probe_failing = true;
            }
            continue;
        };
        probe_failing = false;

        state.apply(&sample, threshold, &state_tx);
    }

    debug!("Idle checker thread exiting");
}
