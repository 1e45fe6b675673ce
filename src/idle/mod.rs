//! Idle detection module with platform-specific implementations.

mod detector;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::IdleConfig;
use crate::error::SourceError;

pub use detector::IdleDetector;

/// User activity state.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityState {
    /// User is currently active.
    Active,
    /// User has been idle since the given time.
    Idle { since: DateTime<Utc> },
}

impl ActivityState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ActivityState::Idle { .. })
    }
}

/// One reading of the platform's idle indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleSample {
    /// Time since the last keyboard or pointer input.
    pub input_idle: Duration,
    /// Whether the screen saver or lock screen is showing.
    pub screen_locked: bool,
}

/// One synchronous query of the platform's idle indicators.
pub trait IdleProbe: Send + Sync + 'static {
    /// `None` when the platform could not be queried this time.
    fn sample(&self) -> Option<IdleSample>;
}

/// Anything that can report and broadcast idle transitions.
pub trait IdleSource: Send {
    fn current(&self) -> ActivityState;

    fn subscribe(&self) -> broadcast::Receiver<ActivityState>;

    /// Start delivering notifications. Calling it twice is harmless.
    fn start(&self) -> Result<(), SourceError>;

    /// Stop delivering notifications. Calling it twice is harmless.
    fn stop(&self);
}

/// Idle source that never reports idleness; used for focus-only tracking.
pub struct NeverIdle {
    state_tx: broadcast::Sender<ActivityState>,
}

impl NeverIdle {
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(1);
        Self { state_tx }
    }
}

impl Default for NeverIdle {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleSource for NeverIdle {
    fn current(&self) -> ActivityState {
        ActivityState::Active
    }

    fn subscribe(&self) -> broadcast::Receiver<ActivityState> {
        self.state_tx.subscribe()
    }

    fn start(&self) -> Result<(), SourceError> {
        Ok(())
    }

    fn stop(&self) {}
}

#[cfg(target_os = "linux")]
pub use linux::ScreenSaverProbe as NativeProbe;
#[cfg(target_os = "macos")]
pub use macos::HidIdleProbe as NativeProbe;
#[cfg(target_os = "windows")]
pub use windows::LastInputProbe as NativeProbe;

/// Placeholder for platforms without an idle probe.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub struct NativeProbe;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl NativeProbe {
    pub fn new() -> Result<Self, SourceError> {
        Err(SourceError::Unsupported)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl IdleProbe for NativeProbe {
    fn sample(&self) -> Option<IdleSample> {
        None
    }
}

/// Build the configured idle source, falling back to [`NeverIdle`].
pub fn open_source(config: &IdleConfig) -> Box<dyn IdleSource> {
    if !config.enabled {
        info!("Idle detection disabled, tracking focus only");
        return Box::new(NeverIdle::new());
    }

    match NativeProbe::new() {
        Ok(probe) => Box::new(IdleDetector::new(
            probe,
            config.threshold(),
            config.check_interval(),
        )),
        Err(e) => {
            warn!("Idle detection {}, tracking focus only", e);
            Box::new(NeverIdle::new())
        }
    }
}
