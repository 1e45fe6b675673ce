//! Focused-application sources with platform-specific probes.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
mod watcher;
#[cfg(target_os = "windows")]
mod windows;

use tokio::sync::broadcast;

use crate::error::SourceError;

pub use watcher::FocusWatcher;

/// The application owning the focused window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Stable identifier used as the ledger key.
    pub id: String,
    /// Human-readable name for display only.
    pub name: String,
}

impl AppInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A focus notification: `None` means no trackable application has focus.
pub type FocusEvent = Option<AppInfo>;

/// Anything that can report and broadcast focus changes.
pub trait FocusSource: Send {
    /// The application focused right now, as last observed.
    fn current(&self) -> FocusEvent;

    /// Subscribe to focus changes.
    fn subscribe(&self) -> broadcast::Receiver<FocusEvent>;

    /// Start delivering notifications. Calling it twice is harmless.
    fn start(&self) -> Result<(), SourceError>;

    /// Stop delivering notifications. Calling it twice is harmless.
    fn stop(&self);
}

/// One synchronous query of the frontmost application.
pub trait FocusProbe: Send + Sync + 'static {
    fn focused_app(&self) -> FocusEvent;
}

#[cfg(target_os = "linux")]
pub use linux::X11Probe as NativeProbe;
#[cfg(target_os = "macos")]
pub use macos::WorkspaceProbe as NativeProbe;
#[cfg(target_os = "windows")]
pub use windows::ForegroundProbe as NativeProbe;

/// Placeholder for platforms without a focus probe.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub struct NativeProbe;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl NativeProbe {
    pub fn new() -> Result<Self, SourceError> {
        Err(SourceError::Unsupported)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl FocusProbe for NativeProbe {
    fn focused_app(&self) -> FocusEvent {
        None
    }
}

/// Create a focus watcher over the platform's native probe.
pub fn native_source(
    poll_interval: std::time::Duration,
) -> Result<FocusWatcher<NativeProbe>, SourceError> {
    let probe = NativeProbe::new()?;
    Ok(FocusWatcher::new(probe, poll_interval))
}
