//! Focused application on macOS via `NSWorkspace.frontmostApplication`.

use objc2_app_kit::NSWorkspace;

use super::{AppInfo, FocusEvent, FocusProbe};
use crate::error::SourceError;

/// Reads the frontmost application's bundle identifier.
pub struct WorkspaceProbe;

impl WorkspaceProbe {
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self)
    }
}

impl FocusProbe for WorkspaceProbe {
    fn focused_app(&self) -> FocusEvent {
        unsafe {
            let workspace = NSWorkspace::sharedWorkspace();
            let app = workspace.frontmostApplication()?;

            let name = app.localizedName().map(|name| name.to_string());
            // Bundle-less executables have no identifier; their name is the best key left
            let id = app
                .bundleIdentifier()
                .map(|id| id.to_string())
                .or_else(|| name.clone())?;

            Some(AppInfo {
                name: name.unwrap_or_else(|| id.clone()),
                id,
            })
        }
    }
}
