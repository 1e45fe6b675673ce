//! Idle detection for Linux using X11 XScreenSaver extension.

use std::time::Duration;
use x11rb::connection::Connection;
use x11rb::protocol::screensaver::{ConnectionExt as ScreensaverConnectionExt, State};
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use super::{IdleProbe, IdleSample};
use crate::error::SourceError;

/// Reads input idle time and saver state from the XScreenSaver extension.
pub struct ScreenSaverProbe {
    conn: RustConnection,
    root: Window,
}

impl ScreenSaverProbe {
    /// Connect and verify the XScreenSaver extension answers.
    pub fn new() -> Result<Self, SourceError> {
        let (conn, screen_num) = RustConnection::connect(None).map_err(|e| {
            SourceError::Unavailable(format!("cannot connect to X11 display ({}). Is DISPLAY set?", e))
        })?;

        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| SourceError::Unavailable(format!("X11 screen {} not found", screen_num)))?;

        conn.screensaver_query_info(root)
            .map_err(|e| SourceError::Unavailable(format!("XScreenSaver extension not available ({})", e)))?
            .reply()
            .map_err(|e| SourceError::Unavailable(format!("XScreenSaver query failed ({})", e)))?;

        Ok(Self { conn, root })
    }
}

impl IdleProbe for ScreenSaverProbe {
    fn sample(&self) -> Option<IdleSample> {
        let reply = self
            .conn
            .screensaver_query_info(self.root)
            .ok()?
            .reply()
            .ok()?;

        Some(IdleSample {
            input_idle: Duration::from_millis(u64::from(reply.ms_since_user_input)),
            screen_locked: reply.state == u8::from(State::ON),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires X11 display with XScreenSaver
    fn test_sample() {
        let probe = ScreenSaverProbe::new().unwrap();
        assert!(probe.sample().is_some());
    }
}
