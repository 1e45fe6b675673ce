//! Focused application on Linux via EWMH `_NET_ACTIVE_WINDOW` and `WM_CLASS`.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

use super::{AppInfo, FocusEvent, FocusProbe};
use crate::error::SourceError;

/// Reads the active window's `WM_CLASS` from the X server.
pub struct X11Probe {
    conn: RustConnection,
    root: Window,
    net_active_window: Atom,
}

impl X11Probe {
    /// Connect to the X server named by `DISPLAY`.
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

        let net_active_window = conn
            .intern_atom(false, b"_NET_ACTIVE_WINDOW")
            .map_err(|e| SourceError::Unavailable(e.to_string()))?
            .reply()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?
            .atom;

        Ok(Self {
            conn,
            root,
            net_active_window,
        })
    }

    fn active_window(&self) -> Option<Window> {
        let reply = self
            .conn
            .get_property(false, self.root, self.net_active_window, AtomEnum::WINDOW, 0, 1)
            .ok()?
            .reply()
            .ok()?;

        let window = reply.value32()?.next()?;
        (window != x11rb::NONE).then_some(window)
    }

    /// The class part of `WM_CLASS` ("instance\0class\0").
    fn window_class(&self, window: Window) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 256)
            .ok()?
            .reply()
            .ok()?;

        parse_wm_class(&reply.value)
    }
}

impl FocusProbe for X11Probe {
    fn focused_app(&self) -> FocusEvent {
        let window = self.active_window()?;
        let class = self.window_class(window)?;
        Some(AppInfo {
            id: class.to_lowercase(),
            name: class,
        })
    }
}

/// Prefer the class name, fall back to the instance name.
fn parse_wm_class(raw: &[u8]) -> Option<String> {
    let mut parts = raw
        .split(|b| *b == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned());

    let instance = parts.next()?;
    Some(parts.next().unwrap_or(instance))
}
