//! Idle detection for Windows using GetLastInputInfo Win32 API.

use std::time::Duration;
use windows::Win32::System::SystemInformation::GetTickCount;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

use super::{IdleProbe, IdleSample};
use crate::error::SourceError;

/// Reads the tick count of the last input event.
pub struct LastInputProbe;

impl LastInputProbe {
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self)
    }
}

impl IdleProbe for LastInputProbe {
    fn sample(&self) -> Option<IdleSample> {
        get_windows_idle_time().map(|input_idle| IdleSample {
            input_idle,
            screen_locked: false,
        })
    }
}

/// Get the system idle time using Windows GetLastInputInfo.
fn get_windows_idle_time() -> Option<Duration> {
    unsafe {
        let mut last_input = LASTINPUTINFO {
            cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };

        if GetLastInputInfo(&mut last_input).as_bool() {
            let current_tick = GetTickCount();
            let idle_ms = current_tick.wrapping_sub(last_input.dwTime);
            Some(Duration::from_millis(idle_ms as u64))
        } else {
            None
        }
    }
}
