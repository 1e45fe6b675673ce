//! Focused application on Windows via the foreground window's owning process.

use std::path::Path;
use windows::core::PWSTR;
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

use super::{AppInfo, FocusEvent, FocusProbe};
use crate::error::SourceError;

/// Resolves the foreground window to its executable.
pub struct ForegroundProbe;

impl ForegroundProbe {
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self)
    }
}

impl FocusProbe for ForegroundProbe {
    fn focused_app(&self) -> FocusEvent {
        let pid = unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.0.is_null() {
                return None;
            }
            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
            pid
        };
        if pid == 0 {
            return None;
        }

        let image = process_image_path(pid)?;
        let path = Path::new(&image);
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());

        Some(AppInfo {
            id: file_name.to_lowercase(),
            name,
        })
    }
}

fn process_image_path(pid: u32) -> Option<String> {
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
        let mut buf = [0u16; 1024];
        let mut size = buf.len() as u32;
        let queried = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            PWSTR(buf.as_mut_ptr()),
            &mut size,
        );
        let _ = CloseHandle(handle);
        queried.ok()?;
        Some(String::from_utf16_lossy(&buf[..size as usize]))
    }
}
