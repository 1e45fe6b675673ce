//! Idle detection using IOKit HIDIdleTime for system-wide idle monitoring (macOS).

use core_foundation::base::TCFType;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use std::time::Duration;

use super::{IdleProbe, IdleSample};
use crate::error::SourceError;

/// Reads `HIDIdleTime` from the IOHIDSystem service.
pub struct HidIdleProbe;

impl HidIdleProbe {
    pub fn new() -> Result<Self, SourceError> {
        get_system_idle_time()
            .map(|_| Self)
            .ok_or_else(|| SourceError::Unavailable("IOHIDSystem HIDIdleTime not readable".to_string()))
    }
}

impl IdleProbe for HidIdleProbe {
    fn sample(&self) -> Option<IdleSample> {
        // Lock state is not exposed through IOKit; the input threshold covers it
        get_system_idle_time().map(|input_idle| IdleSample {
            input_idle,
            screen_locked: false,
        })
    }
}

/// Get the system idle time using IOKit HIDIdleTime.
fn get_system_idle_time() -> Option<Duration> {
    #[link(name = "IOKit", kind = "framework")]
    extern "C" {
        fn IOServiceGetMatchingService(
            main_port: u32,
            matching: core_foundation::base::CFTypeRef,
        ) -> u32;
        fn IOServiceMatching(name: *const std::os::raw::c_char) -> core_foundation::base::CFTypeRef;
        fn IORegistryEntryCreateCFProperty(
            entry: u32,
            key: core_foundation::string::CFStringRef,
            allocator: core_foundation::base::CFAllocatorRef,
            options: u32,
        ) -> core_foundation::base::CFTypeRef;
        fn IOObjectRelease(object: u32) -> i32;
    }

    unsafe {
        let service_name = std::ffi::CString::new("IOHIDSystem").ok()?;
        let matching = IOServiceMatching(service_name.as_ptr());
        if matching.is_null() {
            return None;
        }

        // Consumes the matching dictionary
        let service = IOServiceGetMatchingService(0, matching);
        if service == 0 {
            return None;
        }

        let key = CFString::new("HIDIdleTime");
        let property = IORegistryEntryCreateCFProperty(
            service,
            key.as_concrete_TypeRef(),
            std::ptr::null(),
            0,
        );

        IOObjectRelease(service);

        if property.is_null() {
            return None;
        }

        // Nanoseconds since last input
        let cf_number: CFNumber = CFNumber::wrap_under_create_rule(property as *mut _);
        let nanoseconds: i64 = cf_number.to_i64()?;

        Some(Duration::from_nanos(nanoseconds.max(0) as u64))
    }
}
