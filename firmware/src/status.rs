#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Flags shared between the adapter loop and the USB task.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Host has configured the USB device.
static USB_CONFIGURED: AtomicBool = AtomicBool::new(false);
/// HID reports dropped because the queue was full.
static DROPPED_REPORTS: AtomicU32 = AtomicU32::new(0);

pub fn set_usb_configured(configured: bool) {
    USB_CONFIGURED.store(configured, Ordering::Relaxed);
}

pub fn usb_configured() -> bool {
    USB_CONFIGURED.load(Ordering::Relaxed)
}

/// Adds `count` dropped reports and returns the running total.
pub fn record_dropped_reports(count: u32) -> u32 {
    DROPPED_REPORTS
        .fetch_add(count, Ordering::Relaxed)
        .wrapping_add(count)
}
