//! Boot-protocol keyboard and mouse reports built from press/release edges.
//!
//! Keyboard layout (8 bytes): modifier bitfield, reserved, six key slots.
//! Mouse layout (4 bytes): button bitfield, X, Y, wheel.

use super::HidTransport;

pub const KEYBOARD_REPORT_SIZE: usize = 8;
pub const MOUSE_REPORT_SIZE: usize = 4;

/// Mouse button bits for [`super::HidOutput::MouseButton`].
pub mod mouse {
    pub const LEFT: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const MIDDLE: u8 = 0x04;
}

/// Keyboard usage IDs (page 0x07) used by the default bindings.
pub mod keys {
    pub const A: u8 = 0x04;
    pub const D: u8 = 0x07;
    pub const E: u8 = 0x08;
    pub const F: u8 = 0x09;
    pub const Q: u8 = 0x14;
    pub const R: u8 = 0x15;
    pub const S: u8 = 0x16;
    pub const W: u8 = 0x1A;
    pub const NUM_1: u8 = 0x1E;
    pub const NUM_2: u8 = 0x1F;
    pub const ENTER: u8 = 0x28;
    pub const ESCAPE: u8 = 0x29;
    pub const TAB: u8 = 0x2B;
    pub const SPACE: u8 = 0x2C;
    pub const LEFT_CTRL: u8 = 0xE0;
    pub const LEFT_SHIFT: u8 = 0xE1;
    pub const LEFT_ALT: u8 = 0xE2;
}

const MODIFIER_FIRST: u8 = 0xE0;
const MODIFIER_LAST: u8 = 0xE7;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    pub modifier: u8,
    pub reserved: u8,
    pub keycodes: [u8; 6],
}

impl KeyboardReport {
    /// Writes the wire form into `buf`; returns bytes written (0 if too small).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < KEYBOARD_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.modifier;
        buf[1] = self.reserved;
        buf[2..KEYBOARD_REPORT_SIZE].copy_from_slice(&self.keycodes);
        KEYBOARD_REPORT_SIZE
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.keycodes.iter().all(|&k| k == 0)
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    pub wheel: i8,
}

impl MouseReport {
    /// Writes the wire form into `buf`; returns bytes written (0 if too small).
    #[allow(clippy::cast_sign_loss)]
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < MOUSE_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.buttons;
        buf[1] = self.x as u8;
        buf[2] = self.y as u8;
        buf[3] = self.wheel as u8;
        MOUSE_REPORT_SIZE
    }
}

/// Accumulates press/release edges into the next keyboard and mouse reports.
///
/// Each `take_*` returns a report only when something changed since the last
/// take. Keys beyond six simultaneous non-modifiers are dropped until a slot
/// frees up.
#[derive(Clone, Debug, Default)]
pub struct HidReportState {
    keyboard: KeyboardReport,
    keyboard_dirty: bool,
    mouse: MouseReport,
    mouse_dirty: bool,
}

impl HidReportState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keyboard: KeyboardReport {
                modifier: 0,
                reserved: 0,
                keycodes: [0; 6],
            },
            keyboard_dirty: false,
            mouse: MouseReport {
                buttons: 0,
                x: 0,
                y: 0,
                wheel: 0,
            },
            mouse_dirty: false,
        }
    }

    /// Queues wheel motion for the next mouse report.
    pub fn scroll(&mut self, amount: i8) {
        if amount != 0 {
            self.mouse.wheel = self.mouse.wheel.saturating_add(amount);
            self.mouse_dirty = true;
        }
    }

    pub fn take_keyboard_report(&mut self) -> Option<KeyboardReport> {
        if !self.keyboard_dirty {
            return None;
        }
        self.keyboard_dirty = false;
        Some(self.keyboard)
    }

    /// Returns the pending mouse report and clears its relative motion.
    pub fn take_mouse_report(&mut self) -> Option<MouseReport> {
        if !self.mouse_dirty {
            return None;
        }
        self.mouse_dirty = false;
        let report = self.mouse;
        self.mouse.x = 0;
        self.mouse.y = 0;
        self.mouse.wheel = 0;
        Some(report)
    }

    #[must_use]
    pub const fn keyboard(&self) -> &KeyboardReport {
        &self.keyboard
    }

    #[must_use]
    pub const fn mouse_buttons(&self) -> u8 {
        self.mouse.buttons
    }
}

impl HidTransport for HidReportState {
    fn press_key(&mut self, usage: u8) {
        if (MODIFIER_FIRST..=MODIFIER_LAST).contains(&usage) {
            self.keyboard.modifier |= 1 << (usage - MODIFIER_FIRST);
            self.keyboard_dirty = true;
            return;
        }

        if usage == 0 || self.keyboard.keycodes.contains(&usage) {
            return;
        }
        match self.keyboard.keycodes.iter_mut().find(|slot| **slot == 0) {
            Some(slot) => {
                *slot = usage;
                self.keyboard_dirty = true;
            }
            None => warn!("hid: key rollover exceeded, dropping usage {}", usage),
        }
    }

    fn release_key(&mut self, usage: u8) {
        if (MODIFIER_FIRST..=MODIFIER_LAST).contains(&usage) {
            self.keyboard.modifier &= !(1 << (usage - MODIFIER_FIRST));
            self.keyboard_dirty = true;
            return;
        }

        if let Some(index) = self.keyboard.keycodes.iter().position(|&k| k == usage) {
            // Keep occupied slots packed at the front.
            self.keyboard.keycodes.copy_within(index + 1.., index);
            self.keyboard.keycodes[5] = 0;
            self.keyboard_dirty = true;
        }
    }

    fn press_mouse_button(&mut self, mask: u8) {
        self.mouse.buttons |= mask;
        self.mouse_dirty = true;
    }

    fn release_mouse_button(&mut self, mask: u8) {
        self.mouse.buttons &= !mask;
        self.mouse_dirty = true;
    }
}

/// Boot keyboard with modifiers, LED output and six key slots.
pub const KEYBOARD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0, //   Usage Minimum (Left Control)
    0x29, 0xE7, //   Usage Maximum (Right GUI)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (Num Lock)
    0x29, 0x05, //   Usage Maximum (Kana)
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Constant)
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0xFF, //   Usage Maximum (255)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x00, //   Input (Data, Array)
    0xC0, // End Collection
];

/// Three-button mouse with X/Y and wheel.
pub const MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Buttons)
    0x19, 0x01, //     Usage Minimum (Button 1)
    0x29, 0x03, //     Usage Maximum (Button 3)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x05, //     Report Size (5)
    0x81, 0x01, //     Input (Constant)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x09, 0x38, //     Usage (Wheel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x03, //     Report Count (3)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0xC0, //   End Collection
    0xC0, // End Collection
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_fold_into_bitfield() {
        let mut state = HidReportState::new();
        state.press_key(keys::LEFT_SHIFT);
        state.press_key(keys::A);
        let report = state.take_keyboard_report().expect("dirty");
        assert_eq!(report.modifier, 0b0000_0010);
        assert_eq!(report.keycodes, [keys::A, 0, 0, 0, 0, 0]);
        assert!(state.take_keyboard_report().is_none());
    }

    #[test]
    fn release_compacts_key_slots() {
        let mut state = HidReportState::new();
        for key in [keys::Q, keys::W, keys::E] {
            state.press_key(key);
        }
        state.release_key(keys::Q);
        let report = state.take_keyboard_report().expect("dirty");
        assert_eq!(report.keycodes, [keys::W, keys::E, 0, 0, 0, 0]);
    }

    #[test]
    fn seventh_key_is_dropped() {
        let mut state = HidReportState::new();
        for key in 0x04..0x0B {
            state.press_key(key);
        }
        let report = state.take_keyboard_report().expect("dirty");
        assert_eq!(report.keycodes, [0x04, 0x05, 0x06, 0x07, 0x08, 0x09]);
    }

    #[test]
    fn mouse_buttons_and_wheel() {
        let mut state = HidReportState::new();
        state.press_mouse_button(mouse::LEFT);
        state.scroll(-3);
        let report = state.take_mouse_report().expect("dirty");
        assert_eq!(report.buttons, mouse::LEFT);
        assert_eq!(report.wheel, -3);

        let mut buf = [0u8; MOUSE_REPORT_SIZE];
        assert_eq!(report.serialize(&mut buf), MOUSE_REPORT_SIZE);
        assert_eq!(buf, [0x01, 0, 0, 0xFD]);

        state.release_mouse_button(mouse::LEFT);
        let report = state.take_mouse_report().expect("dirty");
        assert_eq!(report.buttons, 0);
        assert_eq!(report.wheel, 0);
    }

    #[test]
    fn short_buffers_are_refused() {
        let mut buf = [0u8; 4];
        assert_eq!(KeyboardReport::default().serialize(&mut buf), 0);
    }
}
