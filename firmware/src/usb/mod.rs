//! USB HID composite: one boot keyboard and one boot mouse interface.
//!
//! The adapter loop never touches endpoints. It pushes finished reports into
//! [`REPORT_QUEUE`] and the USB task drains them into the matching writer.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use turntable_core::hid::report::{
    HidReportState, KEYBOARD_REPORT_SIZE, KeyboardReport, MOUSE_REPORT_SIZE, MouseReport,
};

/// Largest report either interface sends.
pub const MAX_REPORT_SIZE: usize = 8;
const _: () = assert!(KEYBOARD_REPORT_SIZE <= MAX_REPORT_SIZE);
const _: () = assert!(MOUSE_REPORT_SIZE <= MAX_REPORT_SIZE);

pub const REPORT_QUEUE_DEPTH: usize = 16;

/// One report bound for the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HidFrame {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
}

impl HidFrame {
    /// Wire form; returns the bytes to send.
    pub fn encode<'a>(&self, buf: &'a mut [u8; MAX_REPORT_SIZE]) -> &'a [u8] {
        let len = match self {
            HidFrame::Keyboard(report) => report.serialize(buf),
            HidFrame::Mouse(report) => report.serialize(buf),
        };
        &buf[..len]
    }
}

pub type ReportQueue = Channel<CriticalSectionRawMutex, HidFrame, REPORT_QUEUE_DEPTH>;

pub static REPORT_QUEUE: ReportQueue = Channel::new();

/// Moves every pending report out of `state` into `queue`. Returns how many
/// were dropped because the queue was full.
pub fn flush_reports(state: &mut HidReportState, queue: &ReportQueue) -> u32 {
    let pending = [
        state.take_keyboard_report().map(HidFrame::Keyboard),
        state.take_mouse_report().map(HidFrame::Mouse),
    ];
    let mut dropped = 0;
    for frame in pending.into_iter().flatten() {
        if queue.try_send(frame).is_err() {
            dropped += 1;
        }
    }
    dropped
}

/// User-visible strings advertised in the USB descriptors.
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceStrings {
    pub manufacturer: &'static str,
    pub product: &'static str,
    pub serial_number: Option<&'static str>,
}

impl Default for UsbDeviceStrings {
    fn default() -> Self {
        Self {
            manufacturer: "Turntable HID",
            product: "Turntable Adapter",
            serial_number: None,
        }
    }
}

#[cfg(target_os = "none")]
pub use device::{UsbComposite, UsbDeviceStorage};

#[cfg(target_os = "none")]
mod device {
    use embassy_usb::class::hid::{
        Config as HidConfig, HidBootProtocol, HidSubclass, HidWriter, State,
    };
    use turntable_core::hid::report::{KEYBOARD_REPORT_DESCRIPTOR, MOUSE_REPORT_DESCRIPTOR};

    use super::{MAX_REPORT_SIZE, UsbDeviceStrings};
    use crate::status;

    pub const MAX_PACKET_SIZE: u8 = 64;
    const POLL_MS: u8 = 1;

    const CONTROL_BUFFER_LEN: usize = 64;
    const CONFIG_DESCRIPTOR_LEN: usize = 256;
    const BOS_DESCRIPTOR_LEN: usize = 256;
    const MSOS_DESCRIPTOR_LEN: usize = 256;

    /// Tracks host configuration so reports are only queued when they can
    /// be delivered.
    pub struct ConfiguredHandler;

    impl embassy_usb::Handler for ConfiguredHandler {
        fn reset(&mut self) {
            status::set_usb_configured(false);
        }

        fn configured(&mut self, configured: bool) {
            status::set_usb_configured(configured);
            defmt::info!("usb: configured={}", configured);
        }

        fn suspended(&mut self, suspended: bool) {
            if suspended {
                status::set_usb_configured(false);
            }
        }
    }

    /// Backing storage for the Embassy USB builder and HID classes.
    pub struct UsbDeviceStorage {
        control_buf: [u8; CONTROL_BUFFER_LEN],
        config_descriptor: [u8; CONFIG_DESCRIPTOR_LEN],
        bos_descriptor: [u8; BOS_DESCRIPTOR_LEN],
        msos_descriptor: [u8; MSOS_DESCRIPTOR_LEN],
        keyboard_state: State<'static>,
        mouse_state: State<'static>,
        handler: ConfiguredHandler,
    }

    impl UsbDeviceStorage {
        #[allow(clippy::new_without_default)]
        #[must_use]
        pub fn new() -> Self {
            Self {
                control_buf: [0; CONTROL_BUFFER_LEN],
                config_descriptor: [0; CONFIG_DESCRIPTOR_LEN],
                bos_descriptor: [0; BOS_DESCRIPTOR_LEN],
                msos_descriptor: [0; MSOS_DESCRIPTOR_LEN],
                keyboard_state: State::new(),
                mouse_state: State::new(),
                handler: ConfiguredHandler,
            }
        }
    }

    pub struct UsbComposite<D>
    where
        D: embassy_usb::driver::Driver<'static>,
    {
        pub device: embassy_usb::UsbDevice<'static, D>,
        pub keyboard: HidWriter<'static, D, MAX_REPORT_SIZE>,
        pub mouse: HidWriter<'static, D, MAX_REPORT_SIZE>,
    }

    impl<D> UsbComposite<D>
    where
        D: embassy_usb::driver::Driver<'static>,
    {
        pub fn new(
            driver: D,
            storage: &'static mut UsbDeviceStorage,
            strings: UsbDeviceStrings,
        ) -> Self {
            let mut config = embassy_usb::Config::new(0x1209, 0x0001);
            config.manufacturer = Some(strings.manufacturer);
            config.product = Some(strings.product);
            config.serial_number = strings.serial_number;
            config.max_packet_size_0 = MAX_PACKET_SIZE;
            config.max_power = 100;
            config.supports_remote_wakeup = true;

            let mut builder = embassy_usb::Builder::new(
                driver,
                config,
                &mut storage.config_descriptor,
                &mut storage.bos_descriptor,
                &mut storage.msos_descriptor,
                &mut storage.control_buf,
            );
            builder.handler(&mut storage.handler);

            let keyboard = HidWriter::new(
                &mut builder,
                &mut storage.keyboard_state,
                HidConfig {
                    report_descriptor: KEYBOARD_REPORT_DESCRIPTOR,
                    request_handler: None,
                    poll_ms: POLL_MS,
                    max_packet_size: 8,
                    hid_subclass: HidSubclass::Boot,
                    hid_boot_protocol: HidBootProtocol::Keyboard,
                },
            );
            let mouse = HidWriter::new(
                &mut builder,
                &mut storage.mouse_state,
                HidConfig {
                    report_descriptor: MOUSE_REPORT_DESCRIPTOR,
                    request_handler: None,
                    poll_ms: POLL_MS,
                    max_packet_size: 8,
                    hid_subclass: HidSubclass::Boot,
                    hid_boot_protocol: HidBootProtocol::Mouse,
                },
            );

            Self {
                device: builder.build(),
                keyboard,
                mouse,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turntable_core::hid::HidTransport;
    use turntable_core::hid::report::{keys, mouse};

    #[test]
    fn flush_moves_each_dirty_report_once() {
        let queue = ReportQueue::new();
        let mut state = HidReportState::new();
        state.press_key(keys::E);
        state.press_mouse_button(mouse::LEFT);

        assert_eq!(flush_reports(&mut state, &queue), 0);
        assert!(matches!(queue.try_receive(), Ok(HidFrame::Keyboard(_))));
        assert!(matches!(queue.try_receive(), Ok(HidFrame::Mouse(_))));
        assert!(queue.try_receive().is_err());

        assert_eq!(flush_reports(&mut state, &queue), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_counts_drops() {
        let queue = ReportQueue::new();
        let mut state = HidReportState::new();
        for _ in 0..REPORT_QUEUE_DEPTH {
            state.scroll(1);
            flush_reports(&mut state, &queue);
        }
        state.scroll(1);
        assert_eq!(flush_reports(&mut state, &queue), 1);
    }

    #[test]
    fn keyboard_frame_encodes_eight_bytes() {
        let mut buf = [0u8; MAX_REPORT_SIZE];
        let frame = HidFrame::Keyboard(KeyboardReport::default());
        assert_eq!(frame.encode(&mut buf).len(), KEYBOARD_REPORT_SIZE);
    }
}
