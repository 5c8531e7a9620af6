#![allow(dead_code)]

use heapless::Vec as HeaplessVec;
use turntable_core::hid::HidTransport;
use turntable_core::io::{DigitalInput, DigitalOutput};
use turntable_core::led::LedHandler;
use turntable_core::link::{ControllerLink, DjFrame, TurntableLayout};
use turntable_core::profile::AdapterConfig;
use turntable_core::side_select::{BaseInput, SideInput, TurntableConfig};
use turntable_core::storage::MemoryStore;
use turntable_core::{Adapter, Millis};

pub const STORE_SIZE: usize = 512;

/// Controller stand-in whose answers are set by the test.
#[derive(Default)]
pub struct MockLink {
    pub frame: DjFrame,
    pub accept_connect: bool,
    pub accept_update: bool,
    pub connects: usize,
    pub updates: usize,
}

impl MockLink {
    pub fn healthy() -> Self {
        Self {
            accept_connect: true,
            accept_update: true,
            ..Self::default()
        }
    }
}

impl ControllerLink for MockLink {
    fn connect(&mut self) -> bool {
        self.connects += 1;
        self.accept_connect
    }

    fn update(&mut self) -> bool {
        self.updates += 1;
        self.accept_update
    }

    fn frame(&self) -> &DjFrame {
        &self.frame
    }
}

pub struct MockPin {
    pub level: bool,
}

impl DigitalInput for MockPin {
    fn read(&mut self) -> bool {
        self.level
    }
}

#[derive(Default)]
pub struct MockLed {
    pub level: bool,
}

impl DigitalOutput for MockLed {
    fn write(&mut self, high: bool) {
        self.level = high;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HidEvent {
    KeyDown(u8),
    KeyUp(u8),
    MouseDown(u8),
    MouseUp(u8),
}

#[derive(Default)]
pub struct MockTransport {
    pub events: HeaplessVec<HidEvent, 64>,
}

impl MockTransport {
    fn record(&mut self, event: HidEvent) {
        self.events.push(event).expect("transport log overflow");
    }
}

impl HidTransport for MockTransport {
    fn press_key(&mut self, usage: u8) {
        self.record(HidEvent::KeyDown(usage));
    }

    fn release_key(&mut self, usage: u8) {
        self.record(HidEvent::KeyUp(usage));
    }

    fn press_mouse_button(&mut self, mask: u8) {
        self.record(HidEvent::MouseDown(mask));
    }

    fn release_mouse_button(&mut self, mask: u8) {
        self.record(HidEvent::MouseUp(mask));
    }
}

pub type TestAdapter = Adapter<MockLink, MockPin, MockLed, MemoryStore<STORE_SIZE>, 8>;

pub fn config_button() -> Option<BaseInput> {
    Some(DjFrame::euphoria_pressed)
}

pub fn side_button() -> Option<SideInput> {
    Some(turntable_core::link::TurntableState::blue_pressed)
}

pub fn adapter(config: &AdapterConfig, store: MemoryStore<STORE_SIZE>) -> TestAdapter {
    Adapter::new(
        MockLink::healthy(),
        MockPin { level: true },
        LedHandler::new(MockLed::default(), false),
        TurntableConfig::new(
            store,
            config_button(),
            side_button(),
            config.config_stable_time,
        ),
        config,
    )
}

/// Frame with both platters present and nothing pressed.
pub fn both_tables() -> DjFrame {
    DjFrame {
        layout: TurntableLayout::Both,
        ..DjFrame::default()
    }
}

/// Ticks once per millisecond over `range`, returning every report.
pub fn run(
    adapter: &mut TestAdapter,
    transport: &mut MockTransport,
    range: core::ops::Range<Millis>,
) -> Vec<(Millis, turntable_core::TickReport)> {
    range
        .map(|now| {
            let report = adapter.tick(now, transport);
            assert_eq!(report.store_error, None, "store failed at {now}");
            (now, report)
        })
        .collect()
}
