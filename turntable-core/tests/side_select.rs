mod common;

use common::{
    MockLed, MockLink, MockPin, MockTransport, STORE_SIZE, adapter, both_tables, config_button,
    side_button,
};
use turntable_core::io::NoopOutput;
use turntable_core::led::LedHandler;
use turntable_core::link::{DjFrame, TurntableLayout};
use turntable_core::profile::AdapterConfig;
use turntable_core::side_select::{
    CONFIG_ADDRESS, RoutingTable, Selection, TableSide, TurntableConfig,
};
use turntable_core::storage::{MemoryStore, PersistentStore, StorageError};
use turntable_core::{Adapter, Millis};

const STABLE: Millis = 1_000;

fn config(store: MemoryStore<STORE_SIZE>) -> TurntableConfig<MemoryStore<STORE_SIZE>> {
    TurntableConfig::new(store, config_button(), side_button(), STABLE)
}

fn gesture(side: TableSide) -> DjFrame {
    let mut frame = both_tables();
    frame.euphoria = true;
    match side {
        TableSide::Left => frame.left.blue = true,
        TableSide::Right => frame.right.blue = true,
    }
    frame
}

fn stored(store: &mut MemoryStore<STORE_SIZE>) -> u8 {
    let mut raw = [0u8];
    store.get(CONFIG_ADDRESS, &mut raw).expect("in range");
    raw[0]
}

#[test]
fn gesture_commits_exactly_at_stable_time() {
    let mut config = config(MemoryStore::new());
    let mut routing = RoutingTable::default();
    let mut led = LedHandler::new(NoopOutput, false);
    let frame = gesture(TableSide::Left);

    let mut commits = Vec::new();
    for now in 0..=STABLE {
        if let Some(side) = config
            .check(now, &frame, &mut routing, &mut led)
            .expect("store ok")
        {
            commits.push((now, side));
        }
    }

    assert_eq!(commits, vec![(STABLE, TableSide::Left)]);
    assert_eq!(routing.main(), TableSide::Left);
    assert_eq!(routing.alt(), TableSide::Right);
    assert_eq!(config.store().writes(), 1);
    assert!(led.is_blinking(), "write is confirmed with a blink");
}

#[test]
fn long_hold_writes_once_per_window() {
    let mut config = config(MemoryStore::new());
    let mut routing = RoutingTable::default();
    let mut led = LedHandler::new(NoopOutput, false);
    let frame = gesture(TableSide::Left);

    let mut commits = 0;
    for now in 0..10 * STABLE {
        if config
            .check(now, &frame, &mut routing, &mut led)
            .expect("store ok")
            .is_some()
        {
            commits += 1;
        }
    }

    assert!(commits <= 10);
    assert_eq!(config.store().writes(), 1, "unchanged value is never rewritten");
}

#[test]
fn each_distinct_choice_is_written_once() {
    let mut config = config(MemoryStore::new());
    let mut routing = RoutingTable::default();
    let mut led = LedHandler::new(NoopOutput, false);
    let mut now = 0;

    for side in [TableSide::Left, TableSide::Right, TableSide::Left] {
        let frame = gesture(side);
        for _ in 0..=STABLE {
            config
                .check(now, &frame, &mut routing, &mut led)
                .expect("store ok");
            now += 1;
        }
        config
            .check(now, &both_tables(), &mut routing, &mut led)
            .expect("store ok");
        now += 1;
        assert_eq!(config.current(), side);
    }

    assert_eq!(config.store().writes(), 3);
    assert_eq!(stored(config.store_mut()), Selection::Left as u8);
}

#[test]
fn gesture_ignored_without_both_tables() {
    let mut routing = RoutingTable::default();
    let mut led = LedHandler::new(NoopOutput, false);

    for layout in [
        TurntableLayout::BaseOnly,
        TurntableLayout::Left,
        TurntableLayout::Right,
    ] {
        let mut config = config(MemoryStore::new());
        let mut frame = gesture(TableSide::Left);
        frame.layout = layout;
        for now in 0..3 * STABLE {
            assert_eq!(config.check(now, &frame, &mut routing, &mut led), Ok(None));
        }
        assert_eq!(config.store().writes(), 0);
    }
}

#[test]
fn releasing_the_side_button_restarts_its_timer() {
    let mut config = config(MemoryStore::new());
    let mut routing = RoutingTable::default();
    let mut led = LedHandler::new(NoopOutput, false);
    let held = gesture(TableSide::Right);
    let mut released = held;
    released.right.blue = false;

    for now in 0..900 {
        config.check(now, &held, &mut routing, &mut led).expect("store ok");
    }
    config.check(900, &released, &mut routing, &mut led).expect("store ok");
    for now in 901..1_800 {
        assert_eq!(config.check(now, &held, &mut routing, &mut led), Ok(None));
    }
    assert_eq!(
        config.check(1_901, &held, &mut routing, &mut led),
        Ok(Some(TableSide::Right))
    );
}

#[test]
fn invalid_stored_value_is_repaired_to_right() {
    let mut image = [0xFF; STORE_SIZE];
    image[usize::from(CONFIG_ADDRESS)] = 0x7E;
    let mut config = config(MemoryStore::from_image(image));
    let mut routing = RoutingTable::new(TableSide::Left);
    let mut led = LedHandler::new(NoopOutput, false);

    let load = config.read(0, &mut routing, &mut led).expect("store ok");
    assert!(load.repaired);
    assert_eq!(load.main, TableSide::Right);
    assert_eq!(routing.main(), TableSide::Right);
    assert_eq!(stored(config.store_mut()), Selection::Right as u8);

    let again = config.read(10, &mut routing, &mut led).expect("store ok");
    assert!(!again.repaired);
    assert_eq!(again.main, TableSide::Right);
}

#[test]
fn selection_survives_a_power_cycle() {
    let app_config = AdapterConfig::DEFAULT;
    let mut transport = MockTransport::default();
    let mut first = adapter(&app_config, MemoryStore::new());
    first.begin(0).expect("store ok");
    first.connection_mut().link_mut().frame = gesture(TableSide::Left);

    let mut committed = None;
    for now in 0..3_000 {
        let report = first.tick(now, &mut transport);
        if report.config_written.is_some() {
            committed = report.config_written;
            break;
        }
    }
    assert_eq!(committed, Some(TableSide::Left));

    let image = *first.side_config().store().image();
    let mut second = adapter(&app_config, MemoryStore::from_image(image));
    let load = second.begin(0).expect("store ok");
    assert!(!load.repaired);
    assert_eq!(second.routing().main(), TableSide::Left);
}

#[test]
fn gesture_commits_on_a_fresh_report() {
    let app_config = AdapterConfig::DEFAULT;
    let mut transport = MockTransport::default();
    let mut adapter = adapter(&app_config, MemoryStore::new());
    adapter.begin(0).expect("store ok");
    adapter.connection_mut().link_mut().frame = gesture(TableSide::Right);

    let commits: Vec<_> = (0..2_500)
        .map(|now| adapter.tick(now, &mut transport))
        .filter(|report| report.config_written.is_some())
        .collect();

    assert!(!commits.is_empty());
    assert!(commits.iter().all(|report| report.fresh));
}

/// Reads back a stored `Right` selection but cannot be written.
struct WornOutStore;

impl PersistentStore for WornOutStore {
    fn capacity(&self) -> usize {
        STORE_SIZE
    }

    fn get(&mut self, _address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        buf.fill(Selection::Right as u8);
        Ok(())
    }

    fn put(&mut self, _address: u16, _data: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Device)
    }
}

#[test]
fn failed_write_keeps_the_rest_of_the_tick() {
    let app_config = AdapterConfig::DEFAULT;
    let mut transport = MockTransport::default();
    let mut adapter: Adapter<MockLink, MockPin, MockLed, WornOutStore, 8> = Adapter::new(
        MockLink::healthy(),
        MockPin { level: true },
        LedHandler::new(MockLed::default(), false),
        TurntableConfig::new(
            WornOutStore,
            config_button(),
            side_button(),
            app_config.config_stable_time,
        ),
        &app_config,
    );
    adapter.begin(0).expect("store readable");
    adapter.connection_mut().link_mut().frame = gesture(TableSide::Left);

    let failed: Vec<_> = (0..2_500)
        .map(|now| adapter.tick(now, &mut transport))
        .filter(|report| report.store_error.is_some())
        .collect();

    assert!(!failed.is_empty(), "write was attempted");
    assert!(failed.iter().all(|report| report.fresh));
    assert!(failed.iter().all(|report| report.config_written.is_none()));
    assert_eq!(adapter.routing().main(), TableSide::Right, "selection unchanged");
    assert!(adapter.frame().is_some(), "link stays up");
}
