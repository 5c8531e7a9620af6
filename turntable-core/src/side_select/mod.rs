//! Persisted choice of which platter is the "main" table.
//!
//! The user holds the config button on the base together with the side-select
//! button on one platter. Once both have been held for the stable time (and
//! both platters are present) that platter becomes the main table and the
//! choice is written to the store. Writes are rate limited and only touch
//! the store when the value changes.

use core::fmt;

use crate::io::DigitalOutput;
use crate::led::LedHandler;
use crate::link::{DjFrame, TurntableState};
use crate::storage::{PersistentStore, StorageError};
use crate::timing::{HeldFor, Millis, RateLimiter};

/// Store address of the selection byte.
pub const CONFIG_ADDRESS: u16 = 508;

/// Smallest store any supported board provides.
pub const MIN_STORE_CAPACITY: usize = 512;

const _: () = assert!(CONFIG_ADDRESS != 0);
const _: () = assert!((CONFIG_ADDRESS as usize) < MIN_STORE_CAPACITY);

/// Confirmation blink after a successful write.
pub const CONFIRM_BLINK_HZ: f32 = 5.0;
pub const CONFIRM_BLINK_MS: Millis = 1_000;

/// Reads the config gesture button from the base.
pub type BaseInput = fn(&DjFrame) -> bool;
/// Reads the side-select button from one platter.
pub type SideInput = fn(&TurntableState) -> bool;

/// Encoded selection values. Only `Left` and `Right` are ever stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Selection {
    BaseOnly = 0,
    Left = 1,
    Right = 2,
}

impl Selection {
    #[must_use]
    pub const fn from_stored(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Selection::BaseOnly),
            1 => Some(Selection::Left),
            2 => Some(Selection::Right),
            _ => None,
        }
    }

    #[must_use]
    pub const fn side(self) -> Option<TableSide> {
        match self {
            Selection::Left => Some(TableSide::Left),
            Selection::Right => Some(TableSide::Right),
            Selection::BaseOnly => None,
        }
    }
}

/// A platter position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableSide {
    Left,
    #[default]
    Right,
}

impl TableSide {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            TableSide::Left => TableSide::Right,
            TableSide::Right => TableSide::Left,
        }
    }

    #[must_use]
    pub const fn selection(self) -> Selection {
        match self {
            TableSide::Left => Selection::Left,
            TableSide::Right => Selection::Right,
        }
    }

    /// The platter on this side of `frame`.
    #[must_use]
    pub const fn of(self, frame: &DjFrame) -> &TurntableState {
        match self {
            TableSide::Left => &frame.left,
            TableSide::Right => &frame.right,
        }
    }
}

impl fmt::Display for TableSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSide::Left => f.write_str("left"),
            TableSide::Right => f.write_str("right"),
        }
    }
}

/// Which platter plays the main role and which the alternate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoutingTable {
    main: TableSide,
}

impl RoutingTable {
    #[must_use]
    pub const fn new(main: TableSide) -> Self {
        Self { main }
    }

    pub fn resolve(&mut self, main: TableSide) {
        self.main = main;
    }

    #[must_use]
    pub const fn main(&self) -> TableSide {
        self.main
    }

    #[must_use]
    pub const fn alt(&self) -> TableSide {
        self.main.opposite()
    }

    #[must_use]
    pub const fn main_table<'a>(&self, frame: &'a DjFrame) -> &'a TurntableState {
        self.main.of(frame)
    }

    #[must_use]
    pub const fn alt_table<'a>(&self, frame: &'a DjFrame) -> &'a TurntableState {
        self.alt().of(frame)
    }
}

/// Result of loading the stored selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigLoad {
    pub main: TableSide,
    /// The stored byte was invalid and has been rewritten.
    pub repaired: bool,
}

/// Watches for the side-select gesture and owns the persisted selection.
pub struct TurntableConfig<S> {
    store: S,
    config_input: Option<BaseInput>,
    side_input: Option<SideInput>,
    stable_time: Millis,
    limiter: RateLimiter,
    config_held: HeldFor,
    left_held: HeldFor,
    right_held: HeldFor,
    current: TableSide,
}

impl<S: PersistentStore> TurntableConfig<S> {
    /// With either accessor `None` the gesture is disabled and
    /// [`check`](Self::check) never writes.
    #[must_use]
    pub const fn new(
        store: S,
        config_input: Option<BaseInput>,
        side_input: Option<SideInput>,
        stable_time: Millis,
    ) -> Self {
        Self {
            store,
            config_input,
            side_input,
            stable_time,
            limiter: RateLimiter::new(stable_time),
            config_held: HeldFor::new(true),
            left_held: HeldFor::new(true),
            right_held: HeldFor::new(true),
            current: TableSide::Right,
        }
    }

    /// Evaluates the gesture against a fresh report. Returns the side that
    /// was written, if any.
    ///
    /// # Errors
    ///
    /// Store failures from the write.
    pub fn check<P: DigitalOutput>(
        &mut self,
        now: Millis,
        frame: &DjFrame,
        routing: &mut RoutingTable,
        led: &mut LedHandler<P>,
    ) -> Result<Option<TableSide>, StorageError> {
        let (Some(config_input), Some(side_input)) = (self.config_input, self.side_input) else {
            return Ok(None);
        };

        let config_pressed = config_input(frame);
        let config_for = self.config_held.check(config_pressed, now);
        let left_for = self.left_held.check(side_input(&frame.left), now);
        let right_for = self.right_held.check(side_input(&frame.right), now);

        if !config_pressed || frame.turntable_count() < 2 {
            return Ok(None);
        }

        if config_for < self.stable_time {
            return Ok(None);
        }

        let chosen = if left_for >= self.stable_time {
            Selection::Left
        } else if right_for >= self.stable_time {
            Selection::Right
        } else {
            return Ok(None);
        };

        if !self.limiter.ready(now) {
            return Ok(None);
        }

        if self.write(chosen, now, routing, led)? {
            Ok(chosen.side())
        } else {
            Ok(None)
        }
    }

    /// Persists `selection` and makes it current. `BaseOnly` is refused.
    /// Blinks the LED to confirm.
    ///
    /// # Errors
    ///
    /// Store failures; the in-memory selection is left untouched.
    pub fn write<P: DigitalOutput>(
        &mut self,
        selection: Selection,
        now: Millis,
        routing: &mut RoutingTable,
        led: &mut LedHandler<P>,
    ) -> Result<bool, StorageError> {
        let Some(side) = selection.side() else {
            return Ok(false);
        };

        let written = self.store.update(CONFIG_ADDRESS, &[selection as u8])?;
        if written {
            info!("config: main table set to {}", side);
        }

        self.current = side;
        routing.resolve(side);
        led.blink(CONFIRM_BLINK_HZ, CONFIRM_BLINK_MS, now);
        Ok(true)
    }

    /// Loads the stored selection, rewriting anything invalid as `Right`.
    ///
    /// # Errors
    ///
    /// Store failures. Routing falls back to `Right` in memory first.
    pub fn read<P: DigitalOutput>(
        &mut self,
        now: Millis,
        routing: &mut RoutingTable,
        led: &mut LedHandler<P>,
    ) -> Result<ConfigLoad, StorageError> {
        let mut raw = [0u8];
        if let Err(err) = self.store.get(CONFIG_ADDRESS, &mut raw) {
            self.current = TableSide::Right;
            routing.resolve(self.current);
            return Err(err);
        }

        match Selection::from_stored(raw[0]).and_then(Selection::side) {
            Some(side) => {
                self.current = side;
                routing.resolve(side);
                Ok(ConfigLoad {
                    main: side,
                    repaired: false,
                })
            }
            None => {
                warn!("config: stored selection {} invalid, resetting", raw[0]);
                self.current = TableSide::Right;
                routing.resolve(self.current);
                self.write(Selection::Right, now, routing, led)?;
                Ok(ConfigLoad {
                    main: TableSide::Right,
                    repaired: true,
                })
            }
        }
    }

    #[must_use]
    pub const fn current(&self) -> TableSide {
        self.current
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config_input.is_some() && self.side_input.is_some()
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::NoopOutput;
    use crate::link::TurntableLayout;
    use crate::storage::MemoryStore;

    /// Holds an invalid selection and refuses every write.
    struct ReadOnlyStore;

    impl PersistentStore for ReadOnlyStore {
        fn capacity(&self) -> usize {
            MIN_STORE_CAPACITY
        }

        fn get(&mut self, _address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
            buf.fill(0x7E);
            Ok(())
        }

        fn put(&mut self, _address: u16, _data: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::Device)
        }
    }

    fn led() -> LedHandler<NoopOutput> {
        LedHandler::new(NoopOutput, false)
    }

    #[test]
    fn routing_follows_main() {
        let mut routing = RoutingTable::default();
        assert_eq!(routing.main(), TableSide::Right);
        assert_eq!(routing.alt(), TableSide::Left);
        routing.resolve(TableSide::Left);
        let mut frame = DjFrame::default();
        frame.left.speed = 4;
        assert_eq!(routing.main_table(&frame).speed, 4);
        assert_eq!(routing.alt_table(&frame).speed, 0);
    }

    #[test]
    fn base_only_write_is_refused() {
        let mut config = TurntableConfig::new(
            MemoryStore::<512>::new(),
            Some(DjFrame::euphoria_pressed as BaseInput),
            Some(TurntableState::blue_pressed as SideInput),
            1_000,
        );
        let mut routing = RoutingTable::default();
        let mut led = led();
        assert_eq!(
            config.write(Selection::BaseOnly, 0, &mut routing, &mut led),
            Ok(false)
        );
        assert_eq!(config.store().writes(), 0);
        assert!(!led.is_blinking());
    }

    #[test]
    fn disabled_gesture_never_writes() {
        let mut config = TurntableConfig::new(MemoryStore::<512>::new(), None, None, 10);
        let mut routing = RoutingTable::default();
        let mut led = led();
        let mut frame = DjFrame::default();
        frame.euphoria = true;
        frame.left.blue = true;
        frame.layout = TurntableLayout::Both;
        for now in 0..100 {
            assert_eq!(config.check(now, &frame, &mut routing, &mut led), Ok(None));
        }
        assert!(!config.is_enabled());
        assert_eq!(config.store().writes(), 0);
    }

    #[test]
    fn failed_repair_still_routes_to_right() {
        let mut config = TurntableConfig::new(ReadOnlyStore, None, None, 10);
        let mut routing = RoutingTable::new(TableSide::Left);
        let mut led = led();

        assert_eq!(
            config.read(0, &mut routing, &mut led),
            Err(StorageError::Device)
        );
        assert_eq!(config.current(), TableSide::Right);
        assert_eq!(routing.main(), TableSide::Right);
        assert_eq!(routing.alt(), TableSide::Left);
        assert!(!led.is_blinking(), "nothing was written to confirm");
    }
}
