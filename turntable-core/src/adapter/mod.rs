//! Application root: owns every core component and runs one tick.
//!
//! Tick order is fixed. The connection step runs first and applies any
//! link-loss consequences (HID released, LED indication) before report data
//! is looked at. Effect and side-select handling only see reports fetched on
//! this very tick. The LED pattern advances last.

use core::fmt;

use crate::effect::EffectHandler;
use crate::hid::{HidRegistry, HidTransport};
use crate::io::{DigitalInput, DigitalOutput};
use crate::led::{BLINK_FOREVER, LedHandler};
use crate::link::{ConnectionHelper, ControllerLink, DjFrame, LinkHooks, LossReason, TurntableState};
use crate::profile::{AdapterConfig, DisconnectIndication};
use crate::side_select::{ConfigLoad, RoutingTable, TableSide, TurntableConfig};
use crate::storage::{PersistentStore, StorageError};
use crate::timing::Millis;

/// Connection transition observed during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    Up,
    /// Link dropped; `released` HID buttons were let go.
    Lost { reason: LossReason, released: usize },
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Up => f.write_str("controller connected"),
            LinkEvent::Lost { reason, released } => {
                write!(f, "controller lost ({reason}), released {released} buttons")
            }
        }
    }
}

/// What happened during one [`Adapter::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// A fresh report was fetched and processed.
    pub fresh: bool,
    pub link: Option<LinkEvent>,
    /// The side-select gesture committed this side.
    pub config_written: Option<TableSide>,
    /// The side-select write failed; the selection was not changed.
    pub store_error: Option<StorageError>,
}

/// Applies link transitions to the HID sink, effect tracker and LED.
struct Feedback<'a, P, T: ?Sized, const N: usize> {
    hid: &'a mut HidRegistry<N>,
    effects: &'a mut EffectHandler,
    led: &'a mut LedHandler<P>,
    transport: &'a mut T,
    indication: DisconnectIndication,
    event: Option<LinkEvent>,
}

impl<P: DigitalOutput, T: HidTransport + ?Sized, const N: usize> LinkHooks
    for Feedback<'_, P, T, N>
{
    fn link_up(&mut self, _now: Millis) {
        self.effects.resync();
        self.led.stop_blinking();
        self.led.write(true);
        self.event = Some(LinkEvent::Up);
    }

    fn link_lost(&mut self, reason: LossReason, now: Millis) {
        let released = self.hid.release_all(&mut *self.transport);
        self.effects.resync();
        show_disconnected(&mut *self.led, self.indication, now);
        self.event = Some(LinkEvent::Lost { reason, released });
    }
}

fn show_disconnected<P: DigitalOutput>(
    led: &mut LedHandler<P>,
    indication: DisconnectIndication,
    now: Millis,
) {
    led.write(false);
    match indication {
        DisconnectIndication::Off => led.stop_blinking(),
        DisconnectIndication::Blink { hz } => led.blink(f32::from(hz), BLINK_FOREVER, now),
    }
}

pub struct Adapter<L, D, P, S, const N: usize> {
    connection: ConnectionHelper<L, D>,
    effects: EffectHandler,
    side_config: TurntableConfig<S>,
    led: LedHandler<P>,
    hid: HidRegistry<N>,
    routing: RoutingTable,
    indication: DisconnectIndication,
}

impl<L, D, P, S, const N: usize> Adapter<L, D, P, S, N>
where
    L: ControllerLink,
    D: DigitalInput,
    P: DigitalOutput,
    S: PersistentStore,
{
    pub fn new(
        link: L,
        presence_pin: D,
        led: LedHandler<P>,
        side_config: TurntableConfig<S>,
        config: &AdapterConfig,
    ) -> Self {
        Self {
            connection: ConnectionHelper::new(link, presence_pin, config.connection),
            effects: EffectHandler::new(config.effect_idle_timeout),
            side_config,
            led,
            hid: HidRegistry::new(),
            routing: RoutingTable::default(),
            indication: config.disconnect_indication,
        }
    }

    /// Starts the link, shows the disconnected indication and loads the
    /// stored main-table selection.
    ///
    /// # Errors
    ///
    /// Store failures while loading; routing then stays on `Right`.
    pub fn begin(&mut self, now: Millis) -> Result<ConfigLoad, StorageError> {
        self.connection.begin();
        self.led.begin();
        show_disconnected(&mut self.led, self.indication, now);

        let loaded = self.side_config.read(now, &mut self.routing, &mut self.led)?;
        info!("adapter: main table {}", loaded.main);
        Ok(loaded)
    }

    /// Runs one control step.
    ///
    /// A failed side-select write is carried in
    /// [`TickReport::store_error`]; the rest of the tick still runs.
    pub fn tick<T: HidTransport + ?Sized>(&mut self, now: Millis, transport: &mut T) -> TickReport {
        let mut feedback = Feedback {
            hid: &mut self.hid,
            effects: &mut self.effects,
            led: &mut self.led,
            transport,
            indication: self.indication,
            event: None,
        };
        let fresh = self.connection.is_ready(now, &mut feedback);

        let mut report = TickReport {
            fresh,
            link: feedback.event,
            ..TickReport::default()
        };

        if fresh {
            let frame = self.connection.link().frame();
            self.effects.update(now, frame.effect_dial);
            match self
                .side_config
                .check(now, frame, &mut self.routing, &mut self.led)
            {
                Ok(side) => report.config_written = side,
                Err(err) => {
                    warn!("adapter: side selection not saved: {}", err);
                    report.store_error = Some(err);
                }
            }
        }

        let was_blinking = self.led.is_blinking();
        self.led.update(now);
        if was_blinking && !self.led.is_blinking() && !self.connection.connected() {
            // A timed blink ended while disconnected; go back to the indication.
            show_disconnected(&mut self.led, self.indication, now);
        }
        report
    }

    /// The latest report, while connected.
    #[must_use]
    pub fn frame(&self) -> Option<&DjFrame> {
        self.connection
            .connected()
            .then(|| self.connection.link().frame())
    }

    /// Main and alternate platters of the latest report, while connected.
    #[must_use]
    pub fn tables(&self) -> Option<(&TurntableState, &TurntableState)> {
        self.frame()
            .map(|frame| (self.routing.main_table(frame), self.routing.alt_table(frame)))
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.connected()
    }

    #[must_use]
    pub const fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    #[must_use]
    pub const fn effects(&self) -> &EffectHandler {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectHandler {
        &mut self.effects
    }

    #[must_use]
    pub const fn hid(&self) -> &HidRegistry<N> {
        &self.hid
    }

    pub fn hid_mut(&mut self) -> &mut HidRegistry<N> {
        &mut self.hid
    }

    #[must_use]
    pub const fn led(&self) -> &LedHandler<P> {
        &self.led
    }

    pub fn led_mut(&mut self) -> &mut LedHandler<P> {
        &mut self.led
    }

    #[must_use]
    pub const fn connection(&self) -> &ConnectionHelper<L, D> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionHelper<L, D> {
        &mut self.connection
    }

    #[must_use]
    pub const fn side_config(&self) -> &TurntableConfig<S> {
        &self.side_config
    }

    pub fn side_config_mut(&mut self) -> &mut TurntableConfig<S> {
        &mut self.side_config
    }
}
