//! Button table: which controller input drives which host button.
//!
//! Main-table buttons go to the mouse, alternate-table buttons and base
//! inputs go to the keyboard. The stick is folded into WASD and effect dial
//! motion becomes wheel steps.

use crate::adapter::Adapter;
use crate::effect::EffectHandler;
use crate::hid::report::{HidReportState, keys, mouse};
use crate::hid::{ButtonId, HidOutput, HidRegistry, RegistryError};
use crate::io::{DigitalInput, DigitalOutput};
use crate::link::{ControllerLink, DjFrame};
use crate::side_select::RoutingTable;
use crate::storage::PersistentStore;

/// Registry slots the table needs.
pub const BINDING_COUNT: usize = 13;

/// Stick rest position on the 6-bit axes.
pub const STICK_CENTER: u8 = 32;
/// Distance from center before a direction key is held.
pub const STICK_DEAD_ZONE: u8 = 12;

/// Dial motion, in rollover units, that makes one wheel step.
pub const SCROLL_STEP: u8 = 2;

#[derive(Clone, Copy, Debug)]
struct TableButtons {
    green: ButtonId,
    red: ButtonId,
    blue: ButtonId,
}

#[derive(Clone, Copy, Debug)]
pub struct Bindings {
    main: TableButtons,
    alt: TableButtons,
    euphoria: ButtonId,
    plus: ButtonId,
    minus: ButtonId,
    up: ButtonId,
    left: ButtonId,
    down: ButtonId,
    right: ButtonId,
}

impl Bindings {
    /// Registers every bound button, released.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Full`] when the registry has fewer than
    /// [`BINDING_COUNT`] free slots.
    pub fn register<const N: usize>(hid: &mut HidRegistry<N>) -> Result<Self, RegistryError> {
        let mut key = |usage| hid.register(HidOutput::Key(usage));
        let alt = TableButtons {
            green: key(keys::LEFT_SHIFT)?,
            red: key(keys::R)?,
            blue: key(keys::SPACE)?,
        };
        let euphoria = key(keys::Q)?;
        let plus = key(keys::ESCAPE)?;
        let minus = key(keys::TAB)?;
        let up = key(keys::W)?;
        let left = key(keys::A)?;
        let down = key(keys::S)?;
        let right = key(keys::D)?;

        let main = TableButtons {
            green: hid.register(HidOutput::MouseButton(mouse::LEFT))?,
            red: hid.register(HidOutput::MouseButton(mouse::RIGHT))?,
            blue: hid.register(HidOutput::Key(keys::E))?,
        };

        Ok(Self {
            main,
            alt,
            euphoria,
            plus,
            minus,
            up,
            left,
            down,
            right,
        })
    }

    /// Forwards one fresh frame to the host buttons and turns dial motion
    /// into wheel steps.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownButton`] if a bound button was deregistered.
    pub fn apply<const N: usize>(
        &self,
        frame: &DjFrame,
        routing: &RoutingTable,
        hid: &mut HidRegistry<N>,
        effects: &mut EffectHandler,
        reports: &mut HidReportState,
    ) -> Result<(), RegistryError> {
        let main = routing.main_table(frame);
        let alt = routing.alt_table(frame);

        for (buttons, table) in [(&self.main, main), (&self.alt, alt)] {
            hid.press(buttons.green, table.green_pressed(), reports)?;
            hid.press(buttons.red, table.red_pressed(), reports)?;
            hid.press(buttons.blue, table.blue_pressed(), reports)?;
        }

        hid.press(self.euphoria, frame.euphoria, reports)?;
        hid.press(self.plus, frame.plus, reports)?;
        hid.press(self.minus, frame.minus, reports)?;

        let (x, y) = (axis(frame.stick_x), axis(frame.stick_y));
        hid.press(self.left, x < 0, reports)?;
        hid.press(self.right, x > 0, reports)?;
        hid.press(self.up, y > 0, reports)?;
        hid.press(self.down, y < 0, reports)?;

        if effects.changed(SCROLL_STEP) {
            reports.scroll(if effects.total() > 0 { 1 } else { -1 });
            effects.reset();
        }
        Ok(())
    }

    /// Runs [`apply`](Self::apply) against the adapter's latest frame. Does
    /// nothing while disconnected.
    ///
    /// # Errors
    ///
    /// As [`apply`](Self::apply).
    pub fn apply_adapter<L, D, P, S, const N: usize>(
        &self,
        adapter: &mut Adapter<L, D, P, S, N>,
        reports: &mut HidReportState,
    ) -> Result<(), RegistryError>
    where
        L: ControllerLink,
        D: DigitalInput,
        P: DigitalOutput,
        S: PersistentStore,
    {
        let Some(frame) = adapter.frame().copied() else {
            return Ok(());
        };
        let routing = *adapter.routing();
        let mut effects = *adapter.effects();
        let result = self.apply(&frame, &routing, adapter.hid_mut(), &mut effects, reports);
        *adapter.effects_mut() = effects;
        result
    }
}

/// -1, 0 or 1 depending on which side of the dead zone a raw axis sits.
fn axis(raw: u8) -> i8 {
    if raw >= STICK_CENTER + STICK_DEAD_ZONE {
        1
    } else if raw <= STICK_CENTER - STICK_DEAD_ZONE {
        -1
    } else {
        0
    }
}
