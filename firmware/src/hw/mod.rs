//! Board glue: Embassy pins and time behind the core's seams.

mod flash;

pub use flash::{PageFlash, STORE_RANGE};

use embassy_stm32::gpio::{Input, Level, Output};
use embassy_time::Instant;
use turntable_core::io::{DigitalInput, DigitalOutput};
use turntable_core::{Clock, Millis};

/// Extension connector presence line.
pub struct PresencePin(Input<'static>);

impl PresencePin {
    pub fn new(input: Input<'static>) -> Self {
        Self(input)
    }
}

impl DigitalInput for PresencePin {
    fn read(&mut self) -> bool {
        self.0.is_high()
    }
}

pub struct StatusLed(Output<'static>);

impl StatusLed {
    pub fn new(output: Output<'static>) -> Self {
        Self(output)
    }
}

impl DigitalOutput for StatusLed {
    fn write(&mut self, high: bool) {
        self.0.set_level(Level::from(high));
    }
}

/// Milliseconds since boot, wrapping after about 49 days.
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now(&self) -> Millis {
        Instant::now().as_millis() as Millis
    }
}
