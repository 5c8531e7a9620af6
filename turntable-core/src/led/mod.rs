//! Status LED with a static level and timed blink patterns.

mod oscillator;

pub use oscillator::SoftwareOscillator;

use crate::io::DigitalOutput;
use crate::timing::{Millis, elapsed};

/// Blink duration meaning "until told otherwise".
pub const BLINK_FOREVER: Millis = 0;

/// Drives one LED either at a remembered static level or through a blink
/// pattern that ends on its own after a duration.
///
/// Logical levels are "on"/"off"; `inverted` flips them only at the pin
/// write, for boards whose LED is wired active-low.
pub struct LedHandler<P> {
    pin: P,
    inverted: bool,
    state: bool,
    blinking: bool,
    oscillator: SoftwareOscillator,
    blink_start: Millis,
    blink_duration: Millis,
}

impl<P: DigitalOutput> LedHandler<P> {
    #[must_use]
    pub const fn new(pin: P, inverted: bool) -> Self {
        Self {
            pin,
            inverted,
            state: false,
            blinking: false,
            oscillator: SoftwareOscillator::new(),
            blink_start: 0,
            blink_duration: BLINK_FOREVER,
        }
    }

    /// Drives the pin to the stored static level.
    pub fn begin(&mut self) {
        self.set_pin(self.state);
    }

    /// Sets the static level. While a pattern runs the level is only
    /// remembered and takes effect when the pattern ends.
    pub fn write(&mut self, state: bool) {
        self.state = state;
        if !self.blinking {
            self.set_pin(state);
        }
    }

    /// Starts blinking at `hz` for `duration` ms ([`BLINK_FOREVER`] for no
    /// limit). A frequency of zero cancels any running pattern.
    pub fn blink(&mut self, hz: f32, duration: Millis, now: Millis) {
        if hz <= 0.0 {
            self.stop_blinking();
            return;
        }

        self.oscillator.set_frequency(hz, now);
        self.blink_start = now;
        self.blink_duration = duration;
        self.blinking = true;
        self.set_pin(false);
    }

    /// Ends the pattern and restores the static level.
    pub fn stop_blinking(&mut self) {
        self.blinking = false;
        self.set_pin(self.state);
    }

    /// Advances a running pattern. Call once per tick.
    pub fn update(&mut self, now: Millis) {
        if !self.blinking {
            return;
        }

        let level = self.oscillator.state(now);
        self.set_pin(level);

        if self.blink_duration != BLINK_FOREVER
            && elapsed(now, self.blink_start) >= self.blink_duration
        {
            self.stop_blinking();
        }
    }

    #[must_use]
    pub const fn is_blinking(&self) -> bool {
        self.blinking
    }

    /// The static level, independent of any running pattern.
    #[must_use]
    pub const fn state(&self) -> bool {
        self.state
    }

    #[must_use]
    pub const fn pin(&self) -> &P {
        &self.pin
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }

    fn set_pin(&mut self, on: bool) {
        self.pin.write(on ^ self.inverted);
    }
}
