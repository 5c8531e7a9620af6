use crate::timing::{Millis, elapsed};

/// Square-wave generator polled with the current time.
///
/// `period` is the half-cycle: the output flips once every `period`
/// milliseconds, so one full on/off cycle takes `2 * period`. A period of
/// zero freezes the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftwareOscillator {
    state: bool,
    period: Millis,
    last_flip: Millis,
}

impl SoftwareOscillator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: false,
            period: 0,
            last_flip: 0,
        }
    }

    /// Oscillator already running at `period`, starting low at `now`.
    #[must_use]
    pub const fn with_period(period: Millis, now: Millis) -> Self {
        Self {
            state: false,
            period,
            last_flip: now,
        }
    }

    /// Advances the waveform to `now` and returns the current level.
    pub fn state(&mut self, now: Millis) -> bool {
        if self.period != 0 && elapsed(now, self.last_flip) >= self.period {
            self.state = !self.state;
            self.last_flip = now;
        }
        self.state
    }

    /// Sets the half-cycle and restarts the waveform low.
    pub fn set_period(&mut self, period: Millis, now: Millis) {
        self.period = period;
        self.restart(now);
    }

    /// Sets the full-cycle frequency in hertz. Non-positive values are ignored.
    pub fn set_frequency(&mut self, hz: f32, now: Millis) {
        if hz > 0.0 {
            self.set_period(Self::frequency_to_period(hz), now);
        }
    }

    /// Freezes the output at its current level.
    pub fn stop_oscillating(&mut self, now: Millis) {
        self.period = 0;
        self.last_flip = now;
    }

    #[must_use]
    pub const fn period(&self) -> Millis {
        self.period
    }

    #[must_use]
    pub fn frequency(&self) -> f32 {
        Self::period_to_frequency(self.period)
    }

    /// Half-cycle in milliseconds for a frequency in hertz; 0 for
    /// non-positive input.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn frequency_to_period(hz: f32) -> Millis {
        if hz > 0.0 {
            (1000.0 / hz / 2.0) as Millis
        } else {
            0
        }
    }

    /// Frequency in hertz for a half-cycle; 0 when stopped.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn period_to_frequency(period: Millis) -> f32 {
        if period == 0 {
            0.0
        } else {
            1000.0 / (period as f32 * 2.0)
        }
    }

    fn restart(&mut self, now: Millis) {
        self.last_flip = now;
        self.state = false;
    }
}

impl Default for SoftwareOscillator {
    fn default() -> Self {
        Self::new()
    }
}
