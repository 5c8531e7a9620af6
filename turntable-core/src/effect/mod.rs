//! Effect dial motion: glitch filtering and idle decay.

use crate::timing::{Millis, RateLimiter};

/// Largest per-poll change accepted as real motion.
pub const MAX_CHANGE: i8 = 5;

const DIAL_STEPS: u8 = 32;
const DIAL_MASK: u8 = DIAL_STEPS - 1;

/// Turns the absolute, wrapping 5-bit dial position into signed changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectRollover {
    last: Option<u8>,
}

impl EffectRollover {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Change since the previous sample, folded into -16..=15. The first
    /// sample only primes the tracker.
    #[allow(clippy::cast_possible_wrap)]
    pub fn change(&mut self, position: u8) -> i8 {
        let position = position & DIAL_MASK;
        let Some(last) = self.last.replace(position) else {
            return 0;
        };

        let step = position.wrapping_sub(last) & DIAL_MASK;
        if step >= DIAL_STEPS / 2 {
            step as i8 - DIAL_STEPS as i8
        } else {
            step as i8
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Running total of dial motion since the dial last went quiet.
///
/// Changes larger than [`MAX_CHANGE`] are bus glitches and dropped before
/// anything else. Real motion restarts the idle timer; once the dial has been
/// still for the whole timeout the total falls back to zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectHandler {
    rollover: EffectRollover,
    idle: RateLimiter,
    total: i16,
}

impl EffectHandler {
    #[must_use]
    pub const fn new(idle_timeout: Millis) -> Self {
        Self {
            rollover: EffectRollover::new(),
            idle: RateLimiter::new(idle_timeout),
            total: 0,
        }
    }

    /// Feeds the absolute dial position from a fresh report.
    pub fn update(&mut self, now: Millis, position: u8) {
        let change = self.rollover.change(position);
        self.apply_change(now, change);
    }

    /// Feeds one signed change directly.
    pub fn apply_change(&mut self, now: Millis, change: i8) {
        let change = if change.unsigned_abs() > MAX_CHANGE.unsigned_abs() {
            0
        } else {
            change
        };

        if change != 0 {
            self.idle.reset(now);
        } else if self.idle.ready(now) {
            self.total = 0;
        }

        self.total = self.total.saturating_add(i16::from(change));
    }

    /// `true` when the accumulated motion has reached `threshold` in
    /// either direction.
    #[must_use]
    pub fn changed(&self, threshold: u8) -> bool {
        self.total.unsigned_abs() >= u16::from(threshold)
    }

    #[must_use]
    pub const fn total(&self) -> i16 {
        self.total
    }

    /// Clears the total, typically after acting on it.
    pub fn reset(&mut self) {
        self.total = 0;
    }

    /// Forgets the last dial position so a reconnect does not read as motion.
    pub fn resync(&mut self) {
        self.rollover.reset();
        self.total = 0;
    }
}
