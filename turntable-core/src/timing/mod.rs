//! Millisecond timing primitives.
//!
//! Timestamps are `u32` milliseconds since boot and wrap after roughly 49.7
//! days. Every comparison goes through [`elapsed`], which subtracts with
//! wraparound, so intervals stay correct across the rollover.

/// Milliseconds since boot.
pub type Millis = u32;

/// Monotonic millisecond source.
pub trait Clock {
    /// Returns the current timestamp.
    fn now(&self) -> Millis;
}

/// Time elapsed from `since` to `now`, tolerant of counter wraparound.
#[inline]
#[must_use]
pub const fn elapsed(now: Millis, since: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// Gates an action to at most once per interval.
///
/// A fresh limiter is ready on its first query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateLimiter {
    interval: Millis,
    last_fired: Option<Millis>,
}

impl RateLimiter {
    /// Creates a limiter that fires immediately, then once per `interval`.
    #[must_use]
    pub const fn new(interval: Millis) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    /// Returns `true` and restarts the interval when enough time has passed.
    /// A `false` return leaves the limiter untouched.
    pub fn ready(&mut self, now: Millis) -> bool {
        let due = match self.last_fired {
            None => true,
            Some(last) => elapsed(now, last) >= self.interval,
        };
        if due {
            self.last_fired = Some(now);
        }
        due
    }

    /// Restarts the interval so the next `ready` needs a full wait.
    pub fn reset(&mut self, now: Millis) {
        self.last_fired = Some(now);
    }

    #[must_use]
    pub const fn interval(&self) -> Millis {
        self.interval
    }
}

/// Stopwatch reporting how long an input has continuously matched a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeldFor {
    target: bool,
    last_observed: bool,
    stable_since: Millis,
}

impl HeldFor {
    /// Stopwatch that starts timing at the first observation of `target`.
    #[must_use]
    pub const fn new(target: bool) -> Self {
        Self::assuming(target, !target)
    }

    /// Stopwatch that behaves as if `observed` had been seen at boot.
    ///
    /// With `observed == target` the held time counts from timestamp zero.
    #[must_use]
    pub const fn assuming(target: bool, observed: bool) -> Self {
        Self {
            target,
            last_observed: observed,
            stable_since: 0,
        }
    }

    /// Records `state` and returns how long it has matched the target, or 0.
    pub fn check(&mut self, state: bool, now: Millis) -> Millis {
        if state != self.last_observed {
            self.last_observed = state;
            if state == self.target {
                self.stable_since = now;
            }
        }

        if state == self.target {
            elapsed(now, self.stable_since)
        } else {
            0
        }
    }

    #[must_use]
    pub const fn target(&self) -> bool {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_is_ready_immediately_then_waits_full_interval() {
        let mut limiter = RateLimiter::new(100);
        assert!(limiter.ready(5));
        assert!(!limiter.ready(50));
        assert!(!limiter.ready(104));
        assert!(limiter.ready(105));
        assert!(!limiter.ready(105));
    }

    #[test]
    fn limiter_false_return_does_not_move_the_window() {
        let mut limiter = RateLimiter::new(10);
        assert!(limiter.ready(0));
        for now in 1..10 {
            assert!(!limiter.ready(now));
        }
        assert!(limiter.ready(10));
    }

    #[test]
    fn limiter_reset_forces_a_full_wait() {
        let mut limiter = RateLimiter::new(20);
        limiter.reset(7);
        assert!(!limiter.ready(26));
        assert!(limiter.ready(27));
    }

    #[test]
    fn limiter_survives_counter_wraparound() {
        let mut limiter = RateLimiter::new(100);
        assert!(limiter.ready(u32::MAX - 49));
        assert!(!limiter.ready(49));
        assert!(limiter.ready(50));
    }

    #[test]
    fn held_for_reports_zero_off_target() {
        let mut held = HeldFor::new(true);
        assert_eq!(held.check(false, 10), 0);
        assert_eq!(held.check(true, 20), 0);
        assert_eq!(held.check(true, 150), 130);
        assert_eq!(held.check(false, 160), 0);
    }

    #[test]
    fn held_for_restamps_on_each_return_to_target() {
        let mut held = HeldFor::new(true);
        held.check(true, 0);
        assert_eq!(held.check(true, 500), 500);
        held.check(false, 501);
        assert_eq!(held.check(true, 600), 0);
        assert_eq!(held.check(true, 650), 50);
    }

    #[test]
    fn held_for_assuming_target_counts_from_boot() {
        let mut held = HeldFor::assuming(true, true);
        assert_eq!(held.check(true, 42), 42);
    }

    #[test]
    fn held_for_low_target() {
        let mut held = HeldFor::new(false);
        assert_eq!(held.check(true, 0), 0);
        assert_eq!(held.check(false, 10), 0);
        assert_eq!(held.check(false, 35), 25);
    }
}
