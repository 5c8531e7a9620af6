//! Controller link: presence detection, connection lifecycle and the bus
//! driver that fetches reports.
//!
//! [`ConnectionHelper`] is the only place that decides whether the adapter is
//! talking to a controller. Every transition out of the connected state goes
//! through [`LinkHooks::link_lost`] on the same call that detected it, before
//! any caller can consume data from the tick.

pub mod extension;
pub mod frame;

use core::fmt;

pub use extension::ExtensionBus;
pub use frame::{DjFrame, FrameError, TurntableLayout, TurntableState};

use crate::io::DigitalInput;
use crate::timing::{HeldFor, Millis, RateLimiter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// The bus transaction failed.
    Bus,
    /// Something answered, but it is not a turntable.
    UnexpectedIdentity([u8; 6]),
    Frame(FrameError),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Bus => f.write_str("extension bus transaction failed"),
            LinkError::UnexpectedIdentity(id) => write!(f, "unexpected controller id {id:02X?}"),
            LinkError::Frame(err) => write!(f, "{err}"),
        }
    }
}

impl From<FrameError> for LinkError {
    fn from(err: FrameError) -> Self {
        LinkError::Frame(err)
    }
}

/// Driver for the controller on the far side of the link.
pub trait ControllerLink {
    /// One-time bus setup.
    fn begin(&mut self) {}

    /// Attempts the connect handshake. Returns `true` on success.
    fn connect(&mut self) -> bool;

    /// Fetches a fresh report. Returns `false` when the controller stopped
    /// answering or sent garbage.
    fn update(&mut self) -> bool;

    /// The most recently fetched report.
    fn frame(&self) -> &DjFrame;
}

/// Why the link went down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LossReason {
    /// The presence pin settled low.
    PresenceLost,
    /// A poll failed.
    PollFailed,
}

impl fmt::Display for LossReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossReason::PresenceLost => f.write_str("presence lost"),
            LossReason::PollFailed => f.write_str("poll failed"),
        }
    }
}

/// Callbacks run synchronously on connection transitions.
pub trait LinkHooks {
    fn link_up(&mut self, _now: Millis) {}
    fn link_lost(&mut self, _reason: LossReason, _now: Millis) {}
}

impl LinkHooks for () {}

/// Debounced reading of the controller presence pin.
///
/// Starts out detected so a controller plugged in at power-up is picked up
/// immediately. After that the flag only changes once the pin has held the
/// opposite level for `stable_time` without interruption.
pub struct ControllerDetect<P> {
    pin: P,
    stable_time: Millis,
    high: HeldFor,
    low: HeldFor,
    detected: bool,
}

impl<P: DigitalInput> ControllerDetect<P> {
    #[must_use]
    pub const fn new(pin: P, stable_time: Millis) -> Self {
        Self {
            pin,
            stable_time,
            high: HeldFor::assuming(true, true),
            low: HeldFor::new(false),
            detected: true,
        }
    }

    /// Samples the pin and returns the debounced presence.
    pub fn is_detected(&mut self, now: Millis) -> bool {
        let level = self.pin.read();
        let high_for = self.high.check(level, now);
        let low_for = self.low.check(level, now);

        if self.detected {
            if low_for >= self.stable_time {
                self.detected = false;
                info!("link: controller presence lost");
            }
        } else if high_for >= self.stable_time {
            self.detected = true;
            info!("link: controller presence detected");
        }

        self.detected
    }

    #[must_use]
    pub const fn stable_time(&self) -> Millis {
        self.stable_time
    }

    #[must_use]
    pub const fn pin(&self) -> &P {
        &self.pin
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }
}

/// Timing knobs for [`ConnectionHelper`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionTiming {
    /// Minimum gap between polls.
    pub poll_interval: Millis,
    /// Minimum gap between connect attempts.
    pub reconnect_interval: Millis,
    /// Presence debounce in both directions.
    pub detect_stable_time: Millis,
}

/// Owns the link and its presence pin and keeps them in step.
pub struct ConnectionHelper<L, P> {
    link: L,
    detect: ControllerDetect<P>,
    poll_rate: RateLimiter,
    reconnect_rate: RateLimiter,
    connected: bool,
}

impl<L: ControllerLink, P: DigitalInput> ConnectionHelper<L, P> {
    #[must_use]
    pub const fn new(link: L, presence_pin: P, timing: ConnectionTiming) -> Self {
        Self {
            link,
            detect: ControllerDetect::new(presence_pin, timing.detect_stable_time),
            poll_rate: RateLimiter::new(timing.poll_interval),
            reconnect_rate: RateLimiter::new(timing.reconnect_interval),
            connected: false,
        }
    }

    pub fn begin(&mut self) {
        self.link.begin();
    }

    /// `true` only on ticks where a fresh report was fetched.
    ///
    /// Polls at most once per poll interval, and only while connected. A
    /// failed poll drops the connection and runs `link_lost` before returning.
    pub fn is_ready<H: LinkHooks + ?Sized>(&mut self, now: Millis, hooks: &mut H) -> bool {
        if !self.poll_rate.ready(now) || !self.is_connected(now, hooks) {
            return false;
        }

        if self.link.update() {
            return true;
        }

        warn!("link: poll failed, dropping connection");
        self.drop_connection(LossReason::PollFailed, now, hooks);
        false
    }

    /// Re-evaluates presence and retries the handshake when due.
    pub fn is_connected<H: LinkHooks + ?Sized>(&mut self, now: Millis, hooks: &mut H) -> bool {
        if !self.detect.is_detected(now) {
            if self.connected {
                self.drop_connection(LossReason::PresenceLost, now, hooks);
            }
            return false;
        }

        if !self.connected && self.reconnect_rate.ready(now) {
            if self.link.connect() {
                info!("link: controller connected");
                self.connected = true;
                hooks.link_up(now);
            } else {
                debug!("link: connect attempt failed");
            }
        }

        self.connected
    }

    /// Last known state, without sampling anything.
    #[must_use]
    pub const fn connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub const fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    #[must_use]
    pub const fn detect(&self) -> &ControllerDetect<P> {
        &self.detect
    }

    pub fn detect_mut(&mut self) -> &mut ControllerDetect<P> {
        &mut self.detect
    }

    fn drop_connection<H: LinkHooks + ?Sized>(
        &mut self,
        reason: LossReason,
        now: Millis,
        hooks: &mut H,
    ) {
        self.connected = false;
        info!("link: controller disconnected ({})", reason);
        hooks.link_lost(reason, now);
    }
}
