//! Board profiles and adapter timing.

use crate::link::ConnectionTiming;
use crate::side_select::{CONFIG_ADDRESS, MIN_STORE_CAPACITY};
use crate::timing::Millis;

/// What the LED shows while no controller is connected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectIndication {
    /// LED off.
    Off,
    /// Continuous blink at the given frequency.
    Blink { hz: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdapterConfig {
    pub connection: ConnectionTiming,
    /// Quiet time after which accumulated effect motion is dropped.
    pub effect_idle_timeout: Millis,
    /// Hold time for the side-select gesture.
    pub config_stable_time: Millis,
    pub disconnect_indication: DisconnectIndication,
}

impl AdapterConfig {
    pub const DEFAULT: Self = Self {
        connection: ConnectionTiming {
            poll_interval: 4,
            reconnect_interval: 500,
            detect_stable_time: 100,
        },
        effect_idle_timeout: 400,
        config_stable_time: 1_000,
        disconnect_indication: DisconnectIndication::Off,
    };
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-board facts the core needs: LED wiring and store size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlatformProfile {
    pub name: &'static str,
    /// Board label of the status LED pin.
    pub led_pin: &'static str,
    /// LED lights when the pin is driven low.
    pub led_inverted: bool,
    /// Bytes of non-volatile storage.
    pub store_capacity: usize,
}

impl PlatformProfile {
    #[must_use]
    pub const fn holds_config(&self) -> bool {
        self.store_capacity >= MIN_STORE_CAPACITY
            && (CONFIG_ADDRESS as usize) < self.store_capacity
    }
}

pub const PRO_MICRO: PlatformProfile = PlatformProfile {
    name: "Pro Micro",
    led_pin: "D17",
    led_inverted: true,
    store_capacity: 1024,
};

pub const LEONARDO: PlatformProfile = PlatformProfile {
    name: "Leonardo",
    led_pin: "D13",
    led_inverted: false,
    store_capacity: 1024,
};

pub const TEENSY_2: PlatformProfile = PlatformProfile {
    name: "Teensy 2.0",
    led_pin: "D11",
    led_inverted: false,
    store_capacity: 1024,
};

pub const TEENSY_PP_2: PlatformProfile = PlatformProfile {
    name: "Teensy++ 2.0",
    led_pin: "D6",
    led_inverted: false,
    store_capacity: 4096,
};

pub const TEENSY_3: PlatformProfile = PlatformProfile {
    name: "Teensy 3.x",
    led_pin: "D13",
    led_inverted: false,
    store_capacity: 2048,
};

/// Nucleo-style STM32G0B1 board; the store is one emulated flash page.
pub const STM32G0B1: PlatformProfile = PlatformProfile {
    name: "STM32G0B1",
    led_pin: "PA5",
    led_inverted: false,
    store_capacity: MIN_STORE_CAPACITY,
};

pub const PROFILES: [PlatformProfile; 6] =
    [PRO_MICRO, LEONARDO, TEENSY_2, TEENSY_PP_2, TEENSY_3, STM32G0B1];

const _: () = {
    let mut index = 0;
    while index < PROFILES.len() {
        assert!(PROFILES[index].holds_config());
        index += 1;
    }
};

/// Looks a profile up by name, ignoring ASCII case.
#[must_use]
pub fn by_name(name: &str) -> Option<&'static PlatformProfile> {
    static ALL: [PlatformProfile; PROFILES.len()] = PROFILES;
    ALL.iter()
        .find(|profile| profile.name.eq_ignore_ascii_case(name))
}
