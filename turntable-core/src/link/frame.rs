//! Decoder for the six-byte turntable report.
//!
//! ```text
//!        7      6      5      4      3      2      1      0
//! B0  RTT<4:3>      SX<5:0>
//! B1  RTT<2:1>      SY<5:0>
//! B2  RTT<0> ED<4:3>      CS<3:0>                      RTT<5>
//! B3  ED<2:0>              LTT<4:0>
//! B4  1      BRR    1      B+     1      B-     BLR    LTT<5>
//! B5  BLB    1      BRG    BEU    BLG    1      1      BRB
//! ```
//!
//! Buttons are active low. The constant `1` bits double as a sanity check on
//! the bus read.

use core::fmt;

pub const FRAME_LEN: usize = 6;

const B4_FIXED: u8 = 0b1010_1000;
const B5_FIXED: u8 = 0b0100_0110;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// A bit that is always set in a healthy report read as zero.
    Malformed,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Malformed => f.write_str("malformed turntable report"),
        }
    }
}

/// One platter: rotation since the last report plus its three buttons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TurntableState {
    /// Signed rotation, -32..=31. Positive is clockwise.
    pub speed: i8,
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl TurntableState {
    /// Any movement or button activity on this platter.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.speed != 0 || self.red || self.green || self.blue
    }

    /// Side-select accessor: the blue button.
    #[must_use]
    pub const fn blue_pressed(&self) -> bool {
        self.blue
    }

    #[must_use]
    pub const fn green_pressed(&self) -> bool {
        self.green
    }

    #[must_use]
    pub const fn red_pressed(&self) -> bool {
        self.red
    }
}

/// Which platters have shown themselves since the last connect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TurntableLayout {
    #[default]
    BaseOnly,
    Left,
    Right,
    Both,
}

impl TurntableLayout {
    #[must_use]
    pub const fn from_sides(left: bool, right: bool) -> Self {
        match (left, right) {
            (false, false) => TurntableLayout::BaseOnly,
            (true, false) => TurntableLayout::Left,
            (false, true) => TurntableLayout::Right,
            (true, true) => TurntableLayout::Both,
        }
    }

    #[must_use]
    pub const fn count(self) -> u8 {
        match self {
            TurntableLayout::BaseOnly => 0,
            TurntableLayout::Left | TurntableLayout::Right => 1,
            TurntableLayout::Both => 2,
        }
    }

    #[must_use]
    pub const fn has_left(self) -> bool {
        matches!(self, TurntableLayout::Left | TurntableLayout::Both)
    }

    #[must_use]
    pub const fn has_right(self) -> bool {
        matches!(self, TurntableLayout::Right | TurntableLayout::Both)
    }
}

/// Decoded controller state for one poll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DjFrame {
    pub stick_x: u8,
    pub stick_y: u8,
    /// Absolute effect dial position, 0..=31, wraps.
    pub effect_dial: u8,
    /// Crossfader, 0..=15.
    pub crossfader: u8,
    pub plus: bool,
    pub minus: bool,
    pub euphoria: bool,
    pub left: TurntableState,
    pub right: TurntableState,
    /// Latched platter presence, filled in by the link.
    pub layout: TurntableLayout,
}

impl DjFrame {
    /// Decodes a raw report. `layout` is left at [`TurntableLayout::BaseOnly`].
    ///
    /// # Errors
    ///
    /// [`FrameError::Malformed`] when any constant bit reads zero.
    pub fn decode(raw: &[u8; FRAME_LEN]) -> Result<Self, FrameError> {
        if raw[4] & B4_FIXED != B4_FIXED || raw[5] & B5_FIXED != B5_FIXED {
            return Err(FrameError::Malformed);
        }

        let right_raw = ((raw[0] >> 6) << 3)
            | ((raw[1] >> 6) << 1)
            | (raw[2] >> 7)
            | ((raw[2] & 0x01) << 5);
        let left_raw = (raw[3] & 0x1F) | ((raw[4] & 0x01) << 5);

        let pressed = |byte: u8, bit: u8| byte & (1 << bit) == 0;

        Ok(Self {
            stick_x: raw[0] & 0x3F,
            stick_y: raw[1] & 0x3F,
            effect_dial: ((raw[2] & 0x60) >> 2) | (raw[3] >> 5),
            crossfader: (raw[2] >> 1) & 0x0F,
            plus: pressed(raw[4], 4),
            minus: pressed(raw[4], 2),
            euphoria: pressed(raw[5], 4),
            left: TurntableState {
                speed: signed_six_bit(left_raw),
                red: pressed(raw[4], 1),
                green: pressed(raw[5], 3),
                blue: pressed(raw[5], 7),
            },
            right: TurntableState {
                speed: signed_six_bit(right_raw),
                red: pressed(raw[4], 6),
                green: pressed(raw[5], 5),
                blue: pressed(raw[5], 0),
            },
            layout: TurntableLayout::BaseOnly,
        })
    }

    #[must_use]
    pub const fn turntable_count(&self) -> u8 {
        self.layout.count()
    }

    /// Config-gesture accessor: the euphoria button.
    #[must_use]
    pub const fn euphoria_pressed(&self) -> bool {
        self.euphoria
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn signed_six_bit(raw: u8) -> i8 {
    let value = (raw & 0x3F) as i8;
    if value & 0x20 != 0 { value - 0x40 } else { value }
}

/// Remembers which platters have been active since the last reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresenceLatch {
    left: bool,
    right: bool,
}

impl PresenceLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            left: false,
            right: false,
        }
    }

    /// Latches activity from `frame` and stamps the resulting layout on it.
    pub fn observe(&mut self, frame: &mut DjFrame) {
        if !self.left && frame.left.is_active() {
            self.left = true;
            info!("link: left turntable present");
        }
        if !self.right && frame.right.is_active() {
            self.right = true;
            info!("link: right turntable present");
        }
        frame.layout = self.layout();
    }

    #[must_use]
    pub const fn layout(&self) -> TurntableLayout {
        TurntableLayout::from_sides(self.left, self.right)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
