//! Two-wire extension-port driver for the turntable controller.
//!
//! Uses the unencrypted init sequence (0xF0 <- 0x55, 0xFB <- 0x00), checks
//! the six identity bytes at 0xFA, then reads six report bytes from 0x00 on
//! every poll. Presence of each platter is latched from activity and forgotten
//! on the next connect.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::frame::{DjFrame, FRAME_LEN, PresenceLatch};
use super::{ControllerLink, LinkError};

/// Fixed bus address of every extension controller.
pub const EXTENSION_ADDRESS: u8 = 0x52;

/// Identity reported by the DJ turntable base.
pub const TURNTABLE_ID: [u8; 6] = [0x03, 0x00, 0xA4, 0x20, 0x01, 0x03];

const INIT_SEQUENCE: [[u8; 2]; 2] = [[0xF0, 0x55], [0xFB, 0x00]];
const IDENTITY_REGISTER: u8 = 0xFA;
const REPORT_REGISTER: u8 = 0x00;

/// Settling time between the register write and the read-back.
const CONVERSION_DELAY_US: u32 = 175;
/// Settling time after each init write.
const INIT_DELAY_US: u32 = 1_000;

pub struct ExtensionBus<I, D> {
    i2c: I,
    delay: D,
    frame: DjFrame,
    presence: PresenceLatch,
}

impl<I: I2c, D: DelayNs> ExtensionBus<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            frame: DjFrame::default(),
            presence: PresenceLatch::new(),
        }
    }

    /// Runs init and the identity check.
    ///
    /// # Errors
    ///
    /// [`LinkError::Bus`] on a failed transaction,
    /// [`LinkError::UnexpectedIdentity`] when another accessory answers.
    pub fn try_connect(&mut self) -> Result<(), LinkError> {
        for command in &INIT_SEQUENCE {
            self.i2c
                .write(EXTENSION_ADDRESS, command)
                .map_err(|_| LinkError::Bus)?;
            self.delay.delay_us(INIT_DELAY_US);
        }

        let identity = self.read_register(IDENTITY_REGISTER)?;
        if identity != TURNTABLE_ID {
            return Err(LinkError::UnexpectedIdentity(identity));
        }

        self.presence.reset();
        self.frame = DjFrame::default();
        Ok(())
    }

    /// Reads and decodes one report.
    ///
    /// # Errors
    ///
    /// [`LinkError::Bus`] or [`LinkError::Frame`].
    pub fn try_update(&mut self) -> Result<(), LinkError> {
        let raw = self.read_register(REPORT_REGISTER)?;
        let mut frame = DjFrame::decode(&raw)?;
        self.presence.observe(&mut frame);
        self.frame = frame;
        Ok(())
    }

    /// The bus, for peripherals that share it.
    pub const fn bus(&self) -> &I {
        &self.i2c
    }

    pub fn bus_mut(&mut self) -> &mut I {
        &mut self.i2c
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    fn read_register(&mut self, register: u8) -> Result<[u8; FRAME_LEN], LinkError> {
        self.i2c
            .write(EXTENSION_ADDRESS, &[register])
            .map_err(|_| LinkError::Bus)?;
        self.delay.delay_us(CONVERSION_DELAY_US);

        let mut buf = [0u8; FRAME_LEN];
        self.i2c
            .read(EXTENSION_ADDRESS, &mut buf)
            .map_err(|_| LinkError::Bus)?;
        Ok(buf)
    }
}

impl<I: I2c, D: DelayNs> ControllerLink for ExtensionBus<I, D> {
    fn connect(&mut self) -> bool {
        match self.try_connect() {
            Ok(()) => true,
            Err(err) => {
                debug!("extension: connect failed: {}", err);
                false
            }
        }
    }

    fn update(&mut self) -> bool {
        match self.try_update() {
            Ok(()) => true,
            Err(err) => {
                warn!("extension: update failed: {}", err);
                false
            }
        }
    }

    fn frame(&self) -> &DjFrame {
        &self.frame
    }
}
