//! Host stand-ins for the adapter's hardware: a turntable that answers on a
//! simulated extension bus, the presence line, the LED and a file-backed
//! store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use turntable_core::io::{DigitalInput, DigitalOutput};
use turntable_core::link::extension::{EXTENSION_ADDRESS, TURNTABLE_ID};
use turntable_core::link::frame::FRAME_LEN;
use turntable_core::link::{DjFrame, TurntableState};
use turntable_core::storage::{PersistentStore, StorageError, check_range};

pub const STORE_SIZE: usize = 512;

const IDENTITY_REGISTER: u8 = 0xFA;
const REPORT_REGISTER: u8 = 0x00;
const B4_FIXED: u8 = 0b1010_1000;
const B5_FIXED: u8 = 0b0100_0110;

/// The controller as seen from the bus: it answers while plugged in and not
/// failing, and serves whatever inputs the session has set.
#[derive(Debug)]
pub struct SimTurntable {
    pub plugged: bool,
    /// Refuse every transaction while still plugged in.
    pub failing: bool,
    pub inputs: DjFrame,
    pointer: u8,
    initialised: bool,
}

impl SimTurntable {
    pub fn new() -> Self {
        Self {
            plugged: true,
            failing: false,
            inputs: DjFrame {
                stick_x: 32,
                stick_y: 32,
                crossfader: 8,
                ..DjFrame::default()
            },
            pointer: 0,
            initialised: false,
        }
    }

    fn answers(&self) -> bool {
        self.plugged && !self.failing
    }
}

impl Default for SimTurntable {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorType for SimTurntable {
    type Error = ErrorKind;
}

impl I2c for SimTurntable {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != EXTENSION_ADDRESS || !self.answers() {
            self.initialised = false;
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for operation in operations {
            match operation {
                Operation::Write([register]) => self.pointer = *register,
                Operation::Write([0xFB, 0x00]) => self.initialised = true,
                Operation::Write(_) => {}
                Operation::Read(buf) => {
                    let source = match self.pointer {
                        IDENTITY_REGISTER => TURNTABLE_ID,
                        REPORT_REGISTER if self.initialised => encode(&self.inputs),
                        _ => [0xFF; FRAME_LEN],
                    };
                    let len = buf.len().min(FRAME_LEN);
                    buf[..len].copy_from_slice(&source[..len]);
                }
            }
        }
        Ok(())
    }
}

/// Packs inputs into the six-byte wire report, buttons active low.
#[allow(clippy::cast_sign_loss)]
pub fn encode(frame: &DjFrame) -> [u8; FRAME_LEN] {
    let left_raw = frame.left.speed as u8 & 0x3F;
    let right_raw = frame.right.speed as u8 & 0x3F;
    let released = |pressed: bool, bit: u8| if pressed { 0 } else { 1 << bit };

    let mut raw = [0u8; FRAME_LEN];
    raw[0] = (frame.stick_x & 0x3F) | (((right_raw >> 3) & 0x03) << 6);
    raw[1] = (frame.stick_y & 0x3F) | (((right_raw >> 1) & 0x03) << 6);
    raw[2] = ((right_raw & 0x01) << 7)
        | ((frame.effect_dial & 0x18) << 2)
        | ((frame.crossfader & 0x0F) << 1)
        | ((right_raw >> 5) & 0x01);
    raw[3] = ((frame.effect_dial & 0x07) << 5) | (left_raw & 0x1F);
    raw[4] = B4_FIXED
        | ((left_raw >> 5) & 0x01)
        | released(frame.left.red, 1)
        | released(frame.minus, 2)
        | released(frame.plus, 4)
        | released(frame.right.red, 6);
    raw[5] = B5_FIXED
        | released(frame.right.blue, 0)
        | released(frame.left.green, 3)
        | released(frame.euphoria, 4)
        | released(frame.right.green, 5)
        | released(frame.left.blue, 7);
    raw
}

/// Settling delays are meaningless against a simulated bus.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Presence line, high while the controller is plugged in.
#[derive(Debug)]
pub struct SimPresence {
    pub level: bool,
}

impl DigitalInput for SimPresence {
    fn read(&mut self) -> bool {
        self.level
    }
}

#[derive(Debug, Default)]
pub struct ConsoleLed {
    pub level: bool,
    pub toggles: u32,
}

impl DigitalOutput for ConsoleLed {
    fn write(&mut self, high: bool) {
        if high != self.level {
            self.toggles += 1;
        }
        self.level = high;
    }
}

/// Byte store mirrored into a file; each physical write rewrites the file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    image: [u8; STORE_SIZE],
    writes: usize,
}

impl FileStore {
    /// Opens `path`, treating a missing file as a blank (erased) store.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut image = [0xFF; STORE_SIZE];
        match fs::read(&path) {
            Ok(bytes) => {
                let len = bytes.len().min(STORE_SIZE);
                image[..len].copy_from_slice(&bytes[..len]);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        Ok(Self {
            path,
            image,
            writes: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Physical writes since opening.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl PersistentStore for FileStore {
    fn capacity(&self) -> usize {
        STORE_SIZE
    }

    fn get(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        check_range(STORE_SIZE, address, buf.len())?;
        let start = usize::from(address);
        buf.copy_from_slice(&self.image[start..start + buf.len()]);
        Ok(())
    }

    fn put(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        check_range(STORE_SIZE, address, data.len())?;
        let start = usize::from(address);
        self.image[start..start + data.len()].copy_from_slice(data);
        fs::write(&self.path, self.image).map_err(|_| StorageError::Device)?;
        self.writes += 1;
        Ok(())
    }
}

/// Mutable access to one platter by name.
pub fn table_mut<'a>(frame: &'a mut DjFrame, side: &str) -> Option<&'a mut TurntableState> {
    if side.eq_ignore_ascii_case("left") {
        Some(&mut frame.left)
    } else if side.eq_ignore_ascii_case("right") {
        Some(&mut frame.right)
    } else {
        None
    }
}
