//! The MCU's blocking flash behind the async NOR flash traits.

use core::ops::Range;

use embassy_stm32::flash::{Blocking, Error, Flash};
use embedded_storage_async::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

const FLASH_SIZE: usize = 512 * 1024;
const PAGE_SIZE: usize = 2 * 1024;
const STORE_PAGES: usize = 2;

#[allow(clippy::cast_possible_truncation)]
const FLASH_END: u32 = FLASH_SIZE as u32;
#[allow(clippy::cast_possible_truncation)]
const STORE_START: u32 = (FLASH_SIZE - STORE_PAGES * PAGE_SIZE) as u32;

/// The last pages of flash, reserved for the persistent store.
pub const STORE_RANGE: Range<u32> = STORE_START..FLASH_END;

/// Runs each operation to completion before returning.
pub struct PageFlash(Flash<'static, Blocking>);

impl PageFlash {
    pub fn new(flash: Flash<'static, Blocking>) -> Self {
        Self(flash)
    }
}

impl ErrorType for PageFlash {
    type Error = Error;
}

impl ReadNorFlash for PageFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Error> {
        self.0.blocking_read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        FLASH_SIZE
    }
}

impl NorFlash for PageFlash {
    /// Flash programs whole double words.
    const WRITE_SIZE: usize = 8;
    const ERASE_SIZE: usize = PAGE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Error> {
        self.0.blocking_erase(from, to)
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Error> {
        self.0.blocking_write(offset, bytes)
    }
}
