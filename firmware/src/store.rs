#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Persistent store kept as `sequential-storage` map records in flash.
//!
//! Each write appends one record keyed by its start address. Pages fill up
//! in turn and the oldest one is only erased once every page is used, so a
//! selection change costs a few bytes instead of a page erase.
//!
//! A read must use the address and length of the write that stored it;
//! anything else reads back erased.

use core::ops::Range;

use embassy_futures::block_on;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;
use turntable_core::storage::{PersistentStore, StorageError, check_range};

/// Bytes exposed to the core.
pub const STORE_SIZE: usize = 512;

/// Longest single record.
pub const MAX_RECORD_LEN: usize = 16;

const RECORD_BUFFER_LEN: usize = 64;
const ERASED: u8 = 0xFF;

pub struct FlashStore<F> {
    flash: F,
    range: Range<u32>,
}

impl<F: NorFlash> FlashStore<F> {
    /// `range` must cover at least two erase pages of `flash`.
    pub fn new(flash: F, range: Range<u32>) -> Self {
        Self { flash, range }
    }

    #[cfg(test)]
    fn flash(&self) -> &F {
        &self.flash
    }

    #[cfg(test)]
    fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    fn check(address: u16, len: usize) -> Result<(), StorageError> {
        check_range(STORE_SIZE, address, len)?;
        if len > MAX_RECORD_LEN {
            return Err(StorageError::OutOfRange {
                address,
                len: u16::try_from(len).unwrap_or(u16::MAX),
            });
        }
        Ok(())
    }
}

impl<F: NorFlash> PersistentStore for FlashStore<F> {
    fn capacity(&self) -> usize {
        STORE_SIZE
    }

    fn get(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        Self::check(address, buf.len())?;
        let mut scratch = [0u8; RECORD_BUFFER_LEN];
        let fetched = block_on(map::fetch_item::<u16, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut scratch,
            &address,
        ))
        .map_err(|_| StorageError::Device)?;

        match fetched {
            Some(record) if record.len() == buf.len() => buf.copy_from_slice(record),
            _ => buf.fill(ERASED),
        }
        Ok(())
    }

    fn put(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        Self::check(address, data.len())?;
        let mut scratch = [0u8; RECORD_BUFFER_LEN];
        block_on(map::store_item::<u16, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut scratch,
            &address,
            &data,
        ))
        .map_err(|_| StorageError::Device)
    }

    /// Compares against what flash holds, so a write that never landed is
    /// retried on the next call.
    fn update(&mut self, address: u16, data: &[u8]) -> Result<bool, StorageError> {
        Self::check(address, data.len())?;
        let mut current = [0u8; MAX_RECORD_LEN];
        let current = &mut current[..data.len()];
        self.get(address, current)?;
        if current == data {
            return Ok(false);
        }
        self.put(address, data).map(|()| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage_async::nor_flash::{ErrorType, NorFlashErrorKind, ReadNorFlash};
    use turntable_core::side_select::CONFIG_ADDRESS;

    const PAGE: usize = 2048;
    const PAGES: usize = 2;

    /// NOR flash in RAM: writes only clear bits, erases count.
    struct RamFlash {
        cells: [u8; PAGE * PAGES],
        erases: usize,
        fail_writes: bool,
    }

    impl RamFlash {
        fn new() -> Self {
            Self {
                cells: [ERASED; PAGE * PAGES],
                erases: 0,
                fail_writes: false,
            }
        }
    }

    impl ErrorType for RamFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for RamFlash {
        const READ_SIZE: usize = 1;

        async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let cells = self
                .cells
                .get(start..start + bytes.len())
                .ok_or(NorFlashErrorKind::OutOfBounds)?;
            bytes.copy_from_slice(cells);
            Ok(())
        }

        fn capacity(&self) -> usize {
            PAGE * PAGES
        }
    }

    impl NorFlash for RamFlash {
        const WRITE_SIZE: usize = 8;
        const ERASE_SIZE: usize = PAGE;

        async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            let (from, to) = (from as usize, to as usize);
            if !from.is_multiple_of(PAGE) || !to.is_multiple_of(PAGE) {
                return Err(NorFlashErrorKind::NotAligned);
            }
            self.cells
                .get_mut(from..to)
                .ok_or(NorFlashErrorKind::OutOfBounds)?
                .fill(ERASED);
            self.erases += (to - from) / PAGE;
            Ok(())
        }

        async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if self.fail_writes {
                return Err(NorFlashErrorKind::Other);
            }
            let start = offset as usize;
            if !start.is_multiple_of(Self::WRITE_SIZE) || !bytes.len().is_multiple_of(Self::WRITE_SIZE) {
                return Err(NorFlashErrorKind::NotAligned);
            }
            let cells = self
                .cells
                .get_mut(start..start + bytes.len())
                .ok_or(NorFlashErrorKind::OutOfBounds)?;
            for (cell, byte) in cells.iter_mut().zip(bytes) {
                *cell &= byte;
            }
            Ok(())
        }
    }

    fn store() -> FlashStore<RamFlash> {
        let end = u32::try_from(PAGE * PAGES).expect("fits");
        FlashStore::new(RamFlash::new(), 0..end)
    }

    fn read_config(store: &mut FlashStore<RamFlash>) -> u8 {
        let mut raw = [0u8];
        store.get(CONFIG_ADDRESS, &mut raw).expect("readable");
        raw[0]
    }

    #[test]
    fn blank_flash_reads_erased() {
        let mut store = store();
        assert_eq!(read_config(&mut store), ERASED);
    }

    #[test]
    fn latest_record_wins_after_reopen() {
        let mut store = store();
        store.put(CONFIG_ADDRESS, &[1]).expect("stored");
        store.put(CONFIG_ADDRESS, &[2]).expect("stored");

        let FlashStore { flash, range } = store;
        let mut reopened = FlashStore::new(flash, range);
        assert_eq!(read_config(&mut reopened), 2);
    }

    #[test]
    fn selection_changes_do_not_erase_every_time() {
        let mut store = store();
        for round in 0..200u8 {
            let value = 1 + round % 2;
            assert_eq!(store.update(CONFIG_ADDRESS, &[value]), Ok(true));
            assert_eq!(store.update(CONFIG_ADDRESS, &[value]), Ok(false));
        }
        assert_eq!(read_config(&mut store), 2);
        assert!(
            store.flash().erases < 20,
            "{} erases for 200 changes",
            store.flash().erases
        );
    }

    #[test]
    fn failed_write_is_retried_by_the_next_update() {
        let mut store = store();
        store.put(CONFIG_ADDRESS, &[2]).expect("stored");

        store.flash_mut().fail_writes = true;
        assert_eq!(
            store.update(CONFIG_ADDRESS, &[1]),
            Err(StorageError::Device)
        );
        assert_eq!(read_config(&mut store), 2, "old value still stored");

        store.flash_mut().fail_writes = false;
        assert_eq!(store.update(CONFIG_ADDRESS, &[1]), Ok(true));
        assert_eq!(read_config(&mut store), 1);
    }

    #[test]
    fn oversized_records_are_refused() {
        let mut store = store();
        let data = [0u8; MAX_RECORD_LEN + 1];
        assert!(matches!(
            store.put(0, &data),
            Err(StorageError::OutOfRange { .. })
        ));
    }
}
