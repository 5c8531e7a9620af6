//! Byte-addressed non-volatile storage seam.

use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// The access does not fit inside the store.
    OutOfRange { address: u16, len: u16 },
    /// The underlying device rejected the operation.
    Device,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::OutOfRange { address, len } => {
                write!(f, "{len} byte access at {address} is outside the store")
            }
            StorageError::Device => f.write_str("storage device error"),
        }
    }
}

/// EEPROM-like byte store.
pub trait PersistentStore {
    /// Size in bytes.
    fn capacity(&self) -> usize;

    /// Reads `buf.len()` bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// [`StorageError::OutOfRange`] or [`StorageError::Device`].
    fn get(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Writes `data` starting at `address`, unconditionally.
    ///
    /// # Errors
    ///
    /// [`StorageError::OutOfRange`] or [`StorageError::Device`].
    fn put(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError>;

    /// Writes `data` only where it differs from what is stored. Returns
    /// whether a physical write happened.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`get`](Self::get) and [`put`](Self::put).
    fn update(&mut self, address: u16, data: &[u8]) -> Result<bool, StorageError> {
        let mut changed = false;
        for (offset, &byte) in data.iter().enumerate() {
            let address = offset_address(address, offset, data.len())?;
            let mut current = [0u8];
            self.get(address, &mut current)?;
            if current[0] != byte {
                self.put(address, &[byte])?;
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// Checks that `len` bytes at `address` fit in `capacity`.
///
/// # Errors
///
/// [`StorageError::OutOfRange`] when they do not.
pub fn check_range(capacity: usize, address: u16, len: usize) -> Result<(), StorageError> {
    let end = usize::from(address).checked_add(len);
    match end {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StorageError::OutOfRange {
            address,
            len: u16::try_from(len).unwrap_or(u16::MAX),
        }),
    }
}

fn offset_address(base: u16, offset: usize, len: usize) -> Result<u16, StorageError> {
    u16::try_from(offset)
        .ok()
        .and_then(|offset| base.checked_add(offset))
        .ok_or(StorageError::OutOfRange {
            address: base,
            len: u16::try_from(len).unwrap_or(u16::MAX),
        })
}

/// RAM-backed store, erased to `0xFF`. Counts physical byte writes.
#[derive(Clone, Debug)]
pub struct MemoryStore<const N: usize> {
    cells: [u8; N],
    writes: usize,
}

impl<const N: usize> MemoryStore<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cells: [0xFF; N],
            writes: 0,
        }
    }

    #[must_use]
    pub const fn from_image(cells: [u8; N]) -> Self {
        Self { cells, writes: 0 }
    }

    /// Bytes written since construction.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    #[must_use]
    pub const fn image(&self) -> &[u8; N] {
        &self.cells
    }
}

impl<const N: usize> Default for MemoryStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PersistentStore for MemoryStore<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn get(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        check_range(N, address, buf.len())?;
        let start = usize::from(address);
        buf.copy_from_slice(&self.cells[start..start + buf.len()]);
        Ok(())
    }

    fn put(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        check_range(N, address, data.len())?;
        let start = usize::from(address);
        self.cells[start..start + data.len()].copy_from_slice(data);
        self.writes += data.len();
        Ok(())
    }
}
