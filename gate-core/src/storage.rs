//! Persisted safety-timeout slot.
//!
//! The slot holds one `f32` little-endian seconds value at a fixed byte
//! address. Erased flash (all `0xFF`) decodes as NaN and means "never
//! written"; callers fall back to the cold default in that case.

use core::fmt;
use core::time::Duration;

/// Bytes occupied by the persisted value.
pub const SLOT_LEN: usize = 4;

/// Byte-level access to non-volatile storage.
pub trait TimeoutStore {
    type Error: fmt::Debug;

    /// Fills `buf` with the bytes stored at `address`.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Overwrites the bytes at `address` with `data`.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error>;
}

/// Failures reported by [`load_timeout`] and [`save_timeout`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StorageError<E> {
    /// The backing store rejected the access.
    Backend(E),
    /// The slot holds a value that is not a usable timeout.
    Corrupt,
}

impl<E> fmt::Display for StorageError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Backend(error) => write!(f, "storage backend error: {error:?}"),
            StorageError::Corrupt => f.write_str("persisted timeout is corrupt"),
        }
    }
}

/// Encodes a timeout as the slot's on-media representation.
#[must_use]
pub fn encode_timeout(timeout: Duration) -> [u8; SLOT_LEN] {
    timeout.as_secs_f32().to_le_bytes()
}

/// Decodes the slot. `Ok(None)` means the slot was never written.
///
/// Values are rounded to the nearest millisecond.
///
/// # Errors
///
/// Returns [`StorageError::Corrupt`] when the value is non-finite, zero,
/// negative, or too large for a [`Duration`].
pub fn decode_timeout<E>(bytes: [u8; SLOT_LEN]) -> Result<Option<Duration>, StorageError<E>> {
    if bytes == [0xFF; SLOT_LEN] {
        return Ok(None);
    }

    let seconds = f32::from_le_bytes(bytes);
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(StorageError::Corrupt);
    }

    let raw = Duration::try_from_secs_f32(seconds).map_err(|_| StorageError::Corrupt)?;
    let millis = raw.as_micros().saturating_add(500) / 1_000;
    u64::try_from(millis)
        .map(|millis| Some(Duration::from_millis(millis)))
        .map_err(|_| StorageError::Corrupt)
}

/// Reads the persisted timeout at `address`.
///
/// # Errors
///
/// Propagates backend read failures and reports corrupt contents.
pub fn load_timeout<S>(
    store: &mut S,
    address: u32,
) -> Result<Option<Duration>, StorageError<S::Error>>
where
    S: TimeoutStore,
{
    let mut bytes = [0u8; SLOT_LEN];
    store
        .read(address, &mut bytes)
        .map_err(StorageError::Backend)?;
    decode_timeout(bytes)
}

/// Writes `timeout` to the slot at `address`.
///
/// # Errors
///
/// Propagates backend write failures.
pub fn save_timeout<S>(
    store: &mut S,
    address: u32,
    timeout: Duration,
) -> Result<(), StorageError<S::Error>>
where
    S: TimeoutStore,
{
    store
        .write(address, &encode_timeout(timeout))
        .map_err(StorageError::Backend)
}
