//! Persisted safety-timeout slot in the last internal flash page.
//!
//! The STM32G0 programs flash in 64-bit double words and erases whole 2 KiB
//! pages, so every save erases the page and writes one padded record.

use core::fmt;
use core::ops::Range;

/// Offset of the reserved page from the start of flash (512 KiB part).
pub const SLOT_PAGE_OFFSET: u32 = 0x0007_F800;
/// Erase granularity.
pub const PAGE_SIZE: u32 = 2 * 1024;
/// Bytes written per save.
pub const RECORD_LEN: usize = 8;

/// Errors raised before flash is touched.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlotError {
    /// Access does not fit inside the record.
    OutOfRange { address: u32, len: usize },
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::OutOfRange { address, len } => {
                write!(f, "slot access {address}+{len} exceeds {RECORD_LEN} bytes")
            }
        }
    }
}

fn record_range(address: u32, len: usize) -> Result<Range<usize>, SlotError> {
    let out_of_range = SlotError::OutOfRange { address, len };
    let start = usize::try_from(address).map_err(|_| out_of_range)?;
    match start.checked_add(len) {
        Some(end) if end <= RECORD_LEN => Ok(start..end),
        _ => Err(out_of_range),
    }
}

/// Validates an access and returns the absolute flash offset.
pub fn slot_offset(address: u32, len: usize) -> Result<u32, SlotError> {
    record_range(address, len)?;
    Ok(SLOT_PAGE_OFFSET + address)
}

/// Merges `data` into the current record image at `address`.
pub fn merge_record(
    current: [u8; RECORD_LEN],
    address: u32,
    data: &[u8],
) -> Result<[u8; RECORD_LEN], SlotError> {
    let range = record_range(address, data.len())?;
    let mut record = current;
    record[range].copy_from_slice(data);
    Ok(record)
}

#[cfg(target_os = "none")]
pub use target::{FlashSlotError, FlashTimeoutStore};

#[cfg(target_os = "none")]
mod target {
    use embassy_stm32::flash::{Blocking, Error as FlashError, Flash};
    use gate_core::storage::TimeoutStore;

    use super::{PAGE_SIZE, RECORD_LEN, SLOT_PAGE_OFFSET, SlotError, merge_record, slot_offset};

    /// Failures reported by the flash-backed store.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub enum FlashSlotError {
        Layout(SlotError),
        Flash(FlashError),
    }

    impl From<SlotError> for FlashSlotError {
        fn from(error: SlotError) -> Self {
            FlashSlotError::Layout(error)
        }
    }

    impl From<FlashError> for FlashSlotError {
        fn from(error: FlashError) -> Self {
            FlashSlotError::Flash(error)
        }
    }

    /// [`TimeoutStore`] over the reserved flash page.
    pub struct FlashTimeoutStore<'d> {
        flash: Flash<'d, Blocking>,
    }

    impl<'d> FlashTimeoutStore<'d> {
        pub fn new(flash: Flash<'d, Blocking>) -> Self {
            Self { flash }
        }
    }

    impl TimeoutStore for FlashTimeoutStore<'_> {
        type Error = FlashSlotError;

        fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
            let offset = slot_offset(address, buf.len())?;
            self.flash.blocking_read(offset, buf)?;
            Ok(())
        }

        fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error> {
            let mut current = [0u8; RECORD_LEN];
            self.flash.blocking_read(SLOT_PAGE_OFFSET, &mut current)?;
            let record = merge_record(current, address, data)?;

            self.flash
                .blocking_erase(SLOT_PAGE_OFFSET, SLOT_PAGE_OFFSET + PAGE_SIZE)?;
            self.flash.blocking_write(SLOT_PAGE_OFFSET, &record)?;
            defmt::debug!("flash slot rewritten: {=[u8]:x}", &record[..]);
            Ok(())
        }
    }
}
