//! Flash erase and write engines.
//!
//! Both engines drive a [`FlashBank`] driver inside an unlock/operate/
//! lock bracket. They perform no address validation of their own; the
//! dispatcher validates host addresses first.

use log::{debug, warn};
use thiserror::Error;

use crate::error::FlashError;
use crate::hal::FlashBank;

/// Sector number that requests a full-bank erase.
pub const MASS_ERASE: u8 = 0xFF;

/// Number of flash sectors on the device (sectors `0..=11`).
pub const MAX_SECTOR_COUNT: u8 = 12;

/// Result of an erase request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseOutcome {
    /// The requested (possibly clamped) range was erased.
    Completed,
    /// The hardware reported a sector error or the request was out of
    /// range.
    Failed,
    /// `count` exceeded the device sector count; nothing was touched.
    InvalidSectorCount,
}

/// Erase flash sectors, or the whole bank when `sector` is
/// [`MASS_ERASE`].
///
/// A `count` above [`MAX_SECTOR_COUNT`] is refused before any hardware
/// call. For sector erases the count is clamped downward so the range
/// never runs past the last sector; erasing less than asked is preferred
/// over erasing out of range. The closing lock is attempted even when
/// the erase itself failed, and the outcome reflects the erase alone.
pub fn erase<F: FlashBank>(flash: &mut F, sector: u8, mut count: u8) -> EraseOutcome {
    if count > MAX_SECTOR_COUNT {
        warn!("erase refused: sector count {count} exceeds device maximum");
        return EraseOutcome::InvalidSectorCount;
    }

    // A non-mass request must leave room for at least one sector above
    // the starting one.
    if sector != MASS_ERASE && (sector >= MAX_SECTOR_COUNT || count >= MAX_SECTOR_COUNT) {
        warn!("erase refused: sector {sector} count {count} out of range");
        return EraseOutcome::Failed;
    }

    if flash.unlock().is_err() {
        warn!("erase aborted: flash unlock failed");
        return EraseOutcome::Failed;
    }

    let result = if sector == MASS_ERASE {
        debug!("mass erase requested");
        flash.mass_erase()
    } else {
        let remaining = MAX_SECTOR_COUNT - sector;
        if count > remaining {
            debug!("clamping erase count {count} to {remaining} remaining sectors");
            count = remaining;
        }
        debug!("erasing {count} sector(s) starting at sector {sector}");
        flash.erase_sectors(sector, count)
    };

    // The outcome reports the erase itself; the lock is best effort.
    let _ = flash.lock();

    match result {
        Ok(()) => EraseOutcome::Completed,
        Err(e) => {
            warn!("erase failed: {e}");
            EraseOutcome::Failed
        },
    }
}

/// Write failure carrying the number of bytes confirmed programmed.
///
/// Flash cannot be programmed atomically; a mid-payload failure leaves
/// the earlier bytes written with no rollback. Callers decide on
/// remediation from `written`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("flash write failed after {written} byte(s)")]
pub struct WriteFault {
    /// Bytes successfully programmed before the failure.
    pub written: usize,
}

/// Program `payload` byte-by-byte starting at `start_address`.
///
/// The interface is unlocked first; an unlock failure aborts with zero
/// bytes written. Programming stops at the first failing byte. The lock
/// is applied only after a fully programmed payload, and a lock failure
/// downgrades the result even though every byte was written.
pub fn write<F: FlashBank>(
    flash: &mut F,
    payload: &[u8],
    start_address: u32,
) -> Result<(), WriteFault> {
    if flash.unlock().is_err() {
        warn!("write aborted: flash unlock failed");
        return Err(WriteFault { written: 0 });
    }

    for (offset, &byte) in payload.iter().enumerate() {
        // A payload never exceeds one frame, so the offset fits in u32.
        #[allow(clippy::cast_possible_truncation)]
        let address = start_address + offset as u32;
        if let Err(e) = flash.program_byte(address, byte) {
            warn!("programming failed at 0x{address:08X} after {offset} byte(s): {e}");
            return Err(WriteFault { written: offset });
        }
    }

    match flash.lock() {
        Ok(()) => {
            debug!(
                "programmed {} byte(s) at 0x{start_address:08X}",
                payload.len()
            );
            Ok(())
        },
        Err(e) => {
            warn!("flash lock failed after write: {e}");
            Err(WriteFault {
                written: payload.len(),
            })
        },
    }
}
