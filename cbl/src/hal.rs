//! Hardware abstraction seams consumed by the bootloader engine.
//!
//! The engine never touches a peripheral directly. Every collaborator
//! (the serial link, the flash controller, the option-byte interface and
//! the CRC accumulator) is reached through one of the traits below, so
//! the whole command path runs unmodified on a host machine against fake
//! drivers during testing, and against thin vendor-driver wrappers on the
//! target.
//!
//! ```text
//! +--------------------+
//! |  Bootloader engine |
//! |  (dispatch, flash, |
//! |   rop, crc gate)   |
//! +---+----+----+----+-+
//!     |    |    |    |
//!     v    v    v    v
//!  Transport FlashBank OptionBytes CrcAccumulator
//!     |    |    |    |
//!   UART  FLASH  OB  CRC unit (or software fallback)
//! ```

use crate::error::{FlashError, TransportError};

/// Blocking byte transport to the host.
///
/// Both directions operate on exact counts: `receive` returns only once
/// `buf` is completely filled and `transmit` only once every byte has
/// been handed to the link. Timeout policy is the implementation's.
pub trait Transport {
    /// Receive exactly `buf.len()` bytes from the host.
    fn receive(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Transmit all of `data` to the host.
    fn transmit(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

/// Flash controller for the program-memory bank.
///
/// Erase and program calls are only valid between `unlock` and `lock`;
/// the engine brackets every mutation accordingly and never holds the
/// interface unlocked across command boundaries.
pub trait FlashBank {
    /// Unlock the flash control interface.
    fn unlock(&mut self) -> Result<(), FlashError>;

    /// Relock the flash control interface.
    fn lock(&mut self) -> Result<(), FlashError>;

    /// Erase the entire bank.
    fn mass_erase(&mut self) -> Result<(), FlashError>;

    /// Erase `count` contiguous sectors starting at `first`.
    fn erase_sectors(&mut self, first: u8, count: u8) -> Result<(), FlashError>;

    /// Program a single byte at `address`.
    fn program_byte(&mut self, address: u32, value: u8) -> Result<(), FlashError>;
}

/// Non-volatile option-byte interface governing read-out protection.
pub trait OptionBytes {
    /// Read the current read-out protection option byte.
    fn read_protection(&mut self) -> u8;

    /// Unlock option-byte programming.
    fn unlock(&mut self) -> Result<(), FlashError>;

    /// Relock option-byte programming.
    fn lock(&mut self) -> Result<(), FlashError>;

    /// Program the read-out protection option byte.
    fn program_protection(&mut self, code: u8) -> Result<(), FlashError>;

    /// Launch (apply) the programmed option bytes.
    fn launch(&mut self) -> Result<(), FlashError>;
}

/// Word-at-a-time CRC-32 accumulator.
///
/// Models the STM32 CRC unit: polynomial `0x04C11DB7`, initial value
/// `0xFFFFFFFF`, no input or output reflection, fed one 32-bit word per
/// call. [`Crc32`](crate::Crc32) is a software implementation with the
/// same semantics.
pub trait CrcAccumulator {
    /// Restore the accumulator to its initial value.
    fn reset(&mut self);

    /// Feed one word and return the running CRC.
    fn accumulate(&mut self, word: u32) -> u32;
}
