//! CBL wire protocol vocabulary.
//!
//! One exchange is a single length-framed request followed by a single
//! reply; there is no pipelining.
//!
//! ## Frame format
//!
//! ```text
//! +--------+--------------+----------------+-------+
//! | Length | Command code |    Params      | CRC32 |
//! +--------+--------------+----------------+-------+
//! | 1 byte |    1 byte    | length-5 bytes | 4 B   |
//! +--------+--------------+----------------+-------+
//! ```
//!
//! `Length` counts every byte after itself, so it is at least 5
//! (command code plus CRC). The CRC covers the length byte through the
//! last parameter byte and is transmitted little-endian, like every
//! multi-byte field on the wire.
//!
//! ## Replies
//!
//! A CRC mismatch is answered with a single NACK byte. On a pass the
//! device sends `[ACK, reply_len]` followed by `reply_len` result bytes;
//! commands that act on an address or the hardware reply with a single
//! in-band status byte. Success of the operation is carried by that
//! status, never by the ACK itself.

/// ACK marker opening every positive reply.
pub const ACK: u8 = 0xCD;

/// NACK marker; the entire reply to a frame that failed CRC.
pub const NACK: u8 = 0xAB;

/// Smallest legal value of the length byte (command code + CRC).
pub const MIN_FRAME_LEN: usize = 5;

/// Trailing CRC size in bytes.
pub const CRC_LEN: usize = 4;

/// Receive buffer size: the length byte plus its maximum count of 255.
pub const RX_BUFFER_LEN: usize = 256;

/// Command codes understood (or at least advertised) by the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Report vendor id and bootloader version.
    GetVersion = 0x10,
    /// Report the supported command-code table.
    GetHelp = 0x11,
    /// Report the 16-bit chip identifier.
    GetChipId = 0x12,
    /// Report the read-out protection option byte.
    GetProtectionStatus = 0x13,
    /// Validate an address and transfer execution to it.
    JumpToAddress = 0x14,
    /// Mass or multi-sector flash erase.
    EraseFlash = 0x15,
    /// Program a payload into RAM or flash.
    MemoryWrite = 0x16,
    /// Reserved: enable/disable sector write protection.
    EnableDisableWriteProtect = 0x17,
    /// Reserved: read a memory range back to the host.
    MemoryRead = 0x18,
    /// Reserved: report per-sector protection status.
    ReadSectorStatus = 0x19,
    /// Reserved: read OTP memory.
    OtpRead = 0x20,
    /// Change the read-out protection level.
    ChangeProtectionLevel = 0x21,
}

impl Command {
    /// Decode a wire code. Unknown codes have no variant; the dispatcher
    /// drops such frames without a reply.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x10 => Some(Self::GetVersion),
            0x11 => Some(Self::GetHelp),
            0x12 => Some(Self::GetChipId),
            0x13 => Some(Self::GetProtectionStatus),
            0x14 => Some(Self::JumpToAddress),
            0x15 => Some(Self::EraseFlash),
            0x16 => Some(Self::MemoryWrite),
            0x17 => Some(Self::EnableDisableWriteProtect),
            0x18 => Some(Self::MemoryRead),
            0x19 => Some(Self::ReadSectorStatus),
            0x20 => Some(Self::OtpRead),
            0x21 => Some(Self::ChangeProtectionLevel),
            _ => None,
        }
    }

    /// The wire code for this command.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Command codes advertised by [`Command::GetHelp`], in declared order.
pub const SUPPORTED_COMMANDS: [u8; 12] = [
    Command::GetVersion.code(),
    Command::GetHelp.code(),
    Command::GetChipId.code(),
    Command::GetProtectionStatus.code(),
    Command::JumpToAddress.code(),
    Command::EraseFlash.code(),
    Command::MemoryWrite.code(),
    Command::EnableDisableWriteProtect.code(),
    Command::MemoryRead.code(),
    Command::ReadSectorStatus.code(),
    Command::OtpRead.code(),
    Command::ChangeProtectionLevel.code(),
];

/// Status byte: target address outside every configured region.
pub const ADDRESS_INVALID: u8 = 0x00;
/// Status byte: target address accepted.
pub const ADDRESS_VALID: u8 = 0x01;

/// Status byte: erase refused, sector count out of bounds.
pub const ERASE_INVALID_SECTOR_COUNT: u8 = 0x00;
/// Status byte: erase attempted and failed.
pub const ERASE_FAILED: u8 = 0x02;
/// Status byte: erase completed.
pub const ERASE_OK: u8 = 0x03;

/// Status byte: payload programming failed (or never started).
pub const WRITE_FAILED: u8 = 0x00;
/// Status byte: payload fully programmed.
pub const WRITE_OK: u8 = 0x01;

/// Status byte: protection change refused or failed.
pub const ROP_CHANGE_INVALID: u8 = 0x00;
/// Status byte: protection change applied.
pub const ROP_CHANGE_VALID: u8 = 0x01;

/// Bootloader version record reported by [`Command::GetVersion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Vendor identifier.
    pub vendor_id: u8,
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Patch version.
    pub patch: u8,
}

impl Version {
    /// Wire representation, in reply order.
    pub const fn as_bytes(self) -> [u8; 4] {
        [self.vendor_id, self.major, self.minor, self.patch]
    }
}

/// Build-configured version of this bootloader.
pub const VERSION: Version = Version {
    vendor_id: 100,
    major: 1,
    minor: 0,
    patch: 0,
};

/// Identity reported to the host: version plus the device id the board
/// crate read from the debug MCU registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Bootloader version record.
    pub version: Version,
    /// 16-bit device identifier.
    pub chip_id: u16,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            version: VERSION,
            // STM32F407 DBGMCU IDCODE device id.
            chip_id: 0x0413,
        }
    }
}
