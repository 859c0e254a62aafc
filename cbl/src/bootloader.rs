//! Command dispatcher and responder.
//!
//! [`Bootloader`] owns the receive buffer and every driver seam. One call
//! to [`Bootloader::fetch_and_handle`] serves exactly one host exchange:
//! read the length-framed command, verify its CRC, route it, reply. The
//! engine is consumed per call and handed back unless a validated jump
//! ends the dispatcher's life:
//!
//! ```ignore
//! let mut engine = Bootloader::new(uart, flash, option_bytes, crc);
//! let entry = loop {
//!     match engine.fetch_and_handle() {
//!         Dispatch::Served { engine: e, .. } => engine = e,
//!         Dispatch::Jump { entry } => break entry,
//!     }
//! };
//! // board code transfers execution to `entry` and never returns
//! ```

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info, warn};

use crate::crc;
use crate::flash::{self, EraseOutcome};
use crate::hal::{CrcAccumulator, FlashBank, OptionBytes, Transport};
use crate::memory_map;
use crate::protocol::{
    Command, DeviceIdentity, ACK, ADDRESS_INVALID, ADDRESS_VALID, CRC_LEN,
    ERASE_FAILED, ERASE_INVALID_SECTOR_COUNT, ERASE_OK, MIN_FRAME_LEN, NACK,
    ROP_CHANGE_INVALID, ROP_CHANGE_VALID, RX_BUFFER_LEN, SUPPORTED_COMMANDS,
    WRITE_FAILED, WRITE_OK,
};
use crate::rop::{self, RopOutcome};

/// Outcome of one exchange, as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The frame passed CRC and was answered with an ACK.
    Acked,
    /// No ACK was sent: transport failure, CRC mismatch (NACK sent), or
    /// a dropped unrecognized frame (nothing sent).
    Nacked,
}

/// Result of [`Bootloader::fetch_and_handle`].
///
/// A validated `JumpToAddress` does not return the engine: control is
/// about to leave the bootloader for good, so the dispatcher cannot be
/// called again.
pub enum Dispatch<T, F, O, C> {
    /// The exchange completed; the engine is ready for the next frame.
    Served {
        /// The engine, handed back for the next exchange.
        engine: Bootloader<T, F, O, C>,
        /// What the host observed.
        status: Status,
    },
    /// A validated jump request. The caller transfers execution to
    /// `entry` (Thumb bit already set) and never returns.
    Jump {
        /// Entry point to hand control to.
        entry: u32,
    },
}

/// The bootloader command engine.
///
/// Generic over the four collaborator seams so the complete command path
/// runs against fake drivers in tests and vendor-driver wrappers on the
/// target.
pub struct Bootloader<T, F, O, C> {
    transport: T,
    flash: F,
    option_bytes: O,
    crc: C,
    identity: DeviceIdentity,
    buf: [u8; RX_BUFFER_LEN],
}

impl<T, F, O, C> Bootloader<T, F, O, C>
where
    T: Transport,
    F: FlashBank,
    O: OptionBytes,
    C: CrcAccumulator,
{
    /// Create an engine with the default device identity.
    pub fn new(transport: T, flash: F, option_bytes: O, crc: C) -> Self {
        Self {
            transport,
            flash,
            option_bytes,
            crc,
            identity: DeviceIdentity::default(),
            buf: [0; RX_BUFFER_LEN],
        }
    }

    /// Override the identity reported by GetVersion/GetChipId.
    #[must_use]
    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Consume the engine and return its drivers.
    pub fn into_parts(self) -> (T, F, O, C) {
        (self.transport, self.flash, self.option_bytes, self.crc)
    }

    /// Receive and serve one host command frame.
    ///
    /// Reads the length byte, then the announced remainder, into the
    /// engine-owned buffer. A transport failure on either read abandons
    /// the exchange. Recognized commands pass through their handler
    /// (which gates on CRC and replies); unrecognized or runt frames are
    /// logged and dropped with no reply at all.
    pub fn fetch_and_handle(mut self) -> Dispatch<T, F, O, C> {
        self.buf.fill(0);

        if self.transport.receive(&mut self.buf[..1]).is_err() {
            warn!("failed to receive length byte");
            return Dispatch::Served {
                engine: self,
                status: Status::Nacked,
            };
        }

        let length = usize::from(self.buf[0]);
        if self.transport.receive(&mut self.buf[1..=length]).is_err() {
            warn!("failed to receive {length} frame byte(s)");
            return Dispatch::Served {
                engine: self,
                status: Status::Nacked,
            };
        }

        if length < MIN_FRAME_LEN {
            warn!("runt frame (length {length}), dropped");
            return Dispatch::Served {
                engine: self,
                status: Status::Nacked,
            };
        }

        let total = length + 1;
        let status = match Command::from_code(self.buf[1]) {
            Some(Command::GetVersion) => self.handle_get_version(total),
            Some(Command::GetHelp) => self.handle_get_help(total),
            Some(Command::GetChipId) => self.handle_get_chip_id(total),
            Some(Command::GetProtectionStatus) => self.handle_get_protection_status(total),
            Some(Command::JumpToAddress) => {
                let (status, entry) = self.handle_jump(total);
                if let Some(entry) = entry {
                    info!("transferring execution to 0x{entry:08X}");
                    return Dispatch::Jump { entry };
                }
                status
            },
            Some(Command::EraseFlash) => self.handle_erase(total),
            Some(Command::MemoryWrite) => self.handle_memory_write(total),
            Some(Command::ChangeProtectionLevel) => self.handle_change_protection(total),
            Some(reserved) => {
                // Declared in the help table but not routed; the host
                // sees a timeout, same as an unknown code.
                warn!("reserved command {reserved:?} not handled, frame dropped");
                Status::Nacked
            },
            None => {
                warn!("unrecognized command code 0x{:02X}, frame dropped", self.buf[1]);
                Status::Nacked
            },
        };

        Dispatch::Served {
            engine: self,
            status,
        }
    }

    /// Verify the frame CRC; on mismatch send the NACK and report false.
    fn gate(&mut self, total: usize) -> bool {
        let covered = total - CRC_LEN;
        let host_crc = LittleEndian::read_u32(&self.buf[covered..total]);
        if crc::verify(&mut self.crc, &self.buf[..covered], host_crc) {
            debug!("CRC verification passed");
            true
        } else {
            debug!("CRC verification failed");
            self.send_nack();
            false
        }
    }

    fn handle_get_version(&mut self, total: usize) -> Status {
        debug!("host requested bootloader version");
        if !self.gate(total) {
            return Status::Nacked;
        }
        let version = self.identity.version.as_bytes();
        self.send_ack(version.len() as u8);
        self.send_data(&version);
        Status::Acked
    }

    fn handle_get_help(&mut self, total: usize) -> Status {
        debug!("host requested supported command table");
        if !self.gate(total) {
            return Status::Nacked;
        }
        self.send_ack(SUPPORTED_COMMANDS.len() as u8);
        self.send_data(&SUPPORTED_COMMANDS);
        Status::Acked
    }

    fn handle_get_chip_id(&mut self, total: usize) -> Status {
        debug!("host requested chip id");
        if !self.gate(total) {
            return Status::Nacked;
        }
        let mut id = [0u8; 2];
        LittleEndian::write_u16(&mut id, self.identity.chip_id);
        self.send_ack(2);
        self.send_data(&id);
        Status::Acked
    }

    fn handle_get_protection_status(&mut self, total: usize) -> Status {
        debug!("host requested read-out protection level");
        if !self.gate(total) {
            return Status::Nacked;
        }
        self.send_ack(1);
        let level = rop::read_level(&mut self.option_bytes);
        self.send_data(&[level]);
        Status::Acked
    }

    /// Returns the entry address when the jump is validated; the
    /// dispatcher turns that into [`Dispatch::Jump`].
    fn handle_jump(&mut self, total: usize) -> (Status, Option<u32>) {
        debug!("host requested jump to address");
        if !self.gate(total) {
            return (Status::Nacked, None);
        }
        self.send_ack(1);

        let address = LittleEndian::read_u32(&self.buf[2..6]);
        if memory_map::is_valid_address(address) {
            debug!("jump address 0x{address:08X} accepted");
            self.send_data(&[ADDRESS_VALID]);
            // Thumb bit on the entry point.
            (Status::Acked, Some(address + 1))
        } else {
            warn!("jump address 0x{address:08X} outside every configured region");
            self.send_data(&[ADDRESS_INVALID]);
            (Status::Acked, None)
        }
    }

    fn handle_erase(&mut self, total: usize) -> Status {
        debug!("host requested flash erase");
        if !self.gate(total) {
            return Status::Nacked;
        }
        self.send_ack(1);

        let sector = self.buf[2];
        let count = self.buf[3];
        let status = match flash::erase(&mut self.flash, sector, count) {
            EraseOutcome::Completed => ERASE_OK,
            EraseOutcome::Failed => ERASE_FAILED,
            EraseOutcome::InvalidSectorCount => ERASE_INVALID_SECTOR_COUNT,
        };
        self.send_data(&[status]);
        Status::Acked
    }

    fn handle_memory_write(&mut self, total: usize) -> Status {
        debug!("host requested memory write");
        if !self.gate(total) {
            return Status::Nacked;
        }
        self.send_ack(1);

        let address = LittleEndian::read_u32(&self.buf[2..6]);
        let payload_len = usize::from(self.buf[6]);

        if !memory_map::is_valid_address(address) {
            warn!("write address 0x{address:08X} outside every configured region");
            self.send_data(&[ADDRESS_INVALID]);
            return Status::Acked;
        }

        let status = match self.buf.get(7..7 + payload_len) {
            Some(payload) => match flash::write(&mut self.flash, payload, address) {
                Ok(()) => WRITE_OK,
                Err(fault) => {
                    warn!("memory write failed: {fault}");
                    WRITE_FAILED
                },
            },
            None => {
                // Payload length byte runs past the frame buffer.
                warn!("payload length {payload_len} exceeds the receive buffer");
                WRITE_FAILED
            },
        };
        self.send_data(&[status]);
        Status::Acked
    }

    fn handle_change_protection(&mut self, total: usize) -> Status {
        debug!("host requested protection level change");
        if !self.gate(total) {
            return Status::Nacked;
        }
        self.send_ack(1);

        let requested = self.buf[2];
        let status = match rop::write_level(&mut self.option_bytes, requested) {
            RopOutcome::Valid => ROP_CHANGE_VALID,
            RopOutcome::Invalid => ROP_CHANGE_INVALID,
        };
        self.send_data(&[status]);
        Status::Acked
    }

    // Replies are fire and forget: there is no acknowledgement of an
    // acknowledgement, and a transport failure here is unrecoverable for
    // the exchange.

    fn send_ack(&mut self, reply_len: u8) {
        if self.transport.transmit(&[ACK, reply_len]).is_err() {
            debug!("ACK transmit failed");
        }
    }

    fn send_nack(&mut self) {
        if self.transport.transmit(&[NACK]).is_err() {
            debug!("NACK transmit failed");
        }
    }

    fn send_data(&mut self, data: &[u8]) {
        if self.transport.transmit(data).is_err() {
            debug!("reply transmit failed");
        }
    }
}
