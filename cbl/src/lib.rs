//! # cbl
//!
//! Device-side engine for the CBL serial bootloader protocol.
//!
//! The engine is the first code to run after reset on the target: it
//! receives length-framed commands over a serial link, gates every one
//! of them on a CRC-32 integrity check, and performs the privileged
//! operations a firmware-update agent needs: identity reporting, sector
//! and mass erase, byte-wise flash programming, read-out protection
//! changes, and transferring execution to an application.
//!
//! All hardware access goes through the trait seams in [`hal`], so the
//! complete command path, including the irreversible parts, runs
//! against fake drivers on a host machine. The crate is `no_std`; a
//! board crate supplies the UART, flash and option-byte wrappers, then
//! loops on [`Bootloader::fetch_and_handle`]:
//!
//! ```ignore
//! use cbl::{Bootloader, Crc32, Dispatch};
//!
//! let mut engine = Bootloader::new(uart, flash, option_bytes, Crc32::new());
//! let entry = loop {
//!     match engine.fetch_and_handle() {
//!         Dispatch::Served { engine: e, .. } => engine = e,
//!         Dispatch::Jump { entry } => break entry,
//!     }
//! };
//! board::jump_to(entry); // never returns
//! ```
//!
//! The companion `cbl-cli` crate drives the same wire protocol from the
//! host side of the link.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootloader;
pub mod crc;
pub mod error;
pub mod flash;
pub mod hal;
pub mod memory_map;
pub mod protocol;
pub mod rop;

// Re-exports for convenience
pub use {
    bootloader::{Bootloader, Dispatch, Status},
    crc::Crc32,
    error::{FlashError, TransportError},
    hal::{CrcAccumulator, FlashBank, OptionBytes, Transport},
    protocol::{Command, DeviceIdentity, Version},
    rop::ProtectionLevel,
};
