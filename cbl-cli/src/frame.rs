//! Host-side frame codec.
//!
//! Builds the length-framed requests the bootloader expects and decodes
//! the payloads of its replies. The trailing CRC-32 is computed with the
//! same software engine the device verifies with, over every byte from
//! the length prefix through the last parameter, and transmitted
//! little-endian like all multi-byte fields.

use byteorder::{ByteOrder, LittleEndian};
use cbl::crc::frame_crc;
use cbl::protocol::{Command, CRC_LEN};
use cbl::Crc32;

/// Largest parameter block one frame can carry (length byte maximum of
/// 255 minus the command code and the CRC).
pub const MAX_PARAMS: usize = 255 - 1 - CRC_LEN;

/// Encode a request frame: `[len][code][params][crc32]`.
///
/// # Panics
///
/// Panics if `params` exceeds [`MAX_PARAMS`]; callers chunk payloads
/// well below that bound.
pub fn encode(command: Command, params: &[u8]) -> Vec<u8> {
    assert!(params.len() <= MAX_PARAMS, "params exceed one frame");

    let mut out = vec![0u8, command.code()];
    out.extend_from_slice(params);
    // Everything after the length byte, CRC included.
    out[0] = (out.len() - 1 + CRC_LEN) as u8;
    let crc = frame_crc(&mut Crc32::new(), &out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Parameters of a `MemoryWrite` request: address, payload length byte,
/// payload.
pub fn write_params(address: u32, payload: &[u8]) -> Vec<u8> {
    let mut params = Vec::with_capacity(5 + payload.len());
    params.extend_from_slice(&address.to_le_bytes());
    params.push(payload.len() as u8);
    params.extend_from_slice(payload);
    params
}

/// Decode a `GetVersion` reply payload.
pub fn decode_version(payload: &[u8]) -> anyhow::Result<(u8, u8, u8, u8)> {
    match payload {
        [vendor, major, minor, patch] => Ok((*vendor, *major, *minor, *patch)),
        _ => anyhow::bail!("version reply has {} byte(s), expected 4", payload.len()),
    }
}

/// Decode a `GetChipId` reply payload.
pub fn decode_chip_id(payload: &[u8]) -> anyhow::Result<u16> {
    if payload.len() != 2 {
        anyhow::bail!("chip id reply has {} byte(s), expected 2", payload.len());
    }
    Ok(LittleEndian::read_u16(payload))
}

/// Decode a single-status-byte reply payload.
pub fn decode_status(payload: &[u8]) -> anyhow::Result<u8> {
    match payload {
        [status] => Ok(*status),
        _ => anyhow::bail!("status reply has {} byte(s), expected 1", payload.len()),
    }
}
