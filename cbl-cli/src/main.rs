//! cbl CLI - host-side tool for the CBL serial bootloader.
//!
//! Talks the bootloader's length-framed command protocol over a serial
//! port: query identity, erase flash, program binaries, change the
//! read-out protection level, and hand execution to an application.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cbl::protocol::{
    Command, ADDRESS_VALID, ERASE_FAILED, ERASE_INVALID_SECTOR_COUNT, ERASE_OK,
    ROP_CHANGE_VALID, SUPPORTED_COMMANDS, WRITE_OK,
};
use cbl::rop::ProtectionLevel;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

mod frame;
mod link;

use link::Link;

/// Payload bytes per MemoryWrite frame.
const WRITE_CHUNK: usize = 128;

/// cbl - host tool for the CBL serial bootloader.
///
/// Environment variables:
///   CBL_PORT     - Default serial port
///   CBL_BAUD     - Default baud rate (default: 115200)
///   CBL_TIMEOUT  - Reply timeout in seconds (default: 3)
#[derive(Parser)]
#[command(name = "cbl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port connected to the device.
    #[arg(short, long, global = true, env = "CBL_PORT")]
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long, global = true, default_value = "115200", env = "CBL_BAUD")]
    baud: u32,

    /// Reply timeout in seconds. Unrecognized commands are dropped by
    /// the bootloader without any reply, so this is also the unknown-
    /// command detector.
    #[arg(long, global = true, default_value = "3", env = "CBL_TIMEOUT")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read bootloader version, chip id and protection level.
    Info,

    /// List the command codes the bootloader advertises.
    Commands,

    /// Erase flash sectors, or the whole bank with --all.
    Erase {
        /// Mass-erase the entire flash bank.
        #[arg(long, conflicts_with_all = ["sector", "count"])]
        all: bool,

        /// First sector to erase.
        sector: Option<u8>,

        /// Number of sectors to erase.
        count: Option<u8>,
    },

    /// Program a binary file into RAM or flash.
    Write {
        /// Binary file to program.
        file: PathBuf,

        /// Target address (hex accepted, e.g. 0x08008000).
        #[arg(long, value_parser = parse_address)]
        address: u32,
    },

    /// Validate an address and transfer execution to it.
    Jump {
        /// Entry address (hex accepted).
        #[arg(value_parser = parse_address)]
        address: u32,
    },

    /// Change the read-out protection level (0 or 1).
    Protect {
        /// Requested level.
        level: u8,
    },
}

fn parse_address(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        trimmed.parse()
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // Argument-level refusals come before any port is opened.
    match &cli.command {
        Commands::Erase {
            all: false,
            sector,
            count,
        } if sector.is_none() || count.is_none() => {
            bail!("erase needs --all, or a sector and a count");
        },
        Commands::Protect { level } if matches!(*level, 0x02 | 0xCC) => {
            bail!("protection level 2 is irreversible and is refused by the bootloader");
        },
        _ => {},
    }

    let port = cli
        .port
        .as_deref()
        .context("no serial port given (use --port or CBL_PORT)")?;
    let mut link = Link::open(port, cli.baud, Duration::from_secs(cli.timeout))?;

    match cli.command {
        Commands::Info => info(&mut link),
        Commands::Commands => list_commands(&mut link),
        Commands::Erase { all, sector, count } => erase(&mut link, all, sector, count),
        Commands::Write { file, address } => write(&mut link, &file, address),
        Commands::Jump { address } => jump(&mut link, address),
        Commands::Protect { level } => protect(&mut link, level),
    }
}

fn info<P: std::io::Read + std::io::Write>(link: &mut Link<P>) -> Result<()> {
    let reply = link.exchange(&frame::encode(Command::GetVersion, &[]))?;
    let (vendor, major, minor, patch) = frame::decode_version(&reply)?;
    println!("Bootloader version: {major}.{minor}.{patch} (vendor {vendor})");

    let reply = link.exchange(&frame::encode(Command::GetChipId, &[]))?;
    let chip_id = frame::decode_chip_id(&reply)?;
    println!("Chip id:            0x{chip_id:04X}");

    let reply = link.exchange(&frame::encode(Command::GetProtectionStatus, &[]))?;
    let raw = frame::decode_status(&reply)?;
    let level = ProtectionLevel::from_option_byte(raw);
    println!("Read protection:    {level:?} (option byte 0x{raw:02X})");
    Ok(())
}

fn list_commands<P: std::io::Read + std::io::Write>(link: &mut Link<P>) -> Result<()> {
    let reply = link.exchange(&frame::encode(Command::GetHelp, &[]))?;
    if reply.as_slice() != SUPPORTED_COMMANDS {
        debug!("device table differs from the build-time table");
    }
    println!("Supported command codes:");
    for code in &reply {
        match Command::from_code(*code) {
            Some(command) => println!("  0x{code:02X}  {command:?}"),
            None => println!("  0x{code:02X}  (unknown to this tool)"),
        }
    }
    Ok(())
}

fn erase<P: std::io::Read + std::io::Write>(
    link: &mut Link<P>,
    all: bool,
    sector: Option<u8>,
    count: Option<u8>,
) -> Result<()> {
    let (sector, count) = if all {
        (cbl::flash::MASS_ERASE, 0)
    } else {
        // Presence checked before the port was opened.
        (sector.unwrap_or_default(), count.unwrap_or_default())
    };

    let reply = link.exchange(&frame::encode(Command::EraseFlash, &[sector, count]))?;
    match frame::decode_status(&reply)? {
        ERASE_OK => {
            println!("Erase complete");
            Ok(())
        },
        ERASE_INVALID_SECTOR_COUNT => bail!("erase refused: sector count out of range"),
        ERASE_FAILED => bail!("erase failed on the device"),
        other => bail!("unexpected erase status 0x{other:02X}"),
    }
}

fn write<P: std::io::Read + std::io::Write>(
    link: &mut Link<P>,
    file: &PathBuf,
    address: u32,
) -> Result<()> {
    let data = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    if data.is_empty() {
        bail!("{} is empty", file.display());
    }

    let progress = ProgressBar::new(data.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {bytes}/{total_bytes} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for (index, chunk) in data.chunks(WRITE_CHUNK).enumerate() {
        let chunk_address = address + (index * WRITE_CHUNK) as u32;
        let request = frame::encode(Command::MemoryWrite, &frame::write_params(chunk_address, chunk));
        let reply = link.exchange(&request)?;
        let status = frame::decode_status(&reply)?;
        if status != WRITE_OK {
            progress.abandon_with_message("failed");
            bail!("write failed at 0x{chunk_address:08X} (status 0x{status:02X})");
        }
        progress.inc(chunk.len() as u64);
    }

    progress.finish_with_message("done");
    println!("Wrote {} byte(s) to 0x{address:08X}", data.len());
    Ok(())
}

fn jump<P: std::io::Read + std::io::Write>(link: &mut Link<P>, address: u32) -> Result<()> {
    let request = frame::encode(Command::JumpToAddress, &address.to_le_bytes());
    let reply = link.exchange(&request)?;
    match frame::decode_status(&reply)? {
        ADDRESS_VALID => {
            println!("Device accepted 0x{address:08X}; execution transferred, bootloader is gone");
            Ok(())
        },
        _ => bail!("device refused address 0x{address:08X}"),
    }
}

fn protect<P: std::io::Read + std::io::Write>(link: &mut Link<P>, level: u8) -> Result<()> {
    let reply = link.exchange(&frame::encode(Command::ChangeProtectionLevel, &[level]))?;
    match frame::decode_status(&reply)? {
        ROP_CHANGE_VALID => {
            println!("Protection level changed to {level}");
            Ok(())
        },
        _ => bail!("device refused the protection change"),
    }
}
