//! STM32F407 memory map and host-address validation.
//!
//! The table below lists every region the host may legitimately target
//! with a jump or a write. Anything outside it (peripheral space, the
//! option-byte block, reserved ranges) is refused before the hardware
//! is touched.

/// One contiguous addressable region, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// First valid address.
    pub base: u32,
    /// Last valid address.
    pub end: u32,
}

impl MemoryRegion {
    /// Whether `address` falls inside this region.
    pub const fn contains(&self, address: u32) -> bool {
        address >= self.base && address <= self.end
    }
}

/// Main SRAM bank 1 (112 KiB).
pub const SRAM1: MemoryRegion = MemoryRegion {
    base: 0x2000_0000,
    end: 0x2001_BFFF,
};

/// Main SRAM bank 2 (16 KiB).
pub const SRAM2: MemoryRegion = MemoryRegion {
    base: 0x2001_C000,
    end: 0x2001_FFFF,
};

/// Core-coupled data RAM (64 KiB).
pub const CCM_RAM: MemoryRegion = MemoryRegion {
    base: 0x1000_0000,
    end: 0x1000_FFFF,
};

/// On-chip flash (1 MiB).
pub const FLASH: MemoryRegion = MemoryRegion {
    base: 0x0800_0000,
    end: 0x080F_FFFF,
};

/// All regions a host-supplied address may target.
pub const REGIONS: [MemoryRegion; 4] = [SRAM1, SRAM2, CCM_RAM, FLASH];

/// Conventional user application base (flash sector 2).
pub const USER_APP_BASE: u32 = 0x0800_8000;

/// Whether `address` lies inside one of the configured regions.
pub fn is_valid_address(address: u32) -> bool {
    REGIONS.iter().any(|region| region.contains(address))
}
