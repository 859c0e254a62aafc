//! Read-out protection (ROP) level management.
//!
//! The protection level lives in a non-volatile option byte, separate
//! from program flash. Level 2 is a one-way transition that permanently
//! locks the device, so the engine refuses to program it no matter how
//! the request is encoded.

use log::{debug, warn};

use crate::hal::OptionBytes;

/// Host wire code for protection level 0 (no protection).
pub const LEVEL_0: u8 = 0x00;
/// Host wire code for protection level 1 (read protection).
pub const LEVEL_1: u8 = 0x01;
/// Host wire code for protection level 2 (irreversible full lock).
pub const LEVEL_2: u8 = 0x02;

/// Option-byte encoding of level 0.
pub const OB_LEVEL_0: u8 = 0xAA;
/// Option-byte encoding of level 1.
pub const OB_LEVEL_1: u8 = 0x55;
/// Option-byte encoding of level 2.
pub const OB_LEVEL_2: u8 = 0xCC;

/// Interpreted read-out protection level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionLevel {
    /// No read protection.
    Level0,
    /// Standard read protection, reversible with a mass erase.
    Level1,
    /// Full lock; cannot be left once entered.
    Level2,
}

impl ProtectionLevel {
    /// Interpret a raw option-byte value.
    ///
    /// The device treats any code other than the level-0 and level-2
    /// encodings as level 1.
    pub const fn from_option_byte(code: u8) -> Self {
        match code {
            OB_LEVEL_0 => Self::Level0,
            OB_LEVEL_2 => Self::Level2,
            _ => Self::Level1,
        }
    }
}

/// Outcome of a protection-level change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RopOutcome {
    /// The option bytes were programmed and applied.
    Valid,
    /// The request was refused or a programming step failed.
    Invalid,
}

/// Read the raw read-out protection option byte. No side effects.
pub fn read_level<O: OptionBytes>(option_bytes: &mut O) -> u8 {
    option_bytes.read_protection()
}

/// Change the read-out protection level.
///
/// Requests carrying either level-2 encoding are refused before any
/// driver call. Known wire codes are mapped to their option-byte
/// encodings; any other value is passed through to the driver unmapped,
/// matching the deployed protocol. The sequence is unlock, program,
/// launch, lock; every failing step after unlock still attempts the
/// lock.
pub fn write_level<O: OptionBytes>(option_bytes: &mut O, requested: u8) -> RopOutcome {
    if requested == LEVEL_2 || requested == OB_LEVEL_2 {
        warn!("refusing irreversible protection level 2 request (0x{requested:02X})");
        return RopOutcome::Invalid;
    }

    let encoded = match requested {
        LEVEL_0 => OB_LEVEL_0,
        LEVEL_1 => OB_LEVEL_1,
        other => other,
    };

    if option_bytes.unlock().is_err() {
        warn!("option byte unlock failed");
        return RopOutcome::Invalid;
    }

    if let Err(e) = option_bytes.program_protection(encoded) {
        warn!("option byte programming failed: {e}");
        let _ = option_bytes.lock();
        return RopOutcome::Invalid;
    }

    if let Err(e) = option_bytes.launch() {
        warn!("option byte launch failed: {e}");
        let _ = option_bytes.lock();
        return RopOutcome::Invalid;
    }

    if option_bytes.lock().is_err() {
        warn!("option byte lock failed");
        return RopOutcome::Invalid;
    }

    debug!("read-out protection programmed to 0x{encoded:02X}");
    RopOutcome::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlashError;

    /// Recording fake for the option-byte driver.
    #[derive(Default)]
    struct FakeOptionBytes {
        protection: u8,
        calls: Vec<&'static str>,
        programmed: Vec<u8>,
        fail_unlock: bool,
        fail_program: bool,
        fail_launch: bool,
        fail_lock: bool,
    }

    impl OptionBytes for FakeOptionBytes {
        fn read_protection(&mut self) -> u8 {
            self.protection
        }

        fn unlock(&mut self) -> Result<(), FlashError> {
            self.calls.push("unlock");
            if self.fail_unlock {
                return Err(FlashError::Lock);
            }
            Ok(())
        }

        fn lock(&mut self) -> Result<(), FlashError> {
            self.calls.push("lock");
            if self.fail_lock {
                return Err(FlashError::Lock);
            }
            Ok(())
        }

        fn program_protection(&mut self, code: u8) -> Result<(), FlashError> {
            self.calls.push("program");
            if self.fail_program {
                return Err(FlashError::OptionBytes);
            }
            self.programmed.push(code);
            Ok(())
        }

        fn launch(&mut self) -> Result<(), FlashError> {
            self.calls.push("launch");
            if self.fail_launch {
                return Err(FlashError::OptionBytes);
            }
            Ok(())
        }
    }

    #[test]
    fn level_two_requests_are_refused_without_driver_calls() {
        for code in [LEVEL_2, OB_LEVEL_2] {
            let mut ob = FakeOptionBytes::default();
            assert_eq!(write_level(&mut ob, code), RopOutcome::Invalid);
            assert!(ob.calls.is_empty());
        }
    }

    #[test]
    fn wire_levels_map_to_option_byte_encodings() {
        let mut ob = FakeOptionBytes::default();
        assert_eq!(write_level(&mut ob, LEVEL_0), RopOutcome::Valid);
        assert_eq!(write_level(&mut ob, LEVEL_1), RopOutcome::Valid);
        assert_eq!(ob.programmed, vec![OB_LEVEL_0, OB_LEVEL_1]);
    }

    #[test]
    fn full_sequence_runs_in_order() {
        let mut ob = FakeOptionBytes::default();
        assert_eq!(write_level(&mut ob, LEVEL_1), RopOutcome::Valid);
        assert_eq!(ob.calls, vec!["unlock", "program", "launch", "lock"]);
    }

    #[test]
    fn unlock_failure_short_circuits() {
        let mut ob = FakeOptionBytes {
            fail_unlock: true,
            ..FakeOptionBytes::default()
        };
        assert_eq!(write_level(&mut ob, LEVEL_1), RopOutcome::Invalid);
        assert_eq!(ob.calls, vec!["unlock"]);
    }

    #[test]
    fn program_failure_still_locks() {
        let mut ob = FakeOptionBytes {
            fail_program: true,
            ..FakeOptionBytes::default()
        };
        assert_eq!(write_level(&mut ob, LEVEL_0), RopOutcome::Invalid);
        assert_eq!(ob.calls, vec!["unlock", "program", "lock"]);
    }

    #[test]
    fn launch_failure_still_locks() {
        let mut ob = FakeOptionBytes {
            fail_launch: true,
            ..FakeOptionBytes::default()
        };
        assert_eq!(write_level(&mut ob, LEVEL_0), RopOutcome::Invalid);
        assert_eq!(ob.calls, vec!["unlock", "program", "launch", "lock"]);
    }

    #[test]
    fn lock_failure_invalidates_the_change() {
        let mut ob = FakeOptionBytes {
            fail_lock: true,
            ..FakeOptionBytes::default()
        };
        assert_eq!(write_level(&mut ob, LEVEL_1), RopOutcome::Invalid);
    }

    #[test]
    fn option_byte_codes_interpret_to_levels() {
        assert_eq!(
            ProtectionLevel::from_option_byte(OB_LEVEL_0),
            ProtectionLevel::Level0
        );
        assert_eq!(
            ProtectionLevel::from_option_byte(OB_LEVEL_2),
            ProtectionLevel::Level2
        );
        assert_eq!(
            ProtectionLevel::from_option_byte(0x13),
            ProtectionLevel::Level1
        );
    }
}
