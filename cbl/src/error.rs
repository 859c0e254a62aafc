//! Error types for cbl.

use thiserror::Error;

/// Failure of the byte transport carrying host frames.
///
/// Either kind is fatal to the current exchange: the dispatcher abandons
/// the frame and reports [`Status::Nacked`](crate::Status::Nacked).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The peer did not deliver the requested bytes in time.
    #[error("timed out waiting for the host")]
    Timeout,

    /// Link-level receive or transmit failure.
    #[error("transport link failure")]
    Link,
}

/// Failure reported by the flash or option-byte driver.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// The flash control interface could not be unlocked or relocked.
    #[error("flash control interface lock error")]
    Lock,

    /// The erase operation reported a faulty sector.
    #[error("erase reported a faulty sector")]
    Sector,

    /// Programming a byte did not complete.
    #[error("byte programming failed")]
    Program,

    /// An option-byte program or launch step failed.
    #[error("option byte operation failed")]
    OptionBytes,
}
