//! Protocol error types.

use thiserror::Error;

/// Errors raised while building or strictly parsing frames.
///
/// The controller side never surfaces these to the requester: malformed hex
/// decodes to zero and checksum failures produce an error-echo response.
/// They exist for the requester side and for capacity violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("missing start delimiter: expected ':', got {0:#04x}")]
    MissingDelimiter(u8),

    #[error("missing frame terminator")]
    MissingTerminator,

    #[error("odd number of hex characters: {0}")]
    OddHexLength(usize),

    #[error("invalid hex character {0:#04x} at position {1}")]
    InvalidHexDigit(u8, usize),

    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("frame too short: {size} bytes (min {min})")]
    FrameTooShort { size: usize, min: usize },

    #[error("payload full: capacity is {capacity} pairs")]
    PayloadFull { capacity: usize },

    #[error("unknown address: {0:#04x}")]
    UnknownAddress(u8),

    #[error("unknown function: {0:#04x}")]
    UnknownFunction(u8),

    #[error("unknown code: {0:#04x}")]
    UnknownCode(u8),
}
