//! EEPROM error types.

use thiserror::Error;

/// Errors that can occur while reading or writing the EEPROM image.
#[derive(Debug, Error)]
pub enum EepromError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("offset {offset:#06x} out of range (size {size})")]
    OutOfRange { offset: u16, size: usize },

    #[error("image corrupted: CRC mismatch (expected {expected:#x}, got {actual:#x})")]
    Corrupted { expected: u32, actual: u32 },

    #[error("image size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("write rejected: {0}")]
    WriteRejected(String),
}

impl EepromError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EepromError::Io(_))
    }
}
