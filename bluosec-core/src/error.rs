//! Core error types.

use bluosec_eeprom::EepromError;
use bluosec_protocol::ProtocolError;
use thiserror::Error;

/// Errors from the protocol engine.
///
/// None of these reach the requester as-is. The engine maps them to error
/// pairs or silence and keeps running.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("EEPROM error: {0}")]
    Eeprom(#[from] EepromError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("unknown config field: {0}")]
    UnknownField(String),

    #[error("invalid controller config: {reason}")]
    InvalidConfig { reason: String },
}

impl CoreError {
    /// Returns whether this error indicates the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Eeprom(e) if e.is_retryable())
    }

    /// Short label for logs and metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Eeprom(_) => "EEPROM_ERROR",
            CoreError::Protocol(ProtocolError::PayloadFull { .. }) => "PAYLOAD_FULL",
            CoreError::Protocol(_) => "PROTOCOL_ERROR",
            CoreError::UnknownField(_) => "UNKNOWN_FIELD",
            CoreError::InvalidConfig { .. } => "BAD_CONFIG",
        }
    }
}
