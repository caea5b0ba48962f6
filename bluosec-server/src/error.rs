//! Server error types.

use crate::config::ConfigError;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] bluosec_protocol::ProtocolError),

    #[error("core error: {0}")]
    Core(#[from] bluosec_core::CoreError),

    #[error("EEPROM error: {0}")]
    Eeprom(#[from] bluosec_eeprom::EepromError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServerError::Io(_) => true,
            ServerError::Core(e) => e.is_retryable(),
            ServerError::Eeprom(e) => e.is_retryable(),
            _ => false,
        }
    }
}
