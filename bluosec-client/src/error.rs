//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] bluosec_protocol::ProtocolError),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    /// The controller answered with a checksum error echo.
    #[error("request rejected: checksum mismatch (controller calculated {calculated:#04x})")]
    ChecksumRejected { calculated: u8 },

    /// The controller answered with the error pair.
    #[error("request rejected by controller (address {address:#04x}, function {function:#04x})")]
    Rejected { address: u8, function: u8 },

    #[error("unexpected response: expected address {expected:#04x}, got {actual:#04x}")]
    UnexpectedResponse { expected: u8, actual: u8 },
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::Timeout
                | ClientError::ConnectionClosed
                | ClientError::ChecksumRejected { .. }
        )
    }
}
