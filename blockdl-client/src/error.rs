//! Client error types.

use blockdl_protocol::ProtocolError;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Returns whether the failure came from the transport rather than the
    /// stream contents.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Http(_) | ClientError::Status { .. }
                | ClientError::Timeout { .. }
        )
    }

    /// Returns whether re-opening the stream could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Timeout { .. } => true,
            ClientError::Status { status, .. } => *status == 429 || *status >= 500,
            ClientError::Protocol(e) => e.is_retryable(),
            _ => false,
        }
    }
}
