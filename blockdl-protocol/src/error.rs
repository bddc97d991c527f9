//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while framing or decoding a record stream.
///
/// Every variant is fatal to the stream it was raised on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("stream ended with incomplete record: {bytes_remaining} bytes remaining")]
    IncompleteRecord { bytes_remaining: usize },

    #[error("record too large: {size} bytes (max {max})")]
    RecordTooLarge { size: u64, max: u64 },
}

impl ProtocolError {
    /// Returns whether re-opening the stream could plausibly succeed.
    ///
    /// A truncated stream usually means the connection was cut short; an
    /// oversized header will be the same on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProtocolError::IncompleteRecord { .. })
    }
}
