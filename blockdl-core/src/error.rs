//! Core error types.

use blockdl_client::ClientError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the download pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("stream error: {0}")]
    Client(#[from] ClientError),

    #[error("failed to write output '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("consumer rejected record {sequence_key}: {reason}")]
    Rejected { sequence_key: u32, reason: String },
}

impl CoreError {
    /// Returns whether re-running the download could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Client(e) if e.is_retryable())
    }

    /// Returns whether the failure came from the stream's transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, CoreError::Client(e) if e.is_transport())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockdl_protocol::ProtocolError;

    #[test]
    fn test_retryable() {
        let err = CoreError::from(ClientError::Status {
            status: 502,
            body: String::new(),
        });
        assert!(err.is_retryable());
        assert!(err.is_transport());

        let err = CoreError::from(ClientError::from(ProtocolError::RecordTooLarge {
            size: 2,
            max: 1,
        }));
        assert!(!err.is_retryable());
        assert!(!err.is_transport());

        let err = CoreError::Output {
            path: PathBuf::from("/tmp/x.csv"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("/tmp/x.csv"));
    }
}
