//! Client configuration.

use crate::error::ClientError;
use blockdl_protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use std::fmt;
use std::time::Duration;

/// Default stream endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.web3dl.com/stream";

/// Default chunk size handed to the decoder (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Minimum chunk size (1 KiB).
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Maximum chunk size (1 MiB).
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Client configuration.
///
/// Passed explicitly to [`StreamClient::new`](crate::StreamClient::new);
/// nothing here is read from the process environment.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL; streams live at `{base_url}/{chain}/{table}`.
    pub base_url: String,
    /// Access credential sent as the `apikey` query parameter.
    pub api_key: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Maximum wait for response headers and for each body chunk.
    pub read_timeout: Duration,
    /// Largest chunk handed to the decoder at once.
    pub chunk_size: usize,
    /// Payload ceiling for the frame decoder (`None` = unbounded).
    pub max_payload_size: Option<u32>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_payload_size: Some(DEFAULT_MAX_PAYLOAD_SIZE),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        self
    }

    pub fn with_max_payload_size(mut self, max: Option<u32>) -> Self {
        self.max_payload_size = max;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.api_key.is_empty() {
            return Err(ClientError::InvalidConfig("api key not set".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ClientError::InvalidConfig(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "read timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("chunk_size", &self.chunk_size)
            .field("max_payload_size", &self.max_payload_size)
            .finish()
    }
}
