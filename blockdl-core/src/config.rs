//! Downloader configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via BLOCKDL_CONFIG or --config)
//! 3. Environment variables

use blockdl_client::config::{DEFAULT_BASE_URL, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use blockdl_client::ClientConfig;
use blockdl_protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "WEB3DL_API_KEY";

/// Downloader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API configuration.
    pub api: ApiConfig,
    /// Frame decoder configuration.
    pub decoder: DecoderConfig,
    /// CSV output configuration.
    pub output: OutputConfig,
    /// Progress reporting configuration.
    pub progress: ProgressConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("BLOCKDL_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.api.apply_env_overrides();
        self.decoder.apply_env_overrides();
        self.output.apply_env_overrides();
        self.progress.apply_env_overrides();
    }

    /// Saves configuration to a YAML file.
    ///
    /// The API key is written as-is; keep such files private.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        self.output.validate()?;
        if self.progress.update_interval == 0 {
            return Err(ConfigError::ValidationError(
                "progress.update_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the stream client configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api.api_key.clone().unwrap_or_default())
            .with_base_url(self.api.base_url.clone())
            .with_read_timeout(self.api.timeout())
            .with_chunk_size(self.api.chunk_size)
            .with_max_payload_size(self.decoder.max_payload())
    }

    /// Returns the CSV output path.
    pub fn output_path(&self) -> PathBuf {
        self.output.path()
    }
}

/// Remote API configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Stream endpoint; streams live at `{base_url}/{chain}/{table}`.
    pub base_url: String,
    /// API key. Usually supplied through `WEB3DL_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Read timeout in seconds.
    pub timeout_secs: u64,
    /// Largest chunk handed to the decoder, in bytes.
    pub chunk_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 5,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ApiConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("BLOCKDL_API_URL") {
            self.base_url = url;
        }

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Ok(timeout) = std::env::var("BLOCKDL_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.timeout_secs = secs;
            }
        }

        if let Ok(size) = std::env::var("BLOCKDL_CHUNK_SIZE") {
            if let Ok(n) = size.parse() {
                self.chunk_size = n;
            }
        }
    }

    /// Returns the read timeout as Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "API key not set (use --api-key or {})",
                    API_KEY_ENV
                )))
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_secs must be non-zero".to_string(),
            ));
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(ConfigError::ValidationError(format!(
                "api.chunk_size must be between {} and {} bytes, got {}",
                MIN_CHUNK_SIZE, MAX_CHUNK_SIZE, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Frame decoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Largest accepted payload in bytes (0 = unlimited).
    pub max_payload_size: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl DecoderConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(max) = std::env::var("BLOCKDL_MAX_PAYLOAD") {
            if let Ok(n) = max.parse() {
                self.max_payload_size = n;
            }
        }
    }

    /// Returns the payload ceiling, `None` when unlimited.
    pub fn max_payload(&self) -> Option<u32> {
        match self.max_payload_size {
            0 => None,
            n => Some(n),
        }
    }
}

/// CSV output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory.
    pub data_dir: PathBuf,
    /// Output file name within `data_dir`.
    pub file_name: String,
    /// Rows buffered between writes.
    pub batch_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            file_name: "dump.csv".to_string(),
            batch_size: crate::csv::DEFAULT_BATCH_SIZE,
        }
    }
}

impl OutputConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("BLOCKDL_DATA") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(size) = std::env::var("BLOCKDL_BATCH_SIZE") {
            if let Ok(n) = size.parse() {
                self.batch_size = n;
            }
        }
    }

    /// Returns the output file path.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.file_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "output.file_name must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "output.batch_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Progress reporting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Records between progress reports.
    pub update_interval: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            update_interval: crate::progress::DEFAULT_UPDATE_INTERVAL,
        }
    }
}

impl ProgressConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(interval) = std::env::var("BLOCKDL_PROGRESS_INTERVAL") {
            if let Ok(n) = interval.parse() {
                self.update_interval = n;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
