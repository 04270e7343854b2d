//! Streamer configuration: defaults, environment variable names and the
//! optional TOML config file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::classifier::ResponsePolicy;
use crate::error::ConfigError;

/// Default values.
pub mod defaults {
    use std::time::Duration;

    /// Usable receive buffer; one byte below GRBL's 128-byte buffer.
    pub const RX_BUFFER_CAPACITY: usize = 127;
    pub const BAUD_RATE: u32 = 115_200;
    /// Written on connect to wake the controller.
    pub const WAKE_SEQUENCE: &str = "\r\n\r\n";
    pub const WAKE_SETTLE: Duration = Duration::from_secs(2);
    pub const BANNER_TIMEOUT: Duration = Duration::from_secs(1);
    /// Serial read timeout used for polling.
    pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);
}

/// Environment variable names.
pub mod env_vars {
    /// `true` switches log output to JSON.
    pub const LOG_JSON: &str = "GRBLSTREAM_LOG_JSON";
}

/// Baud rates the serial line can be configured for.
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115200, 230400,
];

/// Reject baud rates outside [`SUPPORTED_BAUD_RATES`].
pub fn validate_baud_rate(baud: u32) -> Result<u32, ConfigError> {
    if SUPPORTED_BAUD_RATES.contains(&baud) {
        Ok(baud)
    } else {
        Err(ConfigError::UnsupportedBaudRate(baud))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    pub serial: SerialSection,
    pub flow: FlowSection,
    pub wake: WakeSection,
}

/// `[serial]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    pub device: Option<String>,
    pub baud: u32,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            device: None,
            baud: defaults::BAUD_RATE,
        }
    }
}

/// `[flow]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlowSection {
    pub rx_buffer_capacity: usize,
    pub policy: ResponsePolicy,
}

impl Default for FlowSection {
    fn default() -> Self {
        Self {
            rx_buffer_capacity: defaults::RX_BUFFER_CAPACITY,
            policy: ResponsePolicy::Strict,
        }
    }
}

/// `[wake]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WakeSection {
    pub enabled: bool,
    pub sequence: String,
    pub settle_ms: u64,
    pub banner_timeout_ms: u64,
}

impl Default for WakeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            sequence: defaults::WAKE_SEQUENCE.to_string(),
            settle_ms: defaults::WAKE_SETTLE.as_millis() as u64,
            banner_timeout_ms: defaults::BANNER_TIMEOUT.as_millis() as u64,
        }
    }
}

impl WakeSection {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn banner_timeout(&self) -> Duration {
        Duration::from_millis(self.banner_timeout_ms)
    }
}

impl StreamerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: StreamerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&content)
    }

    /// Check values a session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_baud_rate(self.serial.baud)?;
        if self.flow.rx_buffer_capacity == 0 {
            return Err(ConfigError::InvalidCapacity(0));
        }
        Ok(())
    }
}
