//! Error types for streaming sessions.

use std::path::PathBuf;

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error on serial link: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial link closed by peer")]
    Closed,

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Reasons a streaming session can abort.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Controller reported an error: {response}")]
    Device { response: String },

    #[error("Failed to read command source: {0}")]
    Source(#[source] std::io::Error),

    #[error("Line {line} needs {wire_len} bytes but the receive buffer only holds {capacity}: {text}")]
    CommandTooLong {
        line: usize,
        text: String,
        wire_len: usize,
        capacity: usize,
    },
}

impl StreamError {
    /// The controller's literal message, when the abort came from the device.
    pub fn device_response(&self) -> Option<&str> {
        match self {
            StreamError::Device { response } => Some(response),
            _ => None,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    #[error("Receive buffer capacity must be positive, got {0}")]
    InvalidCapacity(usize),

    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T, E = StreamError> = std::result::Result<T, E>;
