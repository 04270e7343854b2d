//! Flow-controlled G-code streaming for GRBL-class controllers.
//!
//! Provides:
//! - Command source with comment stripping and one-line lookahead
//! - Line-oriented transport over a serial port
//! - Character-counting flow-control scheduler
//! - Response classification
//! - Session driver with wake-up handshake and outcome report

pub mod classifier;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod session;
pub mod transport;

// Re-exports
pub use classifier::{classify, ResponseClass, ResponsePolicy};

pub use command::{normalize, Command, CommandSource};

pub use config::{validate_baud_rate, StreamerConfig, SUPPORTED_BAUD_RATES};

pub use error::{ConfigError, StreamError, TransportError};

pub use events::{EventSink, NullSink, StreamEvent, TracingSink};

pub use scheduler::FlowScheduler;

pub use session::{Session, SessionConfig, SessionOutcome, SessionReport, WakeHandshake};

pub use transport::{LineBuffer, ReadTimeout, SerialTransport, Transport};
