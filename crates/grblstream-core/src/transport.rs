//! Duplex byte channel to the controller.
//!
//! The scheduler only needs three things from the link: write one command,
//! read one response line, and drop whatever is buffered on the input side.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::config::defaults;
use crate::error::TransportError;

/// How long a line read may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTimeout {
    /// Block until a full line (or EOF) arrives.
    Indefinite,
    /// Give up after the given duration.
    Bounded(Duration),
}

/// Line-oriented duplex channel.
pub trait Transport {
    /// Write `bytes` as a single unbatched write and flush it.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read one line, terminator included.
    ///
    /// Returns `Ok(None)` when a bounded wait expires. If the channel closes
    /// mid-line the partial buffer is returned as the line; if it closes with
    /// nothing buffered the result is [`TransportError::Closed`].
    fn receive_line(&mut self, timeout: ReadTimeout) -> Result<Option<String>, TransportError>;

    /// Drop any input received but not yet read.
    fn discard_input(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }

    fn receive_line(&mut self, timeout: ReadTimeout) -> Result<Option<String>, TransportError> {
        (**self).receive_line(timeout)
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        (**self).discard_input()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }

    fn receive_line(&mut self, timeout: ReadTimeout) -> Result<Option<String>, TransportError> {
        (**self).receive_line(timeout)
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        (**self).discard_input()
    }
}

/// Accumulates raw input and splits it into lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Remove and return the first complete line, terminator included.
    pub fn take_line(&mut self) -> Option<String> {
        let end = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Remove and return whatever is buffered, if anything.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.bytes.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.bytes);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Transport over a serial port.
///
/// The port is polled with a short read timeout so that indefinite and
/// bounded waits share one read loop.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    buffer: LineBuffer,
}

impl SerialTransport {
    /// Open `device` at `baud`, 8N1, no flow control.
    pub fn open(device: &str, baud: u32) -> Result<Self, TransportError> {
        let port = serialport::new(device, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(defaults::READ_POLL_INTERVAL)
            .open()?;

        tracing::debug!(device, baud, "Serial port configured (8N1)");
        Ok(Self::new(port))
    }

    /// Wrap an already-configured port.
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            buffer: LineBuffer::new(),
        }
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive_line(&mut self, timeout: ReadTimeout) -> Result<Option<String>, TransportError> {
        let deadline = match timeout {
            ReadTimeout::Indefinite => None,
            ReadTimeout::Bounded(limit) => Some(Instant::now() + limit),
        };
        let mut chunk = [0u8; 64];

        loop {
            if let Some(line) = self.buffer.take_line() {
                return Ok(Some(line));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(None);
            }

            match self.port.read(&mut chunk) {
                Ok(0) => {
                    return match self.buffer.take_partial() {
                        Some(partial) => Ok(Some(partial)),
                        None => Err(TransportError::Closed),
                    };
                }
                Ok(n) => self.buffer.push(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::Input)?;
        self.buffer.clear();
        Ok(())
    }
}
