//! Streaming session driver.
//!
//! Wakes the controller, runs the flow-control loop to completion and
//! reports the outcome with cumulative send/acknowledge counts.

use std::io::BufRead;
use std::time::{Duration, Instant};

use crate::classifier::{trim_response, ResponsePolicy};
use crate::command::CommandSource;
use crate::config::{defaults, StreamerConfig};
use crate::error::{StreamError, TransportError};
use crate::events::{EventSink, StreamEvent};
use crate::scheduler::FlowScheduler;
use crate::transport::{ReadTimeout, Transport};

/// Wake-up handshake performed before streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeHandshake {
    /// Bytes written to wake the controller.
    pub sequence: String,
    /// Pause before flushing startup output.
    pub settle: Duration,
    /// How long to wait for a banner line.
    pub banner_timeout: Duration,
}

impl Default for WakeHandshake {
    fn default() -> Self {
        Self {
            sequence: defaults::WAKE_SEQUENCE.to_string(),
            settle: defaults::WAKE_SETTLE,
            banner_timeout: defaults::BANNER_TIMEOUT,
        }
    }
}

/// Session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub rx_buffer_capacity: usize,
    pub policy: ResponsePolicy,
    /// `None` skips the wake handshake.
    pub wake: Option<WakeHandshake>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rx_buffer_capacity: defaults::RX_BUFFER_CAPACITY,
            policy: ResponsePolicy::Strict,
            wake: Some(WakeHandshake::default()),
        }
    }
}

impl From<&StreamerConfig> for SessionConfig {
    fn from(config: &StreamerConfig) -> Self {
        let wake = config.wake.enabled.then(|| WakeHandshake {
            sequence: config.wake.sequence.clone(),
            settle: config.wake.settle(),
            banner_timeout: config.wake.banner_timeout(),
        });

        Self {
            rx_buffer_capacity: config.flow.rx_buffer_capacity,
            policy: config.flow.policy,
            wake,
        }
    }
}

/// Terminal state of a session.
#[derive(Debug)]
pub enum SessionOutcome {
    Completed,
    Aborted(StreamError),
}

/// What a session did.
#[derive(Debug)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Commands written to the link.
    pub sent: usize,
    /// Commands acknowledged by the controller.
    pub acknowledged: usize,
    /// Commands still in flight when the session ended (abandoned on abort).
    pub outstanding: usize,
    pub elapsed: Duration,
}

impl SessionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Completed)
    }

    /// Process exit status: 0 on completion, 1 on abort.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// The abort reason, if any.
    pub fn error(&self) -> Option<&StreamError> {
        match &self.outcome {
            SessionOutcome::Completed => None,
            SessionOutcome::Aborted(err) => Some(err),
        }
    }
}

/// Drives one streaming session over borrowed collaborators.
#[derive(Debug, Clone, Default)]
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Wake the controller and read its banner.
    ///
    /// Only the wake write can fail; a missing or unreadable banner is
    /// logged and otherwise ignored.
    pub fn wake<T, S>(
        &self,
        handshake: &WakeHandshake,
        transport: &mut T,
        sink: &mut S,
    ) -> Result<Option<String>, TransportError>
    where
        T: Transport + ?Sized,
        S: EventSink + ?Sized,
    {
        tracing::debug!("Waking up GRBL...");
        transport.send(handshake.sequence.as_bytes())?;
        if !handshake.settle.is_zero() {
            std::thread::sleep(handshake.settle);
        }
        transport.discard_input()?;
        tracing::debug!("GRBL woken up");

        match transport.receive_line(ReadTimeout::Bounded(handshake.banner_timeout)) {
            Ok(Some(raw)) => {
                let text = trim_response(&raw);
                if text.is_empty() {
                    return Ok(None);
                }
                sink.emit(&StreamEvent::Banner {
                    text: text.to_string(),
                });
                Ok(Some(text.to_string()))
            }
            Ok(None) => {
                tracing::debug!(timeout = ?handshake.banner_timeout, "No banner received");
                Ok(None)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Banner read failed");
                Ok(None)
            }
        }
    }

    /// Wake the controller (if configured) and stream `source` to completion.
    pub fn run<R, T, S>(
        &self,
        source: &mut CommandSource<R>,
        transport: &mut T,
        sink: &mut S,
    ) -> SessionReport
    where
        R: BufRead,
        T: Transport + ?Sized,
        S: EventSink + ?Sized,
    {
        let started = Instant::now();
        let mut scheduler =
            FlowScheduler::new(self.config.rx_buffer_capacity).with_policy(self.config.policy);

        let outcome = match self.stream(&mut scheduler, source, transport, sink) {
            Ok(()) => {
                tracing::info!(
                    sent = scheduler.sent_count(),
                    acknowledged = scheduler.acknowledged_count(),
                    "Streaming completed successfully"
                );
                SessionOutcome::Completed
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    abandoned = scheduler.pending(),
                    "Streaming halted"
                );
                SessionOutcome::Aborted(err)
            }
        };

        SessionReport {
            outcome,
            sent: scheduler.sent_count(),
            acknowledged: scheduler.acknowledged_count(),
            outstanding: scheduler.pending(),
            elapsed: started.elapsed(),
        }
    }

    fn stream<R, T, S>(
        &self,
        scheduler: &mut FlowScheduler,
        source: &mut CommandSource<R>,
        transport: &mut T,
        sink: &mut S,
    ) -> Result<(), StreamError>
    where
        R: BufRead,
        T: Transport + ?Sized,
        S: EventSink + ?Sized,
    {
        if let Some(handshake) = &self.config.wake {
            self.wake(handshake, transport, sink)?;
        }
        scheduler.run(source, transport, sink)
    }
}
