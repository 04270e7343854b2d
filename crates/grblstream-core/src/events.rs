//! Streaming lifecycle events.
//!
//! The scheduler reports every send and acknowledgment, with the running
//! buffer capacity, to an [`EventSink`]. The CLI renders them through
//! `tracing`; tests collect them into a `Vec`.

/// Observable streaming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Command written to the link.
    Sent {
        line: usize,
        text: String,
        wire_len: usize,
        /// Capacity left after the send.
        capacity: usize,
    },
    /// Oldest in-flight command acknowledged.
    Acknowledged {
        wire_len: usize,
        /// Capacity after releasing `wire_len`.
        capacity: usize,
    },
    /// About to block on the next reply.
    Waiting { pending: usize, capacity: usize },
    /// Trimmed reply read from the controller.
    Response { text: String },
    /// Informational reply skipped.
    Ignored { text: String },
    /// Startup banner seen after wake-up.
    Banner { text: String },
}

/// Receiver of streaming events.
pub trait EventSink {
    fn emit(&mut self, event: &StreamEvent);
}

impl EventSink for Vec<StreamEvent> {
    fn emit(&mut self, event: &StreamEvent) {
        self.push(event.clone());
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &StreamEvent) {
        (**self).emit(event)
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &StreamEvent) {}
}

/// Sink that renders events as tracing records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Sent {
                line,
                text,
                wire_len,
                capacity,
            } => {
                tracing::debug!(line, len = wire_len, available = capacity, "Sending: {}", text);
            }
            StreamEvent::Acknowledged { wire_len, capacity } => {
                tracing::debug!(freed = wire_len, available = capacity, "Received ok");
            }
            StreamEvent::Waiting { pending, capacity } => {
                tracing::debug!(pending, available = capacity, "Waiting for response");
            }
            StreamEvent::Response { text } => {
                tracing::debug!(response = %text, "Controller response");
            }
            StreamEvent::Ignored { text } => {
                tracing::warn!(response = %text, "Ignoring informational response");
            }
            StreamEvent::Banner { text } => {
                tracing::info!("Initial GRBL response: {}", text);
            }
        }
    }
}
