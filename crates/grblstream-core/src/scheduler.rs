//! Character-counting flow control.
//!
//! The controller acknowledges a line only after executing it, so waiting for
//! each `ok` before sending the next line would starve its planner. Instead the
//! sender keeps its own estimate of free space in the controller's receive
//! buffer and streams as many lines as fit. Each acknowledgment releases the
//! wire length of the oldest unacknowledged line.
//!
//! Invariant: `limit - capacity == sum(in_flight)` and `capacity <= limit`.

use std::collections::VecDeque;
use std::io::BufRead;

use crate::classifier::{trim_response, ResponseClass, ResponsePolicy};
use crate::command::{Command, CommandSource};
use crate::error::{Result, StreamError};
use crate::events::{EventSink, StreamEvent};
use crate::transport::{ReadTimeout, Transport};

/// Flow-control state for one session.
#[derive(Debug, Clone)]
pub struct FlowScheduler {
    limit: usize,
    capacity: usize,
    /// Wire lengths of unacknowledged commands, oldest first.
    in_flight: VecDeque<usize>,
    policy: ResponsePolicy,
    sent: usize,
    acknowledged: usize,
}

impl FlowScheduler {
    /// Create a scheduler for a receive buffer of `rx_buffer_capacity` bytes.
    pub fn new(rx_buffer_capacity: usize) -> Self {
        Self {
            limit: rx_buffer_capacity,
            capacity: rx_buffer_capacity,
            in_flight: VecDeque::new(),
            policy: ResponsePolicy::default(),
            sent: 0,
            acknowledged: 0,
        }
    }

    /// Set the response classification policy.
    pub fn with_policy(mut self, policy: ResponsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Free bytes believed available in the controller.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total receive buffer size.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of commands awaiting acknowledgment.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Wire lengths of unacknowledged commands, oldest first.
    pub fn in_flight(&self) -> impl Iterator<Item = usize> + '_ {
        self.in_flight.iter().copied()
    }

    /// Bytes currently occupied in the controller's buffer.
    pub fn outstanding_bytes(&self) -> usize {
        self.in_flight.iter().sum()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn sent_count(&self) -> usize {
        self.sent
    }

    pub fn acknowledged_count(&self) -> usize {
        self.acknowledged
    }

    /// Whether `command` may be sent right now.
    pub fn fits(&self, command: &Command) -> bool {
        command.wire_len() <= self.capacity
    }

    fn record_sent(&mut self, wire_len: usize) {
        self.capacity -= wire_len;
        self.in_flight.push_back(wire_len);
        self.sent += 1;
        self.check_invariant();
    }

    /// Release the oldest in-flight command. Returns its wire length.
    pub fn release_oldest(&mut self) -> Option<usize> {
        let wire_len = self.in_flight.pop_front()?;
        self.capacity += wire_len;
        self.acknowledged += 1;
        self.check_invariant();
        Some(wire_len)
    }

    fn check_invariant(&self) {
        debug_assert!(self.capacity <= self.limit);
        debug_assert_eq!(self.limit - self.capacity, self.outstanding_bytes());
    }

    /// Send every command that fits in the remaining capacity.
    ///
    /// A command that does not fit is pushed back into the source and
    /// retried on a later call. Returns the number of commands sent.
    pub fn admit<R, T, S>(
        &mut self,
        source: &mut CommandSource<R>,
        transport: &mut T,
        sink: &mut S,
    ) -> Result<usize>
    where
        R: BufRead,
        T: Transport + ?Sized,
        S: EventSink + ?Sized,
    {
        let mut admitted = 0;

        while self.capacity > 0 {
            let Some(command) = source.next_command().map_err(StreamError::Source)? else {
                break;
            };
            if !self.fits(&command) {
                source.push_back(command);
                break;
            }

            let wire_len = command.wire_len();
            transport.send(&command.to_wire())?;
            self.record_sent(wire_len);
            admitted += 1;

            sink.emit(&StreamEvent::Sent {
                line: command.line(),
                text: command.text().to_string(),
                wire_len,
                capacity: self.capacity,
            });
        }

        Ok(admitted)
    }

    /// Block until the oldest in-flight command is acknowledged.
    ///
    /// Informational replies are skipped; an error reply aborts with the
    /// controller's message and leaves the in-flight queue untouched.
    pub fn await_acknowledgment<T, S>(&mut self, transport: &mut T, sink: &mut S) -> Result<()>
    where
        T: Transport + ?Sized,
        S: EventSink + ?Sized,
    {
        sink.emit(&StreamEvent::Waiting {
            pending: self.pending(),
            capacity: self.capacity,
        });

        loop {
            let Some(raw) = transport.receive_line(ReadTimeout::Indefinite)? else {
                continue;
            };
            let text = trim_response(&raw);
            sink.emit(&StreamEvent::Response {
                text: text.to_string(),
            });

            match self.policy.classify(text) {
                ResponseClass::Acknowledged => {
                    match self.release_oldest() {
                        Some(wire_len) => sink.emit(&StreamEvent::Acknowledged {
                            wire_len,
                            capacity: self.capacity,
                        }),
                        None => tracing::warn!(
                            response = %text,
                            "Acknowledgment with nothing in flight"
                        ),
                    }
                    return Ok(());
                }
                ResponseClass::Error(response) => {
                    return Err(StreamError::Device { response });
                }
                ResponseClass::Informational => {
                    sink.emit(&StreamEvent::Ignored {
                        text: text.to_string(),
                    });
                }
            }
        }
    }

    /// Stream the whole source.
    ///
    /// Returns once the source is exhausted and every command has been
    /// acknowledged, or on the first transport, source or device error.
    pub fn run<R, T, S>(
        &mut self,
        source: &mut CommandSource<R>,
        transport: &mut T,
        sink: &mut S,
    ) -> Result<()>
    where
        R: BufRead,
        T: Transport + ?Sized,
        S: EventSink + ?Sized,
    {
        loop {
            self.admit(source, transport, sink)?;

            if self.is_idle() {
                // Idle means full capacity, so anything still unsent can never fit.
                let Some(command) = source.next_command().map_err(StreamError::Source)? else {
                    return Ok(());
                };
                return Err(StreamError::CommandTooLong {
                    line: command.line(),
                    text: command.text().to_string(),
                    wire_len: command.wire_len(),
                    capacity: self.limit,
                });
            }

            self.await_acknowledgment(transport, sink)?;
        }
    }
}
