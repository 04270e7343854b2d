//! Shared test helpers: a scripted in-memory transport.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;

use grblstream_core::{CommandSource, ReadTimeout, Transport, TransportError};

/// Operation observed on the link, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(String),
    Read(String),
    Discard,
}

/// Scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Line(String),
    Timeout,
    Fail(std::io::ErrorKind),
}

/// Transport that records writes and replays scripted replies.
///
/// Reads past the end of the script fail with `TransportError::Closed`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub ops: Vec<Op>,
    replies: VecDeque<Reply>,
    fail_write_at: Option<usize>,
    writes: usize,
    pub read_timeouts: Vec<ReadTimeout>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply line.
    pub fn reply(mut self, line: &str) -> Self {
        self.replies.push_back(Reply::Line(line.to_string()));
        self
    }

    /// Queue `n` copies of a reply line.
    pub fn replies(mut self, line: &str, n: usize) -> Self {
        for _ in 0..n {
            self.replies.push_back(Reply::Line(line.to_string()));
        }
        self
    }

    /// Queue an expired bounded read.
    pub fn timeout(mut self) -> Self {
        self.replies.push_back(Reply::Timeout);
        self
    }

    /// Queue a failed read.
    pub fn read_error(mut self, kind: std::io::ErrorKind) -> Self {
        self.replies.push_back(Reply::Fail(kind));
        self
    }

    /// Make the `index`-th write (0-based) fail.
    pub fn fail_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    /// Everything written, in order.
    pub fn written(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_write_at == Some(index) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "link down",
            )));
        }
        self.ops.push(Op::Write(String::from_utf8_lossy(bytes).into_owned()));
        Ok(())
    }

    fn receive_line(&mut self, timeout: ReadTimeout) -> Result<Option<String>, TransportError> {
        self.read_timeouts.push(timeout);
        match self.replies.pop_front() {
            Some(Reply::Line(line)) => {
                self.ops.push(Op::Read(line.clone()));
                Ok(Some(line))
            }
            Some(Reply::Timeout) => Ok(None),
            Some(Reply::Fail(kind)) => Err(TransportError::Io(std::io::Error::new(
                kind,
                "read failed",
            ))),
            None => Err(TransportError::Closed),
        }
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.ops.push(Op::Discard);
        Ok(())
    }
}

/// Command source over in-memory text.
pub fn source(text: &str) -> CommandSource<Cursor<Vec<u8>>> {
    CommandSource::new(Cursor::new(text.as_bytes().to_vec()))
}

/// Command source over a list of raw lines.
pub fn source_from_lines(lines: &[&str]) -> CommandSource<Cursor<Vec<u8>>> {
    let mut text = lines.join("\n");
    text.push('\n');
    source(&text)
}
