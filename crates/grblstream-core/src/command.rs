//! G-code command source.
//!
//! Reads raw text lines, strips comments and trailing whitespace, and hands
//! out non-empty commands in file order. A single pushed-back command is held
//! in a lookahead slot so the scheduler can defer a line that does not fit yet
//! without repositioning the underlying reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Characters trimmed from the end of every line.
const TRAILING_WHITESPACE: &[char] = &[' ', '\t', '\r', '\n'];

/// Comment marker; everything from here to the end of the line is dropped.
const COMMENT_MARKER: char = ';';

/// A normalized command line ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    line: usize,
}

impl Command {
    /// Normalize `raw` into a command.
    ///
    /// Returns `None` if `raw` normalizes to nothing.
    pub fn parse(raw: &str, line: usize) -> Option<Self> {
        normalize(raw).map(|text| Self {
            text: text.to_string(),
            line,
        })
    }

    /// Command text without terminator.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 1-based line number in the source.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Bytes this command occupies in the receive buffer, terminator included.
    pub fn wire_len(&self) -> usize {
        self.text.len() + 1
    }

    /// Bytes written to the link for this command.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.wire_len());
        bytes.extend_from_slice(self.text.as_bytes());
        bytes.push(b'\n');
        bytes
    }
}

/// Strip the comment and trailing whitespace from a raw line.
///
/// Leading whitespace is kept. Returns `None` when nothing remains.
pub fn normalize(raw: &str) -> Option<&str> {
    let code = match raw.find(COMMENT_MARKER) {
        Some(pos) => &raw[..pos],
        None => raw,
    };
    let code = code.trim_end_matches(TRAILING_WHITESPACE);
    if code.trim_start().is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Forward-only source of commands with a one-slot lookahead.
pub struct CommandSource<R> {
    reader: R,
    lookahead: Option<Command>,
    line_no: usize,
    buf: Vec<u8>,
    exhausted: bool,
}

impl CommandSource<BufReader<File>> {
    /// Open a G-code file.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> CommandSource<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lookahead: None,
            line_no: 0,
            buf: Vec::new(),
            exhausted: false,
        }
    }

    /// Next command, or `None` at end of input.
    ///
    /// A pushed-back command is returned before anything new is read.
    /// Lines are read as raw bytes; the comment is cut before decoding, and
    /// invalid UTF-8 left in the code part is replaced rather than rejected.
    pub fn next_command(&mut self) -> std::io::Result<Option<Command>> {
        if let Some(command) = self.lookahead.take() {
            return Ok(Some(command));
        }

        while !self.exhausted {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                self.exhausted = true;
                break;
            }
            self.line_no += 1;

            let code = match self.buf.iter().position(|&b| b == COMMENT_MARKER as u8) {
                Some(pos) => &self.buf[..pos],
                None => &self.buf[..],
            };
            if let Some(command) = Command::parse(&String::from_utf8_lossy(code), self.line_no) {
                return Ok(Some(command));
            }
        }

        Ok(None)
    }

    /// Return a command to the lookahead slot.
    ///
    /// Only one command can be held; the slot must be empty.
    pub fn push_back(&mut self, command: Command) {
        debug_assert!(self.lookahead.is_none(), "lookahead slot already occupied");
        self.lookahead = Some(command);
    }

    /// Whether a command is waiting in the lookahead slot.
    pub fn has_pending(&self) -> bool {
        self.lookahead.is_some()
    }

    /// The command held in the lookahead slot, if any.
    pub fn pending(&self) -> Option<&Command> {
        self.lookahead.as_ref()
    }

    /// Number of raw lines read so far.
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for CommandSource<R> {
    type Item = std::io::Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_command().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(text: &str) -> CommandSource<Cursor<Vec<u8>>> {
        CommandSource::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_normalize_strips_comment_and_trailing_whitespace() {
        assert_eq!(normalize("G1 X10 ; move\r\n"), Some("G1 X10"));
        assert_eq!(normalize("G0 Y5\t \n"), Some("G0 Y5"));
        assert_eq!(normalize("M3 S1000"), Some("M3 S1000"));
    }

    #[test]
    fn test_normalize_skips_blank_and_comment_lines() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   \t\r\n"), None);
        assert_eq!(normalize("; header"), None);
        assert_eq!(normalize("   ; indented comment"), None);
    }

    #[test]
    fn test_normalize_keeps_leading_whitespace() {
        assert_eq!(normalize("  G1 X1\n"), Some("  G1 X1"));
    }

    #[test]
    fn test_normalize_idempotent() {
        let inputs = [
            "G1 X10 ; a",
            "  G2 X1 Y1 I0 J1\r\n",
            "$H",
            "G4 P0.5\t\t",
            "M5;;;",
        ];
        for raw in inputs {
            let once = normalize(raw).unwrap();
            assert_eq!(normalize(once), Some(once));
        }
    }

    #[test]
    fn test_wire_len_counts_terminator() {
        let cmd = Command::parse("G1 X10", 1).unwrap();
        assert_eq!(cmd.wire_len(), 7);
        assert_eq!(cmd.to_wire(), b"G1 X10\n".to_vec());
    }

    #[test]
    fn test_source_yields_commands_in_order() {
        let mut src = source("G1 X10\n; comment only\n  \nG1 Y10\n");

        let first = src.next_command().unwrap().unwrap();
        assert_eq!(first.text(), "G1 X10");
        assert_eq!(first.line(), 1);

        let second = src.next_command().unwrap().unwrap();
        assert_eq!(second.text(), "G1 Y10");
        assert_eq!(second.line(), 4);

        assert!(src.next_command().unwrap().is_none());
        assert!(src.next_command().unwrap().is_none());
        assert_eq!(src.lines_read(), 4);
    }

    #[test]
    fn test_source_last_line_without_newline() {
        let mut src = source("G0 X0\nM2");
        assert_eq!(src.next_command().unwrap().unwrap().text(), "G0 X0");
        assert_eq!(src.next_command().unwrap().unwrap().text(), "M2");
        assert!(src.next_command().unwrap().is_none());
    }

    #[test]
    fn test_push_back_returns_same_command() {
        let mut src = source("G1 X1\nG1 X2\n");
        let first = src.next_command().unwrap().unwrap();
        src.push_back(first.clone());
        assert!(src.has_pending());

        assert_eq!(src.next_command().unwrap(), Some(first));
        assert!(!src.has_pending());
        assert_eq!(src.next_command().unwrap().unwrap().text(), "G1 X2");
    }

    #[test]
    fn test_source_tolerates_non_utf8_comment() {
        let raw = b"G0 X1\nG0 Y1 ; caf\xe9\n; \xff\xfe header\nG0 X2\n".to_vec();
        let texts: Vec<String> = CommandSource::new(Cursor::new(raw))
            .map(|c| c.unwrap().text().to_string())
            .collect();
        assert_eq!(texts, vec!["G0 X1", "G0 Y1", "G0 X2"]);
    }

    #[test]
    fn test_source_replaces_invalid_utf8_in_code() {
        let mut src = CommandSource::new(Cursor::new(b"G0 \xb0\n".to_vec()));
        let cmd = src.next_command().unwrap().unwrap();
        assert_eq!(cmd.text(), "G0 \u{FFFD}");
        assert_eq!(cmd.line(), 1);
    }

    #[test]
    fn test_iterator_collects_all() {
        let texts: Vec<String> = source("G1\n\n;x\nG2 ; y\n")
            .map(|c| c.unwrap().text().to_string())
            .collect();
        assert_eq!(texts, vec!["G1", "G2"]);
    }
}
