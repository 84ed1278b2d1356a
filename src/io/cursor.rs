//! Line cursor with single-line lookahead.
//!
//! The `.dat` parsers are line-oriented state machines; the remanence parser
//! additionally needs to pair a set-field line with the measurement line that
//! follows it. Rather than hiding a second read inside a loop body, the
//! cursor makes the lookahead explicit: `peek` exposes the next line without
//! consuming it, `next_line` consumes it.

use std::io::BufRead;

use crate::error::LoadError;

pub struct LineCursor<R> {
    reader: R,
    peeked: Option<Option<String>>,
    consumed: usize,
}

impl<R: BufRead> LineCursor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            peeked: None,
            consumed: 0,
        }
    }

    /// 1-based number of the most recently consumed line (0 before any read).
    pub fn line_number(&self) -> usize {
        self.consumed
    }

    /// Look at the next line without consuming it.
    pub fn peek(&mut self) -> Result<Option<&str>, LoadError> {
        if self.peeked.is_none() {
            let next = self.read_raw()?;
            self.peeked = Some(next);
        }
        Ok(self.peeked.as_ref().and_then(|l| l.as_deref()))
    }

    /// Consume and return the next line, `None` at end of stream.
    pub fn next_line(&mut self) -> Result<Option<String>, LoadError> {
        let line = match self.peeked.take() {
            Some(line) => line,
            None => self.read_raw()?,
        };
        if line.is_some() {
            self.consumed += 1;
        }
        Ok(line)
    }

    fn read_raw(&mut self) -> Result<Option<String>, LoadError> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        // Instrument exports occasionally carry stray non-UTF-8 bytes in
        // comment lines; decode lossily instead of failing the whole load.
        let mut line = String::from_utf8_lossy(&buf).into_owned();
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let mut cursor = LineCursor::new("a\nb\r\nc".as_bytes());
        assert_eq!(cursor.peek().unwrap(), Some("a"));
        assert_eq!(cursor.line_number(), 0);
        assert_eq!(cursor.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(cursor.line_number(), 1);
        assert_eq!(cursor.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(cursor.peek().unwrap(), Some("c"));
        assert_eq!(cursor.next_line().unwrap().as_deref(), Some("c"));
        assert_eq!(cursor.next_line().unwrap(), None);
        assert_eq!(cursor.peek().unwrap(), None);
    }

    #[test]
    fn non_utf8_bytes_are_decoded_lossily() {
        let mut cursor = LineCursor::new(&b"ok\n\xff\xfe comment\n"[..]);
        assert_eq!(cursor.next_line().unwrap().as_deref(), Some("ok"));
        assert!(cursor.next_line().unwrap().is_some());
    }
}
