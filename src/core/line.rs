//! Prompt line sources.
//!
//! A [`LineSource`] reads one line for the pinned prompt. Sources that
//! handle keystrokes themselves report the text typed so far through the
//! `echo` callback so the caller can redraw the prompt row under its own
//! lock; sources backed by a cooked terminal or a plain stream never call it.

use std::io::BufRead;

use super::backend::{Result, TerminalError};

pub trait LineSource: Send {
    /// Read one line, without its terminator. `Ok(None)` at end of input.
    fn read_line(&mut self, echo: &mut dyn FnMut(&str) -> Result<()>) -> Result<Option<String>>;
}

/// Lines from a buffered stream; the other end does its own echo.
pub struct StreamLines<R> {
    reader: R,
}

impl<R: BufRead + Send> StreamLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead + Send> LineSource for StreamLines<R> {
    fn read_line(&mut self, _echo: &mut dyn FnMut(&str) -> Result<()>) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).map_err(TerminalError::Read)? == 0 {
            return Ok(None);
        }
        strip_terminator(&mut line);
        Ok(Some(line))
    }
}

/// Drop trailing `\r`/`\n`; other whitespace is kept.
pub(crate) fn strip_terminator(line: &mut String) {
    let len = line.trim_end_matches(|c: char| c == '\r' || c == '\n').len();
    line.truncate(len);
}
