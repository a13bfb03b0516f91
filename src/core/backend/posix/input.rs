//! Terminal input queue
//!
//! One reader thread owns the terminal's input descriptor. Cursor position
//! reports (`ESC [ row ; col R`) are split out of the byte stream so a
//! pending prompt or raw read never sees them, and a cursor query never
//! loses its reply to another reader.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::super::{CursorPosition, Result, TerminalError};

const ESC: u8 = 0x1b;

#[derive(Debug, PartialEq, Eq)]
enum Scan {
    Partial,
    Report(CursorPosition),
    NotReport,
}

/// Classify a byte run starting with `ESC` against `ESC [ digits ; digits R`.
fn scan_report(seq: &[u8]) -> Scan {
    let mut fields = [0u32; 2];
    let mut field = 0;
    let mut digits = 0;

    for (i, &b) in seq.iter().enumerate() {
        match (i, b) {
            (0, ESC) | (1, b'[') => {}
            (0, _) | (1, _) => return Scan::NotReport,
            (_, b'0'..=b'9') if digits < 5 => {
                fields[field] = fields[field] * 10 + u32::from(b - b'0');
                digits += 1;
            }
            (_, b';') if field == 0 && digits > 0 => {
                field = 1;
                digits = 0;
            }
            (_, b'R') if field == 1 && digits > 0 && i + 1 == seq.len() => {
                // Reports are 1-based
                let to_cell = |v: u32| v.saturating_sub(1).min(u32::from(u16::MAX)) as u16;
                return Scan::Report(CursorPosition::new(to_cell(fields[0]), to_cell(fields[1])));
            }
            _ => return Scan::NotReport,
        }
    }
    Scan::Partial
}

#[derive(Default)]
struct QueueState {
    data: VecDeque<u8>,
    reports: VecDeque<CursorPosition>,
    /// Possible start of a report, not yet handed out
    held: Vec<u8>,
    awaiting_report: bool,
    closed: Option<io::ErrorKind>,
}

impl QueueState {
    fn feed(&mut self, chunk: &[u8]) {
        for &b in chunk {
            if self.held.is_empty() {
                if b == ESC {
                    self.held.push(b);
                } else {
                    self.data.push_back(b);
                }
                continue;
            }

            self.held.push(b);
            match scan_report(&self.held) {
                Scan::Partial => {}
                Scan::Report(pos) => {
                    trace!("Cursor report {:?}", pos);
                    self.reports.push_back(pos);
                    self.held.clear();
                }
                Scan::NotReport => {
                    // A second ESC may start the real report
                    let keep = if b == ESC { 1 } else { 0 };
                    let flush = self.held.len() - keep;
                    self.data.extend(self.held.drain(..flush));
                }
            }
        }

        // A lone ESC keystroke must not wait for more input
        if !self.awaiting_report {
            self.release_held();
        }
    }

    fn release_held(&mut self) {
        let held = std::mem::take(&mut self.held);
        self.data.extend(held);
    }

    fn close(&mut self, kind: io::ErrorKind) {
        self.closed.get_or_insert(kind);
        self.release_held();
    }
}

/// Bytes and cursor reports read from the terminal.
pub(crate) struct InputQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl InputQueue {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
        }
    }

    /// Start the reader thread on `device`.
    pub(crate) fn spawn(mut device: File) -> io::Result<Arc<Self>> {
        let queue = Arc::new(Self::new());
        let shared = queue.clone();

        thread::Builder::new()
            .name("pinline-input".to_string())
            .spawn(move || {
                let mut buf = [0u8; 1024];
                loop {
                    match device.read(&mut buf) {
                        Ok(0) => {
                            debug!("Terminal input closed");
                            shared.finish(io::ErrorKind::UnexpectedEof);
                            break;
                        }
                        Ok(n) => shared.push(&buf[..n]),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            debug!("Terminal read failed: {}", e);
                            shared.finish(e.kind());
                            break;
                        }
                    }
                }
            })?;

        Ok(queue)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, chunk: &[u8]) {
        self.lock().feed(chunk);
        self.ready.notify_all();
    }

    fn finish(&self, kind: io::ErrorKind) {
        self.lock().close(kind);
        self.ready.notify_all();
    }

    /// Next input byte, blocking until one arrives.
    pub(crate) fn next_byte(&self) -> Result<u8> {
        let mut state = self.lock();
        loop {
            if let Some(b) = state.data.pop_front() {
                return Ok(b);
            }
            if let Some(kind) = state.closed {
                return Err(TerminalError::Read(io::Error::new(kind, "Terminal input closed")));
            }
            state = self.ready.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Drop stale reports and hold back partial ones until [`wait_report`](Self::wait_report).
    pub(crate) fn expect_report(&self) {
        let mut state = self.lock();
        state.reports.clear();
        state.awaiting_report = true;
    }

    /// Wait for the report requested after [`expect_report`](Self::expect_report).
    pub(crate) fn wait_report(&self, timeout: Duration) -> Result<CursorPosition> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        let result = loop {
            if let Some(pos) = state.reports.pop_front() {
                break Ok(pos);
            }
            if let Some(kind) = state.closed {
                break Err(io::Error::new(kind, "Terminal input closed"));
            }
            let now = Instant::now();
            if now >= deadline {
                break Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "No cursor position report from the terminal",
                ));
            }
            state = self
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        };

        self.stop_awaiting(state);
        result.map_err(TerminalError::Query)
    }

    /// Abandon a query whose request never reached the terminal.
    pub(crate) fn cancel_report(&self) {
        self.stop_awaiting(self.lock());
    }

    fn stop_awaiting(&self, mut state: MutexGuard<'_, QueueState>) {
        state.awaiting_report = false;
        if !state.held.is_empty() {
            state.release_held();
            drop(state);
            self.ready.notify_all();
        }
    }
}
