//! In-memory backend for tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    decode_utf8, Backend, CursorPosition, ErrorCode, Result, TerminalError, TerminalGeometry,
};
use crate::core::line::{strip_terminator, LineSource};
use crate::core::raw::{with_raw_mode, RawModeSwitch};

const COOKED_MODE: u32 = 0x1F;
const RAW_MODE: u32 = 0x00;

struct MockState {
    cursor: CursorPosition,
    size: TerminalGeometry,
    mode: u32,
    input: VecDeque<u8>,
    moves: Vec<CursorPosition>,
    fail_queries: bool,
    fail_size: bool,
    fail_restore: bool,
    fail_enter: bool,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                cursor: CursorPosition::default(),
                size: TerminalGeometry::new(columns, rows),
                mode: COOKED_MODE,
                input: VecDeque::new(),
                moves: Vec::new(),
                fail_queries: false,
                fail_size: false,
                fail_restore: false,
                fail_enter: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    pub fn place_cursor(&self, row: u16, column: u16) {
        self.lock().cursor = CursorPosition::new(row, column);
    }

    pub fn cursor(&self) -> CursorPosition {
        self.lock().cursor
    }

    pub fn resize(&self, columns: u16, rows: u16) {
        self.lock().size = TerminalGeometry::new(columns, rows);
    }

    pub fn push_input(&self, bytes: &[u8]) {
        self.lock().input.extend(bytes.iter().copied());
    }

    pub fn moves(&self) -> Vec<CursorPosition> {
        self.lock().moves.clone()
    }

    pub fn fail_queries(&self, fail: bool) {
        self.lock().fail_queries = fail;
    }

    pub fn fail_size(&self, fail: bool) {
        self.lock().fail_size = fail;
    }

    pub fn fail_next_restore(&self) {
        self.lock().fail_restore = true;
    }

    /// Next raw-mode entry changes part of the mode, then fails
    pub fn fail_next_enter(&self) {
        self.lock().fail_enter = true;
    }

    pub fn mode(&self) -> u32 {
        self.lock().mode
    }

    pub fn is_raw(&self) -> bool {
        self.lock().mode == RAW_MODE
    }

    fn next_byte(&self) -> Result<u8> {
        self.lock().input.pop_front().ok_or_else(|| {
            TerminalError::Read(io::Error::new(io::ErrorKind::UnexpectedEof, "no input"))
        })
    }
}

impl RawModeSwitch for MockBackend {
    type Saved = u32;

    fn save(&self) -> Result<u32> {
        Ok(self.lock().mode)
    }

    fn enter_raw(&self, saved: &u32) -> Result<()> {
        let mut state = self.lock();
        if state.fail_enter {
            state.fail_enter = false;
            state.mode = saved & 0x0F;
            return Err(TerminalError::Set(io::Error::new(
                io::ErrorKind::Other,
                "tcsetattr failed",
            )));
        }
        state.mode = RAW_MODE;
        Ok(())
    }

    fn restore(&self, saved: &u32) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_restore {
            state.fail_restore = false;
            return Err(io::Error::new(io::ErrorKind::Other, "tcsetattr failed"));
        }
        state.mode = *saved;
        Ok(())
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn get_cursor_position(&self) -> Result<CursorPosition> {
        let state = self.lock();
        if state.fail_queries {
            return Err(TerminalError::Query(io::Error::new(
                io::ErrorKind::Other,
                "invalid handle",
            )));
        }
        Ok(state.cursor)
    }

    fn set_cursor_position(&self, pos: CursorPosition) -> Result<()> {
        let mut state = self.lock();
        if state.fail_queries {
            return Err(TerminalError::Set(io::Error::new(
                io::ErrorKind::Other,
                "invalid handle",
            )));
        }
        state.cursor = pos;
        state.moves.push(pos);
        Ok(())
    }

    fn read_raw_byte(&self) -> Result<u8> {
        with_raw_mode(self, || self.next_byte())
    }

    fn read_raw_char(&self) -> Result<char> {
        with_raw_mode(self, || {
            let first = self.next_byte()?;
            decode_utf8(first, || self.next_byte())
        })
    }

    fn enable_virtual_terminal_processing(&self) -> std::result::Result<(), ErrorCode> {
        Ok(())
    }

    fn terminal_size(&self) -> Result<TerminalGeometry> {
        let state = self.lock();
        if state.fail_size {
            return Err(TerminalError::Query(io::Error::new(
                io::ErrorKind::Other,
                "ioctl failed",
            )));
        }
        Ok(state.size)
    }

    fn line_source(&self) -> Box<dyn LineSource> {
        Box::new(MockLines {
            state: self.state.clone(),
        })
    }
}

/// Lines from the same queue as the raw reads; never echoes
struct MockLines {
    state: Arc<Mutex<MockState>>,
}

impl LineSource for MockLines {
    fn read_line(&mut self, _echo: &mut dyn FnMut(&str) -> Result<()>) -> Result<Option<String>> {
        let mut state = lock(&self.state);
        if state.input.is_empty() {
            return Ok(None);
        }
        let end = state
            .input
            .iter()
            .position(|&b| b == b'\n')
            .map_or(state.input.len(), |i| i + 1);
        let bytes: Vec<u8> = state.input.drain(..end).collect();
        let mut line = String::from_utf8_lossy(&bytes).into_owned();
        strip_terminator(&mut line);
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get_round_trip() {
        let mock = MockBackend::new(80, 24);
        for pos in [(0, 0), (5, 10), (23, 79)] {
            let pos = CursorPosition::from(pos);
            mock.set_cursor_position(pos).unwrap();
            assert_eq!(mock.get_cursor_position().unwrap(), pos);
        }
    }

    #[test]
    fn test_raw_char_restores_mode() {
        let mock = MockBackend::new(80, 24);
        mock.push_input("中x".as_bytes());

        assert_eq!(mock.read_raw_char().unwrap(), '中');
        assert!(!mock.is_raw());
        assert_eq!(mock.read_raw_byte().unwrap(), b'x');
        assert!(!mock.is_raw());

        // Empty input fails but still restores
        assert!(mock.read_raw_byte().is_err());
        assert_eq!(mock.mode(), COOKED_MODE);
    }

    #[test]
    fn test_lines_share_the_raw_input_queue() {
        let mock = MockBackend::new(80, 24);
        mock.push_input(b"key\nx");
        let mut lines = mock.line_source();
        let mut echo = |_: &str| -> Result<()> { Ok(()) };

        assert_eq!(lines.read_line(&mut echo).unwrap().as_deref(), Some("key"));
        assert_eq!(mock.read_raw_byte().unwrap(), b'x');
        assert_eq!(lines.read_line(&mut echo).unwrap(), None);
    }
}
