//! Platform backends for raw console access.
//!
//! Two implementations sit behind the [`Backend`] trait:
//!
//! - **console** (Windows): native console API (`GetConsoleScreenBufferInfo`,
//!   `SetConsoleCursorPosition`, console input modes)
//! - **posix**: termios via `nix`, one reader thread for all terminal input
//!
//! All positions crossing this boundary use (row, column) ordering,
//! zero-based. Each backend translates to its native ordering internally.

use std::io;
use std::sync::Arc;
use thiserror::Error;

use super::line::LineSource;

#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod console;

#[cfg(test)]
pub(crate) mod mock;

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("Failed to query terminal: {0}")]
    Query(#[source] io::Error),

    #[error("Failed to set terminal state: {0}")]
    Set(#[source] io::Error),

    #[error("Invalid color format: {0:?}")]
    InvalidColorFormat(String),

    #[error("Invalid color component {name}={value} (expected 0-255)")]
    InvalidColorComponent { name: &'static str, value: i64 },

    #[error("No controlling terminal available")]
    Unavailable,

    #[error("Failed to restore terminal mode after raw read: {0}")]
    RawModeRestore(#[source] io::Error),

    #[error("Failed to read from terminal: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to terminal: {0}")]
    Write(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, TerminalError>;

/// Platform error code returned by [`Backend::enable_virtual_terminal_processing`].
pub type ErrorCode = i32;

/// Cursor location in character cells, (row, column), zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CursorPosition {
    pub row: u16,
    pub column: u16,
}

impl CursorPosition {
    pub const fn new(row: u16, column: u16) -> Self {
        Self { row, column }
    }
}

impl From<(u16, u16)> for CursorPosition {
    fn from((row, column): (u16, u16)) -> Self {
        Self { row, column }
    }
}

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    pub columns: u16,
    pub rows: u16,
}

impl TerminalGeometry {
    pub const fn new(columns: u16, rows: u16) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.columns == 0 || self.rows == 0
    }
}

/// Raw console operations shared by every platform.
pub trait Backend: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Current cursor location
    fn get_cursor_position(&self) -> Result<CursorPosition>;

    /// Move the cursor
    fn set_cursor_position(&self, pos: CursorPosition) -> Result<()>;

    /// Read one byte in raw mode, restoring the previous mode afterwards
    fn read_raw_byte(&self) -> Result<u8>;

    /// Read one decoded character in raw mode, restoring the previous mode afterwards
    fn read_raw_char(&self) -> Result<char>;

    /// Turn on ANSI escape interpretation where it is off by default.
    ///
    /// The error is the platform's native error code (`GetLastError` on
    /// Windows).
    fn enable_virtual_terminal_processing(&self) -> std::result::Result<(), ErrorCode>;

    /// Current terminal size
    fn terminal_size(&self) -> Result<TerminalGeometry>;

    /// Prompt line reader sharing this backend's input with the raw reads
    fn line_source(&self) -> Box<dyn LineSource>;
}

/// Select the backend for the host platform.
///
/// Fails with [`TerminalError::Unavailable`] when there is no terminal to
/// measure, since every later decision depends on the geometry.
pub fn detect() -> Result<Arc<dyn Backend>> {
    #[cfg(windows)]
    let backend: Arc<dyn Backend> = Arc::new(console::ConsoleBackend::new());
    #[cfg(unix)]
    let backend: Arc<dyn Backend> = match posix::PosixBackend::new() {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            tracing::debug!("No terminal on stdin: {}", e);
            return Err(TerminalError::Unavailable);
        }
    };

    match backend.terminal_size() {
        Ok(size) if !size.is_empty() => {
            tracing::info!(
                "Using {} backend, terminal {}x{}",
                backend.name(),
                size.columns,
                size.rows
            );
            Ok(backend)
        }
        Ok(_) | Err(_) => Err(TerminalError::Unavailable),
    }
}

/// Decode one UTF-8 scalar, pulling continuation bytes from `next`.
pub(crate) fn decode_utf8<F>(first: u8, mut next: F) -> Result<char>
where
    F: FnMut() -> Result<u8>,
{
    let len = match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return Err(invalid_utf8()),
    };

    let mut buf = [first, 0, 0, 0];
    for slot in buf.iter_mut().take(len).skip(1) {
        *slot = next()?;
    }

    std::str::from_utf8(&buf[..len])
        .ok()
        .and_then(|s| s.chars().next())
        .ok_or_else(invalid_utf8)
}

fn invalid_utf8() -> TerminalError {
    TerminalError::Read(io::Error::new(
        io::ErrorKind::InvalidData,
        "invalid UTF-8 in raw input",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(bytes: &[u8]) -> Result<char> {
        let mut rest = bytes[1..].iter().copied();
        decode_utf8(bytes[0], || {
            rest.next().ok_or_else(|| {
                TerminalError::Read(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"))
            })
        })
    }

    #[test]
    fn test_decode_ascii() {
        assert_eq!(feed(b"a").unwrap(), 'a');
    }

    #[test]
    fn test_decode_multibyte() {
        assert_eq!(feed("中".as_bytes()).unwrap(), '中');
        assert_eq!(feed("é".as_bytes()).unwrap(), 'é');
        assert_eq!(feed("🦀".as_bytes()).unwrap(), '🦀');
    }

    #[test]
    fn test_decode_rejects_bad_lead_byte() {
        assert!(matches!(feed(&[0xFF]), Err(TerminalError::Read(_))));
        assert!(matches!(feed(&[0x80]), Err(TerminalError::Read(_))));
    }

    #[test]
    fn test_decode_truncated_sequence() {
        let bytes = "中".as_bytes();
        assert!(feed(&bytes[..2]).is_err());
    }

    #[test]
    fn test_cursor_position_tuple_is_row_column() {
        let pos = CursorPosition::from((3, 7));
        assert_eq!(pos.row, 3);
        assert_eq!(pos.column, 7);
    }
}
