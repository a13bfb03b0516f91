//! Cursor save/restore
//!
//! Snapshot a cursor position, go draw somewhere else, then put the cursor
//! back. The snapshot is a plain value; the backend is passed per call.

use super::backend::{Backend, CursorPosition, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorSnapshot {
    position: CursorPosition,
}

impl CursorSnapshot {
    /// Snapshot the cursor's current position.
    pub fn capture(backend: &dyn Backend) -> Result<Self> {
        Ok(Self {
            position: backend.get_cursor_position()?,
        })
    }

    /// Re-record the cursor's current position.
    pub fn save(&mut self, backend: &dyn Backend) -> Result<()> {
        self.position = backend.get_cursor_position()?;
        Ok(())
    }

    /// Overwrite the stored position without touching the terminal.
    pub fn write(&mut self, pos: CursorPosition) {
        self.position = pos;
    }

    /// Move the terminal cursor to the stored position.
    pub fn load(&self, backend: &dyn Backend) -> Result<()> {
        backend.set_cursor_position(self.position)
    }

    pub fn position(&self) -> CursorPosition {
        self.position
    }
}
