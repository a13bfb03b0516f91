//! ANSI sequence strings
//!
//! Commands are rendered to strings and written as bytes, so the same
//! sequences reach any `Write` target regardless of platform.

use crossterm::cursor::{MoveTo, MoveUp};
use crossterm::terminal::{Clear, ClearType};
use crossterm::Command;

pub(crate) fn ansi<C: Command>(command: C) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = command.write_ansi(&mut out);
    out
}

/// Move to zero-based (row, column)
pub fn move_to(row: u16, column: u16) -> String {
    ansi(MoveTo(column, row))
}

/// Move up `n` rows; empty for zero
pub fn cursor_up(n: u16) -> String {
    if n == 0 {
        return String::new();
    }
    ansi(MoveUp(n))
}

/// Erase the row under the cursor
pub fn clear_line() -> String {
    ansi(Clear(ClearType::CurrentLine))
}

/// Clear the whole screen and home the cursor
pub fn clear_screen() -> String {
    format!("{}{}", ansi(Clear(ClearType::All)), move_to(0, 0))
}
