//! Display width in terminal cells
//!
//! East-Asian Wide and Fullwidth characters take two cells; everything else
//! is counted as one. The sum is per character, so the width of a
//! concatenation is the sum of the widths.

use unicode_width::UnicodeWidthChar;

/// Cells occupied by one character
pub fn char_width(c: char) -> usize {
    match c.width() {
        Some(2) => 2,
        // Control and zero-width characters still count as one cell here
        _ => 1,
    }
}

/// Cells occupied by `text`
pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}
