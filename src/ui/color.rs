//! 24-bit foreground color sequences
//!
//! Colors come in as an RGB triple or a `#rrggbb` hex code. Both are
//! validated before anything is written, so a bad color never leaves a
//! partial escape sequence on the terminal.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crossterm::style::{self, ResetColor, SetForegroundColor};

use super::ansi::ansi;
use crate::core::backend::{Result, TerminalError};

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `rrggbb`, with or without a leading `#`.
    pub fn from_hex(code: &str) -> Result<Self> {
        let digits = code.strip_prefix('#').unwrap_or(code);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TerminalError::InvalidColorFormat(code.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| TerminalError::InvalidColorFormat(code.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Build from wide integers, rejecting anything outside 0-255.
    pub fn from_components(r: i64, g: i64, b: i64) -> Result<Self> {
        let check = |name: &'static str, value: i64| {
            u8::try_from(value).map_err(|_| TerminalError::InvalidColorComponent { name, value })
        };
        Ok(Self::new(check("r", r)?, check("g", g)?, check("b", b)?))
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> style::Color {
        style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

impl FromStr for Rgb {
    type Err = TerminalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Unvalidated color input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpec {
    Hex(String),
    Components(i64, i64, i64),
}

impl ColorSpec {
    pub fn resolve(&self) -> Result<Rgb> {
        match self {
            ColorSpec::Hex(code) => Rgb::from_hex(code),
            ColorSpec::Components(r, g, b) => Rgb::from_components(*r, *g, *b),
        }
    }
}

impl From<&str> for ColorSpec {
    fn from(code: &str) -> Self {
        ColorSpec::Hex(code.to_string())
    }
}

impl From<String> for ColorSpec {
    fn from(code: String) -> Self {
        ColorSpec::Hex(code)
    }
}

impl From<(i64, i64, i64)> for ColorSpec {
    fn from((r, g, b): (i64, i64, i64)) -> Self {
        ColorSpec::Components(r, g, b)
    }
}

impl From<Rgb> for ColorSpec {
    fn from(rgb: Rgb) -> Self {
        ColorSpec::Components(rgb.r.into(), rgb.g.into(), rgb.b.into())
    }
}

/// Foreground color introducer, `ESC[38;2;r;g;bm`
pub fn rgb_escape(color: Rgb) -> String {
    ansi(SetForegroundColor(color.to_crossterm()))
}

/// Attribute reset, `ESC[0m`
pub fn reset_escape() -> String {
    ansi(ResetColor)
}

/// `text` wrapped in a color introducer and a reset
pub fn paint(color: Rgb, text: &str) -> String {
    format!("{}{}{}", rgb_escape(color), text, reset_escape())
}

/// Write colored text followed by a reset.
///
/// The reset is attempted even when writing the text failed, so the
/// terminal is not left colored. The first failure is returned.
pub fn write_colored<W: Write + ?Sized>(out: &mut W, color: Rgb, text: &str) -> Result<()> {
    out.write_all(rgb_escape(color).as_bytes())
        .map_err(TerminalError::Write)?;
    let body = out.write_all(text.as_bytes());
    let reset = out.write_all(reset_escape().as_bytes());
    body.map_err(TerminalError::Write)?;
    reset.map_err(TerminalError::Write)
}
