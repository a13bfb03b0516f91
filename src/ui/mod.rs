//! Output rendering on top of the core backends.
//!
//! - **pinned**: print/input pair keeping the prompt on the bottom row
//! - **color**: 24-bit foreground color sequences
//! - **width**: display width in terminal cells
//! - **ansi**: cursor movement and clear sequences

pub mod ansi;
pub mod color;
pub mod pinned;
pub mod width;

pub use color::{paint, rgb_escape, write_colored, ColorSpec, Rgb};
pub use pinned::{scroll_distance, PinnedOutput, PrintOptions, RESERVE_LINE};
pub use width::{char_width, display_width};
