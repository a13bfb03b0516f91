//! pinline - pinned-bottom-line terminal output
//!
//! Program output scrolls above a reserved strip of bottom rows while the
//! prompt stays on the last row, with any number of threads printing at
//! once. Underneath sits a small cross-platform console layer: cursor
//! query/set, single raw keystrokes and 24-bit color.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pinline::{backend, PinnedOutput, ResizeWatcher, TerminalState, RESERVE_LINE};
//!
//! # fn main() -> Result<(), pinline::TerminalError> {
//! let backend = backend::detect()?;
//! let state = Arc::new(TerminalState::from_backend(backend.as_ref())?);
//! let _watcher = ResizeWatcher::spawn(state.clone(), backend.clone(), Duration::from_millis(100))
//!     .map_err(pinline::TerminalError::Set)?;
//!
//! let out = PinnedOutput::new(state, backend, RESERVE_LINE);
//! out.pinned_print("hello")?;
//! let line = out.pinned_input("> ")?;
//! # let _ = line;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod ui;

pub use crate::config::Config;
pub use crate::core::backend::{
    self, Backend, CursorPosition, ErrorCode, Result, TerminalError, TerminalGeometry,
};
pub use crate::core::cursor::CursorSnapshot;
pub use crate::core::geometry::{ResizeWatcher, TerminalState};
pub use crate::core::line::{LineSource, StreamLines};
pub use crate::ui::{
    display_width, paint, rgb_escape, ColorSpec, PinnedOutput, PrintOptions, Rgb, RESERVE_LINE,
};
