//! Core terminal control components.
//!
//! This module contains the low-level terminal access:
//!
//! - **backend**: platform backends (Windows console, POSIX termios) behind one trait
//! - **raw**: scoped raw-mode switching with guaranteed restore
//! - **geometry**: shared terminal size cache, output lock, resize watcher
//! - **cursor**: cursor position save/restore
//! - **line**: prompt line sources
//!
//! # Architecture
//!
//! ```text
//! PinnedOutput
//! ├── TerminalState (geometry + lock)
//! │   └── ResizeWatcher (background thread, only writer)
//! └── dyn Backend
//!     ├── ConsoleBackend (Windows)
//!     └── PosixBackend (termios + input reader thread)
//! ```

pub mod backend;
pub mod cursor;
pub mod geometry;
pub mod line;
pub mod raw;
