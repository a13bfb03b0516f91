//! Terminal geometry cache and resize watcher
//!
//! [`TerminalState`] holds the last known terminal size behind the lock
//! that also serializes pinned print/input. The [`ResizeWatcher`] thread is
//! its only writer after startup.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::backend::{Backend, Result, TerminalError, TerminalGeometry};

/// Longest sleep between checks of the stop flag and pending resize signals
const WATCH_TICK: Duration = Duration::from_millis(20);

/// Shared terminal geometry plus the output lock
#[derive(Debug)]
pub struct TerminalState {
    geometry: Mutex<TerminalGeometry>,
}

impl TerminalState {
    /// Create from a known size. A zero dimension means no usable terminal.
    pub fn new(initial: TerminalGeometry) -> Result<Self> {
        if initial.is_empty() {
            return Err(TerminalError::Unavailable);
        }
        Ok(Self {
            geometry: Mutex::new(initial),
        })
    }

    /// Seed from the backend's current size.
    pub fn from_backend(backend: &dyn Backend) -> Result<Self> {
        let size = backend
            .terminal_size()
            .map_err(|_| TerminalError::Unavailable)?;
        Self::new(size)
    }

    /// Take the shared lock. Holding the guard serializes against print,
    /// input and geometry updates.
    pub fn lock(&self) -> MutexGuard<'_, TerminalGeometry> {
        // Geometry is plain data; a panicked holder cannot leave it torn
        self.geometry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the current geometry
    pub fn geometry(&self) -> TerminalGeometry {
        *self.lock()
    }

    /// Re-measure the terminal and store the new size if it changed.
    ///
    /// Returns whether the cache was updated. Measurement failures and
    /// zero-sized results leave the cached geometry in place.
    pub fn refresh(&self, backend: &dyn Backend) -> bool {
        let measured = match backend.terminal_size() {
            Ok(size) if !size.is_empty() => size,
            Ok(size) => {
                debug!("Ignoring empty terminal size {:?}", size);
                return false;
            }
            Err(e) => {
                debug!("Resize query failed, keeping last geometry: {}", e);
                return false;
            }
        };

        let mut geometry = self.lock();
        if *geometry == measured {
            return false;
        }
        info!(
            "Resize: {}x{} -> {}x{}",
            geometry.columns, geometry.rows, measured.columns, measured.rows
        );
        *geometry = measured;
        true
    }
}

/// Background thread keeping a [`TerminalState`] current.
pub struct ResizeWatcher {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ResizeWatcher {
    /// Start watching. On POSIX the thread reacts to SIGWINCH; on every
    /// platform it also re-measures once per `poll` interval.
    pub fn spawn(
        state: Arc<TerminalState>,
        backend: Arc<dyn Backend>,
        poll: Duration,
    ) -> io::Result<Self> {
        #[cfg(unix)]
        super::backend::posix::install_winch_handler();

        Self::spawn_inner(state, backend, poll, cfg!(unix))
    }

    fn spawn_inner(
        state: Arc<TerminalState>,
        backend: Arc<dyn Backend>,
        poll: Duration,
        use_signal: bool,
    ) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let tick = WATCH_TICK.min(poll);

        let thread = thread::Builder::new()
            .name("pinline-resize".to_string())
            .spawn(move || {
                let mut last = Instant::now();
                while flag.load(Ordering::SeqCst) {
                    thread::sleep(tick);
                    let signalled = use_signal && take_resize_signal();
                    if signalled || last.elapsed() >= poll {
                        state.refresh(backend.as_ref());
                        last = Instant::now();
                    }
                }
                debug!("Resize watcher stopped");
            })?;

        Ok(Self {
            running,
            thread: Some(thread),
        })
    }

    /// Stop the thread and wait for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(unix)]
fn take_resize_signal() -> bool {
    super::backend::posix::take_winch()
}

#[cfg(not(unix))]
fn take_resize_signal() -> bool {
    false
}
