//! Scoped raw-mode switching.
//!
//! A raw read saves the current input mode, enters raw mode, performs the
//! read and restores the saved mode on every exit path: normal return,
//! read error, or unwinding. A restore failure after a successful read is
//! reported as [`TerminalError::RawModeRestore`]; the session is unreliable
//! from that point on.

use tracing::error;

use super::backend::{Result, TerminalError};

/// Platform hook for saving, entering and restoring the input mode.
pub trait RawModeSwitch {
    /// Snapshot of the input mode (termios, console mode flags, ...)
    type Saved;

    fn save(&self) -> Result<Self::Saved>;
    fn enter_raw(&self, saved: &Self::Saved) -> Result<()>;
    fn restore(&self, saved: &Self::Saved) -> std::io::Result<()>;
}

/// Holds the saved mode while raw mode is active.
pub struct RawModeGuard<'a, S: RawModeSwitch> {
    switch: &'a S,
    saved: Option<S::Saved>,
}

impl<'a, S: RawModeSwitch> RawModeGuard<'a, S> {
    /// Save the current mode and enter raw mode.
    ///
    /// A failed switch may have applied part of the change, so the saved
    /// mode is put back before the error is returned.
    pub fn enter(switch: &'a S) -> Result<Self> {
        let saved = switch.save()?;
        if let Err(e) = switch.enter_raw(&saved) {
            if let Err(restore) = switch.restore(&saved) {
                error!("Raw mode restore failed: {}", restore);
            }
            return Err(e);
        }
        Ok(Self {
            switch,
            saved: Some(saved),
        })
    }

    /// Restore the saved mode, reporting failure.
    pub fn release(mut self) -> Result<()> {
        match self.saved.take() {
            Some(saved) => self.switch.restore(&saved).map_err(|e| {
                error!("Raw mode restore failed: {}", e);
                TerminalError::RawModeRestore(e)
            }),
            None => Ok(()),
        }
    }
}

impl<S: RawModeSwitch> Drop for RawModeGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(e) = self.switch.restore(&saved) {
                error!("Raw mode restore failed: {}", e);
            }
        }
    }
}

/// Run `read` with raw mode active for exactly its duration.
///
/// A read error takes precedence over a restore error; both are logged.
pub fn with_raw_mode<S, T, F>(switch: &S, read: F) -> Result<T>
where
    S: RawModeSwitch,
    F: FnOnce() -> Result<T>,
{
    let guard = RawModeGuard::enter(switch)?;
    let result = read();
    let restored = guard.release();
    let value = result?;
    restored?;
    Ok(value)
}
