//! POSIX backend
//!
//! Raw mode is a termios switch on the terminal device. Every byte read
//! from the terminal goes through one [`InputQueue`], so the cursor query,
//! the prompt line and raw keystroke reads never compete for input: the
//! query takes its `ESC [ row ; col R` reply from the queue's report list
//! while the other readers only ever see typed bytes.
//!
//! The prompt line is read in non-canonical mode and edited here; the typed
//! text is echoed by the caller so it cannot interleave with other output.

mod input;
mod line;

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once};
use std::time::Duration;

use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use tracing::{debug, info, warn};

use self::input::InputQueue;
use self::line::{Edit, LineEditor};
use super::{
    decode_utf8, Backend, CursorPosition, ErrorCode, Result, TerminalError, TerminalGeometry,
};
use crate::core::line::LineSource;
use crate::core::raw::{with_raw_mode, RawModeSwitch};
use crate::ui::ansi;

/// Longest wait for a cursor position report
const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

static WINCH_PENDING: AtomicBool = AtomicBool::new(false);
static WINCH_INSTALL: Once = Once::new();

extern "C" fn on_winch(_: libc::c_int) {
    WINCH_PENDING.store(true, Ordering::SeqCst);
}

/// Install the SIGWINCH handler once per process.
///
/// The handler only raises a flag; the resize watcher thread picks it up
/// with [`take_winch`].
pub fn install_winch_handler() {
    WINCH_INSTALL.call_once(|| {
        let action = SigAction::new(
            SigHandler::Handler(on_winch),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // Safety: the handler only touches an atomic
        match unsafe { signal::sigaction(Signal::SIGWINCH, &action) } {
            Ok(_) => debug!("SIGWINCH handler installed"),
            Err(e) => warn!("Failed to install SIGWINCH handler: {}", e),
        }
    });
}

/// Consume a pending window-change notification.
pub fn take_winch() -> bool {
    WINCH_PENDING.swap(false, Ordering::SeqCst)
}

/// `saved` with canonical input and echo off, reads returning per byte
fn non_canonical(saved: &Termios, also_clear: LocalFlags) -> Termios {
    let mut mode = saved.clone();
    mode.local_flags
        .remove(LocalFlags::ICANON | LocalFlags::ECHO | also_clear);
    mode.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    mode.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    mode
}

enum TtyOutput {
    /// Process stdout, so queries are ordered after buffered output
    Stdout,
    Device(File),
}

impl TtyOutput {
    fn send(&self, bytes: &[u8]) -> io::Result<()> {
        match self {
            TtyOutput::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()
            }
            TtyOutput::Device(file) => {
                let mut out: &File = file;
                out.write_all(bytes)?;
                out.flush()
            }
        }
    }
}

/// Terminal device with its input queue
struct Tty {
    device: File,
    output: TtyOutput,
    /// Serializes termios changes and cursor queries
    switch: Mutex<()>,
    input: Arc<InputQueue>,
}

static STDIN_TTY: Mutex<Option<Arc<Tty>>> = Mutex::new(None);

impl Tty {
    fn open(device: File, output: TtyOutput) -> io::Result<Arc<Self>> {
        let input = InputQueue::spawn(device.try_clone()?)?;
        Ok(Arc::new(Self {
            device,
            output,
            switch: Mutex::new(()),
            input,
        }))
    }

    /// The process's terminal; opened once so stdin has a single reader
    fn stdin() -> io::Result<Arc<Self>> {
        let mut shared = STDIN_TTY.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tty) = shared.as_ref() {
            return Ok(tty.clone());
        }

        let device = File::from(io::stdin().as_fd().try_clone_to_owned()?);
        let tty = Self::open(device, TtyOutput::Stdout)?;
        info!("Terminal input reader started");
        *shared = Some(tty.clone());
        Ok(tty)
    }

    fn lock_switch(&self) -> MutexGuard<'_, ()> {
        self.switch.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mode(&self) -> io::Result<Termios> {
        termios::tcgetattr(&self.device).map_err(io::Error::from)
    }

    fn set_mode(&self, mode: &Termios) -> io::Result<()> {
        let _switch = self.lock_switch();
        termios::tcsetattr(&self.device, SetArg::TCSADRAIN, mode).map_err(io::Error::from)
    }

    fn cursor_position(&self) -> Result<CursorPosition> {
        let _switch = self.lock_switch();
        let saved = self.mode().map_err(TerminalError::Query)?;

        // Canonical mode holds the reply until Enter, echo would print it
        let quiet = saved
            .local_flags
            .intersects(LocalFlags::ICANON | LocalFlags::ECHO);
        if quiet {
            let mode = non_canonical(&saved, LocalFlags::empty());
            termios::tcsetattr(&self.device, SetArg::TCSANOW, &mode)
                .map_err(|e| TerminalError::Query(e.into()))?;
        }

        self.input.expect_report();
        let result = match self.output.send(b"\x1b[6n") {
            Ok(()) => self.input.wait_report(QUERY_TIMEOUT),
            Err(e) => {
                self.input.cancel_report();
                Err(TerminalError::Query(e))
            }
        };

        if quiet {
            if let Err(e) = termios::tcsetattr(&self.device, SetArg::TCSANOW, &saved) {
                warn!("Failed to restore terminal mode after cursor query: {}", e);
            }
        }
        result
    }

    fn size(&self) -> io::Result<TerminalGeometry> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        // Safety: TIOCGWINSZ fills a winsize
        let result = unsafe { libc::ioctl(self.device.as_raw_fd(), libc::TIOCGWINSZ as _, &mut ws) };
        if result == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(TerminalGeometry::new(ws.ws_col, ws.ws_row))
    }
}

/// termios backend over a terminal device
pub struct PosixBackend {
    tty: Arc<Tty>,
}

impl PosixBackend {
    /// Backend on the process's controlling terminal (stdin/stdout).
    pub fn new() -> Result<Self> {
        let tty = Tty::stdin().map_err(TerminalError::Query)?;
        Ok(Self { tty })
    }

    /// Backend on a terminal device such as a pty slave; output goes to
    /// the same device.
    pub fn with_device(device: File) -> Result<Self> {
        let output = device.try_clone().map_err(TerminalError::Query)?;
        let tty = Tty::open(device, TtyOutput::Device(output)).map_err(TerminalError::Query)?;
        Ok(Self { tty })
    }
}

impl RawModeSwitch for PosixBackend {
    type Saved = Termios;

    fn save(&self) -> Result<Termios> {
        self.tty.mode().map_err(TerminalError::Query)
    }

    fn enter_raw(&self, saved: &Termios) -> Result<()> {
        let mut raw = saved.clone();
        termios::cfmakeraw(&mut raw);
        self.tty.set_mode(&raw).map_err(TerminalError::Set)
    }

    fn restore(&self, saved: &Termios) -> io::Result<()> {
        self.tty.set_mode(saved)
    }
}

impl Backend for PosixBackend {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn get_cursor_position(&self) -> Result<CursorPosition> {
        self.tty.cursor_position()
    }

    fn set_cursor_position(&self, pos: CursorPosition) -> Result<()> {
        self.tty
            .output
            .send(ansi::move_to(pos.row, pos.column).as_bytes())
            .map_err(TerminalError::Set)
    }

    fn read_raw_byte(&self) -> Result<u8> {
        with_raw_mode(self, || self.tty.input.next_byte())
    }

    fn read_raw_char(&self) -> Result<char> {
        with_raw_mode(self, || {
            let first = self.tty.input.next_byte()?;
            decode_utf8(first, || self.tty.input.next_byte())
        })
    }

    fn enable_virtual_terminal_processing(&self) -> std::result::Result<(), ErrorCode> {
        Ok(())
    }

    fn terminal_size(&self) -> Result<TerminalGeometry> {
        self.tty.size().map_err(TerminalError::Query)
    }

    fn line_source(&self) -> Box<dyn LineSource> {
        Box::new(TerminalLines {
            tty: self.tty.clone(),
        })
    }
}

/// Prompt line typed into the shared input queue
struct TerminalLines {
    tty: Arc<Tty>,
}

impl TerminalLines {
    fn edit(&self, echo: &mut dyn FnMut(&str) -> Result<()>) -> Result<Option<String>> {
        let mut editor = LineEditor::default();
        loop {
            let byte = match self.tty.input.next_byte() {
                Ok(b) => b,
                Err(TerminalError::Read(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    let rest = editor.take();
                    return Ok((!rest.is_empty()).then_some(rest));
                }
                Err(e) => return Err(e),
            };

            match editor.feed(byte) {
                Edit::Unchanged => {}
                Edit::Changed => echo(editor.text())?,
                Edit::Submit => {
                    let line = editor.take();
                    echo(&format!("{}\n", line))?;
                    return Ok(Some(line));
                }
                Edit::Eof => return Ok(None),
                Edit::Interrupt => {
                    return Err(TerminalError::Read(io::Error::new(
                        io::ErrorKind::Interrupted,
                        "Interrupted",
                    )))
                }
            }
        }
    }
}

/// Line editing mode: no canonical input, echo or signal keys
impl RawModeSwitch for TerminalLines {
    type Saved = Termios;

    fn save(&self) -> Result<Termios> {
        self.tty.mode().map_err(TerminalError::Query)
    }

    fn enter_raw(&self, saved: &Termios) -> Result<()> {
        let mode = non_canonical(saved, LocalFlags::ISIG | LocalFlags::IEXTEN);
        self.tty.set_mode(&mode).map_err(TerminalError::Set)
    }

    fn restore(&self, saved: &Termios) -> io::Result<()> {
        self.tty.set_mode(saved)
    }
}

impl LineSource for TerminalLines {
    fn read_line(&mut self, echo: &mut dyn FnMut(&str) -> Result<()>) -> Result<Option<String>> {
        let lines = &*self;
        with_raw_mode(lines, || lines.edit(echo))
    }
}
