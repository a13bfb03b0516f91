//! Native console backend for Windows
//!
//! Talks to the console through the Win32 console API. Native coordinates
//! are buffer-relative `COORD { X, Y }`; this backend converts them to
//! window-relative (row, column) so they line up with ANSI positioning.

use std::io;

use windows::Win32::Foundation::HANDLE;
use windows::Win32::Storage::FileSystem::ReadFile;
use windows::Win32::System::Console::{
    GetConsoleMode, GetConsoleScreenBufferInfo, GetStdHandle, ReadConsoleW, SetConsoleCursorPosition,
    SetConsoleMode, CONSOLE_MODE, CONSOLE_SCREEN_BUFFER_INFO, COORD, ENABLE_ECHO_INPUT,
    ENABLE_LINE_INPUT, ENABLE_PROCESSED_INPUT, ENABLE_VIRTUAL_TERMINAL_PROCESSING, STD_HANDLE,
    STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};

use super::{Backend, CursorPosition, ErrorCode, Result, TerminalError, TerminalGeometry};
use crate::core::line::{strip_terminator, LineSource};
use crate::core::raw::{with_raw_mode, RawModeSwitch};

/// `HRESULT_FROM_WIN32` facility bits
const WIN32_FACILITY: u32 = 0x8007_0000;

/// Win32 error code carried by an `HRESULT`, or the `HRESULT` itself when it
/// does not wrap one.
fn win32_code(hresult: i32) -> ErrorCode {
    let bits = hresult as u32;
    if bits & 0xFFFF_0000 == WIN32_FACILITY {
        (bits & 0xFFFF) as ErrorCode
    } else {
        hresult
    }
}

fn error_code(e: windows::core::Error) -> ErrorCode {
    win32_code(e.code().0)
}

fn to_io(e: windows::core::Error) -> io::Error {
    io::Error::from_raw_os_error(error_code(e))
}

fn std_handle(which: STD_HANDLE) -> io::Result<HANDLE> {
    let handle = unsafe { GetStdHandle(which) }.map_err(to_io)?;
    if handle.is_invalid() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "Invalid handle"));
    }
    Ok(handle)
}

/// Win32 console backend
#[derive(Debug, Default)]
pub struct ConsoleBackend;

impl ConsoleBackend {
    pub fn new() -> Self {
        Self
    }

    fn screen_info(&self) -> io::Result<CONSOLE_SCREEN_BUFFER_INFO> {
        let handle = std_handle(STD_OUTPUT_HANDLE)?;
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        unsafe { GetConsoleScreenBufferInfo(handle, &mut info) }.map_err(to_io)?;
        Ok(info)
    }

    fn read_utf16_unit(&self, handle: HANDLE) -> Result<u16> {
        let mut unit = [0u16; 1];
        let mut read: u32 = 0;
        unsafe {
            ReadConsoleW(
                handle,
                unit.as_mut_ptr() as *mut _,
                1,
                &mut read,
                None,
            )
        }
        .map_err(|e| TerminalError::Read(to_io(e)))?;

        if read == 0 {
            return Err(TerminalError::Read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Console input closed",
            )));
        }
        Ok(unit[0])
    }
}

impl RawModeSwitch for ConsoleBackend {
    type Saved = CONSOLE_MODE;

    fn save(&self) -> Result<CONSOLE_MODE> {
        let handle = std_handle(STD_INPUT_HANDLE).map_err(TerminalError::Query)?;
        let mut mode = CONSOLE_MODE(0);
        unsafe { GetConsoleMode(handle, &mut mode) }
            .map_err(|e| TerminalError::Query(to_io(e)))?;
        Ok(mode)
    }

    fn enter_raw(&self, saved: &CONSOLE_MODE) -> Result<()> {
        let handle = std_handle(STD_INPUT_HANDLE).map_err(TerminalError::Set)?;
        let raw = CONSOLE_MODE(
            saved.0 & !(ENABLE_LINE_INPUT.0 | ENABLE_ECHO_INPUT.0 | ENABLE_PROCESSED_INPUT.0),
        );
        unsafe { SetConsoleMode(handle, raw) }.map_err(|e| TerminalError::Set(to_io(e)))
    }

    fn restore(&self, saved: &CONSOLE_MODE) -> io::Result<()> {
        let handle = std_handle(STD_INPUT_HANDLE)?;
        unsafe { SetConsoleMode(handle, *saved) }.map_err(to_io)
    }
}

impl Backend for ConsoleBackend {
    fn name(&self) -> &'static str {
        "windows-console"
    }

    fn get_cursor_position(&self) -> Result<CursorPosition> {
        let info = self.screen_info().map_err(TerminalError::Query)?;
        let row = info.dwCursorPosition.Y - info.srWindow.Top;
        let column = info.dwCursorPosition.X - info.srWindow.Left;
        Ok(CursorPosition::new(row.max(0) as u16, column.max(0) as u16))
    }

    fn set_cursor_position(&self, pos: CursorPosition) -> Result<()> {
        let info = self.screen_info().map_err(TerminalError::Set)?;
        let handle = std_handle(STD_OUTPUT_HANDLE).map_err(TerminalError::Set)?;
        let coord = COORD {
            X: info.srWindow.Left.saturating_add(pos.column as i16),
            Y: info.srWindow.Top.saturating_add(pos.row as i16),
        };
        unsafe { SetConsoleCursorPosition(handle, coord) }
            .map_err(|e| TerminalError::Set(to_io(e)))
    }

    fn read_raw_byte(&self) -> Result<u8> {
        with_raw_mode(self, || {
            let handle = std_handle(STD_INPUT_HANDLE).map_err(TerminalError::Read)?;
            let mut buf = [0u8; 1];
            let mut read: u32 = 0;
            unsafe { ReadFile(handle, Some(&mut buf), Some(&mut read), None) }
                .map_err(|e| TerminalError::Read(to_io(e)))?;
            if read == 0 {
                return Err(TerminalError::Read(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Console input closed",
                )));
            }
            Ok(buf[0])
        })
    }

    fn read_raw_char(&self) -> Result<char> {
        with_raw_mode(self, || {
            let handle = std_handle(STD_INPUT_HANDLE).map_err(TerminalError::Read)?;
            let first = self.read_utf16_unit(handle)?;
            let mut units = vec![first];
            // High surrogate: the rest of the pair follows
            if (0xD800..0xDC00).contains(&first) {
                units.push(self.read_utf16_unit(handle)?);
            }
            char::decode_utf16(units)
                .next()
                .and_then(|c| c.ok())
                .ok_or_else(|| {
                    TerminalError::Read(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "invalid UTF-16 in console input",
                    ))
                })
        })
    }

    fn enable_virtual_terminal_processing(&self) -> std::result::Result<(), ErrorCode> {
        let handle = unsafe { GetStdHandle(STD_OUTPUT_HANDLE) }.map_err(error_code)?;
        let mut mode = CONSOLE_MODE(0);
        unsafe { GetConsoleMode(handle, &mut mode) }.map_err(error_code)?;
        let mode = CONSOLE_MODE(mode.0 | ENABLE_VIRTUAL_TERMINAL_PROCESSING.0);
        unsafe { SetConsoleMode(handle, mode) }.map_err(error_code)
    }

    fn terminal_size(&self) -> Result<TerminalGeometry> {
        let info = self.screen_info().map_err(TerminalError::Query)?;
        let columns = info.srWindow.Right - info.srWindow.Left + 1;
        let rows = info.srWindow.Bottom - info.srWindow.Top + 1;
        Ok(TerminalGeometry::new(columns.max(0) as u16, rows.max(0) as u16))
    }

    fn line_source(&self) -> Box<dyn LineSource> {
        Box::new(ConsoleLines)
    }
}

/// Cooked console line input through the process-wide stdin buffer; the
/// console echoes as the user types.
struct ConsoleLines;

impl LineSource for ConsoleLines {
    fn read_line(&mut self, _echo: &mut dyn FnMut(&str) -> Result<()>) -> Result<Option<String>> {
        let mut line = String::new();
        if io::stdin().read_line(&mut line).map_err(TerminalError::Read)? == 0 {
            return Ok(None);
        }
        strip_terminator(&mut line);
        Ok(Some(line))
    }
}
