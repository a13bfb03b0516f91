//! Pinned-bottom-line print/input
//!
//! Output scrolls in the region above a reserved strip of bottom rows; the
//! prompt lives on the last row. Every print and every prompt write runs
//! under the [`TerminalState`] lock, so concurrent writers never interleave
//! escape sequences and a resize cannot change the geometry halfway through
//! a scroll decision. The line read in [`PinnedOutput::pinned_input`] runs
//! outside the lock so a slow typist does not stall other printers; when the
//! line source echoes keystrokes itself, each redraw of the prompt row takes
//! the lock like any other write.
//!
//! # Scroll rule
//!
//! ```text
//! row <  rows - reserve   write text in place
//! row >= rows - reserve   cursor up (reserve + newlines in text), then write
//! ```
//!
//! Only explicit `\n` characters count toward the scroll distance; soft
//! wrapping of long lines is not measured.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use super::ansi;
use super::color::{self, ColorSpec, Rgb};
use crate::core::backend::{Backend, Result, TerminalError, TerminalGeometry};
use crate::core::geometry::TerminalState;
use crate::core::line::{strip_terminator, LineSource};

/// Rows kept clear for the prompt line plus a margin line
pub const RESERVE_LINE: u16 = 2;

/// Separator, terminator and flush behavior for a print call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintOptions<'a> {
    pub sep: &'a str,
    pub end: &'a str,
    pub flush: bool,
}

impl Default for PrintOptions<'_> {
    fn default() -> Self {
        Self {
            sep: " ",
            end: "\n",
            flush: false,
        }
    }
}

impl<'a> PrintOptions<'a> {
    pub fn sep(mut self, sep: &'a str) -> Self {
        self.sep = sep;
        self
    }

    pub fn end(mut self, end: &'a str) -> Self {
        self.end = end;
        self
    }

    pub fn flush(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }
}

/// Rows to move up before writing `text` with the cursor on `row`.
///
/// `None` while the cursor is above the reserved strip. The distance is
/// clamped to `rows - 1` so a terminal shorter than the reserve still gets
/// a valid movement.
pub fn scroll_distance(
    row: u16,
    geometry: TerminalGeometry,
    reserve: u16,
    text: &str,
) -> Option<u16> {
    if row < geometry.rows.saturating_sub(reserve) {
        return None;
    }

    let newlines = text.matches('\n').count();
    let wanted = usize::from(reserve).saturating_add(newlines);
    let limit = usize::from(geometry.rows.saturating_sub(1));
    if wanted > limit {
        debug!("Scroll distance {} clamped to {}", wanted, limit);
    }

    let up = wanted.min(limit) as u16;
    (up > 0).then_some(up)
}

fn join_items<I, T>(items: I, sep: &str) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    let mut text = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            text.push_str(sep);
        }
        text.push_str(&item.to_string());
    }
    text
}

/// Print/input pair that keeps the bottom rows for the prompt.
pub struct PinnedOutput {
    state: Arc<TerminalState>,
    backend: Arc<dyn Backend>,
    reserve: u16,
    output: Mutex<Box<dyn Write + Send>>,
    input: Mutex<Box<dyn LineSource>>,
}

impl PinnedOutput {
    /// Pinned output on stdout, reading lines through the backend
    pub fn new(state: Arc<TerminalState>, backend: Arc<dyn Backend>, reserve: u16) -> Self {
        let input = backend.line_source();
        Self::with_streams(state, backend, reserve, input, Box::new(io::stdout()))
    }

    /// Pinned output over caller-supplied streams
    pub fn with_streams(
        state: Arc<TerminalState>,
        backend: Arc<dyn Backend>,
        reserve: u16,
        input: Box<dyn LineSource>,
        output: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            state,
            backend,
            reserve,
            output: Mutex::new(output),
            input: Mutex::new(input),
        }
    }

    pub fn state(&self) -> &Arc<TerminalState> {
        &self.state
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn reserve_lines(&self) -> u16 {
        self.reserve
    }

    fn output(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.output.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn input(&self) -> MutexGuard<'_, Box<dyn LineSource>> {
        self.input.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Print `text` followed by a newline.
    pub fn pinned_print<T: Display>(&self, text: T) -> Result<()> {
        self.print_items([text], &PrintOptions::default())
    }

    /// Print `items` joined by `opts.sep` and terminated by `opts.end`.
    pub fn print_items<I, T>(&self, items: I, opts: &PrintOptions<'_>) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        let text = join_items(items, opts.sep);
        let geometry = self.state.lock();
        let mut out = self.output();
        self.write_pinned(*geometry, &mut **out, &text, None, opts)
    }

    /// Like [`print_items`](Self::print_items) but writes to `target`.
    pub fn print_to<W, I, T>(&self, target: &mut W, items: I, opts: &PrintOptions<'_>) -> Result<()>
    where
        W: Write + ?Sized,
        I: IntoIterator<Item = T>,
        T: Display,
    {
        let text = join_items(items, opts.sep);
        let geometry = self.state.lock();
        self.write_pinned(*geometry, target, &text, None, opts)
    }

    /// Print `text` in a 24-bit foreground color.
    ///
    /// An invalid color is logged and the text is printed plain.
    pub fn print_colored(&self, color: impl Into<ColorSpec>, text: &str) -> Result<()> {
        let rgb = match color.into().resolve() {
            Ok(rgb) => Some(rgb),
            Err(e) => {
                warn!("Printing without color: {}", e);
                None
            }
        };

        let geometry = self.state.lock();
        let mut out = self.output();
        self.write_pinned(*geometry, &mut **out, text, rgb, &PrintOptions::default())
    }

    /// Write `prompt` at the start of the last row, then read one line.
    ///
    /// Trailing `\r`/`\n` are stripped. End of input is reported as a
    /// [`TerminalError::Read`] with `UnexpectedEof`.
    pub fn pinned_input(&self, prompt: &str) -> Result<String> {
        self.draw_prompt(prompt, None)?;

        let mut echo = |typed: &str| self.draw_prompt(prompt, Some(typed));
        let line = self.input().read_line(&mut echo)?;
        let mut line = line.ok_or_else(|| {
            TerminalError::Read(io::Error::new(io::ErrorKind::UnexpectedEof, "End of input"))
        })?;

        strip_terminator(&mut line);
        Ok(line)
    }

    /// Prompt at the start of the last row, redrawn with `typed` after it
    fn draw_prompt(&self, prompt: &str, typed: Option<&str>) -> Result<()> {
        let geometry = self.state.lock();
        let mut out = self.output();
        let row = geometry.rows.saturating_sub(1);

        let mut text = ansi::move_to(row, 0);
        if typed.is_some() {
            text.push_str(&ansi::clear_line());
        }
        text.push_str(prompt);
        text.push_str(typed.unwrap_or(""));

        out.write_all(text.as_bytes()).map_err(TerminalError::Write)?;
        out.flush().map_err(TerminalError::Write)
    }

    /// Clear the screen and home the cursor.
    pub fn clear(&self) -> Result<()> {
        let _geometry = self.state.lock();
        let mut out = self.output();
        out.write_all(ansi::clear_screen().as_bytes())
            .map_err(TerminalError::Write)?;
        out.flush().map_err(TerminalError::Write)
    }

    /// Scroll decision and write. Caller holds the state lock.
    fn write_pinned<W: Write + ?Sized>(
        &self,
        geometry: TerminalGeometry,
        out: &mut W,
        text: &str,
        color: Option<Rgb>,
        opts: &PrintOptions<'_>,
    ) -> Result<()> {
        let row = self.backend.get_cursor_position()?.row;

        if let Some(up) = scroll_distance(row, geometry, self.reserve, text) {
            out.write_all(ansi::cursor_up(up).as_bytes())
                .map_err(TerminalError::Write)?;
        }

        match color {
            Some(rgb) => color::write_colored(out, rgb, text)?,
            None => out
                .write_all(text.as_bytes())
                .map_err(TerminalError::Write)?,
        }
        out.write_all(opts.end.as_bytes())
            .map_err(TerminalError::Write)?;

        if opts.flush {
            out.flush().map_err(TerminalError::Write)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::mock::MockBackend;
    use crate::core::line::StreamLines;
    use std::io::Cursor;
    use std::thread;

    /// Write target shared between threads; one lock per `write` call.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn setup(input: &[u8]) -> (PinnedOutput, Arc<MockBackend>, SharedBuf) {
        let mock = Arc::new(MockBackend::new(80, 24));
        let state = Arc::new(TerminalState::from_backend(mock.as_ref()).unwrap());
        let buf = SharedBuf::default();
        let pinned = PinnedOutput::with_streams(
            state,
            mock.clone(),
            RESERVE_LINE,
            Box::new(StreamLines::new(Cursor::new(input.to_vec()))),
            Box::new(buf.clone()),
        );
        (pinned, mock, buf)
    }

    #[test]
    fn test_scroll_distance_rules() {
        let geo = TerminalGeometry::new(80, 24);
        assert_eq!(scroll_distance(0, geo, 2, "x"), None);
        assert_eq!(scroll_distance(21, geo, 2, "x"), None);
        assert_eq!(scroll_distance(22, geo, 2, "x"), Some(2));
        assert_eq!(scroll_distance(23, geo, 2, "a\nb\nc"), Some(4));
    }

    #[test]
    fn test_scroll_distance_clamps_on_tiny_terminal() {
        assert_eq!(scroll_distance(0, TerminalGeometry::new(80, 2), 2, "x"), Some(1));
        assert_eq!(scroll_distance(0, TerminalGeometry::new(80, 1), 2, "x"), None);
        assert_eq!(
            scroll_distance(3, TerminalGeometry::new(80, 4), 2, "\n\n\n\n\n"),
            Some(3)
        );
    }

    #[test]
    fn test_print_in_scroll_region_is_verbatim() {
        let (pinned, mock, buf) = setup(b"");
        mock.place_cursor(5, 0);
        pinned.pinned_print("hello").unwrap();
        assert_eq!(buf.text(), "hello\n");
    }

    #[test]
    fn test_print_in_reserved_region_scrolls() {
        let (pinned, mock, buf) = setup(b"");
        mock.place_cursor(22, 0);
        pinned.pinned_print("line1\nline2").unwrap();
        assert_eq!(buf.text(), "\x1b[3Aline1\nline2\n");
    }

    #[test]
    fn test_print_items_options() {
        let (pinned, mock, buf) = setup(b"");
        mock.place_cursor(0, 0);
        let opts = PrintOptions::default().sep(", ").end("!").flush(true);
        pinned.print_items([1, 2, 3], &opts).unwrap();
        assert_eq!(buf.text(), "1, 2, 3!");
    }

    #[test]
    fn test_terminator_newline_does_not_count() {
        let (pinned, mock, buf) = setup(b"");
        mock.place_cursor(23, 0);
        let opts = PrintOptions::default().end("\n\n");
        pinned.print_items(["x"], &opts).unwrap();
        assert_eq!(buf.text(), "\x1b[2Ax\n\n");
    }

    #[test]
    fn test_print_to_other_target() {
        let (pinned, mock, buf) = setup(b"");
        mock.place_cursor(23, 0);
        let mut target = Vec::new();
        pinned
            .print_to(&mut target, ["err"], &PrintOptions::default())
            .unwrap();
        assert_eq!(target, b"\x1b[2Aerr\n");
        assert!(buf.text().is_empty());
    }

    #[test]
    fn test_print_propagates_query_failure() {
        let (pinned, mock, buf) = setup(b"");
        mock.fail_queries(true);
        assert!(matches!(
            pinned.pinned_print("x"),
            Err(TerminalError::Query(_))
        ));
        assert!(buf.text().is_empty());
    }

    #[test]
    fn test_print_colored() {
        let (pinned, mock, buf) = setup(b"");
        mock.place_cursor(0, 0);
        pinned.print_colored("#ff0000", "red").unwrap();
        assert_eq!(buf.text(), "\x1b[38;2;255;0;0mred\x1b[0m\n");
    }

    #[test]
    fn test_print_colored_falls_back_to_plain() {
        let (pinned, mock, buf) = setup(b"");
        mock.place_cursor(0, 0);
        pinned.print_colored("#zzzzzz", "plain").unwrap();
        pinned.print_colored((0i64, 0, 999), "also plain").unwrap();
        assert_eq!(buf.text(), "plain\nalso plain\n");
    }

    #[test]
    fn test_input_prompt_on_last_row() {
        let (pinned, _mock, buf) = setup(b"hello\r\n");
        let line = pinned.pinned_input("> ").unwrap();
        assert_eq!(line, "hello");
        assert_eq!(buf.text(), "\x1b[24;1H> ");
    }

    #[test]
    fn test_input_keeps_inner_whitespace() {
        let (pinned, _mock, _buf) = setup(b"  spaced out  \n");
        assert_eq!(pinned.pinned_input("").unwrap(), "  spaced out  ");
    }

    #[test]
    fn test_input_end_of_stream() {
        let (pinned, _mock, _buf) = setup(b"");
        let err = pinned.pinned_input("> ").unwrap_err();
        match err {
            TerminalError::Read(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_input_follows_resize() {
        let (pinned, mock, buf) = setup(b"a\nb\n");
        pinned.pinned_input("> ").unwrap();
        mock.resize(100, 30);
        assert!(pinned.state().refresh(mock.as_ref()));
        pinned.pinned_input("> ").unwrap();
        assert_eq!(buf.text(), "\x1b[24;1H> \x1b[30;1H> ");
    }

    /// Types a fixed line one keystroke at a time through `echo`.
    struct KeyedLines(&'static str);

    impl LineSource for KeyedLines {
        fn read_line(
            &mut self,
            echo: &mut dyn FnMut(&str) -> Result<()>,
        ) -> Result<Option<String>> {
            let mut typed = String::new();
            for c in self.0.chars() {
                typed.push(c);
                echo(&typed)?;
            }
            echo(&format!("{}\n", typed))?;
            Ok(Some(typed))
        }
    }

    #[test]
    fn test_echo_redraws_prompt_row() {
        let mock = Arc::new(MockBackend::new(80, 24));
        let state = Arc::new(TerminalState::from_backend(mock.as_ref()).unwrap());
        let buf = SharedBuf::default();
        let pinned = PinnedOutput::with_streams(
            state,
            mock.clone(),
            RESERVE_LINE,
            Box::new(KeyedLines("ok")),
            Box::new(buf.clone()),
        );

        assert_eq!(pinned.pinned_input("> ").unwrap(), "ok");
        assert_eq!(
            buf.text(),
            "\x1b[24;1H> \
             \x1b[24;1H\x1b[2K> o\
             \x1b[24;1H\x1b[2K> ok\
             \x1b[24;1H\x1b[2K> ok\n"
        );
    }

    #[test]
    fn test_input_then_raw_read_share_type_ahead() {
        let mock = Arc::new(MockBackend::new(80, 24));
        mock.push_input(b"key\nx");
        let state = Arc::new(TerminalState::from_backend(mock.as_ref()).unwrap());
        let pinned = PinnedOutput::with_streams(
            state,
            mock.clone(),
            RESERVE_LINE,
            mock.line_source(),
            Box::new(SharedBuf::default()),
        );

        assert_eq!(pinned.pinned_input("> ").unwrap(), "key");
        assert_eq!(pinned.backend().read_raw_char().unwrap(), 'x');
    }

    #[test]
    fn test_clear() {
        let (pinned, _mock, buf) = setup(b"");
        pinned.clear().unwrap();
        assert_eq!(buf.text(), "\x1b[2J\x1b[1;1H");
    }

    #[test]
    fn test_concurrent_prints_do_not_interleave() {
        let (pinned, mock, buf) = setup(b"");
        mock.place_cursor(23, 0);
        let pinned = Arc::new(pinned);

        const THREADS: usize = 8;
        const LINES: usize = 50;

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let pinned = pinned.clone();
                thread::spawn(move || {
                    for i in 0..LINES {
                        pinned.pinned_print(format!("[thread-{}-line-{}]", t, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = buf.text();
        let chunks: Vec<&str> = text.split("\x1b[2A").collect();
        assert_eq!(chunks[0], "");
        assert_eq!(chunks.len(), THREADS * LINES + 1);

        let mut seen: Vec<&str> = chunks[1..].to_vec();
        for chunk in &seen {
            assert!(chunk.starts_with("[thread-") && chunk.ends_with("]\n"), "{:?}", chunk);
            assert_eq!(chunk.matches('[').count(), 1, "{:?}", chunk);
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), THREADS * LINES);
    }
}
