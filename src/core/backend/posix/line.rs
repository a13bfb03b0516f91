//! Prompt line editing on a non-canonical terminal

/// What a keystroke did to the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edit {
    Unchanged,
    Changed,
    Submit,
    Eof,
    Interrupt,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Escape {
    #[default]
    None,
    Start,
    Sequence,
}

/// Single-line editor: insert, backspace, kill line, Enter.
///
/// Cursor keys and other escape sequences are swallowed.
#[derive(Debug, Default)]
pub(crate) struct LineEditor {
    text: String,
    partial: Vec<u8>,
    escape: Escape,
}

impl LineEditor {
    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn take(&mut self) -> String {
        self.partial.clear();
        std::mem::take(&mut self.text)
    }

    pub(crate) fn feed(&mut self, byte: u8) -> Edit {
        match self.escape {
            Escape::Start => {
                self.escape = match byte {
                    b'[' | b'O' => Escape::Sequence,
                    _ => Escape::None,
                };
                return Edit::Unchanged;
            }
            Escape::Sequence => {
                if (0x40..=0x7e).contains(&byte) {
                    self.escape = Escape::None;
                }
                return Edit::Unchanged;
            }
            Escape::None => {}
        }

        match byte {
            b'\r' | b'\n' => Edit::Submit,
            0x03 => Edit::Interrupt,
            0x04 if self.text.is_empty() && self.partial.is_empty() => Edit::Eof,
            0x7f | 0x08 => {
                self.partial.clear();
                match self.text.pop() {
                    Some(_) => Edit::Changed,
                    None => Edit::Unchanged,
                }
            }
            // Ctrl-U
            0x15 => {
                self.partial.clear();
                if self.text.is_empty() {
                    Edit::Unchanged
                } else {
                    self.text.clear();
                    Edit::Changed
                }
            }
            0x1b => {
                self.escape = Escape::Start;
                Edit::Unchanged
            }
            b if b < 0x20 => Edit::Unchanged,
            b => self.insert(b),
        }
    }

    fn insert(&mut self, byte: u8) -> Edit {
        self.partial.push(byte);
        match std::str::from_utf8(&self.partial) {
            Ok(s) => {
                self.text.push_str(s);
                self.partial.clear();
                Edit::Changed
            }
            // Invalid sequence: drop it
            Err(e) if e.error_len().is_some() => {
                self.partial.clear();
                Edit::Unchanged
            }
            Err(_) => Edit::Unchanged,
        }
    }
}
