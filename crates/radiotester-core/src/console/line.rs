use heapless::{Deque, String};

const ESC: u8 = 0x1b;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// What the console should render after feeding one byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EditAction {
    Ignored,
    Echo(u8),
    Erased,
    /// Line is full; the byte was dropped.
    Rejected,
    HistoryPrevious,
    HistoryNext,
    Submit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum EscapeState {
    Idle,
    Escape,
    /// `ESC [`; `params` is set once a parameter or intermediate byte arrived.
    Csi { params: bool },
    /// `ESC O`, sent for cursor keys in application mode.
    Ss3,
}

/// Single-line editor with a runtime length limit below the buffer capacity `N`.
#[derive(Debug)]
pub struct LineEditor<const N: usize> {
    line: String<N>,
    limit: usize,
    escape: EscapeState,
    last_was_cr: bool,
}

impl<const N: usize> LineEditor<N> {
    pub const fn new(limit: usize) -> Self {
        Self {
            line: String::new(),
            limit: if limit < N { limit } else { N },
            escape: EscapeState::Idle,
            last_was_cr: false,
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn push_byte(&mut self, byte: u8) -> EditAction {
        let after_cr = core::mem::replace(&mut self.last_was_cr, byte == b'\r');

        match self.escape {
            EscapeState::Escape => {
                self.escape = match byte {
                    b'[' => EscapeState::Csi { params: false },
                    b'O' => EscapeState::Ss3,
                    _ => EscapeState::Idle,
                };
                return EditAction::Ignored;
            }
            EscapeState::Csi { .. } if (0x20..=0x3f).contains(&byte) => {
                self.escape = EscapeState::Csi { params: true };
                return EditAction::Ignored;
            }
            // Final byte; cursor keys with modifiers (`ESC [ 1 ; 5 A`) are dropped.
            EscapeState::Csi { params } => {
                self.escape = EscapeState::Idle;
                return match byte {
                    b'A' if !params => EditAction::HistoryPrevious,
                    b'B' if !params => EditAction::HistoryNext,
                    _ => EditAction::Ignored,
                };
            }
            EscapeState::Ss3 => {
                self.escape = EscapeState::Idle;
                return match byte {
                    b'A' => EditAction::HistoryPrevious,
                    b'B' => EditAction::HistoryNext,
                    _ => EditAction::Ignored,
                };
            }
            EscapeState::Idle => {}
        }

        match byte {
            ESC => {
                self.escape = EscapeState::Escape;
                EditAction::Ignored
            }
            // CR LF counts as one submit.
            b'\n' if after_cr => EditAction::Ignored,
            b'\r' | b'\n' => EditAction::Submit,
            BACKSPACE | DELETE => {
                if self.line.pop().is_some() {
                    EditAction::Erased
                } else {
                    EditAction::Ignored
                }
            }
            0x20..=0x7e => {
                if self.line.len() >= self.limit || self.line.push(byte as char).is_err() {
                    EditAction::Rejected
                } else {
                    EditAction::Echo(byte)
                }
            }
            _ => EditAction::Ignored,
        }
    }

    /// Hands out the current line and leaves the editor empty.
    pub fn take_line(&mut self) -> String<N> {
        core::mem::take(&mut self.line)
    }

    /// Replaces the line with `text`, truncated to the limit. Returns the
    /// length of the replaced line.
    pub fn replace_line(&mut self, text: &str) -> usize {
        let previous = self.line.len();
        self.line.clear();
        for ch in text.chars() {
            if self.line.len() >= self.limit || self.line.push(ch).is_err() {
                break;
            }
        }
        previous
    }
}

/// Ring of submitted lines, oldest dropped first.
#[derive(Debug)]
pub struct History<const N: usize, const DEPTH: usize> {
    entries: Deque<String<N>, DEPTH>,
    depth: usize,
    // Offset from the newest entry while browsing.
    cursor: Option<usize>,
}

impl<const N: usize, const DEPTH: usize> History<N, DEPTH> {
    pub const fn new(depth: usize) -> Self {
        Self {
            entries: Deque::new(),
            depth: if depth < DEPTH { depth } else { DEPTH },
            cursor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, line: &str) {
        self.cursor = None;
        if self.depth == 0 || line.trim().is_empty() {
            return;
        }
        if self.entries.back().is_some_and(|last| last.as_str() == line) {
            return;
        }

        let mut entry = String::new();
        if entry.push_str(line).is_err() {
            return;
        }
        while self.entries.len() >= self.depth {
            self.entries.pop_front();
        }
        let _ = self.entries.push_back(entry);
    }

    /// Steps towards older entries, stopping at the oldest.
    pub fn previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => 0,
            Some(offset) => (offset + 1).min(self.entries.len() - 1),
        };
        self.cursor = Some(next);
        self.entry_at(next)
    }

    /// Steps towards newer entries; stepping past the newest yields an empty line.
    pub fn next(&mut self) -> Option<&str> {
        match self.cursor {
            None => None,
            Some(0) => {
                self.cursor = None;
                Some("")
            }
            Some(offset) => {
                self.cursor = Some(offset - 1);
                self.entry_at(offset - 1)
            }
        }
    }

    fn entry_at(&self, offset_from_newest: usize) -> Option<&str> {
        let index = self.entries.len().checked_sub(offset_from_newest + 1)?;
        self.entries.iter().nth(index).map(String::as_str)
    }
}
