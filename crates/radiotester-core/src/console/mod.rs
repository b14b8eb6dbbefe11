//! Interactive line console over a serial transport.

mod line;
mod table;
mod tokenize;

use core::fmt::Write as _;

use embedded_io_async::{Read, Write};
use heapless::{String, Vec};
use log::debug;

use crate::boot::TaskPriority;

pub use line::{EditAction, History, LineEditor};
pub use table::{
    BUILTIN_COMMANDS, Command, CommandError, CommandHandler, CommandResult, CommandTable,
    MAX_COMMAND_GROUPS, Registration, SharedCommandTable,
};
pub use tokenize::{TokenizeError, tokenize};

/// Buffer capacities; [`ConsoleConfig`] limits must stay within them.
pub const CONSOLE_LINE_MAX: usize = 85;
pub const CONSOLE_HISTORY_DEPTH: usize = 10;
pub const CONSOLE_MAX_PARAMS: usize = 32;

const OUTPUT_BYTES: usize = 1024;
const READ_CHUNK_BYTES: usize = 16;
const ERASE_SEQUENCE: &str = "\x08 \x08";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    InvalidConfig,
    DuplicateCommand,
    TableFull,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConsoleConfig {
    pub line_len: usize,
    pub history_len: usize,
    pub delimiter: char,
    pub max_params: usize,
    /// Requested priority of the console task, handed to the [`ConsoleHost`]
    /// along with the rest of the config.
    ///
    /// [`ConsoleHost`]: crate::bringup::ConsoleHost
    pub priority: TaskPriority,
    pub prompt: &'static str,
}

impl ConsoleConfig {
    pub const fn new() -> Self {
        Self {
            line_len: CONSOLE_LINE_MAX,
            history_len: CONSOLE_HISTORY_DEPTH,
            delimiter: ' ',
            max_params: CONSOLE_MAX_PARAMS,
            priority: TaskPriority::Normal,
            prompt: "> ",
        }
    }

    pub const fn with_line_len(mut self, line_len: usize) -> Self {
        self.line_len = line_len;
        self
    }

    pub const fn with_history_len(mut self, history_len: usize) -> Self {
        self.history_len = history_len;
        self
    }

    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub const fn with_max_params(mut self, max_params: usize) -> Self {
        self.max_params = max_params;
        self
    }

    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub const fn with_prompt(mut self, prompt: &'static str) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn validate(&self) -> Result<(), ConsoleError> {
        let line_ok = (1..=CONSOLE_LINE_MAX).contains(&self.line_len);
        let history_ok = self.history_len <= CONSOLE_HISTORY_DEPTH;
        let params_ok = (1..=CONSOLE_MAX_PARAMS).contains(&self.max_params);
        let delimiter_ok = self.delimiter.is_ascii() && !self.delimiter.is_ascii_control();
        if line_ok && history_ok && params_ok && delimiter_ok && self.delimiter != '"' {
            Ok(())
        } else {
            Err(ConsoleError::InvalidConfig)
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport-independent console state: editing, history and dispatch.
pub struct ConsoleSession<'t> {
    table: &'t SharedCommandTable,
    config: ConsoleConfig,
    editor: LineEditor<CONSOLE_LINE_MAX>,
    history: History<CONSOLE_LINE_MAX, CONSOLE_HISTORY_DEPTH>,
}

impl<'t> ConsoleSession<'t> {
    pub fn new(table: &'t SharedCommandTable, config: ConsoleConfig) -> Result<Self, ConsoleError> {
        config.validate()?;
        Ok(Self {
            table,
            config,
            editor: LineEditor::new(config.line_len),
            history: History::new(config.history_len),
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn current_line(&self) -> &str {
        self.editor.line()
    }

    pub fn write_prompt(&self, out: &mut dyn core::fmt::Write) {
        let _ = out.write_str(self.config.prompt);
    }

    /// Feeds one received byte and writes the echo/response to `out`.
    pub fn process_byte(&mut self, byte: u8, out: &mut dyn core::fmt::Write) {
        match self.editor.push_byte(byte) {
            EditAction::Ignored => {}
            EditAction::Echo(byte) => {
                let _ = out.write_char(byte as char);
            }
            EditAction::Erased => {
                let _ = out.write_str(ERASE_SEQUENCE);
            }
            EditAction::Rejected => {
                let _ = out.write_char('\x07');
            }
            action @ (EditAction::HistoryPrevious | EditAction::HistoryNext) => {
                let recalled = if action == EditAction::HistoryPrevious {
                    self.history.previous()
                } else {
                    self.history.next()
                };
                if let Some(text) = recalled {
                    let erased = self.editor.replace_line(text);
                    for _ in 0..erased {
                        let _ = out.write_str(ERASE_SEQUENCE);
                    }
                    let _ = out.write_str(self.editor.line());
                }
            }
            EditAction::Submit => {
                let _ = out.write_str("\r\n");
                let line = self.editor.take_line();
                self.history.push(&line);
                self.execute(&line, out);
                self.write_prompt(out);
            }
        }
    }

    fn execute(&self, line: &str, out: &mut dyn core::fmt::Write) {
        let tokens: Vec<&str, CONSOLE_MAX_PARAMS> =
            match tokenize(line, self.config.delimiter, self.config.max_params) {
                Ok(tokens) => tokens,
                Err(TokenizeError::TooManyParams { max }) => {
                    let _ = write!(out, "error: too many parameters (max {max})\r\n");
                    return;
                }
                Err(TokenizeError::UnterminatedQuote) => {
                    let _ = out.write_str("error: unterminated quote\r\n");
                    return;
                }
            };
        let Some((&name, args)) = tokens.split_first() else {
            return;
        };

        if name == "help" {
            self.print_help(out);
            return;
        }

        let Some(command) = self.table.find(name) else {
            let _ = write!(out, "unknown command '{name}', type 'help'\r\n");
            return;
        };

        debug!("console: dispatch '{}' argc={}", name, args.len());
        match (command.handler)(args, out) {
            Ok(()) => {}
            Err(CommandError::Usage) => {
                let _ = write!(out, "usage: {} {}\r\n", command.name, command.usage);
            }
            Err(err) => {
                let _ = write!(out, "error: {name}: {err:?}\r\n");
            }
        }
    }

    fn print_help(&self, out: &mut dyn core::fmt::Write) {
        let _ = out.write_str("help - list commands\r\n");
        self.table.for_each(|group, command| {
            let _ = write!(
                out,
                "[{}] {} {} - {}\r\n",
                group.name(),
                command.name,
                command.usage,
                command.help
            );
        });
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsoleIoError<E> {
    Io(E),
    /// The transport reported end of stream.
    Closed,
}

/// [`ConsoleSession`] bound to an async serial transport.
pub struct CommandConsole<'t, IO> {
    io: IO,
    session: ConsoleSession<'t>,
}

impl<'t, IO> CommandConsole<'t, IO>
where
    IO: Read + Write,
{
    pub fn new(
        io: IO,
        table: &'t SharedCommandTable,
        config: ConsoleConfig,
    ) -> Result<Self, ConsoleError> {
        Ok(Self {
            io,
            session: ConsoleSession::new(table, config)?,
        })
    }

    pub fn session(&self) -> &ConsoleSession<'t> {
        &self.session
    }

    /// Serves the console until the transport fails.
    pub async fn run(&mut self) -> Result<core::convert::Infallible, ConsoleIoError<IO::Error>> {
        let mut out: String<OUTPUT_BYTES> = String::new();
        self.session.write_prompt(&mut out);
        self.flush(&mut out).await?;

        let mut chunk = [0u8; READ_CHUNK_BYTES];
        loop {
            let read = self.io.read(&mut chunk).await.map_err(ConsoleIoError::Io)?;
            if read == 0 {
                return Err(ConsoleIoError::Closed);
            }
            for &byte in &chunk[..read] {
                self.session.process_byte(byte, &mut out);
                self.flush(&mut out).await?;
            }
        }
    }

    async fn flush(
        &mut self,
        out: &mut String<OUTPUT_BYTES>,
    ) -> Result<(), ConsoleIoError<IO::Error>> {
        if !out.is_empty() {
            self.io
                .write_all(out.as_bytes())
                .await
                .map_err(ConsoleIoError::Io)?;
            out.clear();
        }
        Ok(())
    }
}
