use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use heapless::Vec;

use crate::commands::CommandGroup;

use super::ConsoleError;

pub const MAX_COMMAND_GROUPS: usize = 8;

/// Names handled by the console itself.
pub const BUILTIN_COMMANDS: [&str; 1] = ["help"];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandError {
    Usage,
    InvalidArgument,
    Unavailable,
    Failed,
}

pub type CommandResult = Result<(), CommandError>;

/// Handler invoked with the arguments after the command name.
pub type CommandHandler = fn(args: &[&str], out: &mut dyn core::fmt::Write) -> CommandResult;

#[derive(Clone, Copy, Debug)]
pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

impl Command {
    pub const fn new(
        name: &'static str,
        usage: &'static str,
        help: &'static str,
        handler: CommandHandler,
    ) -> Self {
        Self {
            name,
            usage,
            help,
            handler,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Registration {
    Added { commands: usize },
    AlreadyRegistered,
}

/// Registered command groups, looked up by command name.
#[derive(Debug)]
pub struct CommandTable {
    groups: Vec<(CommandGroup, &'static [Command]), MAX_COMMAND_GROUPS>,
}

impl CommandTable {
    pub const fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Adds a group. A group that is already present is left untouched.
    pub fn register(
        &mut self,
        group: CommandGroup,
        commands: &'static [Command],
    ) -> Result<Registration, ConsoleError> {
        if self.contains_group(group) {
            return Ok(Registration::AlreadyRegistered);
        }

        for (index, command) in commands.iter().enumerate() {
            let clashes_builtin = BUILTIN_COMMANDS.contains(&command.name);
            let clashes_group = commands[..index].iter().any(|c| c.name == command.name);
            if command.name.is_empty()
                || clashes_builtin
                || clashes_group
                || self.find(command.name).is_some()
            {
                return Err(ConsoleError::DuplicateCommand);
            }
        }

        self.groups
            .push((group, commands))
            .map_err(|_| ConsoleError::TableFull)?;
        Ok(Registration::Added {
            commands: commands.len(),
        })
    }

    pub fn contains_group(&self, group: CommandGroup) -> bool {
        self.groups.iter().any(|(g, _)| *g == group)
    }

    pub fn find(&self, name: &str) -> Option<Command> {
        self.iter()
            .find(|(_, command)| command.name == name)
            .map(|(_, command)| *command)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CommandGroup, &Command)> + '_ {
        self.groups
            .iter()
            .flat_map(|(group, commands)| commands.iter().map(move |c| (*group, c)))
    }

    pub fn command_count(&self) -> usize {
        self.groups.iter().map(|(_, commands)| commands.len()).sum()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

/// [`CommandTable`] shared between the registering worker and the console task.
pub struct SharedCommandTable {
    inner: Mutex<CriticalSectionRawMutex, RefCell<CommandTable>>,
}

impl SharedCommandTable {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(CommandTable::new())),
        }
    }

    pub fn register(
        &self,
        group: CommandGroup,
        commands: &'static [Command],
    ) -> Result<Registration, ConsoleError> {
        self.inner
            .lock(|table| table.borrow_mut().register(group, commands))
    }

    pub fn find(&self, name: &str) -> Option<Command> {
        self.inner.lock(|table| table.borrow().find(name))
    }

    pub fn command_count(&self) -> usize {
        self.inner.lock(|table| table.borrow().command_count())
    }

    pub fn for_each(&self, mut f: impl FnMut(CommandGroup, &Command)) {
        self.inner.lock(|table| {
            for (group, command) in table.borrow().iter() {
                f(group, command);
            }
        });
    }
}

impl Default for SharedCommandTable {
    fn default() -> Self {
        Self::new()
    }
}
