//! Optional command groups and the contract for the code that provides them.

pub mod iperf;

use heapless::Vec;

use crate::{console::Command, net::InterfaceType};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandGroup {
    Wifi,
    Bluetooth,
    Iperf,
}

impl CommandGroup {
    pub const ALL: [Self; 3] = [Self::Wifi, Self::Bluetooth, Self::Iperf];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Bluetooth => "bt",
            Self::Iperf => "iperf",
        }
    }
}

/// Which command groups this build exposes, evaluated once at start-up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommandGroupSet {
    pub wifi: bool,
    pub bluetooth: bool,
    pub iperf: bool,
}

impl CommandGroupSet {
    pub const fn all() -> Self {
        Self::from_flags(true, true, true)
    }

    pub const fn none() -> Self {
        Self::from_flags(false, false, false)
    }

    pub const fn from_flags(wifi: bool, bluetooth: bool, iperf: bool) -> Self {
        Self {
            wifi,
            bluetooth,
            iperf,
        }
    }

    pub const fn contains(&self, group: CommandGroup) -> bool {
        match group {
            CommandGroup::Wifi => self.wifi,
            CommandGroup::Bluetooth => self.bluetooth,
            CommandGroup::Iperf => self.iperf,
        }
    }

    /// Enabled groups in registration order.
    pub fn enabled(&self) -> Vec<CommandGroup, 3> {
        CommandGroup::ALL
            .into_iter()
            .filter(|group| self.contains(*group))
            .collect()
    }
}

impl Default for CommandGroupSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Handles passed to a command group when it is registered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegistrationContext {
    pub interface: InterfaceType,
}

/// Supplies the command tables for each group.
pub trait CommandSets {
    type Error: core::fmt::Debug;

    /// Runs before the network comes up, e.g. to power the radio a group drives.
    fn prepare(&mut self, _group: CommandGroup) -> Result<(), Self::Error> {
        Ok(())
    }

    fn commands(
        &mut self,
        group: CommandGroup,
        context: &RegistrationContext,
    ) -> Result<&'static [Command], Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_groups_keep_registration_order() {
        assert_eq!(
            CommandGroupSet::all().enabled().as_slice(),
            &[CommandGroup::Wifi, CommandGroup::Bluetooth, CommandGroup::Iperf]
        );
        assert_eq!(
            CommandGroupSet::from_flags(false, true, true).enabled().as_slice(),
            &[CommandGroup::Bluetooth, CommandGroup::Iperf]
        );
        assert!(CommandGroupSet::none().enabled().is_empty());
    }
}
