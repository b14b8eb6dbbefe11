use core::{
    cell::Cell,
    fmt::Write,
    sync::atomic::{AtomicBool, Ordering},
};

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use esp_hal::peripherals::BT;
use esp_radio::{Controller, ble::controller::BleConnector};
use log::{info, warn};
use radiotester_core::{
    commands::{
        CommandGroup, CommandSets, RegistrationContext,
        iperf::{IperfParseError, IperfRole, parse_request},
    },
    console::{Command, CommandError, CommandResult},
    net::{InterfaceType, format_ipv4},
};

use super::{CONNECTIVITY, WIFI_CREDENTIALS};

static BT_CONTROLLER_READY: AtomicBool = AtomicBool::new(false);
static BT_ENABLED: AtomicBool = AtomicBool::new(false);
static IPERF_INTERFACE: Mutex<CriticalSectionRawMutex, Cell<InterfaceType>> =
    Mutex::new(Cell::new(InterfaceType::Sta));

static WIFI_COMMANDS: [Command; 3] = [
    Command::new("wifi_status", "", "show link state and address", wifi_status),
    Command::new("wifi_ip", "", "print the station IPv4 address", wifi_ip),
    Command::new("wifi_ssid", "", "print the configured network name", wifi_ssid),
];

static BT_COMMANDS: [Command; 3] = [
    Command::new("bt_on", "", "enable the bluetooth controller", bt_on),
    Command::new("bt_off", "", "disable the bluetooth controller", bt_off),
    Command::new("bt_status", "", "show bluetooth controller state", bt_status),
];

static IPERF_COMMANDS: [Command; 1] = [Command::new(
    "iperf",
    "-c <host> | -s [-p <port>] [-t <secs>] [-i <secs>] [-u]",
    "validate a throughput test request",
    iperf,
)];

#[derive(Debug)]
pub(super) enum CommandSetError {
    RadioUnavailable,
    BluetoothInit,
}

/// Command tables for the Wi-Fi, bluetooth and iperf groups.
pub(super) struct FirmwareCommandSets {
    radio: Option<&'static Controller<'static>>,
    bt: Option<BT<'static>>,
    ble: Option<BleConnector<'static>>,
}

impl FirmwareCommandSets {
    pub(super) fn new(radio: Option<&'static Controller<'static>>, bt: BT<'static>) -> Self {
        Self {
            radio,
            bt: Some(bt),
            ble: None,
        }
    }

    fn power_on_bluetooth(&mut self) -> Result<(), CommandSetError> {
        if self.ble.is_some() {
            return Ok(());
        }
        let radio = self.radio.ok_or(CommandSetError::RadioUnavailable)?;
        let bt = self.bt.take().ok_or(CommandSetError::BluetoothInit)?;
        let connector = BleConnector::new(radio, bt, Default::default()).map_err(|err| {
            warn!("bt: controller init failed: {:?}", err);
            CommandSetError::BluetoothInit
        })?;
        self.ble = Some(connector);
        BT_CONTROLLER_READY.store(true, Ordering::Release);
        BT_ENABLED.store(true, Ordering::Release);
        info!("bt: controller powered on");
        Ok(())
    }
}

impl CommandSets for FirmwareCommandSets {
    type Error = CommandSetError;

    fn prepare(&mut self, group: CommandGroup) -> Result<(), Self::Error> {
        match group {
            CommandGroup::Bluetooth => self.power_on_bluetooth(),
            CommandGroup::Wifi | CommandGroup::Iperf => Ok(()),
        }
    }

    fn commands(
        &mut self,
        group: CommandGroup,
        context: &RegistrationContext,
    ) -> Result<&'static [Command], Self::Error> {
        match group {
            CommandGroup::Wifi => Ok(&WIFI_COMMANDS),
            CommandGroup::Bluetooth => {
                // Without a controller the bt_* commands would only report errors.
                if self.ble.is_none() {
                    return Err(CommandSetError::BluetoothInit);
                }
                Ok(&BT_COMMANDS)
            }
            CommandGroup::Iperf => {
                IPERF_INTERFACE.lock(|cell| cell.set(context.interface));
                Ok(&IPERF_COMMANDS)
            }
        }
    }
}

fn emit(result: core::fmt::Result) -> CommandResult {
    result.map_err(|_| CommandError::Failed)
}

fn wifi_status(_args: &[&str], out: &mut dyn Write) -> CommandResult {
    let snapshot = CONNECTIVITY.snapshot();
    emit(write!(
        out,
        "state: {}\r\nlink: {}\r\n",
        snapshot.state.label(),
        if snapshot.link_up { "up" } else { "down" }
    ))?;
    match snapshot.ipv4 {
        Some(raw) => emit(write!(out, "ip: {}\r\n", format_ipv4(raw))),
        None => emit(out.write_str("ip: none\r\n")),
    }
}

fn wifi_ip(_args: &[&str], out: &mut dyn Write) -> CommandResult {
    match CONNECTIVITY.snapshot().ipv4 {
        Some(raw) => emit(write!(out, "{}\r\n", format_ipv4(raw))),
        None => emit(out.write_str("no address\r\n")),
    }
}

fn wifi_ssid(_args: &[&str], out: &mut dyn Write) -> CommandResult {
    emit(write!(out, "{}\r\n", WIFI_CREDENTIALS.ssid))
}

fn bt_on(_args: &[&str], out: &mut dyn Write) -> CommandResult {
    set_bluetooth(true, out)
}

fn bt_off(_args: &[&str], out: &mut dyn Write) -> CommandResult {
    set_bluetooth(false, out)
}

fn set_bluetooth(enabled: bool, out: &mut dyn Write) -> CommandResult {
    if !BT_CONTROLLER_READY.load(Ordering::Acquire) {
        return Err(CommandError::Unavailable);
    }
    BT_ENABLED.store(enabled, Ordering::Release);
    emit(write!(out, "bt: {}\r\n", if enabled { "on" } else { "off" }))
}

fn bt_status(_args: &[&str], out: &mut dyn Write) -> CommandResult {
    let ready = BT_CONTROLLER_READY.load(Ordering::Acquire);
    let enabled = BT_ENABLED.load(Ordering::Acquire);
    emit(write!(
        out,
        "controller: {}\r\nradio: {}\r\n",
        if ready { "ready" } else { "absent" },
        if enabled { "on" } else { "off" }
    ))
}

fn iperf(args: &[&str], out: &mut dyn Write) -> CommandResult {
    let request = match parse_request(args) {
        Ok(request) => request,
        Err(IperfParseError::MissingRole) => return Err(CommandError::Usage),
        Err(err) => {
            emit(write!(out, "iperf: {:?}\r\n", err))?;
            return Err(CommandError::InvalidArgument);
        }
    };

    let interface = IPERF_INTERFACE.lock(|cell| cell.get());
    match request.role {
        IperfRole::Client { host } => emit(write!(out, "iperf: client to {host}"))?,
        IperfRole::Server => emit(out.write_str("iperf: server"))?,
    }
    emit(write!(
        out,
        " port={} time={}s proto={} interface={:?}\r\n",
        request.port,
        request.duration_secs,
        if request.udp { "udp" } else { "tcp" },
        interface
    ))?;
    if let Some(interval) = request.interval_secs {
        emit(write!(out, "iperf: report every {interval}s\r\n"))?;
    }

    // No traffic engine is linked into this firmware.
    Err(CommandError::Unavailable)
}
