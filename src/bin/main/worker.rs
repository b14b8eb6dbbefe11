use embassy_executor::Spawner;
use embassy_futures::select::{Either3, select3};
use embassy_net::{Runner, Stack, StackResources};
use embassy_time::Delay;
use esp_hal::peripherals::WIFI;
use esp_radio::{Controller, wifi::WifiDevice};
use log::{error, info, warn};
use radiotester_core::{
    bringup::Worker,
    net::{ConnectParams, ConnectionManager, InterfaceType},
};
use radiotester_hal_esp32s3::network::{EspConnectionManager, NetworkError, monitor_link};
use static_cell::StaticCell;

use super::{
    BRINGUP_CONFIG, COMMANDS, CONNECTIVITY, NET_SEED, command_sets::FirmwareCommandSets,
    console_host::UartConsoleHost, platform::Board, watchdog_timer::TaskWatchdogTimer,
};

static RADIO: StaticCell<Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

/// Station manager, or nothing when the radio failed to come up.
enum BoardNetwork {
    Radio(EspConnectionManager<'static>),
    Unavailable,
}

impl ConnectionManager for BoardNetwork {
    type Error = NetworkError;

    async fn init(&mut self, interface: InterfaceType) -> Result<(), Self::Error> {
        match self {
            Self::Radio(manager) => manager.init(interface).await,
            Self::Unavailable => Err(NetworkError::NotInitialised),
        }
    }

    async fn connect_ap(&mut self, params: &ConnectParams) -> Result<u32, Self::Error> {
        match self {
            Self::Radio(manager) => manager.connect_ap(params).await,
            Self::Unavailable => Err(NetworkError::NotInitialised),
        }
    }
}

struct RadioParts {
    controller: &'static Controller<'static>,
    network: EspConnectionManager<'static>,
    stack: Stack<'static>,
    runner: Runner<'static, WifiDevice<'static>>,
}

fn bring_up_radio(wifi: WIFI<'static>) -> Option<RadioParts> {
    let controller: &'static Controller<'static> = match esp_radio::init() {
        Ok(controller) => RADIO.init(controller),
        Err(err) => {
            warn!("radio: init failed: {:?}", err);
            return None;
        }
    };

    let (wifi_controller, interfaces) =
        match esp_radio::wifi::new(controller, wifi, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                warn!("radio: wifi peripheral init failed: {:?}", err);
                return None;
            }
        };

    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::<4>::new()),
        NET_SEED,
    );

    Some(RadioParts {
        controller,
        network: EspConnectionManager::new(wifi_controller, stack, &CONNECTIVITY),
        stack,
        runner,
    })
}

/// Runs the bring-up sequence and then keeps the network stack serviced.
#[embassy_executor::task]
pub(super) async fn worker_task(board: Board, spawner: Spawner) {
    let (network, radio, stack, mut runner) = match bring_up_radio(board.wifi) {
        Some(parts) => (
            BoardNetwork::Radio(parts.network),
            Some(parts.controller),
            Some(parts.stack),
            Some(parts.runner),
        ),
        None => (BoardNetwork::Unavailable, None, None, None),
    };

    let console = UartConsoleHost::new(
        spawner,
        board.uart0,
        board.console_tx,
        board.console_rx,
        &COMMANDS,
    );
    let command_sets = FirmwareCommandSets::new(radio, board.bt);
    let watchdog = TaskWatchdogTimer::new(spawner, board.lpwr);
    let mut worker = Worker::new(
        BRINGUP_CONFIG,
        network,
        console,
        command_sets,
        watchdog,
        Delay,
    );
    info!(
        "worker: starting bring-up groups={:?}",
        worker.config().groups.enabled().as_slice()
    );

    let net_future = async {
        match runner.as_mut() {
            Some(runner) => runner.run().await,
            None => core::future::pending::<()>().await,
        }
    };
    let link_future = async {
        match stack {
            Some(stack) => monitor_link(stack, &CONNECTIVITY).await,
            None => core::future::pending::<()>().await,
        }
    };
    let worker_future = async {
        let Err(err) = worker.run().await;
        err
    };

    if let Either3::Third(err) = select3(net_future, link_future, worker_future).await {
        error!("worker: {:?} failed and errors escalate; halting", err.subsystem);
        panic!("bring-up failed");
    }
}
