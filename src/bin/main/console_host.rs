use embassy_executor::{SpawnError, Spawner};
use esp_hal::{
    Async,
    peripherals::{GPIO43, GPIO44, UART0},
    uart::{self, Uart},
};
use log::warn;
use radiotester_core::{
    bringup::ConsoleHost,
    commands::CommandGroup,
    console::{Command, CommandConsole, ConsoleConfig, ConsoleError, Registration, SharedCommandTable},
};

const CONSOLE_BAUD: u32 = 115_200;

type SerialConsole = CommandConsole<'static, Uart<'static, Async>>;

#[derive(Debug)]
pub(super) enum ConsoleHostError {
    AlreadyStarted,
    Uart(uart::ConfigError),
    Console(ConsoleError),
    Spawn(SpawnError),
}

struct ConsolePins {
    uart: UART0<'static>,
    tx: GPIO43<'static>,
    rx: GPIO44<'static>,
}

/// Console on UART0, served by its own task.
pub(super) struct UartConsoleHost {
    spawner: Spawner,
    pins: Option<ConsolePins>,
    table: &'static SharedCommandTable,
}

impl UartConsoleHost {
    pub(super) fn new(
        spawner: Spawner,
        uart: UART0<'static>,
        tx: GPIO43<'static>,
        rx: GPIO44<'static>,
        table: &'static SharedCommandTable,
    ) -> Self {
        Self {
            spawner,
            pins: Some(ConsolePins { uart, tx, rx }),
            table,
        }
    }
}

impl ConsoleHost for UartConsoleHost {
    type Error = ConsoleHostError;

    fn start(&mut self, config: &ConsoleConfig) -> Result<(), Self::Error> {
        let pins = self.pins.take().ok_or(ConsoleHostError::AlreadyStarted)?;
        let serial = Uart::new(
            pins.uart,
            uart::Config::default().with_baudrate(CONSOLE_BAUD),
        )
        .map_err(ConsoleHostError::Uart)?
        .with_tx(pins.tx)
        .with_rx(pins.rx)
        .into_async();

        let console =
            CommandConsole::new(serial, self.table, *config).map_err(ConsoleHostError::Console)?;
        let token = console_task(console).map_err(ConsoleHostError::Spawn)?;
        self.spawner.spawn(token);
        Ok(())
    }

    fn register(
        &mut self,
        group: CommandGroup,
        commands: &'static [Command],
    ) -> Result<Registration, Self::Error> {
        self.table
            .register(group, commands)
            .map_err(ConsoleHostError::Console)
    }
}

#[embassy_executor::task]
async fn console_task(mut console: SerialConsole) {
    let Err(err) = console.run().await;
    warn!("console: serial transport stopped: {:?}", err);
}
