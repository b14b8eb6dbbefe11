use embassy_executor::{SpawnError, Spawner};
use esp_hal::{
    clock::CpuClock,
    peripherals::{BT, GPIO43, GPIO44, LPWR, UART0, WIFI},
    timer::timg::TimerGroup,
};
use log::info;
use radiotester_core::boot::{Platform, WorkerSpec};

/// Peripherals handed from the boot path to the worker task.
pub(super) struct Board {
    pub wifi: WIFI<'static>,
    pub bt: BT<'static>,
    pub uart0: UART0<'static>,
    pub console_tx: GPIO43<'static>,
    pub console_rx: GPIO44<'static>,
    pub lpwr: LPWR<'static>,
}

#[derive(Debug)]
pub(super) enum PlatformError {
    NotInitialised,
    Spawn(SpawnError),
}

pub(super) struct BoardPlatform {
    spawner: Spawner,
    board: Option<Board>,
}

impl BoardPlatform {
    pub(super) const fn new(spawner: Spawner) -> Self {
        Self {
            spawner,
            board: None,
        }
    }
}

impl Platform for BoardPlatform {
    type Error = PlatformError;

    fn init(&mut self) -> Result<(), Self::Error> {
        let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
        let peripherals = esp_hal::init(config);

        esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);
        // Wi-Fi and BLE share the radio heap when both are up.
        esp_alloc::heap_allocator!(size: 48 * 1024);

        let timg0 = TimerGroup::new(peripherals.TIMG0);
        esp_rtos::start(timg0.timer0);

        self.board = Some(Board {
            wifi: peripherals.WIFI,
            bt: peripherals.BT,
            uart0: peripherals.UART0,
            console_tx: peripherals.GPIO43,
            console_rx: peripherals.GPIO44,
            lpwr: peripherals.LPWR,
        });
        info!("boot: clocks at max, heap and scheduler ready");
        Ok(())
    }

    fn spawn_worker(&mut self, spec: &WorkerSpec) -> Result<(), Self::Error> {
        let board = self.board.take().ok_or(PlatformError::NotInitialised)?;
        let token = super::worker::worker_task(board, self.spawner).map_err(PlatformError::Spawn)?;
        self.spawner.spawn(token);
        info!(
            "boot: spawned '{}' ({} byte budget, {:?})",
            spec.name, spec.stack_bytes, spec.priority
        );
        Ok(())
    }
}
