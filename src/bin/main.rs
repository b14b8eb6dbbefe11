#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::Timer;
use log::{LevelFilter, error, info};
use radiotester_core::{
    boot::{self, WorkerSpec},
    bringup::{BringupConfig, SubsystemErrorPolicy},
    commands::CommandGroupSet,
    console::SharedCommandTable,
    net::{InterfaceType, WifiCredentials},
};
use radiotester_hal_esp32s3::network::ConnectivityHandle;

use platform::BoardPlatform;

#[path = "main/command_sets.rs"]
mod command_sets;
#[path = "main/console_host.rs"]
mod console_host;
#[path = "main/platform.rs"]
mod platform;
#[path = "main/watchdog_timer.rs"]
mod watchdog_timer;
#[path = "main/worker.rs"]
mod worker;

const BANNER: &str = "Command console application";
const MAIN_IDLE_SECS: u64 = 60;
const NET_SEED: u64 = 0x7C31_9E04_B5A2_D86F;

const WIFI_SSID: &str = env!(
    "RADIOTESTER_WIFI_SSID",
    "Set RADIOTESTER_WIFI_SSID in your environment before building/flashing."
);
const WIFI_PASSWORD: &str = env!(
    "RADIOTESTER_WIFI_PASSWORD",
    "Set RADIOTESTER_WIFI_PASSWORD in your environment before building/flashing."
);
const WIFI_CREDENTIALS: WifiCredentials = WifiCredentials::new(WIFI_SSID, WIFI_PASSWORD);

const COMMAND_GROUPS: CommandGroupSet = CommandGroupSet::from_flags(
    cfg!(feature = "console-wifi"),
    cfg!(feature = "console-bt"),
    cfg!(feature = "console-iperf"),
);

const BRINGUP_CONFIG: BringupConfig = BringupConfig::new(WIFI_CREDENTIALS)
    .with_interface(InterfaceType::Sta)
    .with_groups(COMMAND_GROUPS)
    .with_subsystem_errors(SubsystemErrorPolicy::ContinueDegraded);

static CONNECTIVITY: ConnectivityHandle = ConnectivityHandle::new();
static COMMANDS: SharedCommandTable = SharedCommandTable::new();

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);
    esp_println::println!("{}", BANNER);

    let mut platform = BoardPlatform::new(spawner);
    if let Err(err) = boot::start(&mut platform, &WorkerSpec::default()) {
        error!("boot: fatal {:?}", err);
        panic!("platform bring-up failed");
    }
    info!("boot: main idle, worker owns bring-up");

    loop {
        Timer::after_secs(MAIN_IDLE_SECS).await;
    }
}
