use embassy_executor::{SpawnError, Spawner};
use esp_hal::{peripherals::LPWR, rtc_cntl::Rtc};
use log::info;
use radiotester_core::watchdog::{WatchdogPolicy, WatchdogService, WatchdogTimer};
use radiotester_hal_esp32s3::{ticker::EmbassyTicker, watchdog::RtcWatchdog};

#[derive(Debug)]
pub(super) enum WatchdogTimerError {
    AlreadyArmed,
    Spawn(SpawnError),
}

/// Hands the RTC watchdog to a periodic refresh task, which enables it.
pub(super) struct TaskWatchdogTimer {
    spawner: Spawner,
    lpwr: Option<LPWR<'static>>,
}

impl TaskWatchdogTimer {
    pub(super) const fn new(spawner: Spawner, lpwr: LPWR<'static>) -> Self {
        Self {
            spawner,
            lpwr: Some(lpwr),
        }
    }
}

impl WatchdogTimer for TaskWatchdogTimer {
    type Error = WatchdogTimerError;

    fn arm(&mut self, policy: &WatchdogPolicy) -> Result<(), Self::Error> {
        let lpwr = self.lpwr.take().ok_or(WatchdogTimerError::AlreadyArmed)?;
        // Stays disabled until the refresh task starts it.
        let watchdog = RtcWatchdog::new(Rtc::new(lpwr));
        let token = watchdog_task(watchdog, *policy).map_err(WatchdogTimerError::Spawn)?;
        self.spawner.spawn(token);
        info!(
            "watchdog: armed, refresh every {}ms with a {}s margin",
            policy.period_ms, policy.margin_secs
        );
        Ok(())
    }
}

#[embassy_executor::task]
async fn watchdog_task(watchdog: RtcWatchdog<'static>, policy: WatchdogPolicy) {
    let ticker = EmbassyTicker::every_ms(policy.period_ms);
    WatchdogService::new(watchdog, ticker, policy).run().await
}
