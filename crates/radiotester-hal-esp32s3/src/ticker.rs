use embassy_time::{Duration, Ticker};
use radiotester_core::watchdog::PeriodicTick;

/// [`PeriodicTick`] backed by an embassy [`Ticker`], which does not drift.
pub struct EmbassyTicker(Ticker);

impl EmbassyTicker {
    pub fn every_ms(period_ms: u32) -> Self {
        Self(Ticker::every(Duration::from_millis(period_ms as u64)))
    }
}

impl PeriodicTick for EmbassyTicker {
    async fn next(&mut self) {
        self.0.next().await;
    }
}
