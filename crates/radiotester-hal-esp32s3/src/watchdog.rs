//! RTC watchdog (RWDT) behind the core [`Watchdog`] trait.

use esp_hal::{
    rtc_cntl::{Rtc, RwdtStage, RwdtStageAction},
    time::Duration,
};
use radiotester_core::watchdog::Watchdog;

/// Resets the whole system when stage 0 expires.
pub struct RtcWatchdog<'d> {
    rtc: Rtc<'d>,
}

impl<'d> RtcWatchdog<'d> {
    /// Configures the RWDT for a system reset. The watchdog stays disabled
    /// until [`Watchdog::start`].
    pub fn new(mut rtc: Rtc<'d>) -> Self {
        rtc.rwdt.disable();
        rtc.rwdt
            .set_stage_action(RwdtStage::Stage0, RwdtStageAction::ResetSystem);
        Self { rtc }
    }

    fn set_margin(&mut self, margin_secs: u32) {
        self.rtc
            .rwdt
            .set_timeout(RwdtStage::Stage0, Duration::from_secs(margin_secs as u64));
    }
}

impl Watchdog for RtcWatchdog<'_> {
    fn start(&mut self, margin_secs: u32) {
        self.set_margin(margin_secs);
        self.rtc.rwdt.enable();
        self.rtc.rwdt.feed();
    }

    fn refresh(&mut self, margin_secs: u32) {
        self.set_margin(margin_secs);
        self.rtc.rwdt.feed();
    }
}
