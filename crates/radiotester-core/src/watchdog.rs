//! Periodic watchdog refresh service.

use log::debug;

/// Refresh cadence and the deadline pushed out on each refresh.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WatchdogPolicy {
    pub period_ms: u32,
    pub margin_secs: u32,
}

impl WatchdogPolicy {
    pub const fn new() -> Self {
        Self {
            period_ms: 4_000,
            margin_secs: 5,
        }
    }

    pub const fn with_period_ms(mut self, period_ms: u32) -> Self {
        self.period_ms = period_ms;
        self
    }

    pub const fn with_margin_secs(mut self, margin_secs: u32) -> Self {
        self.margin_secs = margin_secs;
        self
    }

    /// Whether each refresh lands before the previous deadline expires.
    pub const fn has_headroom(&self) -> bool {
        (self.margin_secs as u64) * 1_000 > self.period_ms as u64
    }
}

impl Default for WatchdogPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// External watchdog whose deadline can be pushed out.
pub trait Watchdog {
    /// Enables the watchdog with a first deadline `margin_secs` out.
    fn start(&mut self, margin_secs: u32) {
        self.refresh(margin_secs);
    }

    fn refresh(&mut self, margin_secs: u32);
}

/// Fixed-period tick source.
pub trait PeriodicTick {
    async fn next(&mut self);
}

/// Starts the periodic refresh on whatever execution context the board provides.
pub trait WatchdogTimer {
    type Error: core::fmt::Debug;

    fn arm(&mut self, policy: &WatchdogPolicy) -> Result<(), Self::Error>;
}

/// Timer-service body: one refresh call per tick and nothing else.
pub struct WatchdogService<W, T> {
    watchdog: W,
    ticker: T,
    policy: WatchdogPolicy,
    refreshes: u32,
}

impl<W, T> WatchdogService<W, T>
where
    W: Watchdog,
    T: PeriodicTick,
{
    pub const fn new(watchdog: W, ticker: T, policy: WatchdogPolicy) -> Self {
        Self {
            watchdog,
            ticker,
            policy,
            refreshes: 0,
        }
    }

    /// Enables the hardware watchdog; it stays disabled until this runs.
    pub fn start(&mut self) {
        self.watchdog.start(self.policy.margin_secs);
        self.refreshes = self.refreshes.wrapping_add(1);
    }

    pub fn refresh_now(&mut self) {
        self.watchdog.refresh(self.policy.margin_secs);
        self.refreshes = self.refreshes.wrapping_add(1);
    }

    /// Waits one period, then refreshes.
    pub async fn tick(&mut self) {
        self.ticker.next().await;
        self.refresh_now();
        debug!("watchdog: refreshed (count={})", self.refreshes);
    }

    /// Starts the watchdog and then refreshes it once per period, forever.
    pub async fn run(&mut self) -> ! {
        self.start();
        loop {
            self.tick().await;
        }
    }

    pub const fn refresh_count(&self) -> u32 {
        self.refreshes
    }

    pub const fn policy(&self) -> &WatchdogPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, vec::Vec};

    use embassy_futures::block_on;

    use super::*;

    #[derive(Clone, Default)]
    struct Clock(Rc<RefCell<u64>>);

    impl Clock {
        fn now(&self) -> u64 {
            *self.0.borrow()
        }

        fn advance(&self, ms: u64) {
            *self.0.borrow_mut() += ms;
        }
    }

    struct FakeTicker {
        clock: Clock,
        period_ms: u64,
    }

    impl PeriodicTick for FakeTicker {
        async fn next(&mut self) {
            self.clock.advance(self.period_ms);
        }
    }

    struct RecordingWatchdog {
        clock: Clock,
        refreshes: Rc<RefCell<Vec<(u64, u32)>>>,
        starts: Rc<RefCell<u32>>,
    }

    impl Watchdog for RecordingWatchdog {
        fn start(&mut self, margin_secs: u32) {
            *self.starts.borrow_mut() += 1;
            self.refresh(margin_secs);
        }

        fn refresh(&mut self, margin_secs: u32) {
            self.refreshes
                .borrow_mut()
                .push((self.clock.now(), margin_secs));
        }
    }

    #[test]
    fn refreshes_never_gap_beyond_the_period() {
        let clock = Clock::default();
        let refreshes = Rc::new(RefCell::new(Vec::new()));
        let policy = WatchdogPolicy::default();
        let mut service = WatchdogService::new(
            RecordingWatchdog {
                clock: clock.clone(),
                refreshes: refreshes.clone(),
                starts: Rc::default(),
            },
            FakeTicker {
                clock: clock.clone(),
                period_ms: policy.period_ms as u64,
            },
            policy,
        );

        service.refresh_now();
        for _ in 0..50 {
            block_on(service.tick());
        }

        let refreshes = refreshes.borrow();
        assert_eq!(refreshes.len(), 51);
        assert_eq!(service.refresh_count(), 51);
        assert_eq!(refreshes[0], (0, 5));
        for pair in refreshes.windows(2) {
            assert!(pair[1].0 - pair[0].0 <= 4_000);
            assert_eq!(pair[1].1, 5);
        }
    }

    #[test]
    fn watchdog_stays_off_until_the_service_starts() {
        let clock = Clock::default();
        let refreshes = Rc::new(RefCell::new(Vec::new()));
        let starts = Rc::new(RefCell::new(0));
        let policy = WatchdogPolicy::default();
        let mut service = WatchdogService::new(
            RecordingWatchdog {
                clock: clock.clone(),
                refreshes: refreshes.clone(),
                starts: starts.clone(),
            },
            FakeTicker {
                clock: clock.clone(),
                period_ms: policy.period_ms as u64,
            },
            policy,
        );

        assert_eq!(*starts.borrow(), 0);
        assert!(refreshes.borrow().is_empty());

        service.start();
        block_on(service.tick());

        assert_eq!(*starts.borrow(), 1);
        assert_eq!(refreshes.borrow().as_slice(), &[(0, 5), (4_000, 5)]);
        assert_eq!(service.refresh_count(), 2);
    }

    #[test]
    fn default_policy_refreshes_before_deadline() {
        assert!(WatchdogPolicy::default().has_headroom());
        assert!(!WatchdogPolicy::default().with_period_ms(5_000).has_headroom());
    }
}
