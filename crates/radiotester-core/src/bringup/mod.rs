//! Worker-task sequence: network join, console, command groups, watchdog, idle.

use embedded_hal_async::delay::DelayNs;
use heapless::{Deque, Vec};
use log::{info, warn};

use crate::{
    commands::{CommandGroup, CommandGroupSet, CommandSets, RegistrationContext},
    console::{Command, ConsoleConfig, Registration},
    net::{
        ConnectParams, ConnectionManager, InterfaceType, JoinError, JoinPolicy, JoinedNetwork,
        WifiCredentials,
    },
    watchdog::{WatchdogPolicy, WatchdogTimer},
};

/// Recent transitions kept by [`Worker::transitions`].
pub const TRANSITION_HISTORY: usize = 32;

/// Worker progress. No transition leaves `Idle`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerState {
    Starting,
    /// `attempt` counts failed joins so far.
    JoiningNetwork {
        attempt: u8,
    },
    Joined {
        ipv4: u32,
    },
    JoinAbandoned,
    ConsoleStarting,
    CommandsRegistered,
    WatchdogArmed,
    Idle,
}

/// What to do when the console, a command group or the watchdog fails to start.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubsystemErrorPolicy {
    /// Log and carry on with the remaining steps.
    ContinueDegraded,
    /// Stop the sequence and return the failure to the caller.
    Escalate,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Subsystem {
    Console,
    CommandGroup(CommandGroup),
    Watchdog,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BringupError {
    pub subsystem: Subsystem,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    Done,
    Skipped,
    Failed,
}

/// Summary of one pass through [`Worker::setup`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BringupReport {
    pub network: Result<JoinedNetwork, JoinError>,
    pub console: StepOutcome,
    pub registered: Vec<(CommandGroup, Registration), 3>,
    pub failed_groups: Vec<CommandGroup, 3>,
    pub watchdog: StepOutcome,
}

impl BringupReport {
    const fn new() -> Self {
        Self {
            network: Err(JoinError::InterfaceUnavailable),
            console: StepOutcome::Skipped,
            registered: Vec::new(),
            failed_groups: Vec::new(),
            watchdog: StepOutcome::Skipped,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BringupConfig {
    pub credentials: WifiCredentials,
    pub interface: InterfaceType,
    pub join: JoinPolicy,
    pub console: ConsoleConfig,
    pub groups: CommandGroupSet,
    pub watchdog: WatchdogPolicy,
    pub subsystem_errors: SubsystemErrorPolicy,
    pub idle_interval_ms: u32,
}

impl BringupConfig {
    pub const fn new(credentials: WifiCredentials) -> Self {
        Self {
            credentials,
            interface: InterfaceType::Sta,
            join: JoinPolicy::new(),
            console: ConsoleConfig::new(),
            groups: CommandGroupSet::all(),
            watchdog: WatchdogPolicy::new(),
            subsystem_errors: SubsystemErrorPolicy::ContinueDegraded,
            idle_interval_ms: 500,
        }
    }

    pub const fn with_interface(mut self, interface: InterfaceType) -> Self {
        self.interface = interface;
        self
    }

    pub const fn with_join_policy(mut self, join: JoinPolicy) -> Self {
        self.join = join;
        self
    }

    pub const fn with_console(mut self, console: ConsoleConfig) -> Self {
        self.console = console;
        self
    }

    pub const fn with_groups(mut self, groups: CommandGroupSet) -> Self {
        self.groups = groups;
        self
    }

    pub const fn with_watchdog(mut self, watchdog: WatchdogPolicy) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub const fn with_subsystem_errors(mut self, policy: SubsystemErrorPolicy) -> Self {
        self.subsystem_errors = policy;
        self
    }
}

/// Interactive console that command groups are registered with.
pub trait ConsoleHost {
    type Error: core::fmt::Debug;

    fn start(&mut self, config: &ConsoleConfig) -> Result<(), Self::Error>;
    fn register(
        &mut self,
        group: CommandGroup,
        commands: &'static [Command],
    ) -> Result<Registration, Self::Error>;
}

pub struct Worker<N, C, S, T, D> {
    config: BringupConfig,
    network: N,
    console: C,
    command_sets: S,
    watchdog: T,
    delay: D,
    state: WorkerState,
    transitions: Deque<WorkerState, TRANSITION_HISTORY>,
}

impl<N, C, S, T, D> Worker<N, C, S, T, D>
where
    N: ConnectionManager,
    C: ConsoleHost,
    S: CommandSets,
    T: WatchdogTimer,
    D: DelayNs,
{
    pub const fn new(
        config: BringupConfig,
        network: N,
        console: C,
        command_sets: S,
        watchdog: T,
        delay: D,
    ) -> Self {
        Self {
            config,
            network,
            console,
            command_sets,
            watchdog,
            delay,
            state: WorkerState::Starting,
            transitions: Deque::new(),
        }
    }

    pub const fn state(&self) -> WorkerState {
        self.state
    }

    /// States entered so far, oldest first; the oldest drop out once full.
    pub fn transitions(&self) -> impl Iterator<Item = WorkerState> + '_ {
        self.transitions.iter().copied()
    }

    pub const fn config(&self) -> &BringupConfig {
        &self.config
    }

    /// Runs the whole sequence, then idles forever.
    pub async fn run(&mut self) -> Result<core::convert::Infallible, BringupError> {
        self.setup().await?;
        self.idle().await
    }

    /// Brings the device up to [`WorkerState::WatchdogArmed`].
    pub async fn setup(&mut self) -> Result<BringupReport, BringupError> {
        let mut report = BringupReport::new();

        self.prepare_groups(&mut report)?;
        report.network = self.bring_up_network().await;
        report.console = self.start_console()?;
        if report.console == StepOutcome::Done {
            self.register_commands(&mut report)?;
        } else {
            info!("worker: console unavailable; skipping command registration");
        }
        self.enter(WorkerState::CommandsRegistered);
        report.watchdog = self.arm_watchdog()?;

        Ok(report)
    }

    /// Joins the configured access point, retrying up to the policy limit.
    pub async fn join_network(&mut self) -> Result<JoinedNetwork, JoinError> {
        let policy = self.config.join;
        let max_attempts = policy.max_attempts.max(1);
        let mut params = ConnectParams::zeroed();
        let mut failures = 0u8;

        loop {
            self.enter(WorkerState::JoiningNetwork { attempt: failures });
            if let Err(err) = params.fill(&self.config.credentials) {
                warn!("wifi: credentials rejected ({:?}); not joining", err);
                self.enter(WorkerState::JoinAbandoned);
                return Err(err);
            }

            let result = self.network.connect_ap(&params).await;
            self.delay.delay_ms(policy.retry_delay_ms).await;

            match result {
                Ok(ipv4) => {
                    let joined = JoinedNetwork {
                        ipv4,
                        attempts: failures + 1,
                    };
                    info!(
                        "wifi: joined '{}' after {} attempt(s)",
                        self.config.credentials.ssid, joined.attempts
                    );
                    info!("wifi: IP address {} assigned", joined.ip_string());
                    self.enter(WorkerState::Joined { ipv4 });
                    return Ok(joined);
                }
                Err(err) => {
                    failures += 1;
                    if failures >= max_attempts {
                        warn!(
                            "wifi: exceeded max connection attempts ({}); last error {:?}",
                            max_attempts, err
                        );
                        self.enter(WorkerState::JoinAbandoned);
                        return Err(JoinError::AttemptsExhausted { attempts: failures });
                    }
                    info!(
                        "wifi: join attempt {}/{} failed ({:?}); retrying",
                        failures, max_attempts, err
                    );
                }
            }
        }
    }

    pub fn start_console(&mut self) -> Result<StepOutcome, BringupError> {
        self.enter(WorkerState::ConsoleStarting);
        let config = self.config.console;

        if let Err(err) = config.validate() {
            return self.subsystem_failed(Subsystem::Console, err);
        }
        match self.console.start(&config) {
            Ok(()) => {
                info!(
                    "console: started line_len={} history={} max_params={} priority={:?}",
                    config.line_len, config.history_len, config.max_params, config.priority
                );
                Ok(StepOutcome::Done)
            }
            Err(err) => self.subsystem_failed(Subsystem::Console, err),
        }
    }

    pub fn register_commands(&mut self, report: &mut BringupReport) -> Result<(), BringupError> {
        let context = RegistrationContext {
            interface: self.config.interface,
        };

        for group in self.config.groups.enabled() {
            let commands = match self.command_sets.commands(group, &context) {
                Ok(commands) => commands,
                Err(err) => {
                    self.group_failed(group, err, report)?;
                    continue;
                }
            };
            match self.console.register(group, commands) {
                Ok(registration) => {
                    info!("console: group '{}' {:?}", group.name(), registration);
                    let _ = report.registered.push((group, registration));
                }
                Err(err) => self.group_failed(group, err, report)?,
            }
        }

        Ok(())
    }

    pub fn arm_watchdog(&mut self) -> Result<StepOutcome, BringupError> {
        let policy = self.config.watchdog;
        if !policy.has_headroom() {
            warn!(
                "watchdog: period {}ms is not shorter than the {}s margin",
                policy.period_ms, policy.margin_secs
            );
        }

        match self.watchdog.arm(&policy) {
            Ok(()) => {
                self.enter(WorkerState::WatchdogArmed);
                Ok(StepOutcome::Done)
            }
            Err(err) => self.subsystem_failed(Subsystem::Watchdog, err),
        }
    }

    pub async fn idle(&mut self) -> ! {
        self.enter(WorkerState::Idle);
        loop {
            self.delay.delay_ms(self.config.idle_interval_ms).await;
        }
    }

    fn prepare_groups(&mut self, report: &mut BringupReport) -> Result<(), BringupError> {
        for group in self.config.groups.enabled() {
            if let Err(err) = self.command_sets.prepare(group) {
                self.group_failed(group, err, report)?;
            }
        }
        Ok(())
    }

    async fn bring_up_network(&mut self) -> Result<JoinedNetwork, JoinError> {
        let interface = self.config.interface;
        if let Err(err) = self.network.init(interface).await {
            warn!("wifi: connection manager init failed: {:?}", err);
            self.enter(WorkerState::JoinAbandoned);
            return Err(JoinError::InterfaceUnavailable);
        }
        info!("wifi: connection manager initialised ({:?})", interface);
        self.join_network().await
    }

    fn group_failed<E: core::fmt::Debug>(
        &mut self,
        group: CommandGroup,
        err: E,
        report: &mut BringupReport,
    ) -> Result<(), BringupError> {
        if !report.failed_groups.contains(&group) {
            let _ = report.failed_groups.push(group);
        }
        self.subsystem_failed(Subsystem::CommandGroup(group), err)
            .map(|_| ())
    }

    fn subsystem_failed<E: core::fmt::Debug>(
        &self,
        subsystem: Subsystem,
        err: E,
    ) -> Result<StepOutcome, BringupError> {
        warn!("worker: {:?} failed: {:?}", subsystem, err);
        match self.config.subsystem_errors {
            SubsystemErrorPolicy::ContinueDegraded => Ok(StepOutcome::Failed),
            SubsystemErrorPolicy::Escalate => Err(BringupError { subsystem }),
        }
    }

    fn enter(&mut self, next: WorkerState) {
        if self.state != next {
            info!("worker: {:?} -> {:?}", self.state, next);
            self.state = next;
            if self.transitions.is_full() {
                self.transitions.pop_front();
            }
            let _ = self.transitions.push_back(next);
        }
    }
}

#[cfg(test)]
mod tests;
