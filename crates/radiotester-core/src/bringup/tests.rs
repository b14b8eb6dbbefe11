use std::{cell::RefCell, collections::VecDeque, rc::Rc, vec::Vec as StdVec};

use embassy_futures::block_on;

use super::*;
use crate::{
    boot::TaskPriority,
    console::{CommandResult, CommandTable},
    net::pack_ipv4,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Event {
    Prepare(CommandGroup),
    NetworkInit(InterfaceType),
    Connect,
    Delay(u32),
    ConsoleStart,
    Register(CommandGroup),
    WatchdogArm,
}

type Log = Rc<RefCell<StdVec<Event>>>;

struct FakeNetwork {
    log: Log,
    fail_init: bool,
    // Replayed in order; once empty every attempt fails.
    results: VecDeque<Result<u32, &'static str>>,
}

impl ConnectionManager for FakeNetwork {
    type Error = &'static str;

    async fn init(&mut self, interface: InterfaceType) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(Event::NetworkInit(interface));
        if self.fail_init {
            return Err("radio off");
        }
        Ok(())
    }

    async fn connect_ap(&mut self, params: &ConnectParams) -> Result<u32, Self::Error> {
        assert_eq!(params.ssid(), "lab");
        self.log.borrow_mut().push(Event::Connect);
        self.results.pop_front().unwrap_or(Err("no ap"))
    }
}

struct FakeDelay {
    log: Log,
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.log.borrow_mut().push(Event::Delay(ns / 1_000_000));
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(Event::Delay(ms));
    }
}

struct FakeConsole {
    log: Log,
    fail_start: bool,
    started_with: Option<ConsoleConfig>,
    table: CommandTable,
}

impl ConsoleHost for FakeConsole {
    type Error = crate::console::ConsoleError;

    fn start(&mut self, config: &ConsoleConfig) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(Event::ConsoleStart);
        self.started_with = Some(*config);
        if self.fail_start {
            return Err(crate::console::ConsoleError::InvalidConfig);
        }
        Ok(())
    }

    fn register(
        &mut self,
        group: CommandGroup,
        commands: &'static [Command],
    ) -> Result<Registration, Self::Error> {
        self.log.borrow_mut().push(Event::Register(group));
        self.table.register(group, commands)
    }
}

fn noop(_args: &[&str], _out: &mut dyn core::fmt::Write) -> CommandResult {
    Ok(())
}

static WIFI_COMMANDS: [Command; 1] = [Command::new("wifi_status", "", "", noop)];
static BT_COMMANDS: [Command; 1] = [Command::new("bt_status", "", "", noop)];
static IPERF_COMMANDS: [Command; 1] = [Command::new("iperf", "", "", noop)];

struct FakeCommandSets {
    log: Log,
    failing: Option<CommandGroup>,
    seen_interface: Option<InterfaceType>,
}

impl CommandSets for FakeCommandSets {
    type Error = &'static str;

    fn prepare(&mut self, group: CommandGroup) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(Event::Prepare(group));
        Ok(())
    }

    fn commands(
        &mut self,
        group: CommandGroup,
        context: &RegistrationContext,
    ) -> Result<&'static [Command], Self::Error> {
        self.seen_interface = Some(context.interface);
        if self.failing == Some(group) {
            return Err("group init failed");
        }
        Ok(match group {
            CommandGroup::Wifi => &WIFI_COMMANDS,
            CommandGroup::Bluetooth => &BT_COMMANDS,
            CommandGroup::Iperf => &IPERF_COMMANDS,
        })
    }
}

struct FakeWatchdog {
    log: Log,
    armed_with: Option<WatchdogPolicy>,
}

impl WatchdogTimer for FakeWatchdog {
    type Error = &'static str;

    fn arm(&mut self, policy: &WatchdogPolicy) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(Event::WatchdogArm);
        self.armed_with = Some(*policy);
        Ok(())
    }
}

type TestWorker = Worker<FakeNetwork, FakeConsole, FakeCommandSets, FakeWatchdog, FakeDelay>;

struct Harness {
    log: Log,
    worker: TestWorker,
}

impl Harness {
    fn new(config: BringupConfig, results: &[Result<u32, &'static str>]) -> Self {
        let log: Log = Rc::default();
        let worker = Worker::new(
            config,
            FakeNetwork {
                log: log.clone(),
                fail_init: false,
                results: results.iter().copied().collect(),
            },
            FakeConsole {
                log: log.clone(),
                fail_start: false,
                started_with: None,
                table: CommandTable::new(),
            },
            FakeCommandSets {
                log: log.clone(),
                failing: None,
                seen_interface: None,
            },
            FakeWatchdog {
                log: log.clone(),
                armed_with: None,
            },
            FakeDelay { log: log.clone() },
        );
        Self { log, worker }
    }

    fn events(&self) -> StdVec<Event> {
        self.log.borrow().clone()
    }

    fn count(&self, event: Event) -> usize {
        self.log.borrow().iter().filter(|e| **e == event).count()
    }
}

fn config() -> BringupConfig {
    BringupConfig::new(WifiCredentials::new("lab", "secret"))
}

const LAB_IP: u32 = pack_ipv4([192, 168, 1, 10]);

#[test]
fn joins_after_transient_failures() {
    let mut h = Harness::new(config(), &[Err("busy"), Err("busy"), Ok(LAB_IP)]);

    let report = block_on(h.worker.setup()).unwrap();

    assert_eq!(
        report.network,
        Ok(JoinedNetwork {
            ipv4: LAB_IP,
            attempts: 3
        })
    );
    assert_eq!(report.network.unwrap().ip_string().as_str(), "192.168.1.10");
    assert_eq!(h.count(Event::Connect), 3);
    assert_eq!(h.worker.state(), WorkerState::WatchdogArmed);
}

#[test]
fn join_gives_up_after_fifteen_attempts() {
    let mut h = Harness::new(config(), &[]);

    let report = block_on(h.worker.setup()).unwrap();

    assert_eq!(
        report.network,
        Err(JoinError::AttemptsExhausted { attempts: 15 })
    );
    assert_eq!(h.count(Event::Connect), 15);
    // Device still comes up without the network.
    assert_eq!(report.console, StepOutcome::Done);
    assert_eq!(report.watchdog, StepOutcome::Done);
    assert_eq!(h.count(Event::WatchdogArm), 1);
}

#[test]
fn exhausted_join_is_reported_abandoned_exactly_once() {
    let mut h = Harness::new(config(), &[]);

    let _ = block_on(h.worker.setup()).unwrap();

    let states: StdVec<WorkerState> = h.worker.transitions().collect();
    let abandoned = states
        .iter()
        .filter(|s| **s == WorkerState::JoinAbandoned)
        .count();
    assert_eq!(abandoned, 1);

    let joining: StdVec<u8> = states
        .iter()
        .filter_map(|s| match s {
            WorkerState::JoiningNetwork { attempt } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(joining, (0..15).collect::<StdVec<u8>>());
    assert_eq!(
        &states[15..],
        &[
            WorkerState::JoinAbandoned,
            WorkerState::ConsoleStarting,
            WorkerState::CommandsRegistered,
            WorkerState::WatchdogArmed,
        ]
    );
}

#[test]
fn every_failed_attempt_is_followed_by_the_retry_delay() {
    let mut h = Harness::new(config(), &[]);

    let _ = block_on(h.worker.join_network());

    let events = h.events();
    let connects: StdVec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| **e == Event::Connect)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(connects.len(), 15);
    for index in connects {
        match events.get(index + 1) {
            Some(Event::Delay(ms)) => assert!(*ms >= 500),
            other => panic!("connect not followed by delay: {other:?}"),
        }
    }
    assert_eq!(h.worker.state(), WorkerState::JoinAbandoned);
}

#[test]
fn custom_join_policy_is_honoured() {
    let policy = JoinPolicy::new()
        .with_max_attempts(2)
        .with_retry_delay_ms(750);
    let mut h = Harness::new(config().with_join_policy(policy), &[]);

    let result = block_on(h.worker.join_network());

    assert_eq!(result, Err(JoinError::AttemptsExhausted { attempts: 2 }));
    assert_eq!(h.count(Event::Delay(750)), 2);
}

#[test]
fn invalid_credentials_never_reach_the_radio() {
    let mut h = Harness::new(BringupConfig::new(WifiCredentials::new("", "pw")), &[]);

    let result = block_on(h.worker.join_network());

    assert_eq!(result, Err(JoinError::InvalidCredentials));
    assert_eq!(h.count(Event::Connect), 0);
}

#[test]
fn network_init_failure_skips_join_but_not_console() {
    let mut h = Harness::new(config(), &[Ok(LAB_IP)]);
    h.worker.network.fail_init = true;

    let report = block_on(h.worker.setup()).unwrap();

    assert_eq!(report.network, Err(JoinError::InterfaceUnavailable));
    assert_eq!(h.count(Event::Connect), 0);
    assert_eq!(report.console, StepOutcome::Done);
    assert_eq!(report.registered.len(), 3);
}

#[test]
fn setup_runs_steps_in_order() {
    let mut h = Harness::new(config(), &[Ok(LAB_IP)]);

    block_on(h.worker.setup()).unwrap();

    assert_eq!(
        h.events(),
        [
            Event::Prepare(CommandGroup::Wifi),
            Event::Prepare(CommandGroup::Bluetooth),
            Event::Prepare(CommandGroup::Iperf),
            Event::NetworkInit(InterfaceType::Sta),
            Event::Connect,
            Event::Delay(500),
            Event::ConsoleStart,
            Event::Register(CommandGroup::Wifi),
            Event::Register(CommandGroup::Bluetooth),
            Event::Register(CommandGroup::Iperf),
            Event::WatchdogArm,
        ]
    );
    assert_eq!(h.worker.watchdog.armed_with, Some(WatchdogPolicy::default()));
    assert_eq!(h.worker.command_sets.seen_interface, Some(InterfaceType::Sta));
}

#[test]
fn console_host_receives_the_configured_task_priority() {
    let console = ConsoleConfig::default().with_priority(TaskPriority::High);
    let mut h = Harness::new(config().with_console(console), &[Ok(LAB_IP)]);

    block_on(h.worker.setup()).unwrap();

    let started = h.worker.console.started_with.unwrap();
    assert_eq!(started.priority, TaskPriority::High);
    assert_eq!(ConsoleConfig::default().priority, TaskPriority::Normal);
}

#[test]
fn configured_interface_reaches_network_and_command_groups() {
    let mut h = Harness::new(config().with_interface(InterfaceType::ApSta), &[Ok(LAB_IP)]);

    block_on(h.worker.setup()).unwrap();

    assert_eq!(h.count(Event::NetworkInit(InterfaceType::ApSta)), 1);
    assert_eq!(
        h.worker.command_sets.seen_interface,
        Some(InterfaceType::ApSta)
    );
}

#[test]
fn disabled_groups_are_not_registered() {
    let groups = CommandGroupSet::from_flags(true, false, true);
    let mut h = Harness::new(config().with_groups(groups), &[Ok(LAB_IP)]);

    let report = block_on(h.worker.setup()).unwrap();

    assert_eq!(h.count(Event::Register(CommandGroup::Bluetooth)), 0);
    assert_eq!(h.count(Event::Prepare(CommandGroup::Bluetooth)), 0);
    assert_eq!(report.registered.len(), 2);
}

#[test]
fn registering_twice_keeps_one_copy_of_each_group() {
    let mut h = Harness::new(config(), &[Ok(LAB_IP)]);
    let mut report = block_on(h.worker.setup()).unwrap();
    assert_eq!(h.worker.console.table.command_count(), 3);

    report.registered.clear();
    h.worker.register_commands(&mut report).unwrap();

    assert_eq!(h.worker.console.table.command_count(), 3);
    assert!(
        report
            .registered
            .iter()
            .all(|(_, r)| *r == Registration::AlreadyRegistered)
    );
    assert_eq!(report.registered.len(), 3);
    assert!(report.failed_groups.is_empty());
}

#[test]
fn console_failure_is_logged_and_watchdog_still_armed() {
    let mut h = Harness::new(config(), &[Ok(LAB_IP)]);
    h.worker.console.fail_start = true;

    let report = block_on(h.worker.setup()).unwrap();

    assert_eq!(report.console, StepOutcome::Failed);
    assert!(report.registered.is_empty());
    assert_eq!(h.count(Event::Register(CommandGroup::Wifi)), 0);
    assert_eq!(report.watchdog, StepOutcome::Done);
    assert_eq!(h.worker.state(), WorkerState::WatchdogArmed);
}

#[test]
fn console_failure_escalates_when_configured() {
    let config = config().with_subsystem_errors(SubsystemErrorPolicy::Escalate);
    let mut h = Harness::new(config, &[Ok(LAB_IP)]);
    h.worker.console.fail_start = true;

    let result = block_on(h.worker.setup());

    assert_eq!(
        result,
        Err(BringupError {
            subsystem: Subsystem::Console
        })
    );
    assert_eq!(h.count(Event::WatchdogArm), 0);
    assert_eq!(h.worker.state(), WorkerState::ConsoleStarting);
}

#[test]
fn one_failing_group_does_not_block_the_others() {
    let mut h = Harness::new(config(), &[Ok(LAB_IP)]);
    h.worker.command_sets.failing = Some(CommandGroup::Bluetooth);

    let report = block_on(h.worker.setup()).unwrap();

    assert_eq!(report.failed_groups.as_slice(), &[CommandGroup::Bluetooth]);
    assert_eq!(
        report.registered.as_slice(),
        &[
            (CommandGroup::Wifi, Registration::Added { commands: 1 }),
            (CommandGroup::Iperf, Registration::Added { commands: 1 }),
        ]
    );
}
