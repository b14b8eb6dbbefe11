//! Platform start: board init followed by the single worker spawn.

use log::info;

/// Scheduling priority requested for a task.
///
/// Hosts without preemptive priorities (the embassy thread executor runs every
/// task at the one executor priority) only report it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

/// Shape of the one worker task created at start-up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkerSpec {
    pub name: &'static str,
    /// Stack budget. Embassy tasks have no stack of their own: their state
    /// lives in a static future slot and they run on the executor's stack,
    /// so the board only logs this.
    pub stack_bytes: usize,
    pub priority: TaskPriority,
}

impl WorkerSpec {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            stack_bytes: 4 * 1024,
            priority: TaskPriority::Low,
        }
    }

    pub const fn with_stack_bytes(mut self, stack_bytes: usize) -> Self {
        self.stack_bytes = stack_bytes;
        self
    }

    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for WorkerSpec {
    fn default() -> Self {
        Self::new("ConsoleTask")
    }
}

/// Board support: clocks, interrupts, debug serial and task creation.
pub trait Platform {
    type Error: core::fmt::Debug;

    fn init(&mut self) -> Result<(), Self::Error>;
    fn spawn_worker(&mut self, spec: &WorkerSpec) -> Result<(), Self::Error>;
}

/// Errors that leave the device unable to run anything.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FatalError<E> {
    PlatformInit(E),
    WorkerSpawn(E),
}

/// Initialises the platform and spawns the worker, then returns.
///
/// Nothing is spawned when platform init fails. Callers are expected to halt on
/// any error.
pub fn start<P: Platform>(platform: &mut P, spec: &WorkerSpec) -> Result<(), FatalError<P::Error>> {
    platform.init().map_err(FatalError::PlatformInit)?;
    info!(
        "boot: platform ready; spawning worker '{}' stack_budget={}B priority={:?}",
        spec.name, spec.stack_bytes, spec.priority
    );
    platform.spawn_worker(spec).map_err(FatalError::WorkerSpawn)?;
    Ok(())
}
