//! Repeating timer abstraction used by readers.
//!
//! A scheduler owns timers and runs sample jobs off the caller's context.
//! [`TokioScheduler`] drives real timers; [`ManualScheduler`] is fired by hand
//! and runs jobs inline.

mod manual;
mod runtime;

pub use manual::{ManualScheduler, SchedulerCalls};
pub use runtime::TokioScheduler;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked on every timer tick.
pub type Tick = Arc<dyn Fn() + Send + Sync>;

/// One-shot unit of work dispatched off the caller's context.
pub type Job = Box<dyn FnOnce() + Send>;

/// Opaque handle to a timer owned by a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// A restartable, reconfigurable periodic trigger.
///
/// Timers are created stopped. Operations on an unknown or destroyed handle
/// are ignored.
pub trait Scheduler: Send + Sync {
    /// Creates a stopped timer that calls `tick` every `interval`.
    fn create(&self, interval: Duration, tick: Tick) -> TimerHandle;

    /// Starts (or resumes) the timer. The first tick comes one interval later.
    fn start(&self, handle: TimerHandle);

    /// Suspends the timer without forgetting it.
    fn pause(&self, handle: TimerHandle);

    /// Changes the period. The previous timer is cancelled; with `restart`
    /// it begins again from now.
    fn reset(&self, handle: TimerHandle, interval: Duration, restart: bool);

    /// Cancels and forgets the timer.
    fn destroy(&self, handle: TimerHandle);

    /// Runs `job` off the caller's context. Sampling may block.
    fn dispatch(&self, job: Job);
}
