//! Hand-driven scheduler.
//!
//! Timers only tick when [`ManualScheduler::fire`] is called. Dispatched jobs
//! run inline on the caller's thread, or are queued until
//! [`ManualScheduler::run_pending`] when created with
//! [`ManualScheduler::deferred`]. Useful for hosts that drive sampling from
//! their own loop, and for deterministic tests.

use super::{Job, Scheduler, Tick, TimerHandle};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Number of calls made to each scheduler operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerCalls {
    pub created: usize,
    pub started: usize,
    pub paused: usize,
    pub reset: usize,
    pub destroyed: usize,
    pub dispatched: usize,
}

struct ManualTimer {
    interval: Duration,
    tick: Tick,
    running: bool,
}

/// Scheduler whose timers are fired explicitly.
#[derive(Default)]
pub struct ManualScheduler {
    next_id: AtomicU64,
    timers: Mutex<HashMap<TimerHandle, ManualTimer>>,
    calls: Mutex<SchedulerCalls>,
    defer: bool,
    pending: Mutex<VecDeque<Job>>,
}

impl ManualScheduler {
    /// Runs dispatched jobs inline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues dispatched jobs until [`ManualScheduler::run_pending`].
    pub fn deferred() -> Self {
        Self {
            defer: true,
            ..Self::default()
        }
    }

    /// Runs queued jobs, including ones queued while running. Returns how
    /// many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn pending_jobs(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Ticks one timer if it is running. Returns whether it ticked.
    pub fn fire(&self, handle: TimerHandle) -> bool {
        let tick = match self.timers().get(&handle) {
            Some(timer) if timer.running => timer.tick.clone(),
            _ => return false,
        };
        tick();
        true
    }

    /// Ticks every running timer once. Returns how many ticked.
    pub fn fire_all(&self) -> usize {
        let ticks: Vec<Tick> = self
            .timers()
            .values()
            .filter(|timer| timer.running)
            .map(|timer| timer.tick.clone())
            .collect();
        for tick in &ticks {
            tick();
        }
        ticks.len()
    }

    pub fn calls(&self) -> SchedulerCalls {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn interval(&self, handle: TimerHandle) -> Option<Duration> {
        self.timers().get(&handle).map(|timer| timer.interval)
    }

    pub fn is_running(&self, handle: TimerHandle) -> bool {
        self.timers()
            .get(&handle)
            .map(|timer| timer.running)
            .unwrap_or(false)
    }

    pub fn live_timers(&self) -> usize {
        self.timers().len()
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<TimerHandle, ManualTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, f: impl FnOnce(&mut SchedulerCalls)) {
        f(&mut self.calls.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl Scheduler for ManualScheduler {
    fn create(&self, interval: Duration, tick: Tick) -> TimerHandle {
        self.record(|c| c.created += 1);
        let handle = TimerHandle::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.timers().insert(
            handle,
            ManualTimer {
                interval,
                tick,
                running: false,
            },
        );
        handle
    }

    fn start(&self, handle: TimerHandle) {
        self.record(|c| c.started += 1);
        if let Some(timer) = self.timers().get_mut(&handle) {
            timer.running = true;
        }
    }

    fn pause(&self, handle: TimerHandle) {
        self.record(|c| c.paused += 1);
        if let Some(timer) = self.timers().get_mut(&handle) {
            timer.running = false;
        }
    }

    fn reset(&self, handle: TimerHandle, interval: Duration, restart: bool) {
        self.record(|c| c.reset += 1);
        if let Some(timer) = self.timers().get_mut(&handle) {
            timer.interval = interval;
            timer.running = restart;
        }
    }

    fn destroy(&self, handle: TimerHandle) {
        self.record(|c| c.destroyed += 1);
        self.timers().remove(&handle);
    }

    fn dispatch(&self, job: Job) {
        self.record(|c| c.dispatched += 1);
        if self.defer {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(job);
        } else {
            job();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_fire_only_running_timers() {
        let scheduler = ManualScheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let handle = scheduler.create(
            Duration::from_secs(1),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(!scheduler.fire(handle));
        scheduler.start(handle);
        assert!(scheduler.fire(handle));
        assert_eq!(scheduler.fire_all(), 1);
        scheduler.pause(handle);
        assert_eq!(scheduler.fire_all(), 0);
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_and_destroy() {
        let scheduler = ManualScheduler::new();
        let handle = scheduler.create(Duration::from_secs(5), Arc::new(|| {}));
        scheduler.reset(handle, Duration::from_secs(1), true);
        assert_eq!(scheduler.interval(handle), Some(Duration::from_secs(1)));
        assert!(scheduler.is_running(handle));

        scheduler.destroy(handle);
        assert_eq!(scheduler.live_timers(), 0);
        assert!(!scheduler.fire(handle));

        let calls = scheduler.calls();
        assert_eq!(calls.created, 1);
        assert_eq!(calls.reset, 1);
        assert_eq!(calls.destroyed, 1);
    }

    #[test]
    fn test_dispatch_runs_inline() {
        let scheduler = ManualScheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        scheduler.dispatch(Box::new(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.calls().dispatched, 1);
    }

    #[test]
    fn test_deferred_dispatch_queues_jobs() {
        let scheduler = Arc::new(ManualScheduler::deferred());
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        let nested = scheduler.clone();
        scheduler.dispatch(Box::new(move || {
            flag.fetch_add(1, Ordering::SeqCst);
            let flag = flag.clone();
            nested.dispatch(Box::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }));
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_jobs(), 1);

        assert_eq!(scheduler.run_pending(), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending_jobs(), 0);
    }
}
