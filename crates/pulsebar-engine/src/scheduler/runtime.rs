//! Scheduler backed by a tokio runtime.

use super::{Job, Scheduler, Tick, TimerHandle};
use crate::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

struct Timer {
    interval: Duration,
    tick: Tick,
    task: Option<JoinHandle<()>>,
}

impl Timer {
    fn spawn(&mut self, runtime: &Handle) {
        self.halt();
        self.task = Some(runtime.spawn(run_timer(self.interval, self.tick.clone())));
    }

    fn halt(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_timer(period: Duration, tick: Tick) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        tick();
    }
}

/// Runs each timer as a task on a tokio runtime and dispatches jobs to the
/// blocking pool.
pub struct TokioScheduler {
    runtime: Handle,
    next_id: AtomicU64,
    timers: Mutex<HashMap<TimerHandle, Timer>>,
}

impl TokioScheduler {
    /// Creates a scheduler on the given runtime.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a scheduler on the runtime of the calling context.
    pub fn current() -> Result<Self> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Number of timers not yet destroyed.
    pub fn live_timers(&self) -> usize {
        self.timers().len()
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<TimerHandle, Timer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for TokioScheduler {
    fn create(&self, interval: Duration, tick: Tick) -> TimerHandle {
        let handle = TimerHandle::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.timers().insert(
            handle,
            Timer {
                interval,
                tick,
                task: None,
            },
        );
        debug!("Created {} with interval {:?}", handle, interval);
        handle
    }

    fn start(&self, handle: TimerHandle) {
        if let Some(timer) = self.timers().get_mut(&handle) {
            if timer.task.is_none() {
                timer.spawn(&self.runtime);
                trace!("Started {}", handle);
            }
        }
    }

    fn pause(&self, handle: TimerHandle) {
        if let Some(timer) = self.timers().get_mut(&handle) {
            timer.halt();
            trace!("Paused {}", handle);
        }
    }

    fn reset(&self, handle: TimerHandle, interval: Duration, restart: bool) {
        if let Some(timer) = self.timers().get_mut(&handle) {
            timer.halt();
            timer.interval = interval;
            if restart {
                timer.spawn(&self.runtime);
            }
            debug!("Reset {} to {:?} (restart: {})", handle, interval, restart);
        }
    }

    fn destroy(&self, handle: TimerHandle) {
        if let Some(mut timer) = self.timers().remove(&handle) {
            timer.halt();
            debug!("Destroyed {}", handle);
        }
    }

    fn dispatch(&self, job: Job) {
        drop(self.runtime.spawn_blocking(job));
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for timer in self.timers().values_mut() {
            timer.halt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_tick() -> (Tick, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let tick: Tick = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (tick, ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_interval() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tick, ticks) = counting_tick();
        let handle = scheduler.create(Duration::from_secs(1), tick);

        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0, "created timers are stopped");

        scheduler.start(handle);
        time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_interval_takes_effect_from_now() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tick, ticks) = counting_tick();
        let handle = scheduler.create(Duration::from_secs(5), tick);
        scheduler.start(handle);
        scheduler.reset(handle, Duration::from_secs(1), true);

        time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
        assert_eq!(scheduler.live_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tick, ticks) = counting_tick();
        let handle = scheduler.create(Duration::from_secs(1), tick);
        scheduler.start(handle);

        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        scheduler.pause(handle);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        scheduler.start(handle);
        time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_stops_ticks() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tick, ticks) = counting_tick();
        let handle = scheduler.create(Duration::from_secs(1), tick);
        scheduler.start(handle);
        scheduler.destroy(handle);
        scheduler.destroy(handle);
        assert_eq!(scheduler.live_timers(), 0);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        // Unknown handles are ignored
        scheduler.start(handle);
        assert_eq!(scheduler.live_timers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dispatch_runs_on_blocking_pool() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.dispatch(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));
        let worker = rx.await.unwrap();
        assert_ne!(worker, std::thread::current().id());
    }

    #[test]
    fn test_current_without_runtime() {
        assert!(TokioScheduler::current().is_err());
    }
}
