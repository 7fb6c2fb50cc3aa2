//! The sampling engine.
//!
//! A [`Reader`] pulls values from a [`Source`] on a timer or on demand,
//! tracks readiness, keeps a bounded history and notifies observers.
//!
//! ```text
//!   Idle ──start──▶ Running ◀──start── Paused
//!                     │ ▲                ▲
//!                     │ └────────────────┘ pause
//!                     └──stop──▶ Stopped (terminal)
//! ```
//!
//! Every sample, scheduled or forced, enters through one funnel that is
//! serialized per reader. Stopping bumps a generation counter so fetches
//! still in flight are discarded when they complete.

use crate::buffer::SampleBuffer;
use crate::readiness::{ReadinessAction, ReadinessTracker};
use crate::scheduler::{Scheduler, Tick, TimerHandle};
use crate::source::{Sample, Source};
use crate::store::{self, ConfigStore};
use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Default sampling interval in seconds.
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// Converts an interval in seconds, rejecting zero, negative and non-finite values.
pub fn validate_interval(seconds: f64) -> Result<Duration> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(Duration::from_secs_f64(seconds))
    } else {
        Err(Error::InvalidInterval(seconds))
    }
}

/// Static reader settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Period of the sampling timer.
    pub interval_seconds: f64,
    /// Optional readers never retry or give up on empty samples.
    pub is_optional: bool,
    /// Popup-driven readers only sample while their consumer is visible.
    pub is_popup_driven: bool,
}

impl ReaderConfig {
    pub fn new(interval_seconds: f64) -> Self {
        Self {
            interval_seconds,
            is_optional: false,
            is_popup_driven: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn popup_driven(mut self) -> Self {
        self.is_popup_driven = true;
        self
    }

    /// Overrides the interval and popup flag from the module's stored
    /// preferences.
    pub fn seeded(mut self, store: &dyn ConfigStore, module: &str) -> Self {
        let key = store::interval_key(module);
        let seconds = store::get_f64(store, &key, self.interval_seconds);
        if validate_interval(seconds).is_ok() {
            self.interval_seconds = seconds;
        } else {
            warn!("Ignoring invalid {} value: {}", key, seconds);
        }
        if store::get_bool(store, &store::popup_key(module), false) {
            self.is_popup_driven = true;
        }
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_SECS)
    }
}

/// Lifecycle state of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderState {
    /// Constructed, never started.
    #[default]
    Idle,
    /// Timer active, or popup-driven and visible.
    Running,
    /// Timer suspended, history retained.
    Paused,
    /// Terminal.
    Stopped,
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderState::Idle => write!(f, "idle"),
            ReaderState::Running => write!(f, "running"),
            ReaderState::Paused => write!(f, "paused"),
            ReaderState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Notification published by a reader.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent<T> {
    /// First real value arrived. Published once, before that value.
    Ready,
    /// A new sample.
    Value(T),
    /// The source kept failing and the reader stopped itself.
    Failed,
}

type Observer<T> = Arc<dyn Fn(&ReaderEvent<T>) + Send + Sync>;

struct Core {
    state: ReaderState,
    config: ReaderConfig,
    interval: Duration,
    readiness: ReadinessTracker,
    timer: Option<TimerHandle>,
    generation: u64,
}

impl Core {
    /// Moves to `Stopped`. Returns false when already stopped.
    fn shut_down(&mut self) -> bool {
        if self.state == ReaderState::Stopped {
            return false;
        }
        self.state = ReaderState::Stopped;
        self.generation += 1;
        true
    }
}

struct Inner<T: Sample> {
    name: String,
    scheduler: Arc<dyn Scheduler>,
    source: Mutex<Box<dyn Source<Output = T>>>,
    buffer: SampleBuffer<T>,
    core: Mutex<Core>,
    delivery: Mutex<()>,
    /// Thread currently inside the delivery section, if any.
    delivering: Mutex<Option<ThreadId>>,
    observers: RwLock<Vec<Observer<T>>>,
    fetches: AtomicU64,
}

/// Marks the current thread as the delivering one until dropped.
struct DeliveryOwner<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
}

impl<'a> DeliveryOwner<'a> {
    fn enter(owner: &'a Mutex<Option<ThreadId>>) -> Self {
        *lock(owner) = Some(thread::current().id());
        Self { owner }
    }
}

impl Drop for DeliveryOwner<'_> {
    fn drop(&mut self) {
        *lock(self.owner) = None;
    }
}

/// Periodic and on-demand sampler over one source.
///
/// Cloning yields another handle to the same reader.
pub struct Reader<T: Sample> {
    inner: Arc<Inner<T>>,
}

impl<T: Sample> Clone for Reader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn lock<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Sample> Reader<T> {
    /// Creates an idle reader.
    pub fn new<S>(source: S, config: ReaderConfig, scheduler: Arc<dyn Scheduler>) -> Result<Self>
    where
        S: Source<Output = T>,
    {
        let interval = validate_interval(config.interval_seconds)?;
        let name = source.name().to_string();
        debug!(
            "Created reader {} (interval {:?}, optional: {}, popup: {})",
            name, interval, config.is_optional, config.is_popup_driven
        );
        Ok(Self {
            inner: Arc::new(Inner {
                name,
                scheduler,
                source: Mutex::new(Box::new(source)),
                buffer: SampleBuffer::new(),
                core: Mutex::new(Core {
                    state: ReaderState::Idle,
                    readiness: ReadinessTracker::new(config.is_optional),
                    config,
                    interval,
                    timer: None,
                    generation: 0,
                }),
                delivery: Mutex::new(()),
                delivering: Mutex::new(None),
                observers: RwLock::new(Vec::new()),
                fetches: AtomicU64::new(0),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> ReaderState {
        self.core().state
    }

    pub fn config(&self) -> ReaderConfig {
        self.core().config.clone()
    }

    pub fn interval(&self) -> Duration {
        self.core().interval
    }

    pub fn is_ready(&self) -> bool {
        self.core().readiness.is_ready()
    }

    /// Handle of the sampling timer, once one has been created.
    pub fn timer(&self) -> Option<TimerHandle> {
        self.core().timer
    }

    /// Number of times the source has been fetched.
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Buffered samples, oldest first.
    pub fn history(&self) -> Vec<T> {
        self.inner.buffer.snapshot()
    }

    pub fn latest(&self) -> Option<T> {
        self.inner.buffer.latest()
    }

    /// Registers an observer for every event.
    ///
    /// Observers run on the sampling thread while delivery is serialized.
    /// They may call `stop` (directly or through a module), but must not call
    /// `callback` on the same reader.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&ReaderEvent<T>) + Send + Sync + 'static,
    {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    pub fn on_value<F>(&self, observer: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let ReaderEvent::Value(value) = event {
                observer(value);
            }
        });
    }

    pub fn on_ready<F>(&self, observer: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let ReaderEvent::Ready = event {
                observer();
            }
        });
    }

    pub fn on_failed<F>(&self, observer: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let ReaderEvent::Failed = event {
                observer();
            }
        });
    }

    /// Starts or resumes sampling.
    ///
    /// A required popup-driven reader that has not produced data yet only
    /// takes one sample. Otherwise the timer is created on first use and started, and
    /// one sample is taken right away. Ignored once stopped.
    pub fn start(&self) {
        {
            let mut core = self.core();
            if core.state == ReaderState::Stopped {
                debug!("Ignoring start of stopped reader {}", self.name());
                return;
            }
            let previous = core.state;
            core.state = ReaderState::Running;

            let awaiting_data = !core.config.is_optional && !core.readiness.is_ready();
            if core.config.is_popup_driven && awaiting_data {
                debug!("Reader {} sampling once until ready", self.name());
            } else {
                let handle = match core.timer {
                    Some(handle) => handle,
                    None => {
                        let handle = self.inner.scheduler.create(core.interval, self.tick());
                        core.timer = Some(handle);
                        handle
                    }
                };
                self.inner.scheduler.start(handle);
            }
            debug!("Reader {}: {} -> running", self.name(), previous);
        }
        self.read();
    }

    /// Suspends the timer. History and readiness are kept.
    pub fn pause(&self) {
        let mut core = self.core();
        if core.state != ReaderState::Running {
            return;
        }
        core.state = ReaderState::Paused;
        if let Some(handle) = core.timer {
            self.inner.scheduler.pause(handle);
        }
        debug!("Reader {}: running -> paused", self.name());
    }

    /// Stops for good and releases the timer.
    ///
    /// Once this returns no observer is notified again.
    pub fn stop(&self) {
        // An observer stopping its own reader already holds the delivery lock
        let _delivery = if self.delivering_here() {
            None
        } else {
            Some(lock(&self.inner.delivery))
        };
        let timer = {
            let mut core = self.core();
            let previous = core.state;
            if !core.shut_down() {
                return;
            }
            debug!("Reader {}: {} -> stopped", self.name(), previous);
            core.timer.take()
        };
        if let Some(handle) = timer {
            self.inner.scheduler.destroy(handle);
        }
    }

    /// Changes the sampling period; the timer restarts from now.
    pub fn set_interval(&self, seconds: f64) -> Result<()> {
        let interval = validate_interval(seconds)?;
        let mut core = self.core();
        if core.state == ReaderState::Stopped {
            return Err(Error::ReaderStopped(self.name().to_string()));
        }
        core.config.interval_seconds = seconds;
        core.interval = interval;
        if let Some(handle) = core.timer {
            let restart = core.state == ReaderState::Running;
            self.inner.scheduler.reset(handle, interval, restart);
        }
        debug!("Reader {} interval set to {:?}", self.name(), interval);
        Ok(())
    }

    /// Forces one sample off the caller's context.
    pub fn read(&self) {
        let generation = {
            let core = self.core();
            if core.state == ReaderState::Stopped {
                trace!("Skipping read of stopped reader {}", self.name());
                return;
            }
            core.generation
        };
        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler.dispatch(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Reader { inner }.fetch_and_deliver(generation);
            }
        }));
    }

    /// Feeds a sample into the reader as if its source had produced it.
    pub fn callback(&self, value: Option<T>) {
        let generation = self.core().generation;
        self.deliver(generation, value);
    }

    /// Runs the source teardown hook.
    pub fn teardown(&self) {
        lock(&self.inner.source).teardown();
        debug!("Reader {} torn down", self.name());
    }

    fn tick(&self) -> Tick {
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                Reader { inner }.read();
            }
        })
    }

    fn fetch_and_deliver(&self, generation: u64) {
        if self.core().generation != generation {
            return;
        }
        let value = {
            let mut source = lock(&self.inner.source);
            self.inner.fetches.fetch_add(1, Ordering::SeqCst);
            match source.fetch() {
                Ok(value) => value,
                Err(e) => {
                    debug!("Reader {} fetch failed: {}", self.name(), e);
                    None
                }
            }
        };
        self.deliver(generation, value);
    }

    fn deliver(&self, generation: u64, value: Option<T>) {
        let action = {
            let _delivery = lock(&self.inner.delivery);
            let _owner = DeliveryOwner::enter(&self.inner.delivering);
            let (action, released) = {
                let mut core = self.core();
                if core.state == ReaderState::Stopped || core.generation != generation {
                    trace!("Discarding late sample for {}", self.name());
                    return;
                }
                let action = core.readiness.observe(value.is_some());
                let released = if action == ReadinessAction::GiveUp {
                    core.shut_down();
                    core.timer.take()
                } else {
                    None
                };
                (action, released)
            };
            if let Some(handle) = released {
                self.inner.scheduler.destroy(handle);
            }

            match action {
                ReadinessAction::BecameReady => info!("Reader {} is ready", self.name()),
                ReadinessAction::GiveUp => {
                    warn!("Reader {} returned no data repeatedly, stopping", self.name())
                }
                ReadinessAction::Retry => trace!("Reader {} retrying", self.name()),
                ReadinessAction::Continue => {}
            }

            if let Some(value) = value {
                self.inner.buffer.push(value.clone());
                if action == ReadinessAction::BecameReady {
                    self.notify(&ReaderEvent::Ready);
                }
                // The Ready observer may have stopped the reader
                if self.core().generation == generation {
                    self.notify(&ReaderEvent::Value(value));
                }
            }
            if action == ReadinessAction::GiveUp {
                self.notify(&ReaderEvent::Failed);
            }
            action
        };

        if action == ReadinessAction::Retry {
            self.read();
        }
    }

    fn notify(&self, event: &ReaderEvent<T>) {
        let observers = self
            .inner
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            observer(event);
        }
    }

    fn delivering_here(&self) -> bool {
        *lock(&self.inner.delivering) == Some(thread::current().id())
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        lock(&self.inner.core)
    }
}

impl<T: Sample> fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
