//! Module orchestration.
//!
//! A [`Module`] groups readers of different sample types under one name and
//! one enabled flag, and relays their output to consumers as a single
//! module-specific message type `M`.

use crate::reader::{validate_interval, Reader, ReaderConfig, ReaderEvent, ReaderState};
use crate::scheduler::Scheduler;
use crate::source::{Sample, Source};
use crate::store::{self, ConfigStore};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Type-erased lifecycle controls of a reader.
pub trait ReaderControl: Send + Sync {
    fn name(&self) -> &str;
    fn state(&self) -> ReaderState;
    fn is_ready(&self) -> bool;
    fn is_popup_driven(&self) -> bool;
    fn history_len(&self) -> usize;
    fn start(&self);
    fn pause(&self);
    fn stop(&self);
    fn read(&self);
    fn teardown(&self);
    fn set_interval(&self, seconds: f64) -> Result<()>;
}

impl<T: Sample> ReaderControl for Reader<T> {
    fn name(&self) -> &str {
        Reader::name(self)
    }

    fn state(&self) -> ReaderState {
        Reader::state(self)
    }

    fn is_ready(&self) -> bool {
        Reader::is_ready(self)
    }

    fn is_popup_driven(&self) -> bool {
        self.config().is_popup_driven
    }

    fn history_len(&self) -> usize {
        self.history().len()
    }

    fn start(&self) {
        Reader::start(self)
    }

    fn pause(&self) {
        Reader::pause(self)
    }

    fn stop(&self) {
        Reader::stop(self)
    }

    fn read(&self) {
        Reader::read(self)
    }

    fn teardown(&self) {
        Reader::teardown(self)
    }

    fn set_interval(&self, seconds: f64) -> Result<()> {
        Reader::set_interval(self, seconds)
    }
}

/// What happened on a reader, in the module's message type.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEventKind<M> {
    Ready,
    Value(M),
    Failed,
}

/// Event relayed from one of a module's readers.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleEvent<M> {
    pub module: String,
    pub reader: String,
    pub kind: ModuleEventKind<M>,
}

/// Point-in-time view of one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderStatus {
    pub name: String,
    pub state: ReaderState,
    pub ready: bool,
    pub history_len: usize,
}

type ModuleObserver<M> = Arc<dyn Fn(&ModuleEvent<M>) + Send + Sync>;
type HistoryFn<M> = Arc<dyn Fn() -> Vec<M> + Send + Sync>;

struct Entry<M> {
    control: Arc<dyn ReaderControl>,
    history: HistoryFn<M>,
}

impl<M> Clone for Entry<M> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            history: self.history.clone(),
        }
    }
}

/// Named, append-only group of readers.
pub struct Module<M> {
    name: String,
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<dyn Scheduler>,
    enabled: AtomicBool,
    visible: AtomicBool,
    readers: RwLock<Vec<Entry<M>>>,
    observers: Arc<RwLock<Vec<ModuleObserver<M>>>>,
}

impl<M: Clone + Send + Sync + 'static> Module<M> {
    /// Creates a disabled module with no readers.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn ConfigStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            scheduler,
            enabled: AtomicBool::new(false),
            visible: AtomicBool::new(false),
            readers: RwLock::new(Vec::new()),
            observers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    /// Registers a consumer for events from every reader.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&ModuleEvent<M>) + Send + Sync + 'static,
    {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    /// Builds a reader whose interval is seeded from this module's stored
    /// preferences, then adds it.
    pub fn add_source<S, T>(&self, source: S, config: ReaderConfig) -> Result<Reader<T>>
    where
        S: Source<Output = T>,
        T: Sample + Into<M>,
    {
        let config = config.seeded(self.store.as_ref(), &self.name);
        let reader = Reader::new(source, config, self.scheduler.clone())?;
        self.add_reader(reader.clone());
        Ok(reader)
    }

    /// Appends a reader. If the module is enabled the reader samples once
    /// and starts right away, unless it is popup-driven and hidden.
    pub fn add_reader<T>(&self, reader: Reader<T>)
    where
        T: Sample + Into<M>,
    {
        let observers = self.observers.clone();
        let module = self.name.clone();
        let reader_name = reader.name().to_string();
        reader.subscribe(move |event| {
            let kind = match event {
                ReaderEvent::Ready => ModuleEventKind::Ready,
                ReaderEvent::Value(value) => ModuleEventKind::Value(value.clone().into()),
                ReaderEvent::Failed => ModuleEventKind::Failed,
            };
            let event = ModuleEvent {
                module: module.clone(),
                reader: reader_name.clone(),
                kind,
            };
            let observers = observers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for observer in &observers {
                observer(&event);
            }
        });

        let control: Arc<dyn ReaderControl> = Arc::new(reader.clone());
        let history_reader = reader.clone();
        let entry = Entry {
            control: control.clone(),
            history: Arc::new(move || {
                history_reader
                    .history()
                    .into_iter()
                    .map(Into::into)
                    .collect::<Vec<M>>()
            }),
        };
        self.readers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        debug!("Module {} added reader {}", self.name, reader.name());

        if self.is_enabled() {
            if !self.is_hidden_popup(control.as_ref()) {
                control.read();
            }
            self.activate(control.as_ref());
        }
    }

    /// Starts every reader. Popup-driven readers only sample once while
    /// their consumer is hidden.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        for entry in self.entries() {
            self.activate(entry.control.as_ref());
        }
        info!("Module {} enabled", self.name);
    }

    /// Pauses every reader, keeping their history.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        for entry in self.entries() {
            entry.control.pause();
        }
        info!("Module {} disabled", self.name);
    }

    /// Stops every reader and tears down its source. Irreversible.
    pub fn terminate(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        for entry in self.entries() {
            entry.control.stop();
            entry.control.teardown();
        }
        info!("Module {} terminated", self.name);
    }

    /// Persists a new update interval and applies it to every reader.
    pub fn set_interval(&self, seconds: f64) -> Result<()> {
        validate_interval(seconds)?;
        self.store
            .set(&store::interval_key(&self.name), &seconds.to_string())?;
        for entry in self.entries() {
            match entry.control.set_interval(seconds) {
                Ok(()) | Err(Error::ReaderStopped(_)) => {}
                Err(e) => return Err(e),
            }
        }
        info!("Module {} interval set to {}s", self.name, seconds);
        Ok(())
    }

    /// Tells popup-driven readers whether their consumer is shown.
    ///
    /// Shown readers start sampling, hidden ones pause. Ignored while the
    /// module is disabled.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
        if !self.is_enabled() {
            return;
        }
        for entry in self.entries() {
            if !entry.control.is_popup_driven() {
                continue;
            }
            if visible {
                entry.control.start();
            } else {
                entry.control.pause();
            }
        }
        debug!("Module {} visible: {}", self.name, visible);
    }

    fn activate(&self, control: &dyn ReaderControl) {
        if self.is_hidden_popup(control) {
            control.read();
        } else {
            control.start();
        }
    }

    fn is_hidden_popup(&self, control: &dyn ReaderControl) -> bool {
        control.is_popup_driven() && !self.is_visible()
    }

    /// History of the named reader, oldest first.
    pub fn history(&self, reader: &str) -> Option<Vec<M>> {
        self.entries()
            .into_iter()
            .find(|entry| entry.control.name() == reader)
            .map(|entry| (entry.history)())
    }

    pub fn status(&self) -> Vec<ReaderStatus> {
        self.entries()
            .iter()
            .map(|entry| ReaderStatus {
                name: entry.control.name().to_string(),
                state: entry.control.state(),
                ready: entry.control.is_ready(),
                history_len: entry.control.history_len(),
            })
            .collect()
    }

    pub fn reader_count(&self) -> usize {
        self.readers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn entries(&self) -> Vec<Entry<M>> {
        self.readers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
