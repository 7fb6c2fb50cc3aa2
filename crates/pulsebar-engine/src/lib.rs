//! Pulsebar sampling engine
//!
//! Periodic and on-demand sampling of slow, possibly flaky data sources,
//! with readiness tracking, bounded history and module-level lifecycle
//! control.

pub mod buffer;
pub mod error;
pub mod module;
pub mod readiness;
pub mod reader;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod store;

pub use buffer::{SampleBuffer, HISTORY_CAPACITY};
pub use error::{Error, Result};
pub use module::{Module, ModuleEvent, ModuleEventKind, ReaderControl, ReaderStatus};
pub use readiness::{ReadinessAction, ReadinessTracker, NIL_THRESHOLD};
pub use reader::{Reader, ReaderConfig, ReaderEvent, ReaderState, DEFAULT_INTERVAL_SECS};
pub use registry::{Lifecycle, Registry};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};
pub use source::{from_fn, Sample, Source};
pub use store::{ConfigStore, MemoryStore};
