//! Error types for the pulsebar sampling engine.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring readers or fetching samples.
#[derive(Error, Debug)]
pub enum Error {
    /// Interval is zero, negative, or not a finite number of seconds.
    #[error("Invalid update interval: {0}s")]
    InvalidInterval(f64),

    /// Operation is not allowed once the reader has stopped.
    #[error("Reader {0} is stopped")]
    ReaderStopped(String),

    /// No module registered under this name.
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    /// No tokio runtime available to drive timers.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// I/O error while reading a data source.
    #[error("Source I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data source returned something that could not be parsed.
    #[error("Failed to parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    /// Data source does not exist on this machine.
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Shorthand for a parse failure.
    pub fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        Error::Parse {
            what,
            detail: detail.into(),
        }
    }
}
