//! Data source contract.

use crate::Result;
use std::marker::PhantomData;

/// Values a reader can sample: cloneable and shareable across threads.
pub trait Sample: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Sample for T {}

/// A module-specific sampling hook.
///
/// `fetch` may block on slow OS calls. `Ok(None)` and `Err(_)` are both
/// treated as "no value this time".
pub trait Source: Send + 'static {
    /// Type produced by each sample.
    type Output: Sample;

    /// Returns the source name, used as the reader name.
    fn name(&self) -> &str;

    /// Samples the current value.
    fn fetch(&mut self) -> Result<Option<Self::Output>>;

    /// Releases OS resources when the owning module terminates.
    fn teardown(&mut self) {}
}

/// Source backed by a closure.
pub struct FnSource<F, T> {
    name: String,
    fetch: F,
    _output: PhantomData<fn() -> T>,
}

/// Wraps a closure as a [`Source`].
pub fn from_fn<F, T>(name: impl Into<String>, fetch: F) -> FnSource<F, T>
where
    F: FnMut() -> Result<Option<T>> + Send + 'static,
    T: Sample,
{
    FnSource {
        name: name.into(),
        fetch,
        _output: PhantomData,
    }
}

impl<F, T> Source for FnSource<F, T>
where
    F: FnMut() -> Result<Option<T>> + Send + 'static,
    T: Sample,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Option<T>> {
        (self.fetch)()
    }
}
