//! Bounded sample history.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of samples kept per reader.
pub const HISTORY_CAPACITY: usize = 300;

/// Fixed-capacity FIFO history of recent samples.
///
/// Pushing past capacity evicts the oldest sample. All access goes through a
/// single mutex, so `snapshot` never observes a half-applied `push`.
#[derive(Debug)]
pub struct SampleBuffer<T> {
    capacity: usize,
    samples: Mutex<VecDeque<T>>,
}

impl<T: Clone> SampleBuffer<T> {
    /// Creates an empty buffer holding [`HISTORY_CAPACITY`] samples.
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Creates an empty buffer with a custom capacity (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&self, value: T) {
        let mut samples = self.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    /// Returns the full history, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }

    /// Returns the most recent sample.
    pub fn latest(&self) -> Option<T> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Default for SampleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_and_snapshot_order() {
        let buffer = SampleBuffer::new();
        buffer.push(1);
        buffer.push(2);
        buffer.push(3);
        assert_eq!(buffer.snapshot(), vec![1, 2, 3]);
        assert_eq!(buffer.latest(), Some(3));
    }

    #[test]
    fn test_keeps_last_capacity_values() {
        let buffer = SampleBuffer::new();
        for i in 0..1000 {
            buffer.push(i);
            assert!(buffer.len() <= HISTORY_CAPACITY);
        }
        let expected: Vec<i32> = (700..1000).collect();
        assert_eq!(buffer.snapshot(), expected);
    }

    #[test]
    fn test_exactly_full_does_not_evict() {
        let buffer = SampleBuffer::with_capacity(3);
        buffer.push('a');
        buffer.push('b');
        buffer.push('c');
        assert_eq!(buffer.snapshot(), vec!['a', 'b', 'c']);
        buffer.push('d');
        assert_eq!(buffer.snapshot(), vec!['b', 'c', 'd']);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = SampleBuffer::with_capacity(0);
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.snapshot(), vec![2]);
    }

    #[test]
    fn test_concurrent_push_and_snapshot() {
        let buffer = Arc::new(SampleBuffer::new());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        buffer.push(w * 1000 + i);
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            assert!(buffer.snapshot().len() <= HISTORY_CAPACITY);
        }
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(buffer.len(), HISTORY_CAPACITY);
    }
}
