//! Readiness tracking for required readers.
//!
//! Hardware sources often return nothing for a moment after wake or during
//! device enumeration. A required reader retries immediately on an empty
//! sample until it sees real data, and gives up after too many empty
//! samples in a row.

/// Consecutive empty samples tolerated before a required reader gives up.
pub const NIL_THRESHOLD: u32 = 5;

/// What the owning reader should do after a sample was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessAction {
    /// Nothing to do.
    Continue,
    /// First real value seen; notify observers once.
    BecameReady,
    /// Sample again right away instead of waiting for the next tick.
    Retry,
    /// Source is persistently failing; stop the reader.
    GiveUp,
}

/// Per-reader readiness state.
#[derive(Debug, Clone)]
pub struct ReadinessTracker {
    optional: bool,
    ready: bool,
    consecutive_nils: u32,
}

impl ReadinessTracker {
    /// Creates a tracker. Optional readers never become ready, retry or give up.
    pub fn new(optional: bool) -> Self {
        Self {
            optional,
            ready: false,
            consecutive_nils: 0,
        }
    }

    /// Feeds one sample outcome and returns the action the reader must take.
    pub fn observe(&mut self, present: bool) -> ReadinessAction {
        if self.optional {
            return ReadinessAction::Continue;
        }
        match (self.ready, present) {
            (true, true) => {
                self.consecutive_nils = 0;
                ReadinessAction::Continue
            }
            (true, false) => {
                self.consecutive_nils = self.consecutive_nils.saturating_add(1);
                ReadinessAction::Continue
            }
            (false, true) => {
                self.ready = true;
                self.consecutive_nils = 0;
                ReadinessAction::BecameReady
            }
            (false, false) => {
                self.consecutive_nils = self.consecutive_nils.saturating_add(1);
                if self.consecutive_nils > NIL_THRESHOLD {
                    ReadinessAction::GiveUp
                } else {
                    ReadinessAction::Retry
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Empty samples seen since the last real value.
    pub fn consecutive_nils(&self) -> u32 {
        self.consecutive_nils
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_after_two_nils() {
        let mut tracker = ReadinessTracker::new(false);
        assert_eq!(tracker.observe(false), ReadinessAction::Retry);
        assert_eq!(tracker.observe(false), ReadinessAction::Retry);
        assert_eq!(tracker.observe(true), ReadinessAction::BecameReady);
        assert!(tracker.is_ready());
        assert_eq!(tracker.observe(true), ReadinessAction::Continue);
    }

    #[test]
    fn test_gives_up_on_sixth_nil() {
        let mut tracker = ReadinessTracker::new(false);
        for _ in 0..NIL_THRESHOLD {
            assert_eq!(tracker.observe(false), ReadinessAction::Retry);
        }
        assert_eq!(tracker.observe(false), ReadinessAction::GiveUp);
        assert!(!tracker.is_ready());
    }

    #[test]
    fn test_optional_ignores_readiness() {
        let mut tracker = ReadinessTracker::new(true);
        for _ in 0..100 {
            assert_eq!(tracker.observe(false), ReadinessAction::Continue);
        }
        assert_eq!(tracker.consecutive_nils(), 0);
        assert_eq!(tracker.observe(true), ReadinessAction::Continue);
        assert!(!tracker.is_ready());
        assert_eq!(tracker.observe(false), ReadinessAction::Continue);
    }

    #[test]
    fn test_nils_after_ready_are_counted_not_escalated() {
        let mut tracker = ReadinessTracker::new(false);
        tracker.observe(true);
        for _ in 0..10 {
            assert_eq!(tracker.observe(false), ReadinessAction::Continue);
        }
        assert_eq!(tracker.consecutive_nils(), 10);
        assert_eq!(tracker.observe(true), ReadinessAction::Continue);
        assert_eq!(tracker.consecutive_nils(), 0);
    }

    #[test]
    fn test_ready_fires_once() {
        let mut tracker = ReadinessTracker::new(false);
        let ready_count = [true, false, true, true]
            .into_iter()
            .map(|present| tracker.observe(present))
            .filter(|action| *action == ReadinessAction::BecameReady)
            .count();
        assert_eq!(ready_count, 1);
    }
}
