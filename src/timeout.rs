//! Monotonic deadline helper for busy-wait loops

use std::time::{Duration, Instant};

/// A fixed point in monotonic time after which a wait has failed.
///
/// Waits nest (a poll loop issues serial reads which block on their own
/// timeout), so the budget is anchored once at construction rather than
/// re-measured per iteration.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deadline {
    end: Instant,
}

impl Deadline {
    /// Start a deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Deadline {
            end: Instant::now() + budget,
        }
    }

    /// True once the budget is exhausted.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.end
    }
}
