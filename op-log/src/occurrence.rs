//! Process-wide occurrence ids

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OCCURRENCE: AtomicU64 = AtomicU64::new(1);

/// Identifier attached to one logged failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OccurrenceId(u64);

impl OccurrenceId {
    /// Draw the next id. Concurrent callers never share a value.
    pub fn next() -> Self {
        Self(NEXT_OCCURRENCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
