//! Monotonic request generations.
//!
//! Overlapping requests of the same kind may complete out of order. Each
//! request takes a ticket when issued; on completion only the holder of the
//! latest ticket may apply its result.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter handing out increasing request tickets, starting at 1.
#[derive(Debug, Default)]
pub struct Generations {
    latest: AtomicU64,
}

impl Generations {
    /// Fresh counter; no ticket issued yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket.
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `ticket` is still the most recently issued one.
    #[must_use]
    pub fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    /// Most recently issued ticket (0 before the first).
    #[must_use]
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}
