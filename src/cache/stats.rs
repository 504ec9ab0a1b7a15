//! Cache statistics.

/// Snapshot of a cache's counters.
///
/// `active` and `idle` are current populations; the rest are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CacheStats {
    /// Fragments currently checked out
    pub active: u32,
    /// Fragments parked in the idle pool
    pub idle: u32,
    /// Fragments produced by the factory
    pub allocated: u32,
    /// Of `allocated`, those produced in non-blocking context
    pub allocated_nonblocking: u32,
    /// Successful fetches
    pub fetched: u64,
    /// Fragments destroyed by shrink, discard, or release
    pub removed: u32,
}

impl CacheStats {
    /// Fragments alive right now
    #[must_use]
    pub const fn live(&self) -> u32 {
        self.active + self.idle
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) allocated: u32,
    pub(crate) allocated_nonblocking: u32,
    pub(crate) fetched: u64,
    pub(crate) removed: u32,
}

impl Counters {
    pub(crate) const fn new() -> Self {
        Self {
            allocated: 0,
            allocated_nonblocking: 0,
            fetched: 0,
            removed: 0,
        }
    }
}
