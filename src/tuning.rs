//! Runtime introspection and tuning adapter.
//!
//! Thin text glue over [`FragmentCache::stats`] and
//! [`FragmentCache::resize`], shaped like a device attribute file: reading
//! renders a statistics block, writing a signed decimal resizes the idle pool.

use core::fmt;

use crate::cache::{CacheStats, FragmentCache};
use crate::constants::{CACHE_NAME_PREFIX, STATS_HEADER};
use crate::error::{CacheError, Result};

/// Statistics block for one cache, rendered through [`fmt::Display`].
///
/// ```text
/// dma_fragment_cache_info - 0.1
/// name: dma_fragment_cache:spi0-xfer
/// count_active:	2
/// count_idle:	6
/// ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsReport<'a> {
    name: &'a str,
    stats: CacheStats,
}

impl<'a> StatsReport<'a> {
    /// Snapshot `cache`'s counters
    #[must_use]
    pub fn capture(cache: &'a FragmentCache) -> Self {
        Self {
            name: cache.name(),
            stats: cache.stats(),
        }
    }

    /// The captured counters
    #[must_use]
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl fmt::Display for StatsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "{STATS_HEADER}")?;
        writeln!(f, "name: {}", AttributeName(self.name))?;
        writeln!(f, "count_active:\t{}", s.active)?;
        writeln!(f, "count_idle:\t{}", s.idle)?;
        writeln!(f, "count_allocated:\t{}", s.allocated)?;
        writeln!(f, "count_allocated_nonblocking:\t{}", s.allocated_nonblocking)?;
        writeln!(f, "count_fetched:\t{}", s.fetched)?;
        writeln!(f, "count_removed:\t{}", s.removed)
    }
}

/// Attribute name of a cache: its name behind [`CACHE_NAME_PREFIX`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeName<'a>(pub &'a str);

impl fmt::Display for AttributeName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CACHE_NAME_PREFIX}{}", self.0)
    }
}

/// Parse a tuning write and resize the idle pool by it.
///
/// Accepts an optionally signed decimal with at most one trailing newline.
/// Returns the number of bytes consumed, which is all of `input`.
///
/// # Errors
///
/// - [`CacheError::InvalidInput`] if `input` is not a signed 32-bit decimal
/// - anything [`FragmentCache::resize`] reports
pub fn store_resize(cache: &FragmentCache, input: &str) -> Result<usize> {
    let digits = input.strip_suffix('\n').unwrap_or(input);
    let delta: i32 = digits.parse().map_err(|_| CacheError::InvalidInput)?;
    cache.resize(delta)?;
    Ok(input.len())
}

// =============================================================================
// Tests
// =============================================================================
