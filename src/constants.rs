//! Centralized Constants
//!
//! This module provides a single source of truth for the magic numbers used
//! throughout the fragment cache and composition pipeline.
//!
//! # Organization
//!
//! Constants are grouped by category:
//! - **Cache sizing**: Resize safety bound and pre-warm defaults
//! - **Tuning surface**: Names and headers of the textual statistics block
//! - **Diagnostics**: Dump formatting limits

// =============================================================================
// Cache Sizing
// =============================================================================

/// Largest magnitude a single resize request may have.
///
/// Bounds one misconfigured request so it cannot starve the block pool.
pub const DEFAULT_RESIZE_LIMIT: u32 = 1024;

/// Default number of fragments pre-warmed into the idle pool
pub const DEFAULT_INITIAL_IDLE: u32 = 0;

// =============================================================================
// Tuning Surface
// =============================================================================

/// Prefix applied to every cache name on the tuning surface
pub const CACHE_NAME_PREFIX: &str = "dma_fragment_cache:";

/// First line of the textual statistics block (format identifier and version)
pub const STATS_HEADER: &str = "dma_fragment_cache_info - 0.1";

// =============================================================================
// Diagnostics
// =============================================================================

/// Deepest tab indentation emitted by the dump formatter
pub const DUMP_MAX_INDENT: usize = 16;

/// Bytes shown per hex row when dumping a link's block
pub const DUMP_BYTES_PER_LINE: usize = 16;
