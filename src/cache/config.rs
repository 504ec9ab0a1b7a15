//! Configuration types for fragment caches

use alloc::string::String;

use crate::constants::{DEFAULT_INITIAL_IDLE, DEFAULT_RESIZE_LIMIT};

/// Fragment cache configuration.
///
/// # Example
///
/// ```ignore
/// let config = CacheConfig::new("spi0-tx")
///     .with_initial_idle(8)
///     .with_resize_limit(256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cache name, shown on the tuning surface and in diagnostics
    pub name: String,
    /// Fragments pre-warmed into the idle pool by `initialize`
    pub initial_idle: u32,
    /// Largest magnitude accepted by a single `resize`
    pub resize_limit: u32,
}

impl CacheConfig {
    /// Configuration with default sizing
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_idle: DEFAULT_INITIAL_IDLE,
            resize_limit: DEFAULT_RESIZE_LIMIT,
        }
    }

    /// Set the number of fragments pre-warmed on `initialize`
    #[must_use]
    pub fn with_initial_idle(mut self, count: u32) -> Self {
        self.initial_idle = count;
        self
    }

    /// Set the resize safety bound
    #[must_use]
    pub fn with_resize_limit(mut self, limit: u32) -> Self {
        self.resize_limit = limit;
        self
    }
}

/// Cache lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CacheState {
    /// Created, idle pool not yet pre-warmed
    #[default]
    Uninitialized,
    /// Serving fetch/return/resize
    Ready,
    /// `release` is destroying the idle pool
    Draining,
    /// Released; returned fragments are destroyed
    Released,
}
