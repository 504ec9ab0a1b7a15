//! Error types for DMA fragment pooling and composition
//!
//! Errors are organized by domain for better diagnostics:
//! - [`AllocError`]: Block pool and bookkeeping storage exhaustion
//! - [`CacheError`]: Fragment cache lifecycle and resize failures
//! - [`TransformError`]: Deferred transform failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most operations.

// =============================================================================
// Allocation Errors
// =============================================================================

/// Allocation failures
///
/// Both variants are the "out of memory" kind. In non-blocking
/// ([`AllocMode::Atomic`](crate::AllocMode::Atomic)) context they are terminal
/// for the current operation and are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocError {
    /// The DMA block pool could not supply a block
    BlockPool,
    /// Host memory for fragment bookkeeping could not be reserved
    Storage,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AllocError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AllocError::BlockPool => "DMA block pool exhausted",
            AllocError::Storage => "out of memory for fragment storage",
        }
    }
}

impl From<alloc::collections::TryReserveError> for AllocError {
    fn from(_: alloc::collections::TryReserveError) -> Self {
        AllocError::Storage
    }
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Fragment cache errors
///
/// These errors relate to the cache lifecycle and to resizing the idle pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CacheError {
    /// Cache is not in the ready state (not initialized, or released)
    NotReady,
    /// Cache was already initialized
    AlreadyInitialized,
    /// Idle pool ran out before a shrink request was satisfied
    Exhausted,
    /// Resize magnitude exceeds the configured safety bound
    ResizeOutOfBounds,
    /// Malformed tuning input
    InvalidInput,
}

impl core::fmt::Display for CacheError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CacheError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheError::NotReady => "cache not ready",
            CacheError::AlreadyInitialized => "cache already initialized",
            CacheError::Exhausted => "no idle fragments left to remove",
            CacheError::ResizeOutOfBounds => "resize exceeds safety bound",
            CacheError::InvalidInput => "invalid tuning input",
        }
    }
}

// =============================================================================
// Transform Errors
// =============================================================================

/// Deferred transform errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransformError {
    /// The transform's action reported failure
    Failed,
    /// A restore transform could not find the run it spliced in
    MissingRun,
}

impl core::fmt::Display for TransformError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransformError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransformError::Failed => "transform failed",
            TransformError::MissingRun => "spliced run missing from composite",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Alloc(_)) => { /* out of memory */ }
///     Err(Error::Cache(CacheError::Exhausted)) => { /* ... */ }
///     Err(Error::Transform(TransformError::Failed)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Allocation error
    Alloc(AllocError),
    /// Cache error
    Cache(CacheError),
    /// Transform error
    Transform(TransformError),
}

impl Error {
    /// True for either flavour of allocation failure
    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Error::Alloc(_))
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Alloc(e) => write!(f, "alloc: {}", e.as_str()),
            Error::Cache(e) => write!(f, "cache: {}", e.as_str()),
            Error::Transform(e) => write!(f, "transform: {}", e.as_str()),
        }
    }
}

impl core::error::Error for Error {}

// From impls for automatic conversion
impl From<AllocError> for Error {
    fn from(e: AllocError) -> Self {
        Error::Alloc(e)
    }
}

impl From<CacheError> for Error {
    fn from(e: CacheError) -> Self {
        Error::Cache(e)
    }
}

impl From<TransformError> for Error {
    fn from(e: TransformError) -> Self {
        Error::Transform(e)
    }
}

impl From<alloc::collections::TryReserveError> for Error {
    fn from(e: alloc::collections::TryReserveError) -> Self {
        Error::Alloc(e.into())
    }
}

/// Result type alias for fragment operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for allocation operations
pub type AllocResult<T> = core::result::Result<T, AllocError>;

/// Result type alias for cache operations
pub type CacheResult<T> = core::result::Result<T, CacheError>;

/// Result type alias for transform operations
pub type TransformResult<T> = core::result::Result<T, TransformError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    use super::*;

    #[test]
    fn alloc_error_as_str_non_empty() {
        for variant in [AllocError::BlockPool, AllocError::Storage] {
            assert!(!variant.as_str().is_empty(), "AllocError::{variant:?} has empty string");
        }
    }

    #[test]
    fn cache_error_as_str_non_empty() {
        let variants = [
            CacheError::NotReady,
            CacheError::AlreadyInitialized,
            CacheError::Exhausted,
            CacheError::ResizeOutOfBounds,
            CacheError::InvalidInput,
        ];

        for variant in variants {
            let s = variant.as_str();
            assert!(!s.is_empty(), "CacheError::{variant:?} has empty string");
        }
    }

    #[test]
    fn cache_error_display() {
        let display = format!("{}", CacheError::Exhausted);
        assert_eq!(display, "no idle fragments left to remove");
    }

    #[test]
    fn transform_error_display() {
        assert_eq!(format!("{}", TransformError::Failed), "transform failed");
    }

    // =========================================================================
    // Unified Error Tests
    // =========================================================================

    #[test]
    fn error_display_prefixes_domain() {
        assert_eq!(
            format!("{}", Error::Alloc(AllocError::BlockPool)),
            "alloc: DMA block pool exhausted"
        );
        assert_eq!(
            format!("{}", Error::Cache(CacheError::ResizeOutOfBounds)),
            "cache: resize exceeds safety bound"
        );
        assert_eq!(
            format!("{}", Error::Transform(TransformError::MissingRun)),
            "transform: spliced run missing from composite"
        );
    }

    #[test]
    fn error_from_domain_errors() {
        let e: Error = AllocError::Storage.into();
        assert_eq!(e, Error::Alloc(AllocError::Storage));
        assert!(e.is_out_of_memory());

        let e: Error = CacheError::NotReady.into();
        assert_eq!(e, Error::Cache(CacheError::NotReady));
        assert!(!e.is_out_of_memory());

        let e: Error = TransformError::Failed.into();
        assert_eq!(e, Error::Transform(TransformError::Failed));
    }

    #[test]
    fn try_reserve_error_maps_to_storage() {
        let mut v: std::vec::Vec<u8> = std::vec::Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert_eq!(Error::from(err), Error::Alloc(AllocError::Storage));
    }
}
