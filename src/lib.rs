//! DMA Fragment Pool
//!
//! A `no_std` object pool and composition pipeline for pre-built chains of DMA
//! descriptor blocks ("fragments"), so that drivers issuing repeated transfers
//! never build descriptor chains on a hot path, including from interrupt
//! context.
//!
//! # Architecture
//!
//! The crate is organized in layers, leaves first:
//!
//! 1. **Blocks** ([`block`]): the external [`BlockPool`] seam handing out
//!    fixed-size, hardware-addressable blocks
//! 2. **Fragments** ([`fragment`]): [`Link`]s (one block each) owned in order by
//!    a [`Fragment`]
//! 3. **Caches** ([`cache`]): [`FragmentCache`], an object pool of same-shaped
//!    fragments with idle/active tracking and bounded resize
//! 4. **Composition** ([`compose`], [`transform`]): [`MergedFragment`]
//!    composites assembled by splicing pooled fragments together, with ordered
//!    pre/post [`Transform`]s that run around the hardware operation
//!
//! [`tuning`] and [`dump`] are thin text adapters for statistics, runtime
//! resize, and diagnostic dumps.
//!
//! # Features
//!
//! - `log`: Emit diagnostics through the `log` facade
//! - `defmt`: Enable defmt formatting for public types and emit diagnostics
//!   through defmt
//!
//! # Example
//!
//! ```ignore
//! use dma_fragment::{AllocMode, BlockPool, CacheConfig, Fragment, FragmentCache, MergedFragment};
//! use dma_fragment::compose::merge_from_cache;
//!
//! let pool: Arc<dyn BlockPool> = /* device block pool */;
//!
//! // One cache per transfer shape
//! let factory_pool = pool.clone();
//! let xfer = Arc::new(FragmentCache::new(
//!     CacheConfig::new("spi0-xfer").with_initial_idle(8),
//!     move |mode: AllocMode| -> dma_fragment::Result<Fragment> {
//!         Ok(Fragment::build(&factory_pool, 3, 0, mode)?)
//!     },
//! ));
//! xfer.initialize()?;
//!
//! // Per request, possibly from an interrupt handler
//! let mut composite = MergedFragment::new(request);
//! merge_from_cache(&xfer, &mut composite, AllocMode::Atomic)?;
//! merge_from_cache(&xfer, &mut composite, AllocMode::Atomic)?;
//! composite.run_pre(AllocMode::Atomic)?;
//! dma.submit(composite.dma_addrs());
//!
//! // On completion
//! composite.run_post(AllocMode::Atomic)?;
//! ```
//!
//! # Concurrency
//!
//! Each cache guards its bookkeeping with a critical section
//! ([`sync::CriticalSectionCell`]); factory calls and fragment destruction run
//! outside it. A fetched fragment or a composite is exclusively owned by its
//! holder and needs no locking.

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in Cargo.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

extern crate alloc;

// =============================================================================
// Modules
// =============================================================================

pub mod block;
pub mod cache;
pub mod compose;
pub mod constants;
pub mod dump;
pub mod error;
pub mod fragment;
pub mod sync;
pub mod transform;
pub mod tuning;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod test_utils;

// =============================================================================
// Re-exports
// =============================================================================

pub use block::{AllocMode, BlockPool, DmaAddr, DmaBlock};
pub use cache::{
    CacheConfig, CacheId, CacheState, CacheStats, FragmentCache, FragmentFactory, ReleaseReport,
};
pub use compose::{MergedFragment, merge_all, merge_from_cache, merge_from_cache_with};
pub use error::{
    AllocError, AllocResult, CacheError, CacheResult, Error, Result, TransformError,
    TransformResult,
};
pub use fragment::{ComposedChain, Fragment, FragmentState, Link, LinkChain, PoolTag, SpliceMark};
pub use transform::{Phase, Transform, TransformList};
pub use tuning::{StatsReport, store_resize};
