//! Synchronization Support
//!
//! Every [`FragmentCache`](crate::FragmentCache) guards its idle/active
//! bookkeeping with a [`CriticalSectionCell`], so caches can be fetched from
//! and returned to from interrupt handlers as well as ordinary code.
//!
//! The critical-section implementation is provided by the HAL crate on target
//! (e.g., esp-hal) or by the `std` feature of `critical-section` on host.
//!
//! # Example
//!
//! ```ignore
//! use dma_fragment::sync::CriticalSectionCell;
//!
//! static COUNTER: CriticalSectionCell<u32> = CriticalSectionCell::new(0);
//!
//! COUNTER.with(|n| *n += 1);
//! ```

mod primitives;

pub use primitives::CriticalSectionCell;
