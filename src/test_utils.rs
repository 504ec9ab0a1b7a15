//! Testing utilities and mock implementations
//!
//! This module provides a heap-backed block pool and cache helpers for
//! exercising fragments, caches and composites on the host.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::boxed::Box;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::vec;
use std::vec::Vec;

use crate::block::{AllocMode, BlockPool, DmaAddr, DmaBlock};
use crate::cache::{CacheConfig, FragmentCache};
use crate::error::Result;
use crate::fragment::{Fragment, Link, LinkChain};

/// First device address handed out by a mock pool
const MOCK_DMA_BASE: DmaAddr = 0x1000_0000;

// =============================================================================
// Mock Block Pool
// =============================================================================

#[derive(Debug, Default)]
struct PoolLedger {
    /// Live blocks: dma address -> backing allocation
    live: HashMap<DmaAddr, usize>,
    /// Device addresses in the order they were freed
    free_log: Vec<DmaAddr>,
    next_addr: DmaAddr,
}

/// Mock block pool backed by zeroed heap allocations
///
/// Device addresses strictly increase and are never reused, so tests can
/// identify links by address.
///
/// # Example
///
/// ```ignore
/// let mock = MockBlockPool::shared(32);
/// let pool: Arc<dyn BlockPool> = mock.clone();
/// let link = Link::create(&pool, AllocMode::Blocking)?;
/// assert_eq!(mock.outstanding(), 1);
/// ```
#[derive(Debug)]
pub struct MockBlockPool {
    block_size: usize,
    ledger: Mutex<PoolLedger>,
    /// Allocations left before the pool reports exhaustion
    budget: AtomicUsize,
    refuse_atomic: AtomicBool,
}

impl MockBlockPool {
    /// Create a pool handing out `block_size`-byte blocks
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            ledger: Mutex::new(PoolLedger {
                next_addr: MOCK_DMA_BASE,
                ..PoolLedger::default()
            }),
            budget: AtomicUsize::new(usize::MAX),
            refuse_atomic: AtomicBool::new(false),
        }
    }

    /// Create a pool behind an `Arc`, ready to coerce to `Arc<dyn BlockPool>`
    pub fn shared(block_size: usize) -> Arc<Self> {
        Arc::new(Self::new(block_size))
    }

    /// Allow `count` more allocations, then fail; `usize::MAX` is unlimited
    pub fn fail_after(&self, count: usize) {
        self.budget.store(count, Ordering::SeqCst);
    }

    /// Refuse every allocation made in atomic mode
    pub fn refuse_atomic(&self, refuse: bool) {
        self.refuse_atomic.store(refuse, Ordering::SeqCst);
    }

    /// Blocks handed out and not yet freed
    pub fn outstanding(&self) -> usize {
        self.lock().live.len()
    }

    /// Blocks freed so far
    pub fn freed(&self) -> usize {
        self.lock().free_log.len()
    }

    /// Device addresses in the order they were freed
    pub fn free_log(&self) -> Vec<DmaAddr> {
        self.lock().free_log.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolLedger> {
        self.ledger.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn take_budget(&self) -> bool {
        self.budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }
}

// SAFETY: Every block is a distinct leaked `Box<[u8]>` of `block_size` zeroed
// bytes, reclaimed only in `free_block`.
unsafe impl BlockPool for MockBlockPool {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn allocate_block(&self, mode: AllocMode) -> Option<DmaBlock> {
        if !mode.may_block() && self.refuse_atomic.load(Ordering::SeqCst) {
            return None;
        }
        if !self.take_budget() {
            return None;
        }

        let backing: Box<[u8]> = vec![0u8; self.block_size].into_boxed_slice();
        let cpu = NonNull::new(Box::into_raw(backing).cast::<u8>())?;

        let mut ledger = self.lock();
        let dma = ledger.next_addr;
        ledger.next_addr += self.block_size.max(1) as DmaAddr;
        ledger.live.insert(dma, cpu.as_ptr() as usize);
        Some(DmaBlock::new(cpu, dma, self.block_size))
    }

    fn free_block(&self, block: DmaBlock) {
        let mut ledger = self.lock();
        let Some(addr) = ledger.live.remove(&block.dma_addr()) else {
            panic!("free of unknown block {:#x}", block.dma_addr());
        };
        assert_eq!(addr, block.cpu_ptr().as_ptr() as usize, "cpu/dma pairing broken");
        ledger.free_log.push(block.dma_addr());
        drop(ledger);

        let slice = core::ptr::slice_from_raw_parts_mut(block.cpu_ptr().as_ptr(), block.len());
        // SAFETY: allocated in `allocate_block` by `Box::into_raw` with this length
        drop(unsafe { Box::from_raw(slice) });
    }
}

// =============================================================================
// Chain and Cache Helpers
// =============================================================================

/// Chain of `count` fresh links from `mock`
pub fn chain_of(mock: &Arc<MockBlockPool>, count: usize) -> LinkChain {
    let pool: Arc<dyn BlockPool> = mock.clone();
    let mut chain = LinkChain::new();
    for _ in 0..count {
        let link = Link::create(&pool, AllocMode::Blocking).unwrap();
        chain.push(link).unwrap();
    }
    chain
}

/// Factory building `links`-link fragments from `mock`
pub fn factory_for(
    mock: &Arc<MockBlockPool>,
    links: usize,
) -> impl Fn(AllocMode) -> Result<Fragment> + Send + Sync + 'static {
    let pool: Arc<dyn BlockPool> = mock.clone();
    move |mode: AllocMode| -> Result<Fragment> { Ok(Fragment::build(&pool, links, 0, mode)?) }
}

/// Like [`factory_for`], also counting factory invocations
pub fn counting_factory(
    mock: &Arc<MockBlockPool>,
    links: usize,
) -> (
    impl Fn(AllocMode) -> Result<Fragment> + Send + Sync + 'static,
    Arc<AtomicUsize>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let build = factory_for(mock, links);
    let factory = move |mode: AllocMode| {
        counter.fetch_add(1, Ordering::SeqCst);
        build(mode)
    };
    (factory, calls)
}

/// Uninitialized cache of `links`-link fragments
pub fn cache_of(mock: &Arc<MockBlockPool>, config: CacheConfig, links: usize) -> FragmentCache {
    FragmentCache::new(config, factory_for(mock, links))
}

/// Initialized, shareable cache pre-warmed with `idle` fragments
pub fn ready_cache(
    mock: &Arc<MockBlockPool>,
    name: &str,
    idle: u32,
    links: usize,
) -> Arc<FragmentCache> {
    let cache = cache_of(mock, CacheConfig::new(name).with_initial_idle(idle), links);
    cache.initialize().unwrap();
    Arc::new(cache)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_addresses_strictly_increase() {
        let mock = MockBlockPool::shared(16);
        let chain = chain_of(&mock, 4);
        let addrs: Vec<_> = chain.dma_addrs().collect();
        assert!(addrs.windows(2).all(|w| w[0] < w[1]));

        drop(chain);
        let next = chain_of(&mock, 1);
        assert!(next.dma_addrs().all(|a| a > addrs[3]));
    }

    #[test]
    fn mock_budget_counts_down() {
        let mock = MockBlockPool::shared(16);
        mock.fail_after(1);
        assert!(mock.allocate_block(AllocMode::Blocking).map(|b| mock.free_block(b)).is_some());
        assert!(mock.allocate_block(AllocMode::Blocking).is_none());
        assert_eq!(mock.outstanding(), 0);
    }
}
