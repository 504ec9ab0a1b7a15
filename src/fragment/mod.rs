//! Fragments: owned chains of DMA links.
//!
//! A [`Fragment`] is one composable transfer unit. It owns its [`Link`]s
//! through a [`LinkChain`]; dropping the fragment destroys every link in chain
//! order and returns the blocks to their pool.
//!
//! Pool-managed fragments carry a [`PoolTag`] naming the cache slot they were
//! produced for. Dropping such a fragment does **not** notify its cache; use
//! [`FragmentCache::discard`](crate::FragmentCache::discard) to destroy a
//! checked-out fragment and retire its slot in one step.

mod chain;
mod link;

use alloc::sync::Arc;

pub use chain::{ComposedChain, LinkChain, RunId, SpliceMark};
pub use link::Link;

use crate::block::{AllocMode, BlockPool};
use crate::cache::CacheId;
use crate::error::AllocResult;

/// Cache slot a fragment was produced for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolTag {
    pub(crate) cache: CacheId,
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl PoolTag {
    /// Cache that produced the fragment
    #[must_use]
    pub const fn cache(&self) -> CacheId {
        self.cache
    }
}

/// Pool state of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FragmentState {
    /// Parked in a cache's idle pool, or not pool-managed
    #[default]
    Idle,
    /// Checked out of its cache by exactly one holder
    Active,
}

/// Ordered chain of links representing one composable transfer unit.
#[derive(Debug, Default)]
pub struct Fragment {
    chain: LinkChain,
    size: usize,
    origin: Option<PoolTag>,
    state: FragmentState,
}

impl Fragment {
    /// Empty, non-pooled fragment describing a `size`-byte transfer unit
    #[must_use]
    pub const fn new(size: usize) -> Self {
        Self {
            chain: LinkChain::new(),
            size,
            origin: None,
            state: FragmentState::Idle,
        }
    }

    /// Build a fragment of `link_count` freshly allocated links.
    ///
    /// This is the usual body of a cache factory. On failure every link
    /// allocated so far is returned to `pool`.
    ///
    /// # Errors
    ///
    /// [`AllocError`](crate::AllocError) from the block pool or storage.
    pub fn build(
        pool: &Arc<dyn BlockPool>,
        link_count: usize,
        size: usize,
        mode: AllocMode,
    ) -> AllocResult<Self> {
        let mut fragment = Self {
            chain: LinkChain::with_capacity(link_count)?,
            ..Self::new(size)
        };
        for _ in 0..link_count {
            fragment.add_link(pool, mode)?;
        }
        Ok(fragment)
    }

    /// Allocate one link from `pool` and append it.
    ///
    /// # Errors
    ///
    /// [`AllocError`](crate::AllocError) from the block pool or storage.
    pub fn add_link(&mut self, pool: &Arc<dyn BlockPool>, mode: AllocMode) -> AllocResult<&mut Link> {
        let link = Link::create(pool, mode)?;
        self.chain.push(link)?;
        Ok(self.chain.last_mut().unwrap_or_else(|| unreachable!()))
    }

    /// Append an existing link.
    ///
    /// # Errors
    ///
    /// [`AllocError::Storage`](crate::AllocError::Storage).
    pub fn push_link(&mut self, link: Link) -> AllocResult<()> {
        self.chain.push(link)
    }

    /// The link chain
    #[inline]
    #[must_use]
    pub fn links(&self) -> &LinkChain {
        &self.chain
    }

    /// Mutable link chain
    #[inline]
    pub fn links_mut(&mut self) -> &mut LinkChain {
        &mut self.chain
    }

    /// Number of links currently in the chain
    #[inline]
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.chain.len()
    }

    /// Transfer size in bytes this fragment describes
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Update the transfer size
    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    /// Cache slot this fragment belongs to, `None` if not pool-managed
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> Option<PoolTag> {
        self.origin
    }

    /// True if produced by a cache
    #[inline]
    #[must_use]
    pub const fn is_pooled(&self) -> bool {
        self.origin.is_some()
    }

    /// Current pool state
    #[inline]
    #[must_use]
    pub const fn state(&self) -> FragmentState {
        self.state
    }

    /// Destroy the fragment and all its links.
    ///
    /// For pool-managed fragments prefer
    /// [`FragmentCache::discard`](crate::FragmentCache::discard); this does not
    /// tell the cache.
    #[inline]
    pub fn destroy(self) {
        drop(self);
    }

    pub(crate) fn set_origin(&mut self, tag: PoolTag) {
        self.origin = Some(tag);
    }

    pub(crate) fn set_state(&mut self, state: FragmentState) {
        self.state = state;
    }

    /// Put back links that were spliced away
    pub(crate) fn restore_chain(&mut self, chain: LinkChain) {
        debug_assert!(self.chain.is_empty());
        self.chain = chain;
    }
}
