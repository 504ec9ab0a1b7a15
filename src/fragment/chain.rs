//! Ordered link chains and O(1) splicing.
//!
//! A [`LinkChain`] is the owned, ordered chain of one fragment. A
//! [`ComposedChain`] is the chain of a composite: a sequence of *runs*, each
//! run being a whole component chain moved in by [`ComposedChain::splice_tail`].
//! Moving a chain moves its backing storage, never the links one by one, and
//! every run carries a stable [`RunId`] so it can be cut back out later
//! regardless of what was spliced around it.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::link::Link;
use crate::block::DmaAddr;
use crate::error::AllocResult;

// =============================================================================
// Plain chain
// =============================================================================

/// Owned, ordered chain of links.
///
/// Dropping the chain destroys its links in chain order.
#[derive(Debug, Default)]
pub struct LinkChain {
    links: Vec<Link>,
}

impl LinkChain {
    /// Empty chain
    #[must_use]
    pub const fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Empty chain with room for `capacity` links.
    ///
    /// # Errors
    ///
    /// [`AllocError::Storage`](crate::AllocError::Storage) if the storage
    /// cannot be reserved.
    pub fn with_capacity(capacity: usize) -> AllocResult<Self> {
        let mut links = Vec::new();
        links.try_reserve_exact(capacity)?;
        Ok(Self { links })
    }

    /// Append a link at the tail.
    ///
    /// # Errors
    ///
    /// [`AllocError::Storage`](crate::AllocError::Storage); the link is
    /// dropped (its block returned) in that case.
    pub fn push(&mut self, link: Link) -> AllocResult<()> {
        self.links.try_reserve(1)?;
        self.links.push(link);
        Ok(())
    }

    /// Number of links
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True if the chain has no links
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// First link
    #[must_use]
    pub fn first(&self) -> Option<&Link> {
        self.links.first()
    }

    /// Last link
    #[must_use]
    pub fn last(&self) -> Option<&Link> {
        self.links.last()
    }

    /// Mutable last link
    pub fn last_mut(&mut self) -> Option<&mut Link> {
        self.links.last_mut()
    }

    /// Link at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    /// Mutable link at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Link> {
        self.links.get_mut(index)
    }

    /// Iterate in chain order
    pub fn iter(&self) -> core::slice::Iter<'_, Link> {
        self.links.iter()
    }

    /// Iterate mutably in chain order
    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, Link> {
        self.links.iter_mut()
    }

    /// Device addresses in chain order
    pub fn dma_addrs(&self) -> impl Iterator<Item = DmaAddr> + '_ {
        self.links.iter().map(Link::dma_addr)
    }

    /// Move the whole chain out, leaving this one empty. O(1).
    #[must_use]
    pub fn take(&mut self) -> LinkChain {
        core::mem::take(self)
    }

    /// Destroy every link, in chain order
    pub fn clear(&mut self) {
        // Vec::clear drops front to back
        self.links.clear();
    }

    fn boundaries(&self) -> (Option<DmaAddr>, Option<DmaAddr>) {
        (
            self.links.first().map(Link::dma_addr),
            self.links.last().map(Link::dma_addr),
        )
    }
}

impl<'a> IntoIterator for &'a LinkChain {
    type Item = &'a Link;
    type IntoIter = core::slice::Iter<'a, Link>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.iter()
    }
}

// =============================================================================
// Composite chain
// =============================================================================

/// Stable identifier of one spliced run within a [`ComposedChain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunId(u32);

/// Everything needed to reverse one splice.
///
/// Records which run was created and the boundary links it held when it went
/// in, so the reversal can check it cuts out exactly the range it inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpliceMark {
    run: RunId,
    first: Option<DmaAddr>,
    last: Option<DmaAddr>,
    len: usize,
}

impl SpliceMark {
    /// Run created by the splice
    #[must_use]
    pub const fn run(&self) -> RunId {
        self.run
    }

    /// Device address of the first spliced link
    #[must_use]
    pub const fn first(&self) -> Option<DmaAddr> {
        self.first
    }

    /// Device address of the last spliced link
    #[must_use]
    pub const fn last(&self) -> Option<DmaAddr> {
        self.last
    }

    /// Number of links spliced
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when an empty chain was spliced
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug)]
struct Run {
    id: RunId,
    links: LinkChain,
}

/// Chain of a composite: spliced-in component chains in merge order.
#[derive(Debug, Default)]
pub struct ComposedChain {
    runs: VecDeque<Run>,
    next_run: u32,
    len: usize,
}

impl ComposedChain {
    /// Empty composite chain
    #[must_use]
    pub const fn new() -> Self {
        Self {
            runs: VecDeque::new(),
            next_run: 0,
            len: 0,
        }
    }

    /// Total number of links across all runs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no links are spliced in
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of spliced runs (including empty ones)
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Move all of `chain` onto the tail of this chain. O(1).
    ///
    /// `chain` is left empty; the returned mark reverses the splice.
    ///
    /// # Errors
    ///
    /// [`AllocError::Storage`](crate::AllocError::Storage) if the run table
    /// cannot grow; `chain` is untouched in that case.
    pub fn splice_tail(&mut self, chain: &mut LinkChain) -> AllocResult<SpliceMark> {
        self.runs.try_reserve(1)?;

        let (first, last) = chain.boundaries();
        let links = chain.take();
        let mark = SpliceMark {
            run: RunId(self.next_run),
            first,
            last,
            len: links.len(),
        };
        self.next_run = self.next_run.wrapping_add(1);
        self.len += mark.len;
        self.runs.push_back(Run {
            id: mark.run,
            links,
        });
        Ok(mark)
    }

    /// Cut the run described by `mark` back out and return its links.
    ///
    /// O(1) when the run is at the head (the usual completion order),
    /// otherwise linear in the number of runs. Returns `None` if the run is
    /// not present or its boundaries no longer match the mark.
    pub fn unsplice(&mut self, mark: &SpliceMark) -> Option<LinkChain> {
        let position = match self.runs.front() {
            Some(run) if run.id == mark.run => 0,
            _ => self.runs.iter().position(|run| run.id == mark.run)?,
        };

        if self.runs[position].links.boundaries() != (mark.first, mark.last)
            || self.runs[position].links.len() != mark.len
        {
            return None;
        }

        let run = self.runs.remove(position)?;
        self.len -= run.links.len();
        Some(run.links)
    }

    /// Iterate over every link in composite order
    pub fn iter(&self) -> impl Iterator<Item = &Link> + '_ {
        self.runs.iter().flat_map(|run| run.links.iter())
    }

    /// Device addresses in composite order, as handed to the DMA engine
    pub fn dma_addrs(&self) -> impl Iterator<Item = DmaAddr> + '_ {
        self.iter().map(Link::dma_addr)
    }

    /// Mutable access to every link in composite order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Link> + '_ {
        self.runs.iter_mut().flat_map(|run| run.links.iter_mut())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;
    use crate::test_utils::{MockBlockPool, chain_of};

    // =========================================================================
    // LinkChain Tests
    // =========================================================================

    #[test]
    fn chain_push_preserves_order() {
        let mock = MockBlockPool::shared(16);
        let chain = chain_of(&mock, 3);

        assert_eq!(chain.len(), 3);
        let addrs: Vec<_> = chain.dma_addrs().collect();
        assert!(addrs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(chain.first().map(Link::dma_addr), Some(addrs[0]));
        assert_eq!(chain.last().map(Link::dma_addr), Some(addrs[2]));
    }

    #[test]
    fn chain_drop_returns_all_blocks() {
        let mock = MockBlockPool::shared(16);
        let chain = chain_of(&mock, 4);
        assert_eq!(mock.outstanding(), 4);

        drop(chain);
        assert_eq!(mock.outstanding(), 0);
    }

    #[test]
    fn chain_clear_frees_in_chain_order() {
        let mock = MockBlockPool::shared(16);
        let mut chain = chain_of(&mock, 3);
        let expected: Vec<_> = chain.dma_addrs().collect();

        chain.clear();
        assert!(chain.is_empty());
        assert_eq!(mock.free_log(), expected);
    }

    #[test]
    fn chain_take_leaves_empty() {
        let mock = MockBlockPool::shared(16);
        let mut chain = chain_of(&mock, 2);

        let moved = chain.take();
        assert!(chain.is_empty());
        assert_eq!(moved.len(), 2);
        assert_eq!(mock.outstanding(), 2);
    }

    // =========================================================================
    // ComposedChain Tests
    // =========================================================================

    #[test]
    fn splice_concatenates_in_merge_order() {
        let mock = MockBlockPool::shared(16);
        let mut a = chain_of(&mock, 2);
        let mut b = chain_of(&mock, 3);
        let mut expected: Vec<_> = a.dma_addrs().collect();
        expected.extend(b.dma_addrs());

        let mut composed = ComposedChain::new();
        let mark_a = composed.splice_tail(&mut a).unwrap();
        let mark_b = composed.splice_tail(&mut b).unwrap();

        assert!(a.is_empty());
        assert!(b.is_empty());
        assert_eq!(composed.len(), 5);
        assert_eq!(composed.run_count(), 2);
        assert_eq!(composed.dma_addrs().collect::<Vec<_>>(), expected);
        assert_eq!(mark_a.len(), 2);
        assert_eq!(mark_b.len(), 3);
        assert_ne!(mark_a.run(), mark_b.run());
    }

    #[test]
    fn unsplice_restores_exact_range() {
        let mock = MockBlockPool::shared(16);
        let mut a = chain_of(&mock, 2);
        let mut b = chain_of(&mock, 3);
        let a_addrs: Vec<_> = a.dma_addrs().collect();
        let b_addrs: Vec<_> = b.dma_addrs().collect();

        let mut composed = ComposedChain::new();
        let mark_a = composed.splice_tail(&mut a).unwrap();
        let mark_b = composed.splice_tail(&mut b).unwrap();

        // Out of order on purpose: cut B first
        let back_b = composed.unsplice(&mark_b).unwrap();
        assert_eq!(back_b.dma_addrs().collect::<Vec<_>>(), b_addrs);
        assert_eq!(composed.len(), 2);

        let back_a = composed.unsplice(&mark_a).unwrap();
        assert_eq!(back_a.dma_addrs().collect::<Vec<_>>(), a_addrs);
        assert!(composed.is_empty());
        assert_eq!(composed.run_count(), 0);
    }

    #[test]
    fn unsplice_twice_returns_none() {
        let mock = MockBlockPool::shared(16);
        let mut a = chain_of(&mock, 1);
        let mut composed = ComposedChain::new();
        let mark = composed.splice_tail(&mut a).unwrap();

        assert!(composed.unsplice(&mark).is_some());
        assert!(composed.unsplice(&mark).is_none());
    }

    #[test]
    fn empty_chain_splices_as_empty_run() {
        let mut empty = LinkChain::new();
        let mut composed = ComposedChain::new();
        let mark = composed.splice_tail(&mut empty).unwrap();

        assert!(mark.is_empty());
        assert_eq!(mark.first(), None);
        assert_eq!(composed.run_count(), 1);
        assert!(composed.is_empty());

        let back = composed.unsplice(&mark).unwrap();
        assert!(back.is_empty());
        assert_eq!(composed.run_count(), 0);
    }
}
