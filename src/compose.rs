//! Composition engine: build a composite transfer from pooled fragments.
//!
//! A [`MergedFragment`] owns a [`ComposedChain`] plus two ordered
//! [`TransformList`]s and caller context. Merging fetches a fragment from a
//! cache, optionally specializes it against the composite, splices its links
//! onto the composite's tail in O(1), and registers a post-phase restore
//! transform that later unsplices exactly those links and returns the
//! fragment to its cache.
//!
//! # Transfer flow
//!
//! ```text
//! merge_from_cache(A) ─┐
//! merge_from_cache(B) ─┼─► composite: [A0 A1 B0 B1 B2]
//!                      │
//! run_pre()            │   pre transforms, registration order
//! submit dma_addrs()   │   hardware operation (external)
//! run_post()           └─► A and B unspliced, back in their idle pools
//! ```
//!
//! Any merge failure rolls the composite back: every post transform fires at
//! once, so no fragment stays checked out.

use alloc::sync::Arc;

use crate::block::{AllocMode, DmaAddr};
use crate::cache::FragmentCache;
use crate::error::{AllocError, AllocResult, Result};
use crate::fragment::{ComposedChain, Fragment, Link};
use crate::transform::{Phase, Transform, TransformList};

/// Composite fragment assembled from spliced-in pooled fragments.
///
/// `C` is caller context, for example the request to complete once the
/// post phase has run.
pub struct MergedFragment<C = ()> {
    chain: ComposedChain,
    size: usize,
    pre: TransformList<C>,
    post: TransformList<C>,
    context: C,
}

impl<C> MergedFragment<C> {
    /// Empty composite carrying `context`
    pub const fn new(context: C) -> Self {
        Self {
            chain: ComposedChain::new(),
            size: 0,
            pre: TransformList::new(),
            post: TransformList::new(),
            context,
        }
    }

    /// Caller context
    #[inline]
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Mutable caller context
    #[inline]
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// The composite chain
    #[inline]
    pub fn chain(&self) -> &ComposedChain {
        &self.chain
    }

    /// Links in hardware order
    pub fn links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.chain.iter()
    }

    /// Mutable links in hardware order, for patching descriptors in place
    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut Link> + '_ {
        self.chain.iter_mut()
    }

    /// Device addresses in hardware order
    pub fn dma_addrs(&self) -> impl Iterator<Item = DmaAddr> + '_ {
        self.chain.dma_addrs()
    }

    /// Total links spliced in
    #[inline]
    pub fn link_count(&self) -> usize {
        self.chain.len()
    }

    /// True if no links are spliced in
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Sum of the transfer sizes of the merged fragments
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Transforms registered for `phase`, in firing order
    pub fn transforms(&self, phase: Phase) -> &TransformList<C> {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        }
    }

    /// Number of un-fired transforms in `phase`
    pub fn pending(&self, phase: Phase) -> usize {
        self.transforms(phase).len()
    }

    /// Register a transform at the end of `phase`.
    ///
    /// # Errors
    ///
    /// [`AllocError::Storage`] if the list cannot grow; the transform is
    /// destroyed without firing.
    pub fn add_transform(&mut self, phase: Phase, transform: Transform<C>) -> AllocResult<()> {
        self.list_mut(phase).push(transform).map_err(|rejected| {
            rejected.destroy();
            AllocError::Storage
        })
    }

    /// Build and register a custom transform in one step.
    ///
    /// # Errors
    ///
    /// [`AllocError::Storage`] if the list cannot grow.
    pub fn add_new_transform<F>(&mut self, phase: Phase, label: &'static str, action: F) -> AllocResult<()>
    where
        F: FnOnce(&mut [u8], &mut MergedFragment<C>, AllocMode) -> Result<()> + Send + 'static,
    {
        self.add_transform(phase, Transform::new(label, action))
    }

    /// Fire every transform of `phase` in registration order.
    ///
    /// Each transform is consumed as it fires. Stops at the first failure and
    /// returns it; later transforms stay registered.
    ///
    /// # Errors
    ///
    /// The first failing transform's error.
    pub fn execute_phase(&mut self, phase: Phase, mode: AllocMode) -> Result<()> {
        while let Some(transform) = self.list_mut(phase).pop_front() {
            transform.fire(self, mode)?;
        }
        Ok(())
    }

    /// Fire the pre-phase transforms; call before submitting to hardware.
    ///
    /// # Errors
    ///
    /// See [`execute_phase`](Self::execute_phase).
    #[inline]
    pub fn run_pre(&mut self, mode: AllocMode) -> Result<()> {
        self.execute_phase(Phase::Pre, mode)
    }

    /// Fire the post-phase transforms; call after hardware completion.
    ///
    /// # Errors
    ///
    /// See [`execute_phase`](Self::execute_phase).
    #[inline]
    pub fn run_post(&mut self, mode: AllocMode) -> Result<()> {
        self.execute_phase(Phase::Post, mode)
    }

    /// Tear the composite down without a hardware operation.
    ///
    /// Destroys un-fired pre transforms, then fires every post transform,
    /// continuing past failures so each merged fragment is returned.
    ///
    /// # Errors
    ///
    /// The first post transform failure, after all have run.
    pub fn rollback(&mut self, mode: AllocMode) -> Result<()> {
        self.pre.clear();

        let mut first_error = None;
        while let Some(transform) = self.post.pop_front() {
            if let Err(err) = transform.fire(self, mode) {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub(crate) fn chain_mut(&mut self) -> &mut ComposedChain {
        &mut self.chain
    }

    pub(crate) fn shrink_size(&mut self, by: usize) {
        self.size = self.size.saturating_sub(by);
    }

    fn list_mut(&mut self, phase: Phase) -> &mut TransformList<C> {
        match phase {
            Phase::Pre => &mut self.pre,
            Phase::Post => &mut self.post,
        }
    }
}

impl<C: Default> Default for MergedFragment<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C> Drop for MergedFragment<C> {
    fn drop(&mut self) {
        if !self.post.is_empty() {
            #[cfg(feature = "log")]
            log::warn!(
                "composite dropped with {} un-fired post transforms; merged fragments discarded",
                self.post.len()
            );
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "composite dropped with {} un-fired post transforms; merged fragments discarded",
                self.post.len()
            );
        }
    }
}

impl<C: core::fmt::Debug> core::fmt::Debug for MergedFragment<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MergedFragment")
            .field("links", &self.chain.len())
            .field("size", &self.size)
            .field("pre", &self.pre.len())
            .field("post", &self.post.len())
            .field("context", &self.context)
            .finish()
    }
}

/// Merge one fragment from `cache` onto the tail of `composite`.
///
/// # Errors
///
/// See [`merge_from_cache_with`].
pub fn merge_from_cache<C>(
    cache: &Arc<FragmentCache>,
    composite: &mut MergedFragment<C>,
    mode: AllocMode,
) -> Result<()> {
    merge_from_cache_with(cache, composite, mode, |_, _| Ok(()))
}

/// Merge one fragment from `cache` onto the tail of `composite`, running
/// `specialize` on it first.
///
/// `specialize` sees the fetched fragment before its links join the
/// composite, e.g. to patch buffer addresses into its descriptors. It may
/// also register transforms on the composite.
///
/// # Errors
///
/// Fetch, specialization, or storage failures. On any failure the fetched
/// fragment (if any) goes back to `cache` and the composite is rolled back,
/// returning every fragment merged earlier; the original error is reported.
pub fn merge_from_cache_with<C, S>(
    cache: &Arc<FragmentCache>,
    composite: &mut MergedFragment<C>,
    mode: AllocMode,
    specialize: S,
) -> Result<()>
where
    S: FnOnce(&mut Fragment, &mut MergedFragment<C>) -> Result<()>,
{
    let Err(err) = splice_from_cache(cache, composite, mode, specialize) else {
        return Ok(());
    };

    #[cfg(feature = "log")]
    log::error!("merge from cache {} failed: {}", cache.name(), err);
    #[cfg(feature = "defmt")]
    defmt::error!("merge from cache {} failed: {}", cache.name(), err);

    if let Err(_incomplete) = composite.rollback(mode) {
        #[cfg(feature = "log")]
        log::error!("composite rollback incomplete: {}", _incomplete);
        #[cfg(feature = "defmt")]
        defmt::error!("composite rollback incomplete: {}", _incomplete);
    }
    Err(err)
}

/// Merge one fragment from each cache, in order.
///
/// # Errors
///
/// The first merge failure; the composite is rolled back by then.
pub fn merge_all<'a, C, I>(caches: I, composite: &mut MergedFragment<C>, mode: AllocMode) -> Result<()>
where
    I: IntoIterator<Item = &'a Arc<FragmentCache>>,
{
    for cache in caches {
        merge_from_cache(cache, composite, mode)?;
    }
    Ok(())
}

fn splice_from_cache<C, S>(
    cache: &Arc<FragmentCache>,
    composite: &mut MergedFragment<C>,
    mode: AllocMode,
    specialize: S,
) -> Result<()>
where
    S: FnOnce(&mut Fragment, &mut MergedFragment<C>) -> Result<()>,
{
    let mut fragment = cache.fetch(mode)?;

    if let Err(err) = specialize(&mut fragment, composite) {
        give_back(cache, fragment);
        return Err(err);
    }

    // Room for the restore transform first: once spliced, the links must not
    // be left without one.
    if let Err(err) = composite.post.reserve(1) {
        give_back(cache, fragment);
        return Err(err.into());
    }
    let mark = match composite.chain.splice_tail(fragment.links_mut()) {
        Ok(mark) => mark,
        Err(err) => {
            give_back(cache, fragment);
            return Err(err.into());
        }
    };
    composite.size += fragment.size();

    let restore = Transform::restore(Arc::clone(cache), fragment, mark);
    if let Err(restore) = composite.post.push(restore) {
        restore.fire(composite, mode)?;
        return Err(AllocError::Storage.into());
    }
    Ok(())
}

fn give_back(cache: &FragmentCache, fragment: Fragment) {
    if let Err(untracked) = cache.return_fragment(fragment) {
        drop(untracked);
    }
}

// =============================================================================
// Tests
// =============================================================================
