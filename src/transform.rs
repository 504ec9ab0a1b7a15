//! Deferred transforms attached to a composite fragment.
//!
//! A [`Transform`] is a one-shot action registered on a [`MergedFragment`] in
//! either the [`Phase::Pre`] list (run before the hardware operation starts) or
//! the [`Phase::Post`] list (run after it completes). Transforms fire in
//! registration order and are consumed by firing.
//!
//! Two kinds exist:
//! - custom actions, a boxed closure plus an optional zeroed scratch region
//!   ("inline extra data") handed to the closure when it fires,
//! - restore actions, registered by the composition engine, which unsplice a
//!   pooled fragment's links out of the composite and return it to its cache.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::block::AllocMode;
use crate::cache::FragmentCache;
use crate::compose::MergedFragment;
use crate::error::{AllocResult, Result, TransformError};
use crate::fragment::{Fragment, SpliceMark};

/// Execution phase of a transform relative to the hardware operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Before the composite is handed to the hardware
    Pre,
    /// After the hardware signalled completion
    Post,
}

/// Signature of a custom transform action.
///
/// Receives the transform's scratch region, the composite it is attached to,
/// and the caller's allocation context.
pub type TransformFn<C> =
    dyn FnOnce(&mut [u8], &mut MergedFragment<C>, AllocMode) -> Result<()> + Send;

enum Action<C> {
    Custom(Box<TransformFn<C>>),
    Restore(Restore),
}

/// A deferred, one-shot action on a composite fragment.
pub struct Transform<C> {
    label: &'static str,
    action: Action<C>,
    scratch: Vec<u8>,
}

impl<C> Transform<C> {
    /// Custom transform without scratch space
    pub fn new<F>(label: &'static str, action: F) -> Self
    where
        F: FnOnce(&mut [u8], &mut MergedFragment<C>, AllocMode) -> Result<()> + Send + 'static,
    {
        Self {
            label,
            action: Action::Custom(Box::new(action)),
            scratch: Vec::new(),
        }
    }

    /// Custom transform with `scratch_len` zeroed bytes of inline extra data.
    ///
    /// # Errors
    ///
    /// [`AllocError::Storage`](crate::AllocError::Storage) if the scratch
    /// region cannot be reserved.
    pub fn with_scratch<F>(label: &'static str, scratch_len: usize, action: F) -> AllocResult<Self>
    where
        F: FnOnce(&mut [u8], &mut MergedFragment<C>, AllocMode) -> Result<()> + Send + 'static,
    {
        let mut scratch = Vec::new();
        scratch.try_reserve_exact(scratch_len)?;
        scratch.resize(scratch_len, 0);

        let mut transform = Self::new(label, action);
        transform.scratch = scratch;
        Ok(transform)
    }

    /// Restore transform for a fragment spliced into a composite
    pub(crate) fn restore(cache: Arc<FragmentCache>, fragment: Fragment, mark: SpliceMark) -> Self {
        Self {
            label: "restore",
            action: Action::Restore(Restore {
                cache,
                fragment: Some(fragment),
                mark,
            }),
            scratch: Vec::new(),
        }
    }

    /// Short label for diagnostics
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Inline extra data
    #[inline]
    #[must_use]
    pub fn scratch(&self) -> &[u8] {
        &self.scratch
    }

    /// Mutable inline extra data, e.g. to prefill before registration
    #[inline]
    pub fn scratch_mut(&mut self) -> &mut [u8] {
        &mut self.scratch
    }

    /// True for transforms that return a spliced fragment to its cache
    #[must_use]
    pub fn is_restore(&self) -> bool {
        matches!(self.action, Action::Restore(_))
    }

    /// Splice mark of a restore transform
    #[must_use]
    pub fn splice_mark(&self) -> Option<&SpliceMark> {
        match &self.action {
            Action::Restore(restore) => Some(&restore.mark),
            Action::Custom(_) => None,
        }
    }

    /// Cache a restore transform returns its fragment to
    #[must_use]
    pub fn restore_cache(&self) -> Option<&FragmentCache> {
        match &self.action {
            Action::Restore(restore) => Some(&restore.cache),
            Action::Custom(_) => None,
        }
    }

    /// Run the action against `composite`, consuming the transform.
    ///
    /// # Errors
    ///
    /// Whatever the action reports. A restore transform fails with
    /// [`TransformError::MissingRun`] if its links are no longer in the
    /// composite; its fragment is then discarded from the cache.
    pub fn fire(self, composite: &mut MergedFragment<C>, mode: AllocMode) -> Result<()> {
        let Self {
            action,
            mut scratch,
            ..
        } = self;

        match action {
            Action::Custom(action) => action(&mut scratch, composite, mode),
            Action::Restore(restore) => restore.fire(composite),
        }
    }

    /// Release the transform without running it.
    ///
    /// A restore transform destroyed this way discards its fragment from the
    /// cache; the links it spliced stay with the composite.
    #[inline]
    pub fn destroy(self) {
        drop(self);
    }
}

impl<C> core::fmt::Debug for Transform<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut s = f.debug_struct("Transform");
        s.field("label", &self.label)
            .field("scratch_len", &self.scratch.len());
        if let Action::Restore(restore) = &self.action {
            s.field("cache", &restore.cache.name())
                .field("mark", &restore.mark);
        }
        s.finish()
    }
}

struct Restore {
    cache: Arc<FragmentCache>,
    fragment: Option<Fragment>,
    mark: SpliceMark,
}

impl Restore {
    fn fire<C>(mut self, composite: &mut MergedFragment<C>) -> Result<()> {
        let Some(chain) = composite.chain_mut().unsplice(&self.mark) else {
            #[cfg(feature = "log")]
            log::error!(
                "restore to cache {}: spliced run of {} links missing",
                self.cache.name(),
                self.mark.len()
            );
            #[cfg(feature = "defmt")]
            defmt::error!(
                "restore to cache {}: spliced run of {} links missing",
                self.cache.name(),
                self.mark.len()
            );
            // Drop discards the fragment
            return Err(TransformError::MissingRun.into());
        };

        let Some(mut fragment) = self.fragment.take() else {
            return Err(TransformError::Failed.into());
        };
        composite.shrink_size(fragment.size());
        fragment.restore_chain(chain);

        // The cache logs untracked returns; the fragment is destroyed here
        if let Err(untracked) = self.cache.return_fragment(fragment) {
            drop(untracked);
        }
        Ok(())
    }
}

impl Drop for Restore {
    fn drop(&mut self) {
        if let Some(fragment) = self.fragment.take() {
            let _ = self.cache.discard(fragment);
        }
    }
}

/// Ordered list of transforms for one phase.
pub struct TransformList<C> {
    entries: VecDeque<Transform<C>>,
}

impl<C> TransformList<C> {
    /// Empty list
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append a transform.
    ///
    /// # Errors
    ///
    /// Hands the transform back if list storage cannot grow.
    pub fn push(&mut self, transform: Transform<C>) -> core::result::Result<(), Transform<C>> {
        if self.entries.try_reserve(1).is_err() {
            return Err(transform);
        }
        self.entries.push_back(transform);
        Ok(())
    }

    /// Reserve room for `additional` more transforms
    ///
    /// # Errors
    ///
    /// [`AllocError::Storage`](crate::AllocError::Storage).
    pub fn reserve(&mut self, additional: usize) -> AllocResult<()> {
        self.entries.try_reserve(additional)?;
        Ok(())
    }

    /// Remove the next transform to fire
    pub fn pop_front(&mut self) -> Option<Transform<C>> {
        self.entries.pop_front()
    }

    /// Transforms still registered
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Transforms in firing order
    pub fn iter(&self) -> impl Iterator<Item = &Transform<C>> + '_ {
        self.entries.iter()
    }

    /// Destroy every transform without firing
    pub fn clear(&mut self) {
        while let Some(transform) = self.entries.pop_front() {
            transform.destroy();
        }
    }
}

impl<C> Default for TransformList<C> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
