//! Fragment Cache
//!
//! An object pool of same-shaped [`Fragment`]s so that hot paths, including
//! interrupt handlers, never build descriptor chains from scratch.
//!
//! # Architecture
//!
//! Each cache holds:
//! - an idle pool of ready-to-use fragments,
//! - a slot table recording every fragment it ever produced as idle, active
//!   (checked out by exactly one holder), or destroyed,
//! - counters exposed through [`CacheStats`],
//! - a factory that produces one more fragment of the cache's shape.
//!
//! The idle pool, slot table and counters sit behind one
//! [`CriticalSectionCell`]. Critical sections only push, pop and count. The
//! factory call and fragment destruction (both of which talk to the block
//! pool, and the factory may sleep) always run outside the lock.
//!
//! Idle storage and the slot table are sized to the live fragment count, so
//! fetch, return, discard and shrink never allocate. Admitting a newly
//! produced fragment is the one exception: when the live count passes its
//! previous high-water mark the slot table and idle storage grow inside the
//! critical section, with `Vec`'s amortized doubling.
//!
//! # Lifecycle
//!
//! `Uninitialized` → [`initialize`](FragmentCache::initialize) → `Ready` →
//! [`release`](FragmentCache::release) (`Draining`) → `Released`.
//!
//! # Example
//!
//! ```ignore
//! let pool: Arc<dyn BlockPool> = /* device block pool */;
//! let factory_pool = pool.clone();
//! let cache = Arc::new(FragmentCache::new(
//!     CacheConfig::new("spi0-xfer").with_initial_idle(8),
//!     move |mode: AllocMode| -> Result<Fragment> {
//!         Ok(Fragment::build(&factory_pool, 3, 0, mode)?)
//!     },
//! ));
//! cache.initialize()?;
//!
//! let fragment = cache.fetch(AllocMode::Atomic)?;
//! // ... use it ...
//! cache.return_fragment(fragment).ok();
//! ```

mod config;
mod slots;
mod stats;

pub use config::{CacheConfig, CacheState};
pub use stats::CacheStats;

use alloc::boxed::Box;
use alloc::vec::Vec;

use self::slots::{SlotState, SlotTable};
use self::stats::Counters;
use crate::block::AllocMode;
use crate::error::{CacheError, Error, Result};
use crate::fragment::{Fragment, FragmentState, PoolTag};
use crate::sync::CriticalSectionCell;

/// Process-unique cache identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CacheId(u32);

static NEXT_CACHE_ID: CriticalSectionCell<u32> = CriticalSectionCell::new(1);

impl CacheId {
    fn next() -> Self {
        NEXT_CACHE_ID.with(|next| {
            let id = *next;
            *next = next.wrapping_add(1);
            CacheId(id)
        })
    }

    /// Raw identifier value
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Produces one fragment of a cache's shape.
///
/// Called outside the cache lock. In [`AllocMode::Blocking`] it may sleep; in
/// [`AllocMode::Atomic`] it must not.
pub trait FragmentFactory: Send + Sync {
    /// Build a new, empty-handed fragment
    ///
    /// # Errors
    ///
    /// Usually [`AllocError`](crate::AllocError) when blocks or storage run out.
    fn produce(&self, mode: AllocMode) -> Result<Fragment>;
}

impl<F> FragmentFactory for F
where
    F: Fn(AllocMode) -> Result<Fragment> + Send + Sync,
{
    fn produce(&self, mode: AllocMode) -> Result<Fragment> {
        self(mode)
    }
}

/// Outcome of [`FragmentCache::release`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub struct ReleaseReport {
    /// Idle fragments destroyed
    pub destroyed: u32,
    /// Fragments still checked out; left alone, destroyed when returned
    pub leaked: u32,
}

impl ReleaseReport {
    /// True if nothing was checked out at release time
    pub const fn is_clean(&self) -> bool {
        self.leaked == 0
    }
}

struct CacheInner {
    state: CacheState,
    /// Capacity is kept at or above the live fragment count so that
    /// returning a fragment never allocates.
    idle: Vec<Fragment>,
    slots: SlotTable,
    counters: Counters,
}

impl CacheInner {
    const fn new() -> Self {
        Self {
            state: CacheState::Uninitialized,
            idle: Vec::new(),
            slots: SlotTable::new(),
            counters: Counters::new(),
        }
    }

    fn ensure_ready(&self) -> core::result::Result<(), CacheError> {
        match self.state {
            CacheState::Ready => Ok(()),
            _ => Err(CacheError::NotReady),
        }
    }

    /// Detach the whole idle pool, retiring every slot in it
    fn drain_idle(&mut self) -> Vec<Fragment> {
        let drained = core::mem::take(&mut self.idle);
        for fragment in &drained {
            if let Some(tag) = fragment.origin() {
                self.slots.retire(tag.slot, tag.generation);
            }
        }
        self.counters.removed += drained.len() as u32;
        drained
    }
}

enum Returned {
    Parked,
    Destroy(Fragment),
    Untracked(Fragment),
}

/// Object pool of same-shaped fragments with idle/active tracking.
pub struct FragmentCache {
    id: CacheId,
    config: CacheConfig,
    factory: Box<dyn FragmentFactory>,
    inner: CriticalSectionCell<CacheInner>,
}

impl FragmentCache {
    /// Create an uninitialized cache.
    ///
    /// Nothing is allocated until [`initialize`](Self::initialize).
    pub fn new<F>(config: CacheConfig, factory: F) -> Self
    where
        F: FragmentFactory + 'static,
    {
        Self {
            id: CacheId::next(),
            config,
            factory: Box::new(factory),
            inner: CriticalSectionCell::new(CacheInner::new()),
        }
    }

    /// Identifier carried by every fragment this cache produces
    #[inline]
    #[must_use]
    pub fn id(&self) -> CacheId {
        self.id
    }

    /// Cache name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration the cache was created with
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> CacheState {
        self.inner.with_ref(|inner| inner.state)
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.with_ref(|inner| {
            debug_assert_eq!(inner.slots.idle_count() as usize, inner.idle.len());
            CacheStats {
                active: inner.slots.active_count(),
                idle: inner.slots.idle_count(),
                allocated: inner.counters.allocated,
                allocated_nonblocking: inner.counters.allocated_nonblocking,
                fetched: inner.counters.fetched,
                removed: inner.counters.removed,
            }
        })
    }

    /// Pre-warm the idle pool with `initial_idle` fragments and go `Ready`.
    ///
    /// If any allocation fails, every fragment created so far is destroyed and
    /// the cache returns to `Uninitialized`, so a retry starts from an empty
    /// pool. The counters keep the failed attempt. A cache released while
    /// pre-warming stays `Released`.
    ///
    /// # Errors
    ///
    /// - [`CacheError::AlreadyInitialized`] if not `Uninitialized`
    /// - [`CacheError::ResizeOutOfBounds`] if `initial_idle` exceeds the bound
    /// - the factory's error (usually out of memory)
    pub fn initialize(&self) -> Result<()> {
        if self.config.initial_idle > self.config.resize_limit {
            return Err(CacheError::ResizeOutOfBounds.into());
        }

        self.inner.with(|inner| match inner.state {
            CacheState::Uninitialized => {
                inner.state = CacheState::Ready;
                Ok(())
            }
            _ => Err(CacheError::AlreadyInitialized),
        })?;

        for _ in 0..self.config.initial_idle {
            if let Err(err) = self.produce(AllocMode::Blocking, SlotState::Idle) {
                // A concurrent release has already drained the pool and
                // owns the state from here on
                let partial = self.inner.with(|inner| {
                    if inner.state != CacheState::Ready {
                        return Vec::new();
                    }
                    inner.state = CacheState::Uninitialized;
                    inner.drain_idle()
                });
                drop(partial);

                #[cfg(feature = "log")]
                log::error!("fragment cache {}: pre-warm failed: {}", self.name(), err);
                #[cfg(feature = "defmt")]
                defmt::error!("fragment cache {}: pre-warm failed: {}", self.name(), err);

                return Err(err);
            }
        }
        Ok(())
    }

    /// Check out a fragment.
    ///
    /// Pops from the idle pool when possible. When the pool is empty a new
    /// fragment is produced on the spot, so a fetch never waits for a return;
    /// the pool simply grows.
    ///
    /// # Errors
    ///
    /// - [`CacheError::NotReady`] unless `Ready`
    /// - the factory's error when the pool had to grow and could not
    pub fn fetch(&self, mode: AllocMode) -> Result<Fragment> {
        let pooled = self.inner.with(|inner| {
            inner.ensure_ready()?;
            let Some(mut fragment) = inner.idle.pop() else {
                return Ok(None);
            };
            if let Some(tag) = fragment.origin() {
                let moved = inner.slots.transition(
                    tag.slot,
                    tag.generation,
                    SlotState::Idle,
                    SlotState::Active,
                );
                debug_assert!(moved);
            }
            inner.counters.fetched += 1;
            fragment.set_state(FragmentState::Active);
            Ok::<_, CacheError>(Some(fragment))
        })?;

        if let Some(fragment) = pooled {
            return Ok(fragment);
        }

        #[cfg(feature = "log")]
        log::debug!("fragment cache {}: idle pool empty, growing", self.name());
        #[cfg(feature = "defmt")]
        defmt::debug!("fragment cache {}: idle pool empty, growing", self.name());

        self.produce(mode, SlotState::Active)?
            .ok_or(Error::Cache(CacheError::NotReady))
    }

    /// Give a checked-out fragment back to the idle pool.
    ///
    /// Once the cache is released, returned fragments are destroyed instead.
    ///
    /// # Errors
    ///
    /// Hands the fragment back untouched if this cache does not track it as
    /// active (foreign, stale, or never checked out). The cache's lists are
    /// not modified in that case.
    pub fn return_fragment(&self, mut fragment: Fragment) -> core::result::Result<(), Fragment> {
        let Some(tag) = fragment.origin().filter(|tag| tag.cache == self.id) else {
            self.report_untracked();
            return Err(fragment);
        };

        let outcome = self.inner.with(|inner| {
            if inner.state == CacheState::Ready {
                if !inner.slots.transition(
                    tag.slot,
                    tag.generation,
                    SlotState::Active,
                    SlotState::Idle,
                ) {
                    return Returned::Untracked(fragment);
                }
                fragment.set_state(FragmentState::Idle);
                inner.idle.push(fragment);
                Returned::Parked
            } else if inner.slots.transition(
                tag.slot,
                tag.generation,
                SlotState::Active,
                SlotState::Destroyed,
            ) {
                inner.counters.removed += 1;
                Returned::Destroy(fragment)
            } else {
                Returned::Untracked(fragment)
            }
        });

        match outcome {
            Returned::Parked => Ok(()),
            Returned::Destroy(fragment) => {
                drop(fragment);
                Ok(())
            }
            Returned::Untracked(fragment) => {
                self.report_untracked();
                Err(fragment)
            }
        }
    }

    /// Destroy a checked-out fragment and retire its slot.
    ///
    /// Use this instead of dropping a pool-managed fragment, which would leave
    /// the cache counting it as active.
    ///
    /// # Errors
    ///
    /// Hands the fragment back if this cache does not track it as active.
    pub fn discard(&self, fragment: Fragment) -> core::result::Result<(), Fragment> {
        let Some(tag) = fragment.origin().filter(|tag| tag.cache == self.id) else {
            return Err(fragment);
        };

        let retired = self.inner.with(|inner| {
            let retired = inner.slots.transition(
                tag.slot,
                tag.generation,
                SlotState::Active,
                SlotState::Destroyed,
            );
            if retired {
                inner.counters.removed += 1;
            }
            retired
        });

        if retired {
            drop(fragment);
            Ok(())
        } else {
            Err(fragment)
        }
    }

    /// Grow (`delta > 0`) or shrink (`delta < 0`) the idle pool.
    ///
    /// Shrinking only ever removes idle fragments. Growth that fails partway
    /// keeps the fragments already added.
    ///
    /// # Errors
    ///
    /// - [`CacheError::ResizeOutOfBounds`] if `|delta|` exceeds the bound;
    ///   nothing changes
    /// - [`CacheError::NotReady`] unless `Ready`
    /// - [`CacheError::Exhausted`] if the idle pool empties before `|delta|`
    ///   fragments were removed
    /// - the factory's error when growing
    pub fn resize(&self, delta: i32) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        if delta.unsigned_abs() > self.config.resize_limit {
            return Err(CacheError::ResizeOutOfBounds.into());
        }
        self.inner.with_ref(CacheInner::ensure_ready)?;

        if delta > 0 {
            for _ in 0..delta {
                self.produce(AllocMode::Blocking, SlotState::Idle)?;
            }
        } else {
            for _ in 0..delta.unsigned_abs() {
                let victim = self.inner.with(|inner| {
                    inner.ensure_ready()?;
                    let fragment = inner.idle.pop().ok_or(CacheError::Exhausted)?;
                    if let Some(tag) = fragment.origin() {
                        inner.slots.retire(tag.slot, tag.generation);
                    }
                    inner.counters.removed += 1;
                    Ok::<_, CacheError>(fragment)
                })?;
                drop(victim);
            }
        }

        #[cfg(feature = "log")]
        log::debug!("fragment cache {}: resized by {}", self.name(), delta);
        #[cfg(feature = "defmt")]
        defmt::debug!("fragment cache {}: resized by {}", self.name(), delta);

        Ok(())
    }

    /// Destroy the idle pool and stop serving.
    ///
    /// Fragments still checked out are **not** reclaimed, since their holders
    /// may still be using them; they are reported as leaked and destroyed
    /// whenever they are returned.
    pub fn release(&self) -> ReleaseReport {
        let drained = self.inner.with(|inner| {
            inner.state = CacheState::Draining;
            inner.drain_idle()
        });
        let destroyed = drained.len() as u32;
        drop(drained);

        let leaked = self.inner.with(|inner| {
            inner.state = CacheState::Released;
            inner.slots.active_count()
        });

        if leaked > 0 {
            #[cfg(feature = "log")]
            log::error!(
                "fragment cache {} is not idle: {} fragments still active",
                self.name(),
                leaked
            );
            #[cfg(feature = "defmt")]
            defmt::error!(
                "fragment cache {} is not idle: {} fragments still active",
                self.name(),
                leaked
            );
        }

        ReleaseReport { destroyed, leaked }
    }

    /// Run the factory (outside the lock) and record the new fragment in the
    /// requested state. Returns the fragment for `Active`, `None` for `Idle`.
    fn produce(&self, mode: AllocMode, state: SlotState) -> Result<Option<Fragment>> {
        let mut fragment = self.factory.produce(mode)?;

        let admitted = self.inner.with(|inner| {
            if let Err(err) = inner.ensure_ready() {
                return Err((Error::from(err), fragment));
            }
            let (slot, generation) = match inner.slots.claim(state) {
                Ok(claimed) => claimed,
                Err(err) => return Err((err.into(), fragment)),
            };
            let spare = inner.slots.live_count() as usize - inner.idle.len();
            if let Err(err) = inner.idle.try_reserve(spare) {
                inner.slots.retire(slot, generation);
                return Err((err.into(), fragment));
            }

            fragment.set_origin(PoolTag {
                cache: self.id,
                slot,
                generation,
            });
            inner.counters.allocated += 1;
            if !mode.may_block() {
                inner.counters.allocated_nonblocking += 1;
            }

            if state == SlotState::Idle {
                fragment.set_state(FragmentState::Idle);
                inner.idle.push(fragment);
                Ok(None)
            } else {
                inner.counters.fetched += 1;
                fragment.set_state(FragmentState::Active);
                Ok(Some(fragment))
            }
        });

        // Rejected fragments are destroyed here, outside the lock
        admitted.map_err(|(err, _fragment)| err)
    }

    fn report_untracked(&self) {
        #[cfg(feature = "log")]
        log::warn!(
            "fragment cache {}: returned fragment is not tracked as active",
            self.name()
        );
        #[cfg(feature = "defmt")]
        defmt::warn!(
            "fragment cache {}: returned fragment is not tracked as active",
            self.name()
        );
    }
}

impl core::fmt::Debug for FragmentCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FragmentCache")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
