//! A single DMA block plus chain membership.

use alloc::sync::Arc;

use crate::block::{AllocMode, BlockPool, DmaAddr, DmaBlock};
use crate::error::{AllocError, AllocResult};

/// One hardware-addressable block owned by exactly one chain.
///
/// Chain membership is expressed by ownership: a `Link` lives inside one
/// [`LinkChain`](super::LinkChain) (or a composite's spliced run) at a time,
/// so it can never be a member of two chains. Dropping a link hands its block
/// back to the pool it came from.
pub struct Link {
    block: Option<DmaBlock>,
    pool: Arc<dyn BlockPool>,
}

impl Link {
    /// Allocate one block from `pool`.
    ///
    /// # Errors
    ///
    /// [`AllocError::BlockPool`] when the pool has no block to give.
    pub fn create(pool: &Arc<dyn BlockPool>, mode: AllocMode) -> AllocResult<Self> {
        let block = pool.allocate_block(mode).ok_or(AllocError::BlockPool)?;
        Ok(Self {
            block: Some(block),
            pool: Arc::clone(pool),
        })
    }

    /// Detach and return the block to its pool.
    ///
    /// Equivalent to dropping the link; spelled out for call sites that want
    /// the release to be visible.
    #[inline]
    pub fn destroy(self) {
        drop(self);
    }

    fn block(&self) -> &DmaBlock {
        // Only `Drop` takes the block.
        self.block.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// Device-visible address of this link's block
    #[inline]
    #[must_use]
    pub fn dma_addr(&self) -> DmaAddr {
        self.block().dma_addr()
    }

    /// Processor-visible pointer to this link's block
    #[inline]
    #[must_use]
    pub fn cpu_ptr(&self) -> *const u8 {
        self.block().cpu_ptr().as_ptr()
    }

    /// Block length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.block().len()
    }

    /// True if the block has no bytes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View the block contents.
    ///
    /// Must not be used while the chain is handed to the DMA engine.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        let block = self.block();
        // SAFETY: BlockPool guarantees `len` valid bytes exclusively owned by
        // this block until it is freed, which only happens in Drop.
        unsafe { core::slice::from_raw_parts(block.cpu_ptr().as_ptr(), block.len()) }
    }

    /// Mutable view of the block contents, used to patch descriptor fields.
    ///
    /// Must not be used while the chain is handed to the DMA engine.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let block = self.block();
        // SAFETY: as for `bytes`; `&mut self` makes the access unique.
        unsafe { core::slice::from_raw_parts_mut(block.cpu_ptr().as_ptr(), block.len()) }
    }

    /// Same underlying pool as `pool`
    #[must_use]
    pub fn is_from(&self, pool: &Arc<dyn BlockPool>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            self.pool.free_block(block);
        }
    }
}

impl core::fmt::Debug for Link {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Link")
            .field("dma_addr", &format_args!("{:#010x}", self.dma_addr()))
            .field("len", &self.len())
            .finish()
    }
}
