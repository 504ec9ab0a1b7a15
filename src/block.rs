//! DMA block pool seam.
//!
//! Every [`Link`](crate::Link) owns exactly one fixed-size, hardware-addressable
//! block. Blocks come from an external, device-specific pool implementing
//! [`BlockPool`]; this crate never chooses block size or placement.

use core::ptr::NonNull;

/// Device-visible (bus) address of a DMA block
pub type DmaAddr = u64;

/// Allocation context of the caller.
///
/// Operations running in interrupt or completion-handler context must pass
/// [`AllocMode::Atomic`]. Nothing in this crate blocks in that mode; allocation
/// failures are reported instead of retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocMode {
    /// Ordinary process context, the block pool may sleep
    #[default]
    Blocking,
    /// Interrupt/completion context, the block pool must not sleep
    Atomic,
}

impl AllocMode {
    /// Whether the block pool is allowed to sleep in this mode
    #[inline(always)]
    #[must_use]
    pub const fn may_block(self) -> bool {
        matches!(self, AllocMode::Blocking)
    }
}

/// One hardware-addressable block: a processor pointer paired with the
/// address the DMA engine uses for the same memory.
#[derive(Debug, PartialEq, Eq)]
pub struct DmaBlock {
    cpu: NonNull<u8>,
    dma: DmaAddr,
    len: usize,
}

impl DmaBlock {
    /// Pair a processor pointer with its device address.
    ///
    /// Only [`BlockPool`] implementations should construct blocks; the pool's
    /// safety contract is what makes the memory behind `cpu` usable.
    #[must_use]
    pub const fn new(cpu: NonNull<u8>, dma: DmaAddr, len: usize) -> Self {
        Self { cpu, dma, len }
    }

    /// Processor-visible pointer to the block
    #[inline(always)]
    #[must_use]
    pub const fn cpu_ptr(&self) -> NonNull<u8> {
        self.cpu
    }

    /// Device-visible address of the block
    #[inline(always)]
    #[must_use]
    pub const fn dma_addr(&self) -> DmaAddr {
        self.dma
    }

    /// Block length in bytes
    #[inline(always)]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True for zero-length blocks
    #[inline(always)]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// SAFETY: A DmaBlock is the sole handle to its memory between allocate_block
// and free_block, so moving it to another context moves exclusive ownership.
unsafe impl Send for DmaBlock {}

/// Source of fixed-size DMA-capable blocks, keyed by device.
///
/// # Safety
///
/// Implementers guarantee that every block returned by
/// [`allocate_block`](Self::allocate_block):
/// - points to `len` bytes that are readable and writable by the CPU,
/// - is not handed out again until it is passed to
///   [`free_block`](Self::free_block),
/// - stays valid until then, whatever context frees it.
pub unsafe trait BlockPool: Send + Sync {
    /// Size of every block handed out by this pool
    fn block_size(&self) -> usize;

    /// Allocate one block; must not sleep when `mode` is [`AllocMode::Atomic`]
    fn allocate_block(&self, mode: AllocMode) -> Option<DmaBlock>;

    /// Return a block previously obtained from this pool
    fn free_block(&self, block: DmaBlock);
}
