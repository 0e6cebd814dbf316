use super::{BitBlock, BlockAllocator, GapBlock, PtrAllocator, PtrBlock, SystemAllocator};
use crate::error::{Error, Result};
use crate::gap::{self, GapLevels};
use crate::{GAP_LEVELS, SET_ARRAY_SIZE, SET_BLOCK_SIZE};

/// Binds a block strategy and a pointer strategy into one allocator.
///
/// Cloning clones both strategies, with whatever semantics they give `Clone`.
#[derive(Clone, Debug, Default)]
pub struct MemAlloc<BA = SystemAllocator, PA = SystemAllocator> {
    block_alloc: BA,
    ptr_alloc: PA,
}

/// The allocator pair backed by the global allocator.
pub type StandardAllocator = MemAlloc<SystemAllocator, SystemAllocator>;

impl<BA, PA> MemAlloc<BA, PA> {
    pub fn new(block_alloc: BA, ptr_alloc: PA) -> Self {
        MemAlloc { block_alloc, ptr_alloc }
    }
    /// A copy of the block strategy.
    pub fn block_allocator(&self) -> BA where BA: Clone { self.block_alloc.clone() }
    /// A copy of the pointer strategy.
    pub fn ptr_allocator(&self) -> PA where PA: Clone { self.ptr_alloc.clone() }
    pub fn block_allocator_mut(&mut self) -> &mut BA { &mut self.block_alloc }
    pub fn ptr_allocator_mut(&mut self) -> &mut PA { &mut self.ptr_alloc }
}

impl<BA: BlockAllocator, PA> MemAlloc<BA, PA> {
    /// Allocates one bit block of [`SET_BLOCK_SIZE`] words.
    ///
    /// Whether it arrives zeroed depends on the strategy: [`SystemAllocator`]
    /// zeroes, a [`BlockPool`](super::BlockPool) may hand back a released
    /// block with its old contents.
    #[inline]
    pub fn alloc_bit_block(&mut self) -> Result<BitBlock<BA>> {
        self.alloc_bit_blocks(1)
    }

    /// Allocates `factor` contiguous bit blocks.
    pub fn alloc_bit_blocks(&mut self, factor: usize) -> Result<BitBlock<BA>> {
        let words = factor
            .checked_mul(SET_BLOCK_SIZE)
            .ok_or(Error::LayoutOverflow { count: factor })?;
        let ptr = self.block_alloc.allocate(words)?;
        // SAFETY: `allocate` returned `words` initialized words.
        Ok(unsafe { BitBlock::from_raw(ptr, words) })
    }

    pub fn free_bit_block(&mut self, block: BitBlock<BA>) {
        let (ptr, words) = block.into_raw();
        // SAFETY: the handle came from this strategy type with this size.
        unsafe { self.block_alloc.deallocate(ptr, words) }
    }

    /// Allocates an empty GAP block at `level`: a single unset run.
    pub fn alloc_gap_block(&mut self, level: usize, levels: &GapLevels) -> Result<GapBlock<BA>> {
        debug_assert!(level < GAP_LEVELS, "GAP level {} out of range", level);
        let words = gap::gap_level_words(level, levels);
        let ptr = self.block_alloc.allocate(words)?;
        let mut block = unsafe { GapBlock::from_raw(ptr, words, level) };
        block[0] = 0;
        gap::set_gap_level(&mut block, level);
        gap::gap_set_all(&mut block, false);
        Ok(block)
    }

    /// Releases a GAP block.
    ///
    /// The block's header is expected to still describe the level it was
    /// allocated at.
    pub fn free_gap_block(&mut self, block: GapBlock<BA>, levels: &GapLevels) {
        debug_assert_eq!(
            gap::gap_capacity_words(&block, levels),
            block.words(),
            "GAP block header disagrees with its allocation",
        );
        let (ptr, words) = block.into_raw();
        unsafe { self.block_alloc.deallocate(ptr, words) }
    }
}

impl<BA, PA: PtrAllocator> MemAlloc<BA, PA> {
    /// Allocates a pointer block of [`SET_ARRAY_SIZE`] null slots.
    #[inline]
    pub fn alloc_ptr(&mut self) -> Result<PtrBlock<PA>> {
        self.alloc_ptr_sized(SET_ARRAY_SIZE)
    }

    pub fn alloc_ptr_sized(&mut self, count: usize) -> Result<PtrBlock<PA>> {
        let ptr = self.ptr_alloc.allocate_ptrs(count)?;
        Ok(unsafe { PtrBlock::from_raw(ptr, count) })
    }

    /// Releases a pointer block; `None` is ignored.
    pub fn free_ptr(&mut self, block: Option<PtrBlock<PA>>) {
        if let Some(block) = block {
            let (ptr, count) = block.into_raw();
            unsafe { self.ptr_alloc.deallocate_ptrs(ptr, count) }
        }
    }
}
