use core::ptr::NonNull;

use smallvec::SmallVec;

use super::{BlockAllocator, SystemAllocator};
use crate::error::Result;
use crate::{Word, SET_BLOCK_SIZE};

/// Configuration for a [`BlockPool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Most released bit blocks kept for reuse.
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self { PoolConfig { capacity: 64 } }
}

/// Caches released bit blocks of [`SET_BLOCK_SIZE`] words for reuse.
///
/// Other sizes, and releases beyond the configured capacity, pass through to
/// the inner strategy. Reused blocks keep their previous contents.
pub struct BlockPool<A: BlockAllocator = SystemAllocator> {
    inner: A,
    config: PoolConfig,
    free: SmallVec<[NonNull<Word>; 16]>,
}

impl<A: BlockAllocator> BlockPool<A> {
    pub fn new(inner: A) -> Self {
        Self::with_config(inner, PoolConfig::default())
    }
    pub fn with_config(inner: A, config: PoolConfig) -> Self {
        BlockPool { inner, config, free: SmallVec::new() }
    }

    #[inline]
    pub fn config(&self) -> &PoolConfig { &self.config }
    /// Blocks currently held for reuse.
    #[inline]
    pub fn cached(&self) -> usize { self.free.len() }

    /// Returns every cached block to the inner strategy.
    pub fn clear(&mut self) {
        if !self.free.is_empty() {
            log::trace!("block pool: draining {} blocks", self.free.len());
        }
        for block in self.free.drain(..) {
            // SAFETY: cached blocks came from `inner` with `SET_BLOCK_SIZE` words.
            unsafe { self.inner.deallocate(block, SET_BLOCK_SIZE) }
        }
    }
}

// SAFETY: cached blocks are unaliased `SET_BLOCK_SIZE`-word allocations of
// `A`, and every other request is delegated to `A`.
unsafe impl<A: BlockAllocator> BlockAllocator for BlockPool<A> {
    fn allocate(&mut self, words: usize) -> Result<NonNull<Word>> {
        if words == SET_BLOCK_SIZE {
            if let Some(block) = self.free.pop() {
                log::trace!("block pool: reusing block, {} left", self.free.len());
                return Ok(block);
            }
        }
        self.inner.allocate(words)
    }

    unsafe fn deallocate(&mut self, block: NonNull<Word>, words: usize) {
        if words == SET_BLOCK_SIZE && self.free.len() < self.config.capacity {
            self.free.push(block);
        } else {
            self.inner.deallocate(block, words)
        }
    }
}

impl<A: BlockAllocator + Default> Default for BlockPool<A> {
    fn default() -> Self { Self::new(A::default()) }
}

/// An empty pool with the same configuration.
impl<A: BlockAllocator + Clone> Clone for BlockPool<A> {
    fn clone(&self) -> Self { Self::with_config(self.inner.clone(), self.config) }
}

impl<A: BlockAllocator> Drop for BlockPool<A> {
    fn drop(&mut self) { self.clear() }
}

impl<A: BlockAllocator + core::fmt::Debug> core::fmt::Debug for BlockPool<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockPool")
            .field("inner", &self.inner)
            .field("config", &self.config)
            .field("cached", &self.free.len())
            .finish()
    }
}

// SAFETY: the pool owns its cached blocks outright.
unsafe impl<A: BlockAllocator + Send> Send for BlockPool<A> {}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::vec::Vec;
    use crate::memory::{Counting, MemAlloc};

    #[test]
    fn reuses_released_blocks() {
        let counting = Counting::new(SystemAllocator);
        let mut alloc = MemAlloc::new(BlockPool::new(counting.clone()), SystemAllocator);

        let mut first = alloc.alloc_bit_block().unwrap();
        first[0] = 0xdead;
        let addr = first.as_ptr();
        alloc.free_bit_block(first);
        assert_eq!(alloc.block_allocator_mut().cached(), 1);
        assert_eq!(counting.block_usage().live, 1);

        let again = alloc.alloc_bit_block().unwrap();
        assert_eq!(again.as_ptr(), addr);
        // Reused blocks are not cleared.
        assert_eq!(again[0], 0xdead);
        assert_eq!(alloc.block_allocator_mut().cached(), 0);
        assert_eq!(counting.block_usage().live, 1);
        alloc.free_bit_block(again);

        // Multi-block allocations are not cached.
        let wide = alloc.alloc_bit_blocks(2).unwrap();
        alloc.free_bit_block(wide);
        assert_eq!(alloc.block_allocator_mut().cached(), 1);

        drop(alloc);
        assert_eq!(counting.block_usage().live, 0);
    }

    #[test]
    fn capacity_bounds_the_cache() {
        let counting = Counting::new(SystemAllocator);
        let mut pool = BlockPool::with_config(counting.clone(), PoolConfig { capacity: 2 });
        let blocks: Vec<_> = (0 .. 4).map(|_| pool.allocate(SET_BLOCK_SIZE).unwrap()).collect();
        for block in blocks {
            unsafe { pool.deallocate(block, SET_BLOCK_SIZE) }
        }
        assert_eq!(pool.cached(), 2);
        assert_eq!(counting.block_usage().live, 2);
        pool.clear();
        assert_eq!(pool.cached(), 0);
        assert_eq!(counting.block_usage().live, 0);
    }

    #[test]
    fn clone_starts_empty() {
        let mut pool = BlockPool::with_config(SystemAllocator, PoolConfig { capacity: 8 });
        let block = pool.allocate(SET_BLOCK_SIZE).unwrap();
        unsafe { pool.deallocate(block, SET_BLOCK_SIZE) }
        let copy = pool.clone();
        assert_eq!(pool.cached(), 1);
        assert_eq!(copy.cached(), 0);
        assert_eq!(copy.config(), pool.config());
    }
}
