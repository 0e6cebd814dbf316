//! Allocation of bit blocks, GAP blocks and pointer blocks.
//!
//! Storage comes from two strategies: a [`BlockAllocator`] for word-typed
//! block memory and a [`PtrAllocator`] for pointer arrays. [`MemAlloc`] binds
//! one of each and hands out owning handles ([`BitBlock`], [`GapBlock`],
//! [`PtrBlock`]) that must be returned to it by value.
//!
//! Strategies provided here:
//!
//! * [`SystemAllocator`]: the global allocator with block alignment.
//! * [`BlockPool`]: caches released bit blocks in front of another strategy.
//! * [`Counting`]: accounting and optional budgets in front of another strategy.

use core::ptr::NonNull;

use crate::error::Result;
use crate::{BlockAddr, Word};

mod adapter;
mod counting;
mod handle;
mod pool;
mod system;

pub use adapter::{MemAlloc, StandardAllocator};
pub use counting::{Counting, Usage};
pub use handle::{BitBlock, GapBlock, PtrBlock};
pub use pool::{BlockPool, PoolConfig};
pub use system::SystemAllocator;

/// A source of word-typed block memory.
///
/// # Safety
///
/// `allocate(words)` must return memory valid for reads and writes of `words`
/// initialized [`Word`]s, aligned to [`BLOCK_ALIGN`](crate::BLOCK_ALIGN), and
/// not aliased by any other live allocation. `deallocate` must accept any block
/// allocated by any value of the implementing type, so long as it is passed the
/// same `words`.
pub unsafe trait BlockAllocator {
    /// Allocates storage for `words` words.
    fn allocate(&mut self, words: usize) -> Result<NonNull<Word>>;
    /// Releases storage obtained from `allocate`.
    ///
    /// # Safety
    ///
    /// `block` must have come from `allocate(words)` on a value of this type,
    /// with the same `words`, and must not be used afterwards.
    unsafe fn deallocate(&mut self, block: NonNull<Word>, words: usize);
}

/// A source of pointer arrays.
///
/// # Safety
///
/// `allocate_ptrs(count)` must return memory valid for reads and writes of
/// `count` [`BlockAddr`]s, each initialized to null, and not aliased by any
/// other live allocation. `deallocate_ptrs` must accept any array allocated by
/// any value of the implementing type, so long as it is passed the same `count`.
pub unsafe trait PtrAllocator {
    /// Allocates `count` null block addresses.
    fn allocate_ptrs(&mut self, count: usize) -> Result<NonNull<BlockAddr>>;
    /// Releases an array obtained from `allocate_ptrs`.
    ///
    /// # Safety
    ///
    /// `ptrs` must have come from `allocate_ptrs(count)` on a value of this
    /// type, with the same `count`, and must not be used afterwards.
    unsafe fn deallocate_ptrs(&mut self, ptrs: NonNull<BlockAddr>, count: usize);
}
