use alloc::sync::Arc;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::{BlockAllocator, PtrAllocator, SystemAllocator};
use crate::error::{Error, Result};
use crate::{BlockAddr, Word, BLOCK_ALIGN};

/// A snapshot of one kind of allocation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    /// Allocations not yet released.
    pub live: usize,
    /// Words (or pointer slots) held by live allocations.
    pub units: usize,
    /// Largest `units` seen.
    pub peak: usize,
    /// Requests refused, by the budget or by the inner strategy.
    pub failures: usize,
}

#[derive(Debug, Default)]
struct Tally {
    live: AtomicUsize,
    units: AtomicUsize,
    peak: AtomicUsize,
    failures: AtomicUsize,
}

impl Tally {
    /// Claims `units` against `budget`; false if they do not fit.
    fn reserve(&self, units: usize, budget: Option<usize>) -> bool {
        self.units
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |held| {
                let total = held.checked_add(units)?;
                match budget {
                    Some(budget) if total > budget => None,
                    _ => Some(total),
                }
            })
            .is_ok()
    }
    fn unreserve(&self, units: usize) {
        self.units.fetch_sub(units, Ordering::Relaxed);
    }
    fn commit(&self) {
        self.live.fetch_add(1, Ordering::Relaxed);
        self.peak.fetch_max(self.units.load(Ordering::Relaxed), Ordering::Relaxed);
    }
    fn release(&self, units: usize) {
        self.live.fetch_sub(1, Ordering::Relaxed);
        self.units.fetch_sub(units, Ordering::Relaxed);
    }
    fn fail(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
    fn usage(&self) -> Usage {
        Usage {
            live: self.live.load(Ordering::Relaxed),
            units: self.units.load(Ordering::Relaxed),
            peak: self.peak.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    blocks: Tally,
    ptrs: Tally,
}

/// Tracks allocations made through an inner strategy, and optionally caps them.
///
/// Clones share their counters, so a `Counting` handed to a
/// [`MemAlloc`](super::MemAlloc) can still be inspected through the original.
/// Budgets are in words for blocks and in slots for pointer arrays; a request
/// that would exceed one fails with [`Error::OutOfMemory`] without reaching
/// the inner strategy.
#[derive(Clone, Debug, Default)]
pub struct Counting<A = SystemAllocator> {
    inner: A,
    stats: Arc<Stats>,
    block_budget: Option<usize>,
    ptr_budget: Option<usize>,
}

impl<A> Counting<A> {
    pub fn new(inner: A) -> Self {
        Counting { inner, stats: Arc::default(), block_budget: None, ptr_budget: None }
    }
    /// Caps live block memory at `words` words.
    pub fn with_block_budget(mut self, words: usize) -> Self {
        self.block_budget = Some(words);
        self
    }
    /// Caps live pointer arrays at `slots` slots.
    pub fn with_ptr_budget(mut self, slots: usize) -> Self {
        self.ptr_budget = Some(slots);
        self
    }

    pub fn block_usage(&self) -> Usage { self.stats.blocks.usage() }
    pub fn ptr_usage(&self) -> Usage { self.stats.ptrs.usage() }
    pub fn inner(&self) -> &A { &self.inner }
}

unsafe impl<A: BlockAllocator> BlockAllocator for Counting<A> {
    fn allocate(&mut self, words: usize) -> Result<NonNull<Word>> {
        let tally = &self.stats.blocks;
        if !tally.reserve(words, self.block_budget) {
            tally.fail();
            log::debug!("block budget of {:?} words refused {} more", self.block_budget, words);
            return Err(Error::OutOfMemory {
                bytes: words.saturating_mul(core::mem::size_of::<Word>()),
                align: BLOCK_ALIGN,
            });
        }
        match self.inner.allocate(words) {
            Ok(block) => {
                tally.commit();
                Ok(block)
            }
            Err(err) => {
                tally.unreserve(words);
                tally.fail();
                Err(err)
            }
        }
    }

    unsafe fn deallocate(&mut self, block: NonNull<Word>, words: usize) {
        self.stats.blocks.release(words);
        self.inner.deallocate(block, words)
    }
}

unsafe impl<A: PtrAllocator> PtrAllocator for Counting<A> {
    fn allocate_ptrs(&mut self, count: usize) -> Result<NonNull<BlockAddr>> {
        let tally = &self.stats.ptrs;
        if !tally.reserve(count, self.ptr_budget) {
            tally.fail();
            log::debug!("pointer budget of {:?} slots refused {} more", self.ptr_budget, count);
            return Err(Error::OutOfMemory {
                bytes: count.saturating_mul(core::mem::size_of::<BlockAddr>()),
                align: core::mem::align_of::<BlockAddr>(),
            });
        }
        match self.inner.allocate_ptrs(count) {
            Ok(ptrs) => {
                tally.commit();
                Ok(ptrs)
            }
            Err(err) => {
                tally.unreserve(count);
                tally.fail();
                Err(err)
            }
        }
    }

    unsafe fn deallocate_ptrs(&mut self, ptrs: NonNull<BlockAddr>, count: usize) {
        self.stats.ptrs.release(count);
        self.inner.deallocate_ptrs(ptrs, count)
    }
}
