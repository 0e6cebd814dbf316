//! The global allocator, with block alignment.

use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use core::ptr::NonNull;

use super::{BlockAllocator, PtrAllocator};
use crate::error::{Error, Result};
use crate::{BlockAddr, Word, BLOCK_ALIGN};

/// Allocates from the global allocator.
///
/// Memory is zeroed, so a new bit block reads as empty and a new pointer block
/// holds only nulls. Zero-sized requests are rounded up to one element.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SystemAllocator;

/// Layout of a block of `words` words.
#[inline]
fn block_layout(words: usize) -> Result<Layout> {
    let count = words.max(1);
    let bytes = count
        .checked_mul(core::mem::size_of::<Word>())
        .ok_or(Error::LayoutOverflow { count })?;
    Layout::from_size_align(bytes, BLOCK_ALIGN).map_err(|_| Error::LayoutOverflow { count })
}

#[inline]
fn ptr_layout(count: usize) -> Result<Layout> {
    let count = count.max(1);
    Layout::array::<BlockAddr>(count).map_err(|_| Error::LayoutOverflow { count })
}

fn allocate_layout(layout: Layout) -> Result<NonNull<u8>> {
    // SAFETY: `layout` has a non-zero size.
    let ptr = unsafe { alloc_zeroed(layout) };
    NonNull::new(ptr).ok_or_else(|| {
        log::debug!("allocation of {} bytes (align {}) failed", layout.size(), layout.align());
        Error::OutOfMemory { bytes: layout.size(), align: layout.align() }
    })
}

unsafe impl BlockAllocator for SystemAllocator {
    #[inline]
    fn allocate(&mut self, words: usize) -> Result<NonNull<Word>> {
        allocate_layout(block_layout(words)?).map(NonNull::cast)
    }

    #[inline]
    unsafe fn deallocate(&mut self, block: NonNull<Word>, words: usize) {
        // The layout was valid when the block was allocated.
        if let Ok(layout) = block_layout(words) {
            dealloc(block.as_ptr().cast(), layout);
        }
    }
}

unsafe impl PtrAllocator for SystemAllocator {
    #[inline]
    fn allocate_ptrs(&mut self, count: usize) -> Result<NonNull<BlockAddr>> {
        // All-zero bytes are null pointers.
        allocate_layout(ptr_layout(count)?).map(NonNull::cast)
    }

    #[inline]
    unsafe fn deallocate_ptrs(&mut self, ptrs: NonNull<BlockAddr>, count: usize) {
        if let Ok(layout) = ptr_layout(count) {
            dealloc(ptrs.as_ptr().cast(), layout);
        }
    }
}
