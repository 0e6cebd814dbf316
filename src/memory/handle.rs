//! Owning handles for allocated blocks.
//!
//! A handle pairs a block's address with the size it was allocated at, and is
//! typed by the strategy that allocated it. Handles are returned to a
//! [`MemAlloc`](super::MemAlloc) by value; dropping one leaks its storage.

use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use super::SystemAllocator;
use crate::{BlockAddr, GapWord, Word, SET_BLOCK_SIZE};

/// One or more contiguous bit blocks.
pub struct BitBlock<A = SystemAllocator> {
    ptr: NonNull<Word>,
    words: usize,
    _marker: PhantomData<fn() -> A>,
}

impl<A> BitBlock<A> {
    /// # Safety
    ///
    /// `ptr` must own `words` initialized words allocated by an `A`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<Word>, words: usize) -> Self {
        BitBlock { ptr, words, _marker: PhantomData }
    }
    #[inline]
    pub(crate) fn into_raw(self) -> (NonNull<Word>, usize) {
        (self.ptr, self.words)
    }

    /// Words in the allocation.
    #[inline(always)]
    pub fn words(&self) -> usize { self.words }
    /// Number of [`SET_BLOCK_SIZE`] blocks in the allocation.
    #[inline(always)]
    pub fn alloc_factor(&self) -> usize { self.words / SET_BLOCK_SIZE }
    /// The block's words as native-endian bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] { bytemuck::cast_slice::<Word, u8>(&self[..]) }
}

impl<A> Deref for BitBlock<A> {
    type Target = [Word];
    #[inline(always)]
    fn deref(&self) -> &[Word] {
        // SAFETY: the handle owns `words` initialized words.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.words) }
    }
}
impl<A> DerefMut for BitBlock<A> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut [Word] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.words) }
    }
}

impl<A> fmt::Debug for BitBlock<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitBlock").field("ptr", &self.ptr).field("words", &self.words).finish()
    }
}

// SAFETY: a handle is the unique owner of its block, like a `Box<[Word]>`.
unsafe impl<A> Send for BitBlock<A> {}
unsafe impl<A> Sync for BitBlock<A> {}

/// A GAP block, sized by its level.
///
/// Dereferences to the block's run entries; see [`gap`](crate::gap) for their
/// layout. The level recorded at allocation decides how much storage is
/// released, whatever the header says by then.
pub struct GapBlock<A = SystemAllocator> {
    ptr: NonNull<Word>,
    words: usize,
    level: usize,
    _marker: PhantomData<fn() -> A>,
}

impl<A> GapBlock<A> {
    /// # Safety
    ///
    /// `ptr` must own `words` initialized words allocated by an `A`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<Word>, words: usize, level: usize) -> Self {
        GapBlock { ptr, words, level, _marker: PhantomData }
    }
    #[inline]
    pub(crate) fn into_raw(self) -> (NonNull<Word>, usize) {
        (self.ptr, self.words)
    }

    /// Level the block was allocated at.
    #[inline(always)]
    pub fn level(&self) -> usize { self.level }
    /// Words in the allocation.
    #[inline(always)]
    pub fn words(&self) -> usize { self.words }
    #[inline]
    pub fn as_words(&self) -> &[Word] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.words) }
    }
    #[inline]
    pub fn as_words_mut(&mut self) -> &mut [Word] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.words) }
    }
}

impl<A> Deref for GapBlock<A> {
    type Target = [GapWord];
    #[inline(always)]
    fn deref(&self) -> &[GapWord] { bytemuck::cast_slice(self.as_words()) }
}
impl<A> DerefMut for GapBlock<A> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut [GapWord] { bytemuck::cast_slice_mut(self.as_words_mut()) }
}

impl<A> fmt::Debug for GapBlock<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GapBlock")
            .field("ptr", &self.ptr)
            .field("words", &self.words)
            .field("level", &self.level)
            .finish()
    }
}

unsafe impl<A> Send for GapBlock<A> {}
unsafe impl<A> Sync for GapBlock<A> {}

/// An array of block addresses.
///
/// Slots start null; see [`is_valid_addr`](crate::is_valid_addr) for the
/// markers a slot may hold.
pub struct PtrBlock<P = SystemAllocator> {
    ptr: NonNull<BlockAddr>,
    len: usize,
    _marker: PhantomData<fn() -> P>,
}

impl<P> PtrBlock<P> {
    /// # Safety
    ///
    /// `ptr` must own `len` initialized addresses allocated by a `P`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<BlockAddr>, len: usize) -> Self {
        PtrBlock { ptr, len, _marker: PhantomData }
    }
    #[inline]
    pub(crate) fn into_raw(self) -> (NonNull<BlockAddr>, usize) {
        (self.ptr, self.len)
    }
}

impl<P> Deref for PtrBlock<P> {
    type Target = [BlockAddr];
    #[inline(always)]
    fn deref(&self) -> &[BlockAddr] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}
impl<P> DerefMut for PtrBlock<P> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut [BlockAddr] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<P> fmt::Debug for PtrBlock<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtrBlock").field("ptr", &self.ptr).field("len", &self.len).finish()
    }
}

// SAFETY: slots are plain addresses; the handle never dereferences them.
unsafe impl<P> Send for PtrBlock<P> {}
unsafe impl<P> Sync for PtrBlock<P> {}
