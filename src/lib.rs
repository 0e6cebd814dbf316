//! Block memory and block kernels for compressed bitsets.
//!
//! A compressed bitset splits its bit space into segments of 2^16 bits. Each
//! segment is stored as a dense bit block, as a run-length encoded GAP block,
//! or not at all. This crate provides the pieces underneath that policy:
//!
//! * [`memory`]: aligned allocation of bit blocks, GAP blocks and pointer
//!   arrays, behind swappable strategies and the [`MemAlloc`] adapter.
//! * [`gap`]: GAP block geometry (level lengths, live capacity) and the
//!   helpers a container needs to read and reset GAP blocks.
//! * [`kernels`]: bulk bitwise algebra, fill, copy, inversion and GAP
//!   population counting, with 128-bit and 256-bit vector versions that are
//!   bit-for-bit equivalent to their scalar versions.
//!
//! ```
//! use bitblocks::{gap, Kernels, GapLevels, StandardAllocator};
//!
//! let mut alloc = StandardAllocator::default();
//! let kernels = Kernels::detect();
//!
//! let mut a = alloc.alloc_bit_block().unwrap();
//! let mut b = alloc.alloc_bit_block().unwrap();
//! kernels.set_block(&mut a, 0xF0F0_F0F0);
//! kernels.set_block(&mut b, 0xFF00_FF00);
//! kernels.and_arr(&mut a, &b);
//! assert!(a.iter().all(|w| *w == 0xF000_F000));
//!
//! let levels = GapLevels::default();
//! let g = alloc.alloc_gap_block(1, &levels).unwrap();
//! assert_eq!(gap::gap_bit_count(&g, &kernels), 0);
//!
//! alloc.free_gap_block(g, &levels);
//! alloc.free_bit_block(a);
//! alloc.free_bit_block(b);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod gap;
pub mod kernels;
pub mod memory;

pub use error::{Error, Result};
pub use gap::GapLevels;
pub use kernels::{KernelSet, Kernels};
pub use memory::{BitBlock, GapBlock, PtrBlock};
pub use memory::{BlockAllocator, PtrAllocator};
pub use memory::{BlockPool, Counting, PoolConfig, SystemAllocator, Usage};
pub use memory::{MemAlloc, StandardAllocator};

/// The unit every bit block is made of.
pub type Word = u32;
/// One run-length entry of a GAP block.
pub type GapWord = u16;
/// One slot of a pointer block.
pub type BlockAddr = *mut Word;

/// Bits in one [`Word`].
pub const WORD_BITS: usize = 32;
/// Words in one bit block (2^16 bits).
pub const SET_BLOCK_SIZE: usize = 2048;
/// Bits in one bit block, and the bit span of one GAP block.
pub const GAP_MAX_BITS: usize = 65536;
/// Slots in one pointer block.
pub const SET_ARRAY_SIZE: usize = 256;

/// Number of GAP levels.
pub const GAP_LEVELS: usize = 4;
/// Largest GAP block, in run entries (header included).
pub const GAP_MAX_BUFF_LEN: usize = 1280;
/// Default level-length table, in run entries.
pub const GAP_LEVEL_LEN_DEFAULT: [GapWord; GAP_LEVELS] = [128, 256, 512, GAP_MAX_BUFF_LEN as GapWord];
/// Run entries packed in one [`Word`].
pub const GAP_WORDS_PER_WORD: usize = core::mem::size_of::<Word>() / core::mem::size_of::<GapWord>();

/// Alignment of every bit and GAP block, wide enough for 256-bit lanes.
pub const BLOCK_ALIGN: usize = 32;

/// Pointer-block marker for a fully set block that owns no storage.
pub const FULL_BLOCK_FAKE_ADDR: usize = 0xFFFF_FFFF_FEFF_FFFFu64 as usize;

/// True when a pointer-block slot holds a fully set block marker.
#[inline(always)]
pub fn is_full_block_addr(addr: BlockAddr) -> bool {
    addr as usize == FULL_BLOCK_FAKE_ADDR
}

/// True when a pointer-block slot references real block storage.
#[inline(always)]
pub fn is_valid_addr(addr: BlockAddr) -> bool {
    !addr.is_null() && !is_full_block_addr(addr)
}
