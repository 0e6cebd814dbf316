#![no_std]

use bitblocks::{gap, GapLevels, Kernels, StandardAllocator};

/// Population of a fresh, fully set GAP block.
pub fn full_gap_count() -> Option<u32> {
    let mut alloc = StandardAllocator::default();
    let levels = GapLevels::default();
    let mut block = alloc.alloc_gap_block(0, &levels).ok()?;
    gap::gap_set_all(&mut block, true);
    let count = gap::gap_bit_count(&block, &Kernels::detect());
    alloc.free_gap_block(block, &levels);
    Some(count)
}
