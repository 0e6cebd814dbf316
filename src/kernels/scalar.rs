//! Portable kernels, one word at a time.
//!
//! Every vector kernel has its counterpart here, and the two must agree bit
//! for bit. These also finish whatever tail a vector kernel leaves behind.

use crate::{GapWord, Word};

/// Run entries consumed per call of the GAP sum loop, matching the SSE2 wave.
pub const GAP_WAVE: usize = 16;

/// `dst[i] &= src[i]`
#[inline]
pub fn and_arr(dst: &mut [Word], src: &[Word]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) { *d &= *s; }
}

/// `dst[i] |= src[i]`
#[inline]
pub fn or_arr(dst: &mut [Word], src: &[Word]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) { *d |= *s; }
}

/// `dst[i] ^= src[i]`
#[inline]
pub fn xor_arr(dst: &mut [Word], src: &[Word]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) { *d ^= *s; }
}

/// `dst[i] &= !src[i]`
#[inline]
pub fn sub_arr(dst: &mut [Word], src: &[Word]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) { *d &= !*s; }
}

/// `dst[i] = src[i] ^ mask`
#[inline]
pub fn xor_arr_2_mask(dst: &mut [Word], src: &[Word], mask: Word) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) { *d = *s ^ mask; }
}

/// `dst[i] = !src[i] & mask`
#[inline]
pub fn andnot_arr_2_mask(dst: &mut [Word], src: &[Word], mask: Word) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) { *d = !*s & mask; }
}

#[inline]
pub fn set_block(dst: &mut [Word], value: Word) {
    dst.fill(value);
}

#[inline]
pub fn copy_block(dst: &mut [Word], src: &[Word]) {
    dst.copy_from_slice(src);
}

#[inline]
pub fn invert_arr(dst: &mut [Word]) {
    for d in dst.iter_mut() { *d ^= Word::MAX; }
}

/// Sums the lengths of set runs over `waves` waves of [`GAP_WAVE`] entries.
///
/// `pos` indexes an entry that closes a set run, so `buf[pos] - buf[pos - 1]`
/// is that run's population; every second entry after it closes another one.
/// Returns the index of the first entry not consumed.
#[inline]
pub fn gap_sum_arr(buf: &[GapWord], pos: usize, waves: usize, sum: &mut u32) -> usize {
    debug_assert!(pos >= 1);
    debug_assert!(pos - 1 + waves * GAP_WAVE <= buf.len());
    let end = pos + waves * GAP_WAVE;
    let mut acc = 0u32;
    let mut i = pos;
    while i < end {
        acc += u32::from(buf[i].wrapping_sub(buf[i - 1]));
        i += 2;
    }
    *sum += acc;
    end
}
