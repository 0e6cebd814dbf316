//! 128-bit kernels.
//!
//! All functions here are `unsafe`: the CPU must support SSE2, word slices must
//! start on a 16 byte boundary, and their lengths must be multiples of
//! [`LANE_WORDS`]. Slices handed out by this crate's allocators satisfy the
//! alignment; [`Kernels`](super::Kernels) checks the rest before calling in.

#[cfg(target_arch = "x86")]
use core::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

use crate::{GapWord, Word};

/// Words per 128-bit lane.
pub const LANE_WORDS: usize = 4;
/// Run entries consumed per GAP sum wave: two lane loads of eight entries.
pub const GAP_WAVE: usize = 16;

const LANE_BYTES: usize = 16;

#[inline(always)]
fn lanes(words: &[Word]) -> usize {
    debug_assert_eq!(words.as_ptr() as usize % LANE_BYTES, 0, "block not aligned for 128-bit lanes");
    debug_assert_eq!(words.len() % LANE_WORDS, 0, "length not a multiple of the lane width");
    words.len() / LANE_WORDS
}

/// Generates an in-place `dst = op(dst, src)` kernel, unrolled four lanes deep.
macro_rules! binary_kernel {
    ($(#[$attr:meta])* $name:ident, $d:ident, $s:ident => $op:expr) => {
        $(#[$attr])*
        #[target_feature(enable = "sse2")]
        pub unsafe fn $name(dst: &mut [Word], src: &[Word]) {
            debug_assert_eq!(dst.len(), src.len());
            let n = lanes(dst);
            let _ = lanes(src);
            let dp = dst.as_mut_ptr() as *mut __m128i;
            let sp = src.as_ptr() as *const __m128i;
            let mut i = 0;
            while i + 4 <= n {
                _mm_prefetch(sp.wrapping_add(i + 32) as *const i8, _MM_HINT_NTA);
                for k in i .. i + 4 {
                    let $s = _mm_load_si128(sp.add(k));
                    let $d = _mm_load_si128(dp.add(k));
                    _mm_store_si128(dp.add(k), $op);
                }
                i += 4;
            }
            while i < n {
                let $s = _mm_load_si128(sp.add(i));
                let $d = _mm_load_si128(dp.add(i));
                _mm_store_si128(dp.add(i), $op);
                i += 1;
            }
        }
    };
}

binary_kernel!(
    /// `dst[i] &= src[i]`
    and_arr, d, s => _mm_and_si128(d, s));
binary_kernel!(
    /// `dst[i] |= src[i]`
    or_arr, d, s => _mm_or_si128(d, s));
binary_kernel!(
    /// `dst[i] ^= src[i]`
    xor_arr, d, s => _mm_xor_si128(d, s));
binary_kernel!(
    /// `dst[i] &= !src[i]`; `_mm_andnot_si128` negates its first operand.
    sub_arr, d, s => _mm_andnot_si128(s, d));

/// `dst[i] = src[i] ^ mask`
#[target_feature(enable = "sse2")]
pub unsafe fn xor_arr_2_mask(dst: &mut [Word], src: &[Word], mask: Word) {
    debug_assert_eq!(dst.len(), src.len());
    let n = lanes(src);
    let _ = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m128i;
    let sp = src.as_ptr() as *const __m128i;
    let m = _mm_set1_epi32(mask as i32);
    for i in 0 .. n {
        _mm_store_si128(dp.add(i), _mm_xor_si128(_mm_load_si128(sp.add(i)), m));
    }
}

/// `dst[i] = !src[i] & mask`
#[target_feature(enable = "sse2")]
pub unsafe fn andnot_arr_2_mask(dst: &mut [Word], src: &[Word], mask: Word) {
    debug_assert_eq!(dst.len(), src.len());
    let n = lanes(src);
    let _ = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m128i;
    let sp = src.as_ptr() as *const __m128i;
    let m = _mm_set1_epi32(mask as i32);
    for i in 0 .. n {
        _mm_store_si128(dp.add(i), _mm_andnot_si128(_mm_load_si128(sp.add(i)), m));
    }
}

#[target_feature(enable = "sse2")]
pub unsafe fn set_block(dst: &mut [Word], value: Word) {
    let n = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m128i;
    let v = _mm_set1_epi32(value as i32);
    for i in 0 .. n {
        _mm_store_si128(dp.add(i), v);
    }
}

/// Copies eight lanes per iteration, then single lanes.
#[target_feature(enable = "sse2")]
pub unsafe fn copy_block(dst: &mut [Word], src: &[Word]) {
    debug_assert_eq!(dst.len(), src.len());
    let n = lanes(src);
    let _ = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m128i;
    let sp = src.as_ptr() as *const __m128i;
    let mut i = 0;
    while i + 8 <= n {
        _mm_prefetch(sp.wrapping_add(i + 32) as *const i8, _MM_HINT_NTA);
        let x0 = _mm_load_si128(sp.add(i));
        let x1 = _mm_load_si128(sp.add(i + 1));
        let x2 = _mm_load_si128(sp.add(i + 2));
        let x3 = _mm_load_si128(sp.add(i + 3));
        _mm_store_si128(dp.add(i), x0);
        _mm_store_si128(dp.add(i + 1), x1);
        _mm_store_si128(dp.add(i + 2), x2);
        _mm_store_si128(dp.add(i + 3), x3);
        let x4 = _mm_load_si128(sp.add(i + 4));
        let x5 = _mm_load_si128(sp.add(i + 5));
        let x6 = _mm_load_si128(sp.add(i + 6));
        let x7 = _mm_load_si128(sp.add(i + 7));
        _mm_store_si128(dp.add(i + 4), x4);
        _mm_store_si128(dp.add(i + 5), x5);
        _mm_store_si128(dp.add(i + 6), x6);
        _mm_store_si128(dp.add(i + 7), x7);
        i += 8;
    }
    while i < n {
        _mm_store_si128(dp.add(i), _mm_load_si128(sp.add(i)));
        i += 1;
    }
}

#[target_feature(enable = "sse2")]
pub unsafe fn invert_arr(dst: &mut [Word]) {
    let n = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m128i;
    let ones = _mm_set1_epi32(-1);
    for i in 0 .. n {
        _mm_prefetch(dp.wrapping_add(i + 32) as *const i8, _MM_HINT_NTA);
        _mm_store_si128(dp.add(i), _mm_xor_si128(_mm_load_si128(dp.add(i)), ones));
    }
}

/// GAP run-length sum over `waves` waves of [`GAP_WAVE`] entries.
///
/// Each wave loads entries `pos - 1 .. pos + 15` as two unaligned lanes and adds
/// them pairwise into 16-bit counters. At the end, each 32-bit lane holds an
/// (even, odd) counter pair whose difference is the population of the set runs
/// it saw. Returns the index of the first entry not consumed.
#[target_feature(enable = "sse2")]
pub unsafe fn gap_sum_arr(buf: &[GapWord], pos: usize, waves: usize, sum: &mut u32) -> usize {
    debug_assert!(pos >= 1);
    debug_assert!(pos - 1 + waves * GAP_WAVE <= buf.len());
    let mut p = buf.as_ptr().add(pos - 1);
    let mut xcnt = _mm_setzero_si128();
    for _ in 0 .. waves {
        let mm0 = _mm_loadu_si128(p as *const __m128i);
        let mm1 = _mm_loadu_si128(p.add(8) as *const __m128i);
        xcnt = _mm_add_epi16(xcnt, _mm_add_epi16(mm1, mm0));
        p = p.wrapping_add(GAP_WAVE);
    }
    xcnt = _mm_sub_epi16(_mm_srli_epi32(xcnt, 16), xcnt);

    let mut cnt = [0u16; 8];
    _mm_storeu_si128(cnt.as_mut_ptr() as *mut __m128i, xcnt);
    *sum += u32::from(cnt[0]) + u32::from(cnt[2]) + u32::from(cnt[4]) + u32::from(cnt[6]);
    pos + waves * GAP_WAVE
}
