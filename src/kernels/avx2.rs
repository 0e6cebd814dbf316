//! 256-bit kernels.
//!
//! Same contracts as the [`sse2`](super::sse2) kernels, with AVX2 support,
//! 32 byte alignment and lengths in multiples of [`LANE_WORDS`].

#[cfg(target_arch = "x86")]
use core::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

use crate::{GapWord, Word};

/// Words per 256-bit lane.
pub const LANE_WORDS: usize = 8;
/// Run entries consumed per GAP sum wave: two lane loads of sixteen entries.
pub const GAP_WAVE: usize = 32;

const LANE_BYTES: usize = 32;

#[inline(always)]
fn lanes(words: &[Word]) -> usize {
    debug_assert_eq!(words.as_ptr() as usize % LANE_BYTES, 0, "block not aligned for 256-bit lanes");
    debug_assert_eq!(words.len() % LANE_WORDS, 0, "length not a multiple of the lane width");
    words.len() / LANE_WORDS
}

macro_rules! binary_kernel {
    ($(#[$attr:meta])* $name:ident, $d:ident, $s:ident => $op:expr) => {
        $(#[$attr])*
        #[target_feature(enable = "avx2")]
        pub unsafe fn $name(dst: &mut [Word], src: &[Word]) {
            debug_assert_eq!(dst.len(), src.len());
            let n = lanes(dst);
            let _ = lanes(src);
            let dp = dst.as_mut_ptr() as *mut __m256i;
            let sp = src.as_ptr() as *const __m256i;
            let mut i = 0;
            while i + 2 <= n {
                for k in i .. i + 2 {
                    let $s = _mm256_load_si256(sp.add(k));
                    let $d = _mm256_load_si256(dp.add(k));
                    _mm256_store_si256(dp.add(k), $op);
                }
                i += 2;
            }
            if i < n {
                let $s = _mm256_load_si256(sp.add(i));
                let $d = _mm256_load_si256(dp.add(i));
                _mm256_store_si256(dp.add(i), $op);
            }
        }
    };
}

binary_kernel!(
    /// `dst[i] &= src[i]`
    and_arr, d, s => _mm256_and_si256(d, s));
binary_kernel!(
    /// `dst[i] |= src[i]`
    or_arr, d, s => _mm256_or_si256(d, s));
binary_kernel!(
    /// `dst[i] ^= src[i]`
    xor_arr, d, s => _mm256_xor_si256(d, s));
binary_kernel!(
    /// `dst[i] &= !src[i]`
    sub_arr, d, s => _mm256_andnot_si256(s, d));

/// `dst[i] = src[i] ^ mask`
#[target_feature(enable = "avx2")]
pub unsafe fn xor_arr_2_mask(dst: &mut [Word], src: &[Word], mask: Word) {
    debug_assert_eq!(dst.len(), src.len());
    let n = lanes(src);
    let _ = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m256i;
    let sp = src.as_ptr() as *const __m256i;
    let m = _mm256_set1_epi32(mask as i32);
    for i in 0 .. n {
        _mm256_store_si256(dp.add(i), _mm256_xor_si256(_mm256_load_si256(sp.add(i)), m));
    }
}

/// `dst[i] = !src[i] & mask`
#[target_feature(enable = "avx2")]
pub unsafe fn andnot_arr_2_mask(dst: &mut [Word], src: &[Word], mask: Word) {
    debug_assert_eq!(dst.len(), src.len());
    let n = lanes(src);
    let _ = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m256i;
    let sp = src.as_ptr() as *const __m256i;
    let m = _mm256_set1_epi32(mask as i32);
    for i in 0 .. n {
        _mm256_store_si256(dp.add(i), _mm256_andnot_si256(_mm256_load_si256(sp.add(i)), m));
    }
}

#[target_feature(enable = "avx2")]
pub unsafe fn set_block(dst: &mut [Word], value: Word) {
    let n = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m256i;
    let v = _mm256_set1_epi32(value as i32);
    for i in 0 .. n {
        _mm256_store_si256(dp.add(i), v);
    }
}

/// Copies four lanes per iteration, then single lanes.
#[target_feature(enable = "avx2")]
pub unsafe fn copy_block(dst: &mut [Word], src: &[Word]) {
    debug_assert_eq!(dst.len(), src.len());
    let n = lanes(src);
    let _ = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m256i;
    let sp = src.as_ptr() as *const __m256i;
    let mut i = 0;
    while i + 4 <= n {
        let y0 = _mm256_load_si256(sp.add(i));
        let y1 = _mm256_load_si256(sp.add(i + 1));
        let y2 = _mm256_load_si256(sp.add(i + 2));
        let y3 = _mm256_load_si256(sp.add(i + 3));
        _mm256_store_si256(dp.add(i), y0);
        _mm256_store_si256(dp.add(i + 1), y1);
        _mm256_store_si256(dp.add(i + 2), y2);
        _mm256_store_si256(dp.add(i + 3), y3);
        i += 4;
    }
    while i < n {
        _mm256_store_si256(dp.add(i), _mm256_load_si256(sp.add(i)));
        i += 1;
    }
}

#[target_feature(enable = "avx2")]
pub unsafe fn invert_arr(dst: &mut [Word]) {
    let n = lanes(dst);
    let dp = dst.as_mut_ptr() as *mut __m256i;
    let ones = _mm256_set1_epi32(-1);
    for i in 0 .. n {
        _mm256_store_si256(dp.add(i), _mm256_xor_si256(_mm256_load_si256(dp.add(i)), ones));
    }
}

/// GAP run-length sum over `waves` waves of [`GAP_WAVE`] entries.
///
/// The 256-bit form of [`sse2::gap_sum_arr`](super::sse2::gap_sum_arr): eight
/// (even, odd) counter pairs instead of four.
#[target_feature(enable = "avx2")]
pub unsafe fn gap_sum_arr(buf: &[GapWord], pos: usize, waves: usize, sum: &mut u32) -> usize {
    debug_assert!(pos >= 1);
    debug_assert!(pos - 1 + waves * GAP_WAVE <= buf.len());
    let mut p = buf.as_ptr().add(pos - 1);
    let mut xcnt = _mm256_setzero_si256();
    for _ in 0 .. waves {
        let mm0 = _mm256_loadu_si256(p as *const __m256i);
        let mm1 = _mm256_loadu_si256(p.add(16) as *const __m256i);
        xcnt = _mm256_add_epi16(xcnt, _mm256_add_epi16(mm1, mm0));
        p = p.wrapping_add(GAP_WAVE);
    }
    xcnt = _mm256_sub_epi16(_mm256_srli_epi32(xcnt, 16), xcnt);

    let mut cnt = [0u16; 16];
    _mm256_storeu_si256(cnt.as_mut_ptr() as *mut __m256i, xcnt);
    *sum += cnt.iter().step_by(2).map(|c| u32::from(*c)).sum::<u32>();
    pos + waves * GAP_WAVE
}
