//! Bulk kernels over bit blocks and GAP buffers.
//!
//! Each operation exists in up to three forms: [`scalar`], [`sse2`] (128-bit
//! lanes) and [`avx2`] (256-bit lanes). The vector forms are `unsafe` and
//! demand aligned, lane-multiple input; the scalar forms accept anything. The
//! [`Kernels`] front end picks a form once, per [`KernelSet`], and splits
//! each call into a vector-sized head and a scalar tail, so results never
//! depend on which form ran.

pub mod scalar;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod sse2;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod avx2;

use crate::{GapWord, Word};

/// A family of kernel implementations, by lane width.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KernelSet {
    /// One word at a time; available everywhere.
    Scalar,
    /// 128-bit lanes.
    Sse2,
    /// 256-bit lanes.
    Avx2,
}

impl KernelSet {
    /// Probes the CPU for the widest supported kernel set.
    ///
    /// With `std` this is a runtime probe. Without it, only the features
    /// enabled at compile time are considered.
    pub fn detect() -> Self {
        if KernelSet::Avx2.is_supported() { KernelSet::Avx2 }
        else if KernelSet::Sse2.is_supported() { KernelSet::Sse2 }
        else { KernelSet::Scalar }
    }

    /// The result of [`KernelSet::detect`], probed once per process.
    #[cfg(feature = "std")]
    pub fn get() -> Self {
        static DETECTED: std::sync::OnceLock<KernelSet> = std::sync::OnceLock::new();
        *DETECTED.get_or_init(|| {
            let set = KernelSet::detect();
            log::debug!("block kernels: using {:?}", set);
            set
        })
    }
    /// The result of [`KernelSet::detect`]; a compile-time answer without `std`.
    #[cfg(not(feature = "std"))]
    #[inline(always)]
    pub fn get() -> Self { KernelSet::detect() }

    /// Whether the current CPU can run this set.
    pub fn is_supported(self) -> bool {
        match self {
            KernelSet::Scalar => true,
            #[cfg(all(feature = "std", any(target_arch = "x86", target_arch = "x86_64")))]
            KernelSet::Sse2 => std::is_x86_feature_detected!("sse2"),
            #[cfg(all(feature = "std", any(target_arch = "x86", target_arch = "x86_64")))]
            KernelSet::Avx2 => std::is_x86_feature_detected!("avx2"),
            #[cfg(all(not(feature = "std"), any(target_arch = "x86", target_arch = "x86_64")))]
            KernelSet::Sse2 => cfg!(target_feature = "sse2"),
            #[cfg(all(not(feature = "std"), any(target_arch = "x86", target_arch = "x86_64")))]
            KernelSet::Avx2 => cfg!(target_feature = "avx2"),
            #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
            KernelSet::Sse2 | KernelSet::Avx2 => false,
        }
    }

    /// Words processed together by one vector instruction.
    #[inline(always)]
    pub fn lane_words(self) -> usize {
        match self {
            KernelSet::Scalar => 1,
            KernelSet::Sse2 => 4,
            KernelSet::Avx2 => 8,
        }
    }

    /// Required start alignment for vector kernels, in bytes.
    #[inline(always)]
    pub fn lane_bytes(self) -> usize {
        self.lane_words() * core::mem::size_of::<Word>()
    }

    /// Run entries consumed per wave of [`Kernels::gap_sum_arr`].
    #[inline(always)]
    pub fn gap_wave(self) -> usize {
        match self {
            KernelSet::Scalar | KernelSet::Sse2 => 16,
            KernelSet::Avx2 => 32,
        }
    }
}

/// Safe, dispatching entry points for every block kernel.
///
/// Word operands must have equal lengths (checked once per call). Input of any
/// alignment and length is accepted: the lane-aligned head runs on the chosen
/// vector set and the rest, or everything when the start is misaligned, runs
/// on the scalar kernels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Kernels {
    set: KernelSet,
}

impl Default for Kernels {
    fn default() -> Self { Self::detect() }
}

/// Generates a `dst op= src` dispatcher.
macro_rules! dispatch_binary {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[inline]
        pub fn $name(&self, dst: &mut [Word], src: &[Word]) {
            assert_eq!(dst.len(), src.len(), "kernel operands differ in length");
            let head = self.head(&[dst.as_ptr(), src.as_ptr()], dst.len());
            let (dst_head, dst_tail) = dst.split_at_mut(head);
            let (src_head, src_tail) = src.split_at(head);
            match self.set {
                #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
                KernelSet::Avx2 if head > 0 => unsafe { avx2::$name(dst_head, src_head) },
                #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
                KernelSet::Sse2 if head > 0 => unsafe { sse2::$name(dst_head, src_head) },
                _ => scalar::$name(dst_head, src_head),
            }
            scalar::$name(dst_tail, src_tail);
        }
    };
}

/// Generates a `dst = op(src, mask)` dispatcher.
macro_rules! dispatch_mask {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[inline]
        pub fn $name(&self, dst: &mut [Word], src: &[Word], mask: Word) {
            assert_eq!(dst.len(), src.len(), "kernel operands differ in length");
            let head = self.head(&[dst.as_ptr(), src.as_ptr()], dst.len());
            let (dst_head, dst_tail) = dst.split_at_mut(head);
            let (src_head, src_tail) = src.split_at(head);
            match self.set {
                #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
                KernelSet::Avx2 if head > 0 => unsafe { avx2::$name(dst_head, src_head, mask) },
                #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
                KernelSet::Sse2 if head > 0 => unsafe { sse2::$name(dst_head, src_head, mask) },
                _ => scalar::$name(dst_head, src_head, mask),
            }
            scalar::$name(dst_tail, src_tail, mask);
        }
    };
}

impl Kernels {
    /// Kernels for the set detected on this CPU.
    #[inline]
    pub fn detect() -> Self { Kernels { set: KernelSet::get() } }
    /// Scalar kernels only.
    #[inline]
    pub fn scalar() -> Self { Kernels { set: KernelSet::Scalar } }
    /// Kernels for `set`, if this CPU supports it.
    pub fn new(set: KernelSet) -> Option<Self> {
        set.is_supported().then_some(Kernels { set })
    }

    #[inline(always)]
    pub fn set(&self) -> KernelSet { self.set }
    /// Run entries consumed per wave of [`Kernels::gap_sum_arr`].
    #[inline(always)]
    pub fn gap_wave(&self) -> usize { self.set.gap_wave() }

    /// Length of the prefix the vector kernels may take: all of it for scalar,
    /// none when any operand is misaligned, else the lane-multiple prefix.
    /// A zero head never reaches a vector kernel.
    #[inline(always)]
    fn head(&self, starts: &[*const Word], len: usize) -> usize {
        let lane = self.set.lane_words();
        if lane == 1 { return len; }
        let align = self.set.lane_bytes();
        if starts.iter().any(|p| *p as usize % align != 0) { return 0; }
        len - len % lane
    }

    dispatch_binary!(
        /// `dst[i] &= src[i]`
        and_arr);
    dispatch_binary!(
        /// `dst[i] |= src[i]`
        or_arr);
    dispatch_binary!(
        /// `dst[i] ^= src[i]`
        xor_arr);
    dispatch_binary!(
        /// `dst[i] &= !src[i]` (AND-NOT; the negation applies to `src`).
        sub_arr);
    dispatch_binary!(
        /// Verbatim copy of `src` into `dst`.
        copy_block);
    dispatch_mask!(
        /// `dst[i] = src[i] ^ mask`
        xor_arr_2_mask);
    dispatch_mask!(
        /// `dst[i] = !src[i] & mask`
        andnot_arr_2_mask);

    /// Sets every word of `dst` to `value`.
    #[inline]
    pub fn set_block(&self, dst: &mut [Word], value: Word) {
        let head = self.head(&[dst.as_ptr()], dst.len());
        let (dst_head, dst_tail) = dst.split_at_mut(head);
        match self.set {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            KernelSet::Avx2 if head > 0 => unsafe { avx2::set_block(dst_head, value) },
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            KernelSet::Sse2 if head > 0 => unsafe { sse2::set_block(dst_head, value) },
            _ => scalar::set_block(dst_head, value),
        }
        scalar::set_block(dst_tail, value);
    }

    /// Logical NOT of every word, in place.
    #[inline]
    pub fn invert_arr(&self, dst: &mut [Word]) {
        let head = self.head(&[dst.as_ptr()], dst.len());
        let (dst_head, dst_tail) = dst.split_at_mut(head);
        match self.set {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            KernelSet::Avx2 if head > 0 => unsafe { avx2::invert_arr(dst_head) },
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            KernelSet::Sse2 if head > 0 => unsafe { sse2::invert_arr(dst_head) },
            _ => scalar::invert_arr(dst_head),
        }
        scalar::invert_arr(dst_tail);
    }

    /// Adds to `sum` the population of the set runs closed by entries
    /// `pos, pos + 2, ..` over `waves` waves of [`Kernels::gap_wave`] entries.
    ///
    /// Returns the index of the first unconsumed entry; the caller finishes
    /// the remainder, which is shorter than one wave.
    ///
    /// # Panics
    ///
    /// If `pos` is zero or the waves would read past the end of `buf`.
    #[inline]
    pub fn gap_sum_arr(&self, buf: &[GapWord], pos: usize, waves: usize, sum: &mut u32) -> usize {
        assert!(pos >= 1 && pos - 1 + waves * self.gap_wave() <= buf.len(), "GAP waves exceed the buffer");
        match self.set {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            KernelSet::Avx2 => unsafe { avx2::gap_sum_arr(buf, pos, waves, sum) },
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            KernelSet::Sse2 => unsafe { sse2::gap_sum_arr(buf, pos, waves, sum) },
            _ => scalar::gap_sum_arr(buf, pos, waves, sum),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::vec::Vec;

    use crate::{SET_BLOCK_SIZE, StandardAllocator};

    /// Every kernel set this CPU can run, scalar first.
    fn supported() -> Vec<Kernels> {
        [KernelSet::Scalar, KernelSet::Sse2, KernelSet::Avx2]
            .into_iter()
            .filter_map(Kernels::new)
            .collect()
    }

    fn pattern(seed: u32, len: usize) -> Vec<Word> {
        let mut x = seed | 1;
        (0 .. len).map(|_| { x ^= x << 13; x ^= x >> 17; x ^= x << 5; x }).collect()
    }

    #[test]
    fn detect_is_supported() {
        assert!(KernelSet::get().is_supported());
        assert!(Kernels::new(KernelSet::Scalar).is_some());
        assert_eq!(Kernels::detect().set(), KernelSet::get());
    }

    #[test]
    fn sets_agree_on_blocks() {
        let mut alloc = StandardAllocator::default();
        let mut expect = alloc.alloc_bit_block().unwrap();
        let mut actual = alloc.alloc_bit_block().unwrap();
        let mut src = alloc.alloc_bit_block().unwrap();
        let a = pattern(7, SET_BLOCK_SIZE);
        let b = pattern(11, SET_BLOCK_SIZE);
        src.copy_from_slice(&b);

        let scalar = Kernels::scalar();
        for kernels in supported() {
            // One lane, several lanes, a whole block, and ragged tails.
            for len in [8, 24, 37, 1001, SET_BLOCK_SIZE] {
                let ops: [(&str, fn(&Kernels, &mut [Word], &[Word])); 5] = [
                    ("and", Kernels::and_arr),
                    ("or", Kernels::or_arr),
                    ("xor", Kernels::xor_arr),
                    ("sub", Kernels::sub_arr),
                    ("copy", Kernels::copy_block),
                ];
                for (name, op) in ops {
                    expect[..len].copy_from_slice(&a[..len]);
                    actual[..len].copy_from_slice(&a[..len]);
                    op(&scalar, &mut expect[..len], &src[..len]);
                    op(&kernels, &mut actual[..len], &src[..len]);
                    assert_eq!(&expect[..len], &actual[..len], "{} on {:?}, len {}", name, kernels.set(), len);
                }

                scalar.xor_arr_2_mask(&mut expect[..len], &src[..len], 0xDEAD_BEEF);
                kernels.xor_arr_2_mask(&mut actual[..len], &src[..len], 0xDEAD_BEEF);
                assert_eq!(&expect[..len], &actual[..len]);

                scalar.andnot_arr_2_mask(&mut expect[..len], &src[..len], 0x0FF0_0FF0);
                kernels.andnot_arr_2_mask(&mut actual[..len], &src[..len], 0x0FF0_0FF0);
                assert_eq!(&expect[..len], &actual[..len]);

                scalar.invert_arr(&mut expect[..len]);
                kernels.invert_arr(&mut actual[..len]);
                assert_eq!(&expect[..len], &actual[..len]);

                scalar.set_block(&mut expect[..len], 0x5555_AAAA);
                kernels.set_block(&mut actual[..len], 0x5555_AAAA);
                assert_eq!(&expect[..len], &actual[..len]);
            }
        }

        alloc.free_bit_block(expect);
        alloc.free_bit_block(actual);
        alloc.free_bit_block(src);
    }

    #[test]
    fn misaligned_input_falls_back() {
        let mut alloc = StandardAllocator::default();
        let mut dst = alloc.alloc_bit_block().unwrap();
        let mut src = alloc.alloc_bit_block().unwrap();
        for kernels in supported() {
            let a = pattern(3, 100);
            let b = pattern(5, 100);
            dst[1..101].copy_from_slice(&a);
            src[3..103].copy_from_slice(&b);
            kernels.or_arr(&mut dst[1..101], &src[3..103]);
            for i in 0 .. 100 {
                assert_eq!(dst[1 + i], a[i] | b[i]);
            }
        }
        alloc.free_bit_block(dst);
        alloc.free_bit_block(src);
    }

    #[test]
    fn unaligned_subslices_match_scalar() {
        // Offsets of one to seven words put every operand off its lane boundary.
        let a = pattern(23, 300);
        let b = pattern(29, 300);
        let scalar = Kernels::scalar();
        for kernels in supported() {
            for offset in 1 .. 8 {
                let mut expect = a.clone();
                let mut actual = a.clone();
                scalar.xor_arr(&mut expect[offset..], &b[offset..]);
                kernels.xor_arr(&mut actual[offset..], &b[offset..]);
                assert_eq!(expect, actual);

                scalar.andnot_arr_2_mask(&mut expect[offset..], &b[offset..], 0x00FF_FF00);
                kernels.andnot_arr_2_mask(&mut actual[offset..], &b[offset..], 0x00FF_FF00);
                assert_eq!(expect, actual);

                scalar.set_block(&mut expect[offset..], 0xA5A5_A5A5);
                kernels.set_block(&mut actual[offset..], 0xA5A5_A5A5);
                scalar.invert_arr(&mut expect[offset..]);
                kernels.invert_arr(&mut actual[offset..]);
                assert_eq!(expect, actual, "{:?}, offset {}", kernels.set(), offset);
            }
        }
    }

    #[test]
    fn fill_then_invert() {
        let mut alloc = StandardAllocator::default();
        let mut block = alloc.alloc_bit_block().unwrap();
        for kernels in supported() {
            kernels.set_block(&mut block, 0);
            kernels.set_block(&mut block, Word::MAX);
            kernels.invert_arr(&mut block);
            assert!(block.iter().all(|w| *w == 0));
        }
        alloc.free_bit_block(block);
    }

    #[test]
    fn andnot_mask_identity() {
        // (!src & mask) ^ mask == src & mask
        let src = pattern(19, 64);
        let mask = 0xF0F0_3C3C;
        for kernels in supported() {
            let mut dst = alloc::vec![0; 64];
            kernels.andnot_arr_2_mask(&mut dst, &src, mask);
            let inverse = dst.clone();
            kernels.xor_arr_2_mask(&mut dst, &inverse, mask);
            for i in 0 .. 64 {
                assert_eq!(dst[i], src[i] & mask);
            }
        }
    }

    #[test]
    fn gap_sum_sets_agree() {
        // Ascending run ends, 2..=400 step 3.
        let mut buf: Vec<GapWord> = (0 .. 140u16).map(|i| 2 + 3 * i).collect();
        buf[0] = 0;
        for kernels in supported() {
            let wave = kernels.gap_wave();
            let waves = (buf.len() - 2) / wave;
            let mut sum = 0;
            let tail = kernels.gap_sum_arr(&buf, 2, waves, &mut sum);
            assert_eq!(tail, 2 + waves * wave);

            let mut expect = 0;
            let mut i = 2;
            while i < tail { expect += u32::from(buf[i] - buf[i - 1]); i += 2; }
            assert_eq!(sum, expect, "{:?}", kernels.set());
        }
    }

    #[test]
    #[should_panic]
    fn length_mismatch_panics() {
        let mut dst = [0u32; 8];
        Kernels::detect().and_arr(&mut dst, &[0u32; 4]);
    }
}
