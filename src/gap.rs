//! GAP blocks: run-length encoded segments of [`GAP_MAX_BITS`] bits.
//!
//! A GAP block is a `[GapWord]` buffer. Entry 0 is a header:
//!
//! * bit 0: value of the first run,
//! * bits 1-2: level, an index into a [`GapLevels`] table,
//! * bits 3-15: index of the last entry.
//!
//! Entries `1 ..= last` are the inclusive end positions of consecutive runs,
//! strictly ascending, with the final entry always `GAP_MAX_BITS - 1`. Runs
//! alternate in value starting from the header's bit 0.
//!
//! The level decides the buffer's footprint; an empty block still occupies its
//! level's full length.

use crate::error::{Error, Result};
use crate::kernels::Kernels;
use crate::{GapWord, Word, GAP_LEVELS, GAP_LEVEL_LEN_DEFAULT, GAP_MAX_BITS, GAP_MAX_BUFF_LEN, GAP_WORDS_PER_WORD, WORD_BITS};

/// Entries kept in reserve below a level's length before a block must grow.
pub const GAP_RESERVE: usize = 4;

const LEVEL_MASK: GapWord = 0b110;
const LAST_SHIFT: u32 = 3;

/// A validated GAP level-length table, in run entries (header included).
///
/// Lengths are strictly increasing, even, at least 8 and at most
/// [`GAP_MAX_BUFF_LEN`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "[GapWord; GAP_LEVELS]", into = "[GapWord; GAP_LEVELS]"))]
pub struct GapLevels([GapWord; GAP_LEVELS]);

impl GapLevels {
    /// Validates `table` as a level-length table.
    pub fn new(table: [GapWord; GAP_LEVELS]) -> Result<Self> {
        for len in table {
            if len % 2 != 0 {
                return Err(Error::InvalidGapLevels("level lengths must be even"));
            }
            if usize::from(len) < 2 * GAP_RESERVE {
                return Err(Error::InvalidGapLevels("level length below the minimum of 8"));
            }
            if usize::from(len) > GAP_MAX_BUFF_LEN {
                return Err(Error::InvalidGapLevels("level length above GAP_MAX_BUFF_LEN"));
            }
        }
        if !table.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::InvalidGapLevels("level lengths must strictly increase"));
        }
        Ok(GapLevels(table))
    }

    /// Run entries held by a block at `level`.
    ///
    /// Panics if `level >= GAP_LEVELS`.
    #[inline(always)]
    pub fn len(&self, level: usize) -> usize { usize::from(self.0[level]) }

    #[inline(always)]
    pub fn as_array(&self) -> &[GapWord; GAP_LEVELS] { &self.0 }
}

impl Default for GapLevels {
    fn default() -> Self { GapLevels(GAP_LEVEL_LEN_DEFAULT) }
}

impl TryFrom<[GapWord; GAP_LEVELS]> for GapLevels {
    type Error = Error;
    fn try_from(table: [GapWord; GAP_LEVELS]) -> Result<Self> { GapLevels::new(table) }
}

impl From<GapLevels> for [GapWord; GAP_LEVELS] {
    fn from(levels: GapLevels) -> Self { levels.0 }
}

/// Level recorded in the header.
#[inline(always)]
pub fn gap_level(buf: &[GapWord]) -> usize {
    usize::from((buf[0] & LEVEL_MASK) >> 1)
}

/// Records `level` in the header, leaving the rest of it untouched.
#[inline(always)]
pub fn set_gap_level(buf: &mut [GapWord], level: usize) {
    debug_assert!(level < GAP_LEVELS);
    buf[0] = (buf[0] & !LEVEL_MASK) | ((level as GapWord) << 1);
}

/// Value of the first run.
#[inline(always)]
pub fn gap_start_bit(buf: &[GapWord]) -> bool {
    buf[0] & 1 == 1
}

/// Index of the last entry.
#[inline(always)]
pub fn gap_last(buf: &[GapWord]) -> usize {
    usize::from(buf[0] >> LAST_SHIFT)
}

/// Entries in use, header included.
#[inline(always)]
pub fn gap_length(buf: &[GapWord]) -> usize {
    gap_last(buf) + 1
}

/// Words occupied by a block at `level`.
#[inline(always)]
pub fn gap_level_words(level: usize, levels: &GapLevels) -> usize {
    levels.len(level) / GAP_WORDS_PER_WORD
}

/// Entries a block can hold at its recorded level.
#[inline(always)]
pub fn gap_capacity(buf: &[GapWord], levels: &GapLevels) -> usize {
    levels.len(gap_level(buf))
}

/// Words occupied by a block at its recorded level.
#[inline(always)]
pub fn gap_capacity_words(buf: &[GapWord], levels: &GapLevels) -> usize {
    gap_level_words(gap_level(buf), levels)
}

/// Entries a block may use before it must move up a level.
#[inline(always)]
pub fn gap_limit(buf: &[GapWord], levels: &GapLevels) -> usize {
    gap_capacity(buf, levels) - GAP_RESERVE
}

/// Smallest level whose limit admits a block of `len` entries.
///
/// `None` means no level does, and the segment belongs in a bit block.
pub fn gap_calc_level(len: usize, levels: &GapLevels) -> Option<usize> {
    (0 .. GAP_LEVELS).find(|level| len <= levels.len(*level) - GAP_RESERVE)
}

/// Resets the block to a single run of `value`, keeping its level.
#[inline]
pub fn gap_set_all(buf: &mut [GapWord], value: bool) {
    buf[0] = (buf[0] & LEVEL_MASK) | GapWord::from(value) | (1 << LAST_SHIFT);
    buf[1] = (GAP_MAX_BITS - 1) as GapWord;
}

/// Value of bit `pos`.
pub fn gap_test(buf: &[GapWord], pos: u16) -> bool {
    let runs = &buf[1 ..= gap_last(buf)];
    let run = runs.partition_point(|end| *end < pos);
    gap_start_bit(buf) ^ (run % 2 == 1)
}

/// Expands a GAP block into the bit block `dst`.
///
/// Bit `i` lives in word `i / 32` at position `i % 32`.
pub fn gap_to_bits(dst: &mut [Word], buf: &[GapWord], kernels: &Kernels) {
    debug_assert!(dst.len() * WORD_BITS >= GAP_MAX_BITS);
    kernels.set_block(dst, 0);
    let mut value = gap_start_bit(buf);
    let mut start = 0usize;
    for end in &buf[1 ..= gap_last(buf)] {
        let end = usize::from(*end);
        if value {
            set_range(dst, start, end, kernels);
        }
        value = !value;
        start = end + 1;
    }
}

/// Sets bits `from ..= to`.
fn set_range(dst: &mut [Word], from: usize, to: usize, kernels: &Kernels) {
    let (first, last) = (from / WORD_BITS, to / WORD_BITS);
    let head = Word::MAX << (from % WORD_BITS);
    let tail = Word::MAX >> (WORD_BITS - 1 - to % WORD_BITS);
    if first == last {
        dst[first] |= head & tail;
        return;
    }
    dst[first] |= head;
    kernels.set_block(&mut dst[first + 1 .. last], Word::MAX);
    dst[last] |= tail;
}

/// Encodes the bit block `src` into `dst`, keeping the level in `dst`'s header.
///
/// Returns the encoded length (entries, header included), or `None` if it
/// would exceed `limit` entries, in which case `dst` is unspecified apart from
/// its level bits.
pub fn bits_to_gap(dst: &mut [GapWord], src: &[Word], limit: usize) -> Option<usize> {
    debug_assert!(src.len() * WORD_BITS >= GAP_MAX_BITS);
    let limit = limit.min(dst.len());
    let start = src[0] & 1 == 1;
    let mut value = start;
    let mut len = 1;
    for (index, word) in src[.. GAP_MAX_BITS / WORD_BITS].iter().enumerate() {
        // Bits that differ from their predecessor mark run boundaries.
        let carry = if value { 1 } else { 0 };
        let mut edges = word ^ ((word << 1) | carry);
        value = word >> (WORD_BITS - 1) == 1;
        while edges != 0 {
            let bit = index * WORD_BITS + edges.trailing_zeros() as usize;
            if bit > 0 {
                if len >= limit { return None; }
                dst[len] = (bit - 1) as GapWord;
                len += 1;
            }
            edges &= edges - 1;
        }
    }
    if len >= limit { return None; }
    dst[len] = (GAP_MAX_BITS - 1) as GapWord;
    dst[0] = (dst[0] & LEVEL_MASK) | GapWord::from(start) | ((len as GapWord) << LAST_SHIFT);
    Some(len + 1)
}

/// Population count of a GAP block.
///
/// Full waves of set-run ends go through [`Kernels::gap_sum_arr`]; the rest is
/// summed here.
pub fn gap_bit_count(buf: &[GapWord], kernels: &Kernels) -> u32 {
    let last = gap_last(buf);
    let mut count = 0u32;
    let mut pos = 1;
    if gap_start_bit(buf) {
        count += u32::from(buf[1]) + 1;
        pos = 2;
    }
    // `pos` now indexes the first entry that closes a set run.
    pos += 1;
    if pos <= last {
        let waves = (last + 1 - pos) / kernels.gap_wave();
        if waves > 0 {
            pos = kernels.gap_sum_arr(&buf[..= last], pos, waves, &mut count);
        }
    }
    while pos <= last {
        count += u32::from(buf[pos] - buf[pos - 1]);
        pos += 2;
    }
    count
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::{KernelSet, SET_BLOCK_SIZE};

    fn supported() -> Vec<Kernels> {
        [KernelSet::Scalar, KernelSet::Sse2, KernelSet::Avx2]
            .into_iter()
            .filter_map(Kernels::new)
            .collect()
    }

    /// A GAP buffer at `level` holding runs ending at `ends` (last run implied).
    fn build(start: bool, ends: &[u16], level: usize) -> Vec<GapWord> {
        let mut buf = vec![0; GAP_MAX_BUFF_LEN];
        set_gap_level(&mut buf, level);
        buf[0] |= GapWord::from(start);
        buf[1 ..= ends.len()].copy_from_slice(ends);
        buf[ends.len() + 1] = 65535;
        buf[0] |= ((ends.len() + 1) as GapWord) << 3;
        buf
    }

    fn popcount(bits: &[Word]) -> u32 {
        bits.iter().map(|w| w.count_ones()).sum()
    }

    #[test]
    fn level_table_validation() {
        assert_eq!(GapLevels::new(GAP_LEVEL_LEN_DEFAULT), Ok(GapLevels::default()));
        assert_eq!(GapLevels::new([8, 16, 32, 64]).unwrap().as_array(), &[8, 16, 32, 64]);
        assert!(GapLevels::new([8, 16, 32, 64]).is_ok());
        assert!(matches!(GapLevels::new([128, 128, 512, 1280]), Err(Error::InvalidGapLevels(_))));
        assert!(matches!(GapLevels::new([127, 256, 512, 1280]), Err(Error::InvalidGapLevels(_))));
        assert!(matches!(GapLevels::new([4, 256, 512, 1280]), Err(Error::InvalidGapLevels(_))));
        assert!(matches!(GapLevels::new([128, 256, 512, 1282]), Err(Error::InvalidGapLevels(_))));
        assert!(GapLevels::try_from([512, 256, 128, 64]).is_err());
    }

    #[test]
    fn level_words_match_table() {
        let levels = GapLevels::default();
        for level in 0 .. GAP_LEVELS {
            assert_eq!(gap_level_words(level, &levels) * GAP_WORDS_PER_WORD, levels.len(level));
        }
        assert_eq!(gap_level_words(0, &levels), 64);
        assert_eq!(gap_level_words(3, &levels), 640);
    }

    #[test]
    fn header_fields() {
        let mut buf = build(true, &[3, 7, 15], 2);
        assert_eq!(gap_level(&buf), 2);
        assert!(gap_start_bit(&buf));
        assert_eq!(gap_last(&buf), 4);
        assert_eq!(gap_length(&buf), 5);

        set_gap_level(&mut buf, 1);
        assert_eq!(gap_level(&buf), 1);
        assert!(gap_start_bit(&buf));
        assert_eq!(gap_last(&buf), 4);
    }

    #[test]
    fn empty_block_keeps_footprint() {
        let levels = GapLevels::default();
        for level in 0 .. GAP_LEVELS {
            let mut buf = vec![0xFFFF; levels.len(level)];
            buf[0] = 0;
            set_gap_level(&mut buf, level);
            gap_set_all(&mut buf, false);
            assert_eq!(gap_length(&buf), 2);
            assert_eq!(gap_capacity(&buf, &levels), levels.len(level));
            assert_eq!(gap_capacity_words(&buf, &levels), gap_level_words(level, &levels));
            assert_eq!(gap_limit(&buf, &levels), levels.len(level) - 4);
        }
    }

    #[test]
    fn set_all_counts() {
        let kernels = Kernels::detect();
        let mut buf = build(false, &[3, 7, 15], 3);
        gap_set_all(&mut buf, true);
        assert_eq!(gap_level(&buf), 3);
        assert_eq!(gap_bit_count(&buf, &kernels), 65536);
        assert!(gap_test(&buf, 0) && gap_test(&buf, 65535));
        gap_set_all(&mut buf, false);
        assert_eq!(gap_bit_count(&buf, &kernels), 0);
        assert!(!gap_test(&buf, 40000));
    }

    #[test]
    fn calc_level() {
        let levels = GapLevels::default();
        assert_eq!(gap_calc_level(2, &levels), Some(0));
        assert_eq!(gap_calc_level(124, &levels), Some(0));
        assert_eq!(gap_calc_level(125, &levels), Some(1));
        assert_eq!(gap_calc_level(508, &levels), Some(2));
        assert_eq!(gap_calc_level(1276, &levels), Some(3));
        assert_eq!(gap_calc_level(1277, &levels), None);
    }

    #[test]
    fn small_runs() {
        // Runs [0,3] unset, [4,7] set, [8,15] unset, [16,65535] set.
        let buf = build(false, &[3, 7, 15], 0);
        for kernels in supported() {
            assert_eq!(gap_bit_count(&buf, &kernels), 4 + 65520);
        }
        assert!(!gap_test(&buf, 3));
        assert!(gap_test(&buf, 4));
        assert!(gap_test(&buf, 7));
        assert!(!gap_test(&buf, 8));
        assert!(gap_test(&buf, 16));

        let starts_set = build(true, &[3, 7, 15], 0);
        for kernels in supported() {
            assert_eq!(gap_bit_count(&starts_set, &kernels), 4 + 8);
        }
    }

    #[test]
    fn many_waves_with_ragged_tail() {
        // 301 run ends: several waves for every kernel set, plus a tail.
        let ends: Vec<u16> = (0 .. 301u16).map(|i| 10 + i * 17 + (i % 5)).collect();
        for start in [false, true] {
            let buf = build(start, &ends, 3);
            let mut bits = vec![0 as Word; SET_BLOCK_SIZE];
            gap_to_bits(&mut bits, &buf, &Kernels::scalar());
            let expect = popcount(&bits);
            for kernels in supported() {
                assert_eq!(gap_bit_count(&buf, &kernels), expect, "{:?}", kernels.set());
            }
        }
    }

    #[test]
    fn expansion_with_unaligned_interior() {
        // The set run [41, 1000] fills words 2 ..= 30, which start off any lane boundary.
        let buf = build(false, &[40, 1000], 0);
        let mut alloc = crate::StandardAllocator::default();
        let mut expect = alloc.alloc_bit_block().unwrap();
        gap_to_bits(&mut expect, &buf, &Kernels::scalar());
        assert_eq!(popcount(&expect), 960);
        for kernels in supported() {
            let mut bits = alloc.alloc_bit_block().unwrap();
            gap_to_bits(&mut bits, &buf, &kernels);
            assert_eq!(&bits[..], &expect[..], "{:?}", kernels.set());
            alloc.free_bit_block(bits);
        }
        alloc.free_bit_block(expect);
    }

    #[test]
    fn bits_round_trip() {
        let kernels = Kernels::detect();
        let ends: Vec<u16> = vec![0, 1, 31, 32, 63, 100, 4095, 4096, 65534];
        let buf = build(true, &ends, 2);
        let mut bits = vec![0 as Word; SET_BLOCK_SIZE];
        gap_to_bits(&mut bits, &buf, &kernels);
        for pos in [0u16, 1, 2, 31, 32, 33, 63, 64, 100, 101, 4096, 4097, 65534, 65535] {
            let word = bits[usize::from(pos) / 32];
            assert_eq!(word >> (pos % 32) & 1 == 1, gap_test(&buf, pos), "bit {}", pos);
        }

        let mut back = vec![0; GAP_MAX_BUFF_LEN];
        set_gap_level(&mut back, 2);
        assert_eq!(bits_to_gap(&mut back, &bits, 508), Some(gap_length(&buf)));
        assert_eq!(&back[.. gap_length(&buf)], &buf[.. gap_length(&buf)]);
        assert_eq!(bits_to_gap(&mut back, &bits, 5), None);
        assert_eq!(gap_level(&back), 2);
    }
}
