//! Mismatch, equality and lexicographic comparison of lane sequences.
//!
//! These are the ground-truth comparisons a vectorized runtime is checked
//! against. Three strategies compute the same answer:
//!
//! | Method | Strategy | Best Use Case |
//! |--------|----------|---------------|
//! | `scalar_mismatch` | lane by lane | short inputs, reference |
//! | `simd_mismatch` | 8-byte word scan, lanes confirmed on a differing word | medium inputs |
//! | `par_mismatch` | word scan over rayon chunks | long inputs |
//!
//! [`mismatch`], [`equals`] and [`compare`] pick a strategy by size through
//! [`fast_mismatch`].
//!
//! # Lane Equality
//!
//! Integer lanes are equal when their values are equal. Float lanes are equal
//! when their bit patterns are equal after every NaN is collapsed to one
//! canonical NaN: `0.0` and `-0.0` differ, any two NaNs are equal. Ordering of
//! float lanes is the matching total order, with `-0.0 < 0.0` and NaN above
//! every other value.
//!
//! # Examples
//!
//! ```rust
//! use std::cmp::Ordering;
//! use vecshape::mismatch::{compare, equals, mismatch};
//! use vecshape::sequence::Sequence;
//!
//! let a = Sequence::from_lanes(&[1i32, 2, 3]);
//! let b = Sequence::from_lanes(&[1i32, 2, 4]);
//! assert_eq!(mismatch(&a, &b).unwrap(), Some(2));
//! assert!(!equals(&a, &b).unwrap());
//! assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
//! ```

use std::cmp::Ordering;
use std::ops::Range;

use rayon::prelude::*;

use crate::element::Element;
use crate::error::{check_range, ReshapeError, Result};
use crate::sequence::Sequence;
use crate::{PARALLEL_CHUNK_SIZE, PARALLEL_THRESHOLD, SIMD_THRESHOLD};

const WORD: usize = std::mem::size_of::<u64>();

// ================================================================================================
// LANE PREDICATES
// ================================================================================================

/// Lane equality under the bitwise model.
#[inline(always)]
pub fn lanes_equal(a: Element, b: Element) -> bool {
    match (a, b) {
        (Element::F32(x), Element::F32(y)) => {
            x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan())
        }
        (Element::F64(x), Element::F64(y)) => {
            x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan())
        }
        _ => a == b,
    }
}

macro_rules! float_order {
    ($x:expr, $y:expr) => {
        match ($x.is_nan(), $y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => $x.total_cmp(&$y),
        }
    };
}

/// Total order on two lanes of the same kind.
///
/// Lanes of different kinds are ordered by kind.
#[inline(always)]
pub fn lane_order(a: Element, b: Element) -> Ordering {
    match (a, b) {
        (Element::I8(x), Element::I8(y)) => x.cmp(&y),
        (Element::I16(x), Element::I16(y)) => x.cmp(&y),
        (Element::I32(x), Element::I32(y)) => x.cmp(&y),
        (Element::I64(x), Element::I64(y)) => x.cmp(&y),
        (Element::F32(x), Element::F32(y)) => float_order!(x, y),
        (Element::F64(x), Element::F64(y)) => float_order!(x, y),
        _ => a.kind().cmp(&b.kind()),
    }
}

// ================================================================================================
// OPERAND WINDOWS
// ================================================================================================

/// A lane range of one sequence.
#[derive(Clone, Copy)]
struct Window<'a> {
    seq: &'a Sequence,
    start: usize,
    len: usize,
}

impl<'a> Window<'a> {
    fn new(seq: &'a Sequence, range: Range<usize>) -> Result<Self> {
        check_range(range.start, range.end, seq.len())?;
        Ok(Window {
            seq,
            start: range.start,
            len: range.end - range.start,
        })
    }

    fn whole(seq: &'a Sequence) -> Self {
        Window {
            seq,
            start: 0,
            len: seq.len(),
        }
    }

    #[inline(always)]
    fn lane(&self, i: usize) -> Element {
        self.seq.lane(self.start + i)
    }

    /// Bytes of lanes `from..from + count` of this window.
    #[inline(always)]
    fn bytes(&self, from: usize, count: usize) -> &'a [u8] {
        let width = self.seq.kind().width();
        let start = (self.start + from) * width;
        &self.seq.as_bytes()[start..start + count * width]
    }
}

fn check_kinds(a: &Sequence, b: &Sequence) -> Result<()> {
    if a.kind() != b.kind() {
        return Err(ReshapeError::KindMismatch {
            left: a.kind(),
            right: b.kind(),
        });
    }
    Ok(())
}

/// Turns a mismatch inside the common prefix into the full mismatch answer.
#[inline(always)]
fn finish(common: Option<usize>, a_len: usize, b_len: usize) -> Option<usize> {
    common.or_else(|| (a_len != b_len).then(|| a_len.min(b_len)))
}

// ================================================================================================
// STRATEGIES
// ================================================================================================

/// Lane-by-lane scan of lanes `from..from + count`.
#[inline(always)]
fn scalar_scan(a: Window<'_>, b: Window<'_>, from: usize, count: usize) -> Option<usize> {
    (from..from + count).find(|&i| !lanes_equal(a.lane(i), b.lane(i)))
}

/// Word scan of lanes `from..from + count`.
///
/// Equal words always hold equal lanes. A differing word is rechecked lane by
/// lane, since two NaNs can differ in bits and still be equal.
fn simd_scan(a: Window<'_>, b: Window<'_>, from: usize, count: usize) -> Option<usize> {
    if a.seq.endianness() != b.seq.endianness() {
        return scalar_scan(a, b, from, count);
    }

    let width = a.seq.kind().width();
    let lanes_per_word = WORD / width;
    let a_bytes = a.bytes(from, count);
    let b_bytes = b.bytes(from, count);

    let a_words = a_bytes.chunks_exact(WORD);
    let tail_lanes = a_words.remainder().len() / width;
    for (w, (aw, bw)) in a_words.zip(b_bytes.chunks_exact(WORD)).enumerate() {
        if word(aw) != word(bw) {
            let first = from + w * lanes_per_word;
            if let Some(i) = scalar_scan(a, b, first, lanes_per_word) {
                return Some(i);
            }
        }
    }

    scalar_scan(a, b, from + count - tail_lanes, tail_lanes)
}

#[inline(always)]
fn word(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; WORD];
    buf.copy_from_slice(bytes);
    u64::from_ne_bytes(buf)
}

/// Word scan split across the rayon pool, keeping the lowest mismatch.
fn par_scan(a: Window<'_>, b: Window<'_>, count: usize) -> Option<usize> {
    let width = a.seq.kind().width();
    let chunk_lanes = (PARALLEL_CHUNK_SIZE / width).max(1);
    let chunks = count.div_ceil(chunk_lanes);

    (0..chunks).into_par_iter().find_map_first(|c| {
        let from = c * chunk_lanes;
        let len = chunk_lanes.min(count - from);
        simd_scan(a, b, from, len)
    })
}

fn scalar_mismatch(a: Window<'_>, b: Window<'_>) -> Option<usize> {
    finish(scalar_scan(a, b, 0, a.len.min(b.len)), a.len, b.len)
}

fn simd_mismatch(a: Window<'_>, b: Window<'_>) -> Option<usize> {
    finish(simd_scan(a, b, 0, a.len.min(b.len)), a.len, b.len)
}

fn parallel_mismatch(a: Window<'_>, b: Window<'_>) -> Option<usize> {
    let count = a.len.min(b.len);
    // For small inputs, fall back to the single-threaded scan
    if count * a.seq.kind().width() <= PARALLEL_THRESHOLD {
        return simd_mismatch(a, b);
    }
    finish(par_scan(a, b, count), a.len, b.len)
}

fn fast_window_mismatch(a: Window<'_>, b: Window<'_>) -> Option<usize> {
    let bytes = a.len.min(b.len) * a.seq.kind().width();

    match bytes {
        0..SIMD_THRESHOLD => scalar_mismatch(a, b),
        SIMD_THRESHOLD..PARALLEL_THRESHOLD => simd_mismatch(a, b),
        _ => parallel_mismatch(a, b),
    }
}

/// Picks the scan strategy from the length of the common prefix.
pub fn fast_mismatch(a: &Sequence, b: &Sequence) -> Result<Option<usize>> {
    check_kinds(a, b)?;
    Ok(fast_window_mismatch(Window::whole(a), Window::whole(b)))
}

// ================================================================================================
// ORACLE CONTRACT
// ================================================================================================

/// Index of the first differing lane.
///
/// Returns `Some(i)` for the lowest `i` with `a[i] != b[i]`; if the common
/// prefix matches but the lengths differ, `Some(min(len_a, len_b))`; `None` when
/// the sequences are equal. Sequences of different kinds are an error.
pub fn mismatch(a: &Sequence, b: &Sequence) -> Result<Option<usize>> {
    fast_mismatch(a, b)
}

pub fn equals(a: &Sequence, b: &Sequence) -> Result<bool> {
    Ok(mismatch(a, b)?.is_none())
}

/// Lexicographic comparison: the first differing lane decides, then length.
pub fn compare(a: &Sequence, b: &Sequence) -> Result<Ordering> {
    check_kinds(a, b)?;
    Ok(compare_windows(Window::whole(a), Window::whole(b)))
}

/// [`mismatch`] over `a[a_range]` and `b[b_range]`; indices are relative to the ranges.
pub fn mismatch_range(
    a: &Sequence,
    a_range: Range<usize>,
    b: &Sequence,
    b_range: Range<usize>,
) -> Result<Option<usize>> {
    check_kinds(a, b)?;
    Ok(fast_window_mismatch(
        Window::new(a, a_range)?,
        Window::new(b, b_range)?,
    ))
}

pub fn equals_range(
    a: &Sequence,
    a_range: Range<usize>,
    b: &Sequence,
    b_range: Range<usize>,
) -> Result<bool> {
    Ok(mismatch_range(a, a_range, b, b_range)?.is_none())
}

pub fn compare_range(
    a: &Sequence,
    a_range: Range<usize>,
    b: &Sequence,
    b_range: Range<usize>,
) -> Result<Ordering> {
    check_kinds(a, b)?;
    Ok(compare_windows(
        Window::new(a, a_range)?,
        Window::new(b, b_range)?,
    ))
}

fn compare_windows(a: Window<'_>, b: Window<'_>) -> Ordering {
    match fast_window_mismatch(a, b) {
        Some(i) if i < a.len && i < b.len => lane_order(a.lane(i), b.lane(i)),
        _ => a.len.cmp(&b.len),
    }
}

// ================================================================================================
// TRAIT IMPLEMENTATIONS
// ================================================================================================

/// Mismatch search with an explicit strategy.
pub trait SimdMismatch<Rhs = Self> {
    type Output;

    fn simd_mismatch(self, rhs: Rhs) -> Self::Output;
    fn par_mismatch(self, rhs: Rhs) -> Self::Output;
    fn scalar_mismatch(self, rhs: Rhs) -> Self::Output;
}

impl<'b> SimdMismatch<&'b Sequence> for &Sequence {
    type Output = Result<Option<usize>>;

    /// Word-at-a-time scan on the calling thread.
    #[inline(always)]
    fn simd_mismatch(self, rhs: &'b Sequence) -> Self::Output {
        check_kinds(self, rhs)?;
        Ok(simd_mismatch(Window::whole(self), Window::whole(rhs)))
    }

    /// Word scan across the rayon pool. Falls back to `simd_mismatch` for
    /// inputs below the parallel threshold.
    #[inline(always)]
    fn par_mismatch(self, rhs: &'b Sequence) -> Self::Output {
        check_kinds(self, rhs)?;
        Ok(parallel_mismatch(Window::whole(self), Window::whole(rhs)))
    }

    /// Reference lane-by-lane scan.
    #[inline(always)]
    fn scalar_mismatch(self, rhs: &'b Sequence) -> Self::Output {
        check_kinds(self, rhs)?;
        Ok(scalar_mismatch(Window::whole(self), Window::whole(rhs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementKind, Endianness};

    #[test]
    fn test_equal_sequences() {
        let a = Sequence::from_lanes(&[1i16, 2, 3]);
        let b = Sequence::from_lanes(&[1i16, 2, 3]);
        assert_eq!(mismatch(&a, &b).unwrap(), None);
        assert!(equals(&a, &b).unwrap());
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_prefix_returns_shorter_length() {
        let a = Sequence::from_lanes(&[1i64, 2]);
        let b = Sequence::from_lanes(&[1i64, 2, 3]);
        assert_eq!(mismatch(&a, &b).unwrap(), Some(2));
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
        assert_eq!(compare(&b, &a).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_empty_sequences() {
        let a = Sequence::zeroed(ElementKind::I8, 0, Endianness::native());
        let b = Sequence::from_lanes(&[0i8]);
        assert_eq!(mismatch(&a, &a).unwrap(), None);
        assert_eq!(mismatch(&a, &b).unwrap(), Some(0));
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_float_equality_is_bitwise_with_canonical_nan() {
        let quiet = f32::NAN;
        let other_nan = f32::from_bits(0x7FC0_0001);
        let a = Sequence::from_lanes(&[quiet, 0.0]);
        let b = Sequence::from_lanes(&[other_nan, -0.0]);
        assert_eq!(mismatch(&a, &b).unwrap(), Some(1));
        assert_eq!(compare(&a, &b).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_nan_is_greatest() {
        assert_eq!(
            lane_order(Element::F64(f64::NAN), Element::F64(f64::INFINITY)),
            Ordering::Greater
        );
        assert_eq!(lane_order(Element::F64(-0.0), Element::F64(0.0)), Ordering::Less);
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let a = Sequence::from_lanes(&[1i32]);
        let b = Sequence::from_lanes(&[1.0f32]);
        assert!(matches!(mismatch(&a, &b), Err(ReshapeError::KindMismatch { .. })));
        assert!(compare(&a, &b).is_err());
    }

    #[test]
    fn test_range_variants() {
        let a = Sequence::from_lanes(&[9i32, 1, 2, 3, 9]);
        let b = Sequence::from_lanes(&[1i32, 2, 4]);
        assert_eq!(mismatch_range(&a, 1..4, &b, 0..3).unwrap(), Some(2));
        assert!(equals_range(&a, 1..3, &b, 0..2).unwrap());
        assert_eq!(compare_range(&a, 1..4, &b, 0..3).unwrap(), Ordering::Less);
        assert!(mismatch_range(&a, 2..6, &b, 0..3).is_err());
    }

    #[test]
    fn test_strategies_agree_on_word_boundaries() {
        let base: Vec<i8> = (0..100).map(|i| i as i8).collect();
        for pos in [0usize, 7, 8, 9, 63, 64, 95, 99] {
            let mut other = base.clone();
            other[pos] = other[pos].wrapping_add(1);
            let a = Sequence::from_lanes(&base);
            let b = Sequence::from_lanes(&other);
            assert_eq!(a.scalar_mismatch(&b).unwrap(), Some(pos));
            assert_eq!(a.simd_mismatch(&b).unwrap(), Some(pos));
            assert_eq!(a.par_mismatch(&b).unwrap(), Some(pos));
        }
    }

    #[test]
    fn test_mixed_endianness_compares_values() {
        let a = Sequence::from_lanes_with(&[1i32, 2, 3, 4], Endianness::Little);
        let b = Sequence::from_lanes_with(&[1i32, 2, 3, 4], Endianness::Big);
        assert_eq!(a.simd_mismatch(&b).unwrap(), None);
    }
}
