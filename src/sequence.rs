//! Immutable lane sequences stored as raw bytes.
//!
//! A [`Sequence`] is the model's stand-in for a vector register: a fixed number
//! of lanes of one [`ElementKind`], laid out in a byte buffer with a known
//! [`Endianness`]. The same value can be viewed lane by lane (for casts and
//! comparisons) or as an undifferentiated byte stream (for reinterpretation).

use std::ops::Range;

use crate::element::{Element, ElementKind, Endianness, Lane};
use crate::error::{check_range, ReshapeError, Result};

/// A fixed-length run of lanes of a single kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    kind: ElementKind,
    endianness: Endianness,
    bytes: Vec<u8>,
}

impl Sequence {
    /// Builds a native-order sequence from typed lanes.
    pub fn from_lanes<T: Lane>(lanes: &[T]) -> Self {
        Self::from_lanes_with(lanes, Endianness::native())
    }

    pub fn from_lanes_with<T: Lane>(lanes: &[T], endianness: Endianness) -> Self {
        let width = T::KIND.width();
        let mut bytes = vec![0u8; lanes.len() * width];
        for (lane, out) in lanes.iter().zip(bytes.chunks_exact_mut(width)) {
            lane.write_bytes(out, endianness);
        }
        Sequence {
            kind: T::KIND,
            endianness,
            bytes,
        }
    }

    /// Wraps a raw buffer. Its length must be a whole number of lanes.
    pub fn from_bytes(kind: ElementKind, bytes: Vec<u8>, endianness: Endianness) -> Result<Self> {
        if bytes.len() % kind.width() != 0 {
            return Err(ReshapeError::ByteLength {
                kind,
                len: bytes.len(),
                width: kind.width(),
            });
        }
        Ok(Sequence {
            kind,
            endianness,
            bytes,
        })
    }

    /// Builds a sequence from tagged values, all of which must be of `kind`.
    pub fn from_elements(
        kind: ElementKind,
        elements: &[Element],
        endianness: Endianness,
    ) -> Result<Self> {
        let width = kind.width();
        let mut bytes = vec![0u8; elements.len() * width];
        for (element, out) in elements.iter().zip(bytes.chunks_exact_mut(width)) {
            if element.kind() != kind {
                return Err(ReshapeError::KindMismatch {
                    left: element.kind(),
                    right: kind,
                });
            }
            element.encode_into(out, endianness);
        }
        Ok(Sequence {
            kind,
            endianness,
            bytes,
        })
    }

    /// Builds a native-order sequence of `len` lanes from an index function.
    ///
    /// The function's results are converted to `kind` with the native cast, so
    /// `from_fn(I8, 4, |i| Element::I32(i as i32 * 100))` truncates each lane.
    pub fn from_fn<F>(kind: ElementKind, len: usize, mut f: F) -> Self
    where
        F: FnMut(usize) -> Element,
    {
        let endianness = Endianness::native();
        let width = kind.width();
        let mut bytes = vec![0u8; len * width];
        for (i, out) in bytes.chunks_exact_mut(width).enumerate() {
            f(i).convert(kind).encode_into(out, endianness);
        }
        Sequence {
            kind,
            endianness,
            bytes,
        }
    }

    /// Wraps a buffer already known to hold whole lanes of `kind`.
    #[inline(always)]
    pub(crate) fn from_raw_parts(
        kind: ElementKind,
        endianness: Endianness,
        bytes: Vec<u8>,
    ) -> Self {
        debug_assert_eq!(bytes.len() % kind.width(), 0);
        Sequence {
            kind,
            endianness,
            bytes,
        }
    }

    /// Mask lanes as `I8`: 1 for set, 0 for clear.
    pub fn from_mask(mask: &[bool]) -> Self {
        let bytes = mask.iter().map(|&set| set as u8).collect();
        Sequence {
            kind: ElementKind::I8,
            endianness: Endianness::native(),
            bytes,
        }
    }

    /// `len` lanes of numeric zero.
    pub fn zeroed(kind: ElementKind, len: usize, endianness: Endianness) -> Self {
        Sequence {
            kind,
            endianness,
            bytes: vec![0u8; len * kind.width()],
        }
    }

    #[inline(always)]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    #[inline(always)]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Number of lanes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bytes.len() / self.kind.width()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline(always)]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The lane at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<Element> {
        let width = self.kind.width();
        let start = index.checked_mul(width)?;
        let end = start.checked_add(width)?;
        let lane = self.bytes.get(start..end)?;
        Some(Element::read_lane(lane, self.kind, self.endianness))
    }

    /// Lane `index` without the `Option`; callers have already bounds-checked.
    #[inline(always)]
    pub(crate) fn lane(&self, index: usize) -> Element {
        let width = self.kind.width();
        Element::read_lane(&self.bytes[index * width..], self.kind, self.endianness)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Element> + '_ {
        let (kind, endianness) = (self.kind, self.endianness);
        self.bytes
            .chunks_exact(kind.width())
            .map(move |lane| Element::read_lane(lane, kind, endianness))
    }

    /// Copies the lanes out as `T`, which must match the sequence's kind.
    pub fn to_lanes<T: Lane>(&self) -> Result<Vec<T>> {
        if T::KIND != self.kind {
            return Err(ReshapeError::KindMismatch {
                left: self.kind,
                right: T::KIND,
            });
        }
        Ok(self
            .bytes
            .chunks_exact(self.kind.width())
            .map(|lane| T::read_bytes(lane, self.endianness))
            .collect())
    }

    /// Converts every lane numerically to `to`; the lane count is unchanged.
    pub fn convert(&self, to: ElementKind) -> Sequence {
        let width = to.width();
        let mut bytes = vec![0u8; self.len() * width];
        for (element, out) in self.iter().zip(bytes.chunks_exact_mut(width)) {
            element.convert(to).encode_into(out, self.endianness);
        }
        Sequence {
            kind: to,
            endianness: self.endianness,
            bytes,
        }
    }

    /// Re-encodes every lane in `endianness`; lane values are unchanged.
    pub fn with_endianness(&self, endianness: Endianness) -> Sequence {
        if endianness == self.endianness {
            return self.clone();
        }
        let width = self.kind.width();
        let mut bytes = self.bytes.clone();
        for lane in bytes.chunks_exact_mut(width) {
            lane.reverse();
        }
        Sequence {
            kind: self.kind,
            endianness,
            bytes,
        }
    }

    /// A copy of the lanes in `range`.
    pub fn slice(&self, range: Range<usize>) -> Result<Sequence> {
        check_range(range.start, range.end, self.len())?;
        let width = self.kind.width();
        Ok(Sequence {
            kind: self.kind,
            endianness: self.endianness,
            bytes: self.bytes[range.start * width..range.end * width].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lanes_and_back() {
        let seq = Sequence::from_lanes(&[1i32, -2, 3]);
        assert_eq!(seq.kind(), ElementKind::I32);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.byte_len(), 12);
        assert_eq!(seq.to_lanes::<i32>().unwrap(), vec![1, -2, 3]);
        assert!(seq.to_lanes::<i16>().is_err());
    }

    #[test]
    fn test_from_bytes_rejects_partial_lane() {
        let err = Sequence::from_bytes(ElementKind::I16, vec![1, 2, 3], Endianness::Little);
        assert!(matches!(err, Err(ReshapeError::ByteLength { len: 3, .. })));
    }

    #[test]
    fn test_little_endian_layout() {
        let bytes: Vec<u8> = (1..=8).collect();
        let seq = Sequence::from_bytes(ElementKind::I32, bytes, Endianness::Little).unwrap();
        assert_eq!(seq.get(0), Some(Element::I32(0x0403_0201)));
        assert_eq!(seq.get(1), Some(Element::I32(0x0807_0605)));
        assert_eq!(seq.get(2), None);
    }

    #[test]
    fn test_get_far_past_the_end() {
        let bytes = Sequence::from_lanes(&[1i8, 2]);
        assert_eq!(bytes.get(usize::MAX), None);
        let ints = Sequence::from_lanes(&[1i32, 2]);
        assert_eq!(ints.get(usize::MAX), None);
        assert_eq!(ints.get(usize::MAX / 4), None);
    }

    #[test]
    fn test_with_endianness_preserves_values() {
        let seq = Sequence::from_lanes_with(&[0x0102i16, -3], Endianness::Little);
        let big = seq.with_endianness(Endianness::Big);
        assert_eq!(big.as_bytes(), &[0x01, 0x02, 0xFF, 0xFD]);
        assert_eq!(big.to_lanes::<i16>().unwrap(), vec![0x0102, -3]);
    }

    #[test]
    fn test_convert_keeps_lane_count() {
        let seq = Sequence::from_lanes(&[-1i8, 100, 127]);
        let wide = seq.convert(ElementKind::F64);
        assert_eq!(wide.len(), 3);
        assert_eq!(wide.to_lanes::<f64>().unwrap(), vec![-1.0, 100.0, 127.0]);
    }

    #[test]
    fn test_from_fn_truncates_into_kind() {
        let seq = Sequence::from_fn(ElementKind::I8, 4, |i| Element::I32(i as i32 * 100));
        assert_eq!(seq.to_lanes::<i8>().unwrap(), vec![0, 100, -56, 44]);
    }

    #[test]
    fn test_from_elements_rejects_mixed_kinds() {
        let elements = [Element::I16(1), Element::I32(2)];
        assert!(Sequence::from_elements(ElementKind::I16, &elements, Endianness::Little).is_err());
    }

    #[test]
    fn test_mask_is_i8() {
        let seq = Sequence::from_mask(&[true, false, true]);
        assert_eq!(seq.kind(), ElementKind::I8);
        assert_eq!(seq.to_lanes::<i8>().unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_slice_bounds() {
        let seq = Sequence::from_lanes(&[1i64, 2, 3, 4]);
        assert_eq!(seq.slice(1..3).unwrap().to_lanes::<i64>().unwrap(), vec![2, 3]);
        assert!(seq.slice(3..5).is_err());
        assert!(seq.slice(2..2).unwrap().is_empty());
    }

    #[test]
    fn test_zero_length() {
        let seq = Sequence::zeroed(ElementKind::F32, 0, Endianness::Little);
        assert!(seq.is_empty());
        assert_eq!(seq.iter().count(), 0);
    }
}
