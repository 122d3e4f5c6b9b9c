//! Reshape engine: the expected output of a lanewise cast or a raw
//! reinterpretation between two shapes.
//!
//! Both semantics share one layout rule. The source is seen as a stream of
//! bytes, either the raw input (reinterpretation) or the input after every lane
//! has been converted to the destination kind (lanewise cast). Then:
//!
//! - **Expand**: the output is the `part`-th destination-sized slice of that
//!   stream, starting at `origin = part * block_bytes`.
//! - **Contract**: the output starts as all zeros and the whole stream is
//!   written at `origin = -part * block_bytes`.
//! - **Equal**: the output is the stream itself.
//!
//! Conversion always happens before slicing or padding, so padding lanes hold
//! the destination kind's numeric zero rather than a converted bit pattern.
//!
//! # Examples
//!
//! ```rust
//! use vecshape::element::ElementKind;
//! use vecshape::reshape::reinterpret_shape;
//! use vecshape::sequence::Sequence;
//! use vecshape::shape::Shape;
//!
//! let src = Shape::new(2, ElementKind::I32).unwrap();
//! let dst = Shape::new(4, ElementKind::I32).unwrap();
//! let input = Sequence::from_lanes(&[7i32, 8]);
//!
//! let high = reinterpret_shape(src, dst, &input, -1).unwrap();
//! assert_eq!(high.output.to_lanes::<i32>().unwrap(), vec![0, 0, 7, 8]);
//! assert_eq!(high.origin, 8);
//! ```

use std::ops::Range;

use crate::error::{invalid_shape, ReshapeError, Result};
use crate::sequence::Sequence;
use crate::shape::{relation, Direction, Shape};

/// The expected output of one reshape together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReshapeResult {
    pub output: Sequence,
    /// Byte offset of the moved block: into the source stream when expanding,
    /// into the output when contracting, 0 when equal.
    pub origin: usize,
    /// Byte offset into the raw input where the part begins. Equals `origin`
    /// except for a lanewise expansion, where `origin` is measured in the
    /// converted stream.
    pub source_origin: usize,
    /// Bytes moved, measured in the destination kind's stream.
    pub block_bytes: usize,
    pub part: i32,
    pub direction: Direction,
}

impl ReshapeResult {
    /// Output bytes that received source data. Everything else is zero.
    pub fn touched(&self) -> Range<usize> {
        match self.direction {
            Direction::Contract => self.origin..self.origin + self.block_bytes,
            Direction::Expand | Direction::Equal => 0..self.block_bytes,
        }
    }
}

/// Computes the expected result of reshaping `input` from `src` into `dst`.
///
/// `lanewise` selects a numeric cast of every lane; otherwise bytes are
/// reindexed untouched. `input` must have exactly the source shape and `part`
/// must lie in the range [`relation`] reports; both are checked before the
/// output buffer is allocated.
pub fn reshape(
    src: Shape,
    dst: Shape,
    input: &Sequence,
    part: i32,
    lanewise: bool,
) -> Result<ReshapeResult> {
    if input.kind() != src.kind() || input.len() != src.lanes() {
        return Err(ReshapeError::InputShapeMismatch {
            expected: src,
            kind: input.kind(),
            lanes: input.len(),
        });
    }

    let rel = relation(src, dst, lanewise)?;
    rel.check_part(part)?;

    let block = rel.block_bytes;
    let (origin, src_offset, dst_offset) = match rel.direction {
        Direction::Expand => {
            let origin = part as usize * block;
            (origin, origin, 0)
        }
        Direction::Contract => {
            let origin = part.unsigned_abs() as usize * block;
            (origin, 0, origin)
        }
        Direction::Equal => (0, 0, 0),
    };

    log::trace!(
        "reshape {src} -> {dst} lanewise={lanewise} part={part}: {:?} origin={origin} block={}",
        rel.direction,
        block
    );

    let source_origin = if lanewise {
        src_offset / dst.kind().width() * src.kind().width()
    } else {
        src_offset
    };

    let endianness = input.endianness();
    let mut out = vec![0u8; dst.byte_size()];

    if lanewise {
        let to = dst.kind();
        let width = to.width();
        let first = src_offset / width;
        let lanes = block / width;
        for (i, lane_out) in out[dst_offset..dst_offset + block]
            .chunks_exact_mut(width)
            .enumerate()
            .take(lanes)
        {
            input
                .lane(first + i)
                .convert(to)
                .encode_into(lane_out, endianness);
        }
    } else {
        out[dst_offset..dst_offset + block]
            .copy_from_slice(&input.as_bytes()[src_offset..src_offset + block]);
    }

    Ok(ReshapeResult {
        output: Sequence::from_raw_parts(dst.kind(), endianness, out),
        origin,
        source_origin,
        block_bytes: block,
        part,
        direction: rel.direction,
    })
}

/// Lanewise cast of `input` into `dst`, keeping the selected part.
#[inline(always)]
pub fn cast_shape(src: Shape, dst: Shape, input: &Sequence, part: i32) -> Result<ReshapeResult> {
    reshape(src, dst, input, part, true)
}

/// Raw bit reinterpretation of `input` as `dst`, keeping the selected part.
#[inline(always)]
pub fn reinterpret_shape(
    src: Shape,
    dst: Shape,
    input: &Sequence,
    part: i32,
) -> Result<ReshapeResult> {
    reshape(src, dst, input, part, false)
}

/// Every legal part of a reshape, in visiting order.
pub fn expand_all_parts(
    src: Shape,
    dst: Shape,
    input: &Sequence,
    lanewise: bool,
) -> Result<Vec<ReshapeResult>> {
    let rel = relation(src, dst, lanewise)?;
    rel.part_range()
        .iter()
        .map(|part| reshape(src, dst, input, part, lanewise))
        .collect()
}

/// Concatenates the outputs of expanding parts back into one stream.
///
/// For an expanding reshape, reassembling every part in order yields the full
/// source stream (converted, if lanewise).
pub fn reassemble(parts: &[ReshapeResult]) -> Result<Sequence> {
    let first = parts
        .first()
        .ok_or_else(|| invalid_shape("no parts to reassemble"))?;
    let (kind, endianness) = (first.output.kind(), first.output.endianness());

    let mut bytes = Vec::with_capacity(parts.iter().map(|p| p.output.byte_len()).sum());
    for part in parts {
        if part.output.kind() != kind {
            return Err(ReshapeError::KindMismatch {
                left: kind,
                right: part.output.kind(),
            });
        }
        bytes.extend_from_slice(part.output.as_bytes());
    }
    Ok(Sequence::from_raw_parts(kind, endianness, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementKind, Endianness};

    fn shape(lanes: usize, kind: ElementKind) -> Shape {
        Shape::new(lanes, kind).unwrap()
    }

    fn counting_bytes(kind: ElementKind, len: usize) -> Sequence {
        let bytes = (1..=len as u8).collect();
        Sequence::from_bytes(kind, bytes, Endianness::native()).unwrap()
    }

    #[test]
    fn test_expand_slices_source() {
        let a = shape(4, ElementKind::I32);
        let b = shape(2, ElementKind::I32);
        let input = counting_bytes(ElementKind::I32, 16);

        let p0 = reinterpret_shape(a, b, &input, 0).unwrap();
        let p1 = reinterpret_shape(a, b, &input, 1).unwrap();
        assert_eq!(p0.output.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(p1.output.as_bytes(), &[9, 10, 11, 12, 13, 14, 15, 16]);
        assert_eq!(p1.origin, 8);
        assert_eq!(p1.source_origin, 8);

        let whole = reassemble(&[p0, p1]).unwrap();
        assert_eq!(whole.as_bytes(), input.as_bytes());
    }

    #[test]
    fn test_contract_zero_fills() {
        let a = shape(2, ElementKind::I32);
        let b = shape(4, ElementKind::I32);
        let input = counting_bytes(ElementKind::I32, 8);

        let low = reinterpret_shape(a, b, &input, 0).unwrap();
        assert_eq!(&low.output.as_bytes()[..8], input.as_bytes());
        assert!(low.output.as_bytes()[8..].iter().all(|&x| x == 0));
        assert_eq!(low.touched(), 0..8);

        let high = reinterpret_shape(a, b, &input, -1).unwrap();
        assert!(high.output.as_bytes()[..8].iter().all(|&x| x == 0));
        assert_eq!(&high.output.as_bytes()[8..], input.as_bytes());
        assert_eq!(high.touched(), 8..16);
    }

    #[test]
    fn test_equal_is_a_copy() {
        let a = shape(2, ElementKind::I64);
        let b = shape(4, ElementKind::F32);
        let input = Sequence::from_lanes(&[1i64, -1]);
        let r = reinterpret_shape(a, b, &input, 0).unwrap();
        assert_eq!(r.output.kind(), ElementKind::F32);
        assert_eq!(r.output.as_bytes(), input.as_bytes());
        assert_eq!(r.direction, Direction::Equal);
    }

    #[test]
    fn test_lanewise_widen_takes_part_of_lanes() {
        let a = shape(8, ElementKind::I8);
        let b = shape(2, ElementKind::I32);
        let input = Sequence::from_lanes(&[1i8, -2, 3, -4, 5, -6, 7, -8]);

        let p0 = cast_shape(a, b, &input, 0).unwrap();
        assert_eq!(p0.output.to_lanes::<i32>().unwrap(), vec![1, -2]);
        let p3 = cast_shape(a, b, &input, 3).unwrap();
        assert_eq!(p3.output.to_lanes::<i32>().unwrap(), vec![7, -8]);
        assert_eq!(p3.origin, 24);
        assert_eq!(p3.source_origin, 6);
        assert_eq!(p0.source_origin, 0);
    }

    #[test]
    fn test_lanewise_narrow_pads_with_numeric_zero() {
        let a = shape(2, ElementKind::F64);
        let b = shape(4, ElementKind::F32);
        let input = Sequence::from_lanes(&[1.5f64, -2.25]);

        let p = cast_shape(a, b, &input, -1).unwrap();
        assert_eq!(p.output.to_lanes::<f32>().unwrap(), vec![0.0, 0.0, 1.5, -2.25]);
        assert_eq!(p.origin, 8);
    }

    #[test]
    fn test_lanewise_float_to_int_saturates_before_slicing() {
        let a = shape(2, ElementKind::F32);
        let b = shape(2, ElementKind::I8);
        let input = Sequence::from_lanes(&[1000.0f32, f32::NAN]);
        let r = cast_shape(a, b, &input, 0).unwrap();
        assert_eq!(r.output.to_lanes::<i8>().unwrap(), vec![127, 0]);
    }

    #[test]
    fn test_illegal_part_is_rejected() {
        let a = shape(4, ElementKind::I32);
        let b = shape(2, ElementKind::I32);
        let input = counting_bytes(ElementKind::I32, 16);
        assert!(matches!(
            reinterpret_shape(a, b, &input, 2),
            Err(ReshapeError::PartOutOfRange { part: 2, .. })
        ));
        assert!(reinterpret_shape(a, b, &input, -1).is_err());
    }

    #[test]
    fn test_input_must_match_source_shape() {
        let a = shape(4, ElementKind::I32);
        let b = shape(2, ElementKind::I32);
        let input = Sequence::from_lanes(&[1i32, 2]);
        assert!(matches!(
            reinterpret_shape(a, b, &input, 0),
            Err(ReshapeError::InputShapeMismatch { lanes: 2, .. })
        ));
        let wrong_kind = Sequence::from_lanes(&[1.0f32, 2.0, 3.0, 4.0]);
        assert!(reinterpret_shape(a, b, &wrong_kind, 0).is_err());
    }

    #[test]
    fn test_expand_all_parts_visits_every_part() {
        let a = shape(2, ElementKind::I16);
        let b = shape(8, ElementKind::I16);
        let input = Sequence::from_lanes(&[5i16, 6]);
        let parts = expand_all_parts(a, b, &input, false).unwrap();
        let visited: Vec<i32> = parts.iter().map(|p| p.part).collect();
        assert_eq!(visited, vec![0, -1, -2, -3]);
    }

    #[test]
    fn test_reassemble_requires_parts() {
        assert!(reassemble(&[]).is_err());
    }
}
