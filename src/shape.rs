//! Shapes and the partitioning of one shape into parts of another.
//!
//! Two shapes can be reshaped into each other when their block sizes divide
//! evenly. The larger block is split into `ratio` parts, each the size of the
//! smaller block, and a signed part index picks one of them:
//!
//! | Direction | Source vs destination block | Legal parts |
//! |-----------|-----------------------------|-------------|
//! | [`Direction::Expand`] | source larger | `0..=ratio-1` |
//! | [`Direction::Contract`] | source smaller | `-(ratio-1)..=0` |
//! | [`Direction::Equal`] | same size | `0` |
//!
//! For a raw reinterpretation the block size is the shape's byte size. For a
//! lanewise cast the source is measured after conversion, as
//! `src.lanes * dst.kind.width()` bytes, so both sides are compared in
//! destination lanes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::ElementKind;
use crate::error::{invalid_shape, ReshapeError, Result};

/// Vector sizes, in bits, of the fixed species the vector API provides.
pub const VECTOR_BITS: [usize; 4] = [64, 128, 256, 512];

// ================================================================================================
// SHAPE
// ================================================================================================

/// A vector layout: `lanes` lanes of `kind`.
///
/// The byte size always fits a `usize`; deserialized shapes are checked the
/// same way as [`Shape::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawShape")]
pub struct Shape {
    lanes: usize,
    kind: ElementKind,
}

#[derive(Deserialize)]
struct RawShape {
    lanes: usize,
    kind: ElementKind,
}

impl TryFrom<RawShape> for Shape {
    type Error = ReshapeError;

    fn try_from(raw: RawShape) -> Result<Self> {
        Shape::new(raw.lanes, raw.kind)
    }
}

impl Shape {
    pub fn new(lanes: usize, kind: ElementKind) -> Result<Self> {
        if lanes == 0 {
            return Err(invalid_shape("lane count must be positive"));
        }
        if lanes.checked_mul(kind.width()).is_none() {
            return Err(invalid_shape(format!(
                "{lanes} lanes of {kind} overflow the addressable byte size"
            )));
        }
        Ok(Shape { lanes, kind })
    }

    /// The shape of a `bits`-wide vector of `kind`.
    ///
    /// ```rust
    /// use vecshape::{element::ElementKind, shape::Shape};
    ///
    /// let shape = Shape::from_bits(ElementKind::I16, 128).unwrap();
    /// assert_eq!(shape.lanes(), 8);
    /// ```
    pub fn from_bits(kind: ElementKind, bits: usize) -> Result<Self> {
        if bits == 0 || bits % kind.bits() != 0 {
            return Err(invalid_shape(format!(
                "{bits} bits is not a positive multiple of the {kind} lane width"
            )));
        }
        Self::new(bits / kind.bits(), kind)
    }

    #[inline(always)]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    #[inline(always)]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    #[inline(always)]
    pub fn byte_size(&self) -> usize {
        self.lanes * self.kind.width()
    }

    #[inline(always)]
    pub fn bit_size(&self) -> usize {
        self.byte_size() * 8
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.kind, self.lanes)
    }
}

// ================================================================================================
// PART RANGES
// ================================================================================================

/// Which way a reshape changes the block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The source block is larger; the output is one slice of it.
    Expand,
    /// The source block is smaller; it lands in one slice of a zeroed output.
    Contract,
    Equal,
}

/// A closed range of part indices, `lo..=hi`.
///
/// Ranges are produced by [`Relation::part_range`] and always contain 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartRange {
    lo: i32,
    hi: i32,
}

impl PartRange {
    pub(crate) const fn new(lo: i32, hi: i32) -> Self {
        PartRange { lo, hi }
    }

    #[inline(always)]
    pub fn lo(&self) -> i32 {
        self.lo
    }

    #[inline(always)]
    pub fn hi(&self) -> i32 {
        self.hi
    }

    #[inline(always)]
    pub fn contains(&self, part: i32) -> bool {
        self.lo <= part && part <= self.hi
    }

    /// Number of legal parts.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (i64::from(self.hi) - i64::from(self.lo)) as usize + 1
    }

    /// Only possible for a range deserialized with `lo > hi`.
    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    /// Parts in the order the vector API test suites visit them: counting up
    /// from 0 for expansion, down from 0 for contraction.
    pub fn iter(&self) -> impl Iterator<Item = i32> {
        let (lo, hi) = (self.lo, self.hi);
        let up = (hi > 0).then(|| 0..=hi);
        let down = (lo < 0).then(|| (lo..=0).rev());
        let zero = (lo == 0 && hi == 0).then_some(0);
        up.into_iter()
            .flatten()
            .chain(down.into_iter().flatten())
            .chain(zero)
    }
}

impl fmt::Display for PartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

// ================================================================================================
// RELATION
// ================================================================================================

/// How `src` maps onto `dst` for one kind of reshape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub src: Shape,
    pub dst: Shape,
    pub lanewise: bool,
    pub direction: Direction,
    /// `max(source_block, dest_block) / min(source_block, dest_block)`.
    pub ratio: usize,
    /// Compared size of the source, in bytes of the destination's stream.
    pub source_block: usize,
    pub dest_block: usize,
    /// The smaller of the two blocks; the span one part covers.
    pub block_bytes: usize,
}

impl Relation {
    pub fn part_range(&self) -> PartRange {
        let last = self.ratio as i32 - 1;
        match self.direction {
            Direction::Expand => PartRange::new(0, last),
            Direction::Contract => PartRange::new(-last, 0),
            Direction::Equal => PartRange::new(0, 0),
        }
    }

    /// The vector API's signed part limit: `ratio` when expanding, `-ratio`
    /// when contracting, 0 when the blocks are equal.
    pub fn part_limit(&self) -> i32 {
        match self.direction {
            Direction::Expand => self.ratio as i32,
            Direction::Contract => -(self.ratio as i32),
            Direction::Equal => 0,
        }
    }

    pub fn check_part(&self, part: i32) -> Result<()> {
        let range = self.part_range();
        if !range.contains(part) {
            return Err(ReshapeError::PartOutOfRange {
                part,
                range,
                src: self.src,
                dst: self.dst,
            });
        }
        Ok(())
    }
}

/// Computes the direction, ratio and legal parts of reshaping `src` into `dst`.
///
/// Fails when neither block size divides the other.
pub fn relation(src: Shape, dst: Shape, lanewise: bool) -> Result<Relation> {
    let source_block = if lanewise {
        src.lanes()
            .checked_mul(dst.kind().width())
            .ok_or_else(|| {
                invalid_shape(format!("{src} converted to {} overflows", dst.kind()))
            })?
    } else {
        src.byte_size()
    };
    let dest_block = dst.byte_size();

    let larger = source_block.max(dest_block);
    let smaller = source_block.min(dest_block);
    if smaller == 0 {
        return Err(invalid_shape(format!("{src} -> {dst} has an empty block")));
    }
    if larger % smaller != 0 {
        return Err(ReshapeError::NonIntegralRatio {
            src,
            dst,
            source_block,
            dest_block,
        });
    }
    let ratio = larger / smaller;
    if i32::try_from(ratio).is_err() {
        return Err(invalid_shape(format!(
            "ratio {ratio} between {src} and {dst} does not fit a part index"
        )));
    }

    let direction = match source_block.cmp(&dest_block) {
        std::cmp::Ordering::Greater => Direction::Expand,
        std::cmp::Ordering::Less => Direction::Contract,
        std::cmp::Ordering::Equal => Direction::Equal,
    };

    log::trace!(
        "relation {src} -> {dst} lanewise={lanewise}: {direction:?} ratio={ratio} block={smaller}"
    );

    Ok(Relation {
        src,
        dst,
        lanewise,
        direction,
        ratio,
        source_block,
        dest_block,
        block_bytes: smaller,
    })
}
