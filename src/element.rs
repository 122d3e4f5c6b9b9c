//! Element codec: lane kinds, byte encoding and numeric conversion.
//!
//! This module is the leaf of the crate. It knows how wide every lane kind is,
//! how a single lane value is laid out in memory for a given byte order, and how
//! a value of one kind converts numerically into another kind.
//!
//! # Conversion Rules
//!
//! [`convert_numeric`] is the oracle every lanewise cast is checked against. It
//! follows the host's native `as` cast exactly:
//!
//! | From → To | Behavior |
//! |-----------|----------|
//! | narrower int → wider int | sign extension |
//! | wider int → narrower int | low-order bits kept (truncation) |
//! | float → int | round toward zero, saturate at the bounds, NaN → 0 |
//! | int → float | nearest representable value |
//! | `F64` → `F32` | nearest representable value, overflow → ±∞ |
//! | `F32` → `F64` | exact |
//!
//! Every integer kind is signed, matching the host's `i8`/`i16`/`i32`/`i64`. A
//! byte literal above 127 handed to [`Element::from_literal`] as `I8` is read
//! through that convention, so `200` becomes `-56`.
//!
//! # Examples
//!
//! ```rust
//! use vecshape::element::{convert_numeric, Element, ElementKind};
//!
//! let widened = convert_numeric(Element::I8(-1), ElementKind::I8, ElementKind::I32).unwrap();
//! assert_eq!(widened, Element::I32(-1));
//!
//! let saturated = Element::F64(1e20).convert(ElementKind::I32);
//! assert_eq!(saturated, Element::I32(i32::MAX));
//! ```

use std::fmt;

use num::traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{unsupported_conversion, ReshapeError, Result};

// ================================================================================================
// ELEMENT KINDS
// ================================================================================================

/// The closed set of lane types a vector can hold.
///
/// Mask lanes are modeled as [`ElementKind::I8`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ElementKind {
    /// Every kind, narrowest integers first.
    pub const ALL: [ElementKind; 6] = [
        ElementKind::I8,
        ElementKind::I16,
        ElementKind::I32,
        ElementKind::I64,
        ElementKind::F32,
        ElementKind::F64,
    ];

    /// Width of one lane in bytes.
    #[inline(always)]
    pub const fn width(self) -> usize {
        match self {
            ElementKind::I8 => 1,
            ElementKind::I16 => 2,
            ElementKind::I32 | ElementKind::F32 => 4,
            ElementKind::I64 | ElementKind::F64 => 8,
        }
    }

    /// Width of one lane in bits.
    #[inline(always)]
    pub const fn bits(self) -> usize {
        self.width() * 8
    }

    #[inline(always)]
    pub const fn is_float(self) -> bool {
        matches!(self, ElementKind::F32 | ElementKind::F64)
    }

    /// All integer kinds are signed; floats carry a sign bit as well.
    #[inline(always)]
    pub const fn is_signed(self) -> bool {
        true
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::I8 => "I8",
            ElementKind::I16 => "I16",
            ElementKind::I32 => "I32",
            ElementKind::I64 => "I64",
            ElementKind::F32 => "F32",
            ElementKind::F64 => "F64",
        };
        f.write_str(name)
    }
}

/// Width of one lane of `kind` in bytes.
#[inline(always)]
pub const fn width_of(kind: ElementKind) -> usize {
    kind.width()
}

/// Byte order used to lay lanes out in a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the machine running this code.
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }
}

impl Default for Endianness {
    fn default() -> Self {
        Endianness::native()
    }
}

// ================================================================================================
// TYPED LANES
// ================================================================================================

mod sealed {
    pub trait Sealed {}
}

/// A primitive type that can be stored in a lane.
///
/// Implemented for `i8`, `i16`, `i32`, `i64`, `f32` and `f64`. The trait is sealed:
/// the set of lane kinds is closed and mirrors [`ElementKind`].
pub trait Lane: sealed::Sealed + Copy + Send + Sync + fmt::Debug + 'static {
    /// The kind this type is stored as.
    const KIND: ElementKind;

    /// Writes `self` into the first `KIND.width()` bytes of `out`.
    fn write_bytes(self, out: &mut [u8], endianness: Endianness);

    /// Reads a value from the first `KIND.width()` bytes of `bytes`.
    fn read_bytes(bytes: &[u8], endianness: Endianness) -> Self;

    fn into_element(self) -> Element;

    /// Returns `None` when `element` is of another kind.
    fn from_element(element: Element) -> Option<Self>;
}

macro_rules! impl_lane {
    ($t:ty, $variant:ident) => {
        impl sealed::Sealed for $t {}

        impl Lane for $t {
            const KIND: ElementKind = ElementKind::$variant;

            #[inline(always)]
            fn write_bytes(self, out: &mut [u8], endianness: Endianness) {
                let bytes = match endianness {
                    Endianness::Little => self.to_le_bytes(),
                    Endianness::Big => self.to_be_bytes(),
                };
                out[..bytes.len()].copy_from_slice(&bytes);
            }

            #[inline(always)]
            fn read_bytes(bytes: &[u8], endianness: Endianness) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                match endianness {
                    Endianness::Little => <$t>::from_le_bytes(buf),
                    Endianness::Big => <$t>::from_be_bytes(buf),
                }
            }

            #[inline(always)]
            fn into_element(self) -> Element {
                Element::$variant(self)
            }

            #[inline(always)]
            fn from_element(element: Element) -> Option<Self> {
                match element {
                    Element::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_lane!(i8, I8);
impl_lane!(i16, I16);
impl_lane!(i32, I32);
impl_lane!(i64, I64);
impl_lane!(f32, F32);
impl_lane!(f64, F64);

// ================================================================================================
// ELEMENT VALUES
// ================================================================================================

/// A single lane value tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Element {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

/// Casts any element value to `T` with the native `as` semantics.
#[inline(always)]
fn cast_element<T>(value: Element) -> T
where
    T: Copy + 'static,
    i8: AsPrimitive<T>,
    i16: AsPrimitive<T>,
    i32: AsPrimitive<T>,
    i64: AsPrimitive<T>,
    f32: AsPrimitive<T>,
    f64: AsPrimitive<T>,
{
    match value {
        Element::I8(v) => v.as_(),
        Element::I16(v) => v.as_(),
        Element::I32(v) => v.as_(),
        Element::I64(v) => v.as_(),
        Element::F32(v) => v.as_(),
        Element::F64(v) => v.as_(),
    }
}

impl Element {
    pub const fn kind(&self) -> ElementKind {
        match self {
            Element::I8(_) => ElementKind::I8,
            Element::I16(_) => ElementKind::I16,
            Element::I32(_) => ElementKind::I32,
            Element::I64(_) => ElementKind::I64,
            Element::F32(_) => ElementKind::F32,
            Element::F64(_) => ElementKind::F64,
        }
    }

    /// The numeric zero of `kind`, whose encoding is all zero bits.
    pub const fn zero(kind: ElementKind) -> Self {
        match kind {
            ElementKind::I8 => Element::I8(0),
            ElementKind::I16 => Element::I16(0),
            ElementKind::I32 => Element::I32(0),
            ElementKind::I64 => Element::I64(0),
            ElementKind::F32 => Element::F32(0.0),
            ElementKind::F64 => Element::F64(0.0),
        }
    }

    /// Builds a value of `kind` from an integer literal.
    ///
    /// Integer kinds keep the low-order bits of `literal`, so `from_literal(I8, 200)`
    /// is `I8(-56)`. Float kinds receive the nearest representable value.
    pub fn from_literal(kind: ElementKind, literal: i64) -> Self {
        Element::I64(literal).convert(kind)
    }

    /// Converts this value to `to` with the native cast semantics.
    pub fn convert(self, to: ElementKind) -> Element {
        match to {
            ElementKind::I8 => Element::I8(cast_element(self)),
            ElementKind::I16 => Element::I16(cast_element(self)),
            ElementKind::I32 => Element::I32(cast_element(self)),
            ElementKind::I64 => Element::I64(cast_element(self)),
            ElementKind::F32 => Element::F32(cast_element(self)),
            ElementKind::F64 => Element::F64(cast_element(self)),
        }
    }

    /// Writes this value into the first `kind().width()` bytes of `out`.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than one lane.
    #[inline(always)]
    pub fn encode_into(self, out: &mut [u8], endianness: Endianness) {
        match self {
            Element::I8(v) => v.write_bytes(out, endianness),
            Element::I16(v) => v.write_bytes(out, endianness),
            Element::I32(v) => v.write_bytes(out, endianness),
            Element::I64(v) => v.write_bytes(out, endianness),
            Element::F32(v) => v.write_bytes(out, endianness),
            Element::F64(v) => v.write_bytes(out, endianness),
        }
    }

    pub fn encode(self, endianness: Endianness) -> Vec<u8> {
        let mut out = vec![0u8; self.kind().width()];
        self.encode_into(&mut out, endianness);
        out
    }

    /// Reads one lane of `kind` from the front of `bytes` without length checks
    /// beyond the slice bounds.
    #[inline(always)]
    pub(crate) fn read_lane(bytes: &[u8], kind: ElementKind, endianness: Endianness) -> Self {
        match kind {
            ElementKind::I8 => Element::I8(i8::read_bytes(bytes, endianness)),
            ElementKind::I16 => Element::I16(i16::read_bytes(bytes, endianness)),
            ElementKind::I32 => Element::I32(i32::read_bytes(bytes, endianness)),
            ElementKind::I64 => Element::I64(i64::read_bytes(bytes, endianness)),
            ElementKind::F32 => Element::F32(f32::read_bytes(bytes, endianness)),
            ElementKind::F64 => Element::F64(f64::read_bytes(bytes, endianness)),
        }
    }

    /// Decodes exactly one lane of `kind`.
    pub fn decode(bytes: &[u8], kind: ElementKind, endianness: Endianness) -> Result<Self> {
        if bytes.len() != kind.width() {
            return Err(ReshapeError::ByteLength {
                kind,
                len: bytes.len(),
                width: kind.width(),
            });
        }
        Ok(Self::read_lane(bytes, kind, endianness))
    }
}

// ================================================================================================
// CODEC CONTRACT
// ================================================================================================

/// Encodes `value` as one lane of `kind`.
///
/// Fails when `value` is not of `kind`; a value is never silently converted here.
pub fn encode(value: Element, kind: ElementKind, endianness: Endianness) -> Result<Vec<u8>> {
    if value.kind() != kind {
        return Err(ReshapeError::KindMismatch {
            left: value.kind(),
            right: kind,
        });
    }
    Ok(value.encode(endianness))
}

/// Decodes one lane of `kind` from exactly `kind.width()` bytes.
pub fn decode(bytes: &[u8], kind: ElementKind, endianness: Endianness) -> Result<Element> {
    Element::decode(bytes, kind, endianness)
}

/// Converts `value`, which must be of kind `from`, into kind `to`.
pub fn convert_numeric(value: Element, from: ElementKind, to: ElementKind) -> Result<Element> {
    if value.kind() != from {
        return Err(unsupported_conversion(
            from,
            to,
            format!("value is {}, not {}", value.kind(), from),
        ));
    }
    Ok(value.convert(to))
}

// ================================================================================================
// BYTE-LEVEL INTEGER REBRACKETING
// ================================================================================================

/// Resizes every integer lane of `data` from `from` to `to` by moving bytes.
///
/// This works purely on the byte stream: narrowing drops the high-order bytes of
/// each lane, widening appends copies of the sign byte. It is an independent
/// oracle for the integer half of [`convert_numeric`] and must agree with it.
///
/// Float kinds have no byte-level rebracketing and are rejected.
pub fn rebracket_integer_bytes(
    data: &[u8],
    from: ElementKind,
    to: ElementKind,
    endianness: Endianness,
) -> Result<Vec<u8>> {
    if from.is_float() || to.is_float() {
        return Err(unsupported_conversion(
            from,
            to,
            "byte rebracketing is only defined for integer lanes",
        ));
    }
    let (asize, bsize) = (from.width(), to.width());
    if data.len() % asize != 0 {
        return Err(ReshapeError::ByteLength {
            kind: from,
            len: data.len(),
            width: asize,
        });
    }
    if from == to {
        return Ok(data.to_vec());
    }

    let count = data.len() / asize;
    let keep = asize.min(bsize);
    let pad = bsize.saturating_sub(asize);
    let mut result = Vec::with_capacity(count * bsize);

    for lane in data.chunks_exact(asize) {
        match endianness {
            Endianness::Little => {
                let low = &lane[..keep];
                result.extend_from_slice(low);
                let sign = sign_fill(low[keep - 1]);
                result.extend(std::iter::repeat(sign).take(pad));
            }
            Endianness::Big => {
                // Most significant byte first; the sign lives in lane[0].
                let sign = sign_fill(lane[0]);
                result.extend(std::iter::repeat(sign).take(pad));
                result.extend_from_slice(&lane[asize - keep..]);
            }
        }
    }

    debug_assert_eq!(result.len(), count * bsize);
    Ok(result)
}

#[inline(always)]
fn sign_fill(top: u8) -> u8 {
    if (top as i8) < 0 {
        0xFF
    } else {
        0x00
    }
}
