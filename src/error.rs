//! Error types for vecshape operations.
//!
//! Every error in this module is a configuration error: the caller asked for a
//! reshape, conversion or comparison that has no defined meaning. Operations
//! return these before producing any output, so a failed call never leaves a
//! partially written result behind.

use thiserror::Error;

use crate::element::ElementKind;
use crate::shape::{PartRange, Shape};

/// Errors that can occur during vecshape operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReshapeError {
    /// The part index is outside the range computed for the shape pair.
    #[error("part {part} is out of range {range} for {src} -> {dst}")]
    PartOutOfRange {
        /// The rejected part index.
        part: i32,
        /// The legal range for this transform.
        range: PartRange,
        /// Source shape.
        src: Shape,
        /// Destination shape.
        dst: Shape,
    },
    /// The two block sizes do not divide one another.
    #[error("no integral ratio between {src} ({source_block} B) and {dst} ({dest_block} B)")]
    NonIntegralRatio {
        /// Source shape.
        src: Shape,
        /// Destination shape.
        dst: Shape,
        /// Compared size of the source block, in bytes.
        source_block: usize,
        /// Compared size of the destination block, in bytes.
        dest_block: usize,
    },
    /// The requested conversion is not defined for this pair of kinds.
    #[error("unsupported conversion {from} -> {to}: {message}")]
    UnsupportedConversion {
        /// Kind converted from.
        from: ElementKind,
        /// Kind converted to.
        to: ElementKind,
        /// Human-readable error message.
        message: String,
    },
    /// The input sequence does not have the layout of the source shape.
    #[error("input {kind} x {lanes} does not match source shape {expected}")]
    InputShapeMismatch {
        /// The expected source shape.
        expected: Shape,
        /// Kind of the supplied sequence.
        kind: ElementKind,
        /// Lane count of the supplied sequence.
        lanes: usize,
    },
    /// A byte buffer is not a whole number of elements.
    #[error("byte length {len} is not a multiple of {kind} width {width}")]
    ByteLength {
        /// Element kind the bytes were decoded as.
        kind: ElementKind,
        /// Length of the supplied buffer.
        len: usize,
        /// Width of one element.
        width: usize,
    },
    /// Two sequences of different element kinds were compared.
    #[error("cannot compare {left} with {right}")]
    KindMismatch {
        /// Kind of the left operand.
        left: ElementKind,
        /// Kind of the right operand.
        right: ElementKind,
    },
    /// A range does not fit inside its sequence.
    #[error("range {start}..{end} is out of bounds for length {len}")]
    RangeOutOfBounds {
        /// Range start.
        start: usize,
        /// Range end.
        end: usize,
        /// Length of the sequence.
        len: usize,
    },
    /// A shape could not be constructed.
    #[error("invalid shape: {message}")]
    InvalidShape {
        /// Human-readable error message.
        message: String,
    },
}

/// Result type alias for vecshape operations.
pub type Result<T> = std::result::Result<T, ReshapeError>;

/// Creates an unsupported conversion error.
pub fn unsupported_conversion(
    from: ElementKind,
    to: ElementKind,
    message: impl Into<String>,
) -> ReshapeError {
    ReshapeError::UnsupportedConversion {
        from,
        to,
        message: message.into(),
    }
}

/// Creates an invalid shape error.
pub fn invalid_shape(message: impl Into<String>) -> ReshapeError {
    ReshapeError::InvalidShape {
        message: message.into(),
    }
}

/// Checks that `start..end` lies inside a sequence of length `len`.
pub(crate) fn check_range(start: usize, end: usize, len: usize) -> Result<()> {
    if start > end || end > len {
        return Err(ReshapeError::RangeOutOfBounds { start, end, len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_out_of_range_display() {
        let src = Shape::new(4, ElementKind::I32).unwrap();
        let dst = Shape::new(2, ElementKind::I32).unwrap();
        let error = ReshapeError::PartOutOfRange {
            part: 2,
            range: PartRange::new(0, 1),
            src,
            dst,
        };
        let display = format!("{}", error);
        assert!(display.contains("part 2"));
        assert!(display.contains("[0, 1]"));
        assert!(display.contains("I32x4 -> I32x2"));
    }

    #[test]
    fn test_unsupported_conversion_display() {
        let error = unsupported_conversion(ElementKind::F32, ElementKind::I8, "float bytes");
        let display = format!("{}", error);
        assert!(display.contains("unsupported conversion"));
        assert!(display.contains("F32 -> I8"));
        assert!(display.contains("float bytes"));
    }

    #[test]
    fn test_invalid_shape_display() {
        let error = invalid_shape("lane count must be positive");
        let display = format!("{}", error);
        assert!(display.contains("invalid shape"));
        assert!(display.contains("lane count must be positive"));
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(0, 0, 0).is_ok());
        assert!(check_range(2, 5, 5).is_ok());
        assert_eq!(
            check_range(3, 2, 5),
            Err(ReshapeError::RangeOutOfBounds {
                start: 3,
                end: 2,
                len: 5
            })
        );
        assert!(check_range(0, 6, 5).is_err());
    }

    #[test]
    fn test_error_equality() {
        let error1 = invalid_shape("test");
        let error2 = invalid_shape("test");
        let error3 = invalid_shape("other");

        assert_eq!(error1, error2);
        assert_ne!(error1, error3);
    }

    #[test]
    fn test_error_trait_implementation() {
        let error = invalid_shape("test error");

        let _: &dyn std::error::Error = &error;
        assert!(std::error::Error::source(&error).is_none());
    }
}
