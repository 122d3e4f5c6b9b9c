//! Scalar reference model for SIMD lane reshaping.
//!
//! `vecshape` computes, without any vector hardware, what a portable SIMD
//! runtime must produce when it casts a vector lane by lane into another shape
//! or reinterprets its bits as another shape. It is meant to be the oracle a
//! vectorized fast path is checked against.
//!
//! The crate is organized leaves first:
//!
//! - [`element`]: lane kinds, byte encoding and numeric conversion.
//! - [`sequence`]: immutable lane sequences stored as bytes.
//! - [`shape`]: shapes, block ratios and legal part indices.
//! - [`reshape`]: expected outputs of lanewise casts and reinterpretations.
//! - [`mismatch`]: mismatch, equality and comparison of sequences.
//! - [`conformance`]: checks a runtime (or the model itself) over every species pair.
//!
//! # Example
//!
//! ```rust
//! use vecshape::element::ElementKind;
//! use vecshape::reshape::{reassemble, expand_all_parts};
//! use vecshape::sequence::Sequence;
//! use vecshape::shape::Shape;
//!
//! let src = Shape::new(4, ElementKind::I32).unwrap();
//! let dst = Shape::new(2, ElementKind::I32).unwrap();
//! let input = Sequence::from_lanes(&[1i32, 2, 3, 4]);
//!
//! let parts = expand_all_parts(src, dst, &input, false).unwrap();
//! assert_eq!(parts.len(), 2);
//! assert_eq!(reassemble(&parts).unwrap(), input);
//! ```

pub mod conformance;
pub mod element;
pub mod error;
pub mod mismatch;
pub mod reshape;
pub mod sequence;
pub mod shape;

pub use error::{ReshapeError, Result};

/// Common-prefix size, in bytes, below which mismatch scans lane by lane.
pub const SIMD_THRESHOLD: usize = 64;

/// Common-prefix size, in bytes, above which mismatch scans in parallel.
pub const PARALLEL_THRESHOLD: usize = 1 << 18;

/// Bytes handed to each rayon task by the parallel mismatch scan.
pub const PARALLEL_CHUNK_SIZE: usize = 1 << 16;
