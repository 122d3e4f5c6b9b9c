//! Conformance checks over every pair of vector species.
//!
//! Two entry points:
//!
//! - [`verify`] compares an external runtime's reshape output against the model
//!   for every legal part of one shape pair.
//! - [`sweep`] runs the model against its own invariants for every ordered pair
//!   of species up to a configured vector size:
//!   - **completeness**: expanding parts reassemble into the whole source stream,
//!   - **zero fill**: contracting parts leave everything outside the moved block zero,
//!   - **round trip**: reshaping back with the opposite part restores the
//!     zero-padded input (lanewise pairs only when the cast is lossless).
//!
//! # Configuration
//!
//! [`SweepConfig::from_env`] reads these overrides on top of the defaults:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `VECSHAPE_MAX_BITS` | largest vector size swept, in bits | 512 |
//! | `VECSHAPE_ENDIAN` | `little` or `big` | native |
//! | `VECSHAPE_PARALLEL` | `0`/`false` runs on one thread | parallel |

use std::env;
use std::fmt;

use rayon::prelude::*;
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::element::{Element, ElementKind, Endianness};
use crate::error::{invalid_shape, Result};
use crate::mismatch::mismatch;
use crate::reshape::{expand_all_parts, reassemble, reshape, ReshapeResult};
use crate::sequence::Sequence;
use crate::shape::{relation, Direction, Shape, VECTOR_BITS};

// ================================================================================================
// CONFIGURATION
// ================================================================================================

/// Knobs for [`sweep`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Largest vector size swept, in bits. A size outside [`VECTOR_BITS`] is
    /// swept as an extra "max" species.
    #[serde(
        default = "default_max_vector_bits",
        deserialize_with = "deserialize_max_vector_bits"
    )]
    pub max_vector_bits: usize,
    #[serde(default)]
    pub endianness: Endianness,
    /// Check lanewise casts.
    #[serde(default = "default_true")]
    pub lanewise: bool,
    /// Check raw reinterpretations.
    #[serde(default = "default_true")]
    pub reinterpret: bool,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_max_vector_bits() -> usize {
    512
}

fn default_true() -> bool {
    true
}

/// Vector sizes are swept in whole 64-bit steps.
fn is_valid_max_vector_bits(bits: usize) -> bool {
    bits > 0 && bits % 64 == 0
}

fn deserialize_max_vector_bits<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let bits = usize::deserialize(deserializer)?;
    if !is_valid_max_vector_bits(bits) {
        return Err(de::Error::custom(format!(
            "max_vector_bits {bits} is not a positive multiple of 64"
        )));
    }
    Ok(bits)
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            max_vector_bits: default_max_vector_bits(),
            endianness: Endianness::native(),
            lanewise: true,
            reinterpret: true,
            parallel: true,
        }
    }
}

impl SweepConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = SweepConfig::default();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Rejects a `max_vector_bits` that is not a positive multiple of 64.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_max_vector_bits(self.max_vector_bits) {
            return Err(invalid_shape(format!(
                "max_vector_bits {} is not a positive multiple of 64",
                self.max_vector_bits
            )));
        }
        Ok(())
    }

    /// Applies overrides looked up through `lookup`. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("VECSHAPE_MAX_BITS") {
            match raw.trim().parse::<usize>() {
                Ok(bits) if is_valid_max_vector_bits(bits) => {
                    log::debug!("VECSHAPE_MAX_BITS override: {bits}");
                    self.max_vector_bits = bits;
                }
                _ => log::warn!(
                    "ignoring VECSHAPE_MAX_BITS={raw:?}: expected a positive multiple of 64"
                ),
            }
        }
        if let Some(raw) = lookup("VECSHAPE_ENDIAN") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "little" | "le" => self.endianness = Endianness::Little,
                "big" | "be" => self.endianness = Endianness::Big,
                "native" => self.endianness = Endianness::native(),
                _ => log::warn!("ignoring VECSHAPE_ENDIAN={raw:?}: expected little, big or native"),
            }
            log::debug!("endianness: {:?}", self.endianness);
        }
        if let Some(raw) = lookup("VECSHAPE_PARALLEL") {
            self.parallel = !matches!(raw.trim(), "0" | "false" | "no" | "off");
            log::debug!("parallel sweep: {}", self.parallel);
        }
    }
}

/// Every species up to `max_bits`: each [`VECTOR_BITS`] size that fits, plus
/// `max_bits` itself when it is not one of them, times every element kind.
pub fn all_species(max_bits: usize) -> Vec<Shape> {
    let mut sizes: Vec<usize> = VECTOR_BITS.iter().copied().filter(|&b| b <= max_bits).collect();
    if is_valid_max_vector_bits(max_bits) && !sizes.contains(&max_bits) {
        sizes.push(max_bits);
    }
    sizes
        .into_iter()
        .flat_map(|bits| {
            ElementKind::ALL
                .into_iter()
                .filter_map(move |kind| Shape::from_bits(kind, bits).ok())
        })
        .collect()
}

// ================================================================================================
// RUNTIME VERIFICATION
// ================================================================================================

/// One part where a runtime disagreed with the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub src: Shape,
    pub dst: Shape,
    pub lanewise: bool,
    pub part: i32,
    /// Offset of the moved block in the model's output stream.
    pub origin: usize,
    /// Offset into the raw input where the part was read.
    pub source_origin: usize,
    /// First differing byte, or `None` when only the kinds differ.
    pub first_mismatch: Option<usize>,
    pub expected: Sequence,
    pub actual: Sequence,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}), part={}, origin={}, source origin={}",
            self.src,
            self.dst,
            if self.lanewise { "lanewise" } else { "reinterpret" },
            self.part,
            self.origin,
            self.source_origin
        )?;
        match self.first_mismatch {
            Some(i) => write!(f, ", first differing byte {i}"),
            None => write!(f, ", kind {} != {}", self.actual.kind(), self.expected.kind()),
        }
    }
}

/// Views a sequence's bytes as `I8` lanes so the oracle can compare any two
/// outputs byte for byte.
fn byte_view(seq: &Sequence) -> Sequence {
    Sequence::from_raw_parts(ElementKind::I8, seq.endianness(), seq.as_bytes().to_vec())
}

/// Runs `runtime` for every legal part of `src -> dst` and reports each part
/// whose output differs from the model.
///
/// `runtime` receives the part index and returns what the implementation
/// under test produced.
pub fn verify<F>(
    src: Shape,
    dst: Shape,
    input: &Sequence,
    lanewise: bool,
    mut runtime: F,
) -> Result<Vec<Discrepancy>>
where
    F: FnMut(i32) -> Sequence,
{
    let mut found = Vec::new();
    for expected in expand_all_parts(src, dst, input, lanewise)? {
        let actual = runtime(expected.part);
        let first_mismatch = if actual.kind() != expected.output.kind() {
            None
        } else {
            match mismatch(&byte_view(&expected.output), &byte_view(&actual))? {
                None => continue,
                some => some,
            }
        };
        let discrepancy = Discrepancy {
            src,
            dst,
            lanewise,
            part: expected.part,
            origin: expected.origin,
            source_origin: expected.source_origin,
            first_mismatch,
            expected: expected.output,
            actual,
        };
        log::warn!("{discrepancy}");
        found.push(discrepancy);
    }
    Ok(found)
}

// ================================================================================================
// MODEL SWEEP
// ================================================================================================

/// The invariant a sweep failure broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Invariant {
    Completeness,
    ZeroFill,
    RoundTrip,
    /// The model itself returned an error for a pair it should accept.
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepFailure {
    pub src: Shape,
    pub dst: Shape,
    pub lanewise: bool,
    pub invariant: Invariant,
    pub part: Option<i32>,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Ordered (source, destination, mode) triples checked.
    pub pairs: usize,
    /// Individual reshapes computed across all pairs.
    pub parts: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Deterministic input: a mix of small positive and negative values.
fn sweep_input(shape: Shape, endianness: Endianness) -> Sequence {
    Sequence::from_fn(shape.kind(), shape.lanes(), |i| Element::I64(i as i64 * 37 % 101 - 50))
        .with_endianness(endianness)
}

/// Zeros everywhere except `bytes[start..start + len]`, copied from `seq`.
fn keep_only(seq: &Sequence, start: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; seq.byte_len()];
    out[start..start + len].copy_from_slice(&seq.as_bytes()[start..start + len]);
    out
}

struct PairCheck {
    src: Shape,
    dst: Shape,
    lanewise: bool,
    parts: usize,
    failures: Vec<SweepFailure>,
}

impl PairCheck {
    fn fail(&mut self, invariant: Invariant, part: Option<i32>, detail: impl Into<String>) {
        self.failures.push(SweepFailure {
            src: self.src,
            dst: self.dst,
            lanewise: self.lanewise,
            invariant,
            part,
            detail: detail.into(),
        });
    }

    fn run(&mut self, endianness: Endianness) -> Result<()> {
        let (src, dst, lanewise) = (self.src, self.dst, self.lanewise);
        let input = sweep_input(src, endianness);
        let rel = relation(src, dst, lanewise)?;
        let stream = if lanewise {
            input.convert(dst.kind())
        } else {
            input.clone()
        };
        // A lanewise round trip only restores the input when the cast is lossless.
        let reversible = !lanewise || stream.convert(src.kind()) == input;

        let parts = expand_all_parts(src, dst, &input, lanewise)?;
        self.parts += parts.len();

        match rel.direction {
            Direction::Expand => {
                if reassemble(&parts)?.as_bytes() != stream.as_bytes() {
                    self.fail(
                        Invariant::Completeness,
                        None,
                        "reassembled parts differ from source",
                    );
                }
            }
            Direction::Contract => {
                for p in &parts {
                    self.check_zero_fill(p);
                    let touched = p.touched();
                    if p.output.as_bytes()[touched] != *stream.as_bytes() {
                        self.fail(
                            Invariant::Completeness,
                            Some(p.part),
                            "moved block differs from source",
                        );
                    }
                }
            }
            Direction::Equal => {
                if parts[0].output.as_bytes() != stream.as_bytes() {
                    self.fail(Invariant::Completeness, Some(0), "copy differs from source");
                }
            }
        }

        if reversible {
            for p in &parts {
                self.check_round_trip(&input, p)?;
            }
        }
        Ok(())
    }

    fn check_zero_fill(&mut self, p: &ReshapeResult) {
        let touched = p.touched();
        let bytes = p.output.as_bytes();
        let dirty = bytes[..touched.start]
            .iter()
            .chain(&bytes[touched.end..])
            .any(|&b| b != 0);
        if dirty {
            self.fail(
                Invariant::ZeroFill,
                Some(p.part),
                "padding outside the moved block is not zero",
            );
        }
    }

    /// Reshapes `p` back into the source shape with the opposite part.
    fn check_round_trip(&mut self, input: &Sequence, p: &ReshapeResult) -> Result<()> {
        let back = reshape(self.dst, self.src, &p.output, -p.part, self.lanewise)?;
        let expected = match p.direction {
            Direction::Expand => {
                let len = if self.lanewise {
                    p.block_bytes / self.dst.kind().width() * self.src.kind().width()
                } else {
                    p.block_bytes
                };
                keep_only(input, p.source_origin, len)
            }
            Direction::Contract | Direction::Equal => input.as_bytes().to_vec(),
        };
        if back.output.as_bytes() != expected.as_slice() {
            self.fail(
                Invariant::RoundTrip,
                Some(p.part),
                "reshaping back did not restore the input",
            );
        }
        Ok(())
    }
}

fn check_pair(src: Shape, dst: Shape, lanewise: bool, endianness: Endianness) -> PairCheck {
    let mut check = PairCheck {
        src,
        dst,
        lanewise,
        parts: 0,
        failures: Vec::new(),
    };
    if let Err(err) = check.run(endianness) {
        check.fail(Invariant::Model, None, err.to_string());
    }
    check
}

/// Checks the model's invariants for every ordered species pair.
pub fn sweep(config: &SweepConfig) -> SweepReport {
    if let Err(err) = config.validate() {
        log::warn!("{err}; sweeping only the fixed sizes below it");
    }
    let species = all_species(config.max_vector_bits);
    let modes: Vec<bool> = [(config.reinterpret, false), (config.lanewise, true)]
        .into_iter()
        .filter_map(|(enabled, lanewise)| enabled.then_some(lanewise))
        .collect();

    let jobs: Vec<(Shape, Shape, bool)> = species
        .iter()
        .flat_map(|&a| species.iter().map(move |&b| (a, b)))
        .flat_map(|(a, b)| modes.iter().map(move |&lanewise| (a, b, lanewise)))
        .collect();

    log::debug!(
        "sweeping {} species, {} jobs, parallel={}",
        species.len(),
        jobs.len(),
        config.parallel
    );

    let endianness = config.endianness;
    let checks: Vec<PairCheck> = if config.parallel {
        jobs.par_iter()
            .map(|&(a, b, lanewise)| check_pair(a, b, lanewise, endianness))
            .collect()
    } else {
        jobs.iter()
            .map(|&(a, b, lanewise)| check_pair(a, b, lanewise, endianness))
            .collect()
    };

    let mut report = SweepReport {
        pairs: checks.len(),
        ..SweepReport::default()
    };
    for check in checks {
        report.parts += check.parts;
        report.failures.extend(check.failures);
    }

    for failure in &report.failures {
        log::warn!(
            "{:?} broken for {} -> {} (lanewise={}, part={:?}): {}",
            failure.invariant,
            failure.src,
            failure.dst,
            failure.lanewise,
            failure.part,
            failure.detail
        );
    }
    log::debug!(
        "sweep done: {} pairs, {} parts, {} failures",
        report.pairs,
        report.parts,
        report.failures.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_species_default() {
        let species = all_species(512);
        assert_eq!(species.len(), VECTOR_BITS.len() * ElementKind::ALL.len());
        assert!(species.contains(&Shape::from_bits(ElementKind::F64, 512).unwrap()));
    }

    #[test]
    fn test_all_species_adds_max_size() {
        let species = all_species(1024);
        assert!(species.contains(&Shape::from_bits(ElementKind::I8, 1024).unwrap()));
        assert_eq!(all_species(128).len(), 2 * ElementKind::ALL.len());
    }

    #[test]
    fn test_overrides() {
        let mut config = SweepConfig::default();
        config.apply_overrides(|key| match key {
            "VECSHAPE_MAX_BITS" => Some("256".to_string()),
            "VECSHAPE_ENDIAN" => Some("big".to_string()),
            "VECSHAPE_PARALLEL" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.max_vector_bits, 256);
        assert_eq!(config.endianness, Endianness::Big);
        assert!(!config.parallel);
    }

    #[test]
    fn test_validate() {
        assert!(SweepConfig::default().validate().is_ok());
        let config = SweepConfig {
            max_vector_bits: 100,
            ..SweepConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(crate::ReshapeError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_bad_override_is_ignored() {
        let mut config = SweepConfig::default();
        config.apply_overrides(|key| (key == "VECSHAPE_MAX_BITS").then(|| "100".to_string()));
        assert_eq!(config.max_vector_bits, 512);
    }

    #[test]
    fn test_verify_accepts_the_model() {
        let src = Shape::new(4, ElementKind::I32).unwrap();
        let dst = Shape::new(8, ElementKind::I16).unwrap();
        let input = Sequence::from_lanes(&[1i32, -2, 3, -4]);
        let found = verify(src, dst, &input, false, |part| {
            reshape(src, dst, &input, part, false).unwrap().output
        })
        .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_verify_reports_wrong_part() {
        let src = Shape::new(4, ElementKind::I32).unwrap();
        let dst = Shape::new(2, ElementKind::I32).unwrap();
        let input = Sequence::from_lanes(&[1i32, 2, 3, 4]);
        // A runtime that ignores the part index and always returns part 0.
        let found = verify(src, dst, &input, false, |_| Sequence::from_lanes(&[1i32, 2])).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].part, 1);
        assert_eq!(found[0].origin, 8);
        assert_eq!(found[0].source_origin, 8);
        assert!(found[0].first_mismatch.is_some());
        assert!(found[0].to_string().contains("part=1"));
    }

    #[test]
    fn test_small_sweep_is_clean() {
        let config = SweepConfig {
            max_vector_bits: 128,
            parallel: false,
            ..SweepConfig::default()
        };
        let report = sweep(&config);
        assert!(report.is_clean(), "{:?}", report.failures);
        assert_eq!(report.pairs, 12 * 12 * 2);
    }
}
