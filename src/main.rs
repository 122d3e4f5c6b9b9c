// Runs the conformance sweep over every species pair and prints a summary.
// Configure with VECSHAPE_MAX_BITS, VECSHAPE_ENDIAN and VECSHAPE_PARALLEL.
use std::process::ExitCode;
use std::time::Instant;

use vecshape::conformance::{all_species, sweep, SweepConfig};

fn main() -> ExitCode {
    let config = SweepConfig::from_env();
    if let Err(err) = config.validate() {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }
    println!(
        "sweeping {} species up to {} bits ({:?}, lanewise={}, reinterpret={}, parallel={})",
        all_species(config.max_vector_bits).len(),
        config.max_vector_bits,
        config.endianness,
        config.lanewise,
        config.reinterpret,
        config.parallel
    );

    let start = Instant::now();
    let report = sweep(&config);
    let elapsed = start.elapsed();

    println!(
        "{} pairs, {} parts checked in {:.2?}",
        report.pairs, report.parts, elapsed
    );

    if report.is_clean() {
        println!("all invariants hold");
        return ExitCode::SUCCESS;
    }

    for failure in &report.failures {
        let part = failure
            .part
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:?}: {} -> {} lanewise={} part={part}: {}",
            failure.invariant, failure.src, failure.dst, failure.lanewise, failure.detail
        );
    }
    println!("{} failures", report.failures.len());
    ExitCode::FAILURE
}
