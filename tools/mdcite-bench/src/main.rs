use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use mdcite_parser::{FileCache, MarkdownParser, ParsedFileCache};
use mdcite_validator::CitationValidator;

#[derive(Parser)]
#[command(author, version, about = "Benchmark harness for mdcite operations")]
struct Args {
    /// Scope directory to benchmark against
    #[arg(long, value_name = "PATH")]
    scope: PathBuf,

    /// Number of warm-up iterations (not counted in results)
    #[arg(long, default_value_t = 1)]
    warmup: usize,

    /// Number of measured iterations
    #[arg(long, default_value_t = 3)]
    iterations: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let file_cache = Arc::new(
        FileCache::build(&args.scope, None)
            .with_context(|| format!("index scope {}", args.scope.display()))?,
    );
    let targets = file_cache.files().to_vec();
    let scope_root = file_cache.stats().real_scope_folder;
    println!("benchmarking over {} files\n", targets.len());

    let parse_result = benchmark("parse", args.warmup, args.iterations, || {
        let parser = MarkdownParser::new();
        for path in &targets {
            parser.parse_file(path)?;
        }
        Ok(())
    })?;

    let scan_result = benchmark("validate-scope", args.warmup, args.iterations, || {
        // Fresh caches per iteration so every run parses from scratch.
        let validator = CitationValidator::new(
            Arc::new(ParsedFileCache::new()),
            Arc::clone(&file_cache),
        );
        validator.validate_scope(&targets, &scope_root)?;
        Ok(())
    })?;

    print_summary(&[parse_result, scan_result]);
    Ok(())
}

struct BenchResult {
    name: String,
    iterations: usize,
    average: Duration,
    median: Duration,
}

fn benchmark<F>(name: &str, warmup: usize, iterations: usize, mut f: F) -> Result<BenchResult>
where
    F: FnMut() -> Result<()>,
{
    for _ in 0..warmup {
        f()?;
    }

    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        f()?;
        samples.push(start.elapsed());
    }

    samples.sort();
    let total = samples
        .iter()
        .copied()
        .fold(Duration::ZERO, |acc, sample| acc + sample);
    let average = total / (iterations as u32);
    let median = samples[samples.len() / 2];

    Ok(BenchResult {
        name: name.to_string(),
        iterations,
        average,
        median,
    })
}

fn print_summary(results: &[BenchResult]) {
    println!("mdcite benchmark results:\n");
    for result in results {
        println!(
            "• {}: avg {:?} (median {:?}) over {} iterations",
            result.name, result.average, result.median, result.iterations
        );
    }
}
