use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use dji_xmp::DroneTelemetry;
use image_pairing::{
    build_records, resolve_pairs, DjiXmpSource, ImageRecord, MatchMode, MismatchPolicy,
    PairingConfig, PairingOutcome, ScanOptions,
};

#[derive(Parser)]
#[command(name = "dji-pairing")]
#[command(about = "Pair DJI DNG/JPG captures and export their flight telemetry")]
struct Cli {
    /// Folder containing the DNG and JPG captures
    path: PathBuf,

    /// Token identifying raw files
    #[arg(long, default_value = "DNG")]
    raw_format: String,

    /// Token identifying processed files
    #[arg(long, default_value = "JPG")]
    processed_format: String,

    /// How file names are matched against the format tokens
    #[arg(long, value_enum, default_value_t = MatchArg::Substring)]
    match_mode: MatchArg,

    /// Match format tokens case-insensitively
    #[arg(long)]
    ignore_case: bool,

    /// Skip captures that exist in only one format instead of failing
    #[arg(long)]
    drop_unpaired: bool,

    /// Write the records as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum MatchArg {
    Substring,
    Extension,
}

impl Cli {
    fn pairing_config(&self) -> PairingConfig {
        PairingConfig {
            raw_format: self.raw_format.clone(),
            processed_format: self.processed_format.clone(),
            scan: ScanOptions {
                match_mode: match self.match_mode {
                    MatchArg::Substring => MatchMode::Substring,
                    MatchArg::Extension => MatchMode::Extension,
                },
                ignore_case: self.ignore_case,
            },
            mismatch_policy: if self.drop_unpaired {
                MismatchPolicy::Intersect
            } else {
                MismatchPolicy::Positional
            },
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if !cli.path.is_dir() {
        bail!("Path is not a directory: {}", cli.path.display());
    }

    let config = cli.pairing_config();
    let outcome = resolve_pairs(&cli.path, &config)
        .with_context(|| format!("Failed to scan {}", cli.path.display()))?;

    let records = build_records(
        &outcome.names,
        &outcome.raw_paths,
        &outcome.processed_paths,
        &DjiXmpSource,
    )
    .with_context(|| format!("Failed to build image records for {}", cli.path.display()))?;

    print_summary(&cli.path, &outcome, &records);

    if let Some(output_path) = &cli.output {
        write_records(output_path, &records)?;
        println!("Records saved to: {}", output_path.display());
    }

    Ok(())
}

fn write_records(path: &Path, records: &[ImageRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)
        .context("Failed to serialize image records to JSON")?;

    std::fs::write(path, json)
        .with_context(|| format!("Failed to write output to {}", path.display()))
}

fn print_summary(folder: &Path, outcome: &PairingOutcome, records: &[ImageRecord]) {
    println!("\nPAIRING RESULTS: {}", folder.display());
    println!("==================");
    println!("Raw files:        {}", outcome.raw_paths.len());
    println!("Processed files:  {}", outcome.processed_paths.len());
    println!("Image records:    {}", records.len());

    if !outcome.raw_only.is_empty() {
        println!("Raw only:         {}", outcome.raw_only.join(", "));
    }
    if !outcome.processed_only.is_empty() {
        println!("Processed only:   {}", outcome.processed_only.join(", "));
    }

    let telemetry: Vec<DroneTelemetry> = records.iter().map(ImageRecord::telemetry).collect();

    let mut times: Vec<_> = telemetry.iter().filter_map(|t| t.created).collect();
    times.sort();
    if let (Some(first), Some(last)) = (times.first(), times.last()) {
        let duration = last.signed_duration_since(*first);
        println!(
            "Captured:         {} .. {} ({}s)",
            first.format("%Y-%m-%d %H:%M:%S"),
            last.format("%H:%M:%S"),
            duration.num_seconds()
        );
    }

    let altitudes: Vec<f64> = telemetry.iter().filter_map(|t| t.relative_altitude).collect();
    if !altitudes.is_empty() {
        let min = altitudes.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = altitudes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        println!("Altitude (rel):   {:.1} .. {:.1} m", min, max);
    }

    for (record, t) in records.iter().zip(&telemetry).take(3) {
        match t.position() {
            Some((lat, lon)) => println!("  {}  {:.6}, {:.6}", record.name(), lat, lon),
            None => println!("  {}  (no position)", record.name()),
        }
    }
    if records.len() > 3 {
        println!("  ... {} more", records.len() - 3);
    }
}
