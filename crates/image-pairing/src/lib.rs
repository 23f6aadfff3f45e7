//! Raw/processed image pairing for drone survey folders
//!
//! A DJI survey folder holds each capture twice: a DNG carrying the flight
//! telemetry and a JPG for viewing. This crate pairs the two by base name and
//! builds one [`ImageRecord`] per capture with its normalized telemetry.

pub mod error;
pub mod pairing;
pub mod record;
pub mod scan;

pub use error::{PairingError, Result};
pub use pairing::{pair_paths, resolve_pairs, MismatchPolicy, PairingOutcome};
pub use record::{build_records, DjiXmpSource, ImageRecord, MetadataSource};
pub use scan::{base_name, list_images, scan_directory, MatchMode, ScanOptions, DEFAULT_FORMAT};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Format tokens and matching rules for a pairing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    pub raw_format: String,
    pub processed_format: String,
    pub scan: ScanOptions,
    pub mismatch_policy: MismatchPolicy,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            raw_format: "DNG".to_string(),
            processed_format: DEFAULT_FORMAT.to_string(),
            scan: ScanOptions::default(),
            mismatch_policy: MismatchPolicy::default(),
        }
    }
}

/// Pair the captures in `dir` and read the telemetry of each raw file.
pub fn load_images(dir: &Path, config: &PairingConfig) -> Result<Vec<ImageRecord>> {
    load_images_with(dir, config, &DjiXmpSource)
}

/// [`load_images`] with a custom metadata source
pub fn load_images_with<S>(dir: &Path, config: &PairingConfig, source: &S) -> Result<Vec<ImageRecord>>
where
    S: MetadataSource + ?Sized,
{
    let outcome = resolve_pairs(dir, config)?;
    let records = build_records(
        &outcome.names,
        &outcome.raw_paths,
        &outcome.processed_paths,
        source,
    )?;

    log::info!("{}: loaded {} image records", dir.display(), records.len());
    Ok(records)
}
