//! Raw/processed pairing by shared base name
//!
//! Both formats are scanned from the same directory and matched on the file
//! name without its extension. When the name sets differ a warning is logged
//! and the mismatch policy decides what the caller gets back.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scan::{base_name, scan_directory};
use crate::PairingConfig;

/// What to return when raw and processed name sets differ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Names from the side with extra files, both path lists untouched.
    /// Lists may differ in length and are not index-aligned after a mismatch.
    #[default]
    Positional,
    /// Drop unpaired files so index `i` of every list is the same capture
    Intersect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingOutcome {
    pub names: Vec<String>,
    pub raw_paths: Vec<PathBuf>,
    pub processed_paths: Vec<PathBuf>,
    /// Base names found only in the raw format
    pub raw_only: Vec<String>,
    /// Base names found only in the processed format
    pub processed_only: Vec<String>,
}

impl PairingOutcome {
    /// Whether the two formats disagreed on the set of names
    pub fn has_mismatch(&self) -> bool {
        !self.raw_only.is_empty() || !self.processed_only.is_empty()
    }

    /// Whether names and both path lists have the same length
    pub fn is_aligned(&self) -> bool {
        self.names.len() == self.raw_paths.len() && self.names.len() == self.processed_paths.len()
    }
}

/// Scan `dir` for both formats and pair them by base name.
pub fn resolve_pairs(dir: &Path, config: &PairingConfig) -> Result<PairingOutcome> {
    let raw_paths = scan_directory(dir, &config.raw_format, &config.scan)?;
    let processed_paths = scan_directory(dir, &config.processed_format, &config.scan)?;

    log::debug!(
        "{}: {} {} files, {} {} files",
        dir.display(),
        raw_paths.len(),
        config.raw_format,
        processed_paths.len(),
        config.processed_format
    );

    Ok(pair_paths(raw_paths, processed_paths, config.mismatch_policy))
}

/// Pair already-scanned path lists by base name.
pub fn pair_paths(
    raw_paths: Vec<PathBuf>,
    processed_paths: Vec<PathBuf>,
    policy: MismatchPolicy,
) -> PairingOutcome {
    let raw_names: Vec<String> = raw_paths.iter().map(|p| base_name(p)).collect();
    let processed_names: Vec<String> = processed_paths.iter().map(|p| base_name(p)).collect();

    let raw_set: BTreeSet<&str> = raw_names.iter().map(String::as_str).collect();
    let processed_set: BTreeSet<&str> = processed_names.iter().map(String::as_str).collect();

    let raw_only: Vec<String> = raw_set.difference(&processed_set).map(|s| s.to_string()).collect();
    let processed_only: Vec<String> = processed_set.difference(&raw_set).map(|s| s.to_string()).collect();

    if !raw_only.is_empty() {
        log::warn!("{:?} not found in both formats", raw_only);
    } else if !processed_only.is_empty() {
        log::warn!("{:?} not found in both formats", processed_only);
    }

    match policy {
        MismatchPolicy::Positional => {
            let names = if raw_only.is_empty() { processed_names } else { raw_names };
            PairingOutcome {
                names,
                raw_paths,
                processed_paths,
                raw_only,
                processed_only,
            }
        }
        MismatchPolicy::Intersect => {
            // First processed file per name; later duplicates stay unpaired
            let mut processed_by_name: HashMap<&str, &PathBuf> = HashMap::new();
            for (name, path) in processed_names.iter().zip(&processed_paths) {
                processed_by_name.entry(name.as_str()).or_insert(path);
            }

            let mut outcome = PairingOutcome {
                raw_only,
                processed_only,
                ..PairingOutcome::default()
            };
            for (name, raw_path) in raw_names.iter().zip(&raw_paths) {
                if let Some(processed_path) = processed_by_name.remove(name.as_str()) {
                    outcome.names.push(name.clone());
                    outcome.raw_paths.push(raw_path.clone());
                    outcome.processed_paths.push(processed_path.clone());
                }
            }
            outcome
        }
    }
}
