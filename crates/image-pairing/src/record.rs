//! Per-image records: a paired capture and its normalized telemetry

use std::path::{Path, PathBuf};

use dji_xmp::{read_dji_metadata, DroneTelemetry, Metadata};
use serde::{Deserialize, Serialize};

use crate::error::{PairingError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    name: String,
    raw_path: PathBuf,
    processed_path: PathBuf,
    metadata: Metadata,
}

impl ImageRecord {
    pub fn new(name: String, raw_path: PathBuf, processed_path: PathBuf, metadata: Metadata) -> Self {
        Self {
            name,
            raw_path,
            processed_path,
            metadata,
        }
    }

    /// Shared base name of the capture
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    pub fn processed_path(&self) -> &Path {
        &self.processed_path
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn telemetry(&self) -> DroneTelemetry {
        DroneTelemetry::from_metadata(&self.metadata)
    }
}

/// Produces normalized metadata for a raw image
pub trait MetadataSource {
    fn extract(&self, raw_path: &Path) -> dji_xmp::Result<Metadata>;
}

/// Reads DJI telemetry from the XMP packet of a DNG file
#[derive(Debug, Clone, Copy, Default)]
pub struct DjiXmpSource;

impl MetadataSource for DjiXmpSource {
    fn extract(&self, raw_path: &Path) -> dji_xmp::Result<Metadata> {
        read_dji_metadata(raw_path)
    }
}

impl<F> MetadataSource for F
where
    F: Fn(&Path) -> dji_xmp::Result<Metadata>,
{
    fn extract(&self, raw_path: &Path) -> dji_xmp::Result<Metadata> {
        self(raw_path)
    }
}

/// Build one record per `(name, raw, processed)` triple.
///
/// The three lists must have the same length. The first extraction failure
/// aborts the batch.
pub fn build_records<S>(
    names: &[String],
    raw_paths: &[PathBuf],
    processed_paths: &[PathBuf],
    source: &S,
) -> Result<Vec<ImageRecord>>
where
    S: MetadataSource + ?Sized,
{
    if names.len() != raw_paths.len() || names.len() != processed_paths.len() {
        return Err(PairingError::CountMismatch {
            names: names.len(),
            raw: raw_paths.len(),
            processed: processed_paths.len(),
        });
    }

    let mut records = Vec::with_capacity(names.len());
    for ((name, raw_path), processed_path) in names.iter().zip(raw_paths).zip(processed_paths) {
        let metadata = source.extract(raw_path)?;
        log::debug!("{}: {} metadata fields", name, metadata.len());
        records.push(ImageRecord::new(
            name.clone(),
            raw_path.clone(),
            processed_path.clone(),
            metadata,
        ));
    }

    Ok(records)
}
