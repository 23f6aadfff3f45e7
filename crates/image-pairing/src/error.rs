//! Error type for directory scanning, pairing and record building

use std::path::PathBuf;
use thiserror::Error;

use dji_xmp::MetadataError;

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("failed to read directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the number of raw and processed files don't match: {names} names, {raw} raw, {processed} processed")]
    CountMismatch {
        names: usize,
        raw: usize,
        processed: usize,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

pub type Result<T> = std::result::Result<T, PairingError>;
