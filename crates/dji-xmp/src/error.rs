//! Error type for DNG/XMP metadata extraction and normalization

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read TIFF container of {path}: {source}")]
    Container {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },

    #[error("no embedded XMP packet in {0}")]
    MissingXmp(PathBuf),

    #[error("malformed XMP packet: {0}")]
    Xml(String),

    /// A key expected in the XMP tree or in the description record is absent
    #[error("missing key `{0}` in XMP metadata")]
    MissingKey(String),

    #[error("field `{field}` is not numeric: {value:?}")]
    NumericConversion { field: String, value: String },
}

pub type Result<T> = std::result::Result<T, MetadataError>;
