//! DJI flight telemetry extraction for DNG captures
//!
//! DJI aircraft embed position, attitude and speed for every shot in the XMP
//! packet of the DNG file. This crate reads that packet out of the TIFF
//! container, flattens the `rdf:Description` record and normalizes it to the
//! sixteen fields photogrammetry pipelines care about.

pub mod error;
pub mod normalize;
pub mod telemetry;
pub mod xmp;

pub use error::{MetadataError, Result};
pub use normalize::{normalize, read_dji_metadata, Metadata, MetadataValue, FLOAT_FIELDS, KEEP_FIELDS};
pub use telemetry::{Attitude, DroneTelemetry, Velocity};
pub use xmp::{parse_xmp_packet, read_raw_metadata, read_xmp_packet, MetadataMap, XmpNode};
