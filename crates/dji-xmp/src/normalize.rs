//! Whitelist filtering and numeric conversion of DJI description records

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, Result};
use crate::xmp::{read_raw_metadata, MetadataMap};

/// Description attributes retained after normalization
pub const KEEP_FIELDS: [&str; 16] = [
    "@xmp:CreateDate",
    "@drone-dji:GpsLatitude",
    "@drone-dji:GpsLongitude",
    "@drone-dji:AbsoluteAltitude",
    "@drone-dji:RelativeAltitude",
    "@drone-dji:GimbalRollDegree",
    "@drone-dji:GimbalYawDegree",
    "@drone-dji:GimbalPitchDegree",
    "@drone-dji:FlightRollDegree",
    "@drone-dji:FlightYawDegree",
    "@drone-dji:FlightPitchDegree",
    "@drone-dji:FlightXSpeed",
    "@drone-dji:FlightYSpeed",
    "@drone-dji:FlightZSpeed",
    "@drone-dji:CamReverse",
    "@drone-dji:GimbalReverse",
];

/// Retained attributes converted to `f64`. The reverse flags are 0/1 and are
/// converted like every other numeric field.
pub const FLOAT_FIELDS: [&str; 15] = [
    "@drone-dji:GpsLatitude",
    "@drone-dji:GpsLongitude",
    "@drone-dji:AbsoluteAltitude",
    "@drone-dji:RelativeAltitude",
    "@drone-dji:GimbalRollDegree",
    "@drone-dji:GimbalYawDegree",
    "@drone-dji:GimbalPitchDegree",
    "@drone-dji:FlightRollDegree",
    "@drone-dji:FlightYawDegree",
    "@drone-dji:FlightPitchDegree",
    "@drone-dji:FlightXSpeed",
    "@drone-dji:FlightYSpeed",
    "@drone-dji:FlightZSpeed",
    "@drone-dji:CamReverse",
    "@drone-dji:GimbalReverse",
];

/// Namespace prefixes removed from normalized keys
pub const STRIPPED_PREFIXES: [&str; 2] = ["@xmp:", "@drone-dji:"];

/// A normalized metadata value: either left as text or converted to a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Number(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            MetadataValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            MetadataValue::Number(_) => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Number(n) => write!(f, "{}", n),
            MetadataValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

/// Normalized metadata keyed by un-prefixed field name
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Filter a description record to [`KEEP_FIELDS`], convert [`FLOAT_FIELDS`]
/// to numbers and strip the namespace prefixes.
///
/// Every float field must be present; `CreateDate` may be missing.
pub fn normalize(record: &MetadataMap) -> Result<Metadata> {
    let keep: HashSet<&str> = KEEP_FIELDS.into_iter().collect();
    let floats: HashSet<&str> = FLOAT_FIELDS.into_iter().collect();

    if let Some(missing) = FLOAT_FIELDS.into_iter().find(|field| !record.contains_key(*field)) {
        return Err(MetadataError::MissingKey(missing.to_string()));
    }

    let mut metadata = Metadata::new();
    for (key, raw) in record.iter().filter(|(key, _)| keep.contains(key.as_str())) {
        let value = if floats.contains(key.as_str()) {
            MetadataValue::Number(parse_number(key, raw)?)
        } else {
            MetadataValue::Text(raw.clone())
        };
        metadata.insert(strip_prefix(key).to_string(), value);
    }

    Ok(metadata)
}

/// Read a raw image's XMP description and normalize it.
pub fn read_dji_metadata(path: &Path) -> Result<Metadata> {
    let record = read_raw_metadata(path)?;
    normalize(&record)
}

fn parse_number(field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| MetadataError::NumericConversion {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

fn strip_prefix(key: &str) -> &str {
    STRIPPED_PREFIXES
        .iter()
        .find_map(|prefix| key.strip_prefix(*prefix))
        .unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmp::parse_xmp_packet;
    use crate::xmp::tests::DJI_XMP;
    use anyhow::Result;

    fn full_record() -> MetadataMap {
        KEEP_FIELDS
            .iter()
            .map(|key| {
                let value = if *key == "@xmp:CreateDate" { "2023-06-14T10:21:33" } else { "+1.5" };
                (key.to_string(), value.to_string())
            })
            .collect()
    }

    #[test]
    fn test_normalize_whitelisted_record() -> Result<()> {
        let metadata = normalize(&full_record())?;

        assert_eq!(metadata.len(), 16);
        for key in KEEP_FIELDS {
            let stripped = strip_prefix(key);
            assert!(!stripped.starts_with('@'), "prefix left on {}", stripped);
            assert!(metadata.contains_key(stripped), "missing {}", stripped);
        }
        for key in FLOAT_FIELDS {
            assert_eq!(metadata[strip_prefix(key)], MetadataValue::Number(1.5));
        }
        assert_eq!(
            metadata["CreateDate"],
            MetadataValue::Text("2023-06-14T10:21:33".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_drops_unlisted_fields() -> Result<()> {
        let metadata = normalize(&parse_xmp_packet(DJI_XMP.as_bytes())?)?;

        assert_eq!(metadata.len(), 16);
        assert!(!metadata.contains_key("ModifyDate"));
        assert!(!metadata.contains_key("DewarpFlag"));
        assert!(!metadata.contains_key("crs:Version"));
        assert_eq!(metadata["GpsLatitude"].as_f64(), Some(46.520415));
        assert_eq!(metadata["GimbalPitchDegree"].as_f64(), Some(-90.0));
        assert_eq!(metadata["CamReverse"].as_f64(), Some(0.0));
        Ok(())
    }

    #[test]
    fn test_non_numeric_field() {
        let mut record = full_record();
        record.insert("@drone-dji:GpsLatitude".to_string(), "abc".to_string());

        match normalize(&record) {
            Err(MetadataError::NumericConversion { field, value }) => {
                assert_eq!(field, "@drone-dji:GpsLatitude");
                assert_eq!(value, "abc");
            }
            other => panic!("expected numeric conversion error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_float_field() {
        let mut record = full_record();
        record.remove("@drone-dji:FlightZSpeed");

        match normalize(&record) {
            Err(MetadataError::MissingKey(key)) => assert_eq!(key, "@drone-dji:FlightZSpeed"),
            other => panic!("expected missing key error, got {:?}", other),
        }
    }

    #[test]
    fn test_create_date_optional() -> Result<()> {
        let mut record = full_record();
        record.remove("@xmp:CreateDate");

        let metadata = normalize(&record)?;
        assert_eq!(metadata.len(), 15);
        assert!(!metadata.contains_key("CreateDate"));
        Ok(())
    }

    #[test]
    fn test_padded_numbers() -> Result<()> {
        let mut record = full_record();
        record.insert("@drone-dji:RelativeAltitude".to_string(), " -12.25 ".to_string());

        let metadata = normalize(&record)?;
        assert_eq!(metadata["RelativeAltitude"].as_f64(), Some(-12.25));
        Ok(())
    }

    #[test]
    fn test_value_serialization() -> Result<()> {
        let mut metadata = Metadata::new();
        metadata.insert("CreateDate".to_string(), "2023-06-14T10:21:33".into());
        metadata.insert("GpsLatitude".to_string(), MetadataValue::Number(46.5));

        let json = serde_json::to_string(&metadata)?;
        assert_eq!(json, r#"{"CreateDate":"2023-06-14T10:21:33","GpsLatitude":46.5}"#);

        let back: Metadata = serde_json::from_str(&json)?;
        assert_eq!(back, metadata);
        Ok(())
    }
}
