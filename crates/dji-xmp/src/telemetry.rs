//! Typed view over normalized DJI metadata

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::normalize::Metadata;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    /// Degrees
    pub roll: Option<f64>,
    /// Degrees, clockwise from north
    pub yaw: Option<f64>,
    /// Degrees
    pub pitch: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    /// m/s
    pub x: Option<f64>,
    /// m/s
    pub y: Option<f64>,
    /// m/s
    pub z: Option<f64>,
}

/// Pose and motion of the aircraft at capture time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DroneTelemetry {
    /// Capture time as written by the aircraft (local time, no zone)
    pub created: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Metres above sea level
    pub absolute_altitude: Option<f64>,
    /// Metres above the take-off point
    pub relative_altitude: Option<f64>,
    pub gimbal: Attitude,
    pub flight: Attitude,
    pub speed: Velocity,
    pub cam_reverse: Option<bool>,
    pub gimbal_reverse: Option<bool>,
}

impl DroneTelemetry {
    /// Build the typed view from a normalized metadata map. Missing or
    /// mistyped fields become `None`.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let number = |key: &str| metadata.get(key).and_then(|v| v.as_f64());
        let flag = |key: &str| number(key).map(|v| v != 0.0);

        Self {
            created: metadata
                .get("CreateDate")
                .and_then(|v| v.as_str())
                .and_then(parse_create_date),
            latitude: number("GpsLatitude"),
            longitude: number("GpsLongitude"),
            absolute_altitude: number("AbsoluteAltitude"),
            relative_altitude: number("RelativeAltitude"),
            gimbal: Attitude {
                roll: number("GimbalRollDegree"),
                yaw: number("GimbalYawDegree"),
                pitch: number("GimbalPitchDegree"),
            },
            flight: Attitude {
                roll: number("FlightRollDegree"),
                yaw: number("FlightYawDegree"),
                pitch: number("FlightPitchDegree"),
            },
            speed: Velocity {
                x: number("FlightXSpeed"),
                y: number("FlightYSpeed"),
                z: number("FlightZSpeed"),
            },
            cam_reverse: flag("CamReverse"),
            gimbal_reverse: flag("GimbalReverse"),
        }
    }

    /// Latitude/longitude pair, if both are present
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    /// Horizontal speed magnitude in m/s
    pub fn ground_speed(&self) -> Option<f64> {
        Some(self.speed.x?.hypot(self.speed.y?))
    }
}

/// Parse an `xmp:CreateDate` value.
///
/// Accepts ISO 8601 with or without fractional seconds and offset, and the
/// EXIF `YYYY:MM:DD HH:MM:SS` layout. An offset is dropped, keeping local time.
pub fn parse_create_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y:%m:%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}
