//! Pose and geographic-origin types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Vehicle/sensor position and orientation at a timestamp.
///
/// Both protocol versions normalize to this shape: v1's `vehicle_pose` with
/// nested `continuous`/`map_relative` sections and v2's per-stream `poses`
/// map land here with identical field meanings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub timestamp: Option<f64>,
    pub map_origin: Option<MapOrigin>,
    /// Cartesian position relative to `map_origin`, `[x, y, z]`.
    pub position: Option<[f64; 3]>,
    /// Euler orientation, `[roll, pitch, yaw]` in radians.
    pub orientation: Option<[f64; 3]>,
}

/// Geographic anchor of a pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapOrigin {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
}

impl MapOrigin {
    /// Accept either wire spelling of a map origin.
    ///
    /// Producers send either an object `{longitude, latitude, altitude}` or
    /// an ordered 3-element array; both normalize to the same field set.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self {
                longitude: fields.get("longitude")?.as_f64()?,
                latitude: fields.get("latitude")?.as_f64()?,
                altitude: fields.get("altitude").and_then(Value::as_f64).unwrap_or(0.0),
            }),
            Value::Array(items) if items.len() == 3 => Some(Self {
                longitude: items[0].as_f64()?,
                latitude: items[1].as_f64()?,
                altitude: items[2].as_f64()?,
            }),
            _ => None,
        }
    }
}

/// Read a 3-element numeric array, e.g. a position or orientation triple.
pub(crate) fn vec3_from_value(value: &Value) -> Option<[f64; 3]> {
    let items = value.as_array()?;
    if items.len() != 3 {
        return None;
    }
    Some([items[0].as_f64()?, items[1].as_f64()?, items[2].as_f64()?])
}
