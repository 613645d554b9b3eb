//! Per-stream payload types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::pose::Pose;

/// The merged per-frame payload of one named stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEntry {
    /// All point primitives for the stream, merged into flat buffers.
    PointCloud(PointCloud),
    /// Polyline/polygon primitives, one feature per source entry.
    Features(Vec<Feature>),
    /// Scalar variable entries.
    Variables(Vec<VariableEntry>),
    /// Future primitive sets, one inner vector per look-ahead offset.
    LookAheads(Vec<Vec<Feature>>),
    /// An encoded image.
    Image(ImageEntry),
    /// A vehicle/sensor pose.
    Pose(Pose),
}

/// Flattened point-cloud buffers for one stream in one frame.
///
/// `positions` holds 3 components per point. `colors`, when present, holds a
/// uniform 3 or 4 components per point across every entry merged into the
/// stream. `ids` carries one element per merged source entry (not per
/// point), `Value::Null` standing in for entries without an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub positions: Vec<f32>,
    pub colors: Option<Vec<u8>>,
    pub ids: Vec<Value>,
    pub num_instances: usize,
}

impl PointCloud {
    /// Number of points in the merged buffers.
    pub fn point_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Color components per point, when a color buffer is present.
    pub fn color_stride(&self) -> Option<usize> {
        let colors = self.colors.as_ref()?;
        if self.num_instances == 0 { None } else { Some(colors.len() / self.num_instances) }
    }
}

/// Geometry kind of a [`Feature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Polyline,
    Polygon,
}

/// One polyline or polygon, vertices flattened to 3 components per point.
///
/// Polygon vertex lists pass through exactly as the producer sent them; no
/// implicit ring-closing is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub kind: FeatureKind,
    pub vertices: Vec<f32>,
}

/// One scalar-variable entry: an optional object id and its value series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableEntry {
    pub id: Option<Value>,
    pub values: Vec<Value>,
}

/// An encoded image attached to a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub data: Vec<u8>,
    /// Encoding label as declared by the producer, e.g. `"png"`.
    pub encoding: String,
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
}
