//! Test utilities for building XVIZ fixtures
//!
//! This module provides message and log builders shared by unit tests,
//! integration tests, and benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use serde_json::{Value, json};

use crate::data::XvizData;
use crate::source::MemorySource;

/// An enveloped v2 metadata message covering `[start_time, end_time]`.
pub fn metadata_v2(start_time: f64, end_time: f64) -> Value {
    json!({
        "type": "xviz/metadata",
        "data": {
            "version": "2.0.0",
            "log_info": {"start_time": start_time, "end_time": end_time},
        },
    })
}

/// An enveloped v2 state update with one point, one polyline, and one
/// variable entry, timestamped at `timestamp`.
pub fn state_update_v2(timestamp: f64) -> Value {
    json!({
        "type": "xviz/state_update",
        "data": {
            "updates": [{
                "timestamp": timestamp,
                "poses": {
                    "/vehicle_pose": {
                        "timestamp": timestamp,
                        "map_origin": {"longitude": 8.42, "latitude": 49.01, "altitude": 112.0},
                        "position": [timestamp, 0.0, 0.0],
                        "orientation": [0.0, 0.0, 0.0],
                    },
                },
                "primitives": {
                    "/lidar": {
                        "points": [{"points": [[timestamp, 1.0, 0.5]], "colors": [[0, 0, 255]]}],
                    },
                    "/lanes": {
                        "polylines": [{"vertices": [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]}],
                    },
                },
                "variables": {
                    "/velocity": [{"values": [11.2]}],
                },
            }],
        },
    })
}

/// An enveloped v1 state update driven by its vehicle pose time.
pub fn state_update_v1(time: f64) -> Value {
    json!({
        "type": "xviz/state_update",
        "data": {
            "vehicle_pose": {
                "time": time,
                "continuous": {
                    "position": [time, 0.0, 0.0],
                    "orientation": [0.0, 0.0, 0.0],
                },
            },
            "state_updates": [{
                "primitives": {
                    "/lidar": [{"type": "points3d", "vertices": [[time, 1.0, 0.5]]}],
                },
            }],
        },
    })
}

/// A v2 state update carrying a point cloud of `point_count` points, for
/// codec-heavy tests and benchmarks.
pub fn point_cloud_update(timestamp: f64, point_count: usize) -> Value {
    let points: Vec<[f64; 3]> = (0..point_count)
        .map(|i| {
            let offset = i as f64 * 0.1;
            [offset, offset * 2.0, offset * 0.5]
        })
        .collect();
    let colors: Vec<[u8; 3]> = (0..point_count)
        .map(|i| [(i % 256) as u8, ((i * 7) % 256) as u8, ((i * 13) % 256) as u8])
        .collect();
    json!({
        "type": "xviz/state_update",
        "data": {
            "updates": [{
                "timestamp": timestamp,
                "primitives": {
                    "/lidar": {"points": [{"points": points, "colors": colors}]},
                },
            }],
        },
    })
}

/// Assemble an in-memory log with binary-encoded frames at the given
/// timestamps.
pub fn binary_log(timestamps: &[f64]) -> MemorySource {
    let start = timestamps.first().copied().unwrap_or(0.0);
    let end = timestamps.last().copied().unwrap_or(start);
    let mut source = MemorySource::new()
        .with_metadata(XvizData::from_object(metadata_v2(start, end)));
    for &timestamp in timestamps {
        let bytes = crate::container::encode_binary(&state_update_v2(timestamp))
            .expect("fixture encodes");
        source.push_frame(timestamp, XvizData::from_bytes(bytes));
    }
    source
}
