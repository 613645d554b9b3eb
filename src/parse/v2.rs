//! Normalizer for v2 `state_update` messages.
//!
//! A v2 payload carries an `updates` array; each update holds `poses`,
//! `primitives`, and `variables` maps keyed by stream name. All updates of
//! one message merge into a single [`Timeslice`].

use serde_json::Value;
use tracing::warn;

use super::{
    PointCloudBuilder, entry_colors, entry_positions, feature_from_primitive, image_from_primitive,
    incomplete, merge_variables, push_features,
};
use crate::config::XvizConfig;
use crate::types::{
    FeatureKind, MapOrigin, Pose, StreamEntry, Timeslice, XvizMessage, vec3_from_value,
};
use crate::Result;
use std::collections::BTreeMap;

pub(crate) fn normalize_state_update(payload: &Value, config: &XvizConfig) -> Result<XvizMessage> {
    let Some(updates) = payload.get("updates").and_then(Value::as_array) else {
        return Ok(incomplete("missing 'updates' in state_update message"));
    };
    if updates.is_empty() {
        return Ok(incomplete("'updates' is empty (length 0)"));
    }

    // Every update must resolve a timestamp before any normalization work.
    let mut timestamps = Vec::with_capacity(updates.len());
    for update in updates {
        match resolve_timestamp(update, config) {
            Some(timestamp) => timestamps.push(timestamp),
            None => return Ok(incomplete("missing timestamp in updates")),
        }
    }

    let mut slice = Timeslice::new(timestamps[0]);
    let mut point_builders: BTreeMap<String, PointCloudBuilder> = BTreeMap::new();

    for update in updates {
        merge_poses(&mut slice, update);
        if let Err(conflict) = merge_primitives(&mut slice, &mut point_builders, update) {
            return Ok(incomplete(conflict));
        }
        merge_variables(&mut slice, update.get("variables"));
    }

    for (stream, builder) in point_builders {
        slice.streams.insert(stream, StreamEntry::PointCloud(builder.finish()));
    }

    Ok(XvizMessage::Timeslice(slice))
}

/// Resolve one update's timestamp.
///
/// Order: the update's own `timestamp`, the primary pose stream's
/// timestamp, then the first pose in stream-name iteration order. The last
/// step is the tie-break when multiple poses disagree; it is deterministic
/// but not a contractual ordering.
fn resolve_timestamp(update: &Value, config: &XvizConfig) -> Option<f64> {
    if let Some(timestamp) = update.get("timestamp").and_then(Value::as_f64) {
        return Some(timestamp);
    }
    let poses = update.get("poses")?.as_object()?;
    if let Some(timestamp) = poses
        .get(&config.primary_pose_stream)
        .and_then(|pose| pose.get("timestamp"))
        .and_then(Value::as_f64)
    {
        return Some(timestamp);
    }
    poses.values().find_map(|pose| pose.get("timestamp").and_then(Value::as_f64))
}

fn merge_poses(slice: &mut Timeslice, update: &Value) {
    let Some(poses) = update.get("poses").and_then(Value::as_object) else {
        return;
    };
    for (stream, pose) in poses {
        slice.streams.insert(stream.clone(), StreamEntry::Pose(normalize_pose(pose)));
    }
}

fn normalize_pose(pose: &Value) -> Pose {
    Pose {
        timestamp: pose.get("timestamp").and_then(Value::as_f64),
        map_origin: pose.get("map_origin").and_then(MapOrigin::from_value),
        position: pose.get("position").and_then(vec3_from_value),
        orientation: pose.get("orientation").and_then(vec3_from_value),
    }
}

fn merge_primitives(
    slice: &mut Timeslice,
    point_builders: &mut BTreeMap<String, PointCloudBuilder>,
    update: &Value,
) -> std::result::Result<(), String> {
    let Some(primitives) = update.get("primitives").and_then(Value::as_object) else {
        return Ok(());
    };

    for (stream, primitive_set) in primitives {
        if let Some(points) = primitive_set.get("points").and_then(Value::as_array) {
            let builder = point_builders.entry(stream.clone()).or_insert_with(PointCloudBuilder::new);
            for primitive in points {
                let Some(positions) = entry_positions(primitive) else {
                    warn!(%stream, "skipping point primitive without usable coordinates");
                    continue;
                };
                let colors = entry_colors(primitive, positions.len() / 3);
                builder.push_entry(positions, colors, primitive.get("id").cloned())?;
            }
        }

        let mut features = Vec::new();
        for (field, kind) in
            [("polylines", FeatureKind::Polyline), ("polygons", FeatureKind::Polygon)]
        {
            if let Some(entries) = primitive_set.get(field).and_then(Value::as_array) {
                for primitive in entries {
                    match feature_from_primitive(kind, primitive) {
                        Some(feature) => features.push(feature),
                        None => warn!(%stream, field, "skipping feature without usable vertices"),
                    }
                }
            }
        }
        push_features(slice, stream, features);

        if let Some(images) = primitive_set.get("images").and_then(Value::as_array) {
            if let Some(image) = images.iter().find_map(image_from_primitive) {
                slice.streams.insert(stream.clone(), StreamEntry::Image(image));
            }
        }
    }
    Ok(())
}
