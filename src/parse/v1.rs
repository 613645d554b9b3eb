//! Normalizer for legacy v1 `state_update` messages.
//!
//! A v1 payload carries a `state_updates` array plus a single top-level
//! `vehicle_pose`; primitives are typed by a `type` string and futures
//! (look-aheads) ride along per stream. The configured preprocessing hook,
//! when present, runs once per primitive before normalization and may
//! rewrite its declared type.

use serde_json::{Map, Value};
use tracing::{trace, warn};

use super::{
    PointCloudBuilder, entry_colors, entry_positions, feature_from_primitive, incomplete,
    merge_variables, push_features,
};
use crate::config::XvizConfig;
use crate::types::{
    Feature, FeatureKind, MapOrigin, Pose, StreamEntry, Timeslice, XvizMessage, vec3_from_value,
};
use crate::Result;
use std::collections::BTreeMap;

pub(crate) fn normalize_state_update(payload: &Value, config: &XvizConfig) -> Result<XvizMessage> {
    let Some(updates) = payload.get("state_updates").and_then(Value::as_array) else {
        return Ok(incomplete("missing 'state_updates' in state_update message"));
    };
    if updates.is_empty() {
        return Ok(incomplete("'state_updates' is empty (length 0)"));
    }

    let vehicle_pose = payload.get("vehicle_pose");
    let pose_time = vehicle_pose.and_then(|pose| pose.get("time")).and_then(Value::as_f64);

    let mut timestamps = Vec::with_capacity(updates.len());
    for update in updates {
        match update.get("timestamp").and_then(Value::as_f64).or(pose_time) {
            Some(timestamp) => timestamps.push(timestamp),
            None => return Ok(incomplete("missing timestamp in updates")),
        }
    }

    let mut slice = Timeslice::new(timestamps[0]);
    if let Some(pose) = vehicle_pose {
        slice
            .streams
            .insert(config.primary_pose_stream.clone(), StreamEntry::Pose(normalize_vehicle_pose(pose)));
    }

    let mut point_builders: BTreeMap<String, PointCloudBuilder> = BTreeMap::new();

    for (update, timestamp) in updates.iter().zip(&timestamps) {
        if let Err(conflict) =
            merge_primitives(&mut slice, &mut point_builders, update, config, *timestamp)
        {
            return Ok(incomplete(conflict));
        }
        merge_variables(&mut slice, update.get("variables"));
        merge_futures(&mut slice, update, config, *timestamp);
    }

    for (stream, builder) in point_builders {
        slice.streams.insert(stream, StreamEntry::PointCloud(builder.finish()));
    }

    Ok(XvizMessage::Timeslice(slice))
}

/// Normalize the v1 `vehicle_pose` shape.
///
/// Position/orientation live under `continuous`, the geographic origin
/// under `map_relative`; flat spellings are accepted as well since some v1
/// producers emitted them unnested.
fn normalize_vehicle_pose(pose: &Value) -> Pose {
    let continuous = pose.get("continuous");
    let map_relative = pose.get("map_relative");
    Pose {
        timestamp: pose.get("time").and_then(Value::as_f64),
        map_origin: map_relative
            .and_then(|section| section.get("map_origin"))
            .or_else(|| pose.get("map_origin"))
            .and_then(MapOrigin::from_value),
        position: continuous
            .and_then(|section| section.get("position"))
            .or_else(|| pose.get("position"))
            .and_then(vec3_from_value),
        orientation: continuous
            .and_then(|section| section.get("orientation"))
            .or_else(|| pose.get("orientation"))
            .and_then(vec3_from_value),
    }
}

/// Run the configured hook over a primitive and return the possibly
/// rewritten object together with its post-hook type.
fn preprocess(
    primitive: &Value,
    stream: &str,
    timestamp: f64,
    config: &XvizConfig,
) -> Option<(Value, String)> {
    let mut fields: Map<String, Value> = primitive.as_object()?.clone();
    if let Some(hook) = &config.pre_process_primitive {
        hook(&mut fields, stream, Some(timestamp));
    }
    // Re-read the type: the hook may have rewritten it.
    let kind = fields.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    Some((Value::Object(fields), kind))
}

fn merge_primitives(
    slice: &mut Timeslice,
    point_builders: &mut BTreeMap<String, PointCloudBuilder>,
    update: &Value,
    config: &XvizConfig,
    timestamp: f64,
) -> std::result::Result<(), String> {
    let Some(primitives) = update.get("primitives").and_then(Value::as_object) else {
        return Ok(());
    };

    for (stream, entries) in primitives {
        let Some(entries) = entries.as_array() else {
            continue;
        };
        let mut features = Vec::new();
        for primitive in entries {
            let Some((primitive, kind)) = preprocess(primitive, stream, timestamp, config) else {
                continue;
            };
            match kind.as_str() {
                "points3d" | "points" => {
                    let Some(positions) = entry_positions(&primitive) else {
                        warn!(%stream, "skipping point primitive without usable coordinates");
                        continue;
                    };
                    let colors = entry_colors(&primitive, positions.len() / 3);
                    point_builders
                        .entry(stream.clone())
                        .or_insert_with(PointCloudBuilder::new)
                        .push_entry(positions, colors, primitive.get("id").cloned())?;
                }
                "polyline2d" | "polyline" => {
                    match feature_from_primitive(FeatureKind::Polyline, &primitive) {
                        Some(feature) => features.push(feature),
                        None => warn!(%stream, "skipping polyline without usable vertices"),
                    }
                }
                "polygon2d" | "polygon" => {
                    match feature_from_primitive(FeatureKind::Polygon, &primitive) {
                        Some(feature) => features.push(feature),
                        None => warn!(%stream, "skipping polygon without usable vertices"),
                    }
                }
                other => trace!(%stream, kind = other, "skipping unsupported v1 primitive type"),
            }
        }
        push_features(slice, stream, features);
    }
    Ok(())
}

/// Normalize per-stream futures into look-ahead feature sets, one inner
/// vector per future offset.
fn merge_futures(slice: &mut Timeslice, update: &Value, config: &XvizConfig, timestamp: f64) {
    let Some(futures) = update.get("futures").and_then(Value::as_object) else {
        return;
    };
    for (stream, offsets) in futures {
        let Some(offsets) = offsets.as_array() else {
            continue;
        };
        let look_aheads: Vec<Vec<Feature>> = offsets
            .iter()
            .map(|offset| {
                offset
                    .as_array()
                    .map(|entries| {
                        entries
                            .iter()
                            .filter_map(|primitive| {
                                let (primitive, kind) =
                                    preprocess(primitive, stream, timestamp, config)?;
                                let feature_kind = match kind.as_str() {
                                    "polyline2d" | "polyline" => FeatureKind::Polyline,
                                    "polygon2d" | "polygon" => FeatureKind::Polygon,
                                    _ => return None,
                                };
                                feature_from_primitive(feature_kind, &primitive)
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();
        slice.streams.insert(stream.clone(), StreamEntry::LookAheads(look_aheads));
    }
}
