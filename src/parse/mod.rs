//! Protocol message parsing.
//!
//! A single-pass state machine over one wire message:
//!
//! 1. **Envelope check**: `{type, data}` objects are unwrapped; envelopes
//!    outside the `xviz` namespace are silently not protocol messages.
//! 2. **Version detection**: an explicit version string is parsed for its
//!    major component; an absent version assumes the context's current
//!    major, supporting legacy producers that never declared one.
//! 3. **Support gate**: the detected major must be in the context's
//!    supported set.
//! 4. **Dispatch**: by declared envelope subtype, or by structural sniffing
//!    for bare payloads, into a version-specific normalizer.
//!
//! Version failures are thrown (caller/configuration conditions); structural
//! gaps in the data come back as [`XvizMessage::Incomplete`] values.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::XvizConfig;
use crate::container::{flatten_colors, flatten_vertices};
use crate::envelope::unpack_envelope;
use crate::types::{
    Feature, FeatureKind, ImageEntry, Metadata, PointCloud, StreamEntry, Timeslice, VariableEntry,
    XvizMessage,
};
use crate::{Result, XvizError};

mod v1;
mod v2;

/// Closed set of protocol message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    Metadata,
    StateUpdate,
    Error,
    Done,
}

/// Dispatch table from envelope subtype to message kind.
fn kind_from_subtype(subtype: &str) -> Option<MessageKind> {
    match subtype {
        "metadata" => Some(MessageKind::Metadata),
        "state_update" => Some(MessageKind::StateUpdate),
        "error" => Some(MessageKind::Error),
        "transform_log_done" => Some(MessageKind::Done),
        _ => None,
    }
}

/// Infer the kind of a bare (non-enveloped) payload from its structure.
fn sniff_kind(payload: &Value) -> Option<MessageKind> {
    if payload.get("log_info").is_some() || payload.get("streams").is_some() {
        return Some(MessageKind::Metadata);
    }
    if payload.get("updates").is_some() || payload.get("state_updates").is_some() {
        return Some(MessageKind::StateUpdate);
    }
    None
}

/// Parse one wire message into its canonical form.
///
/// Returns `Ok(None)` when the input is an envelope from a different
/// namespace (not an XVIZ message, not an error). Data-quality problems come
/// back as [`XvizMessage::Incomplete`]; version detection and support
/// failures are returned as errors.
pub fn parse_message(value: &Value, config: &XvizConfig) -> Result<Option<XvizMessage>> {
    let (subtype, payload) = match unpack_envelope(value) {
        Some((envelope_type, data)) => {
            if !envelope_type.is_xviz() {
                debug!(namespace = %envelope_type.namespace, "ignoring envelope outside the xviz namespace");
                return Ok(None);
            }
            (Some(envelope_type.subtype), data)
        }
        None => (None, value),
    };

    let major = detect_major_version(payload, config)?;
    if !config.supports(major) {
        return Err(XvizError::UnsupportedVersion {
            detected: major,
            supported: config.supported_versions.clone(),
        });
    }

    let kind = match &subtype {
        Some(subtype) => kind_from_subtype(subtype),
        None => sniff_kind(payload),
    };

    let message = match kind {
        Some(MessageKind::Metadata) => normalize_metadata(payload, major),
        Some(MessageKind::StateUpdate) => match major {
            1 => v1::normalize_state_update(payload, config)?,
            _ => v2::normalize_state_update(payload, config)?,
        },
        Some(MessageKind::Error) => XvizMessage::Error {
            message: payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified stream error")
                .to_string(),
        },
        Some(MessageKind::Done) => XvizMessage::Done { id: done_id(payload) },
        None => match subtype {
            Some(subtype) => {
                warn!(%subtype, "unrecognized XVIZ message subtype");
                incomplete(format!("unrecognized XVIZ message type '{subtype}'"))
            }
            None => incomplete("unable to infer message type from bare payload"),
        },
    };
    Ok(Some(message))
}

/// Detect the message's major protocol version.
fn detect_major_version(payload: &Value, config: &XvizConfig) -> Result<u32> {
    let Some(version) = payload.get("version") else {
        return Ok(config.current_major_version);
    };
    let undetectable = || XvizError::UndetectableVersion {
        value: version.as_str().map(str::to_string).unwrap_or_else(|| version.to_string()),
    };
    match version {
        Value::String(s) => {
            s.split('.').next().and_then(|major| major.parse().ok()).ok_or_else(undetectable)
        }
        Value::Number(n) => n.as_u64().map(|v| v as u32).ok_or_else(undetectable),
        _ => Err(undetectable()),
    }
}

fn normalize_metadata(payload: &Value, major: u32) -> XvizMessage {
    let version = payload
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{major}.0.0"));

    let log_info = payload.get("log_info");
    let log_start = log_info.and_then(|info| info.get("start_time")).and_then(Value::as_f64);
    let log_end = log_info.and_then(|info| info.get("end_time")).and_then(Value::as_f64);
    let start = payload.get("start_time").and_then(Value::as_f64);
    let end = payload.get("end_time").and_then(Value::as_f64);

    XvizMessage::Metadata(Metadata {
        version,
        start_time: start.or(log_start),
        end_time: end.or(log_end),
        log_start_time: log_start.or(start),
        log_end_time: log_end.or(end),
    })
}

fn done_id(payload: &Value) -> Option<String> {
    match payload.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn incomplete(message: impl Into<String>) -> XvizMessage {
    XvizMessage::Incomplete { message: message.into() }
}

// ── Shared normalization helpers ─────────────────────────────────────────────

/// Accumulates one stream's point primitives across all entries of a frame.
pub(crate) struct PointCloudBuilder {
    positions: Vec<f32>,
    colors: Option<Vec<u8>>,
    stride: Option<usize>,
    ids: Vec<Value>,
}

impl PointCloudBuilder {
    pub(crate) fn new() -> Self {
        Self { positions: Vec::new(), colors: None, stride: None, ids: Vec::new() }
    }

    /// Merge one source entry into the growing buffers.
    ///
    /// The color buffer comes into existence with the first color-carrying
    /// entry, backfilling zeroed components (alpha 255 at stride 4) for
    /// points merged before it; later colorless entries are filled the same
    /// way. A stride conflict is a data-quality problem reported as a
    /// string for the caller to turn into an `Incomplete` frame.
    pub(crate) fn push_entry(
        &mut self,
        positions: Vec<f32>,
        colors: Option<(usize, Vec<u8>)>,
        id: Option<Value>,
    ) -> std::result::Result<(), String> {
        let point_count = positions.len() / 3;
        let prior_points = self.positions.len() / 3;

        match colors {
            Some((stride, flat)) => match self.stride {
                None => {
                    let mut buffer = Vec::with_capacity((prior_points + point_count) * stride);
                    fill_colors(&mut buffer, prior_points, stride);
                    buffer.extend(flat);
                    self.stride = Some(stride);
                    self.colors = Some(buffer);
                }
                Some(existing) if existing == stride => {
                    if let Some(buffer) = self.colors.as_mut() {
                        buffer.extend(flat);
                    }
                }
                Some(existing) => {
                    return Err(format!(
                        "color stride conflict: stream mixes {existing}- and {stride}-component colors"
                    ));
                }
            },
            None => {
                if let (Some(stride), Some(buffer)) = (self.stride, self.colors.as_mut()) {
                    fill_colors(buffer, point_count, stride);
                }
            }
        }

        self.positions.extend(positions);
        self.ids.push(id.unwrap_or(Value::Null));
        Ok(())
    }

    pub(crate) fn finish(self) -> PointCloud {
        let num_instances = self.positions.len() / 3;
        PointCloud { positions: self.positions, colors: self.colors, ids: self.ids, num_instances }
    }
}

fn fill_colors(buffer: &mut Vec<u8>, points: usize, stride: usize) {
    for _ in 0..points {
        buffer.extend_from_slice(if stride == 4 { &[0, 0, 0, 255] } else { &[0, 0, 0] });
    }
}

/// Flattened positions of a point primitive (`points` or `vertices` field).
pub(crate) fn entry_positions(primitive: &Value) -> Option<Vec<f32>> {
    let field = primitive.get("points").or_else(|| primitive.get("vertices"))?;
    flatten_vertices(field)
}

/// Per-point colors of a point primitive.
///
/// The explicit `colors` field wins; a single `color` fallback is
/// replicated across every point of the entry.
pub(crate) fn entry_colors(primitive: &Value, point_count: usize) -> Option<(usize, Vec<u8>)> {
    if let Some(colors) = primitive.get("colors") {
        let (stride, flat) = flatten_colors(colors)?;
        return Some((stride as usize, flat));
    }
    let color = primitive.get("color")?.as_array()?;
    let stride = color.len();
    if stride != 3 && stride != 4 {
        return None;
    }
    let one: Vec<u8> = color
        .iter()
        .map(|c| c.as_f64().map(|f| f.clamp(0.0, 255.0) as u8))
        .collect::<Option<_>>()?;
    let mut flat = Vec::with_capacity(stride * point_count);
    for _ in 0..point_count {
        flat.extend_from_slice(&one);
    }
    Some((stride, flat))
}

/// Build one polyline/polygon feature from a primitive's `vertices`.
///
/// Vertices pass through as given; nested coordinate records flatten in
/// traversal order and no ring-closing is applied to polygons.
pub(crate) fn feature_from_primitive(kind: FeatureKind, primitive: &Value) -> Option<Feature> {
    let vertices = flatten_vertices(primitive.get("vertices")?)?;
    Some(Feature { kind, vertices })
}

/// Normalize one image primitive.
pub(crate) fn image_from_primitive(primitive: &Value) -> Option<ImageEntry> {
    let data = primitive.get("data")?.as_array()?;
    let bytes = data
        .iter()
        .map(|b| b.as_u64().map(|v| v.min(255) as u8))
        .collect::<Option<Vec<u8>>>()?;
    let encoding = primitive
        .get("format")
        .or_else(|| primitive.get("encoding"))
        .and_then(Value::as_str)
        .unwrap_or("raw")
        .to_string();
    Some(ImageEntry {
        data: bytes,
        encoding,
        width_px: primitive.get("width_px").and_then(Value::as_u64).map(|v| v as u32),
        height_px: primitive.get("height_px").and_then(Value::as_u64).map(|v| v as u32),
    })
}

/// Merge a `variables` section (`stream -> [{id?, values}]`) into the slice.
pub(crate) fn merge_variables(slice: &mut Timeslice, variables: Option<&Value>) {
    let Some(streams) = variables.and_then(Value::as_object) else {
        return;
    };
    for (stream, entries) in streams {
        let Some(entries) = entries.as_array() else {
            continue;
        };
        let normalized = entries.iter().filter_map(|entry| {
            let values = entry.get("values")?.as_array()?.clone();
            Some(VariableEntry { id: entry.get("id").cloned(), values })
        });
        match slice.streams.get_mut(stream) {
            Some(StreamEntry::Variables(existing)) => existing.extend(normalized),
            _ => {
                slice
                    .streams
                    .insert(stream.clone(), StreamEntry::Variables(normalized.collect()));
            }
        }
    }
}

/// Append features to a stream's feature list, creating it when absent.
pub(crate) fn push_features(slice: &mut Timeslice, stream: &str, features: Vec<Feature>) {
    if features.is_empty() {
        return;
    }
    match slice.streams.get_mut(stream) {
        Some(StreamEntry::Features(existing)) => existing.extend(features),
        _ => {
            slice.streams.insert(stream.to_string(), StreamEntry::Features(features));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> XvizConfig {
        XvizConfig::default()
    }

    #[test]
    fn non_xviz_namespace_is_silently_ignored() {
        let message = json!({"type": "other/state_update", "data": {"updates": []}});
        assert_eq!(parse_message(&message, &config()).unwrap(), None);
    }

    #[test]
    fn version_gate_rejects_v1_when_only_v2_supported() {
        let config = XvizConfig::new().with_supported_versions(vec![2]);
        let message = json!({
            "type": "xviz/metadata",
            "data": {"version": "1.0.0"},
        });
        let err = parse_message(&message, &config).unwrap_err();
        match err {
            XvizError::UnsupportedVersion { detected, supported } => {
                assert_eq!(detected, 1);
                assert_eq!(supported, vec![2]);
            }
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn version_gate_rejects_v2_when_only_v1_supported() {
        let config = XvizConfig::new().with_supported_versions(vec![1]).with_current_major_version(1);
        let message = json!({
            "type": "xviz/metadata",
            "data": {"version": "2.0.0"},
        });
        assert!(matches!(
            parse_message(&message, &config).unwrap_err(),
            XvizError::UnsupportedVersion { detected: 2, .. }
        ));
    }

    #[test]
    fn unparseable_version_string_is_a_hard_error() {
        let message = json!({
            "type": "xviz/metadata",
            "data": {"version": "not-a-version"},
        });
        let err = parse_message(&message, &config()).unwrap_err();
        assert!(matches!(err, XvizError::UndetectableVersion { .. }));
        assert!(err.to_string().contains("not-a-version"));
    }

    #[test]
    fn absent_version_assumes_configured_major() {
        // Legacy v1 producers never declared a version.
        let config = XvizConfig::new().with_current_major_version(1);
        let message = json!({
            "type": "xviz/state_update",
            "data": {
                "vehicle_pose": {"time": 100.0},
                "state_updates": [{"primitives": {}}],
            },
        });
        let parsed = parse_message(&message, &config).unwrap().unwrap();
        assert_eq!(parsed.timestamp(), Some(100.0));
    }

    #[test]
    fn bare_metadata_is_sniffed_structurally() {
        let payload = json!({"log_info": {"start_time": 10.0, "end_time": 20.0}});
        let parsed = parse_message(&payload, &config()).unwrap().unwrap();
        match parsed {
            XvizMessage::Metadata(metadata) => {
                assert_eq!(metadata.log_start_time, Some(10.0));
                assert_eq!(metadata.log_end_time, Some(20.0));
                // event times mirror log times when only one pair is present
                assert_eq!(metadata.start_time, Some(10.0));
                assert_eq!(metadata.version, "2.0.0");
            }
            other => panic!("expected Metadata, got {other:?}"),
        }
    }

    #[test]
    fn bare_timeslice_is_sniffed_structurally() {
        let payload = json!({
            "updates": [{"timestamp": 5.0}],
        });
        let parsed = parse_message(&payload, &config()).unwrap().unwrap();
        assert!(parsed.is_timeslice());
    }

    #[test]
    fn unsniffable_bare_payload_is_incomplete() {
        let parsed = parse_message(&json!({"unrelated": true}), &config()).unwrap().unwrap();
        assert!(matches!(parsed, XvizMessage::Incomplete { .. }));
    }

    #[test]
    fn unknown_subtype_is_incomplete() {
        let message = json!({"type": "xviz/telepathy", "data": {}});
        let parsed = parse_message(&message, &config()).unwrap().unwrap();
        match parsed {
            XvizMessage::Incomplete { message } => assert!(message.contains("telepathy")),
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn error_messages_normalize() {
        let message = json!({"type": "xviz/error", "data": {"message": "log unavailable"}});
        let parsed = parse_message(&message, &config()).unwrap().unwrap();
        assert_eq!(parsed, XvizMessage::Error { message: "log unavailable".to_string() });
    }

    #[test]
    fn transform_log_done_normalizes() {
        let message = json!({"type": "xviz/transform_log_done", "data": {"id": "req-7"}});
        let parsed = parse_message(&message, &config()).unwrap().unwrap();
        assert_eq!(parsed, XvizMessage::Done { id: Some("req-7".to_string()) });

        let message = json!({"type": "xviz/transform_log_done", "data": {"id": 12}});
        let parsed = parse_message(&message, &config()).unwrap().unwrap();
        assert_eq!(parsed, XvizMessage::Done { id: Some("12".to_string()) });
    }

    #[test]
    fn metadata_with_explicit_event_times_keeps_both_pairs() {
        let payload = json!({
            "version": "2.0.0",
            "start_time": 12.0,
            "end_time": 14.0,
            "log_info": {"start_time": 10.0, "end_time": 20.0},
        });
        let parsed = parse_message(&payload, &config()).unwrap().unwrap();
        match parsed {
            XvizMessage::Metadata(metadata) => {
                assert_eq!(metadata.start_time, Some(12.0));
                assert_eq!(metadata.end_time, Some(14.0));
                assert_eq!(metadata.log_start_time, Some(10.0));
                assert_eq!(metadata.log_end_time, Some(20.0));
            }
            other => panic!("expected Metadata, got {other:?}"),
        }
    }

    #[test]
    fn point_builder_backfills_late_colors() {
        let mut builder = PointCloudBuilder::new();
        builder.push_entry(vec![0.0, 0.0, 0.0], None, None).unwrap();
        builder.push_entry(vec![1.0, 1.0, 1.0], Some((4, vec![9, 9, 9, 9])), None).unwrap();
        builder.push_entry(vec![2.0, 2.0, 2.0], None, None).unwrap();
        let cloud = builder.finish();
        assert_eq!(cloud.num_instances, 3);
        assert_eq!(
            cloud.colors.as_deref(),
            Some(&[0, 0, 0, 255, 9, 9, 9, 9, 0, 0, 0, 255][..])
        );
    }

    #[test]
    fn point_builder_reports_stride_conflicts() {
        let mut builder = PointCloudBuilder::new();
        builder.push_entry(vec![0.0, 0.0, 0.0], Some((3, vec![1, 2, 3])), None).unwrap();
        let err = builder
            .push_entry(vec![1.0, 1.0, 1.0], Some((4, vec![1, 2, 3, 4])), None)
            .unwrap_err();
        assert!(err.contains("stride conflict"));
    }
}
