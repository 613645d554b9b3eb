//! Canonical XVIZ message model.
//!
//! Every wire message, regardless of protocol major version or envelope
//! shape, normalizes into the types in this module:
//! - [`XvizMessage`] is the tagged message produced once per logical frame
//! - [`Timeslice`] carries the per-frame stream map keyed by stream name
//! - [`StreamEntry`] is the per-stream payload (point cloud, features,
//!   variables, image, pose, look-aheads)
//!
//! The model is version-free by design: the per-version normalizers in
//! [`crate::parse`] are the only code that knows about v1/v2 wire shapes.
//!
//! ## Invariants
//!
//! - A [`Timeslice`] always carries a resolved timestamp; a frame without one
//!   becomes [`XvizMessage::Incomplete`] instead
//! - [`PointCloud::num_instances`]` * 3 == positions.len()`
//! - A point cloud's color buffer, when present, has a uniform stride of 3 or
//!   4 components across all entries merged into the stream

mod message;
mod pose;
mod stream;

// Re-export all public types
pub use message::{Metadata, Timeslice, XvizMessage};
pub use pose::{MapOrigin, Pose};
pub use stream::{Feature, FeatureKind, ImageEntry, PointCloud, StreamEntry, VariableEntry};

pub(crate) use pose::vec3_from_value;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn point_cloud_instance_invariant() {
        let cloud = PointCloud {
            positions: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            colors: None,
            ids: vec![json!(1), json!(2)],
            num_instances: 2,
        };
        assert_eq!(cloud.num_instances * 3, cloud.positions.len());
        assert_eq!(cloud.point_count(), 2);
    }

    #[test]
    fn metadata_major_version_parsing() {
        let metadata = Metadata { version: "2.0.0".to_string(), ..Default::default() };
        assert_eq!(metadata.major_version(), Some(2));

        let metadata = Metadata { version: "1.0".to_string(), ..Default::default() };
        assert_eq!(metadata.major_version(), Some(1));

        let metadata = Metadata { version: "abc".to_string(), ..Default::default() };
        assert_eq!(metadata.major_version(), None);

        let metadata = Metadata::default();
        assert_eq!(metadata.major_version(), None);
    }

    #[test]
    fn map_origin_from_object_and_array() {
        let obj = json!({"longitude": 8.42, "latitude": 49.01, "altitude": 112.5});
        let origin = MapOrigin::from_value(&obj).expect("object form");
        assert_eq!(origin.longitude, 8.42);
        assert_eq!(origin.latitude, 49.01);
        assert_eq!(origin.altitude, 112.5);

        let arr = json!([8.42, 49.01, 112.5]);
        assert_eq!(MapOrigin::from_value(&arr), Some(origin));

        assert_eq!(MapOrigin::from_value(&json!([1.0, 2.0])), None);
        assert_eq!(MapOrigin::from_value(&json!("nope")), None);
    }

    #[test]
    fn timeslice_stream_lookup() {
        let mut slice = Timeslice::new(1000.5);
        slice.streams.insert(
            "/lidar".to_string(),
            StreamEntry::PointCloud(PointCloud {
                positions: vec![0.0, 0.0, 0.0],
                colors: None,
                ids: vec![serde_json::Value::Null],
                num_instances: 1,
            }),
        );

        assert_eq!(slice.timestamp, 1000.5);
        assert!(matches!(slice.streams.get("/lidar"), Some(StreamEntry::PointCloud(_))));
        assert!(slice.streams.get("/missing").is_none());
    }

    #[test]
    fn message_kind_helpers() {
        let slice = XvizMessage::Timeslice(Timeslice::new(1.0));
        assert!(slice.is_timeslice());
        assert_eq!(slice.timestamp(), Some(1.0));

        let incomplete = XvizMessage::Incomplete { message: "missing updates".to_string() };
        assert!(!incomplete.is_timeslice());
        assert_eq!(incomplete.timestamp(), None);
    }
}
