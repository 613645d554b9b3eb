//! Parser configuration
//!
//! Every parse entry point takes an explicit [`XvizConfig`] rather than
//! consulting process-wide state, so independent sessions can target
//! different protocol versions concurrently. Version promotion after a
//! metadata parse is the session's job (see
//! [`XvizSession`](crate::session::XvizSession)), not a side effect here.

use serde_json::{Map, Value};
use std::sync::Arc;

/// Hook invoked once per legacy (v1) primitive before normalization.
///
/// Receives the primitive object, the stream name, and the frame timestamp
/// when known. The hook may rewrite the primitive in place, including its
/// declared `type`; the normalizer re-reads the type afterward.
pub type PrimitiveHook = Arc<dyn Fn(&mut Map<String, Value>, &str, Option<f64>) + Send + Sync>;

/// Configuration consulted by every parse call.
#[derive(Clone)]
pub struct XvizConfig {
    /// Major versions this consumer accepts.
    pub supported_versions: Vec<u32>,

    /// Major version assumed for messages that never declare one.
    pub current_major_version: u32,

    /// Stream whose pose supplies the frame timestamp when the message
    /// itself carries none.
    pub primary_pose_stream: String,

    /// Optional per-primitive preprocessing hook (v1 messages only).
    pub pre_process_primitive: Option<PrimitiveHook>,
}

impl Default for XvizConfig {
    fn default() -> Self {
        Self {
            supported_versions: vec![1, 2],
            current_major_version: 2,
            primary_pose_stream: "/vehicle_pose".to_string(),
            pre_process_primitive: None,
        }
    }
}

impl XvizConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the accepted major versions.
    pub fn with_supported_versions(mut self, versions: impl Into<Vec<u32>>) -> Self {
        self.supported_versions = versions.into();
        self
    }

    /// Set the version assumed for undeclared messages.
    pub fn with_current_major_version(mut self, version: u32) -> Self {
        self.current_major_version = version;
        self
    }

    /// Set the stream used to resolve legacy frame timestamps.
    pub fn with_primary_pose_stream(mut self, stream: impl Into<String>) -> Self {
        self.primary_pose_stream = stream.into();
        self
    }

    /// Install a v1 primitive preprocessing hook.
    pub fn with_primitive_hook(mut self, hook: PrimitiveHook) -> Self {
        self.pre_process_primitive = Some(hook);
        self
    }

    /// Whether the given major version is accepted.
    pub fn supports(&self, major: u32) -> bool {
        self.supported_versions.contains(&major)
    }
}

impl std::fmt::Debug for XvizConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XvizConfig")
            .field("supported_versions", &self.supported_versions)
            .field("current_major_version", &self.current_major_version)
            .field("primary_pose_stream", &self.primary_pose_stream)
            .field("pre_process_primitive", &self.pre_process_primitive.as_ref().map(|_| "<hook>"))
            .finish()
    }
}
