//! Error types for XVIZ protocol processing.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context for debugging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Version Errors**: A message declared an unparseable version, or one
//!   outside the session's supported set
//! - **Container Errors**: Binary container header/table inconsistencies
//! - **JSON Errors**: Text that failed to materialize into a message object
//! - **Transport Errors**: Failures raised by a downstream sink
//! - **Source Errors**: Failures raised by a log/frame source during playback
//!
//! Conditions that reflect gaps in the data stream itself (a frame with no
//! updates, a missing timestamp) are *not* Rust errors: they come back as
//! [`XvizMessage::Incomplete`](crate::XvizMessage::Incomplete) values so a
//! long-running consumer can skip one frame and continue.
//!
//! ## Recovery
//!
//! ```rust
//! use xviz::XvizError;
//!
//! let error = XvizError::source_failed("frame index past end of log");
//! if error.is_recoverable() {
//!     println!("Can skip this frame and continue");
//! }
//! ```

use thiserror::Error;

/// Result type alias for XVIZ operations.
pub type Result<T, E = XvizError> = std::result::Result<T, E>;

/// Main error type for XVIZ protocol operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum XvizError {
    #[error("XVIZ version {detected} is not supported (supported: {supported:?})")]
    UnsupportedVersion { detected: u32, supported: Vec<u32> },

    #[error("unable to detect XVIZ version from {value:?}")]
    UndetectableVersion { value: String },

    #[error("malformed binary container in {context}: {details}")]
    MalformedContainer { context: String, details: String },

    #[error("JSON error in {context}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("transport write failed for '{label}'")]
    Transport {
        label: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("frame source error: {details}")]
    Source { details: String },

    #[error("schema validation failed for '{schema}': {details}")]
    SchemaValidation { schema: String, details: String },
}

impl XvizError {
    /// Returns whether a streaming consumer can skip the offending frame
    /// and keep processing the rest of the log.
    ///
    /// Version and container errors indicate a misconfigured producer or a
    /// corrupt stream and abort the current call; source and transport
    /// conditions are transient.
    pub fn is_recoverable(&self) -> bool {
        match self {
            XvizError::UnsupportedVersion { .. } => false,
            XvizError::UndetectableVersion { .. } => false,
            XvizError::MalformedContainer { .. } => false,
            XvizError::Json { .. } => false,
            XvizError::SchemaValidation { .. } => false,
            XvizError::Transport { .. } => true,
            XvizError::Source { .. } => true,
        }
    }

    /// Helper constructor for container errors.
    pub fn malformed_container(context: impl Into<String>, details: impl Into<String>) -> Self {
        XvizError::MalformedContainer { context: context.into(), details: details.into() }
    }

    /// Helper constructor for JSON materialization errors.
    pub fn json_error(context: impl Into<String>, source: serde_json::Error) -> Self {
        XvizError::Json { context: context.into(), source }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(
        label: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        XvizError::Transport { label: label.into(), source }
    }

    /// Helper constructor for frame source errors.
    pub fn source_failed(details: impl Into<String>) -> Self {
        XvizError::Source { details: details.into() }
    }

    /// Helper constructor for schema validation errors.
    pub fn schema_validation(schema: impl Into<String>, details: impl Into<String>) -> Self {
        XvizError::SchemaValidation { schema: schema.into(), details: details.into() }
    }
}
