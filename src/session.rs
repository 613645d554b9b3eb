//! Streaming parse sessions.
//!
//! An [`XvizSession`] owns one connection's parse context and feeds
//! serialized inputs through the representation detector, the codec, and
//! the protocol parser, yielding one [`FrameResult`] per input. A failed
//! frame never poisons the session: the next input parses with a clean
//! slate.
//!
//! Version promotion is explicit here rather than a global side effect:
//! when a metadata message declares a major version, this session (and only
//! this session) starts assuming it for undeclared messages.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::XvizConfig;
use crate::data::XvizData;
use crate::envelope::unpack_envelope;
use crate::parse::parse_message;
use crate::types::XvizMessage;
use crate::validate::SchemaValidator;
use crate::XvizError;

/// Outcome of processing one input frame.
#[derive(Debug)]
pub enum FrameResult {
    /// A canonical XVIZ message.
    Message(XvizMessage),
    /// The input was well-formed but not an XVIZ message.
    Ignored,
    /// The frame failed; subsequent frames are unaffected.
    Failed(XvizError),
}

impl FrameResult {
    pub fn message(&self) -> Option<&XvizMessage> {
        match self {
            FrameResult::Message(message) => Some(message),
            _ => None,
        }
    }
}

/// Per-connection streaming parse state.
pub struct XvizSession {
    config: XvizConfig,
    validator: Option<Arc<dyn SchemaValidator>>,
}

impl XvizSession {
    pub fn new(config: XvizConfig) -> Self {
        Self { config, validator: None }
    }

    /// Install a schema validator consulted before dispatch.
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// The session's current parse context.
    pub fn config(&self) -> &XvizConfig {
        &self.config
    }

    /// Process one frame in any representation.
    pub fn process(&mut self, data: &mut XvizData) -> FrameResult {
        let value = match data.message() {
            Ok(value) => value.clone(),
            Err(err) => return FrameResult::Failed(err),
        };

        if let Some(validator) = &self.validator {
            if let Some((envelope_type, payload)) = unpack_envelope(&value) {
                if envelope_type.is_xviz() {
                    if let Err(err) = validator.validate(&envelope_type.subtype, payload) {
                        return FrameResult::Failed(err);
                    }
                }
            }
        }

        match parse_message(&value, &self.config) {
            Ok(Some(message)) => {
                self.promote_version(&message);
                FrameResult::Message(message)
            }
            Ok(None) => FrameResult::Ignored,
            Err(err) => {
                warn!(error = %err, "frame failed to parse");
                FrameResult::Failed(err)
            }
        }
    }

    /// Process JSON text.
    pub fn process_text(&mut self, text: &str) -> FrameResult {
        self.process(&mut XvizData::from_text(text))
    }

    /// Process raw bytes (binary container or UTF-8 JSON).
    pub fn process_bytes(&mut self, bytes: &[u8]) -> FrameResult {
        self.process(&mut XvizData::from_bytes(bytes.to_vec()))
    }

    /// Two-channel processing: results and errors are delivered through
    /// separate callbacks, both firing before this call returns.
    ///
    /// Mirrors the result-type contract of [`process`](Self::process) for
    /// callers structured around independent result/error sinks; a frame
    /// that is not an XVIZ message reaches neither channel.
    pub fn process_with(
        &mut self,
        data: &mut XvizData,
        mut on_message: impl FnMut(&XvizMessage),
        mut on_error: impl FnMut(&XvizError),
    ) {
        match self.process(data) {
            FrameResult::Message(message) => on_message(&message),
            FrameResult::Failed(err) => on_error(&err),
            FrameResult::Ignored => {}
        }
    }

    /// Adopt the major version a metadata message declares.
    fn promote_version(&mut self, message: &XvizMessage) {
        if let XvizMessage::Metadata(metadata) = message {
            if let Some(major) = metadata.major_version() {
                if major != self.config.current_major_version {
                    debug!(
                        from = self.config.current_major_version,
                        to = major,
                        "promoting session protocol version"
                    );
                    self.config.current_major_version = major;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::encode_binary;
    use crate::validate::NoopValidator;
    use serde_json::json;

    fn v1_frame() -> serde_json::Value {
        json!({
            "type": "xviz/state_update",
            "data": {
                "vehicle_pose": {"time": 100.0},
                "state_updates": [{
                    "primitives": {
                        "/lidar": [{"type": "points3d", "vertices": [[1.0, 2.0, 3.0]]}],
                    },
                }],
            },
        })
    }

    #[test]
    fn metadata_promotes_session_version() {
        let mut session = XvizSession::new(XvizConfig::default());
        assert_eq!(session.config().current_major_version, 2);

        let metadata = json!({"type": "xviz/metadata", "data": {"version": "1.0.0"}});
        let result = session.process(&mut XvizData::from_object(metadata));
        assert!(matches!(result, FrameResult::Message(XvizMessage::Metadata(_))));
        assert_eq!(session.config().current_major_version, 1);

        // Undeclared frames now parse as v1.
        let result = session.process(&mut XvizData::from_object(v1_frame()["data"].clone()));
        match result {
            FrameResult::Message(message) => assert_eq!(message.timestamp(), Some(100.0)),
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn one_bad_frame_does_not_poison_the_session() {
        let mut session =
            XvizSession::new(XvizConfig::new().with_current_major_version(1));

        let result = session.process_text("this is not json");
        assert!(matches!(result, FrameResult::Failed(XvizError::Json { .. })));

        let good = serde_json::to_string(&v1_frame()).unwrap();
        let result = session.process_text(&good);
        assert!(matches!(result, FrameResult::Message(XvizMessage::Timeslice(_))));
    }

    #[test]
    fn binary_frames_decode_through_the_codec() {
        let mut session =
            XvizSession::new(XvizConfig::new().with_current_major_version(1));
        let bytes = encode_binary(&v1_frame()).unwrap();
        let result = session.process_bytes(&bytes);
        match result {
            FrameResult::Message(XvizMessage::Timeslice(slice)) => {
                assert!(slice.streams.contains_key("/lidar"));
            }
            other => panic!("expected Timeslice, got {other:?}"),
        }
    }

    #[test]
    fn non_xviz_envelopes_are_ignored() {
        let mut session = XvizSession::new(XvizConfig::default());
        let result = session
            .process(&mut XvizData::from_object(json!({"type": "chat/hello", "data": {}})));
        assert!(matches!(result, FrameResult::Ignored));
    }

    #[test]
    fn two_channel_delivery_is_synchronous() {
        let mut session =
            XvizSession::new(XvizConfig::new().with_current_major_version(1));
        let mut messages = 0;
        let mut errors = 0;

        session.process_with(
            &mut XvizData::from_object(v1_frame()),
            |_| messages += 1,
            |_| errors += 1,
        );
        session.process_with(
            &mut XvizData::from_text("garbage"),
            |_| messages += 1,
            |_| errors += 1,
        );
        session.process_with(
            &mut XvizData::from_object(json!({"type": "other/x", "data": {}})),
            |_| messages += 1,
            |_| errors += 1,
        );

        assert_eq!(messages, 1);
        assert_eq!(errors, 1);
    }

    #[test]
    fn validator_failures_fail_the_frame_only() {
        struct RejectStateUpdates;
        impl SchemaValidator for RejectStateUpdates {
            fn validate(&self, schema_name: &str, _value: &serde_json::Value) -> crate::Result<()> {
                if schema_name == "state_update" {
                    Err(XvizError::schema_validation(schema_name, "rejected"))
                } else {
                    Ok(())
                }
            }
        }

        let mut session = XvizSession::new(XvizConfig::new().with_current_major_version(1))
            .with_validator(Arc::new(RejectStateUpdates));

        let result = session.process(&mut XvizData::from_object(v1_frame()));
        assert!(matches!(result, FrameResult::Failed(XvizError::SchemaValidation { .. })));

        let metadata = json!({"type": "xviz/metadata", "data": {"version": "1.0.0"}});
        let result = session.process(&mut XvizData::from_object(metadata));
        assert!(matches!(result, FrameResult::Message(_)));
    }

    #[test]
    fn sessions_are_independent() {
        let mut v1_session = XvizSession::new(XvizConfig::new().with_current_major_version(1))
            .with_validator(Arc::new(NoopValidator));
        let mut v2_session = XvizSession::new(XvizConfig::default());

        // Promoting one session must not affect the other.
        let metadata = json!({"type": "xviz/metadata", "data": {"version": "1.0.0"}});
        v1_session.process(&mut XvizData::from_object(metadata));
        assert_eq!(v1_session.config().current_major_version, 1);
        assert_eq!(v2_session.config().current_major_version, 2);

        let frame = v1_frame();
        assert!(matches!(
            v1_session.process(&mut XvizData::from_object(frame)),
            FrameResult::Message(XvizMessage::Timeslice(_))
        ));
    }
}
