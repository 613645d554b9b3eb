//! Adaptive transport sending.
//!
//! Each connection negotiates a wire format once; after that, every
//! outgoing message either passes through unchanged (its serialized form
//! already matches the negotiated format and the object was never modified)
//! or is re-encoded from the object form. Actual socket I/O lives behind
//! the [`XvizSink`] collaborator; this module owns only the decision logic.

use tracing::trace;

use crate::container::encode_binary;
use crate::data::{XvizData, XvizFormat};
use crate::{Result, XvizError};

/// Serialized payload handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WirePayload {
    Text(String),
    Binary(Vec<u8>),
}

impl WirePayload {
    pub fn len(&self) -> usize {
        match self {
            WirePayload::Text(text) => text.len(),
            WirePayload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transport sink collaborator.
///
/// Implementations write synchronously and raise on transport failure; the
/// sender propagates such failures to its caller unchanged.
pub trait XvizSink {
    fn write_sync(&mut self, label: &str, payload: WirePayload) -> Result<()>;
}

/// Wire format negotiated for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Binary,
}

/// Per-connection sender deciding between passthrough and re-encode.
pub struct XvizSender<S: XvizSink> {
    sink: S,
    format: WireFormat,
}

impl<S: XvizSink> XvizSender<S> {
    pub fn new(sink: S, format: WireFormat) -> Self {
        Self { sink, format }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Send one message, forwarding bytes unchanged when possible.
    ///
    /// A clean payload whose authoritative form already matches the
    /// negotiated format passes through without a re-encode; everything
    /// else materializes the object and serializes it in the negotiated
    /// format. Sink failures propagate, never swallowed.
    pub fn send(&mut self, label: &str, data: &mut XvizData) -> Result<()> {
        if let Some(payload) = self.passthrough(data) {
            trace!(label, format = ?self.format, "forwarding payload unchanged");
            return self.sink.write_sync(label, payload);
        }

        let object = data.message()?;
        let payload = match self.format {
            WireFormat::Binary => WirePayload::Binary(encode_binary(object)?),
            WireFormat::Json => WirePayload::Text(
                serde_json::to_string(object)
                    .map_err(|e| XvizError::json_error("outgoing message serialization", e))?,
            ),
        };
        trace!(label, format = ?self.format, bytes = payload.len(), "re-encoded payload");
        self.sink.write_sync(label, payload)
    }

    fn passthrough(&self, data: &XvizData) -> Option<WirePayload> {
        if data.is_dirty() {
            return None;
        }
        match (self.format, data.data_format()) {
            (WireFormat::Binary, XvizFormat::Binary) => {
                Some(WirePayload::Binary(data.bytes()?.to_vec()))
            }
            (WireFormat::Json, XvizFormat::JsonString) => {
                Some(WirePayload::Text(data.text()?.to_string()))
            }
            (WireFormat::Json, XvizFormat::JsonBuffer) => {
                Some(WirePayload::Binary(data.bytes()?.to_vec()))
            }
            _ => None,
        }
    }
}

/// In-memory sink collecting writes, for tests and loopback use.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub writes: Vec<(String, WirePayload)>,
    /// When set, the next write fails with a transport error.
    pub fail_next: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl XvizSink for MemorySink {
    fn write_sync(&mut self, label: &str, payload: WirePayload) -> Result<()> {
        if self.fail_next {
            self.fail_next = false;
            return Err(XvizError::transport_failed(
                label,
                Box::new(std::io::Error::other("sink closed")),
            ));
        }
        self.writes.push((label.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::decode_binary;
    use serde_json::json;

    fn frame_json() -> serde_json::Value {
        json!({
            "type": "xviz/state_update",
            "data": {"updates": [{"timestamp": 1.0}]},
        })
    }

    #[test]
    fn matching_binary_input_passes_through_byte_exact() {
        let bytes = encode_binary(&frame_json()).unwrap();
        let mut sender = XvizSender::new(MemorySink::new(), WireFormat::Binary);
        let mut data = XvizData::from_bytes(bytes.clone());

        sender.send("frame", &mut data).unwrap();

        let sink = sender.into_inner();
        assert_eq!(sink.writes.len(), 1);
        assert_eq!(sink.writes[0].1, WirePayload::Binary(bytes));
    }

    #[test]
    fn matching_json_text_passes_through_unchanged() {
        let text = serde_json::to_string(&frame_json()).unwrap();
        let mut sender = XvizSender::new(MemorySink::new(), WireFormat::Json);
        let mut data = XvizData::from_text(text.clone());

        sender.send("frame", &mut data).unwrap();

        let sink = sender.into_inner();
        assert_eq!(sink.writes[0].1, WirePayload::Text(text));
    }

    #[test]
    fn format_mismatch_re_encodes() {
        let text = serde_json::to_string(&frame_json()).unwrap();
        let mut sender = XvizSender::new(MemorySink::new(), WireFormat::Binary);
        let mut data = XvizData::from_text(text);

        sender.send("frame", &mut data).unwrap();

        let sink = sender.into_inner();
        match &sink.writes[0].1 {
            WirePayload::Binary(bytes) => {
                assert_eq!(decode_binary(bytes).unwrap(), frame_json());
            }
            other => panic!("expected Binary payload, got {other:?}"),
        }
    }

    #[test]
    fn dirty_messages_are_re_encoded_not_passed_through() {
        let bytes = encode_binary(&frame_json()).unwrap();
        let mut sender = XvizSender::new(MemorySink::new(), WireFormat::Binary);
        let mut data = XvizData::from_bytes(bytes);

        data.message_mut().unwrap()["data"]["updates"][0]["timestamp"] = json!(2.0);
        sender.send("frame", &mut data).unwrap();

        let sink = sender.into_inner();
        match &sink.writes[0].1 {
            WirePayload::Binary(bytes) => {
                let decoded = decode_binary(bytes).unwrap();
                assert_eq!(decoded["data"]["updates"][0]["timestamp"], json!(2.0));
            }
            other => panic!("expected Binary payload, got {other:?}"),
        }
    }

    #[test]
    fn object_input_serializes_to_negotiated_json() {
        let mut sender = XvizSender::new(MemorySink::new(), WireFormat::Json);
        let mut data = XvizData::from_object(frame_json());

        sender.send("frame", &mut data).unwrap();

        let sink = sender.into_inner();
        match &sink.writes[0].1 {
            WirePayload::Text(text) => {
                assert_eq!(serde_json::from_str::<serde_json::Value>(text).unwrap(), frame_json());
            }
            other => panic!("expected Text payload, got {other:?}"),
        }
    }

    #[test]
    fn sink_failures_propagate() {
        let mut sink = MemorySink::new();
        sink.fail_next = true;
        let mut sender = XvizSender::new(sink, WireFormat::Json);
        let mut data = XvizData::from_object(frame_json());

        let err = sender.send("frame", &mut data).unwrap_err();
        assert!(matches!(err, XvizError::Transport { .. }));
        assert!(err.is_recoverable());
        assert!(sender.into_inner().writes.is_empty());
    }
}
