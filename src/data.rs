//! Representation detection and lazy materialization.
//!
//! Wire data reaches the library in four shapes: an in-memory JSON object, a
//! JSON text string, a byte buffer holding UTF-8 JSON text, or a binary
//! container. [`XvizData`] classifies an input without mutating it and
//! materializes the object form only when asked, caching the result until
//! the object is modified.

use serde_json::Value;
use tracing::trace;

use crate::container::{decode_binary, has_container_magic};
use crate::{Result, XvizError};

/// Classified shape of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XvizFormat {
    /// Structured in-memory object.
    Object,
    /// JSON text.
    JsonString,
    /// Byte buffer holding UTF-8 encoded JSON text.
    JsonBuffer,
    /// Binary container bytes.
    Binary,
}

/// One payload in whichever representation it arrived, with by-need access
/// to the object form.
///
/// Exactly one underlying form is authoritative at a time. Reading
/// [`message`](XvizData::message) on a serialized form parses or decodes
/// once and caches the object; mutating the object via
/// [`message_mut`](XvizData::message_mut) marks the instance dirty, after
/// which the serialized form no longer reflects the payload and senders must
/// re-encode.
#[derive(Debug, Clone)]
pub struct XvizData {
    format: XvizFormat,
    text: Option<String>,
    bytes: Option<Vec<u8>>,
    object: Option<Value>,
    dirty: bool,
}

impl XvizData {
    /// Wrap an already-structured object.
    pub fn from_object(object: Value) -> Self {
        Self { format: XvizFormat::Object, text: None, bytes: None, object: Some(object), dirty: false }
    }

    /// Wrap JSON text. The text is not parsed until the object is needed.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            format: XvizFormat::JsonString,
            text: Some(text.into()),
            bytes: None,
            object: None,
            dirty: false,
        }
    }

    /// Classify and wrap a byte buffer.
    ///
    /// A buffer starting with the container magic is a binary container;
    /// anything else is treated as UTF-8 encoded JSON text. The bytes are
    /// copied; nothing aliases the caller's buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let format =
            if has_container_magic(&bytes) { XvizFormat::Binary } else { XvizFormat::JsonBuffer };
        trace!(?format, len = bytes.len(), "classified byte payload");
        Self { format, text: None, bytes: Some(bytes), object: None, dirty: false }
    }

    /// The classification of the originally supplied payload.
    pub fn format(&self) -> XvizFormat {
        self.format
    }

    /// The currently authoritative representation.
    ///
    /// Stays at the original format while the cached object is just a view;
    /// switches to [`XvizFormat::Object`] once the object has been mutated.
    pub fn data_format(&self) -> XvizFormat {
        if self.dirty { XvizFormat::Object } else { self.format }
    }

    /// Whether the object form is already materialized.
    pub fn has_message(&self) -> bool {
        self.object.is_some()
    }

    /// Whether the object diverged from the serialized form.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The serialized text, when text is the authoritative form.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The serialized bytes, when bytes are the authoritative form.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Return the object form, materializing it on first access.
    ///
    /// Text forms are trimmed and JSON-parsed; binary containers decode
    /// through the codec. Parse failures surface here, not at detection
    /// time. Subsequent calls return the cached object without re-decoding.
    pub fn message(&mut self) -> Result<&Value> {
        if self.object.is_none() {
            let object = match self.format {
                XvizFormat::Object => unreachable!("object form always materialized"),
                XvizFormat::JsonString => {
                    let text = self.text.as_deref().unwrap_or_default();
                    serde_json::from_str(text.trim())
                        .map_err(|e| XvizError::json_error("JSON text materialization", e))?
                }
                XvizFormat::JsonBuffer => {
                    let bytes = self.bytes.as_deref().unwrap_or_default();
                    let text = std::str::from_utf8(bytes).map_err(|e| {
                        XvizError::malformed_container(
                            "JSON buffer materialization",
                            format!("buffer is not UTF-8: {e}"),
                        )
                    })?;
                    serde_json::from_str(text.trim())
                        .map_err(|e| XvizError::json_error("JSON buffer materialization", e))?
                }
                XvizFormat::Binary => {
                    decode_binary(self.bytes.as_deref().unwrap_or_default())?
                }
            };
            trace!(format = ?self.format, "materialized message object");
            self.object = Some(object);
        }
        Ok(self.object.as_ref().expect("just materialized"))
    }

    /// Mutable access to the object form.
    ///
    /// Marks the payload dirty: the original serialized form stops being
    /// authoritative and senders re-encode from the object.
    pub fn message_mut(&mut self) -> Result<&mut Value> {
        self.message()?;
        self.dirty = true;
        Ok(self.object.as_mut().expect("just materialized"))
    }
}

impl From<Value> for XvizData {
    fn from(value: Value) -> Self {
        Self::from_object(value)
    }
}
