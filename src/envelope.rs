//! Message envelope handling
//!
//! XVIZ messages travel wrapped in an envelope `{"type": "<ns>/<subtype>",
//! "data": <payload>}`. Splitting the `type` field is pure string
//! manipulation and never consults a schema.

use serde_json::Value;

/// Namespace reserved for XVIZ protocol messages.
pub const XVIZ_NAMESPACE: &str = "xviz";

/// Parsed envelope type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeType {
    pub namespace: String,
    pub subtype: String,
}

impl EnvelopeType {
    /// Split a wire `type` string on the first `/`.
    ///
    /// `"xviz/state_update"` yields `{xviz, state_update}`. A leading `/`
    /// yields an empty namespace with the remainder (further slashes
    /// included) as the subtype. No `/` yields an empty subtype.
    pub fn parse(wire_type: &str) -> Self {
        match wire_type.split_once('/') {
            Some((namespace, subtype)) => {
                Self { namespace: namespace.to_string(), subtype: subtype.to_string() }
            }
            None => Self { namespace: wire_type.to_string(), subtype: String::new() },
        }
    }

    /// Whether this envelope carries an XVIZ protocol message.
    pub fn is_xviz(&self) -> bool {
        self.namespace == XVIZ_NAMESPACE
    }
}

/// Returns the envelope type and payload when `value` is enveloped.
///
/// A value is enveloped when it is an object with both `type` and `data`
/// top-level keys. Anything else is a bare payload.
pub fn unpack_envelope(value: &Value) -> Option<(EnvelopeType, &Value)> {
    let obj = value.as_object()?;
    let wire_type = obj.get("type")?.as_str()?;
    let data = obj.get("data")?;
    Some((EnvelopeType::parse(wire_type), data))
}

/// Wrap a payload in an XVIZ envelope with the given subtype.
pub fn pack_envelope(subtype: &str, data: Value) -> Value {
    serde_json::json!({
        "type": format!("{XVIZ_NAMESPACE}/{subtype}"),
        "data": data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_plain_word_has_empty_subtype() {
        let t = EnvelopeType::parse("foo");
        assert_eq!(t.namespace, "foo");
        assert_eq!(t.subtype, "");
    }

    #[test]
    fn split_empty_string() {
        let t = EnvelopeType::parse("");
        assert_eq!(t.namespace, "");
        assert_eq!(t.subtype, "");
    }

    #[test]
    fn split_namespace_and_subtype() {
        let t = EnvelopeType::parse("foo/bar");
        assert_eq!(t.namespace, "foo");
        assert_eq!(t.subtype, "bar");
    }

    #[test]
    fn leading_slash_keeps_remainder_as_subtype() {
        let t = EnvelopeType::parse("/foo/bar");
        assert_eq!(t.namespace, "");
        assert_eq!(t.subtype, "foo/bar");
    }

    #[test]
    fn xviz_namespace_detection() {
        assert!(EnvelopeType::parse("xviz/metadata").is_xviz());
        assert!(!EnvelopeType::parse("other/metadata").is_xviz());
        assert!(!EnvelopeType::parse("xviz2/metadata").is_xviz());
    }

    #[test]
    fn unpack_requires_type_and_data() {
        assert!(unpack_envelope(&json!({"type": "xviz/metadata"})).is_none());
        assert!(unpack_envelope(&json!({"data": {}})).is_none());
        assert!(unpack_envelope(&json!([1, 2, 3])).is_none());

        let enveloped = json!({
            "type": "xviz/state_update",
            "data": {"updates": []},
        });
        let (t, data) = unpack_envelope(&enveloped).expect("enveloped message");
        assert_eq!(t.subtype, "state_update");
        assert!(data.get("updates").is_some());
    }

    #[test]
    fn pack_then_unpack_round_trips() {
        let packed = pack_envelope("metadata", json!({"version": "2.0.0"}));
        let (t, data) = unpack_envelope(&packed).unwrap();
        assert!(t.is_xviz());
        assert_eq!(t.subtype, "metadata");
        assert_eq!(data["version"], "2.0.0");
    }

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn split_never_panics_and_reassembles(s in "\\PC*") {
                let t = EnvelopeType::parse(&s);
                if s.contains('/') {
                    prop_assert_eq!(format!("{}/{}", t.namespace, t.subtype), s);
                } else {
                    prop_assert_eq!(&t.namespace, &s);
                    prop_assert_eq!(t.subtype, "");
                }
            }
        }
    }
}
