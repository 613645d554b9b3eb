//! Buffer pointer grammar.
//!
//! Skeleton values that were moved out of band are replaced by pointer
//! strings with a strict grammar: `#/accessors/<uint>` or `#/images/<uint>`,
//! where the index is the buffer's position in its table at encode time.
//!
//! A literal string that would collide with the grammar (any run of `#`
//! followed by `/`) is escaped on encode by prepending one `#`, and
//! unescaped on decode by removing one. `#/foo` therefore travels as
//! `##/foo` and an already-escaped `##/foo` travels as `###/foo`.

use crate::{Result, XvizError};

/// A parsed pointer into one of the container's buffer tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPointer {
    Accessor(usize),
    Image(usize),
}

impl BufferPointer {
    /// Parse a skeleton string against the pointer grammar.
    ///
    /// Returns `Ok(None)` for strings that do not start with `#/` (plain
    /// literals). A string that starts with `#/` but does not match the
    /// grammar is a structural error: encode always escapes colliding
    /// literals, so nothing legitimate produces one.
    pub fn parse(s: &str) -> Result<Option<Self>> {
        let Some(rest) = s.strip_prefix("#/") else {
            return Ok(None);
        };
        let (kind, index) = rest
            .split_once('/')
            .ok_or_else(|| XvizError::malformed_container("pointer", format!("malformed pointer {s:?}")))?;
        let index: usize = index
            .parse()
            .map_err(|_| XvizError::malformed_container("pointer", format!("non-numeric pointer index in {s:?}")))?;
        match kind {
            "accessors" => Ok(Some(BufferPointer::Accessor(index))),
            "images" => Ok(Some(BufferPointer::Image(index))),
            _ => Err(XvizError::malformed_container(
                "pointer",
                format!("unknown pointer table {kind:?} in {s:?}"),
            )),
        }
    }

    pub fn accessor(index: usize) -> String {
        format!("#/accessors/{index}")
    }

    pub fn image(index: usize) -> String {
        format!("#/images/{index}")
    }
}

/// Whether a literal string collides with the pointer grammar and must be
/// escaped before entering a skeleton.
fn collides_with_grammar(s: &str) -> bool {
    let stripped = s.trim_start_matches('#');
    s.starts_with('#') && stripped.starts_with('/')
}

/// Escape a literal string for the skeleton, if needed.
pub fn escape_literal(s: &str) -> Option<String> {
    if collides_with_grammar(s) { Some(format!("#{s}")) } else { None }
}

/// Undo [`escape_literal`] on decode.
///
/// Only applies to strings with two or more leading `#` before a `/`;
/// single-`#` strings are pointers and are resolved, not unescaped.
pub fn unescape_literal(s: &str) -> Option<String> {
    if s.starts_with("##") && collides_with_grammar(s) { Some(s[1..].to_string()) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_tables() {
        assert_eq!(BufferPointer::parse("#/accessors/0").unwrap(), Some(BufferPointer::Accessor(0)));
        assert_eq!(BufferPointer::parse("#/accessors/17").unwrap(), Some(BufferPointer::Accessor(17)));
        assert_eq!(BufferPointer::parse("#/images/3").unwrap(), Some(BufferPointer::Image(3)));
    }

    #[test]
    fn plain_strings_are_not_pointers() {
        assert_eq!(BufferPointer::parse("hello").unwrap(), None);
        assert_eq!(BufferPointer::parse("").unwrap(), None);
        assert_eq!(BufferPointer::parse("# /accessors/0").unwrap(), None);
        // escaped literals never start with `#/`
        assert_eq!(BufferPointer::parse("##/accessors/0").unwrap(), None);
    }

    #[test]
    fn malformed_pointers_are_structural_errors() {
        assert!(BufferPointer::parse("#/accessors").is_err());
        assert!(BufferPointer::parse("#/accessors/abc").is_err());
        assert!(BufferPointer::parse("#/accessors/-1").is_err());
        assert!(BufferPointer::parse("#/buffers/0").is_err());
        assert!(BufferPointer::parse("#/").is_err());
    }

    #[test]
    fn display_forms_match_grammar() {
        assert_eq!(BufferPointer::accessor(5), "#/accessors/5");
        assert_eq!(BufferPointer::image(0), "#/images/0");
    }

    #[test]
    fn escaping_round_trips() {
        for literal in ["#/foo", "#/accessors/1", "##/already", "###/deep", "#/"] {
            let escaped = escape_literal(literal).expect("collides with grammar");
            assert_eq!(unescape_literal(&escaped).as_deref(), Some(literal));
        }
        assert_eq!(escape_literal("plain"), None);
        assert_eq!(escape_literal("#no-slash"), None);
        assert_eq!(escape_literal("/leading-slash"), None);
        assert_eq!(unescape_literal("#/accessors/0"), None);
    }
}
