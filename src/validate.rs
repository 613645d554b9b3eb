//! Schema validation collaborator.
//!
//! Validation is a black box to this library: the session hands a schema
//! name and a payload to whatever implementation the application plugs in
//! and treats a raised violation as a per-frame failure.

use serde_json::Value;

use crate::Result;

/// External schema validator consulted before message dispatch.
pub trait SchemaValidator: Send + Sync {
    /// Check `value` against the named schema, raising on violation.
    fn validate(&self, schema_name: &str, value: &Value) -> Result<()>;
}

/// Default validator that accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl SchemaValidator for NoopValidator {
    fn validate(&self, _schema_name: &str, _value: &Value) -> Result<()> {
        Ok(())
    }
}
