//! Read-only codecs for system-maintained properties.
//!
//! `parse` always fails: the remote assigns these values itself.

use serde_json::{json, Value as JsonValue};

use super::{payload, Codec};
use crate::error::CodecError;
use crate::property::PropertyType;
use crate::value::Value;

/// Codec for `created_time`, `last_edited_time`, `created_by` and `last_edited_by`.
///
/// Timestamps decode to their ISO string; attribution decodes to the user id.
#[derive(Debug, Clone, Copy)]
pub struct SystemCodec {
    kind: PropertyType,
}

impl SystemCodec {
    /// Codec for one of the four system property types.
    ///
    /// Returns `None` for any other type.
    #[must_use]
    pub fn new(kind: PropertyType) -> Option<Self> {
        matches!(
            kind,
            PropertyType::CreatedTime
                | PropertyType::LastEditedTime
                | PropertyType::CreatedBy
                | PropertyType::LastEditedBy
        )
        .then_some(Self { kind })
    }

    #[must_use]
    pub fn created_time() -> Self {
        Self {
            kind: PropertyType::CreatedTime,
        }
    }

    #[must_use]
    pub fn last_edited_time() -> Self {
        Self {
            kind: PropertyType::LastEditedTime,
        }
    }

    #[must_use]
    pub fn created_by() -> Self {
        Self {
            kind: PropertyType::CreatedBy,
        }
    }

    #[must_use]
    pub fn last_edited_by() -> Self {
        Self {
            kind: PropertyType::LastEditedBy,
        }
    }
}

impl Codec for SystemCodec {
    fn property_type(&self) -> PropertyType {
        self.kind
    }

    fn parse(&self, _value: &Value) -> Result<JsonValue, CodecError> {
        Err(CodecError::ReadOnly(self.kind))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        let Some(inner) = payload(wire, self.kind.wire_key()) else {
            return Ok(Value::Null);
        };
        let text = if self.kind.is_attribution() {
            inner.get("id").and_then(JsonValue::as_str)
        } else {
            inner.as_str()
        };
        Ok(text.map_or(Value::Null, Value::from))
    }
}

/// Codec for `unique_id` properties.
///
/// Decodes to `"PREFIX-n"` when the collection declares a prefix, otherwise
/// to the bare integer.
#[derive(Debug, Clone, Default)]
pub struct UniqueIdCodec {
    prefix: Option<String>,
}

impl UniqueIdCodec {
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

impl Codec for UniqueIdCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::UniqueId
    }

    fn parse(&self, _value: &Value) -> Result<JsonValue, CodecError> {
        Err(CodecError::ReadOnly(PropertyType::UniqueId))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        let Some(inner) = payload(wire, "unique_id") else {
            return Ok(Value::Null);
        };
        let Some(number) = inner.get("number").and_then(JsonValue::as_i64) else {
            return Ok(Value::Null);
        };
        match inner.get("prefix").and_then(JsonValue::as_str) {
            Some(prefix) if !prefix.is_empty() => Ok(Value::String(format!("{prefix}-{number}"))),
            _ => Ok(Value::Int(number)),
        }
    }

    fn schema_body(&self) -> JsonValue {
        json!({"prefix": self.prefix})
    }
}
