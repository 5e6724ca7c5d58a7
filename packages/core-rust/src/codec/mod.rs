//! Bidirectional codecs between application [`Value`]s and wire JSON.
//!
//! Each remote property type has one codec. A codec:
//!
//! - **parses** an application value into the property payload sent on
//!   create/update (e.g. `{"number": 4}`),
//! - **encodes** a property object read back from the remote into an
//!   application value, tolerating missing or partial shapes,
//! - emits the **schema fragment** declaring the property on a collection.
//!
//! Codecs are pure and shared as `Arc<dyn Codec>` by column definitions.

mod choice;
mod reference;
mod scalar;
mod system;
mod text;

use std::fmt;

use serde_json::{json, Value as JsonValue};

pub use choice::{MultiSelectCodec, SelectCodec};
pub use reference::{FilesCodec, PeopleCodec, RelationCodec};
pub use scalar::{CheckboxCodec, DateCodec, NumberCodec};
pub use system::{SystemCodec, UniqueIdCodec};
pub use text::{ContactCodec, RichTextCodec, TitleCodec};

use crate::error::CodecError;
use crate::property::PropertyType;
use crate::value::Value;

/// Conversion contract for one remote property type.
///
/// Used as `Arc<dyn Codec>`.
pub trait Codec: fmt::Debug + Send + Sync {
    /// The property type this codec reads and writes.
    fn property_type(&self) -> PropertyType;

    /// Validates `value` and builds the wire payload for it.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the value has the wrong shape, fails
    /// validation, or the property type is read-only.
    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError>;

    /// Decodes a wire property object into an application value.
    ///
    /// Missing nested fields decode to a neutral value.
    ///
    /// # Errors
    ///
    /// Only returns an error when a semantically required part of the wire
    /// shape is absent.
    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError>;

    /// The payload that clears this property.
    fn empty(&self) -> JsonValue {
        json!({ self.property_type().wire_key(): null })
    }

    /// Type-specific body of the schema fragment (the part under the wire key).
    fn schema_body(&self) -> JsonValue {
        json!({})
    }

    /// Schema fragment declaring `property_name` with this codec's type.
    fn config(&self, property_name: &str) -> JsonValue {
        json!({
            property_name: { self.property_type().wire_key(): self.schema_body() }
        })
    }
}

/// Returns the wire-type key declared by a property configuration object.
///
/// Prefers an explicit `type` field (as returned by the remote) and falls
/// back to the first key naming a known property type (as emitted by
/// [`Codec::config`]).
#[must_use]
pub fn declared_type_key(property_config: &JsonValue) -> Option<&str> {
    let object = property_config.as_object()?;
    if let Some(ty) = object.get("type").and_then(JsonValue::as_str) {
        return Some(ty);
    }
    object
        .keys()
        .map(String::as_str)
        .find(|key| PropertyType::from_wire_key(key).is_some())
}

/// Returns the payload nested under `key` in a property object, if any.
pub(crate) fn payload<'a>(wire: &'a JsonValue, key: &str) -> Option<&'a JsonValue> {
    wire.get(key).filter(|v| !v.is_null())
}

pub(crate) fn mismatch(expected: &'static str, found: &Value) -> CodecError {
    CodecError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

/// Extracts a string from either a bare string or an object carrying `field`.
pub(crate) fn string_or_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    match value {
        Value::String(s) => Some(s),
        Value::Map(map) => map.get(field).and_then(Value::as_str),
        _ => None,
    }
}
