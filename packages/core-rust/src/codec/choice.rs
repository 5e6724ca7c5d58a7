//! Choice codecs: `select`, `status` and `multi_select`.
//!
//! Without declared options any name is accepted and the remote creates
//! missing options on write. With declared options the value space is
//! narrowed to exactly that set and the schema fragment lists them.

use serde_json::{json, Value as JsonValue};

use super::{mismatch, payload, string_or_field, Codec};
use crate::error::CodecError;
use crate::property::PropertyType;
use crate::value::Value;

fn options_body(options: Option<&[String]>) -> JsonValue {
    match options {
        Some(names) => json!({
            "options": names.iter().map(|n| json!({"name": n})).collect::<Vec<_>>()
        }),
        None => json!({}),
    }
}

fn check_option(options: Option<&[String]>, name: &str) -> Result<(), CodecError> {
    match options {
        Some(allowed) if !allowed.iter().any(|o| o == name) => Err(CodecError::Rejected(format!(
            "`{name}` is not one of the declared options: {}",
            allowed.join(", ")
        ))),
        _ => Ok(()),
    }
}

fn option_name(value: &Value) -> Result<&str, CodecError> {
    let name = string_or_field(value, "name")
        .map(str::trim)
        .ok_or_else(|| mismatch("option name or {name}", value))?;
    if name.is_empty() {
        return Err(CodecError::Rejected("option name must not be empty".into()));
    }
    Ok(name)
}

// ---------------------------------------------------------------------------
// Select / status
// ---------------------------------------------------------------------------

/// Codec for single-choice properties (`select` and `status`).
#[derive(Debug, Clone)]
pub struct SelectCodec {
    kind: PropertyType,
    options: Option<Vec<String>>,
}

impl SelectCodec {
    #[must_use]
    pub fn select() -> Self {
        Self {
            kind: PropertyType::Select,
            options: None,
        }
    }

    #[must_use]
    pub fn status() -> Self {
        Self {
            kind: PropertyType::Status,
            options: None,
        }
    }

    /// Returns a copy restricted to `options`, or unrestricted for `None`.
    #[must_use]
    pub fn with_options(&self, options: Option<Vec<String>>) -> Self {
        Self {
            kind: self.kind,
            options,
        }
    }

    /// The declared option set, if narrowed.
    #[must_use]
    pub fn options(&self) -> Option<&[String]> {
        self.options.as_deref()
    }
}

impl Codec for SelectCodec {
    fn property_type(&self) -> PropertyType {
        self.kind
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let name = option_name(value)?;
        check_option(self.options(), name)?;
        Ok(json!({ self.kind.wire_key(): {"name": name} }))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        Ok(payload(wire, self.kind.wire_key())
            .and_then(|choice| choice.get("name"))
            .and_then(JsonValue::as_str)
            .map_or(Value::Null, Value::from))
    }

    fn schema_body(&self) -> JsonValue {
        options_body(self.options())
    }
}

// ---------------------------------------------------------------------------
// Multi-select
// ---------------------------------------------------------------------------

/// Codec for `multi_select` properties. The application value is a list of names.
#[derive(Debug, Clone, Default)]
pub struct MultiSelectCodec {
    options: Option<Vec<String>>,
}

impl MultiSelectCodec {
    #[must_use]
    pub fn with_options(&self, options: Option<Vec<String>>) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> Option<&[String]> {
        self.options.as_deref()
    }
}

impl Codec for MultiSelectCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::MultiSelect
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let items = value
            .as_array()
            .ok_or_else(|| mismatch("list of option names", value))?;
        let mut names: Vec<&str> = Vec::with_capacity(items.len());
        for item in items {
            let name = option_name(item)?;
            check_option(self.options(), name)?;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let payload: Vec<JsonValue> = names.iter().map(|n| json!({"name": n})).collect();
        Ok(json!({"multi_select": payload}))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        let names = wire
            .get("multi_select")
            .and_then(JsonValue::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(JsonValue::as_str))
                    .map(Value::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Value::Array(names))
    }

    fn empty(&self) -> JsonValue {
        json!({"multi_select": []})
    }

    fn schema_body(&self) -> JsonValue {
        options_body(self.options())
    }
}
