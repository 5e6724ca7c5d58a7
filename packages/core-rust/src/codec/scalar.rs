//! Number, checkbox and date codecs.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value as JsonValue};

use super::{mismatch, payload, Codec};
use crate::error::CodecError;
use crate::property::PropertyType;
use crate::value::Value;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}(T\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:\d{2})?)?$")
        .expect("valid date regex")
});

// ---------------------------------------------------------------------------
// Number
// ---------------------------------------------------------------------------

/// Codec for `number` properties.
#[derive(Debug, Clone, Default)]
pub struct NumberCodec {
    format: Option<String>,
}

impl NumberCodec {
    /// Number codec whose schema declares a display format (e.g. `"dollar"`).
    #[must_use]
    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
        }
    }
}

impl Codec for NumberCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::Number
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        match value {
            Value::Int(n) => Ok(json!({"number": n})),
            Value::Float(f) if f.is_finite() => Ok(json!({"number": f})),
            Value::Float(_) => Err(CodecError::Rejected("number must be finite".into())),
            other => Err(mismatch("number", other)),
        }
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        Ok(payload(wire, "number").map_or(Value::Null, Value::from))
    }

    fn schema_body(&self) -> JsonValue {
        match &self.format {
            Some(format) => json!({"format": format}),
            None => json!({}),
        }
    }
}

// ---------------------------------------------------------------------------
// Checkbox
// ---------------------------------------------------------------------------

/// Codec for `checkbox` properties. A missing value decodes to `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckboxCodec;

impl Codec for CheckboxCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::Checkbox
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let checked = value.as_bool().ok_or_else(|| mismatch("bool", value))?;
        Ok(json!({"checkbox": checked}))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        Ok(Value::Bool(
            wire.get("checkbox")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
        ))
    }

    fn empty(&self) -> JsonValue {
        json!({"checkbox": false})
    }
}

// ---------------------------------------------------------------------------
// Date
// ---------------------------------------------------------------------------

/// Codec for `date` properties.
///
/// The application value is either the ISO start date as a string, or a map
/// with `start` and optional `end` / `time_zone` for ranges and zoned dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateCodec;

fn check_date(field: &str, text: &str) -> Result<(), CodecError> {
    if DATE_RE.is_match(text) {
        Ok(())
    } else {
        Err(CodecError::Rejected(format!(
            "{field} `{text}` is not an ISO 8601 date"
        )))
    }
}

impl Codec for DateCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::Date
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let (start, end, time_zone) = match value {
            Value::String(s) => (s.trim(), None, None),
            Value::Map(map) => {
                let start = map
                    .get("start")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CodecError::Rejected("date range requires `start`".into()))?;
                let end = map.get("end").and_then(Value::as_str).map(str::trim);
                let time_zone = map.get("time_zone").and_then(Value::as_str);
                (start.trim(), end, time_zone)
            }
            other => return Err(mismatch("date string or {start, end}", other)),
        };
        check_date("start", start)?;
        if let Some(end) = end {
            check_date("end", end)?;
        }
        Ok(json!({"date": {"start": start, "end": end, "time_zone": time_zone}}))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        let Some(date) = payload(wire, "date") else {
            return Ok(Value::Null);
        };
        let Some(start) = date.get("start").and_then(JsonValue::as_str) else {
            return Ok(Value::Null);
        };
        let end = date.get("end").and_then(JsonValue::as_str);
        let time_zone = date.get("time_zone").and_then(JsonValue::as_str);
        if end.is_none() && time_zone.is_none() {
            return Ok(Value::from(start));
        }
        Ok(Value::map([
            ("start", Value::from(start)),
            ("end", Value::from(end)),
            ("time_zone", Value::from(time_zone)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn number_keeps_integer_and_float() {
        let codec = NumberCodec::default();
        let wire = codec.parse(&Value::Int(10)).unwrap();
        assert_eq!(wire, json!({"number": 10}));
        assert_eq!(codec.encode(&wire).unwrap(), Value::Int(10));

        let wire = codec.parse(&Value::Float(2.5)).unwrap();
        assert_eq!(codec.encode(&wire).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn number_rejects_nan_and_strings() {
        let codec = NumberCodec::default();
        assert!(codec.parse(&Value::Float(f64::NAN)).is_err());
        assert!(codec.parse(&Value::from("12")).is_err());
    }

    #[test]
    fn number_null_or_missing_decodes_to_null() {
        let codec = NumberCodec::default();
        assert_eq!(codec.encode(&json!({"number": null})).unwrap(), Value::Null);
        assert_eq!(codec.encode(&json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn number_format_lands_in_schema() {
        let codec = NumberCodec::with_format("dollar");
        assert_eq!(
            codec.config("Price"),
            json!({"Price": {"number": {"format": "dollar"}}})
        );
    }

    #[test]
    fn checkbox_defaults_to_false() {
        assert_eq!(CheckboxCodec.encode(&json!({})).unwrap(), Value::Bool(false));
        assert!(CheckboxCodec.parse(&Value::from("yes")).is_err());
        assert_eq!(
            CheckboxCodec.parse(&Value::Bool(true)).unwrap(),
            json!({"checkbox": true})
        );
    }

    #[test]
    fn date_string_roundtrip() {
        let wire = DateCodec.parse(&Value::from("2024-05-01")).unwrap();
        assert_eq!(
            wire,
            json!({"date": {"start": "2024-05-01", "end": null, "time_zone": null}})
        );
        assert_eq!(DateCodec.encode(&wire).unwrap(), Value::from("2024-05-01"));
    }

    #[test]
    fn date_range_roundtrip() {
        let range = Value::map([
            ("start", Value::from("2024-05-01T09:00:00Z")),
            ("end", Value::from("2024-05-02")),
            ("time_zone", Value::Null),
        ]);
        let wire = DateCodec.parse(&range).unwrap();
        assert_eq!(DateCodec.encode(&wire).unwrap(), range);
    }

    #[test]
    fn date_rejects_garbage() {
        assert!(DateCodec.parse(&Value::from("yesterday")).is_err());
        assert!(DateCodec.parse(&Value::map([("end", "2024-01-01")])).is_err());
    }

    #[test]
    fn date_missing_start_decodes_to_null() {
        assert_eq!(DateCodec.encode(&json!({"date": {}})).unwrap(), Value::Null);
        assert_eq!(DateCodec.encode(&json!({"date": null})).unwrap(), Value::Null);
    }

    proptest! {
        #[test]
        fn integer_roundtrip(n in any::<i64>()) {
            let codec = NumberCodec::default();
            let back = codec.encode(&codec.parse(&Value::Int(n)).unwrap()).unwrap();
            prop_assert_eq!(back, Value::Int(n));
        }

        #[test]
        fn float_roundtrip(f in -1.0e12f64..1.0e12f64) {
            let codec = NumberCodec::default();
            let back = codec.encode(&codec.parse(&Value::Float(f)).unwrap()).unwrap();
            prop_assert_eq!(back, Value::Float(f));
        }
    }
}
