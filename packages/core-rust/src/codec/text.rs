//! Free-text codecs: title, rich text and the url/email/phone contact types.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value as JsonValue};

use super::{mismatch, payload, Codec};
use crate::error::CodecError;
use crate::property::PropertyType;
use crate::value::Value;

/// Maximum characters the remote accepts in a single rich-text segment.
pub const RICH_TEXT_SEGMENT_LIMIT: usize = 2000;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid url regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-(). ]+$").expect("valid phone regex"));

/// Builds a rich-text array, splitting `text` into segments the remote accepts.
fn rich_text_array(text: &str) -> JsonValue {
    let chars: Vec<char> = text.chars().collect();
    let segments: Vec<JsonValue> = chars
        .chunks(RICH_TEXT_SEGMENT_LIMIT)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            json!({"type": "text", "text": {"content": content}})
        })
        .collect();
    JsonValue::Array(segments)
}

/// Concatenates the plain text of a rich-text array.
///
/// Segments without `plain_text` fall back to `text.content`.
fn plain_text(segments: &[JsonValue]) -> String {
    segments
        .iter()
        .filter_map(|segment| {
            segment
                .get("plain_text")
                .and_then(JsonValue::as_str)
                .or_else(|| {
                    segment
                        .get("text")
                        .and_then(|t| t.get("content"))
                        .and_then(JsonValue::as_str)
                })
        })
        .collect()
}

fn trimmed<'a>(value: &'a Value) -> Result<&'a str, CodecError> {
    value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| mismatch("string", value))
}

// ---------------------------------------------------------------------------
// Title
// ---------------------------------------------------------------------------

/// Codec for the collection's title property.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleCodec;

impl Codec for TitleCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::Title
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let text = trimmed(value)?;
        if text.is_empty() {
            return Err(CodecError::Rejected("title must not be empty".to_string()));
        }
        Ok(json!({"title": rich_text_array(text)}))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        let segments = wire
            .get("title")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| CodecError::Malformed("title property has no rich-text array".into()))?;
        Ok(Value::String(plain_text(segments)))
    }

    fn empty(&self) -> JsonValue {
        json!({"title": []})
    }
}

// ---------------------------------------------------------------------------
// Rich text
// ---------------------------------------------------------------------------

/// Codec for plain `rich_text` properties. Formatting is not preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct RichTextCodec;

impl Codec for RichTextCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::RichText
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let text = trimmed(value)?;
        Ok(json!({"rich_text": rich_text_array(text)}))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        let text = wire
            .get("rich_text")
            .and_then(JsonValue::as_array)
            .map(|segments| plain_text(segments))
            .unwrap_or_default();
        Ok(Value::String(text))
    }

    fn empty(&self) -> JsonValue {
        json!({"rich_text": []})
    }
}

// ---------------------------------------------------------------------------
// Contact types (url, email, phone_number)
// ---------------------------------------------------------------------------

/// Codec for the single-string contact types: `url`, `email`, `phone_number`.
#[derive(Debug, Clone, Copy)]
pub struct ContactCodec {
    kind: PropertyType,
}

impl ContactCodec {
    #[must_use]
    pub fn url() -> Self {
        Self {
            kind: PropertyType::Url,
        }
    }

    #[must_use]
    pub fn email() -> Self {
        Self {
            kind: PropertyType::Email,
        }
    }

    #[must_use]
    pub fn phone_number() -> Self {
        Self {
            kind: PropertyType::PhoneNumber,
        }
    }

    fn validate(&self, text: &str) -> Result<(), CodecError> {
        let ok = match self.kind {
            PropertyType::Url => URL_RE.is_match(text),
            PropertyType::Email => EMAIL_RE.is_match(text),
            _ => PHONE_RE.is_match(text) && text.chars().filter(char::is_ascii_digit).count() >= 3,
        };
        if ok {
            Ok(())
        } else {
            Err(CodecError::Rejected(format!(
                "`{text}` is not a valid {}",
                self.kind
            )))
        }
    }
}

impl Codec for ContactCodec {
    fn property_type(&self) -> PropertyType {
        self.kind
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let text = trimmed(value)?;
        if text.is_empty() {
            return Err(CodecError::Rejected(format!("{} must not be empty", self.kind)));
        }
        self.validate(text)?;
        Ok(json!({ self.kind.wire_key(): text }))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        Ok(payload(wire, self.kind.wire_key())
            .and_then(JsonValue::as_str)
            .map_or(Value::Null, Value::from))
    }
}
