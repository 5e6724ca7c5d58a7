//! Reference-list codecs: `people`, `files` and `relation`.

use serde_json::{json, Value as JsonValue};

use super::{mismatch, string_or_field, Codec};
use crate::error::CodecError;
use crate::property::PropertyType;
use crate::value::Value;

/// Accepts either a single reference or a list of references.
fn items(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn reference_id<'a>(value: &'a Value, what: &'static str) -> Result<&'a str, CodecError> {
    let id = string_or_field(value, "id")
        .map(str::trim)
        .ok_or_else(|| mismatch(what, value))?;
    if id.is_empty() {
        return Err(CodecError::Rejected("reference id must not be empty".into()));
    }
    Ok(id)
}

fn wire_list<'a>(wire: &'a JsonValue, key: &str) -> &'a [JsonValue] {
    wire.get(key)
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// People
// ---------------------------------------------------------------------------

/// Codec for `people` properties. The application value is a list of user ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeopleCodec;

impl Codec for PeopleCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::People
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let people = items(value)
            .into_iter()
            .map(|item| reference_id(item, "user id or {id}").map(|id| json!({"object": "user", "id": id})))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(json!({"people": people}))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        Ok(Value::Array(
            wire_list(wire, "people")
                .iter()
                .filter_map(|p| p.get("id").and_then(JsonValue::as_str))
                .map(Value::from)
                .collect(),
        ))
    }

    fn empty(&self) -> JsonValue {
        json!({"people": []})
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Codec for `files` properties.
///
/// Writes external file references. Each item is a URL string or a
/// `{name, url}` map; decoding yields `{name, url}` maps for both hosted
/// and external files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesCodec;

fn file_name_from_url(url: &str) -> &str {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(url)
}

impl Codec for FilesCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::Files
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let mut files = Vec::new();
        for item in items(value) {
            let url = string_or_field(item, "url")
                .map(str::trim)
                .ok_or_else(|| mismatch("file url or {name, url}", item))?;
            if url.is_empty() {
                return Err(CodecError::Rejected("file url must not be empty".into()));
            }
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_else(|| file_name_from_url(url));
            files.push(json!({"name": name, "type": "external", "external": {"url": url}}));
        }
        Ok(json!({"files": files}))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        let files = wire_list(wire, "files")
            .iter()
            .filter_map(|file| {
                let url = file
                    .get("external")
                    .or_else(|| file.get("file"))
                    .and_then(|f| f.get("url"))
                    .and_then(JsonValue::as_str)?;
                let name = file
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_else(|| file_name_from_url(url));
                Some(Value::map([("name", name), ("url", url)]))
            })
            .collect();
        Ok(Value::Array(files))
    }

    fn empty(&self) -> JsonValue {
        json!({"files": []})
    }
}

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// Codec for `relation` properties. The application value is a list of `{id}` maps.
///
/// The schema fragment carries no target; targets are declared by linking.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationCodec;

impl Codec for RelationCodec {
    fn property_type(&self) -> PropertyType {
        PropertyType::Relation
    }

    fn parse(&self, value: &Value) -> Result<JsonValue, CodecError> {
        let refs = items(value)
            .into_iter()
            .map(|item| reference_id(item, "record id or {id}").map(|id| json!({"id": id})))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(json!({"relation": refs}))
    }

    fn encode(&self, wire: &JsonValue) -> Result<Value, CodecError> {
        Ok(Value::Array(
            wire_list(wire, "relation")
                .iter()
                .filter_map(|r| r.get("id").and_then(JsonValue::as_str))
                .map(|id| Value::map([("id", id)]))
                .collect(),
        ))
    }

    fn empty(&self) -> JsonValue {
        json!({"relation": []})
    }
}
