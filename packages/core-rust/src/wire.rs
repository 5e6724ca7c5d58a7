//! Wire message types exchanged with the remote store.
//!
//! Field names follow the remote's snake_case JSON format. Unknown fields
//! on records are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

/// Property map of a record or schema patch, keyed by wire property name.
pub type PropertyMap = Map<String, JsonValue>;

/// Identifiers of a remote collection and its queryable data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionIds {
    pub collection_id: String,
    pub data_source_id: String,
}

/// Schema of a remote collection as returned by the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub id: String,
    pub data_source_id: String,
    /// Property configurations keyed by property name. Each value carries at
    /// least a `type` field, e.g. `{"id": "a1", "type": "select", "select": {...}}`.
    #[serde(default)]
    pub properties: BTreeMap<String, JsonValue>,
}

impl CollectionSchema {
    #[must_use]
    pub fn ids(&self) -> CollectionIds {
        CollectionIds {
            collection_id: self.id.clone(),
            data_source_id: self.data_source_id.clone(),
        }
    }
}

/// A record (page) as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_edited_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
    #[serde(default)]
    pub properties: PropertyMap,
}

/// Body of a record query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sorts: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_cursor: Option<String>,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<RawRecord>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    /// Some stores omit this; callers fall back to `next_cursor.is_some()`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub has_more: Option<bool>,
}

/// Mutation applied to a single record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPatch {
    /// Replace the listed properties.
    Properties(PropertyMap),
    /// Move the record to or out of the archive.
    Archived(bool),
}

impl RecordPatch {
    /// Request body for this patch.
    #[must_use]
    pub fn to_body(&self) -> JsonValue {
        match self {
            RecordPatch::Properties(properties) => json!({"properties": properties}),
            RecordPatch::Archived(archived) => json!({"archived": archived}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_tolerates_missing_and_extra_fields() {
        let record: RawRecord = serde_json::from_value(json!({
            "object": "page",
            "id": "p1",
            "in_trash": false,
            "properties": {"Name": {"type": "title", "title": []}}
        }))
        .unwrap();
        assert_eq!(record.id, "p1");
        assert!(!record.archived);
        assert!(record.properties.contains_key("Name"));
    }

    #[test]
    fn query_request_omits_unset_fields() {
        let request = QueryRequest {
            page_size: Some(25),
            ..QueryRequest::default()
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"page_size": 25}));
    }

    #[test]
    fn query_response_has_more_is_optional() {
        let response: QueryResponse =
            serde_json::from_value(json!({"results": [], "next_cursor": "c2"})).unwrap();
        assert_eq!(response.has_more, None);
        assert_eq!(response.next_cursor.as_deref(), Some("c2"));
    }

    #[test]
    fn patch_bodies() {
        assert_eq!(RecordPatch::Archived(true).to_body(), json!({"archived": true}));
        let mut props = PropertyMap::new();
        props.insert("Done".into(), json!({"checkbox": true}));
        assert_eq!(
            RecordPatch::Properties(props).to_body(),
            json!({"properties": {"Done": {"checkbox": true}}})
        );
    }
}
