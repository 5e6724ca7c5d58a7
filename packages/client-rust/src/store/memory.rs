//! In-memory [`RemoteStore`] implementation backed by [`DashMap`].
//!
//! Behaves like the remote for everything the ORM relies on: schema
//! storage, record creation with system properties, archive semantics,
//! filter/sort evaluation and cursor pagination. Every call is logged as a
//! [`StoreCall`] so tests can assert on the exact traffic, and individual
//! methods can be made to fail.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use docorm_core::codec::declared_type_key;
use docorm_core::{
    CollectionIds, CollectionSchema, PropertyMap, QueryRequest, QueryResponse, RawRecord,
    RecordPatch,
};
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};

use super::eval;
use crate::traits::RemoteStore;

/// Page size used when a query does not name one.
const DEFAULT_QUERY_PAGE_SIZE: usize = 100;

/// One call received by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    RetrieveCollectionSchema {
        collection_id: String,
    },
    CreateCollection {
        parent_id: String,
        title: String,
        properties: PropertyMap,
    },
    UpdateCollectionSchema {
        data_source_id: String,
        properties: PropertyMap,
    },
    CreateRecord {
        data_source_id: String,
        properties: PropertyMap,
    },
    RetrieveRecord {
        record_id: String,
    },
    UpdateRecord {
        record_id: String,
        patch: RecordPatch,
    },
    QueryRecords {
        data_source_id: String,
        request: QueryRequest,
    },
}

impl StoreCall {
    #[must_use]
    pub fn method(&self) -> StoreMethod {
        match self {
            StoreCall::RetrieveCollectionSchema { .. } => StoreMethod::RetrieveCollectionSchema,
            StoreCall::CreateCollection { .. } => StoreMethod::CreateCollection,
            StoreCall::UpdateCollectionSchema { .. } => StoreMethod::UpdateCollectionSchema,
            StoreCall::CreateRecord { .. } => StoreMethod::CreateRecord,
            StoreCall::RetrieveRecord { .. } => StoreMethod::RetrieveRecord,
            StoreCall::UpdateRecord { .. } => StoreMethod::UpdateRecord,
            StoreCall::QueryRecords { .. } => StoreMethod::QueryRecords,
        }
    }
}

/// [`RemoteStore`] method selector used for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMethod {
    RetrieveCollectionSchema,
    CreateCollection,
    UpdateCollectionSchema,
    CreateRecord,
    RetrieveRecord,
    UpdateRecord,
    QueryRecords,
}

struct StoredRecord {
    data_source_id: String,
    seq: u64,
    record: RawRecord,
}

/// In-memory remote store for tests and local development.
pub struct MemoryStore {
    /// Collection schemas keyed by collection id.
    collections: DashMap<String, CollectionSchema>,
    /// Data source id to collection id.
    data_sources: DashMap<String, String>,
    records: DashMap<String, StoredRecord>,
    calls: Mutex<Vec<StoreCall>>,
    failures: DashMap<StoreMethod, String>,
    seq: AtomicU64,
    retrievals_in_flight: AtomicUsize,
    max_retrievals_in_flight: AtomicUsize,
    omit_has_more: AtomicBool,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            data_sources: DashMap::new(),
            records: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            failures: DashMap::new(),
            seq: AtomicU64::new(0),
            retrievals_in_flight: AtomicUsize::new(0),
            max_retrievals_in_flight: AtomicUsize::new(0),
            omit_has_more: AtomicBool::new(false),
        }
    }

    /// Registers an existing collection without logging a call.
    ///
    /// Property configurations missing a `type` field get one.
    pub fn seed_collection(&self, mut schema: CollectionSchema) {
        for config in schema.properties.values_mut() {
            tag_property(config);
        }
        self.data_sources
            .insert(schema.data_source_id.clone(), schema.id.clone());
        self.collections.insert(schema.id.clone(), schema);
    }

    /// Current schema of a collection, bypassing the call log.
    #[must_use]
    pub fn collection(&self, collection_id: &str) -> Option<CollectionSchema> {
        self.collections.get(collection_id).map(|s| s.clone())
    }

    /// Current state of a record, bypassing the call log.
    #[must_use]
    pub fn record(&self, record_id: &str) -> Option<RawRecord> {
        self.records.get(record_id).map(|r| r.record.clone())
    }

    /// Every call received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Number of calls received for `method`.
    #[must_use]
    pub fn call_count(&self, method: StoreMethod) -> usize {
        self.calls.lock().iter().filter(|c| c.method() == method).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Makes every later call to `method` fail with `message`.
    pub fn fail(&self, method: StoreMethod, message: impl Into<String>) {
        self.failures.insert(method, message.into());
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Leaves `has_more` out of query responses, as some stores do.
    pub fn omit_has_more(&self, omit: bool) {
        self.omit_has_more.store(omit, Ordering::SeqCst);
    }

    /// Highest number of `retrieve_record` calls observed in flight at once.
    #[must_use]
    pub fn max_concurrent_retrievals(&self) -> usize {
        self.max_retrievals_in_flight.load(Ordering::SeqCst)
    }

    fn log(&self, call: StoreCall) -> anyhow::Result<()> {
        let method = call.method();
        self.calls.lock().push(call);
        match self.failures.get(&method) {
            Some(message) => bail!("{}", message.value()),
            None => Ok(()),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn collection_for_source(&self, data_source_id: &str) -> anyhow::Result<CollectionSchema> {
        let collection_id = self
            .data_sources
            .get(data_source_id)
            .map(|id| id.clone())
            .ok_or_else(|| anyhow!("data source `{data_source_id}` not found"))?;
        self.collections
            .get(&collection_id)
            .map(|s| s.clone())
            .ok_or_else(|| anyhow!("collection `{collection_id}` not found"))
    }

    /// Properties the remote maintains itself, for a record written at `seq`.
    fn system_properties(
        schema: &CollectionSchema,
        seq: u64,
        created: Option<&str>,
        unique_number: Option<u64>,
    ) -> PropertyMap {
        let now = timestamp(seq);
        let mut properties = PropertyMap::new();
        for (name, config) in &schema.properties {
            let value = match declared_type_key(config) {
                Some("created_time") => json!(created.unwrap_or(now.as_str())),
                Some("last_edited_time") => json!(now),
                Some(kind @ ("created_by" | "last_edited_by")) => {
                    json!({"object": "user", "id": format!("{kind}-user")})
                }
                Some("unique_id") => match unique_number {
                    Some(number) => {
                        let prefix = config.get("unique_id").and_then(|u| u.get("prefix")).cloned();
                        json!({"prefix": prefix.unwrap_or(JsonValue::Null), "number": number})
                    }
                    None => continue,
                },
                _ => continue,
            };
            let kind = declared_type_key(config).unwrap_or_default().to_string();
            properties.insert(name.clone(), json!({"type": kind, kind.as_str(): value}));
        }
        properties
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds the `type` field the remote returns on every property object.
fn tag_property(property: &mut JsonValue) {
    let Some(kind) = declared_type_key(property).map(str::to_string) else {
        return;
    };
    if let Some(object) = property.as_object_mut() {
        object.entry("type").or_insert(JsonValue::String(kind));
    }
}

fn tagged(properties: &PropertyMap) -> PropertyMap {
    properties
        .iter()
        .map(|(name, value)| {
            let mut value = value.clone();
            tag_property(&mut value);
            (name.clone(), value)
        })
        .collect()
}

/// Deterministic ISO timestamp for write number `seq`.
fn timestamp(seq: u64) -> String {
    let (hours, rest) = ((seq / 3600) % 24, seq % 3600);
    format!("2024-01-01T{hours:02}:{:02}:{:02}.000Z", rest / 60, rest % 60)
}

fn decode_cursor(cursor: Option<&str>) -> anyhow::Result<usize> {
    match cursor {
        None => Ok(0),
        Some(c) => c
            .strip_prefix("offset-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| anyhow!("invalid start_cursor `{c}`")),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn retrieve_collection_schema(
        &self,
        collection_id: &str,
    ) -> anyhow::Result<CollectionSchema> {
        self.log(StoreCall::RetrieveCollectionSchema {
            collection_id: collection_id.to_string(),
        })?;
        self.collection(collection_id)
            .ok_or_else(|| anyhow!("collection `{collection_id}` not found"))
    }

    async fn create_collection(
        &self,
        parent_id: &str,
        title: &str,
        properties: &PropertyMap,
    ) -> anyhow::Result<CollectionIds> {
        self.log(StoreCall::CreateCollection {
            parent_id: parent_id.to_string(),
            title: title.to_string(),
            properties: properties.clone(),
        })?;
        let ids = CollectionIds {
            collection_id: uuid::Uuid::new_v4().to_string(),
            data_source_id: uuid::Uuid::new_v4().to_string(),
        };
        self.seed_collection(CollectionSchema {
            id: ids.collection_id.clone(),
            data_source_id: ids.data_source_id.clone(),
            properties: properties.clone().into_iter().collect(),
        });
        Ok(ids)
    }

    async fn update_collection_schema(
        &self,
        collection: &CollectionIds,
        properties: &PropertyMap,
    ) -> anyhow::Result<()> {
        self.log(StoreCall::UpdateCollectionSchema {
            data_source_id: collection.data_source_id.clone(),
            properties: properties.clone(),
        })?;
        let mut schema = self.collection_for_source(&collection.data_source_id)?;
        for (name, config) in tagged(properties) {
            schema.properties.insert(name, config);
        }
        self.collections.insert(schema.id.clone(), schema);
        Ok(())
    }

    async fn create_record(
        &self,
        collection: &CollectionIds,
        properties: &PropertyMap,
    ) -> anyhow::Result<RawRecord> {
        self.log(StoreCall::CreateRecord {
            data_source_id: collection.data_source_id.clone(),
            properties: properties.clone(),
        })?;
        let schema = self.collection_for_source(&collection.data_source_id)?;
        let seq = self.next_seq();
        let unique_number = self
            .records
            .iter()
            .filter(|r| r.data_source_id == collection.data_source_id)
            .count() as u64
            + 1;
        let mut stored = tagged(properties);
        stored.extend(Self::system_properties(&schema, seq, None, Some(unique_number)));
        let record = RawRecord {
            id: uuid::Uuid::new_v4().to_string(),
            archived: false,
            created_time: Some(timestamp(seq)),
            last_edited_time: Some(timestamp(seq)),
            url: None,
            properties: stored,
        };
        self.records.insert(
            record.id.clone(),
            StoredRecord {
                data_source_id: collection.data_source_id.clone(),
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn retrieve_record(&self, record_id: &str) -> anyhow::Result<RawRecord> {
        self.log(StoreCall::RetrieveRecord {
            record_id: record_id.to_string(),
        })?;
        let in_flight = self.retrievals_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_retrievals_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        // Give other fetches a chance to start before this one completes.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        self.retrievals_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.record(record_id)
            .ok_or_else(|| anyhow!("record `{record_id}` not found"))
    }

    async fn update_record(
        &self,
        record_id: &str,
        patch: &RecordPatch,
    ) -> anyhow::Result<RawRecord> {
        self.log(StoreCall::UpdateRecord {
            record_id: record_id.to_string(),
            patch: patch.clone(),
        })?;
        let data_source_id = self
            .records
            .get(record_id)
            .map(|r| r.data_source_id.clone())
            .ok_or_else(|| anyhow!("record `{record_id}` not found"))?;
        let schema = self.collection_for_source(&data_source_id)?;
        let seq = self.next_seq();
        let mut entry = self
            .records
            .get_mut(record_id)
            .ok_or_else(|| anyhow!("record `{record_id}` not found"))?;
        let record = &mut entry.record;
        match patch {
            RecordPatch::Properties(properties) => record.properties.extend(tagged(properties)),
            RecordPatch::Archived(archived) => record.archived = *archived,
        }
        let system = Self::system_properties(&schema, seq, record.created_time.as_deref(), None);
        for (name, value) in system {
            // Attribution and creation time are fixed at create.
            if value.get("last_edited_time").is_some() {
                record.properties.insert(name, value);
            }
        }
        record.last_edited_time = Some(timestamp(seq));
        Ok(record.clone())
    }

    async fn query_records(
        &self,
        data_source_id: &str,
        request: &QueryRequest,
    ) -> anyhow::Result<QueryResponse> {
        self.log(StoreCall::QueryRecords {
            data_source_id: data_source_id.to_string(),
            request: request.clone(),
        })?;
        self.collection_for_source(data_source_id)?;

        let mut candidates: Vec<(u64, RawRecord)> = self
            .records
            .iter()
            .filter(|r| r.data_source_id == data_source_id && !r.record.archived)
            .map(|r| (r.seq, r.record.clone()))
            .collect();
        candidates.sort_by_key(|(seq, _)| *seq);
        let mut matched = Vec::with_capacity(candidates.len());
        for (_, record) in candidates {
            let keep = match &request.filter {
                Some(filter) => eval::matches(filter, &record)?,
                None => true,
            };
            if keep {
                matched.push(record);
            }
        }
        if let Some(sorts) = &request.sorts {
            eval::sort_records(&mut matched, sorts);
        }

        let offset = decode_cursor(request.start_cursor.as_deref())?;
        let page_size = request
            .page_size
            .map_or(DEFAULT_QUERY_PAGE_SIZE, |n| n as usize)
            .max(1);
        let total = matched.len();
        let results: Vec<RawRecord> = matched.into_iter().skip(offset).take(page_size).collect();
        let end = offset + results.len();
        let has_more = end < total;
        Ok(QueryResponse {
            results,
            next_cursor: has_more.then(|| format!("offset-{end}")),
            has_more: (!self.omit_has_more.load(Ordering::SeqCst)).then_some(has_more),
        })
    }
}
