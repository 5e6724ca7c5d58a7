use async_trait::async_trait;
use docorm_core::{
    CollectionIds, CollectionSchema, PropertyMap, QueryRequest, QueryResponse, RawRecord,
    RecordPatch,
};

/// Remote structured-document store the ORM is layered over.
/// Implementations: HTTP ([`HttpStore`](crate::store::HttpStore)), memory
/// ([`MemoryStore`](crate::store::MemoryStore)) for tests.
///
/// Used as `Arc<dyn RemoteStore>`. Tables bound to the same instance share a
/// workspace and may be linked to each other.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the schema of a collection.
    async fn retrieve_collection_schema(
        &self,
        collection_id: &str,
    ) -> anyhow::Result<CollectionSchema>;

    /// Create a collection under `parent_id` with the given property configurations.
    async fn create_collection(
        &self,
        parent_id: &str,
        title: &str,
        properties: &PropertyMap,
    ) -> anyhow::Result<CollectionIds>;

    /// Merge property configurations into a collection's schema.
    async fn update_collection_schema(
        &self,
        collection: &CollectionIds,
        properties: &PropertyMap,
    ) -> anyhow::Result<()>;

    /// Create one record in a collection.
    async fn create_record(
        &self,
        collection: &CollectionIds,
        properties: &PropertyMap,
    ) -> anyhow::Result<RawRecord>;

    /// Fetch one record by id.
    async fn retrieve_record(&self, record_id: &str) -> anyhow::Result<RawRecord>;

    /// Apply a property patch or archive flag to one record.
    async fn update_record(&self, record_id: &str, patch: &RecordPatch)
        -> anyhow::Result<RawRecord>;

    /// Query one page of unarchived records from a data source.
    async fn query_records(
        &self,
        data_source_id: &str,
        request: &QueryRequest,
    ) -> anyhow::Result<QueryResponse>;
}
