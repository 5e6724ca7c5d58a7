//! [`RemoteStore`] over the remote's REST API.
//!
//! Collections are databases; each database owns one data source that
//! holds the schema and answers queries. Records are pages.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use docorm_core::{
    CollectionIds, CollectionSchema, PropertyMap, QueryRequest, QueryResponse, RawRecord,
    RecordPatch,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::config::HttpStoreConfig;
use crate::traits::RemoteStore;

/// Reference to a data source inside a database response.
#[derive(Debug, Deserialize)]
struct DataSourceRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DatabaseResponse {
    id: String,
    #[serde(default)]
    data_sources: Vec<DataSourceRef>,
}

#[derive(Debug, Deserialize)]
struct DataSourceResponse {
    #[serde(default)]
    properties: std::collections::BTreeMap<String, JsonValue>,
}

impl DatabaseResponse {
    fn ids(self) -> anyhow::Result<CollectionIds> {
        let data_source = self
            .data_sources
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("database `{}` has no data source", self.id))?;
        Ok(CollectionIds {
            collection_id: self.id,
            data_source_id: data_source.id,
        })
    }
}

/// HTTP client for the remote store.
pub struct HttpStore {
    client: Client,
    config: HttpStoreConfig,
}

impl HttpStore {
    /// Builds a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: HttpStoreConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/v1/{path}", self.config.base_url))
            .bearer_auth(&self.config.api_token)
            .header("Notion-Version", &self.config.api_version)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> anyhow::Result<T> {
        let response = request.send().await.context("request failed")?;
        let status = response.status();
        let url = response.url().path().to_string();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{url} returned {status}: {body}"));
        }
        debug!(%url, %status, "remote call succeeded");
        response
            .json::<T>()
            .await
            .with_context(|| format!("invalid response body from {url}"))
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn retrieve_collection_schema(
        &self,
        collection_id: &str,
    ) -> anyhow::Result<CollectionSchema> {
        let database: DatabaseResponse = self
            .send(self.request(Method::GET, &format!("databases/{collection_id}")))
            .await?;
        let ids = database.ids()?;
        let data_source: DataSourceResponse = self
            .send(self.request(Method::GET, &format!("data_sources/{}", ids.data_source_id)))
            .await?;
        Ok(CollectionSchema {
            id: ids.collection_id,
            data_source_id: ids.data_source_id,
            properties: data_source.properties,
        })
    }

    async fn create_collection(
        &self,
        parent_id: &str,
        title: &str,
        properties: &PropertyMap,
    ) -> anyhow::Result<CollectionIds> {
        let body = json!({
            "parent": {"type": "page_id", "page_id": parent_id},
            "title": [{"type": "text", "text": {"content": title}}],
            "initial_data_source": {"properties": properties},
        });
        let database: DatabaseResponse = self
            .send(self.request(Method::POST, "databases").json(&body))
            .await?;
        database.ids()
    }

    async fn update_collection_schema(
        &self,
        collection: &CollectionIds,
        properties: &PropertyMap,
    ) -> anyhow::Result<()> {
        let path = format!("data_sources/{}", collection.data_source_id);
        let _: JsonValue = self
            .send(self.request(Method::PATCH, &path).json(&json!({"properties": properties})))
            .await?;
        Ok(())
    }

    async fn create_record(
        &self,
        collection: &CollectionIds,
        properties: &PropertyMap,
    ) -> anyhow::Result<RawRecord> {
        let body = json!({
            "parent": {"type": "data_source_id", "data_source_id": collection.data_source_id},
            "properties": properties,
        });
        self.send(self.request(Method::POST, "pages").json(&body))
            .await
    }

    async fn retrieve_record(&self, record_id: &str) -> anyhow::Result<RawRecord> {
        self.send(self.request(Method::GET, &format!("pages/{record_id}")))
            .await
    }

    async fn update_record(
        &self,
        record_id: &str,
        patch: &RecordPatch,
    ) -> anyhow::Result<RawRecord> {
        self.send(
            self.request(Method::PATCH, &format!("pages/{record_id}"))
                .json(&patch.to_body()),
        )
        .await
    }

    async fn query_records(
        &self,
        data_source_id: &str,
        request: &QueryRequest,
    ) -> anyhow::Result<QueryResponse> {
        self.send(
            self.request(Method::POST, &format!("data_sources/{data_source_id}/query"))
                .json(request),
        )
        .await
    }
}
