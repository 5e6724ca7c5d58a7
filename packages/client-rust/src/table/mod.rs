//! Table handles bound to a remote collection.
//!
//! A [`Table`] is a cheap, cloneable handle over an immutable interior
//! (title, columns, collection ids, store and configuration) plus the
//! relation registry of the [`Orm`](crate::Orm) context that defined it.

mod mutate;
mod select;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use docorm_core::row::decode_envelope;
use docorm_core::{
    schema_for_columns, validate_remote_schema, CollectionIds, ColumnDef, Columns, RemoteContext,
    Result, RowEnvelope,
};
use tracing::{debug, info};

pub use mutate::{TargetOptions, UpdateOptions, UpdateOutcome};
pub use select::{Page, SelectOptions};

use crate::config::OrmConfig;
use crate::relation::{link_relations, LinkInstruction, Populate, PopulateSpec, RelationRegistry};
use crate::traits::RemoteStore;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a defined table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

impl TableId {
    fn next() -> Self {
        Self(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where a table definition binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableTarget {
    /// Attach to an existing collection; its schema is validated first.
    Existing { collection_id: String },
    /// Create a new collection under a parent page.
    Create { parent_id: String },
}

/// Immutable state shared by every clone of a [`Table`].
pub(crate) struct TableInner {
    pub(crate) id: TableId,
    pub(crate) title: String,
    pub(crate) columns: Columns,
    pub(crate) ids: CollectionIds,
    pub(crate) store: Arc<dyn RemoteStore>,
    pub(crate) config: OrmConfig,
    relations: Weak<RelationRegistry>,
}

impl Drop for TableInner {
    fn drop(&mut self) {
        if let Some(relations) = self.relations.upgrade() {
            relations.remove_source(self.id);
        }
    }
}

impl TableInner {
    /// Fetches one record and decodes it with this table's columns.
    pub(crate) async fn retrieve(&self, record_id: &str) -> Result<RowEnvelope> {
        let record = self
            .store
            .retrieve_record(record_id)
            .await
            .remote_context(|| format!("failed to retrieve record `{record_id}` of `{}`", self.title))?;
        decode_envelope(&self.columns, record)
    }

    /// Whether both tables talk to the same store instance.
    pub(crate) fn shares_store_with(&self, other: &TableInner) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.store), Arc::as_ptr(&other.store))
    }
}

/// Handle for row operations against one remote collection.
#[derive(Clone)]
pub struct Table {
    pub(crate) inner: Arc<TableInner>,
    pub(crate) relations: Arc<RelationRegistry>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.inner.id)
            .field("title", &self.inner.title)
            .field("ids", &self.inner.ids)
            .field("columns", &self.inner.columns.len())
            .finish_non_exhaustive()
    }
}

impl Table {
    /// Binds `columns` to a remote collection, creating or validating it.
    pub(crate) async fn define(
        store: Arc<dyn RemoteStore>,
        config: OrmConfig,
        relations: Arc<RelationRegistry>,
        title: String,
        columns: Columns,
        target: TableTarget,
    ) -> Result<Self> {
        let ids = match target {
            TableTarget::Create { parent_id } => {
                let schema = schema_for_columns(&columns);
                let ids = store
                    .create_collection(&parent_id, &title, &schema)
                    .await
                    .remote_context(|| format!("failed to create collection `{title}`"))?;
                info!(table = %title, collection = %ids.collection_id, "created collection");
                ids
            }
            TableTarget::Existing { collection_id } => {
                let schema = store
                    .retrieve_collection_schema(&collection_id)
                    .await
                    .remote_context(|| {
                        format!("failed to retrieve schema of `{title}` ({collection_id})")
                    })?;
                validate_remote_schema(&columns, &schema)?;
                debug!(table = %title, collection = %collection_id, "attached to collection");
                schema.ids()
            }
        };
        Ok(Self::from_parts(store, config, relations, title, columns, ids))
    }

    pub(crate) fn from_parts(
        store: Arc<dyn RemoteStore>,
        config: OrmConfig,
        relations: Arc<RelationRegistry>,
        title: String,
        columns: Columns,
        ids: CollectionIds,
    ) -> Self {
        Self {
            inner: Arc::new(TableInner {
                id: TableId::next(),
                title,
                columns,
                ids,
                store,
                config,
                relations: Arc::downgrade(&relations),
            }),
            relations,
        }
    }

    #[must_use]
    pub fn id(&self) -> TableId {
        self.inner.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.inner.title
    }

    /// Remote collection and data source ids.
    #[must_use]
    pub fn ids(&self) -> &CollectionIds {
        &self.inner.ids
    }

    #[must_use]
    pub fn columns(&self) -> &Columns {
        &self.inner.columns
    }

    /// Column stored under local key `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`](docorm_core::Error::UnknownColumn)
    /// when no such column is declared.
    pub fn column(&self, key: &str) -> Result<&ColumnDef> {
        self.inner.columns.get(key)
    }

    /// Fetches one row by record id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`](docorm_core::Error::Remote) when the fetch
    /// fails and [`Error::InvalidValue`](docorm_core::Error::InvalidValue)
    /// when the record cannot be decoded.
    pub async fn retrieve(&self, record_id: &str) -> Result<RowEnvelope> {
        self.inner.retrieve(record_id).await
    }

    /// Registers `target` as the table referenced by relation column `column_key`,
    /// without touching remote schema.
    ///
    /// # Errors
    ///
    /// See [`RelationRegistry::register`].
    pub fn relate(&self, column_key: &str, target: &Table) -> Result<()> {
        self.relations.register(self, column_key, target)
    }

    /// Declares `target` as the remote target of relation column `column_key`.
    ///
    /// # Errors
    ///
    /// See [`link_relations`].
    pub async fn link(
        &self,
        column_key: &str,
        target: &Table,
        mode: crate::relation::RelationMode,
    ) -> Result<()> {
        link_relations(&[LinkInstruction {
            source: self.clone(),
            column_key: column_key.to_string(),
            target: target.clone(),
            mode,
        }])
        .await
    }

    /// Replaces relation references in `rows` with the rows they point to.
    ///
    /// # Errors
    ///
    /// See [`crate::relation::populate`].
    pub async fn populate(
        &self,
        rows: &[RowEnvelope],
        spec: &PopulateSpec,
    ) -> Result<Vec<RowEnvelope>> {
        crate::relation::populate(self, rows, spec).await
    }

    /// Shorthand for populating a single relation column with full rows.
    ///
    /// # Errors
    ///
    /// See [`crate::relation::populate`].
    pub async fn populate_all(&self, rows: &[RowEnvelope], column_key: &str) -> Result<Vec<RowEnvelope>> {
        let spec = PopulateSpec::from([(column_key.to_string(), Populate::All)]);
        self.populate(rows, &spec).await
    }
}
