use std::sync::Arc;

use docorm_core::{introspect_columns, Columns, RemoteContext, Result};

use crate::config::OrmConfig;
use crate::relation::{link_relations, LinkInstruction, RelationRegistry};
use crate::table::{Table, TableTarget};
use crate::traits::RemoteStore;

/// Entry point: owns the store handle, configuration and relation registry
/// shared by every table it defines.
#[derive(Clone)]
pub struct Orm {
    store: Arc<dyn RemoteStore>,
    config: OrmConfig,
    relations: Arc<RelationRegistry>,
}

impl Orm {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_config(store, OrmConfig::default())
    }

    #[must_use]
    pub fn with_config(store: Arc<dyn RemoteStore>, config: OrmConfig) -> Self {
        Self {
            store,
            config,
            relations: Arc::new(RelationRegistry::new()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    #[must_use]
    pub fn relations(&self) -> &RelationRegistry {
        &self.relations
    }

    /// Binds `columns` to a new or existing remote collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`](docorm_core::Error::SchemaMismatch)
    /// when an existing collection does not match the columns, and
    /// [`Error::Remote`](docorm_core::Error::Remote) when a remote call fails.
    pub async fn define_table(
        &self,
        title: impl Into<String>,
        columns: Columns,
        target: TableTarget,
    ) -> Result<Table> {
        Table::define(
            Arc::clone(&self.store),
            self.config.clone(),
            Arc::clone(&self.relations),
            title.into(),
            columns,
            target,
        )
        .await
    }

    /// Attaches to an existing collection with columns derived from its
    /// remote schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`](docorm_core::Error::Remote) when the schema
    /// cannot be fetched.
    pub async fn introspect_table(
        &self,
        title: impl Into<String>,
        collection_id: &str,
    ) -> Result<Table> {
        let schema = self
            .store
            .retrieve_collection_schema(collection_id)
            .await
            .remote_context(|| format!("failed to retrieve schema of `{collection_id}`"))?;
        let columns = introspect_columns(&schema);
        Ok(Table::from_parts(
            Arc::clone(&self.store),
            self.config.clone(),
            Arc::clone(&self.relations),
            title.into(),
            columns,
            schema.ids(),
        ))
    }

    /// Declares relation targets in remote schema.
    ///
    /// # Errors
    ///
    /// See [`link_relations`].
    pub async fn link(&self, instructions: &[LinkInstruction]) -> Result<()> {
        link_relations(instructions).await
    }
}

#[cfg(test)]
mod tests {
    use docorm_core::column::{number, select, title};
    use docorm_core::{CollectionSchema, Error, PropertyType};
    use serde_json::json;

    use super::*;
    use crate::store::{MemoryStore, StoreCall, StoreMethod};

    fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.seed_collection(CollectionSchema {
            id: "db-1".into(),
            data_source_id: "ds-1".into(),
            properties: [
                ("Name".to_string(), json!({"title": {}})),
                ("Points".to_string(), json!({"number": {"format": "number"}})),
                ("Stage".to_string(), json!({"select": {"options": [{"name": "Todo"}]}})),
                ("Shape".to_string(), json!({"formula": {"expression": "1"}})),
            ]
            .into_iter()
            .collect(),
        });
        store
    }

    fn existing() -> TableTarget {
        TableTarget::Existing {
            collection_id: "db-1".into(),
        }
    }

    #[tokio::test]
    async fn create_sends_column_schema() {
        let store = Arc::new(MemoryStore::new());
        let orm = Orm::new(store.clone());
        let table = orm
            .define_table(
                "Tasks",
                Columns::new()
                    .column("name", title("Name"))
                    .column("points", number("Points")),
                TableTarget::Create {
                    parent_id: "page-1".into(),
                },
            )
            .await
            .unwrap();

        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        let StoreCall::CreateCollection {
            parent_id,
            title,
            properties,
        } = &calls[0]
        else {
            panic!("expected a create call");
        };
        assert_eq!((parent_id.as_str(), title.as_str()), ("page-1", "Tasks"));
        assert_eq!(properties["Name"], json!({"title": {}}));
        assert!(store.collection(&table.ids().collection_id).is_some());
    }

    #[tokio::test]
    async fn attach_validates_remote_schema() {
        let store = seeded();
        let orm = Orm::new(store.clone());

        let table = orm
            .define_table(
                "Tasks",
                Columns::new()
                    .column("name", title("Name"))
                    .column("stage", select("Stage").options(["Todo"])),
                existing(),
            )
            .await
            .unwrap();
        assert_eq!(table.ids().data_source_id, "ds-1");

        let err = orm
            .define_table(
                "Tasks",
                Columns::new().column("name", number("Name")),
                existing(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaMismatch { ref property, expected: PropertyType::Number, .. } if property == "Name"
        ));
        assert_eq!(store.call_count(StoreMethod::CreateCollection), 0);
    }

    #[tokio::test]
    async fn attach_to_missing_collection_is_remote() {
        let orm = Orm::new(Arc::new(MemoryStore::new()));
        let err = orm
            .define_table("Tasks", Columns::new(), existing())
            .await
            .unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn introspection_skips_unsupported_properties() {
        let orm = Orm::new(seeded());
        let table = orm.introspect_table("Tasks", "db-1").await.unwrap();

        assert_eq!(table.title(), "Tasks");
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.column("Points").unwrap().property_type(), PropertyType::Number);
        assert!(table.column("Shape").is_err());
    }

    #[tokio::test]
    async fn tables_share_one_registry() {
        let store = seeded();
        let orm = Orm::new(store);
        let a = orm.introspect_table("A", "db-1").await.unwrap();
        let b = orm.clone().introspect_table("B", "db-1").await.unwrap();
        assert_ne!(a.id(), b.id());
        assert!(Arc::ptr_eq(&a.relations, &b.relations));
    }
}
