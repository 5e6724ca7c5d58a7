use std::collections::BTreeMap;
use std::sync::Arc;

use docorm_core::{CollectionIds, Error, PropertyMap, RemoteContext, Result};
use futures_util::future::try_join_all;
use serde_json::{json, Map, Value as JsonValue};
use tracing::info;

use super::registry::ensure_relation_column;
use crate::table::{Table, TableId, TableInner};

/// Whether a relation is visible only on the source or mirrored on the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RelationMode {
    #[default]
    Single,
    /// Two-way relation. The synced property on the target is named or
    /// identified by the optional fields; the remote picks a name otherwise.
    Dual {
        synced_property_name: Option<String>,
        synced_property_id: Option<String>,
    },
}

/// One relation column to declare against its target.
#[derive(Debug, Clone)]
pub struct LinkInstruction {
    pub source: Table,
    pub column_key: String,
    pub target: Table,
    pub mode: RelationMode,
}

impl LinkInstruction {
    #[must_use]
    pub fn single(source: &Table, column_key: impl Into<String>, target: &Table) -> Self {
        Self {
            source: source.clone(),
            column_key: column_key.into(),
            target: target.clone(),
            mode: RelationMode::Single,
        }
    }

    #[must_use]
    pub fn dual(
        source: &Table,
        column_key: impl Into<String>,
        target: &Table,
        synced_property_name: Option<String>,
    ) -> Self {
        Self {
            source: source.clone(),
            column_key: column_key.into(),
            target: target.clone(),
            mode: RelationMode::Dual {
                synced_property_name,
                synced_property_id: None,
            },
        }
    }
}

/// Schema fragment declaring `property` as a relation to `target`.
#[must_use]
pub fn relation_fragment(property: &str, target: &CollectionIds, mode: &RelationMode) -> PropertyMap {
    let (kind, body) = match mode {
        RelationMode::Single => ("single_property", json!({})),
        RelationMode::Dual {
            synced_property_name,
            synced_property_id,
        } => {
            let mut body = Map::new();
            if let Some(name) = synced_property_name {
                body.insert("synced_property_name".into(), json!(name));
            }
            if let Some(id) = synced_property_id {
                body.insert("synced_property_id".into(), json!(id));
            }
            ("dual_property", JsonValue::Object(body))
        }
    };
    let mut fragment = PropertyMap::new();
    fragment.insert(
        property.to_string(),
        json!({"relation": {
            "data_source_id": target.data_source_id,
            "type": kind,
            kind: body,
        }}),
    );
    fragment
}

/// Declares relation targets in remote schema.
///
/// Every instruction is validated before any remote call. Fragments are
/// grouped into one schema update per source table, and the updates run
/// concurrently. Validated instructions are registered in the source
/// table's relation registry.
///
/// # Errors
///
/// Returns [`Error::CrossWorkspaceLink`] when source and target use
/// different stores, [`Error::UnknownColumn`] or [`Error::NotARelation`] for
/// a bad column, and [`Error::Remote`] when a schema update fails.
pub async fn link_relations(instructions: &[LinkInstruction]) -> Result<()> {
    let mut updates: BTreeMap<TableId, (Arc<TableInner>, PropertyMap)> = BTreeMap::new();
    for instruction in instructions {
        let (source, target) = (&instruction.source, &instruction.target);
        if !source.inner.shares_store_with(&target.inner) {
            return Err(Error::CrossWorkspaceLink {
                source_table: source.title().to_string(),
                target_table: target.title().to_string(),
            });
        }
        ensure_relation_column(source, &instruction.column_key)?;
        let column = source.column(&instruction.column_key)?;
        let fragment = relation_fragment(column.name(), target.ids(), &instruction.mode);
        updates
            .entry(source.id())
            .or_insert_with(|| (Arc::clone(&source.inner), PropertyMap::new()))
            .1
            .extend(fragment);
    }

    for instruction in instructions {
        instruction.source.relations.insert(
            instruction.source.id(),
            &instruction.column_key,
            &instruction.target.inner,
        );
    }

    try_join_all(updates.into_values().map(|(table, properties)| async move {
        table
            .store
            .update_collection_schema(&table.ids, &properties)
            .await
            .remote_context(|| format!("failed to link relations of `{}`", table.title))?;
        info!(table = %table.title, relations = properties.len(), "linked relations");
        Ok::<_, Error>(())
    }))
    .await?;
    Ok(())
}
