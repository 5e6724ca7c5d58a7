use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use docorm_core::{Error, PropertyType, Result};

use crate::table::{Table, TableId, TableInner};

struct RelationTarget {
    id: TableId,
    inner: Weak<TableInner>,
}

impl RelationTarget {
    fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

/// Relation targets of every table of one [`Orm`](crate::Orm) context,
/// keyed by source table and relation column key.
///
/// Targets are held weakly. An entry disappears when its source table's
/// last handle is dropped, and a target whose handles are all gone is
/// treated as unregistered.
#[derive(Default)]
pub struct RelationRegistry {
    entries: DashMap<TableId, BTreeMap<String, RelationTarget>>,
}

impl RelationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `target` as the table referenced by `source`'s column `column_key`.
    ///
    /// Purely local: remote schema is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] when `source` declares no such column
    /// and [`Error::NotARelation`] when the column is not relation-typed.
    pub fn register(&self, source: &Table, column_key: &str, target: &Table) -> Result<()> {
        ensure_relation_column(source, column_key)?;
        self.insert(source.id(), column_key, &target.inner);
        Ok(())
    }

    pub(crate) fn insert(&self, source: TableId, column_key: &str, target: &Arc<TableInner>) {
        let mut targets = self.entries.entry(source).or_default();
        targets.retain(|_, t| t.is_live());
        targets.insert(
            column_key.to_string(),
            RelationTarget {
                id: target.id,
                inner: Arc::downgrade(target),
            },
        );
    }

    pub(crate) fn target(&self, source: TableId, column_key: &str) -> Option<Arc<TableInner>> {
        self.entries
            .get(&source)
            .and_then(|targets| targets.get(column_key).and_then(|t| t.inner.upgrade()))
    }

    /// Drops every registration whose source is `source`.
    pub(crate) fn remove_source(&self, source: TableId) {
        self.entries.remove(&source);
    }

    /// Id of the table registered for `source`'s column `column_key`.
    #[must_use]
    pub fn target_of(&self, source: &Table, column_key: &str) -> Option<TableId> {
        self.entries.get(&source.id()).and_then(|targets| {
            targets
                .get(column_key)
                .filter(|t| t.is_live())
                .map(|t| t.id)
        })
    }

    /// Every registered relation column of `source` with its target table id.
    #[must_use]
    pub fn relations_of(&self, source: &Table) -> Vec<(String, TableId)> {
        self.entries
            .get(&source.id())
            .map(|targets| {
                targets
                    .iter()
                    .filter(|(_, t)| t.is_live())
                    .map(|(k, t)| (k.clone(), t.id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of source tables with at least one registration.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Checks that `column_key` names a relation column of `table`.
pub(crate) fn ensure_relation_column(table: &Table, column_key: &str) -> Result<()> {
    let column = table.column(column_key)?;
    if column.property_type() != PropertyType::Relation {
        return Err(Error::NotARelation {
            key: column_key.to_string(),
        });
    }
    Ok(())
}
