use docorm_core::row::decode_envelope;
use docorm_core::{
    build_insert_properties, build_update_properties, Error, OrderBy, Predicate, PropertyMap,
    RecordPatch, RemoteContext, Result, Row, RowEnvelope,
};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::select::build_query;
use super::Table;

/// Options of [`Table::update`].
///
/// Targets come from `page_ids` verbatim when set, otherwise from a query
/// built from the filter and sort fields.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub filter: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    pub raw_filter: Option<JsonValue>,
    pub raw_sorts: Option<JsonValue>,
    pub page_ids: Option<Vec<String>>,
    /// Update every resolved target instead of only the first.
    pub many: bool,
    /// Target query page size; defaults to 1 for single updates and to
    /// `update_many_page_size` for many.
    pub page_size: Option<u32>,
}

impl UpdateOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<OrderBy>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    #[must_use]
    pub fn raw_filter(mut self, filter: JsonValue) -> Self {
        self.raw_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn page_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.page_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    fn is_many(&self) -> bool {
        self.many || self.page_ids.as_ref().is_some_and(|ids| ids.len() > 1)
    }
}

/// Result of [`Table::update`].
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Single(RowEnvelope),
    Many(Vec<RowEnvelope>),
}

impl UpdateOutcome {
    /// Every updated row.
    #[must_use]
    pub fn into_rows(self) -> Vec<RowEnvelope> {
        match self {
            UpdateOutcome::Single(row) => vec![row],
            UpdateOutcome::Many(rows) => rows,
        }
    }
}

/// Options of [`Table::archive`] and [`Table::restore`].
#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    pub filter: Option<Predicate>,
    pub raw_filter: Option<JsonValue>,
    pub page_ids: Option<Vec<String>>,
}

impl TargetOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    #[must_use]
    pub fn raw_filter(mut self, filter: JsonValue) -> Self {
        self.raw_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn page_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.page_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

impl Table {
    /// Creates one row.
    ///
    /// # Errors
    ///
    /// Returns a validation error from
    /// [`build_insert_properties`] before any remote call, or
    /// [`Error::Remote`] when the create fails.
    pub async fn insert(&self, row: &Row) -> Result<RowEnvelope> {
        let properties = build_insert_properties(&self.inner.columns, row)?;
        self.create(&properties).await
    }

    /// Creates rows one after another, in order.
    ///
    /// Every row is validated before the first create request.
    ///
    /// # Errors
    ///
    /// See [`Table::insert`]. A remote failure stops the batch; rows created
    /// before it remain.
    pub async fn insert_many(&self, rows: &[Row]) -> Result<Vec<RowEnvelope>> {
        let batch = rows
            .iter()
            .map(|row| build_insert_properties(&self.inner.columns, row))
            .collect::<Result<Vec<_>>>()?;
        let mut created = Vec::with_capacity(batch.len());
        for properties in &batch {
            created.push(self.create(properties).await?);
        }
        debug!(table = %self.inner.title, rows = created.len(), "inserted rows");
        Ok(created)
    }

    async fn create(&self, properties: &PropertyMap) -> Result<RowEnvelope> {
        let record = self
            .inner
            .store
            .create_record(&self.inner.ids, properties)
            .await
            .remote_context(|| format!("failed to create record in `{}`", self.inner.title))?;
        debug!(table = %self.inner.title, record = %record.id, "created record");
        decode_envelope(&self.inner.columns, record)
    }

    /// Applies `patch` to the first resolved target, or to every target in
    /// many mode.
    ///
    /// # Errors
    ///
    /// Returns a validation error from [`build_update_properties`] before
    /// target resolution, [`Error::NoTargetsResolved`] when nothing matches,
    /// and [`Error::Remote`] when a remote call fails.
    pub async fn update(&self, patch: &Row, options: &UpdateOptions) -> Result<UpdateOutcome> {
        let properties = build_update_properties(&self.inner.columns, patch)?;
        let many = options.is_many();
        let targets = match &options.page_ids {
            Some(ids) => ids.clone(),
            None => {
                let default_size = if many {
                    self.inner.config.update_many_page_size
                } else {
                    1
                };
                let page_size = self
                    .inner
                    .config
                    .clamp_page_size(Some(options.page_size.unwrap_or(default_size)));
                let request = build_query(
                    options.filter.as_ref(),
                    options.order_by.as_ref(),
                    options.raw_filter.as_ref(),
                    options.raw_sorts.as_ref(),
                    page_size,
                    None,
                )?;
                self.query_ids(&request).await?
            }
        };
        let patch = RecordPatch::Properties(properties);
        if !many {
            let target = targets.first().ok_or(Error::NoTargetsResolved)?;
            return Ok(UpdateOutcome::Single(self.patch(target, &patch).await?));
        }
        if targets.is_empty() {
            return Err(Error::NoTargetsResolved);
        }
        let mut updated = Vec::with_capacity(targets.len());
        for target in &targets {
            updated.push(self.patch(target, &patch).await?);
        }
        debug!(table = %self.inner.title, rows = updated.len(), "updated rows");
        Ok(UpdateOutcome::Many(updated))
    }

    /// Moves the targeted rows to the archive. Returns how many were archived.
    ///
    /// # Errors
    ///
    /// Returns a filter compile error before any remote call, or
    /// [`Error::Remote`] when a remote call fails.
    pub async fn archive(&self, options: &TargetOptions) -> Result<usize> {
        self.set_archived(options, true).await
    }

    /// Moves the targeted rows out of the archive. Returns how many were restored.
    ///
    /// # Errors
    ///
    /// See [`Table::archive`].
    pub async fn restore(&self, options: &TargetOptions) -> Result<usize> {
        self.set_archived(options, false).await
    }

    async fn set_archived(&self, options: &TargetOptions, archived: bool) -> Result<usize> {
        let targets = match &options.page_ids {
            Some(ids) => ids.clone(),
            None => {
                let request = build_query(
                    options.filter.as_ref(),
                    None,
                    options.raw_filter.as_ref(),
                    None,
                    self.inner.config.clamp_page_size(Some(self.inner.config.bulk_target_limit)),
                    None,
                )?;
                self.query_ids(&request).await?
            }
        };
        let patch = RecordPatch::Archived(archived);
        for target in &targets {
            self.inner
                .store
                .update_record(target, &patch)
                .await
                .remote_context(|| {
                    format!("failed to set archived={archived} on `{target}` in `{}`", self.inner.title)
                })?;
        }
        debug!(table = %self.inner.title, rows = targets.len(), archived, "changed archive state");
        Ok(targets.len())
    }

    async fn query_ids(&self, request: &docorm_core::QueryRequest) -> Result<Vec<String>> {
        let response = self
            .inner
            .store
            .query_records(&self.inner.ids.data_source_id, request)
            .await
            .remote_context(|| format!("failed to resolve targets in `{}`", self.inner.title))?;
        Ok(response.results.into_iter().map(|r| r.id).collect())
    }

    async fn patch(&self, record_id: &str, patch: &RecordPatch) -> Result<RowEnvelope> {
        let record = self
            .inner
            .store
            .update_record(record_id, patch)
            .await
            .remote_context(|| {
                format!("failed to update record `{record_id}` in `{}`", self.inner.title)
            })?;
        decode_envelope(&self.inner.columns, record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docorm_core::column::{created_time, multi_select, number, select, title};
    use docorm_core::query::eq;
    use docorm_core::{Columns, Value};
    use serde_json::json;

    use super::*;
    use crate::store::{MemoryStore, StoreCall, StoreMethod};
    use crate::traits::RemoteStore;
    use crate::{Orm, SelectOptions, TableTarget};

    fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    async fn tasks(store: &Arc<MemoryStore>) -> Table {
        let columns = Columns::new()
            .column("name", title("Name"))
            .column("points", number("Points").default(0))
            .column("stage", select("Stage").options(["Todo", "Done"]).optional())
            .column("tags", multi_select("Tags").options(["a", "b"]).default(Value::Array(vec![])))
            .column("created", created_time("Created"));
        let table = Orm::new(store.clone())
            .define_table("Tasks", columns, TableTarget::Create { parent_id: "root".into() })
            .await
            .unwrap();
        store.clear_calls();
        table
    }

    fn updates(store: &MemoryStore) -> Vec<(String, RecordPatch)> {
        store
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::UpdateRecord { record_id, patch } => Some((record_id, patch)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn insert_fills_defaults() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;

        let first = tasks.insert(&row([("name", "A".into())])).await.unwrap();
        let second = tasks
            .insert(&row([("name", "B".into()), ("tags", Value::from(vec!["a"]))]))
            .await
            .unwrap();

        assert_eq!(first.data["points"], Value::Int(0));
        assert_eq!(first.data["tags"], Value::Array(vec![]));
        assert_eq!(second.data["tags"], Value::from(vec!["a"]));
        assert_eq!(first.data["created"], Value::from("2024-01-01T00:00:01.000Z"));

        let StoreCall::CreateRecord { properties, .. } = &store.calls()[0] else {
            panic!("expected a create call");
        };
        assert_eq!(properties["Points"], json!({"number": 0}));
        assert_eq!(properties["Tags"], json!({"multi_select": []}));
        assert!(!properties.contains_key("Stage"));
        assert!(!properties.contains_key("Created"));
    }

    #[tokio::test]
    async fn insert_rejects_read_only_before_any_call() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;

        let err = tasks
            .insert(&row([("name", "A".into()), ("created", "2024-01-01".into())]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReadOnlyViolation { ref key } if key == "created"));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn insert_many_validates_every_row_first() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;

        let err = tasks
            .insert_many(&[row([("name", "A".into())]), row([("points", 3.into())])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingRequiredColumn { ref key } if key == "name"));
        assert_eq!(store.call_count(StoreMethod::CreateRecord), 0);

        let rows = tasks
            .insert_many(&[row([("name", "A".into())]), row([("name", "B".into())])])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(store.call_count(StoreMethod::CreateRecord), 2);
    }

    #[tokio::test]
    async fn remote_failures_are_wrapped() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;
        store.fail(StoreMethod::CreateRecord, "rate limited");

        let err = tasks.insert(&row([("name", "A".into())])).await.unwrap_err();
        assert!(err.is_remote());
        let Error::Remote { source, .. } = err else {
            unreachable!();
        };
        assert_eq!(source.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn single_update_patches_first_match_only() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;
        for name in ["A", "B"] {
            tasks
                .insert(&row([("name", name.into()), ("stage", "Todo".into())]))
                .await
                .unwrap();
        }
        store.clear_calls();

        let options = UpdateOptions::new().filter(eq(tasks.column("stage").unwrap(), "Todo"));
        let outcome = tasks
            .update(&row([("stage", "Done".into())]), &options)
            .await
            .unwrap();

        let UpdateOutcome::Single(updated) = outcome else {
            panic!("expected a single outcome");
        };
        assert_eq!(updated.data["stage"], Value::from("Done"));
        assert_eq!(updated.data["name"], Value::from("A"));

        let patches = updates(&store);
        assert_eq!(patches.len(), 1);
        let RecordPatch::Properties(properties) = &patches[0].1 else {
            panic!("expected a properties patch");
        };
        assert_eq!(
            JsonValue::Object(properties.clone()),
            json!({"Stage": {"select": {"name": "Done"}}})
        );
        let StoreCall::QueryRecords { request, .. } = &store.calls()[0] else {
            panic!("expected target resolution first");
        };
        assert_eq!(request.page_size, Some(1));
    }

    #[tokio::test]
    async fn many_update_patches_every_match() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;
        for name in ["A", "B", "C"] {
            let stage = if name == "C" { "Done" } else { "Todo" };
            tasks
                .insert(&row([("name", name.into()), ("stage", stage.into())]))
                .await
                .unwrap();
        }

        let options = UpdateOptions::new()
            .filter(eq(tasks.column("stage").unwrap(), "Todo"))
            .many();
        let rows = tasks
            .update(&row([("points", 5.into())]), &options)
            .await
            .unwrap()
            .into_rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.data["points"] == Value::Int(5)));

        let done = tasks
            .select(&SelectOptions::new().filter(eq(tasks.column("stage").unwrap(), "Done")))
            .await
            .unwrap();
        assert_eq!(done.rows[0].data["points"], Value::Int(0));
    }

    #[tokio::test]
    async fn update_with_page_ids_skips_resolution() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;
        let created = tasks.insert(&row([("name", "A".into())])).await.unwrap();
        store.clear_calls();

        tasks
            .update(
                &row([("name", "Renamed".into())]),
                &UpdateOptions::new().page_ids([created.id()]),
            )
            .await
            .unwrap();
        assert_eq!(store.call_count(StoreMethod::QueryRecords), 0);
        assert_eq!(updates(&store)[0].0, created.id());
    }

    #[tokio::test]
    async fn update_without_targets_fails() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;

        let options = UpdateOptions::new().filter(eq(tasks.column("stage").unwrap(), "Done"));
        let err = tasks
            .update(&row([("points", 1.into())]), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoTargetsResolved));
        assert_eq!(store.call_count(StoreMethod::UpdateRecord), 0);

        let err = tasks
            .update(&row([("points", 1.into())]), &options.clone().many())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoTargetsResolved));
    }

    #[tokio::test]
    async fn empty_update_fails_before_any_call() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;

        let err = tasks
            .update(&Row::new(), &UpdateOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyUpdate));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn archive_and_restore_by_id() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;
        let rows = tasks
            .insert_many(&[
                row([("name", "A".into())]),
                row([("name", "B".into())]),
                row([("name", "C".into())]),
            ])
            .await
            .unwrap();

        let archived = tasks
            .archive(&TargetOptions::new().page_ids([rows[0].id(), rows[1].id()]))
            .await
            .unwrap();
        assert_eq!(archived, 2);
        assert!(store.record(rows[0].id()).unwrap().archived);

        let live = tasks.select(&SelectOptions::new()).await.unwrap();
        assert_eq!(live.rows.len(), 1);
        assert_eq!(live.rows[0].id(), rows[2].id());

        let restored = tasks
            .restore(&TargetOptions::new().page_ids([rows[0].id()]))
            .await
            .unwrap();
        assert_eq!(restored, 1);
        assert!(!store.record(rows[0].id()).unwrap().archived);
    }

    #[tokio::test]
    async fn archive_by_filter() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;
        tasks
            .insert_many(&[
                row([("name", "A".into()), ("stage", "Done".into())]),
                row([("name", "B".into()), ("stage", "Todo".into())]),
            ])
            .await
            .unwrap();

        let archived = tasks
            .archive(&TargetOptions::new().filter(eq(tasks.column("stage").unwrap(), "Done")))
            .await
            .unwrap();
        assert_eq!(archived, 1);
        let live = tasks.select(&SelectOptions::new()).await.unwrap();
        assert_eq!(live.rows[0].data["name"], Value::from("B"));
    }

    #[tokio::test]
    async fn several_explicit_ids_imply_many() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;
        let rows = tasks
            .insert_many(&[row([("name", "A".into())]), row([("name", "B".into())])])
            .await
            .unwrap();

        let outcome = tasks
            .update(
                &row([("points", 2.into())]),
                &UpdateOptions::new().page_ids(rows.iter().map(RowEnvelope::id)),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Many(ref updated) if updated.len() == 2));
    }

    #[tokio::test]
    async fn archive_counts_rows_that_do_not_decode() {
        let store = Arc::new(MemoryStore::new());
        let tasks = tasks(&store).await;
        let mut properties = PropertyMap::new();
        properties.insert("Name".into(), json!({"title": "not rich text"}));
        let record = store.create_record(tasks.ids(), &properties).await.unwrap();
        assert!(tasks.retrieve(&record.id).await.is_err());

        let archived = tasks
            .archive(&TargetOptions::new().page_ids([record.id.as_str()]))
            .await
            .unwrap();
        assert_eq!(archived, 1);
        assert!(store.record(&record.id).unwrap().archived);
        assert_eq!(
            tasks
                .restore(&TargetOptions::new().page_ids([record.id.as_str()]))
                .await
                .unwrap(),
            1
        );
    }
}
