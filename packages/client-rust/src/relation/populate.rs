//! Dereferencing of relation references in result rows.
//!
//! Distinct referenced ids are fetched once each by a fixed number of
//! workers pulling from one shared queue.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use docorm_core::{Error, RawRecord, Result, Row, RowEnvelope, Value};
use futures_util::future::try_join_all;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::table::{Table, TableId, TableInner};

/// How a populated relation column is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Populate {
    /// Replace each reference with the full `{data, page}` envelope.
    All,
    /// Replace each reference with `{id, ...fields}` taken from the decoded row.
    Fields(Vec<String>),
}

impl Populate {
    #[must_use]
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Populate::Fields(fields.into_iter().map(Into::into).collect())
    }
}

/// Relation columns to populate, keyed by local column key.
pub type PopulateSpec = BTreeMap<String, Populate>;

type Resolved = HashMap<(TableId, String), RowEnvelope>;

/// Id of a well-formed `{id}` reference.
fn reference_id(item: &Value) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

fn page_value(record: &RawRecord) -> Value {
    let optional = |v: &Option<String>| v.clone().map_or(Value::Null, Value::String);
    Value::map([
        ("id", Value::from(record.id.as_str())),
        ("archived", Value::Bool(record.archived)),
        ("created_time", optional(&record.created_time)),
        ("last_edited_time", optional(&record.last_edited_time)),
        ("url", optional(&record.url)),
        (
            "properties",
            Value::from(serde_json::Value::Object(record.properties.clone())),
        ),
    ])
}

fn render(id: &str, envelope: &RowEnvelope, populate: &Populate) -> Value {
    match populate {
        Populate::All => Value::map([
            ("data", Value::Map(envelope.data.clone())),
            ("page", page_value(&envelope.page)),
        ]),
        Populate::Fields(fields) => {
            let mut projected = Row::new();
            projected.insert("id".to_string(), Value::from(id));
            for field in fields {
                if let Some(value) = envelope.data.get(field) {
                    projected.insert(field.clone(), value.clone());
                }
            }
            Value::Map(projected)
        }
    }
}

/// Fetches every queued record with at most `concurrency` requests in flight.
async fn fetch_all(
    jobs: VecDeque<(Arc<TableInner>, String)>,
    concurrency: usize,
) -> Result<Resolved> {
    let workers = concurrency.clamp(1, jobs.len().max(1));
    let queue = Mutex::new(jobs);
    let resolved = Mutex::new(Resolved::new());
    try_join_all((0..workers).map(|_| async {
        loop {
            let Some((table, id)) = queue.lock().pop_front() else {
                break;
            };
            let envelope = table.retrieve(&id).await?;
            resolved.lock().insert((table.id, id), envelope);
        }
        Ok::<_, Error>(())
    }))
    .await?;
    Ok(resolved.into_inner())
}

/// Returns copies of `rows` whose relation columns named in `spec` reference
/// the rows they point to.
///
/// Each distinct referenced id is fetched once. References that did not
/// resolve become bare `{id}` maps; entries without a string `id` are kept
/// unchanged. `rows` is not modified.
///
/// # Errors
///
/// Returns [`Error::UnknownColumn`] or [`Error::NotARelation`] for a bad
/// column key, [`Error::RelationNotRegistered`] when a column has no
/// registered target, and [`Error::Remote`] when a fetch fails.
pub async fn populate(
    table: &Table,
    rows: &[RowEnvelope],
    spec: &PopulateSpec,
) -> Result<Vec<RowEnvelope>> {
    let mut targets = BTreeMap::new();
    for key in spec.keys() {
        super::registry::ensure_relation_column(table, key)?;
        let target = table
            .relations
            .target(table.id(), key)
            .ok_or_else(|| Error::RelationNotRegistered { key: key.clone() })?;
        targets.insert(key.as_str(), target);
    }

    let mut wanted: BTreeMap<TableId, (Arc<TableInner>, BTreeSet<String>)> = BTreeMap::new();
    for row in rows {
        for (key, target) in &targets {
            let Some(references) = row.data.get(*key).and_then(Value::as_array) else {
                continue;
            };
            let ids = &mut wanted
                .entry(target.id)
                .or_insert_with(|| (Arc::clone(target), BTreeSet::new()))
                .1;
            for item in references {
                match reference_id(item) {
                    Some(id) => {
                        ids.insert(id.to_string());
                    }
                    None => warn!(
                        table = %table.title(),
                        column = %key,
                        "keeping malformed relation reference"
                    ),
                }
            }
        }
    }

    let jobs: VecDeque<_> = wanted
        .into_values()
        .flat_map(|(target, ids)| ids.into_iter().map(move |id| (Arc::clone(&target), id)))
        .collect();
    debug!(table = %table.title(), fetches = jobs.len(), "populating relations");
    let resolved = fetch_all(jobs, table.inner.config.populate_concurrency).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let mut data = row.data.clone();
            for (key, target) in &targets {
                let Some(Value::Array(references)) = data.get_mut(*key) else {
                    continue;
                };
                for item in references.iter_mut() {
                    let Some(id) = reference_id(item).map(str::to_string) else {
                        continue;
                    };
                    *item = match resolved.get(&(target.id, id.clone())) {
                        Some(envelope) => render(&id, envelope, &spec[*key]),
                        None => Value::map([("id", id.as_str())]),
                    };
                }
            }
            RowEnvelope {
                data,
                page: row.page.clone(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use docorm_core::column::{number, relation, title};
    use docorm_core::Columns;

    use super::*;
    use crate::store::{MemoryStore, StoreMethod};
    use crate::{Orm, OrmConfig, SelectOptions, TableTarget};

    struct Fixture {
        store: Arc<MemoryStore>,
        projects: Table,
        tasks: Table,
    }

    async fn fixture(config: OrmConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let orm = Orm::with_config(store.clone(), config);
        let create = || TableTarget::Create { parent_id: "root".into() };
        let projects = orm
            .define_table(
                "Projects",
                Columns::new()
                    .column("name", title("Name"))
                    .column("budget", number("Budget").optional()),
                create(),
            )
            .await
            .unwrap();
        let tasks = orm
            .define_table(
                "Tasks",
                Columns::new()
                    .column("name", title("Name"))
                    .column("project", relation("Project").optional())
                    .column("points", number("Points").optional()),
                create(),
            )
            .await
            .unwrap();
        Fixture {
            store,
            projects,
            tasks,
        }
    }

    fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    async fn insert_projects(projects: &Table, count: usize) -> Vec<RowEnvelope> {
        let rows: Vec<Row> = (0..count)
            .map(|n| row([("name", Value::from(format!("P{n}"))), ("budget", Value::Int(10))]))
            .collect();
        projects.insert_many(&rows).await.unwrap()
    }

    fn references(ids: &[&RowEnvelope]) -> Value {
        Value::from(ids.iter().map(|p| p.id()).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn each_distinct_reference_is_fetched_once() {
        let f = fixture(OrmConfig::default()).await;
        let projects = insert_projects(&f.projects, 2).await;
        f.tasks.relate("project", &f.projects).unwrap();
        f.tasks
            .insert_many(&[
                row([("name", "A".into()), ("project", references(&[&projects[0]]))]),
                row([("name", "B".into()), ("project", references(&[&projects[0], &projects[1]]))]),
                row([("name", "C".into())]),
            ])
            .await
            .unwrap();
        f.store.clear_calls();

        let page = f
            .tasks
            .select(&SelectOptions::new().populate("project", Populate::All))
            .await
            .unwrap();
        assert_eq!(f.store.call_count(StoreMethod::RetrieveRecord), 2);

        let first = page.rows[0].data["project"].as_array().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].get("data").unwrap().get("name"), Some(&Value::from("P0")));
        assert_eq!(
            first[0].get("page").unwrap().get("id"),
            Some(&Value::from(projects[0].id()))
        );
        let second = page.rows[1].data["project"].as_array().unwrap();
        assert_eq!(second[1].get("data").unwrap().get("name"), Some(&Value::from("P1")));
    }

    #[tokio::test]
    async fn field_projection_keeps_id() {
        let f = fixture(OrmConfig::default()).await;
        let projects = insert_projects(&f.projects, 1).await;
        f.tasks.relate("project", &f.projects).unwrap();
        let task = f
            .tasks
            .insert(&row([("name", "A".into()), ("project", references(&[&projects[0]]))]))
            .await
            .unwrap();

        let spec = PopulateSpec::from([("project".to_string(), Populate::fields(["name"]))]);
        let rows = f.tasks.populate(&[task.clone()], &spec).await.unwrap();
        assert_eq!(
            rows[0].data["project"],
            Value::Array(vec![Value::map([
                ("id", Value::from(projects[0].id())),
                ("name", Value::from("P0")),
            ])])
        );
        // Input rows are left untouched.
        assert_eq!(
            task.data["project"],
            Value::Array(vec![Value::map([("id", projects[0].id())])])
        );
    }

    #[tokio::test]
    async fn fetches_respect_concurrency_limit() {
        let f = fixture(OrmConfig {
            populate_concurrency: 3,
            ..OrmConfig::default()
        })
        .await;
        let projects = insert_projects(&f.projects, 12).await;
        f.tasks.relate("project", &f.projects).unwrap();
        let all: Vec<&RowEnvelope> = projects.iter().collect();
        let task = f
            .tasks
            .insert(&row([("name", "A".into()), ("project", references(&all))]))
            .await
            .unwrap();
        f.store.clear_calls();

        let rows = f.tasks.populate_all(&[task], "project").await.unwrap();
        assert_eq!(rows[0].data["project"].as_array().unwrap().len(), 12);
        assert_eq!(f.store.call_count(StoreMethod::RetrieveRecord), 12);
        assert_eq!(f.store.max_concurrent_retrievals(), 3);
    }

    #[tokio::test]
    async fn default_pool_runs_four_fetches_at_once() {
        let f = fixture(OrmConfig::default()).await;
        let projects = insert_projects(&f.projects, 12).await;
        f.tasks.relate("project", &f.projects).unwrap();
        let all: Vec<&RowEnvelope> = projects.iter().collect();
        let task = f
            .tasks
            .insert(&row([("name", "A".into()), ("project", references(&all))]))
            .await
            .unwrap();

        f.tasks.populate_all(&[task], "project").await.unwrap();
        assert_eq!(f.store.max_concurrent_retrievals(), 4);
    }

    #[tokio::test]
    async fn unregistered_relation_is_rejected() {
        let f = fixture(OrmConfig::default()).await;
        let task = f.tasks.insert(&row([("name", "A".into())])).await.unwrap();

        let err = f.tasks.populate_all(&[task.clone()], "project").await.unwrap_err();
        assert!(matches!(err, Error::RelationNotRegistered { ref key } if key == "project"));
        let err = f.tasks.populate_all(&[task], "points").await.unwrap_err();
        assert!(matches!(err, Error::NotARelation { .. }));
    }

    #[tokio::test]
    async fn fetch_failure_is_remote() {
        let f = fixture(OrmConfig::default()).await;
        let projects = insert_projects(&f.projects, 1).await;
        f.tasks.relate("project", &f.projects).unwrap();
        let task = f
            .tasks
            .insert(&row([("name", "A".into()), ("project", references(&[&projects[0]]))]))
            .await
            .unwrap();
        f.store.fail(StoreMethod::RetrieveRecord, "gone");

        let err = f.tasks.populate_all(&[task], "project").await.unwrap_err();
        assert!(err.is_remote());
    }

    #[test]
    fn malformed_references_are_kept() {
        let envelope = RowEnvelope {
            data: Row::new(),
            page: RawRecord::default(),
        };
        let rendered = render("p1", &envelope, &Populate::fields(["missing"]));
        assert_eq!(rendered, Value::map([("id", "p1")]));
        assert_eq!(reference_id(&Value::from("p1")), None);
        assert_eq!(reference_id(&Value::map([("id", "p1")])), Some("p1"));
    }
}
