//! `docorm`: typed tables, queries and relations over a remote
//! structured-document store.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docorm::column::{number, select, title};
//! use docorm::query::gt;
//! use docorm::{Columns, Orm, SelectOptions, TableTarget};
//! use docorm::store::{HttpStore, MemoryStore};
//!
//! # async fn run() -> docorm::Result<()> {
//! let orm = Orm::new(Arc::new(MemoryStore::new()));
//! let columns = Columns::new()
//!     .column("name", title("Name"))
//!     .column("points", number("Points").default(0))
//!     .column("stage", select("Stage").options(["Todo", "Done"]).optional());
//! let tasks = orm
//!     .define_table("Tasks", columns, TableTarget::Create { parent_id: "root".into() })
//!     .await?;
//! let page = tasks
//!     .select(&SelectOptions::new().filter(gt(tasks.column("points")?, 3)))
//!     .await?;
//! # let _ = (page, HttpStore::new);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod orm;
pub mod relation;
pub mod store;
pub mod table;
pub mod traits;

pub use docorm_core::{
    build_insert_properties, build_update_properties, codec, column, decode_row,
    introspect_columns, query, schema_for_columns, validate_remote_schema, CodecError, Column,
    ColumnDef, Columns, Error, OrderBy, Predicate, PropertyType, Result, Row, RowEnvelope, Sort,
    SortDirection, Value,
};

pub use config::{HttpStoreConfig, OrmConfig};
pub use orm::Orm;
pub use relation::{
    link_relations, LinkInstruction, Populate, PopulateSpec, RelationMode, RelationRegistry,
};
pub use table::{
    Page, SelectOptions, Table, TableId, TableTarget, TargetOptions, UpdateOptions, UpdateOutcome,
};
pub use traits::RemoteStore;
