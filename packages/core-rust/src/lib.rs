//! `docorm` core: values, codecs, column definitions, row translation and
//! the predicate compiler.
//!
//! Everything here is synchronous and pure; remote I/O lives in the `docorm`
//! client crate.

pub mod codec;
pub mod column;
pub mod error;
pub mod property;
pub mod query;
pub mod row;
pub mod schema;
pub mod value;
pub mod wire;

pub use codec::Codec;
pub use column::{Column, ColumnDef, Columns};
pub use error::{CodecError, Error, RemoteContext, Result};
pub use property::PropertyType;
pub use query::{OrderBy, Predicate, Sort, SortDirection};
pub use row::{build_insert_properties, build_update_properties, decode_row, RowEnvelope};
pub use schema::{introspect_columns, schema_for_columns, validate_remote_schema};
pub use value::{Row, Value};
pub use wire::{
    CollectionIds, CollectionSchema, PropertyMap, QueryRequest, QueryResponse, RawRecord,
    RecordPatch,
};
