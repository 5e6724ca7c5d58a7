//! Collection schema derivation, attach-time validation and introspection.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::codec::{
    declared_type_key, CheckboxCodec, Codec, ContactCodec, DateCodec, FilesCodec,
    MultiSelectCodec, NumberCodec, PeopleCodec, RelationCodec, RichTextCodec, SelectCodec,
    SystemCodec, TitleCodec, UniqueIdCodec,
};
use crate::column::{ColumnDef, Columns};
use crate::error::{Error, Result};
use crate::property::PropertyType;
use crate::wire::{CollectionSchema, PropertyMap};

/// Union of every column's schema fragment, keyed by wire property name.
#[must_use]
pub fn schema_for_columns(columns: &Columns) -> PropertyMap {
    let mut properties = PropertyMap::new();
    for (_, column) in columns.iter() {
        if let JsonValue::Object(fragment) = column.config() {
            properties.extend(fragment);
        }
    }
    properties
}

/// Checks that every declared column exists remotely with the same wire type.
///
/// # Errors
///
/// Returns [`Error::SchemaMismatch`] for the first column (in key order)
/// whose property is missing or declares a different type.
pub fn validate_remote_schema(columns: &Columns, schema: &CollectionSchema) -> Result<()> {
    for (key, column) in columns.iter() {
        let expected = column.property_type();
        let found = schema
            .properties
            .get(column.name())
            .and_then(declared_type_key);
        if found != Some(expected.wire_key()) {
            return Err(Error::SchemaMismatch {
                column: key.to_string(),
                property: column.name().to_string(),
                expected,
                found: found.map(str::to_string),
            });
        }
    }
    Ok(())
}

/// Derives columns from a remote schema.
///
/// Every column is optional and nullable and is keyed by its property name.
/// Choice columns accept any option name. Property types without a codec
/// (formulas, rollups, buttons) are skipped.
#[must_use]
pub fn introspect_columns(schema: &CollectionSchema) -> Columns {
    schema
        .properties
        .iter()
        .filter_map(|(name, config)| {
            let Some(codec) = codec_for_config(config) else {
                warn!(
                    collection = %schema.id,
                    property = %name,
                    kind = declared_type_key(config).unwrap_or("unknown"),
                    "skipping property without a codec"
                );
                return None;
            };
            let column = ColumnDef::new(name.clone(), codec).optional().nullable();
            Some((name.clone(), column))
        })
        .collect()
}

/// Builds the codec matching a remote property configuration.
fn codec_for_config(config: &JsonValue) -> Option<Arc<dyn Codec>> {
    let kind = PropertyType::from_wire_key(declared_type_key(config)?)?;
    let body = config.get(kind.wire_key());
    let text_field = |field: &str| {
        body.and_then(|b| b.get(field))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    };
    let codec: Arc<dyn Codec> = match kind {
        PropertyType::Title => Arc::new(TitleCodec),
        PropertyType::RichText => Arc::new(RichTextCodec),
        PropertyType::Number => match text_field("format") {
            Some(format) => Arc::new(NumberCodec::with_format(format)),
            None => Arc::new(NumberCodec::default()),
        },
        PropertyType::Checkbox => Arc::new(CheckboxCodec),
        PropertyType::Date => Arc::new(DateCodec),
        PropertyType::Url => Arc::new(ContactCodec::url()),
        PropertyType::Email => Arc::new(ContactCodec::email()),
        PropertyType::PhoneNumber => Arc::new(ContactCodec::phone_number()),
        PropertyType::Select => Arc::new(SelectCodec::select()),
        PropertyType::Status => Arc::new(SelectCodec::status()),
        PropertyType::MultiSelect => Arc::new(MultiSelectCodec::default()),
        PropertyType::People => Arc::new(PeopleCodec),
        PropertyType::Files => Arc::new(FilesCodec),
        PropertyType::Relation => Arc::new(RelationCodec),
        PropertyType::UniqueId => match text_field("prefix") {
            Some(prefix) => Arc::new(UniqueIdCodec::with_prefix(prefix)),
            None => Arc::new(UniqueIdCodec::default()),
        },
        PropertyType::CreatedTime
        | PropertyType::LastEditedTime
        | PropertyType::CreatedBy
        | PropertyType::LastEditedBy => Arc::new(SystemCodec::new(kind)?),
    };
    Some(codec)
}
