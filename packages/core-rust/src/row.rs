//! Row-level translation between application rows and wire property maps.
//!
//! These functions are pure: they validate caller input against a column set
//! and produce the property payloads a create/update request carries, or
//! decode a raw record back into a [`Row`].

use serde::{Deserialize, Serialize};

use crate::column::{ColumnDef, Columns};
use crate::error::{Error, Result};
use crate::value::{Row, Value};
use crate::wire::{PropertyMap, RawRecord};

/// A decoded row paired with the raw record it was decoded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowEnvelope {
    /// Codec-decoded values keyed by local field key.
    pub data: Row,
    /// The record as the remote returned it.
    pub page: RawRecord,
}

impl RowEnvelope {
    /// Remote identifier of the underlying record.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.page.id
    }

    /// Deserializes `data` into a caller-defined type.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error when the decoded row does not fit `T`.
    pub fn parse_data<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(Value::Map(self.data.clone()).to_json())
    }
}

fn reject_unknown_keys(columns: &Columns, input: &Row) -> Result<()> {
    match input.keys().find(|key| !columns.contains(key)) {
        Some(key) => Err(Error::UnknownColumn { key: key.clone() }),
        None => Ok(()),
    }
}

/// Parses one supplied value, applying the null and read-only rules.
fn encode_value(key: &str, column: &ColumnDef, value: &Value) -> Result<serde_json::Value> {
    if column.is_read_only() {
        return Err(Error::ReadOnlyViolation {
            key: key.to_string(),
        });
    }
    if value.is_null() {
        if !column.is_nullable() {
            return Err(Error::NullNotAllowed {
                key: key.to_string(),
            });
        }
        return Ok(column.codec().empty());
    }
    column.codec().parse(value).map_err(|source| Error::InvalidValue {
        key: key.to_string(),
        source,
    })
}

/// Builds the property map for creating one record.
///
/// For each declared column, in key order:
/// - absent read-only columns are skipped,
/// - absent columns without a default fail unless optional,
/// - absent columns with a default use a fresh copy of it,
/// - supplied values go through the null/read-only checks and the codec.
///
/// # Errors
///
/// Returns [`Error::UnknownColumn`], [`Error::MissingRequiredColumn`],
/// [`Error::NullNotAllowed`], [`Error::ReadOnlyViolation`] or
/// [`Error::InvalidValue`].
pub fn build_insert_properties(columns: &Columns, input: &Row) -> Result<PropertyMap> {
    reject_unknown_keys(columns, input)?;
    let mut properties = PropertyMap::new();
    for (key, column) in columns.iter() {
        let value = match input.get(key) {
            Some(value) => value.clone(),
            None if column.is_read_only() => continue,
            None => match column.default_value() {
                Some(default) => default.clone(),
                None if column.is_optional() => continue,
                None => {
                    return Err(Error::MissingRequiredColumn {
                        key: key.to_string(),
                    })
                }
            },
        };
        let payload = encode_value(key, column, &value)?;
        properties.insert(column.name().to_string(), payload);
    }
    Ok(properties)
}

/// Builds the property patch for updating records.
///
/// Only supplied keys are considered.
///
/// # Errors
///
/// Returns [`Error::UnknownColumn`], [`Error::NullNotAllowed`],
/// [`Error::ReadOnlyViolation`], [`Error::InvalidValue`], or
/// [`Error::EmptyUpdate`] when the patch changes nothing.
pub fn build_update_properties(columns: &Columns, patch: &Row) -> Result<PropertyMap> {
    reject_unknown_keys(columns, patch)?;
    let mut properties = PropertyMap::new();
    for (key, value) in patch {
        let column = columns.get(key)?;
        let payload = encode_value(key, column, value)?;
        properties.insert(column.name().to_string(), payload);
    }
    if properties.is_empty() {
        return Err(Error::EmptyUpdate);
    }
    Ok(properties)
}

/// Decodes a raw record into a row keyed by local field key.
///
/// Missing properties fall back to the column default, then to `null` for
/// nullable columns; otherwise the key is left out.
///
/// # Errors
///
/// Returns [`Error::InvalidValue`] when a codec cannot decode a required
/// wire shape.
pub fn decode_row(columns: &Columns, record: &RawRecord) -> Result<Row> {
    let mut row = Row::new();
    for (key, column) in columns.iter() {
        let value = match record.properties.get(column.name()) {
            Some(wire) => column
                .codec()
                .encode(wire)
                .map_err(|source| Error::InvalidValue {
                    key: key.to_string(),
                    source,
                })?,
            None => match column.default_value() {
                Some(default) => default.clone(),
                None if column.is_nullable() => Value::Null,
                None => continue,
            },
        };
        row.insert(key.to_string(), value);
    }
    Ok(row)
}

/// Decodes a raw record into a [`RowEnvelope`].
///
/// # Errors
///
/// See [`decode_row`].
pub fn decode_envelope(columns: &Columns, record: RawRecord) -> Result<RowEnvelope> {
    let data = decode_row(columns, &record)?;
    Ok(RowEnvelope { data, page: record })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::column::{checkbox, created_time, number, select, text, title};

    fn columns() -> Columns {
        Columns::new()
            .column("name", title("Name"))
            .column("notes", text("Notes").optional())
            .column("points", number("Points").default(1))
            .column("stage", select("Stage").nullable().optional())
            .column("created", created_time("Created"))
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn insert_applies_defaults_and_skips_optional() {
        let props = build_insert_properties(&columns(), &row(&[("name", "Task".into())])).unwrap();
        assert_eq!(props["Points"], json!({"number": 1}));
        assert!(!props.contains_key("Notes"));
        assert!(!props.contains_key("Stage"));
        assert!(!props.contains_key("Created"));
        assert_eq!(
            props["Name"],
            json!({"title": [{"type": "text", "text": {"content": "Task"}}]})
        );
    }

    #[test]
    fn insert_requires_required_columns() {
        let err = build_insert_properties(&columns(), &Row::new()).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredColumn { key } if key == "name"));
    }

    #[test]
    fn insert_rejects_unknown_keys() {
        let err = build_insert_properties(
            &columns(),
            &row(&[("name", "A".into()), ("colour", "red".into())]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { key } if key == "colour"));
    }

    #[test]
    fn null_only_for_nullable_columns() {
        let ok = build_insert_properties(
            &columns(),
            &row(&[("name", "A".into()), ("stage", Value::Null)]),
        )
        .unwrap();
        assert_eq!(ok["Stage"], json!({"select": null}));

        let err = build_insert_properties(
            &columns(),
            &row(&[("name", "A".into()), ("notes", Value::Null)]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NullNotAllowed { key } if key == "notes"));
    }

    #[test]
    fn read_only_columns_reject_every_value() {
        for value in [Value::Null, Value::from("2024-01-01"), Value::Int(0), Value::Bool(true)] {
            let insert = build_insert_properties(
                &columns(),
                &row(&[("name", "A".into()), ("created", value.clone())]),
            );
            assert!(matches!(insert, Err(Error::ReadOnlyViolation { .. })));

            let update = build_update_properties(&columns(), &row(&[("created", value)]));
            assert!(matches!(update, Err(Error::ReadOnlyViolation { .. })));
        }
    }

    #[test]
    fn codec_failures_name_the_column() {
        let err = build_insert_properties(
            &columns(),
            &row(&[("name", "A".into()), ("points", "many".into())]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { key, .. } if key == "points"));
    }

    #[test]
    fn update_only_touches_supplied_keys() {
        let props = build_update_properties(&columns(), &row(&[("stage", "Done".into())])).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["Stage"], json!({"select": {"name": "Done"}}));
    }

    #[test]
    fn empty_update_fails() {
        assert!(matches!(
            build_update_properties(&columns(), &Row::new()),
            Err(Error::EmptyUpdate)
        ));
    }

    #[test]
    fn decode_uses_default_then_null() {
        let cols = columns().column("done", checkbox("Done"));
        let mut properties = PropertyMap::new();
        properties.insert("Name".into(), json!({"type": "title", "title": [{"plain_text": "A"}]}));
        let record = RawRecord {
            id: "p1".into(),
            properties,
            ..RawRecord::default()
        };
        let data = decode_row(&cols, &record).unwrap();
        assert_eq!(data["name"], Value::from("A"));
        assert_eq!(data["points"], Value::Int(1));
        assert_eq!(data["stage"], Value::Null);
        assert!(!data.contains_key("notes"));
        assert!(!data.contains_key("done"));
    }

    #[test]
    fn decode_fails_on_malformed_title() {
        let mut properties = PropertyMap::new();
        properties.insert("Name".into(), json!({"type": "title"}));
        let record = RawRecord {
            id: "p1".into(),
            properties,
            ..RawRecord::default()
        };
        assert!(matches!(
            decode_row(&columns(), &record),
            Err(Error::InvalidValue { key, .. }) if key == "name"
        ));
    }

    #[test]
    fn envelope_parses_into_struct() {
        #[derive(Deserialize)]
        struct Task {
            name: String,
            points: i64,
        }
        let envelope = RowEnvelope {
            data: row(&[("name", "A".into()), ("points", Value::Int(3))]),
            page: RawRecord::default(),
        };
        let task: Task = envelope.parse_data().unwrap();
        assert_eq!(task.name, "A");
        assert_eq!(task.points, 3);
    }
}
