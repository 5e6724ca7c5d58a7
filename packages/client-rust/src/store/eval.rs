//! Evaluation of the remote filter and sort grammar against stored records.
//!
//! Mirrors what the remote does for the subset of conditions the query
//! compiler emits, plus `does_not_contain` and timestamp sorts.

use std::cmp::Ordering;

use anyhow::{anyhow, bail};
use docorm_core::codec::declared_type_key;
use docorm_core::RawRecord;
use serde_json::Value as JsonValue;

/// Comparable projection of one property value.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}

impl Cell {
    fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            Cell::List(items) => items.is_empty(),
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }

    fn compare(&self, other: &Cell) -> Option<Ordering> {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.partial_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => Some(a.cmp(b)),
            (Cell::Bool(a), Cell::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn text_of(rich_text: Option<&JsonValue>) -> String {
    rich_text
        .and_then(JsonValue::as_array)
        .map(|segments| {
            segments
                .iter()
                .filter_map(|s| {
                    s.get("plain_text")
                        .or_else(|| s.get("text").and_then(|t| t.get("content")))
                        .and_then(JsonValue::as_str)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn names_of(items: Option<&JsonValue>, field: &str) -> Vec<String> {
    items
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get(field).and_then(JsonValue::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn string_cell(value: Option<&JsonValue>) -> Cell {
    value
        .and_then(JsonValue::as_str)
        .map_or(Cell::Empty, |s| Cell::Text(s.to_string()))
}

/// Projects the property object stored under `wire_key`.
fn cell_of(property: &JsonValue, wire_key: &str) -> Cell {
    let inner = property.get(wire_key).filter(|v| !v.is_null());
    match wire_key {
        "title" | "rich_text" => Cell::Text(text_of(inner)),
        "number" => inner
            .and_then(JsonValue::as_f64)
            .map_or(Cell::Empty, Cell::Number),
        "checkbox" => Cell::Bool(inner.and_then(JsonValue::as_bool).unwrap_or(false)),
        "date" => string_cell(inner.and_then(|d| d.get("start"))),
        "select" | "status" => string_cell(inner.and_then(|s| s.get("name"))),
        "multi_select" => Cell::List(names_of(inner, "name")),
        "people" | "relation" => Cell::List(names_of(inner, "id")),
        "files" => Cell::List(names_of(inner, "name")),
        "created_by" | "last_edited_by" => Cell::List(
            inner
                .and_then(|u| u.get("id"))
                .and_then(JsonValue::as_str)
                .map(|id| vec![id.to_string()])
                .unwrap_or_default(),
        ),
        "unique_id" => inner
            .and_then(|u| u.get("number"))
            .and_then(JsonValue::as_f64)
            .map_or(Cell::Empty, Cell::Number),
        _ => string_cell(inner),
    }
}

fn operand_cell(operand: &JsonValue) -> Cell {
    match operand {
        JsonValue::Number(n) => n.as_f64().map_or(Cell::Empty, Cell::Number),
        JsonValue::String(s) => Cell::Text(s.clone()),
        JsonValue::Bool(b) => Cell::Bool(*b),
        _ => Cell::Empty,
    }
}

fn contains(cell: &Cell, operand: &JsonValue) -> bool {
    let Some(needle) = operand.as_str() else {
        return false;
    };
    match cell {
        Cell::Text(s) => s.to_lowercase().contains(&needle.to_lowercase()),
        Cell::List(items) => items.iter().any(|i| i == needle),
        _ => false,
    }
}

fn condition_holds(cell: &Cell, condition: &str, operand: &JsonValue) -> anyhow::Result<bool> {
    let ordering = || cell.compare(&operand_cell(operand));
    Ok(match condition {
        "equals" => *cell == operand_cell(operand),
        "does_not_equal" => *cell != operand_cell(operand),
        "contains" => contains(cell, operand),
        "does_not_contain" => !contains(cell, operand),
        "is_empty" => cell.is_empty(),
        "is_not_empty" => !cell.is_empty(),
        "greater_than" | "after" => ordering() == Some(Ordering::Greater),
        "greater_than_or_equal_to" | "on_or_after" => {
            matches!(ordering(), Some(Ordering::Greater | Ordering::Equal))
        }
        "less_than" | "before" => ordering() == Some(Ordering::Less),
        "less_than_or_equal_to" | "on_or_before" => {
            matches!(ordering(), Some(Ordering::Less | Ordering::Equal))
        }
        other => bail!("unsupported filter condition `{other}`"),
    })
}

/// Whether `record` satisfies `filter`.
///
/// # Errors
///
/// Returns an error for filter shapes or conditions the store does not know.
pub(crate) fn matches(filter: &JsonValue, record: &RawRecord) -> anyhow::Result<bool> {
    if let Some(children) = filter.get("and").and_then(JsonValue::as_array) {
        for child in children {
            if !matches(child, record)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    if let Some(children) = filter.get("or").and_then(JsonValue::as_array) {
        for child in children {
            if matches(child, record)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    let property = filter
        .get("property")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| anyhow!("filter is missing `property`: {filter}"))?;
    let wire_key = declared_type_key(filter)
        .ok_or_else(|| anyhow!("filter on `{property}` names no property type"))?;
    let conditions = filter
        .get(wire_key)
        .and_then(JsonValue::as_object)
        .ok_or_else(|| anyhow!("filter on `{property}` has no condition object"))?;

    let cell = record
        .properties
        .get(property)
        .map_or(Cell::Empty, |p| cell_of(p, wire_key));
    for (condition, operand) in conditions {
        if !condition_holds(&cell, condition, operand)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sort_cell(sort: &JsonValue, record: &RawRecord) -> Cell {
    if let Some(timestamp) = sort.get("timestamp").and_then(JsonValue::as_str) {
        let value = match timestamp {
            "created_time" => record.created_time.as_deref(),
            _ => record.last_edited_time.as_deref(),
        };
        return value.map_or(Cell::Empty, |s| Cell::Text(s.to_string()));
    }
    let Some(property) = sort
        .get("property")
        .and_then(JsonValue::as_str)
        .and_then(|name| record.properties.get(name))
    else {
        return Cell::Empty;
    };
    declared_type_key(property).map_or(Cell::Empty, |key| cell_of(property, key))
}

/// Stable sort of `records` by a remote sort list. Empty values sort last.
pub(crate) fn sort_records(records: &mut [RawRecord], sorts: &JsonValue) {
    let Some(sorts) = sorts.as_array() else {
        return;
    };
    records.sort_by(|a, b| {
        for sort in sorts {
            let descending = sort.get("direction").and_then(JsonValue::as_str) == Some("descending");
            let (left, right) = (sort_cell(sort, a), sort_cell(sort, b));
            let ordering = match (left.is_empty(), right.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let ord = left.compare(&right).unwrap_or(Ordering::Equal);
                    if descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
