//! Lowering of predicates and sorts to the remote query grammar.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value as JsonValue};

use super::predicate::{ColumnRef, ComparisonOp, Predicate};
use super::sort::OrderBy;
use crate::error::{Error, Result};
use crate::property::PropertyType;
use crate::value::Value;

static UNIQUE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+-(\d+)$").expect("valid unique id regex"));

/// Whether `op` may be applied to a column of type `ty`.
#[must_use]
pub fn operator_supported(op: ComparisonOp, ty: PropertyType) -> bool {
    use PropertyType as P;
    match op {
        ComparisonOp::Eq | ComparisonOp::Neq => matches!(
            ty,
            P::Title
                | P::RichText
                | P::Number
                | P::Checkbox
                | P::Date
                | P::Url
                | P::Email
                | P::PhoneNumber
                | P::Select
                | P::Status
                | P::UniqueId
                | P::CreatedTime
                | P::LastEditedTime
        ),
        ComparisonOp::Contains => matches!(
            ty,
            P::Title | P::RichText | P::MultiSelect | P::People | P::CreatedBy | P::LastEditedBy
        ),
        ComparisonOp::Gt | ComparisonOp::Gte | ComparisonOp::Lt | ComparisonOp::Lte => {
            ty.is_date_like() || ty.is_numeric()
        }
    }
}

/// Whether `is_empty`/`is_not_empty` may be applied to a column of type `ty`.
#[must_use]
pub fn null_check_supported(ty: PropertyType) -> bool {
    !matches!(ty, PropertyType::Checkbox | PropertyType::UniqueId)
}

/// Compiles a predicate into a remote filter object.
///
/// # Errors
///
/// Returns [`Error::UnsupportedOperator`] for an illegal operator/type pair,
/// [`Error::InvalidFilterValue`] when a comparison value cannot be
/// normalized, and [`Error::EmptyCompound`] for an `and`/`or` without
/// children.
pub fn compile_filter(predicate: &Predicate) -> Result<JsonValue> {
    match predicate {
        Predicate::Comparison { op, column, value } => compile_comparison(*op, column, value),
        Predicate::NullCheck { column, is_null } => {
            if !null_check_supported(column.property_type) {
                return Err(unsupported(
                    if *is_null { "is_null" } else { "is_not_null" },
                    column,
                ));
            }
            let condition = if *is_null { "is_empty" } else { "is_not_empty" };
            Ok(json!({
                "property": column.name,
                column.property_type.wire_key(): { condition: true }
            }))
        }
        Predicate::Compound { op, predicates } => {
            if predicates.is_empty() {
                return Err(Error::EmptyCompound {
                    operator: op.as_str(),
                });
            }
            let children = predicates
                .iter()
                .map(compile_filter)
                .collect::<Result<Vec<_>>>()?;
            Ok(json!({ op.as_str(): children }))
        }
    }
}

/// Compiles sorts into the remote's sort list.
#[must_use]
pub fn compile_sorts(order_by: &OrderBy) -> JsonValue {
    JsonValue::Array(
        order_by
            .0
            .iter()
            .map(|sort| json!({"property": sort.property, "direction": sort.direction}))
            .collect(),
    )
}

fn unsupported(operator: &'static str, column: &ColumnRef) -> Error {
    Error::UnsupportedOperator {
        operator,
        property: column.name.clone(),
        property_type: column.property_type,
    }
}

fn invalid(column: &ColumnRef, reason: impl Into<String>) -> Error {
    Error::InvalidFilterValue {
        property: column.name.clone(),
        reason: reason.into(),
    }
}

fn compile_comparison(op: ComparisonOp, column: &ColumnRef, value: &Value) -> Result<JsonValue> {
    let ty = column.property_type;
    if !operator_supported(op, ty) {
        return Err(unsupported(op.as_str(), column));
    }
    let condition = condition_key(op, ty);
    let operand = normalize(column, value)?;
    Ok(json!({
        "property": column.name,
        ty.wire_key(): { condition: operand }
    }))
}

fn condition_key(op: ComparisonOp, ty: PropertyType) -> &'static str {
    let dated = ty.is_date_like();
    match op {
        ComparisonOp::Eq => "equals",
        ComparisonOp::Neq => "does_not_equal",
        ComparisonOp::Contains => "contains",
        ComparisonOp::Gt if dated => "after",
        ComparisonOp::Gte if dated => "on_or_after",
        ComparisonOp::Lt if dated => "before",
        ComparisonOp::Lte if dated => "on_or_before",
        ComparisonOp::Gt => "greater_than",
        ComparisonOp::Gte => "greater_than_or_equal_to",
        ComparisonOp::Lt => "less_than",
        ComparisonOp::Lte => "less_than_or_equal_to",
    }
}

/// Extracts a string from a bare string or a map carrying `field`.
fn named<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    match value {
        Value::String(s) => Some(s),
        Value::Map(map) => map.get(field).and_then(Value::as_str),
        _ => None,
    }
}

fn normalize(column: &ColumnRef, value: &Value) -> Result<JsonValue> {
    use PropertyType as P;
    match column.property_type {
        P::Number => match value {
            Value::Int(n) => Ok(json!(n)),
            Value::Float(f) if f.is_finite() => Ok(json!(f)),
            other => Err(invalid(column, format!("expected a finite number, got {}", other.kind()))),
        },
        P::Checkbox => value
            .as_bool()
            .map(JsonValue::Bool)
            .ok_or_else(|| invalid(column, format!("expected a boolean, got {}", value.kind()))),
        P::Date | P::CreatedTime | P::LastEditedTime => named(value, "start")
            .map(|s| json!(s))
            .ok_or_else(|| invalid(column, "expected a date string or {start}")),
        P::Select | P::Status | P::MultiSelect => named(value, "name")
            .map(|s| json!(s))
            .ok_or_else(|| invalid(column, "expected an option name or {name}")),
        P::People | P::CreatedBy | P::LastEditedBy => named(value, "id")
            .map(|s| json!(s))
            .ok_or_else(|| invalid(column, "expected a user id or {id}")),
        P::UniqueId => unique_id_number(value)
            .map(|n| json!(n))
            .ok_or_else(|| invalid(column, "expected a number or \"PREFIX-<digits>\"")),
        P::Title | P::RichText | P::Url | P::Email | P::PhoneNumber => value
            .as_str()
            .map(|s| json!(s))
            .ok_or_else(|| invalid(column, format!("expected a string, got {}", value.kind()))),
        // Filtering on files/relation is rejected by `operator_supported`.
        P::Files | P::Relation => Err(invalid(column, "property type is not filterable")),
    }
}

fn unique_id_number(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => UNIQUE_ID_RE
            .captures(s.trim())
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        other => other.as_i64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{
        checkbox, created_by, date, multi_select, number, people, relation, select, text, title,
        unique_id,
    };
    use crate::query::predicate::{and, contains, eq, gt, gte, is_not_null, is_null, lt, neq, or};
    use crate::query::sort::{asc, desc};

    #[test]
    fn compound_filter_lowers_each_child() {
        let filter = and([
            contains(&title("Title"), "Hello"),
            gt(&number("Points"), 5),
            is_null(&select("Stage")),
        ]);
        assert_eq!(
            compile_filter(&filter).unwrap(),
            json!({"and": [
                {"property": "Title", "title": {"contains": "Hello"}},
                {"property": "Points", "number": {"greater_than": 5}},
                {"property": "Stage", "select": {"is_empty": true}}
            ]})
        );
    }

    #[test]
    fn numeric_ordering_operator() {
        assert_eq!(
            compile_filter(&gt(&number("Points"), 10)).unwrap(),
            json!({"property": "Points", "number": {"greater_than": 10}})
        );
        assert_eq!(
            compile_filter(&lt(&number("Points"), 2.5)).unwrap(),
            json!({"property": "Points", "number": {"less_than": 2.5}})
        );
    }

    #[test]
    fn date_ordering_uses_calendar_keys() {
        assert_eq!(
            compile_filter(&gte(&date("Due"), "2024-05-01")).unwrap(),
            json!({"property": "Due", "date": {"on_or_after": "2024-05-01"}})
        );
        let start = Value::map([("start", "2024-05-01")]);
        assert_eq!(
            compile_filter(&lt(&date("Due"), start)).unwrap(),
            json!({"property": "Due", "date": {"before": "2024-05-01"}})
        );
    }

    #[test]
    fn illegal_operator_fails() {
        let err = compile_filter(&gt(&title("Title"), "a")).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOperator { operator: "gt", property_type: PropertyType::Title, .. }
        ));
        assert!(compile_filter(&contains(&number("Points"), 1)).is_err());
        assert!(compile_filter(&eq(&relation("Parent"), "x")).is_err());
        assert!(compile_filter(&is_null(&checkbox("Done"))).is_err());
        assert!(compile_filter(&is_not_null(&unique_id("ID"))).is_err());
    }

    #[test]
    fn legality_table() {
        for ty in PropertyType::ALL {
            let ordering = operator_supported(ComparisonOp::Gt, ty);
            assert_eq!(ordering, ty.is_numeric() || ty.is_date_like(), "{ty}");
            if ty.is_attribution() {
                assert!(operator_supported(ComparisonOp::Contains, ty), "{ty}");
                assert!(!operator_supported(ComparisonOp::Eq, ty), "{ty}");
            }
        }
        assert!(!operator_supported(ComparisonOp::Eq, PropertyType::MultiSelect));
        assert!(!null_check_supported(PropertyType::Checkbox));
        assert!(null_check_supported(PropertyType::Relation));
    }

    #[test]
    fn unique_id_values_normalize_to_numbers() {
        let id = unique_id("ID").prefix("TASK");
        assert_eq!(
            compile_filter(&eq(&id, "TASK-42")).unwrap(),
            json!({"property": "ID", "unique_id": {"equals": 42}})
        );
        assert_eq!(
            compile_filter(&gt(&id, 7)).unwrap(),
            json!({"property": "ID", "unique_id": {"greater_than": 7}})
        );
        assert!(matches!(
            compile_filter(&eq(&id, "TASK")),
            Err(Error::InvalidFilterValue { .. })
        ));
    }

    #[test]
    fn choice_and_people_values_accept_objects() {
        assert_eq!(
            compile_filter(&neq(&select("Stage"), Value::map([("name", "Done")]))).unwrap(),
            json!({"property": "Stage", "select": {"does_not_equal": "Done"}})
        );
        assert_eq!(
            compile_filter(&contains(&multi_select("Tags"), "urgent")).unwrap(),
            json!({"property": "Tags", "multi_select": {"contains": "urgent"}})
        );
        assert_eq!(
            compile_filter(&contains(&people("Owner"), Value::map([("id", "u1")]))).unwrap(),
            json!({"property": "Owner", "people": {"contains": "u1"}})
        );
        assert_eq!(
            compile_filter(&contains(&created_by("Author"), "u2")).unwrap(),
            json!({"property": "Author", "created_by": {"contains": "u2"}})
        );
    }

    #[test]
    fn value_type_mismatches_fail() {
        assert!(matches!(
            compile_filter(&eq(&number("Points"), "five")),
            Err(Error::InvalidFilterValue { property, .. }) if property == "Points"
        ));
        assert!(compile_filter(&eq(&number("Points"), f64::NAN)).is_err());
        assert!(compile_filter(&eq(&checkbox("Done"), "yes")).is_err());
        assert!(compile_filter(&eq(&text("Notes"), 3)).is_err());
        assert_eq!(
            compile_filter(&eq(&checkbox("Done"), true)).unwrap(),
            json!({"property": "Done", "checkbox": {"equals": true}})
        );
    }

    #[test]
    fn empty_compound_fails() {
        assert!(matches!(
            compile_filter(&or([])),
            Err(Error::EmptyCompound { operator: "or" })
        ));
        let nested = and([eq(&text("Notes"), "x"), and([])]);
        assert!(matches!(
            compile_filter(&nested),
            Err(Error::EmptyCompound { operator: "and" })
        ));
    }

    #[test]
    fn sorts_compile_to_list() {
        assert_eq!(
            compile_sorts(&desc(&number("Points")).into()),
            json!([{"property": "Points", "direction": "descending"}])
        );
        assert_eq!(
            compile_sorts(&vec![asc(&title("Name")), desc(&date("Due"))].into()),
            json!([
                {"property": "Name", "direction": "ascending"},
                {"property": "Due", "direction": "descending"}
            ])
        );
    }
}
