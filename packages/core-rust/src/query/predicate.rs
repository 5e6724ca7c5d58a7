//! Typed filter expressions over table columns.
//!
//! Builders perform no validation; legality and value normalization are
//! checked when a predicate is compiled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnDef};
use crate::property::PropertyType;
use crate::value::Value;

/// Comparison operator of a [`Predicate::Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Neq,
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Neq => "neq",
            ComparisonOp::Contains => "contains",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Gte => "gte",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Lte => "lte",
        }
    }

    /// Whether this is one of the ordering operators (`gt`, `gte`, `lt`, `lte`).
    #[must_use]
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            ComparisonOp::Gt | ComparisonOp::Gte | ComparisonOp::Lt | ComparisonOp::Lte
        )
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean combinator of a [`Predicate::Compound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompoundOp {
    And,
    Or,
}

impl CompoundOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompoundOp::And => "and",
            CompoundOp::Or => "or",
        }
    }
}

/// The wire name and property type of the column a predicate targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub name: String,
    pub property_type: PropertyType,
}

impl ColumnRef {
    #[must_use]
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
        }
    }
}

impl From<&ColumnDef> for ColumnRef {
    fn from(column: &ColumnDef) -> Self {
        Self::new(column.name(), column.property_type())
    }
}

impl From<ColumnDef> for ColumnRef {
    fn from(column: ColumnDef) -> Self {
        Self::from(&column)
    }
}

impl<K> From<&Column<K>> for ColumnRef {
    fn from(column: &Column<K>) -> Self {
        Self::from(column.def())
    }
}

/// Filter expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison {
        op: ComparisonOp,
        column: ColumnRef,
        value: Value,
    },
    NullCheck {
        column: ColumnRef,
        is_null: bool,
    },
    Compound {
        op: CompoundOp,
        predicates: Vec<Predicate>,
    },
}

fn comparison(op: ComparisonOp, column: impl Into<ColumnRef>, value: impl Into<Value>) -> Predicate {
    Predicate::Comparison {
        op,
        column: column.into(),
        value: value.into(),
    }
}

#[must_use]
pub fn eq(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Predicate {
    comparison(ComparisonOp::Eq, column, value)
}

#[must_use]
pub fn neq(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Predicate {
    comparison(ComparisonOp::Neq, column, value)
}

/// Substring match for text columns, membership for list-valued columns.
#[must_use]
pub fn contains(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Predicate {
    comparison(ComparisonOp::Contains, column, value)
}

#[must_use]
pub fn gt(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Predicate {
    comparison(ComparisonOp::Gt, column, value)
}

#[must_use]
pub fn gte(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Predicate {
    comparison(ComparisonOp::Gte, column, value)
}

#[must_use]
pub fn lt(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Predicate {
    comparison(ComparisonOp::Lt, column, value)
}

#[must_use]
pub fn lte(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Predicate {
    comparison(ComparisonOp::Lte, column, value)
}

#[must_use]
pub fn is_null(column: impl Into<ColumnRef>) -> Predicate {
    Predicate::NullCheck {
        column: column.into(),
        is_null: true,
    }
}

#[must_use]
pub fn is_not_null(column: impl Into<ColumnRef>) -> Predicate {
    Predicate::NullCheck {
        column: column.into(),
        is_null: false,
    }
}

#[must_use]
pub fn and(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Compound {
        op: CompoundOp::And,
        predicates: predicates.into_iter().collect(),
    }
}

#[must_use]
pub fn or(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Compound {
        op: CompoundOp::Or,
        predicates: predicates.into_iter().collect(),
    }
}
