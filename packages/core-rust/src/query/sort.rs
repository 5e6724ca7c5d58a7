//! Sort descriptors.

use serde::{Deserialize, Serialize};

use super::predicate::ColumnRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort on one property. Serializes in the remote's sort shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub property: String,
    pub direction: SortDirection,
}

#[must_use]
pub fn asc(column: impl Into<ColumnRef>) -> Sort {
    Sort {
        property: column.into().name,
        direction: SortDirection::Ascending,
    }
}

#[must_use]
pub fn desc(column: impl Into<ColumnRef>) -> Sort {
    Sort {
        property: column.into().name,
        direction: SortDirection::Descending,
    }
}

/// One or more sorts, applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderBy(pub Vec<Sort>);

impl OrderBy {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Sort> for OrderBy {
    fn from(sort: Sort) -> Self {
        Self(vec![sort])
    }
}

impl From<Vec<Sort>> for OrderBy {
    fn from(sorts: Vec<Sort>) -> Self {
        Self(sorts)
    }
}

impl<const N: usize> From<[Sort; N]> for OrderBy {
    fn from(sorts: [Sort; N]) -> Self {
        Self(sorts.into())
    }
}
