//! Predicate algebra and its compiler.
//!
//! ```
//! use docorm_core::column::{number, select};
//! use docorm_core::query::{and, compile_filter, gt, is_null};
//!
//! let filter = and([gt(&number("Points"), 5), is_null(&select("Stage"))]);
//! let wire = compile_filter(&filter).unwrap();
//! assert_eq!(wire["and"][0]["number"]["greater_than"], 5);
//! ```

pub mod compile;
pub mod predicate;
pub mod sort;

pub use compile::{compile_filter, compile_sorts, null_check_supported, operator_supported};
pub use predicate::{
    and, contains, eq, gt, gte, is_not_null, is_null, lt, lte, neq, or, ColumnRef, ComparisonOp,
    CompoundOp, Predicate,
};
pub use sort::{asc, desc, OrderBy, Sort, SortDirection};
