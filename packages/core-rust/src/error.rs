//! Error types for column validation, query compilation and remote calls.

use crate::property::PropertyType;

/// Convenience alias used throughout the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure raised by a codec while parsing or decoding a single value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("{0}")]
    Rejected(String),
    #[error("{0} properties are read-only")]
    ReadOnly(PropertyType),
    #[error("malformed wire value: {0}")]
    Malformed(String),
}

/// Errors surfaced by table definition, row operations, query compilation
/// and relation management.
///
/// Every variant except [`Error::Remote`] is raised locally before any
/// remote call is issued.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("column `{column}` does not match remote property `{property}`: expected {expected}, found {}", .found.as_deref().unwrap_or("no such property"))]
    SchemaMismatch {
        column: String,
        property: String,
        expected: PropertyType,
        found: Option<String>,
    },
    #[error("unknown column `{key}`")]
    UnknownColumn { key: String },
    #[error("missing required column `{key}`")]
    MissingRequiredColumn { key: String },
    #[error("column `{key}` is not nullable")]
    NullNotAllowed { key: String },
    #[error("column `{key}` is read-only")]
    ReadOnlyViolation { key: String },
    #[error("invalid value for column `{key}`: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: CodecError,
    },
    #[error("update must change at least one column")]
    EmptyUpdate,
    #[error("operator `{operator}` is not supported for {property_type} property `{property}`")]
    UnsupportedOperator {
        operator: &'static str,
        property: String,
        property_type: PropertyType,
    },
    #[error("invalid filter value for property `{property}`: {reason}")]
    InvalidFilterValue { property: String, reason: String },
    #[error("`{operator}` requires at least one predicate")]
    EmptyCompound { operator: &'static str },
    #[error("no rows matched the update target")]
    NoTargetsResolved,
    #[error("cannot link `{source_table}` to `{target_table}`: tables use different store clients")]
    CrossWorkspaceLink {
        source_table: String,
        target_table: String,
    },
    #[error("column `{key}` is not a relation")]
    NotARelation { key: String },
    #[error("relation column `{key}` has no registered target table")]
    RelationNotRegistered { key: String },
    #[error("{context}")]
    Remote {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Whether the error came from the remote store rather than local validation.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Remote { .. })
    }
}

/// Attaches operation context to remote-store failures.
pub trait RemoteContext<T> {
    /// Wraps an error into [`Error::Remote`] with a lazily built message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] when `self` is an error.
    fn remote_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> RemoteContext<T> for anyhow::Result<T> {
    fn remote_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| Error::Remote {
            context: context(),
            source,
        })
    }
}
