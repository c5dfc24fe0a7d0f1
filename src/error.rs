use thiserror::Error;

/// Errors returned by the hierarchy APIs.
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("sea-hierarchy currently supports PostgreSQL connections only")]
    UnsupportedBackend,

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("referenced parent node does not exist")]
    InvalidParent,

    #[error("new parent is the node itself or one of its descendants")]
    CyclicParent,

    #[error("node not found")]
    NotFound,

    #[error("hierarchy is corrupt: {0}")]
    CorruptHierarchy(String),

    #[error("transaction aborted: {0}")]
    TransactionAborted(#[source] sea_orm::DbErr),

    #[error("path cannot be empty")]
    EmptyPath,

    #[error("hierarchy invariant violation: {0}")]
    Invariant(String),
}

impl HierarchyError {
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::Invariant(detail.into())
    }

    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptHierarchy(detail.into())
    }

    /// Reclassify a storage failure observed inside an open transaction.
    ///
    /// Validation errors pass through untouched so callers can still match on
    /// them after the rollback.
    pub(crate) fn into_aborted(self) -> Self {
        match self {
            Self::Database(err) => Self::TransactionAborted(err),
            other => other,
        }
    }
}
