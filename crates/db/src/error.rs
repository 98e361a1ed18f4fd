//! Error types for the data-access layer.

use crate::builder::QueryBuildError;
use crate::cache::CacheError;

/// Errors returned by cached row stores.
///
/// [`ModelError::NotFound`] is the only "does not exist" signal callers
/// need to branch on: a missing row, a soft-deleted row, a cached
/// not-found placeholder and sqlx's `RowNotFound` all map to it. Every
/// other variant is an infrastructure failure.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Row not found")]
    NotFound,

    #[error("Query build error: {0}")]
    QueryBuild(#[from] QueryBuildError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// A session was used after its transaction committed or rolled back.
    #[error("Transaction already closed")]
    TransactionClosed,
}

impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ModelError::NotFound,
            other => ModelError::Database(other),
        }
    }
}

impl ModelError {
    /// Whether this error means the row is logically absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound)
    }
}
