//! Storage-specific error type wrapping sqlx errors.

use hubcore_domain::error::HubError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum SqliteStorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<SqliteStorageError> for HubError {
    fn from(err: SqliteStorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
