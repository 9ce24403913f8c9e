//! `SQLite` connection pool setup and migration runner.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::SqliteStorageError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the `SQLite` storage adapter.
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:hubcore.db` or `sqlite::memory:`).
    pub database_url: String,
}

impl Config {
    /// Build a [`Database`] from this configuration.
    ///
    /// Creates the connection pool, creates the database file if missing,
    /// and runs all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStorageError`] if the connection or migrations fail.
    pub async fn build(self) -> Result<Database, SqliteStorageError> {
        Database::initialize(&self.database_url).await
    }
}

/// Whether `url` names a private in-memory database.
fn is_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Holds the `SQLite` connection pool and provides access to it.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database and run migrations.
    ///
    /// An in-memory database exists once per connection, so it gets a pool
    /// of exactly one.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStorageError`] if the connection or migrations fail.
    async fn initialize(database_url: &str) -> Result<Self, SqliteStorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = if is_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?
        } else {
            let options = options
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(BUSY_TIMEOUT);
            SqlitePoolOptions::new().connect_with(options).await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(url = %database_url, "sqlite storage ready");

        Ok(Self { pool })
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
