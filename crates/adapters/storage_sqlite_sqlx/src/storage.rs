//! `SQLite` implementation of [`StorageService`] and [`KeyValueBackend`].

use std::future::Future;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use hubcore_app::ports::{KeyValueBackend, StorageService};
use hubcore_domain::error::HubError;

use crate::error::SqliteStorageError;

const SELECT_VALUE: &str = "SELECT value FROM storage_entries WHERE namespace = ? AND key = ?";
const UPSERT: &str = "INSERT INTO storage_entries (namespace, key, value) VALUES (?, ?, ?) \
     ON CONFLICT (namespace, key) DO UPDATE SET value = excluded.value";
const DELETE_RETURNING: &str =
    "DELETE FROM storage_entries WHERE namespace = ? AND key = ? RETURNING value";
const SELECT_KEYS: &str = "SELECT key FROM storage_entries WHERE namespace = ? ORDER BY key";
const SELECT_ENTRIES: &str =
    "SELECT key, value FROM storage_entries WHERE namespace = ? ORDER BY key";
const DELETE_NAMESPACE: &str = "DELETE FROM storage_entries WHERE namespace = ?";

/// Opens namespaces stored in one `SQLite` database.
#[derive(Clone)]
pub struct SqliteStorageService {
    pool: SqlitePool,
    writes: Arc<Mutex<()>>,
}

impl SqliteStorageService {
    /// Create a new service using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writes: Arc::new(Mutex::new(())),
        }
    }
}

impl StorageService for SqliteStorageService {
    type Backend = SqliteNamespace;

    fn open(&self, name: &str) -> impl Future<Output = Result<SqliteNamespace, HubError>> + Send {
        let namespace = SqliteNamespace {
            pool: self.pool.clone(),
            name: name.to_string(),
            writes: Arc::clone(&self.writes),
        };
        async { Ok(namespace) }
    }
}

/// One namespace of a [`SqliteStorageService`].
///
/// Every write of every namespace of a service runs under one lock, so no
/// other write can commit between the read and the upsert of a `put`.
#[derive(Clone)]
pub struct SqliteNamespace {
    pool: SqlitePool,
    name: String,
    writes: Arc<Mutex<()>>,
}

impl KeyValueBackend for SqliteNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(
        &self,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<Option<String>, HubError>> + Send {
        let pool = self.pool.clone();
        let writes = Arc::clone(&self.writes);
        let namespace = self.name.clone();
        let key = key.to_string();
        async move {
            let _writes = writes.lock().await;
            let mut tx = pool.begin().await.map_err(SqliteStorageError::from)?;

            let previous: Option<(String,)> = sqlx::query_as(SELECT_VALUE)
                .bind(&namespace)
                .bind(&key)
                .fetch_optional(&mut *tx)
                .await
                .map_err(SqliteStorageError::from)?;

            sqlx::query(UPSERT)
                .bind(&namespace)
                .bind(&key)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(SqliteStorageError::from)?;

            tx.commit().await.map_err(SqliteStorageError::from)?;
            Ok(previous.map(|row| row.0))
        }
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<Option<String>, HubError>> + Send {
        let pool = self.pool.clone();
        let writes = Arc::clone(&self.writes);
        let namespace = self.name.clone();
        let key = key.to_string();
        async move {
            let _writes = writes.lock().await;
            let removed: Option<(String,)> = sqlx::query_as(DELETE_RETURNING)
                .bind(&namespace)
                .bind(&key)
                .fetch_optional(&pool)
                .await
                .map_err(SqliteStorageError::from)?;

            Ok(removed.map(|row| row.0))
        }
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, HubError>> + Send {
        let pool = self.pool.clone();
        let namespace = self.name.clone();
        let key = key.to_string();
        async move {
            let row: Option<(String,)> = sqlx::query_as(SELECT_VALUE)
                .bind(&namespace)
                .bind(&key)
                .fetch_optional(&pool)
                .await
                .map_err(SqliteStorageError::from)?;

            Ok(row.map(|row| row.0))
        }
    }

    fn contains_key(&self, key: &str) -> impl Future<Output = Result<bool, HubError>> + Send {
        let value = self.get(key);
        async move { Ok(value.await?.is_some()) }
    }

    fn keys(&self) -> impl Future<Output = Result<Vec<String>, HubError>> + Send {
        let pool = self.pool.clone();
        let namespace = self.name.clone();
        async move {
            let rows: Vec<(String,)> = sqlx::query_as(SELECT_KEYS)
                .bind(&namespace)
                .fetch_all(&pool)
                .await
                .map_err(SqliteStorageError::from)?;

            Ok(rows.into_iter().map(|row| row.0).collect())
        }
    }

    fn entries(&self) -> impl Future<Output = Result<Vec<(String, String)>, HubError>> + Send {
        let pool = self.pool.clone();
        let namespace = self.name.clone();
        async move {
            let rows: Vec<(String, String)> = sqlx::query_as(SELECT_ENTRIES)
                .bind(&namespace)
                .fetch_all(&pool)
                .await
                .map_err(SqliteStorageError::from)?;

            Ok(rows)
        }
    }

    fn clear(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        let pool = self.pool.clone();
        let writes = Arc::clone(&self.writes);
        let namespace = self.name.clone();
        async move {
            let _writes = writes.lock().await;
            let result = sqlx::query(DELETE_NAMESPACE)
                .bind(&namespace)
                .execute(&pool)
                .await
                .map_err(SqliteStorageError::from)?;

            tracing::debug!(
                storage = %namespace,
                removed = result.rows_affected(),
                "namespace cleared"
            );
            Ok(())
        }
    }
}
