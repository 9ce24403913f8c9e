//! # hubcore-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `StorageService` and `KeyValueBackend` ports of
//!   `hubcore-app::ports::storage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//!
//! Every namespace lives in the single `storage_entries` table, keyed by
//! `(namespace, key)`. Values are the already encoded `tag@@@json` records;
//! this crate never looks inside them.
//!
//! ## Dependency rule
//! Depends on `hubcore-app` (for port traits) and `hubcore-domain` (for the
//! error type). The `app` and `domain` crates must never reference this
//! adapter.

pub mod error;
pub mod pool;
pub mod storage;

pub use pool::{Config, Database};
pub use storage::{SqliteNamespace, SqliteStorageService};
