//! # hubcore-app
//!
//! Application layer — **port definitions** (traits) and the in-process
//! machinery built on them.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement (driven/outbound ports):
//!   - `KeyValueBackend` / `StorageService` — raw durable key-value namespaces
//!   - `StartLevelService` — current system start level
//! - Provide the **typed storage** layer (type-tagged polymorphic encoding)
//!   and an in-memory backend
//! - Provide the **event bus**, **provider/registry** aggregation and the
//!   **managed provider** that keeps storage and memory in step
//! - Run **trigger modules** and the **rule engine** that activates them
//! - Expose rule and metadata **services** for callers
//!
//! ## Dependency rule
//! Depends on `hubcore-domain` only (plus `tokio::sync` and `parking_lot` for
//! locking). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod event_bus;
pub mod managed_provider;
pub mod ports;
pub mod registry;
pub mod rule_engine;
pub mod services;
pub mod start_level;
pub mod storage;
pub mod trigger;
