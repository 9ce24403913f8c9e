//! Storage port — raw key-value namespaces.
//!
//! A backend stores opaque strings under string keys inside one named
//! namespace. Encoding and the namespace lifecycle live in
//! [`crate::storage::Storage`]; backends only move text.

use std::future::Future;

use hubcore_domain::error::HubError;

/// One namespace of a durable key-value store.
///
/// Every mutating call commits before its future resolves.
pub trait KeyValueBackend: Send + Sync {
    /// Name of the namespace.
    fn name(&self) -> &str;

    /// Store `value` under `key`, returning the previous value.
    fn put(
        &self,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<Option<String>, HubError>> + Send;

    /// Remove `key`, returning the removed value.
    fn remove(&self, key: &str) -> impl Future<Output = Result<Option<String>, HubError>> + Send;

    /// Read the value under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, HubError>> + Send;

    /// Whether `key` is present.
    fn contains_key(&self, key: &str) -> impl Future<Output = Result<bool, HubError>> + Send;

    /// Every key of the namespace.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>, HubError>> + Send;

    /// Every `(key, value)` pair of the namespace, ordered by key.
    fn entries(&self) -> impl Future<Output = Result<Vec<(String, String)>, HubError>> + Send;

    /// Drop every entry of the namespace.
    fn clear(&self) -> impl Future<Output = Result<(), HubError>> + Send;
}

/// Opens namespaces of one physical store.
pub trait StorageService: Send + Sync {
    /// Backend handed out for each namespace.
    type Backend: KeyValueBackend + 'static;

    /// Open (creating when missing) the namespace `name`.
    fn open(&self, name: &str) -> impl Future<Output = Result<Self::Backend, HubError>> + Send;
}
