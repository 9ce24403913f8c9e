//! Typed storage — a named key-value namespace holding tagged values.
//!
//! [`Storage`] sits on top of a raw [`KeyValueBackend`] and owns the encoding
//! (see [`codec`]) and the namespace lifecycle. Writers are exclusive and
//! readers shared per namespace; distinct namespaces never contend.
//!
//! Decode failures never surface from reads: the record is logged and
//! treated as absent. Write failures always propagate.

pub mod codec;
pub mod volatile;

pub use codec::{StoredValue, TYPE_SEPARATOR, TypeResolver};
pub use volatile::VolatileStorageService;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use hubcore_domain::error::{HubError, StorageDeletedError};

use crate::ports::{KeyValueBackend, StorageService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Open,
    Deleted,
}

/// A namespace of tagged values of type `V` stored in backend `B`.
pub struct Storage<V, B> {
    backend: B,
    resolver: TypeResolver<V>,
    lifecycle: RwLock<Lifecycle>,
}

impl<V, B> Storage<V, B>
where
    V: StoredValue + Send + Sync + 'static,
    B: KeyValueBackend,
{
    /// Open the namespace `name` of `service`.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the backend cannot open the namespace.
    pub async fn open<S>(
        service: &S,
        name: &str,
        resolver: TypeResolver<V>,
    ) -> Result<Self, HubError>
    where
        S: StorageService<Backend = B>,
    {
        let backend = service.open(name).await?;
        tracing::debug!(storage = name, "storage opened");
        Ok(Self::new(backend, resolver))
    }

    /// Wrap an already opened backend.
    pub fn new(backend: B, resolver: TypeResolver<V>) -> Self {
        Self {
            backend,
            resolver,
            lifecycle: RwLock::new(Lifecycle::Open),
        }
    }

    /// Name of the namespace.
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Store `value` under `key`, returning the previous value.
    ///
    /// `None` removes the key, exactly like [`Storage::remove`].
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StorageDeleted`] after [`Storage::delete`],
    /// [`HubError::Encode`] when `value` cannot be serialized, or a storage
    /// error from the backend.
    pub async fn put(&self, key: &str, value: Option<&V>) -> Result<Option<V>, HubError> {
        let Some(value) = value else {
            return self.remove(key).await;
        };
        let record = codec::encode(value)?;
        tracing::trace!(storage = self.name(), key, record = %record, "put");
        let _guard = self.write().await?;
        let previous = self.backend.put(key, record).await?;
        Ok(previous.and_then(|record| self.decode(key, &record)))
    }

    /// Remove `key`, returning the removed value.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StorageDeleted`] after [`Storage::delete`] or a
    /// storage error from the backend.
    pub async fn remove(&self, key: &str) -> Result<Option<V>, HubError> {
        let _guard = self.write().await?;
        let removed = self.backend.remove(key).await?;
        tracing::trace!(storage = self.name(), key, "remove");
        Ok(removed.and_then(|record| self.decode(key, &record)))
    }

    /// Read the value under `key`; undecodable records read as absent.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StorageDeleted`] after [`Storage::delete`] or a
    /// storage error from the backend.
    pub async fn get(&self, key: &str) -> Result<Option<V>, HubError> {
        let _guard = self.read().await?;
        let record = self.backend.get(key).await?;
        Ok(record.and_then(|record| self.decode(key, &record)))
    }

    /// Whether a record is stored under `key`, decodable or not.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StorageDeleted`] after [`Storage::delete`] or a
    /// storage error from the backend.
    pub async fn contains_key(&self, key: &str) -> Result<bool, HubError> {
        let _guard = self.read().await?;
        self.backend.contains_key(key).await
    }

    /// Every stored key.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StorageDeleted`] after [`Storage::delete`] or a
    /// storage error from the backend.
    pub async fn keys(&self) -> Result<Vec<String>, HubError> {
        let _guard = self.read().await?;
        self.backend.keys().await
    }

    /// Every stored value in key order, with `None` holes where a record
    /// cannot be decoded.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StorageDeleted`] after [`Storage::delete`] or a
    /// storage error from the backend.
    pub async fn values(&self) -> Result<Vec<Option<V>>, HubError> {
        let _guard = self.read().await?;
        let entries = self.backend.entries().await?;
        Ok(entries
            .iter()
            .map(|(key, record)| self.decode(key, record))
            .collect())
    }

    /// Every decodable `(key, value)` pair in key order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::StorageDeleted`] after [`Storage::delete`] or a
    /// storage error from the backend.
    pub async fn entries(&self) -> Result<Vec<(String, V)>, HubError> {
        let _guard = self.read().await?;
        let entries = self.backend.entries().await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, record)| {
                let value = self.decode(&key, &record)?;
                Some((key, value))
            })
            .collect())
    }

    /// Drop every record and close the namespace for good.
    ///
    /// Deleting twice is a no-op; every other call after the first delete
    /// fails with [`HubError::StorageDeleted`].
    ///
    /// # Errors
    ///
    /// Returns a storage error when the backend fails to clear; the namespace
    /// then stays open.
    pub async fn delete(&self) -> Result<(), HubError> {
        let mut lifecycle = self.lifecycle.write().await;
        if *lifecycle == Lifecycle::Deleted {
            return Ok(());
        }
        self.backend.clear().await?;
        *lifecycle = Lifecycle::Deleted;
        tracing::debug!(storage = self.name(), "storage deleted");
        Ok(())
    }

    async fn read(&self) -> Result<RwLockReadGuard<'_, Lifecycle>, HubError> {
        let guard = self.lifecycle.read().await;
        match *guard {
            Lifecycle::Open => Ok(guard),
            Lifecycle::Deleted => Err(self.deleted()),
        }
    }

    async fn write(&self) -> Result<RwLockWriteGuard<'_, Lifecycle>, HubError> {
        let guard = self.lifecycle.write().await;
        match *guard {
            Lifecycle::Open => Ok(guard),
            Lifecycle::Deleted => Err(self.deleted()),
        }
    }

    fn deleted(&self) -> HubError {
        StorageDeletedError {
            name: self.name().to_string(),
        }
        .into()
    }

    fn decode(&self, key: &str, record: &str) -> Option<V> {
        match self.resolver.decode(record) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    storage = self.name(),
                    key,
                    error = %err,
                    "couldn't decode stored record, treating it as absent"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(rename = "type")]
        kind: String,
        name: String,
    }

    impl StoredValue for Note {
        fn type_tag(&self) -> &'static str {
            "test.Note"
        }

        fn encode_payload(&self) -> Result<String, serde_json::Error> {
            serde_json::to_string(self)
        }
    }

    fn note(name: &str) -> Note {
        Note {
            kind: "Rule".to_string(),
            name: name.to_string(),
        }
    }

    async fn open(
        service: &VolatileStorageService,
        name: &str,
    ) -> Storage<Note, volatile::VolatileBackend> {
        Storage::open(service, name, TypeResolver::single("test.Note").unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn should_put_get_and_remove_value() {
        let service = VolatileStorageService::new();
        let storage = open(&service, "rules").await;
        let evening = note("Evening Lights");

        assert_eq!(storage.put("rule1", Some(&evening)).await.unwrap(), None);
        assert_eq!(storage.get("rule1").await.unwrap(), Some(evening.clone()));
        assert_eq!(storage.remove("rule1").await.unwrap(), Some(evening));
        assert_eq!(storage.get("rule1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_return_previous_value_on_overwrite() {
        let service = VolatileStorageService::new();
        let storage = open(&service, "rules").await;
        storage.put("k", Some(&note("a"))).await.unwrap();
        let previous = storage.put("k", Some(&note("b"))).await.unwrap();
        assert_eq!(previous, Some(note("a")));
    }

    #[tokio::test]
    async fn should_remove_when_putting_none() {
        let service = VolatileStorageService::new();
        let storage = open(&service, "rules").await;
        storage.put("k", Some(&note("a"))).await.unwrap();
        assert_eq!(storage.put("k", None).await.unwrap(), Some(note("a")));
        assert!(!storage.contains_key("k").await.unwrap());
    }

    #[tokio::test]
    async fn should_return_absent_for_unknown_key() {
        let service = VolatileStorageService::new();
        let storage = open(&service, "rules").await;
        assert_eq!(storage.get("missing").await.unwrap(), None);
        assert_eq!(storage.remove("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_skip_undecodable_records() {
        let service = VolatileStorageService::new();
        let storage = open(&service, "rules").await;
        storage.put("a", Some(&note("a"))).await.unwrap();
        let raw = service.open("rules").await.unwrap();
        raw.put("b", "legacy.Type@@@{}".to_string()).await.unwrap();
        raw.put("c", "garbage".to_string()).await.unwrap();

        assert_eq!(storage.get("b").await.unwrap(), None);
        assert!(storage.contains_key("b").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(
            storage.values().await.unwrap(),
            vec![Some(note("a")), None, None]
        );
        let entries = storage.entries().await.unwrap();
        assert_eq!(entries, vec![("a".to_string(), note("a"))]);
    }

    #[tokio::test]
    async fn should_fail_every_call_after_delete_except_delete() {
        let service = VolatileStorageService::new();
        let storage = open(&service, "rules").await;
        storage.put("a", Some(&note("a"))).await.unwrap();

        storage.delete().await.unwrap();
        storage.delete().await.unwrap();

        assert!(matches!(
            storage.get("a").await,
            Err(HubError::StorageDeleted(_))
        ));
        assert!(matches!(
            storage.put("a", Some(&note("b"))).await,
            Err(HubError::StorageDeleted(_))
        ));
        assert!(matches!(
            storage.keys().await,
            Err(HubError::StorageDeleted(_))
        ));
    }

    #[tokio::test]
    async fn should_drop_records_on_delete() {
        let service = VolatileStorageService::new();
        let storage = open(&service, "rules").await;
        storage.put("a", Some(&note("a"))).await.unwrap();
        storage.delete().await.unwrap();

        let reopened = open(&service, "rules").await;
        assert!(reopened.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_keep_namespaces_apart() {
        let service = VolatileStorageService::new();
        let rules = open(&service, "rules").await;
        let links = open(&service, "links").await;
        rules.put("k", Some(&note("rule"))).await.unwrap();
        assert_eq!(links.get("k").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_keep_every_concurrent_write_on_disjoint_keys() {
        let service = VolatileStorageService::new();
        let storage = Arc::new(open(&service, "rules").await);

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move {
                    let key = format!("k{i:02}");
                    storage.put(&key, Some(&note(&key))).await.unwrap();
                    if i % 2 == 0 {
                        storage.remove(&key).await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let keys = storage.keys().await.unwrap();
        assert_eq!(keys.len(), 16);
        assert!(keys.iter().all(|key| key[1..].parse::<u32>().unwrap() % 2 == 1));
    }
}
