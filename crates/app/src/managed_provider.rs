//! Managed provider — the writable, persisted source of one collection.
//!
//! A [`ManagedProvider`] owns one [`Storage`] namespace and an in-memory
//! snapshot of it. Every mutation runs under the collection lock and follows
//! the same order: write storage, update the snapshot, notify listeners. A
//! failed write leaves both storage and snapshot as they were.

pub mod metadata;
pub mod rules;

pub use metadata::{ManagedMetadataProvider, MetadataMapping};
pub use rules::{ManagedRuleProvider, RuleMapping};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use hubcore_domain::error::{AlreadyExistsError, ConfigurationError, HubError, NotFoundError};
use hubcore_domain::id::ListenerId;
use hubcore_domain::identifiable::Identifiable;

use crate::ports::{KeyValueBackend, StorageService};
use crate::registry::{Provider, ProviderChangeListener, ProviderListeners};
use crate::storage::{Storage, StoredValue, TypeResolver};

/// Element key of a mapping.
pub type KeyOf<M> = <<M as PersistenceMapping>::Element as Identifiable>::Key;

/// Translation between domain elements and their stored form.
///
/// `to_element(&key_to_string(&e.uid()), to_persistable(&e))` must give back
/// `e`.
pub trait PersistenceMapping: Send + Sync + 'static {
    /// Domain element served to registries.
    type Element: Identifiable + Clone + Send + Sync + 'static;
    /// Stored representation.
    type Persisted: StoredValue + Send + Sync + 'static;

    /// Element kind used in errors and logs.
    const KIND: &'static str;

    /// Storage namespace of the collection.
    fn storage_name(&self) -> &str;

    /// Storage key of an element key.
    fn key_to_string(&self, key: &KeyOf<Self>) -> String;

    /// Rebuild the element stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Decode`] or [`HubError::Validation`] when the
    /// stored record does not describe a valid element.
    fn to_element(&self, key: &str, persisted: Self::Persisted) -> Result<Self::Element, HubError>;

    /// Stored form of `element`.
    fn to_persistable(&self, element: &Self::Element) -> Self::Persisted;

    /// Decoders for every stored type of the collection.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when a tag is malformed or duplicated.
    fn type_resolver(&self) -> Result<TypeResolver<Self::Persisted>, ConfigurationError>;
}

/// Writable provider persisting its elements through `M` into backend `B`.
pub struct ManagedProvider<M: PersistenceMapping, B> {
    mapping: M,
    storage: Storage<M::Persisted, B>,
    snapshot: RwLock<HashMap<KeyOf<M>, M::Element>>,
    collection: tokio::sync::Mutex<()>,
    listeners: ProviderListeners<M::Element>,
}

impl<M, B> ManagedProvider<M, B>
where
    M: PersistenceMapping,
    B: KeyValueBackend + 'static,
{
    /// Open the collection's namespace and load every stored element.
    ///
    /// Records that cannot be decoded or mapped are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Configuration`] when the mapping's type resolver
    /// is invalid, or a storage error when the namespace cannot be read.
    pub async fn open<S>(service: &S, mapping: M) -> Result<Self, HubError>
    where
        S: StorageService<Backend = B>,
    {
        let resolver = mapping.type_resolver()?;
        let storage = Storage::open(service, mapping.storage_name(), resolver).await?;
        let mut snapshot = HashMap::new();
        for (key, persisted) in storage.entries().await? {
            match mapping.to_element(&key, persisted) {
                Ok(element) => {
                    snapshot.insert(element.uid(), element);
                }
                Err(err) => {
                    tracing::warn!(
                        kind = M::KIND,
                        %key,
                        error = %err,
                        "skipping stored record that doesn't map to an element"
                    );
                }
            }
        }
        tracing::debug!(
            kind = M::KIND,
            storage = storage.name(),
            count = snapshot.len(),
            "managed collection loaded"
        );
        Ok(Self {
            mapping,
            storage,
            snapshot: RwLock::new(snapshot),
            collection: tokio::sync::Mutex::new(()),
            listeners: ProviderListeners::new(),
        })
    }

    /// Persist a new element and announce it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AlreadyExists`] when the key is managed already,
    /// or the storage error that prevented the write.
    pub async fn add(&self, element: M::Element) -> Result<(), HubError> {
        let _collection = self.collection.lock().await;
        let key = element.uid();
        if self.snapshot.read().contains_key(&key) {
            return Err(AlreadyExistsError {
                kind: M::KIND,
                key: key.to_string(),
            }
            .into());
        }
        self.write(&key, &element).await?;
        self.snapshot.write().insert(key.clone(), element.clone());
        tracing::debug!(kind = M::KIND, %key, "managed element added");
        self.listeners.notify_added(&element);
        Ok(())
    }

    /// Replace a managed element and announce the change.
    ///
    /// Returns the element that was replaced.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the key is not managed, or the
    /// storage error that prevented the write.
    pub async fn update(&self, element: M::Element) -> Result<M::Element, HubError> {
        let _collection = self.collection.lock().await;
        let key = element.uid();
        let Some(old) = self.snapshot.read().get(&key).cloned() else {
            return Err(self.not_found(&key));
        };
        self.write(&key, &element).await?;
        self.snapshot.write().insert(key.clone(), element.clone());
        tracing::debug!(kind = M::KIND, %key, "managed element updated");
        self.listeners.notify_updated(&old, &element);
        Ok(old)
    }

    /// Add `element` or replace the managed one under its key, in one step.
    ///
    /// Returns the replaced element, if any.
    ///
    /// # Errors
    ///
    /// Returns the storage error that prevented the write.
    pub async fn put(&self, element: M::Element) -> Result<Option<M::Element>, HubError> {
        let _collection = self.collection.lock().await;
        let key = element.uid();
        let old = self.snapshot.read().get(&key).cloned();
        self.write(&key, &element).await?;
        self.snapshot.write().insert(key.clone(), element.clone());
        match &old {
            Some(old) => {
                tracing::debug!(kind = M::KIND, %key, "managed element updated");
                self.listeners.notify_updated(old, &element);
            }
            None => {
                tracing::debug!(kind = M::KIND, %key, "managed element added");
                self.listeners.notify_added(&element);
            }
        }
        Ok(old)
    }

    /// Drop a managed element and announce its removal.
    ///
    /// Returns the removed element.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the key is not managed, or the
    /// storage error that prevented the removal.
    pub async fn remove(&self, key: &KeyOf<M>) -> Result<M::Element, HubError> {
        let _collection = self.collection.lock().await;
        if !self.snapshot.read().contains_key(key) {
            return Err(self.not_found(key));
        }
        self.storage.remove(&self.mapping.key_to_string(key)).await?;
        let Some(old) = self.snapshot.write().remove(key) else {
            return Err(self.not_found(key));
        };
        tracing::debug!(kind = M::KIND, %key, "managed element removed");
        self.listeners.notify_removed(&old);
        Ok(old)
    }

    /// The managed element under `key`.
    pub fn get(&self, key: &KeyOf<M>) -> Option<M::Element> {
        self.snapshot.read().get(key).cloned()
    }

    async fn write(&self, key: &KeyOf<M>, element: &M::Element) -> Result<(), HubError> {
        let persisted = self.mapping.to_persistable(element);
        self.storage
            .put(&self.mapping.key_to_string(key), Some(&persisted))
            .await?;
        Ok(())
    }

    fn not_found(&self, key: &KeyOf<M>) -> HubError {
        NotFoundError {
            kind: M::KIND,
            key: key.to_string(),
        }
        .into()
    }
}

impl<M, B> Provider<M::Element> for ManagedProvider<M, B>
where
    M: PersistenceMapping,
    B: KeyValueBackend + 'static,
{
    fn get_all(&self) -> Vec<M::Element> {
        self.snapshot.read().values().cloned().collect()
    }

    fn add_listener(&self, listener: Arc<dyn ProviderChangeListener<M::Element>>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
