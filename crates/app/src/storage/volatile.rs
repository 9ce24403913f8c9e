//! In-memory [`StorageService`] for tests and ephemeral collections.
//!
//! Namespaces live as long as the service; opening the same name twice hands
//! out two views of the same map.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use hubcore_domain::error::HubError;

use crate::ports::{KeyValueBackend, StorageService};

type Namespace = Arc<RwLock<BTreeMap<String, String>>>;

/// Process-lifetime key-value store.
#[derive(Debug, Clone, Default)]
pub struct VolatileStorageService {
    namespaces: Arc<Mutex<HashMap<String, Namespace>>>,
}

impl VolatileStorageService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageService for VolatileStorageService {
    type Backend = VolatileBackend;

    fn open(&self, name: &str) -> impl Future<Output = Result<VolatileBackend, HubError>> + Send {
        let entries = Arc::clone(self.namespaces.lock().entry(name.to_string()).or_default());
        let backend = VolatileBackend {
            name: name.to_string(),
            entries,
        };
        async { Ok(backend) }
    }
}

/// One namespace of a [`VolatileStorageService`].
#[derive(Debug, Clone)]
pub struct VolatileBackend {
    name: String,
    entries: Namespace,
}

impl KeyValueBackend for VolatileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(
        &self,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<Option<String>, HubError>> + Send {
        let previous = self.entries.write().insert(key.to_string(), value);
        async { Ok(previous) }
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<Option<String>, HubError>> + Send {
        let removed = self.entries.write().remove(key);
        async { Ok(removed) }
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, HubError>> + Send {
        let value = self.entries.read().get(key).cloned();
        async { Ok(value) }
    }

    fn contains_key(&self, key: &str) -> impl Future<Output = Result<bool, HubError>> + Send {
        let present = self.entries.read().contains_key(key);
        async move { Ok(present) }
    }

    fn keys(&self) -> impl Future<Output = Result<Vec<String>, HubError>> + Send {
        let keys: Vec<String> = self.entries.read().keys().cloned().collect();
        async { Ok(keys) }
    }

    fn entries(&self) -> impl Future<Output = Result<Vec<(String, String)>, HubError>> + Send {
        let entries: Vec<(String, String)> = self
            .entries
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        async { Ok(entries) }
    }

    fn clear(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.entries.write().clear();
        async { Ok(()) }
    }
}
