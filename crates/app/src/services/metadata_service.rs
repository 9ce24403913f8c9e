//! Metadata service — use-cases for item metadata.

use std::sync::Arc;

use hubcore_domain::error::{HubError, NotFoundError};
use hubcore_domain::metadata::{Metadata, MetadataKey};

use crate::managed_provider::ManagedMetadataProvider;
use crate::ports::KeyValueBackend;
use crate::registry::{Provider, Registry};

/// Application service for metadata operations.
pub struct MetadataService<B> {
    provider: Arc<ManagedMetadataProvider<B>>,
    registry: Arc<Registry<Metadata>>,
}

impl<B: KeyValueBackend + 'static> MetadataService<B> {
    /// Create a service writing to `provider` and reading from `registry`.
    pub fn new(
        provider: Arc<ManagedMetadataProvider<B>>,
        registry: Arc<Registry<Metadata>>,
    ) -> Self {
        Self { provider, registry }
    }

    /// Store a record, adding or replacing the managed one.
    ///
    /// Returns the replaced record, if any.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if invariants fail, or a storage error.
    #[tracing::instrument(skip(self, metadata), fields(key = %metadata.key))]
    pub async fn put(&self, metadata: Metadata) -> Result<Option<Metadata>, HubError> {
        metadata.validate()?;
        self.provider.put(metadata).await
    }

    /// Look up one record.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no provider contributes `key`.
    pub fn get(&self, key: &MetadataKey) -> Result<Metadata, HubError> {
        self.registry.get(key).ok_or_else(|| {
            NotFoundError {
                kind: "Metadata",
                key: key.to_string(),
            }
            .into()
        })
    }

    /// Every record of `namespace`, sorted by item name.
    #[must_use]
    pub fn list_namespace(&self, namespace: &str) -> Vec<Metadata> {
        let mut records: Vec<_> = self
            .registry
            .get_all()
            .into_iter()
            .filter(|metadata| metadata.key.namespace == namespace)
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    /// Remove one managed record, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the record is not managed, or a
    /// storage error.
    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn remove(&self, key: &MetadataKey) -> Result<Metadata, HubError> {
        self.provider.remove(key).await
    }

    /// Remove every managed record attached to `item_name`, in any
    /// namespace. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; records removed before it stay
    /// removed.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item_metadata(&self, item_name: &str) -> Result<usize, HubError> {
        let keys: Vec<MetadataKey> = self
            .provider
            .get_all()
            .into_iter()
            .map(|metadata| metadata.key)
            .filter(|key| key.item_name == item_name)
            .collect();
        for key in &keys {
            self.provider.remove(key).await?;
        }
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::managed_provider::MetadataMapping;
    use crate::storage::VolatileStorageService;
    use crate::storage::volatile::VolatileBackend;

    use super::*;

    async fn make_service() -> MetadataService<VolatileBackend> {
        let service = VolatileStorageService::new();
        let provider = Arc::new(
            ManagedMetadataProvider::open(&service, MetadataMapping)
                .await
                .unwrap(),
        );
        let registry = Arc::new(Registry::<Metadata>::new("metadata"));
        registry.add_managed_provider(provider.clone());
        MetadataService::new(provider, registry)
    }

    fn record(namespace: &str, item: &str, value: &str) -> Metadata {
        Metadata::new(MetadataKey::new(namespace, item), value).unwrap()
    }

    #[tokio::test]
    async fn should_add_then_replace_record() {
        let svc = make_service().await;

        assert_eq!(svc.put(record("alexa", "Lamp", "Light")).await.unwrap(), None);
        let replaced = svc.put(record("alexa", "Lamp", "Switch")).await.unwrap();

        assert_eq!(replaced.unwrap().value, "Light");
        let key = MetadataKey::new("alexa", "Lamp");
        assert_eq!(svc.get(&key).unwrap().value, "Switch");
    }

    #[tokio::test]
    async fn should_list_one_namespace() {
        let svc = make_service().await;
        svc.put(record("alexa", "B", "x")).await.unwrap();
        svc.put(record("alexa", "A", "x")).await.unwrap();
        svc.put(record("homekit", "A", "x")).await.unwrap();

        let items: Vec<_> = svc
            .list_namespace("alexa")
            .into_iter()
            .map(|m| m.key.item_name)
            .collect();
        assert_eq!(items, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn should_remove_all_metadata_of_an_item() {
        let svc = make_service().await;
        svc.put(record("alexa", "Lamp", "x")).await.unwrap();
        svc.put(record("homekit", "Lamp", "x")).await.unwrap();
        svc.put(record("alexa", "Fan", "x")).await.unwrap();

        assert_eq!(svc.remove_item_metadata("Lamp").await.unwrap(), 2);
        assert!(svc.get(&MetadataKey::new("alexa", "Lamp")).is_err());
        assert!(svc.get(&MetadataKey::new("alexa", "Fan")).is_ok());
    }

    #[tokio::test]
    async fn should_report_missing_record() {
        let svc = make_service().await;
        let key = MetadataKey::new("alexa", "Ghost");
        assert!(matches!(svc.remove(&key).await, Err(HubError::NotFound(_))));
    }
}
