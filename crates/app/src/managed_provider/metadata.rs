//! Persisted item metadata.

use hubcore_domain::error::{ConfigurationError, HubError};
use hubcore_domain::metadata::{Metadata, MetadataDto, MetadataKey};

use crate::storage::{StoredValue, TypeResolver};

use super::{ManagedProvider, PersistenceMapping};

/// Storage namespace of managed metadata.
pub const STORAGE_NAME: &str = "metadata";

/// Managed provider of metadata over backend `B`.
pub type ManagedMetadataProvider<B> = ManagedProvider<MetadataMapping, B>;

impl StoredValue for MetadataDto {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn encode_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Stores each record as a [`MetadataDto`] under `namespace:item_name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataMapping;

impl PersistenceMapping for MetadataMapping {
    type Element = Metadata;
    type Persisted = MetadataDto;

    const KIND: &'static str = "Metadata";

    fn storage_name(&self) -> &str {
        STORAGE_NAME
    }

    fn key_to_string(&self, key: &MetadataKey) -> String {
        key.to_string()
    }

    fn to_element(&self, key: &str, persisted: MetadataDto) -> Result<Metadata, HubError> {
        persisted.into_metadata(key)
    }

    fn to_persistable(&self, element: &Metadata) -> MetadataDto {
        MetadataDto::from(element)
    }

    fn type_resolver(&self) -> Result<TypeResolver<MetadataDto>, ConfigurationError> {
        TypeResolver::single(MetadataDto::TYPE_TAG)
    }
}

#[cfg(test)]
mod tests {
    use crate::ports::{KeyValueBackend, StorageService};
    use crate::registry::Provider;
    use crate::storage::VolatileStorageService;

    use super::*;

    fn alexa(item: &str) -> Metadata {
        Metadata::new(MetadataKey::new("alexa", item), "Light")
            .unwrap()
            .config("category", "LIGHT")
    }

    #[test]
    fn should_map_metadata_round_trip_through_key() {
        let mapping = MetadataMapping;
        let metadata = alexa("Kitchen_Lamp");
        let key = mapping.key_to_string(&metadata.key);
        assert_eq!(key, "alexa:Kitchen_Lamp");
        let back = mapping
            .to_element(&key, mapping.to_persistable(&metadata))
            .unwrap();
        assert_eq!(back, metadata);
    }

    #[tokio::test]
    async fn should_skip_record_whose_key_has_no_namespace() {
        let service = VolatileStorageService::new();
        let raw = service.open(STORAGE_NAME).await.unwrap();
        raw.put(
            "orphan",
            r#"hubcore.items.MetadataDto@@@{"value":"x"}"#.to_string(),
        )
        .await
        .unwrap();
        raw.put(
            "alexa:Lamp",
            r#"hubcore.items.MetadataDto@@@{"value":"Light"}"#.to_string(),
        )
        .await
        .unwrap();

        let provider = ManagedMetadataProvider::open(&service, MetadataMapping)
            .await
            .unwrap();
        let all = provider.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, MetadataKey::new("alexa", "Lamp"));
    }

    #[tokio::test]
    async fn should_remove_by_composite_key() {
        let service = VolatileStorageService::new();
        let provider = ManagedMetadataProvider::open(&service, MetadataMapping)
            .await
            .unwrap();
        provider.add(alexa("Lamp")).await.unwrap();

        let removed = provider
            .remove(&MetadataKey::new("alexa", "Lamp"))
            .await
            .unwrap();
        assert_eq!(removed, alexa("Lamp"));
        let raw = service.open(STORAGE_NAME).await.unwrap();
        assert!(raw.keys().await.unwrap().is_empty());
    }
}
