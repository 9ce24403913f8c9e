//! Metadata — namespaced key/value annotations attached to items.
//!
//! A metadata record is keyed by `(namespace, item_name)` and rendered as
//! `namespace:item_name` wherever a string key is needed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::error::{DecodeError, HubError, ValidationError};
use crate::identifiable::Identifiable;

const SEPARATOR: char = ':';

/// Composite key of a [`Metadata`] record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetadataKey {
    pub namespace: String,
    pub item_name: String,
}

impl MetadataKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            item_name: item_name.into(),
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.namespace, self.item_name)
    }
}

impl FromStr for MetadataKey {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(SEPARATOR) {
            Some((namespace, item_name)) if !namespace.is_empty() && !item_name.is_empty() => {
                Ok(Self::new(namespace, item_name))
            }
            _ => Err(DecodeError::InvalidKey {
                kind: "Metadata",
                key: s.to_string(),
            }),
        }
    }
}

/// A metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub key: MetadataKey,
    pub value: String,
    pub configuration: Configuration,
}

impl Metadata {
    /// Create a metadata record without configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the namespace or item name is empty.
    pub fn new(key: MetadataKey, value: impl Into<String>) -> Result<Self, HubError> {
        let metadata = Self {
            key,
            value: value.into(),
            configuration: Configuration::new(),
        };
        metadata.validate()?;
        Ok(metadata)
    }

    #[must_use]
    pub fn config(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.configuration.insert(name, value);
        self
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the namespace or item name is
    /// empty, or when the namespace contains the key separator.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.key.namespace.is_empty() || self.key.namespace.contains(SEPARATOR) {
            return Err(ValidationError::EmptyNamespace.into());
        }
        if self.key.item_name.is_empty() {
            return Err(ValidationError::EmptyItemName.into());
        }
        Ok(())
    }
}

impl Identifiable for Metadata {
    type Key = MetadataKey;

    fn uid(&self) -> MetadataKey {
        self.key.clone()
    }
}

/// Stored representation of a [`Metadata`] record.
///
/// The key is not part of the payload; it is the storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDto {
    pub value: String,
    #[serde(default)]
    pub configuration: Configuration,
}

impl MetadataDto {
    /// Type tag under which metadata DTOs are stored.
    pub const TYPE_TAG: &'static str = "hubcore.items.MetadataDto";

    /// Rebuild the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Decode`] when `key` is not `namespace:item_name`.
    pub fn into_metadata(self, key: &str) -> Result<Metadata, HubError> {
        let metadata = Metadata {
            key: key.parse()?,
            value: self.value,
            configuration: self.configuration,
        };
        metadata.validate()?;
        Ok(metadata)
    }
}

impl From<&Metadata> for MetadataDto {
    fn from(metadata: &Metadata) -> Self {
        Self {
            value: metadata.value.clone(),
            configuration: metadata.configuration.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_render_and_parse_key() {
        let key = MetadataKey::new("alexa", "Kitchen_Light");
        let text = key.to_string();
        assert_eq!(text, "alexa:Kitchen_Light");
        assert_eq!(text.parse::<MetadataKey>().unwrap(), key);
    }

    #[test]
    fn should_keep_colons_in_item_part() {
        let key: MetadataKey = "homekit:a:b".parse().unwrap();
        assert_eq!(key.namespace, "homekit");
        assert_eq!(key.item_name, "a:b");
    }

    #[test]
    fn should_reject_key_without_separator() {
        assert!(matches!(
            "nonamespace".parse::<MetadataKey>(),
            Err(DecodeError::InvalidKey { .. })
        ));
    }

    #[test]
    fn should_rebuild_record_from_key_and_dto() {
        let metadata = Metadata::new(MetadataKey::new("alexa", "Lamp"), "Light")
            .unwrap()
            .config("category", "LIGHT");
        let dto = MetadataDto::from(&metadata);
        let back = dto.into_metadata(&metadata.key.to_string()).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn should_reject_empty_item_name() {
        let result = Metadata::new(MetadataKey::new("alexa", ""), "x");
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::EmptyItemName))
        ));
    }
}
