//! Type-tagged record encoding.
//!
//! A record is `<type-tag>@@@<json-payload>`. The tag picks the decoder before
//! the payload is parsed, so one namespace can hold values of different types.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;

use hubcore_domain::error::{ConfigurationError, DecodeError, HubError};

/// Reserved token between the type tag and the payload.
pub const TYPE_SEPARATOR: &str = "@@@";

/// A value that can be written to a [`Storage`](super::Storage).
pub trait StoredValue {
    /// Fully-qualified dotted type name written in front of the payload.
    fn type_tag(&self) -> &'static str;

    /// Serialize the value without its tag.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when the value cannot be represented.
    fn encode_payload(&self) -> Result<String, serde_json::Error>;
}

type Decoder<V> = Box<dyn Fn(&str) -> Result<V, serde_json::Error> + Send + Sync>;

/// Capability table mapping type tags to decoders producing `V`.
///
/// Built once at startup by whoever owns a storage namespace; two owners can
/// share one physical store while resolving different type universes.
pub struct TypeResolver<V> {
    decoders: HashMap<&'static str, Decoder<V>>,
}

impl<V> Default for TypeResolver<V> {
    fn default() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }
}

impl<V> fmt::Debug for TypeResolver<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.decoders.keys().collect();
        tags.sort();
        f.debug_struct("TypeResolver").field("tags", &tags).finish()
    }
}

impl<V: 'static> TypeResolver<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for `tag`: payloads are parsed as `T` then mapped
    /// into `V`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ReservedSeparator`] when `tag` contains
    /// [`TYPE_SEPARATOR`] and [`ConfigurationError::DuplicateTypeTag`] when
    /// `tag` is already registered.
    pub fn register<T, F>(mut self, tag: &'static str, map: F) -> Result<Self, ConfigurationError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> V + Send + Sync + 'static,
    {
        if tag.contains(TYPE_SEPARATOR) {
            return Err(ConfigurationError::ReservedSeparator(tag.to_string()));
        }
        if self.decoders.contains_key(tag) {
            return Err(ConfigurationError::DuplicateTypeTag(tag.to_string()));
        }
        let decoder: Decoder<V> =
            Box::new(move |payload| serde_json::from_str::<T>(payload).map(&map));
        self.decoders.insert(tag, decoder);
        Ok(self)
    }

    /// Split a record and decode its payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the separator is missing, the tag is not
    /// registered, or the payload does not parse.
    pub fn decode(&self, record: &str) -> Result<V, DecodeError> {
        let (tag, payload) = record
            .split_once(TYPE_SEPARATOR)
            .ok_or(DecodeError::MissingTypeTag)?;
        let decoder = self
            .decoders
            .get(tag)
            .ok_or_else(|| DecodeError::UnknownType(tag.to_string()))?;
        decoder(payload).map_err(|source| DecodeError::Payload {
            tag: tag.to_string(),
            source,
        })
    }
}

impl<V: DeserializeOwned + 'static> TypeResolver<V> {
    /// Resolver for a single concrete type stored under `tag`.
    ///
    /// # Errors
    ///
    /// Same as [`TypeResolver::register`].
    pub fn single(tag: &'static str) -> Result<Self, ConfigurationError> {
        Self::new().register::<V, _>(tag, |value| value)
    }
}

/// Render `value` as a tagged record.
///
/// # Errors
///
/// Returns [`HubError::Configuration`] when the value's tag contains the
/// separator and [`HubError::Encode`] when serialization fails.
pub fn encode<V: StoredValue + ?Sized>(value: &V) -> Result<String, HubError> {
    let tag = value.type_tag();
    if tag.contains(TYPE_SEPARATOR) {
        return Err(ConfigurationError::ReservedSeparator(tag.to_string()).into());
    }
    let payload = value.encode_payload().map_err(HubError::Encode)?;
    Ok(format!("{tag}{TYPE_SEPARATOR}{payload}"))
}
