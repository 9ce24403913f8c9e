//! Common error types used across the workspace.
//!
//! Every layer returns [`HubError`]. Structured failures carry a typed source
//! (converted with `#[from]`); only the durable layer is boxed, so adapters can
//! plug in their own error enums without this crate knowing about them.

/// Top-level error for every fallible hubcore operation.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The referenced key is absent from the managed collection.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// An element with the same key is already managed.
    #[error("already exists")]
    AlreadyExists(#[from] AlreadyExistsError),

    /// A stored record could not be turned back into a value.
    #[error("decode error")]
    Decode(#[from] DecodeError),

    /// A value could not be serialized for storage.
    #[error("encode error")]
    Encode(#[source] serde_json::Error),

    /// A module or provider was handed a configuration it does not understand.
    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),

    /// The storage namespace was deleted; it accepts no further calls.
    #[error("storage deleted")]
    StorageDeleted(#[from] StorageDeletedError),

    /// The durable layer failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("uid must not be empty")]
    EmptyUid,

    #[error("module id must not be empty")]
    EmptyModuleId,

    #[error("module '{module_id}' has no type uid")]
    EmptyModuleType { module_id: String },

    #[error("module id '{0}' is used more than once")]
    DuplicateModuleId(String),

    #[error("metadata namespace must not be empty")]
    EmptyNamespace,

    #[error("item name must not be empty")]
    EmptyItemName,
}

/// Returned when an operation references a key that is not managed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} '{key}' not found")]
pub struct NotFoundError {
    pub kind: &'static str,
    pub key: String,
}

/// Returned when adding an element whose key is already managed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} '{key}' already exists")]
pub struct AlreadyExistsError {
    pub kind: &'static str,
    pub key: String,
}

/// Why a stored record could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("record has no type tag separator")]
    MissingTypeTag,

    #[error("no decoder registered for type tag '{0}'")]
    UnknownType(String),

    #[error("malformed payload for type tag '{tag}'")]
    Payload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("key '{key}' is not valid for {kind}")]
    InvalidKey { kind: &'static str, key: String },
}

/// Rejected configuration, raised at construction time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("module type '{0}' is not handled")]
    UnsupportedModuleType(String),

    #[error("required parameter '{0}' is missing")]
    MissingParameter(&'static str),

    #[error("parameter '{name}' has an invalid value: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("pattern '{pattern}' is invalid: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("type tag '{0}' contains the reserved separator")]
    ReservedSeparator(String),

    #[error("type tag '{0}' is registered twice")]
    DuplicateTypeTag(String),
}

/// Raised by every call on a storage namespace after it was deleted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("storage '{name}' was deleted")]
pub struct StorageDeletedError {
    pub name: String,
}

impl HubError {
    /// Wrap a durable-layer failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}
