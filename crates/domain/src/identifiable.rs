//! Identity of registry elements.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// An element with a stable, unique key.
///
/// Registries treat elements as immutable snapshots: a change is a new
/// snapshot under the same key, never an in-place edit.
pub trait Identifiable {
    /// Key type, unique across every provider of a registry.
    type Key: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static;

    /// The element's key.
    fn uid(&self) -> Self::Key;
}
