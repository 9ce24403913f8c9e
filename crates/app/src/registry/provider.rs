//! Provider contract — a source contributing elements to a registry.

use std::sync::Arc;

use parking_lot::RwLock;

use hubcore_domain::id::ListenerId;
use hubcore_domain::identifiable::Identifiable;

/// Observer of element changes.
///
/// Used both by registries listening to their providers and by consumers
/// listening to a registry.
pub trait ProviderChangeListener<E>: Send + Sync {
    fn added(&self, element: &E);

    fn updated(&self, old: &E, new: &E);

    fn removed(&self, element: &E);
}

/// A source of elements.
pub trait Provider<E: Identifiable>: Send + Sync {
    /// Snapshot of every element currently provided.
    fn get_all(&self) -> Vec<E>;

    /// Start notifying `listener` of changes.
    fn add_listener(&self, listener: Arc<dyn ProviderChangeListener<E>>) -> ListenerId;

    /// Stop notifying the listener registered under `id`.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Listener list shared by provider implementations.
///
/// Notifications iterate over a snapshot, so listeners may register or
/// unregister from inside a callback.
pub struct ProviderListeners<E> {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn ProviderChangeListener<E>>)>>,
}

impl<E> Default for ProviderListeners<E> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<E> ProviderListeners<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn ProviderChangeListener<E>>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.write().push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    pub fn notify_added(&self, element: &E) {
        for listener in self.snapshot() {
            listener.added(element);
        }
    }

    pub fn notify_updated(&self, old: &E, new: &E) {
        for listener in self.snapshot() {
            listener.updated(old, new);
        }
    }

    pub fn notify_removed(&self, element: &E) {
        for listener in self.snapshot() {
            listener.removed(element);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn ProviderChangeListener<E>>> {
        self.listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Change, RecordingListener};
    use super::*;

    #[test]
    fn should_notify_every_listener_until_removed() {
        let listeners = ProviderListeners::<String>::new();
        let first = Arc::new(RecordingListener::<String>::default());
        let second = Arc::new(RecordingListener::<String>::default());
        let first_id = listeners.add(first.clone());
        listeners.add(second.clone());

        listeners.notify_added(&"a".to_string());
        assert!(listeners.remove(first_id));
        assert!(!listeners.remove(first_id));
        listeners.notify_removed(&"a".to_string());

        assert_eq!(first.take(), vec![Change::Added("a".to_string())]);
        assert_eq!(
            second.take(),
            vec![
                Change::Added("a".to_string()),
                Change::Removed("a".to_string())
            ]
        );
        assert_eq!(listeners.len(), 1);
    }
}
