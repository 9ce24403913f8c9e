//! Read-only provider fed from outside (files, remote sync, tests).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use hubcore_domain::id::ListenerId;
use hubcore_domain::identifiable::Identifiable;

use super::provider::{Provider, ProviderChangeListener, ProviderListeners};

/// Provider whose content is replaced wholesale or element by element.
///
/// Listeners are notified after the element map is updated and in the order
/// the changes were made. A listener must not call back into the mutating
/// methods of the same provider.
pub struct StaticProvider<E: Identifiable> {
    elements: Mutex<HashMap<E::Key, E>>,
    writer: Mutex<()>,
    listeners: ProviderListeners<E>,
}

enum Change<E> {
    Added(E),
    Updated(E, E),
    Removed(E),
}

impl<E> Default for StaticProvider<E>
where
    E: Identifiable + Clone + PartialEq + Send + Sync,
{
    fn default() -> Self {
        Self {
            elements: Mutex::new(HashMap::new()),
            writer: Mutex::new(()),
            listeners: ProviderListeners::new(),
        }
    }
}

impl<E> StaticProvider<E>
where
    E: Identifiable + Clone + PartialEq + Send + Sync,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider pre-filled with `elements`; later duplicates win.
    pub fn with(elements: impl IntoIterator<Item = E>) -> Self {
        let provider = Self::new();
        provider
            .elements
            .lock()
            .extend(elements.into_iter().map(|element| (element.uid(), element)));
        provider
    }

    /// Insert or replace one element, returning the replaced one.
    pub fn put(&self, element: E) -> Option<E> {
        let _writer = self.writer.lock();
        let previous = self.elements.lock().insert(element.uid(), element.clone());
        match &previous {
            Some(old) if *old == element => {}
            Some(old) => self.listeners.notify_updated(old, &element),
            None => self.listeners.notify_added(&element),
        }
        previous
    }

    /// Drop the element under `key`.
    pub fn remove(&self, key: &E::Key) -> Option<E> {
        let _writer = self.writer.lock();
        let removed = self.elements.lock().remove(key);
        if let Some(element) = &removed {
            self.listeners.notify_removed(element);
        }
        removed
    }

    /// Swap the whole content for `elements`, notifying only real changes.
    pub fn replace_all(&self, elements: impl IntoIterator<Item = E>) {
        let _writer = self.writer.lock();
        let changes = {
            let mut current = self.elements.lock();
            let mut next: HashMap<E::Key, E> = elements
                .into_iter()
                .map(|element| (element.uid(), element))
                .collect();
            let mut changes = Vec::new();
            for (key, old) in current.drain() {
                match next.remove(&key) {
                    Some(new) if new == old => {
                        changes.push((key, None, Some(new)));
                    }
                    Some(new) => changes.push((key, Some(Change::Updated(old, new.clone())), Some(new))),
                    None => changes.push((key, Some(Change::Removed(old)), None)),
                }
            }
            for (key, new) in next {
                changes.push((key, Some(Change::Added(new.clone())), Some(new)));
            }
            let mut notifications = Vec::new();
            for (key, change, keep) in changes {
                if let Some(element) = keep {
                    current.insert(key, element);
                }
                notifications.extend(change);
            }
            notifications
        };
        for change in changes {
            match change {
                Change::Added(element) => self.listeners.notify_added(&element),
                Change::Updated(old, new) => self.listeners.notify_updated(&old, &new),
                Change::Removed(element) => self.listeners.notify_removed(&element),
            }
        }
    }

    /// Element under `key`, if provided.
    pub fn get(&self, key: &E::Key) -> Option<E> {
        self.elements.lock().get(key).cloned()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<E> Provider<E> for StaticProvider<E>
where
    E: Identifiable + Clone + PartialEq + Send + Sync,
{
    fn get_all(&self) -> Vec<E> {
        self.elements.lock().values().cloned().collect()
    }

    fn add_listener(&self, listener: Arc<dyn ProviderChangeListener<E>>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
