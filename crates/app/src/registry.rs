//! Registry — one logical collection aggregated from many providers.
//!
//! Every provider contributes elements by key. When several providers
//! contribute the same key, exactly one contribution is visible:
//!
//! 1. a managed provider wins over a read-only one;
//! 2. among providers of the same kind, the most recently added wins.
//!
//! Provider notifications are translated against the visible view: a key
//! becoming visible is `added`, a key disappearing is `removed`, a change of
//! the visible element (including a different provider taking over) is
//! `updated`, and a change to a shadowed contribution is not reported.

pub mod forwarder;
pub mod provider;
pub mod static_provider;

pub use forwarder::RegistryEventForwarder;
pub use provider::{Provider, ProviderChangeListener, ProviderListeners};
pub use static_provider::StaticProvider;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use hubcore_domain::id::{ListenerId, ProviderId};
use hubcore_domain::identifiable::Identifiable;

/// How a provider takes part in collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderKind {
    ReadOnly,
    Managed,
}

/// Precedence of a provider; the greatest rank is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Rank {
    kind: ProviderKind,
    order: u64,
}

enum Change<E> {
    Added(E),
    Updated(E, E),
    Removed(E),
}

struct Slot<E: Identifiable> {
    id: ProviderId,
    rank: Rank,
    provider: Arc<dyn Provider<E>>,
    listener: ListenerId,
}

struct State<E: Identifiable> {
    slots: Vec<Slot<E>>,
    contributions: HashMap<E::Key, BTreeMap<Rank, E>>,
    next_order: u64,
}

impl<E: Identifiable + Clone> State<E> {
    fn visible(&self, key: &E::Key) -> Option<(Rank, E)> {
        self.contributions
            .get(key)
            .and_then(|by_rank| by_rank.iter().next_back())
            .map(|(rank, element)| (*rank, element.clone()))
    }

    fn has_rank(&self, rank: Rank) -> bool {
        self.slots.iter().any(|slot| slot.rank == rank)
    }

    /// Set (or clear, with `None`) the contribution of `rank` under `key` and
    /// report how the visible element changed.
    fn apply(&mut self, key: E::Key, rank: Rank, element: Option<E>) -> Option<Change<E>> {
        let before = self.visible(&key);
        let by_rank = self.contributions.entry(key.clone()).or_default();
        match element {
            Some(element) => {
                by_rank.insert(rank, element);
            }
            None => {
                by_rank.remove(&rank);
            }
        }
        if by_rank.is_empty() {
            self.contributions.remove(&key);
        }
        let after = self.visible(&key);
        match (before, after) {
            (None, None) => None,
            (None, Some((_, new))) => Some(Change::Added(new)),
            (Some((_, old)), None) => Some(Change::Removed(old)),
            (Some((old_rank, old)), Some((new_rank, new))) => {
                (old_rank != new_rank || new_rank == rank).then_some(Change::Updated(old, new))
            }
        }
    }
}

struct Inner<E: Identifiable> {
    kind: &'static str,
    state: Mutex<State<E>>,
    // Held across compute-then-notify so listeners observe changes in the
    // order they were applied.
    ordering: ReentrantMutex<()>,
    listeners: ProviderListeners<E>,
}

impl<E> Inner<E>
where
    E: Identifiable + Clone + Send + Sync + 'static,
{
    fn on_provider_change<F>(&self, rank: Rank, update: F)
    where
        F: FnOnce(&mut State<E>) -> Vec<Change<E>>,
    {
        let _ordering = self.ordering.lock();
        let changes = {
            let mut state = self.state.lock();
            if !state.has_rank(rank) {
                tracing::trace!(registry = self.kind, "ignoring change from removed provider");
                return;
            }
            update(&mut state)
        };
        self.notify(changes);
    }

    fn notify(&self, changes: Vec<Change<E>>) {
        for change in changes {
            match change {
                Change::Added(element) => {
                    tracing::debug!(registry = self.kind, key = %element.uid(), "element added");
                    self.listeners.notify_added(&element);
                }
                Change::Updated(old, new) => {
                    tracing::debug!(registry = self.kind, key = %new.uid(), "element updated");
                    self.listeners.notify_updated(&old, &new);
                }
                Change::Removed(element) => {
                    tracing::debug!(registry = self.kind, key = %element.uid(), "element removed");
                    self.listeners.notify_removed(&element);
                }
            }
        }
    }
}

/// Listener the registry registers on each of its providers.
struct SlotListener<E: Identifiable> {
    inner: Weak<Inner<E>>,
    rank: Rank,
}

impl<E> ProviderChangeListener<E> for SlotListener<E>
where
    E: Identifiable + Clone + Send + Sync + 'static,
{
    fn added(&self, element: &E) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let rank = self.rank;
        inner.on_provider_change(rank, |state| {
            state
                .apply(element.uid(), rank, Some(element.clone()))
                .into_iter()
                .collect()
        });
    }

    fn updated(&self, old: &E, new: &E) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let rank = self.rank;
        inner.on_provider_change(rank, |state| {
            let (old_key, new_key) = (old.uid(), new.uid());
            let mut changes = Vec::new();
            if old_key != new_key {
                changes.extend(state.apply(old_key, rank, None));
            }
            changes.extend(state.apply(new_key, rank, Some(new.clone())));
            changes
        });
    }

    fn removed(&self, element: &E) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let rank = self.rank;
        inner.on_provider_change(rank, |state| {
            state.apply(element.uid(), rank, None).into_iter().collect()
        });
    }
}

/// Aggregated, observable collection of elements of one kind.
pub struct Registry<E: Identifiable> {
    inner: Arc<Inner<E>>,
}

impl<E> Registry<E>
where
    E: Identifiable + Clone + Send + Sync + 'static,
{
    /// Create an empty registry; `kind` names the elements in logs and
    /// event topics (e.g. `rules`).
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                state: Mutex::new(State {
                    slots: Vec::new(),
                    contributions: HashMap::new(),
                    next_order: 0,
                }),
                ordering: ReentrantMutex::new(()),
                listeners: ProviderListeners::new(),
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    /// Add a read-only provider and announce what it makes visible.
    pub fn add_provider(&self, provider: Arc<dyn Provider<E>>) -> ProviderId {
        self.attach(provider, ProviderKind::ReadOnly)
    }

    /// Add the writable provider of this collection; its elements shadow
    /// every read-only contribution.
    pub fn add_managed_provider(&self, provider: Arc<dyn Provider<E>>) -> ProviderId {
        self.attach(provider, ProviderKind::Managed)
    }

    fn attach(&self, provider: Arc<dyn Provider<E>>, kind: ProviderKind) -> ProviderId {
        let _ordering = self.inner.ordering.lock();
        let id = ProviderId::new();
        let changes = {
            let mut state = self.inner.state.lock();
            let rank = Rank {
                kind,
                order: state.next_order,
            };
            state.next_order += 1;
            let listener = provider.add_listener(Arc::new(SlotListener {
                inner: Arc::downgrade(&self.inner),
                rank,
            }));
            let elements = provider.get_all();
            state.slots.push(Slot {
                id,
                rank,
                provider,
                listener,
            });
            elements
                .into_iter()
                .filter_map(|element| state.apply(element.uid(), rank, Some(element)))
                .collect::<Vec<_>>()
        };
        tracing::debug!(registry = self.inner.kind, provider = %id, ?kind, "provider added");
        self.inner.notify(changes);
        id
    }

    /// Remove a provider and announce what disappears or resurfaces.
    /// Returns `false` when `id` is unknown.
    pub fn remove_provider(&self, id: ProviderId) -> bool {
        let _ordering = self.inner.ordering.lock();
        let (slot, changes) = {
            let mut state = self.inner.state.lock();
            let Some(index) = state.slots.iter().position(|slot| slot.id == id) else {
                return false;
            };
            let slot = state.slots.remove(index);
            let keys: Vec<E::Key> = state
                .contributions
                .iter()
                .filter(|(_, by_rank)| by_rank.contains_key(&slot.rank))
                .map(|(key, _)| key.clone())
                .collect();
            let changes: Vec<_> = keys
                .into_iter()
                .filter_map(|key| state.apply(key, slot.rank, None))
                .collect();
            (slot, changes)
        };
        slot.provider.remove_listener(slot.listener);
        tracing::debug!(registry = self.inner.kind, provider = %id, "provider removed");
        self.inner.notify(changes);
        true
    }

    /// Number of providers currently aggregated.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.inner.state.lock().slots.len()
    }

    /// Every visible element.
    #[must_use]
    pub fn get_all(&self) -> Vec<E> {
        self.inner
            .state
            .lock()
            .contributions
            .values()
            .filter_map(|by_rank| by_rank.values().next_back().cloned())
            .collect()
    }

    /// The visible element under `key`.
    #[must_use]
    pub fn get(&self, key: &E::Key) -> Option<E> {
        self.inner
            .state
            .lock()
            .visible(key)
            .map(|(_, element)| element)
    }

    #[must_use]
    pub fn contains(&self, key: &E::Key) -> bool {
        self.inner.state.lock().contributions.contains_key(key)
    }

    /// Start observing visible changes.
    pub fn add_listener(&self, listener: Arc<dyn ProviderChangeListener<E>>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }
}

impl<E> Provider<E> for Registry<E>
where
    E: Identifiable + Clone + Send + Sync + 'static,
{
    fn get_all(&self) -> Vec<E> {
        Registry::get_all(self)
    }

    fn add_listener(&self, listener: Arc<dyn ProviderChangeListener<E>>) -> ListenerId {
        Registry::add_listener(self, listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        Registry::remove_listener(self, id)
    }
}

impl<E: Identifiable> Drop for Registry<E> {
    fn drop(&mut self) {
        let slots = std::mem::take(&mut self.inner.state.lock().slots);
        for slot in slots {
            slot.provider.remove_listener(slot.listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::provider::testing::{Change as Seen, RecordingListener};
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Link {
        uid: String,
        source: &'static str,
    }

    impl Identifiable for Link {
        type Key = String;

        fn uid(&self) -> String {
            self.uid.clone()
        }
    }

    fn link(uid: &str, source: &'static str) -> Link {
        Link {
            uid: uid.to_string(),
            source,
        }
    }

    fn uids(registry: &Registry<Link>) -> BTreeSet<String> {
        registry.get_all().into_iter().map(|l| l.uid).collect()
    }

    fn key(uid: &str) -> String {
        uid.to_string()
    }

    #[test]
    fn should_aggregate_providers_with_last_added_winning() {
        let registry = Registry::<Link>::new("links");
        let a = Arc::new(StaticProvider::with([link("x", "A"), link("y", "A")]));
        let b = Arc::new(StaticProvider::with([link("y", "B"), link("z", "B")]));
        registry.add_provider(a);
        registry.add_provider(b);

        assert_eq!(
            uids(&registry),
            BTreeSet::from([key("x"), key("y"), key("z")])
        );
        assert_eq!(registry.get(&key("y")).unwrap().source, "B");
        assert!(registry.contains(&key("x")));
        assert!(!registry.contains(&key("w")));
    }

    #[test]
    fn should_let_managed_provider_win_regardless_of_order() {
        let registry = Registry::<Link>::new("links");
        let managed = Arc::new(StaticProvider::with([link("y", "managed")]));
        let file = Arc::new(StaticProvider::with([link("y", "file")]));
        registry.add_managed_provider(managed);
        registry.add_provider(file);

        assert_eq!(registry.get(&key("y")).unwrap().source, "managed");
    }

    #[test]
    fn should_translate_provider_changes_against_visible_view() {
        let registry = Registry::<Link>::new("links");
        let a = Arc::new(StaticProvider::with([link("y", "A")]));
        let b = Arc::new(StaticProvider::<Link>::new());
        registry.add_provider(a.clone());
        registry.add_provider(b.clone());
        let listener = Arc::new(RecordingListener::<Link>::default());
        registry.add_listener(listener.clone());

        b.put(link("y", "B"));
        a.put(link("y", "A2"));
        b.remove(&key("y"));
        a.remove(&key("y"));

        assert_eq!(
            listener.take(),
            vec![
                Seen::Updated(link("y", "A"), link("y", "B")),
                Seen::Updated(link("y", "B"), link("y", "A2")),
                Seen::Removed(link("y", "A2")),
            ]
        );
    }

    #[test]
    fn should_emit_synthetic_changes_when_providers_come_and_go() {
        let registry = Registry::<Link>::new("links");
        let a = Arc::new(StaticProvider::with([link("x", "A"), link("y", "A")]));
        registry.add_provider(a);
        let listener = Arc::new(RecordingListener::<Link>::default());
        registry.add_listener(listener.clone());

        let b = Arc::new(StaticProvider::with([link("y", "B")]));
        let b_id = registry.add_provider(b.clone());
        assert_eq!(
            listener.take(),
            vec![Seen::Updated(link("y", "A"), link("y", "B"))]
        );

        assert!(registry.remove_provider(b_id));
        assert!(!registry.remove_provider(b_id));
        assert_eq!(
            listener.take(),
            vec![Seen::Updated(link("y", "B"), link("y", "A"))]
        );

        b.put(link("q", "B"));
        assert!(listener.take().is_empty());
        assert_eq!(registry.provider_count(), 1);
    }

    #[test]
    fn should_report_added_and_removed_for_exclusive_keys() {
        let registry = Registry::<Link>::new("links");
        let listener = Arc::new(RecordingListener::<Link>::default());
        registry.add_listener(listener.clone());
        let a = Arc::new(StaticProvider::with([link("x", "A")]));
        let a_id = registry.add_provider(a);
        registry.remove_provider(a_id);

        assert_eq!(
            listener.take(),
            vec![Seen::Added(link("x", "A")), Seen::Removed(link("x", "A"))]
        );
        assert!(registry.get_all().is_empty());
    }

    #[test]
    fn should_follow_key_change_within_one_provider() {
        let registry = Registry::<Link>::new("links");
        let a = Arc::new(StaticProvider::<Link>::new());
        registry.add_provider(a.clone());
        let listener = Arc::new(RecordingListener::<Link>::default());
        registry.add_listener(listener.clone());

        let slot = SlotListener {
            inner: Arc::downgrade(&registry.inner),
            rank: registry.inner.state.lock().slots[0].rank,
        };
        a.put(link("old", "A"));
        slot.updated(&link("old", "A"), &link("new", "A"));

        assert_eq!(
            listener.take(),
            vec![
                Seen::Added(link("old", "A")),
                Seen::Removed(link("old", "A")),
                Seen::Added(link("new", "A")),
            ]
        );
    }

    #[test]
    fn should_unregister_from_providers_when_dropped() {
        let provider = Arc::new(StaticProvider::with([link("x", "A")]));
        let registry = Registry::<Link>::new("links");
        registry.add_provider(provider.clone());
        assert_eq!(provider.listener_count(), 1);

        drop(registry);
        assert_eq!(provider.listener_count(), 0);
    }
}
