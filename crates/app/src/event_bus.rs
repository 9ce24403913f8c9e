//! In-process event bus with synchronous, per-subscriber filtered delivery.
//!
//! [`EventBus::post`] hands the event to every matching subscriber on the
//! caller's thread before returning. The subscriber list is snapshotted
//! before iterating, so subscribing or unsubscribing from inside
//! [`EventSubscriber::receive`] only affects later posts.
//!
//! Async consumers can tap every event through [`EventBus::stream`], a
//! tokio [`broadcast`] bridge.

pub mod filter;

pub use filter::{EventFilter, TopicFilter};

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use hubcore_domain::event::Event;
use hubcore_domain::id::SubscriptionId;

/// Which event types a subscriber wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventInterest {
    /// Every event type.
    All,
    /// Only the listed type discriminators.
    Types(BTreeSet<String>),
}

impl EventInterest {
    /// Interest in the given type discriminators.
    pub fn types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Types(types.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::Types(types) => types.contains(event_type),
        }
    }
}

/// Receives events from an [`EventBus`].
pub trait EventSubscriber: Send + Sync {
    /// Event types this subscriber wants; read once at subscription.
    fn subscribed_event_types(&self) -> EventInterest;

    /// Optional predicate evaluated before each delivery.
    fn filter(&self) -> Option<&dyn EventFilter> {
        None
    }

    /// Handle one event. Runs on the posting thread.
    fn receive(&self, event: &Event);
}

struct Subscription {
    id: SubscriptionId,
    interest: EventInterest,
    subscriber: Arc<dyn EventSubscriber>,
    active: AtomicBool,
    // Deliveries hold it shared; unsubscribe takes it exclusively to wait
    // for deliveries already running on other threads.
    gate: RwLock<()>,
}

thread_local! {
    static DELIVERING: RefCell<Vec<SubscriptionId>> = const { RefCell::new(Vec::new()) };
}

/// Marks a subscription as being delivered to on this thread.
struct DeliveryMark;

impl DeliveryMark {
    fn enter(id: SubscriptionId) -> Self {
        DELIVERING.with(|stack| stack.borrow_mut().push(id));
        Self
    }

    fn any_on_this_thread() -> bool {
        DELIVERING.with(|stack| !stack.borrow().is_empty())
    }
}

impl Drop for DeliveryMark {
    fn drop(&mut self) {
        DELIVERING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Synchronous publish/subscribe hub.
pub struct EventBus {
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    streams: Mutex<Vec<broadcast::Sender<Event>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
        }
    }

    /// Register `subscriber`; it sees every event posted after this returns.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriptionId {
        let id = SubscriptionId::new();
        let subscription = Arc::new(Subscription {
            id,
            interest: subscriber.subscribed_event_types(),
            subscriber,
            active: AtomicBool::new(true),
            gate: RwLock::new(()),
        });
        tracing::debug!(subscription = %id, interest = ?subscription.interest, "subscribed");
        self.subscriptions.write().push(subscription);
        id
    }

    /// Remove a subscription. Returns `false` when `id` is unknown.
    ///
    /// Once this returns no new delivery to the subscriber starts. Called
    /// from outside any delivery, it also waits for deliveries already
    /// running on other threads. Called from inside a delivery it does not
    /// wait, since the delivery running elsewhere may itself be waiting on
    /// this thread.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut subscriptions = self.subscriptions.write();
            subscriptions
                .iter()
                .position(|subscription| subscription.id == id)
                .map(|index| subscriptions.remove(index))
        };
        let Some(subscription) = removed else {
            return false;
        };
        subscription.active.store(false, Ordering::SeqCst);
        if !DeliveryMark::any_on_this_thread() {
            drop(subscription.gate.write());
        }
        tracing::debug!(subscription = %id, "unsubscribed");
        true
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Deliver `event` to every interested subscriber, then to the streams.
    ///
    /// A panicking subscriber is logged and skipped.
    pub fn post(&self, event: &Event) {
        let snapshot: Vec<Arc<Subscription>> = self.subscriptions.read().clone();
        tracing::trace!(%event, subscribers = snapshot.len(), "posting event");
        for subscription in snapshot {
            if !subscription.interest.matches(&event.event_type) {
                continue;
            }
            Self::deliver(&subscription, event);
        }
        let mut streams = self.streams.lock();
        streams.retain(|sender| sender.receiver_count() > 0);
        for sender in streams.iter() {
            let _ = sender.send(event.clone());
        }
    }

    fn deliver(subscription: &Subscription, event: &Event) {
        let _gate = subscription.gate.read_recursive();
        if !subscription.active.load(Ordering::SeqCst) {
            return;
        }
        let _mark = DeliveryMark::enter(subscription.id);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let accepted = subscription
                .subscriber
                .filter()
                .is_none_or(|filter| filter.apply(event));
            if accepted {
                subscription.subscriber.receive(event);
            }
        }));
        if let Err(panic) = outcome {
            let message = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            tracing::error!(
                subscription = %subscription.id,
                %event,
                panic = %message,
                "subscriber panicked while handling event"
            );
        }
    }

    /// Tap every event posted from now on.
    ///
    /// A receiver that lags behind by more than `capacity` events loses the
    /// oldest ones.
    #[must_use]
    pub fn stream(&self, capacity: usize) -> broadcast::Receiver<Event> {
        let (sender, receiver) = broadcast::channel(capacity);
        self.streams.lock().push(sender);
        receiver
    }
}
