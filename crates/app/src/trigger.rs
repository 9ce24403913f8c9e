//! Trigger modules — per-rule runtime objects that fire rules.
//!
//! A trigger handler subscribes to the [`EventBus`], evaluates its condition
//! against incoming events (and ambient state such as the start level) and
//! calls back into the automation runtime when it matches.
//!
//! Every handler moves through [`TriggerState`]: `Created` → `Fired`
//! (fire-once handlers only) → `Disposed`. All transitions go through
//! [`TriggerState::next`].

pub mod factory;
pub mod generic_event;
pub mod system_startlevel;

pub use factory::TriggerHandlerFactory;
pub use generic_event::GenericEventTriggerHandler;
pub use system_startlevel::SystemTriggerHandler;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use hubcore_domain::id::SubscriptionId;

use crate::event_bus::{EventBus, EventSubscriber};

/// Named outputs handed to the callback when a trigger fires.
pub type TriggerOutputs = serde_json::Map<String, serde_json::Value>;

/// Receives fired triggers.
pub trait TriggerHandlerCallback: Send + Sync {
    fn triggered(&self, rule_uid: &str, module_id: &str, outputs: &TriggerOutputs);
}

/// Whether a trigger fires at most once or every time it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirePolicy {
    Once,
    Repeatable,
}

/// Lifecycle of a trigger handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Created,
    Fired,
    Disposed,
}

/// Input of the trigger state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerInput {
    Fire(FirePolicy),
    Dispose,
}

impl TriggerState {
    /// The state reached from `self` on `input`, or `None` when the input is
    /// rejected in this state.
    #[must_use]
    pub fn next(self, input: TriggerInput) -> Option<Self> {
        match (self, input) {
            (Self::Created, TriggerInput::Fire(FirePolicy::Once)) => Some(Self::Fired),
            (Self::Created, TriggerInput::Fire(FirePolicy::Repeatable)) => Some(Self::Created),
            (Self::Fired | Self::Disposed, TriggerInput::Fire(_))
            | (Self::Disposed, TriggerInput::Dispose) => None,
            (Self::Created | Self::Fired, TriggerInput::Dispose) => Some(Self::Disposed),
        }
    }
}

/// Shared, lock-protected [`TriggerState`].
#[derive(Debug)]
pub struct TriggerCell {
    state: Mutex<TriggerState>,
}

impl Default for TriggerCell {
    fn default() -> Self {
        Self {
            state: Mutex::new(TriggerState::Created),
        }
    }
}

impl TriggerCell {
    #[must_use]
    pub fn state(&self) -> TriggerState {
        *self.state.lock()
    }

    /// Apply `input`; returns whether it was accepted.
    ///
    /// The decision and the state change happen under one lock, so of many
    /// concurrent fire attempts on a fire-once trigger exactly one wins.
    pub fn apply(&self, input: TriggerInput) -> bool {
        let mut state = self.state.lock();
        match state.next(input) {
            Some(next) => {
                *state = next;
                true
            }
            None => false,
        }
    }
}

/// Identity, callback slot and state shared by every handler kind.
pub struct TriggerContext {
    pub rule_uid: String,
    pub module_id: String,
    cell: TriggerCell,
    callback: RwLock<Option<Arc<dyn TriggerHandlerCallback>>>,
}

impl TriggerContext {
    #[must_use]
    pub fn new(rule_uid: impl Into<String>, module_id: impl Into<String>) -> Self {
        Self {
            rule_uid: rule_uid.into(),
            module_id: module_id.into(),
            cell: TriggerCell::default(),
            callback: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> TriggerState {
        self.cell.state()
    }

    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.callback.read().is_some()
    }

    fn set_callback(&self, callback: Arc<dyn TriggerHandlerCallback>) {
        *self.callback.write() = Some(callback);
    }

    /// Fire under `policy`: flip the state, then call back outside the lock.
    /// Returns whether the callback ran.
    pub fn fire(&self, policy: FirePolicy, outputs: &TriggerOutputs) -> bool {
        let Some(callback) = self.callback.read().clone() else {
            return false;
        };
        if !self.cell.apply(TriggerInput::Fire(policy)) {
            return false;
        }
        tracing::debug!(rule = %self.rule_uid, module = %self.module_id, "trigger fired");
        callback.triggered(&self.rule_uid, &self.module_id, outputs);
        true
    }

    fn dispose(&self) -> bool {
        let disposed = self.cell.apply(TriggerInput::Dispose);
        if disposed {
            self.callback.write().take();
        }
        disposed
    }
}

/// The event-facing half of a handler, subscribed to the bus.
pub trait TriggerCore: EventSubscriber {
    fn context(&self) -> &TriggerContext;

    /// Called after a callback is attached.
    fn on_callback_attached(&self) {}
}

/// Handle owning one subscribed trigger core.
///
/// Dropping the handle disposes it.
pub struct TriggerHandler {
    module_type: &'static str,
    core: Arc<dyn TriggerCore>,
    bus: Arc<EventBus>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl TriggerHandler {
    /// Subscribe `core` to `bus` and wrap it.
    pub fn register<T>(module_type: &'static str, core: Arc<T>, bus: Arc<EventBus>) -> Self
    where
        T: TriggerCore + 'static,
    {
        let subscription = bus.subscribe(core.clone());
        Self {
            module_type,
            core,
            bus,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Module type uid this handler implements.
    #[must_use]
    pub fn module_type(&self) -> &'static str {
        self.module_type
    }

    #[must_use]
    pub fn rule_uid(&self) -> &str {
        &self.core.context().rule_uid
    }

    #[must_use]
    pub fn module_id(&self) -> &str {
        &self.core.context().module_id
    }

    #[must_use]
    pub fn state(&self) -> TriggerState {
        self.core.context().state()
    }

    /// Attach the callback; events received before this are ignored.
    pub fn set_callback(&self, callback: Arc<dyn TriggerHandlerCallback>) {
        let context = self.core.context();
        if context.state() == TriggerState::Disposed {
            return;
        }
        context.set_callback(callback);
        self.core.on_callback_attached();
    }

    /// Unsubscribe and enter `Disposed`. Safe to call repeatedly.
    pub fn dispose(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.bus.unsubscribe(id);
        }
        if self.core.context().dispose() {
            tracing::debug!(
                rule = %self.rule_uid(),
                module = %self.module_id(),
                "trigger disposed"
            );
        }
    }
}

impl Drop for TriggerHandler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for TriggerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerHandler")
            .field("module_type", &self.module_type)
            .field("rule_uid", &self.rule_uid())
            .field("module_id", &self.module_id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Callback and start-level fakes shared by trigger tests.

    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    use crate::ports::StartLevelService;

    use super::{TriggerHandlerCallback, TriggerOutputs};

    #[derive(Default)]
    pub struct RecordingCallback {
        pub calls: Mutex<Vec<(String, String, TriggerOutputs)>>,
    }

    impl RecordingCallback {
        pub fn count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl TriggerHandlerCallback for RecordingCallback {
        fn triggered(&self, rule_uid: &str, module_id: &str, outputs: &TriggerOutputs) {
            self.calls
                .lock()
                .push((rule_uid.to_string(), module_id.to_string(), outputs.clone()));
        }
    }

    #[derive(Default)]
    pub struct FixedStartLevel(pub AtomicU32);

    impl FixedStartLevel {
        pub fn at(level: u32) -> Self {
            Self(AtomicU32::new(level))
        }
    }

    impl StartLevelService for FixedStartLevel {
        fn start_level(&self) -> u32 {
            self.0.load(Ordering::SeqCst)
        }
    }
}
