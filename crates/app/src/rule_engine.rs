//! Rule engine — keeps one set of trigger handlers per active rule.
//!
//! The engine listens to the rule [`Registry`]. A rule that appears is
//! activated by creating a handler for each of its trigger modules; a rule
//! that changes is re-activated from scratch; a rule that disappears has its
//! handlers disposed. When a handler fires, the engine counts the execution
//! and posts a `RuleTriggeredEvent` on the bus.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use hubcore_domain::error::HubError;
use hubcore_domain::event::Event;
use hubcore_domain::id::ListenerId;
use hubcore_domain::rule::Rule;

use crate::event_bus::EventBus;
use crate::registry::{ProviderChangeListener, Registry};
use crate::trigger::{
    TriggerHandler, TriggerHandlerCallback, TriggerHandlerFactory, TriggerOutputs,
};

struct EngineInner {
    factory: TriggerHandlerFactory,
    bus: Arc<EventBus>,
    active: Mutex<HashMap<String, Vec<TriggerHandler>>>,
    executions: Mutex<HashMap<String, u64>>,
}

impl EngineInner {
    fn activate(self: &Arc<Self>, rule: &Rule) -> Result<usize, HubError> {
        let previous = self.active.lock().remove(&rule.uid);
        drop(previous);

        let handlers = rule
            .triggers
            .iter()
            .map(|module| self.factory.create(&rule.uid, module))
            .collect::<Result<Vec<_>, _>>()?;
        let callback: Arc<dyn TriggerHandlerCallback> = Arc::new(EngineCallback {
            inner: Arc::downgrade(self),
        });
        for handler in &handlers {
            handler.set_callback(Arc::clone(&callback));
        }
        let count = handlers.len();
        let replaced = self.active.lock().insert(rule.uid.clone(), handlers);
        drop(replaced);
        tracing::debug!(rule = %rule.uid, triggers = count, "rule activated");
        Ok(count)
    }

    fn deactivate(&self, uid: &str) -> bool {
        let removed = self.active.lock().remove(uid);
        match removed {
            Some(handlers) => {
                drop(handlers);
                tracing::debug!(rule = %uid, "rule deactivated");
                true
            }
            None => false,
        }
    }

    fn activate_or_warn(self: &Arc<Self>, rule: &Rule) {
        if let Err(err) = self.activate(rule) {
            tracing::warn!(rule = %rule.uid, error = %err, "rule left inactive");
        }
    }
}

/// Callback handed to every handler created by the engine.
struct EngineCallback {
    inner: Weak<EngineInner>,
}

impl TriggerHandlerCallback for EngineCallback {
    fn triggered(&self, rule_uid: &str, module_id: &str, outputs: &TriggerOutputs) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        *inner
            .executions
            .lock()
            .entry(rule_uid.to_string())
            .or_default() += 1;
        tracing::info!(rule = %rule_uid, module = %module_id, "rule triggered");
        inner
            .bus
            .post(&Event::rule_triggered(rule_uid, module_id, outputs));
    }
}

/// Registry listener driving activation.
struct RuleListener {
    inner: Weak<EngineInner>,
}

impl ProviderChangeListener<Rule> for RuleListener {
    fn added(&self, element: &Rule) {
        if let Some(inner) = self.inner.upgrade() {
            inner.activate_or_warn(element);
        }
    }

    fn updated(&self, old: &Rule, new: &Rule) {
        if let Some(inner) = self.inner.upgrade() {
            if old.uid != new.uid {
                inner.deactivate(&old.uid);
            }
            inner.activate_or_warn(new);
        }
    }

    fn removed(&self, element: &Rule) {
        if let Some(inner) = self.inner.upgrade() {
            inner.deactivate(&element.uid);
        }
    }
}

/// Activates rules and records their executions.
pub struct RuleEngine {
    inner: Arc<EngineInner>,
}

impl RuleEngine {
    /// Create an engine building handlers with `factory` and announcing
    /// executions on `bus`.
    #[must_use]
    pub fn new(factory: TriggerHandlerFactory, bus: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                factory,
                bus,
                active: Mutex::new(HashMap::new()),
                executions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Follow `registry`: activate its current rules and every later change.
    pub fn attach(&self, registry: &Registry<Rule>) -> ListenerId {
        let listener = registry.add_listener(Arc::new(RuleListener {
            inner: Arc::downgrade(&self.inner),
        }));
        for rule in registry.get_all() {
            self.inner.activate_or_warn(&rule);
        }
        listener
    }

    /// Create and arm the trigger handlers of `rule`, replacing any it had.
    ///
    /// Returns the number of armed triggers.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Configuration`] when a trigger module is unknown or
    /// malformed; the rule is then inactive.
    pub fn activate(&self, rule: &Rule) -> Result<usize, HubError> {
        self.inner.activate(rule)
    }

    /// Dispose the handlers of rule `uid`. Returns `false` if it was inactive.
    pub fn deactivate(&self, uid: &str) -> bool {
        self.inner.deactivate(uid)
    }

    #[must_use]
    pub fn is_active(&self, uid: &str) -> bool {
        self.inner.active.lock().contains_key(uid)
    }

    /// Uids of the active rules, sorted.
    #[must_use]
    pub fn active_rules(&self) -> Vec<String> {
        let mut uids: Vec<String> = self.inner.active.lock().keys().cloned().collect();
        uids.sort();
        uids
    }

    /// How many times rule `uid` has been triggered.
    #[must_use]
    pub fn executions(&self, uid: &str) -> u64 {
        self.inner
            .executions
            .lock()
            .get(uid)
            .copied()
            .unwrap_or_default()
    }
}

impl Drop for RuleEngine {
    fn drop(&mut self) {
        let active = std::mem::take(&mut *self.inner.active.lock());
        drop(active);
    }
}
