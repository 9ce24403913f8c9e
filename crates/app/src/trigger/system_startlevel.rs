//! `core.SystemStartlevelTrigger` — fires once the system reaches a level.
//!
//! Levels up to [`STARTLEVEL_RULEENGINE`] are never fired by this trigger:
//! the rule engine is not running yet when they are announced.

use std::sync::Arc;

use hubcore_domain::error::HubError;
use hubcore_domain::event::{Event, types};
use hubcore_domain::rule::Module;
use hubcore_domain::startlevel::STARTLEVEL_RULEENGINE;

use crate::event_bus::{EventInterest, EventSubscriber};
use crate::ports::StartLevelService;

use super::{FirePolicy, TriggerContext, TriggerCore, TriggerOutputs};

/// Module type uid.
pub const MODULE_TYPE: &str = "core.SystemStartlevelTrigger";
/// Configuration parameter and output name.
pub const STARTLEVEL: &str = "startlevel";

/// Fire-once trigger gated on the system start level.
pub struct SystemTriggerHandler {
    context: TriggerContext,
    startlevel: u32,
    start_levels: Arc<dyn StartLevelService>,
}

impl SystemTriggerHandler {
    /// Build the handler for `module` of rule `rule_uid`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Configuration`] when `startlevel` is missing or
    /// not a non-negative integer.
    pub fn new(
        rule_uid: &str,
        module: &Module,
        start_levels: Arc<dyn StartLevelService>,
    ) -> Result<Self, HubError> {
        let startlevel = module.configuration.get_u32(STARTLEVEL)?;
        Ok(Self {
            context: TriggerContext::new(rule_uid, module.id.as_str()),
            startlevel,
            start_levels,
        })
    }

    /// Configured level.
    #[must_use]
    pub fn startlevel(&self) -> u32 {
        self.startlevel
    }

    fn reached(&self, level: u32) -> bool {
        self.startlevel > STARTLEVEL_RULEENGINE && level >= self.startlevel
    }

    fn fire(&self) {
        let mut outputs = TriggerOutputs::new();
        outputs.insert(STARTLEVEL.to_string(), self.startlevel.into());
        self.context.fire(FirePolicy::Once, &outputs);
    }
}

impl EventSubscriber for SystemTriggerHandler {
    fn subscribed_event_types(&self) -> EventInterest {
        EventInterest::types([types::STARTLEVEL])
    }

    fn receive(&self, event: &Event) {
        if !self.context.has_callback() {
            return;
        }
        let Some(level) = event.as_startlevel() else {
            tracing::trace!(%event, "ignoring malformed start-level event");
            return;
        };
        if self.reached(level) {
            self.fire();
        }
    }
}

impl TriggerCore for SystemTriggerHandler {
    fn context(&self) -> &TriggerContext {
        &self.context
    }

    fn on_callback_attached(&self) {
        let current = self.start_levels.start_level();
        if current > STARTLEVEL_RULEENGINE && self.reached(current) {
            self.fire();
        }
    }
}

#[cfg(test)]
mod tests {
    use hubcore_domain::error::ConfigurationError;

    use crate::event_bus::EventBus;
    use crate::trigger::testing::{FixedStartLevel, RecordingCallback};
    use crate::trigger::{TriggerHandler, TriggerState};

    use super::*;

    fn module(startlevel: impl Into<serde_json::Value>) -> Module {
        Module::new("t1", MODULE_TYPE).config(STARTLEVEL, startlevel)
    }

    fn handler(startlevel: u32, current: u32, bus: &Arc<EventBus>) -> TriggerHandler {
        let core = SystemTriggerHandler::new(
            "wakeup",
            &module(startlevel),
            Arc::new(FixedStartLevel::at(current)),
        )
        .unwrap();
        TriggerHandler::register(MODULE_TYPE, Arc::new(core), Arc::clone(bus))
    }

    #[test]
    fn should_fire_once_for_many_matching_events() {
        let bus = Arc::new(EventBus::new());
        let handler = handler(80, 40, &bus);
        let callback = Arc::new(RecordingCallback::default());
        handler.set_callback(callback.clone());

        bus.post(&Event::startlevel(70));
        assert_eq!(callback.count(), 0);
        bus.post(&Event::startlevel(80));
        bus.post(&Event::startlevel(100));
        bus.post(&Event::startlevel(80));

        assert_eq!(callback.count(), 1);
        assert_eq!(handler.state(), TriggerState::Fired);
        let (rule, module, outputs) = callback.calls.lock()[0].clone();
        assert_eq!((rule.as_str(), module.as_str()), ("wakeup", "t1"));
        assert_eq!(outputs[STARTLEVEL], 80);
    }

    #[test]
    fn should_fire_immediately_when_level_already_reached() {
        let bus = Arc::new(EventBus::new());
        let handler = handler(80, 100, &bus);
        let callback = Arc::new(RecordingCallback::default());

        handler.set_callback(callback.clone());

        assert_eq!(callback.count(), 1);
        bus.post(&Event::startlevel(100));
        assert_eq!(callback.count(), 1);
    }

    #[test]
    fn should_never_fire_for_levels_up_to_rule_engine() {
        let bus = Arc::new(EventBus::new());
        let handler = handler(STARTLEVEL_RULEENGINE, 100, &bus);
        let callback = Arc::new(RecordingCallback::default());
        handler.set_callback(callback.clone());

        bus.post(&Event::startlevel(100));

        assert_eq!(callback.count(), 0);
        assert_eq!(handler.state(), TriggerState::Created);
    }

    #[test]
    fn should_ignore_events_before_callback_without_changing_state() {
        let bus = Arc::new(EventBus::new());
        let handler = handler(80, 40, &bus);

        bus.post(&Event::startlevel(100));
        assert_eq!(handler.state(), TriggerState::Created);

        let callback = Arc::new(RecordingCallback::default());
        handler.set_callback(callback.clone());
        assert_eq!(callback.count(), 0);
        bus.post(&Event::startlevel(80));
        assert_eq!(callback.count(), 1);
    }

    #[test]
    fn should_stop_listening_after_dispose() {
        let bus = Arc::new(EventBus::new());
        let handler = handler(80, 40, &bus);
        let callback = Arc::new(RecordingCallback::default());
        handler.set_callback(callback.clone());

        handler.dispose();
        handler.dispose();
        bus.post(&Event::startlevel(100));

        assert_eq!(callback.count(), 0);
        assert_eq!(handler.state(), TriggerState::Disposed);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn should_unsubscribe_when_dropped() {
        let bus = Arc::new(EventBus::new());
        drop(handler(80, 40, &bus));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn should_reject_malformed_configuration() {
        let levels: Arc<dyn StartLevelService> = Arc::new(FixedStartLevel::at(0));
        let missing = SystemTriggerHandler::new(
            "r",
            &Module::new("t1", MODULE_TYPE),
            Arc::clone(&levels),
        );
        let text = SystemTriggerHandler::new("r", &module("eighty"), Arc::clone(&levels));

        assert!(matches!(
            missing,
            Err(HubError::Configuration(ConfigurationError::MissingParameter(STARTLEVEL)))
        ));
        assert!(matches!(
            text,
            Err(HubError::Configuration(ConfigurationError::InvalidParameter { .. }))
        ));
    }

    #[test]
    fn should_fire_at_most_once_under_concurrent_events() {
        let bus = Arc::new(EventBus::new());
        let handler = handler(80, 40, &bus);
        let callback = Arc::new(RecordingCallback::default());
        handler.set_callback(callback.clone());

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || bus.post(&Event::startlevel(100)))
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(callback.count(), 1);
    }
}
