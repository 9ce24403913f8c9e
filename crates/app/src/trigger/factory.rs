//! Creates trigger handlers by module type.

use std::sync::Arc;

use hubcore_domain::error::{ConfigurationError, HubError};
use hubcore_domain::rule::Module;

use crate::event_bus::EventBus;
use crate::ports::StartLevelService;

use super::{
    GenericEventTriggerHandler, SystemTriggerHandler, TriggerHandler, generic_event,
    system_startlevel,
};

/// Builds subscribed [`TriggerHandler`]s for the module types it knows.
#[derive(Clone)]
pub struct TriggerHandlerFactory {
    bus: Arc<EventBus>,
    start_levels: Arc<dyn StartLevelService>,
}

impl TriggerHandlerFactory {
    #[must_use]
    pub fn new(bus: Arc<EventBus>, start_levels: Arc<dyn StartLevelService>) -> Self {
        Self { bus, start_levels }
    }

    /// Build and subscribe the handler for trigger `module` of `rule_uid`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnsupportedModuleType`] for unknown
    /// types, or the handler's own configuration error.
    pub fn create(&self, rule_uid: &str, module: &Module) -> Result<TriggerHandler, HubError> {
        let bus = Arc::clone(&self.bus);
        match module.type_uid.as_str() {
            system_startlevel::MODULE_TYPE => {
                let core =
                    SystemTriggerHandler::new(rule_uid, module, Arc::clone(&self.start_levels))?;
                Ok(TriggerHandler::register(
                    system_startlevel::MODULE_TYPE,
                    Arc::new(core),
                    bus,
                ))
            }
            generic_event::MODULE_TYPE => {
                let core = GenericEventTriggerHandler::new(rule_uid, module)?;
                Ok(TriggerHandler::register(
                    generic_event::MODULE_TYPE,
                    Arc::new(core),
                    bus,
                ))
            }
            other => Err(ConfigurationError::UnsupportedModuleType(other.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::trigger::testing::FixedStartLevel;

    use super::*;

    fn factory(bus: &Arc<EventBus>) -> TriggerHandlerFactory {
        TriggerHandlerFactory::new(Arc::clone(bus), Arc::new(FixedStartLevel::at(0)))
    }

    #[test]
    fn should_create_known_module_types() {
        let bus = Arc::new(EventBus::new());
        let factory = factory(&bus);
        let startlevel = factory
            .create(
                "r",
                &Module::new("t1", system_startlevel::MODULE_TYPE).config("startlevel", 80),
            )
            .unwrap();
        let generic = factory
            .create("r", &Module::new("t2", generic_event::MODULE_TYPE))
            .unwrap();

        assert_eq!(startlevel.module_type(), system_startlevel::MODULE_TYPE);
        assert_eq!(generic.module_id(), "t2");
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn should_reject_unknown_module_type() {
        let bus = Arc::new(EventBus::new());
        let result = factory(&bus).create("r", &Module::new("t1", "core.TimerTrigger"));
        assert!(matches!(
            result,
            Err(HubError::Configuration(ConfigurationError::UnsupportedModuleType(ref t))) if t == "core.TimerTrigger"
        ));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
