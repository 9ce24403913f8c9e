//! `core.GenericEventTrigger` — fires for every event matching topic, type
//! and source.

use hubcore_domain::error::HubError;
use hubcore_domain::event::Event;
use hubcore_domain::rule::Module;

use crate::event_bus::{EventFilter, EventInterest, EventSubscriber, TopicFilter};

use super::{FirePolicy, TriggerContext, TriggerCore, TriggerOutputs};

/// Module type uid.
pub const MODULE_TYPE: &str = "core.GenericEventTrigger";

const EVENT_TOPIC: &str = "eventTopic";
const EVENT_TYPES: &str = "eventTypes";
const EVENT_SOURCE: &str = "eventSource";

/// Repeatable trigger on arbitrary bus events.
pub struct GenericEventTriggerHandler {
    context: TriggerContext,
    topic: TopicFilter,
    interest: EventInterest,
    source: Option<String>,
}

impl GenericEventTriggerHandler {
    /// Build the handler for `module` of rule `rule_uid`.
    ///
    /// `eventTopic` defaults to `*`, an empty `eventTypes` means every type
    /// and a missing `eventSource` accepts any source.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Configuration`] when a parameter has the wrong
    /// shape.
    pub fn new(rule_uid: &str, module: &Module) -> Result<Self, HubError> {
        let config = &module.configuration;
        let topic = config.get_str(EVENT_TOPIC)?.unwrap_or("*");
        let types = config.get_string_set(EVENT_TYPES)?;
        let source = config
            .get_str(EVENT_SOURCE)?
            .filter(|source| !source.is_empty())
            .map(str::to_string);
        Ok(Self {
            context: TriggerContext::new(rule_uid, module.id.as_str()),
            topic: TopicFilter::new(topic)?,
            interest: if types.is_empty() {
                EventInterest::All
            } else {
                EventInterest::Types(types)
            },
            source,
        })
    }

    fn outputs(event: &Event) -> TriggerOutputs {
        let mut outputs = TriggerOutputs::new();
        outputs.insert("topic".to_string(), event.topic.clone().into());
        outputs.insert("type".to_string(), event.event_type.clone().into());
        outputs.insert("source".to_string(), event.source.clone().into());
        outputs.insert("payload".to_string(), event.payload.clone().into());
        match serde_json::to_value(event) {
            Ok(value) => {
                outputs.insert("event".to_string(), value);
            }
            Err(err) => {
                tracing::warn!(topic = %event.topic, error = %err, "couldn't serialize event for trigger outputs");
            }
        }
        outputs
    }
}

impl EventFilter for GenericEventTriggerHandler {
    fn apply(&self, event: &Event) -> bool {
        let source_matches = match &self.source {
            Some(wanted) => event.source.as_deref() == Some(wanted.as_str()),
            None => true,
        };
        source_matches && self.topic.apply(event)
    }
}

impl EventSubscriber for GenericEventTriggerHandler {
    fn subscribed_event_types(&self) -> EventInterest {
        self.interest.clone()
    }

    fn filter(&self) -> Option<&dyn EventFilter> {
        Some(self)
    }

    fn receive(&self, event: &Event) {
        self.context
            .fire(FirePolicy::Repeatable, &Self::outputs(event));
    }
}

impl TriggerCore for GenericEventTriggerHandler {
    fn context(&self) -> &TriggerContext {
        &self.context
    }
}
