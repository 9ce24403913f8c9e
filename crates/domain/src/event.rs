//! Event — an immutable record of something that happened.
//!
//! Events carry a topic, a type discriminator that subscribers filter on, an
//! optional source and an opaque payload (JSON text by convention). They are
//! never mutated after publication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EventId;

/// UTC timestamp attached to every event.
pub type Timestamp = DateTime<Utc>;

/// Well-known event type discriminators.
pub mod types {
    /// The system reached a new start level.
    pub const STARTLEVEL: &str = "StartlevelEvent";
    /// A rule trigger fired.
    pub const RULE_TRIGGERED: &str = "RuleTriggeredEvent";
    /// An element appeared in a registry.
    pub const ELEMENT_ADDED: &str = "ElementAddedEvent";
    /// An element of a registry changed.
    pub const ELEMENT_UPDATED: &str = "ElementUpdatedEvent";
    /// An element disappeared from a registry.
    pub const ELEMENT_REMOVED: &str = "ElementRemovedEvent";
}

/// Topic of start-level events.
pub const STARTLEVEL_TOPIC: &str = "hubcore/system/startlevel";

const TOPIC_PREFIX: &str = "hubcore";

/// An immutable record published on the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub topic: String,
    pub event_type: String,
    pub source: Option<String>,
    pub payload: String,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create an event stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<String>,
        source: Option<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            topic: topic.into(),
            event_type: event_type.into(),
            source,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a start-level event announcing `startlevel`.
    #[must_use]
    pub fn startlevel(startlevel: u32) -> Self {
        let payload = serde_json::json!({ "startlevel": startlevel });
        Self::new(
            STARTLEVEL_TOPIC,
            types::STARTLEVEL,
            payload.to_string(),
            Some("hubcore".to_string()),
        )
    }

    /// Create the event published when a rule trigger fires.
    #[must_use]
    pub fn rule_triggered(
        rule_uid: &str,
        module_id: &str,
        outputs: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let payload = serde_json::json!({
            "ruleUID": rule_uid,
            "moduleId": module_id,
            "outputs": outputs,
        });
        Self::new(
            format!("{TOPIC_PREFIX}/rules/{rule_uid}/triggered"),
            types::RULE_TRIGGERED,
            payload.to_string(),
            Some(module_id.to_string()),
        )
    }

    /// Create a registry change event for the element `uid` of `kind`.
    ///
    /// `event_type` is one of the `ELEMENT_*` discriminators in [`types`].
    #[must_use]
    pub fn element_changed(kind: &str, uid: &str, event_type: &str, payload: String) -> Self {
        let verb = match event_type {
            types::ELEMENT_ADDED => "added",
            types::ELEMENT_UPDATED => "updated",
            _ => "removed",
        };
        Self::new(
            format!("{TOPIC_PREFIX}/{kind}/{uid}/{verb}"),
            event_type,
            payload,
            None,
        )
    }

    /// Parse the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parser error when the payload is not valid JSON.
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }

    /// The start level announced by this event, if it is a start-level event.
    #[must_use]
    pub fn as_startlevel(&self) -> Option<u32> {
        if self.event_type != types::STARTLEVEL {
            return None;
        }
        let value = self.payload_json().ok()?;
        value
            .get("startlevel")?
            .as_u64()
            .and_then(|level| u32::try_from(level).ok())
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.topic, self.event_type)
    }
}
