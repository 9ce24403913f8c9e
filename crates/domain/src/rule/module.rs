//! Module — one trigger, condition or action step of a rule.

use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;

/// A typed, configured building block of a [`Rule`](super::Rule).
///
/// `type_uid` names the handler that runs the module (for example
/// `core.SystemStartlevelTrigger`); `configuration` is interpreted by that
/// handler when the rule is activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub type_uid: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub configuration: Configuration,
}

impl Module {
    #[must_use]
    pub fn new(id: impl Into<String>, type_uid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_uid: type_uid.into(),
            label: None,
            description: None,
            configuration: Configuration::new(),
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn config(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.configuration.insert(name, value);
        self
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.type_uid, self.id)
    }
}
