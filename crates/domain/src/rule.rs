//! Rule — trigger → condition → action automation.
//!
//! A rule is an identified bundle of [`Module`]s. Triggers decide *when* the
//! rule runs, conditions guard it, actions perform its effect. Rules are
//! immutable snapshots: editing a rule means building a new one with the same
//! uid and handing it to the managed provider.

mod dto;
mod module;

pub use dto::{ModuleDto, RuleDto};
pub use module::Module;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::error::{HubError, ValidationError};
use crate::identifiable::Identifiable;

/// Who gets to see a rule in user interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    Expert,
}

/// An automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub uid: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub visibility: Visibility,
    pub configuration: Configuration,
    pub triggers: Vec<Module>,
    pub conditions: Vec<Module>,
    pub actions: Vec<Module>,
}

impl Rule {
    /// Create a builder for constructing a [`Rule`].
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    /// All modules of the rule, triggers first.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.triggers
            .iter()
            .chain(&self.conditions)
            .chain(&self.actions)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when:
    /// - `uid` is empty ([`ValidationError::EmptyUid`])
    /// - a module id is empty ([`ValidationError::EmptyModuleId`])
    /// - a module has no type ([`ValidationError::EmptyModuleType`])
    /// - two modules share an id ([`ValidationError::DuplicateModuleId`])
    pub fn validate(&self) -> Result<(), HubError> {
        if self.uid.is_empty() {
            return Err(ValidationError::EmptyUid.into());
        }
        let mut seen = HashSet::new();
        for module in self.modules() {
            if module.id.is_empty() {
                return Err(ValidationError::EmptyModuleId.into());
            }
            if module.type_uid.is_empty() {
                return Err(ValidationError::EmptyModuleType {
                    module_id: module.id.clone(),
                }
                .into());
            }
            if !seen.insert(module.id.as_str()) {
                return Err(ValidationError::DuplicateModuleId(module.id.clone()).into());
            }
        }
        Ok(())
    }
}

impl Identifiable for Rule {
    type Key = String;

    fn uid(&self) -> String {
        self.uid.clone()
    }
}

/// Step-by-step builder for [`Rule`].
#[derive(Debug, Default)]
pub struct RuleBuilder {
    uid: Option<String>,
    name: Option<String>,
    description: Option<String>,
    tags: BTreeSet<String>,
    visibility: Visibility,
    configuration: Configuration,
    triggers: Vec<Module>,
    conditions: Vec<Module>,
    actions: Vec<Module>,
}

impl RuleBuilder {
    #[must_use]
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub fn config(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.configuration.insert(name, value);
        self
    }

    #[must_use]
    pub fn trigger(mut self, module: Module) -> Self {
        self.triggers.push(module);
        self
    }

    #[must_use]
    pub fn condition(mut self, module: Module) -> Self {
        self.conditions.push(module);
        self
    }

    #[must_use]
    pub fn action(mut self, module: Module) -> Self {
        self.actions.push(module);
        self
    }

    /// Consume the builder, validate, and return a [`Rule`].
    ///
    /// A missing uid is replaced by a random one.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if the rule breaks an invariant.
    pub fn build(self) -> Result<Rule, HubError> {
        let rule = Rule {
            uid: self
                .uid
                .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()),
            name: self.name,
            description: self.description,
            tags: self.tags,
            visibility: self.visibility,
            configuration: self.configuration,
            triggers: self.triggers,
            conditions: self.conditions,
            actions: self.actions,
        };
        rule.validate()?;
        Ok(rule)
    }
}
