//! Persistable form of rules.
//!
//! The DTOs are the stable, camelCase wire/storage shape. They carry no
//! invariants; converting back into a [`Rule`] validates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::error::HubError;

use super::{Module, Rule, Visibility};

/// Stored representation of a [`Module`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDto {
    pub id: String,
    #[serde(rename = "type")]
    pub type_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub configuration: Configuration,
}

/// Stored representation of a [`Rule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDto {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub configuration: Configuration,
    #[serde(default)]
    pub triggers: Vec<ModuleDto>,
    #[serde(default)]
    pub conditions: Vec<ModuleDto>,
    #[serde(default)]
    pub actions: Vec<ModuleDto>,
}

impl RuleDto {
    /// Type tag under which rule DTOs are stored.
    pub const TYPE_TAG: &'static str = "hubcore.automation.RuleDto";
}

impl From<&Module> for ModuleDto {
    fn from(module: &Module) -> Self {
        Self {
            id: module.id.clone(),
            type_uid: module.type_uid.clone(),
            label: module.label.clone(),
            description: module.description.clone(),
            configuration: module.configuration.clone(),
        }
    }
}

impl From<ModuleDto> for Module {
    fn from(dto: ModuleDto) -> Self {
        Self {
            id: dto.id,
            type_uid: dto.type_uid,
            label: dto.label,
            description: dto.description,
            configuration: dto.configuration,
        }
    }
}

impl From<&Rule> for RuleDto {
    fn from(rule: &Rule) -> Self {
        let map = |modules: &[Module]| -> Vec<ModuleDto> {
            modules.iter().map(ModuleDto::from).collect()
        };
        Self {
            uid: rule.uid.clone(),
            name: rule.name.clone(),
            description: rule.description.clone(),
            tags: rule.tags.clone(),
            visibility: rule.visibility,
            configuration: rule.configuration.clone(),
            triggers: map(rule.triggers.as_slice()),
            conditions: map(rule.conditions.as_slice()),
            actions: map(rule.actions.as_slice()),
        }
    }
}

impl TryFrom<RuleDto> for Rule {
    type Error = HubError;

    fn try_from(dto: RuleDto) -> Result<Self, Self::Error> {
        let map = |modules: Vec<ModuleDto>| -> Vec<Module> {
            modules.into_iter().map(Module::from).collect()
        };
        let rule = Self {
            uid: dto.uid,
            name: dto.name,
            description: dto.description,
            tags: dto.tags,
            visibility: dto.visibility,
            configuration: dto.configuration,
            triggers: map(dto.triggers),
            conditions: map(dto.conditions),
            actions: map(dto.actions),
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_rule() -> Rule {
        Rule::builder()
            .uid("evening")
            .name("Evening Lights")
            .description("Dim the living room at dusk")
            .tag("lighting")
            .visibility(Visibility::Expert)
            .config("room", "living")
            .trigger(Module::new("t1", "core.SystemStartlevelTrigger").config("startlevel", 80))
            .condition(Module::new("c1", "core.TimeOfDayCondition").label("after dusk"))
            .action(Module::new("a1", "core.ItemCommandAction").config("command", "ON"))
            .build()
            .unwrap()
    }

    #[test]
    fn should_map_rule_to_dto_and_back_unchanged() {
        let rule = full_rule();
        let back = Rule::try_from(RuleDto::from(&rule)).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn should_serialize_module_type_as_type_field() {
        let dto = RuleDto::from(&full_rule());
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["triggers"][0]["type"], "core.SystemStartlevelTrigger");
        assert_eq!(json["visibility"], "EXPERT");
    }

    #[test]
    fn should_default_missing_collections_when_deserializing() {
        let dto: RuleDto = serde_json::from_str(r#"{"uid":"bare"}"#).unwrap();
        let rule = Rule::try_from(dto).unwrap();
        assert!(rule.triggers.is_empty());
        assert_eq!(rule.visibility, Visibility::Visible);
    }

    #[test]
    fn should_validate_when_mapping_back() {
        let dto: RuleDto = serde_json::from_str(r#"{"uid":""}"#).unwrap();
        assert!(Rule::try_from(dto).is_err());
    }
}
