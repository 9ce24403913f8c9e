//! Persisted rules.

use hubcore_domain::error::{ConfigurationError, HubError};
use hubcore_domain::rule::{Rule, RuleDto};

use crate::storage::{StoredValue, TypeResolver};

use super::{ManagedProvider, PersistenceMapping};

/// Storage namespace of managed rules.
pub const STORAGE_NAME: &str = "automation_rules";

/// Managed provider of rules over backend `B`.
pub type ManagedRuleProvider<B> = ManagedProvider<RuleMapping, B>;

impl StoredValue for RuleDto {
    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn encode_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Stores each rule as a [`RuleDto`] under its uid.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleMapping;

impl PersistenceMapping for RuleMapping {
    type Element = Rule;
    type Persisted = RuleDto;

    const KIND: &'static str = "Rule";

    fn storage_name(&self) -> &str {
        STORAGE_NAME
    }

    fn key_to_string(&self, key: &String) -> String {
        key.clone()
    }

    fn to_element(&self, _key: &str, persisted: RuleDto) -> Result<Rule, HubError> {
        Rule::try_from(persisted)
    }

    fn to_persistable(&self, element: &Rule) -> RuleDto {
        RuleDto::from(element)
    }

    fn type_resolver(&self) -> Result<TypeResolver<RuleDto>, ConfigurationError> {
        TypeResolver::single(RuleDto::TYPE_TAG)
    }
}

#[cfg(test)]
mod tests {
    use hubcore_domain::rule::{Module, Visibility};

    use crate::ports::{KeyValueBackend, StorageService};
    use crate::registry::Provider;
    use crate::storage::VolatileStorageService;

    use super::*;

    fn evening_lights() -> Rule {
        Rule::builder()
            .uid("rule1")
            .name("Evening Lights")
            .tag("lighting")
            .visibility(Visibility::Hidden)
            .trigger(Module::new("t1", "core.SystemStartlevelTrigger").config("startlevel", 80))
            .action(Module::new("a1", "core.ItemCommandAction").config("command", "ON"))
            .build()
            .unwrap()
    }

    #[test]
    fn should_map_rule_round_trip() {
        let mapping = RuleMapping;
        let rule = evening_lights();
        let key = mapping.key_to_string(&rule.uid);
        let back = mapping
            .to_element(&key, mapping.to_persistable(&rule))
            .unwrap();
        assert_eq!(back, rule);
    }

    #[tokio::test]
    async fn should_store_tagged_dto_under_uid() {
        let service = VolatileStorageService::new();
        let provider = ManagedRuleProvider::open(&service, RuleMapping).await.unwrap();
        provider.add(evening_lights()).await.unwrap();

        let raw = service.open(STORAGE_NAME).await.unwrap();
        let record = raw.get("rule1").await.unwrap().unwrap();
        assert!(record.starts_with("hubcore.automation.RuleDto@@@{"));
        assert!(record.contains(r#""name":"Evening Lights""#));
    }

    #[tokio::test]
    async fn should_reload_rules_after_restart() {
        let service = VolatileStorageService::new();
        ManagedRuleProvider::open(&service, RuleMapping)
            .await
            .unwrap()
            .add(evening_lights())
            .await
            .unwrap();

        let reopened = ManagedRuleProvider::open(&service, RuleMapping).await.unwrap();
        assert_eq!(reopened.get_all(), vec![evening_lights()]);
    }

    #[tokio::test]
    async fn should_skip_stored_rule_that_fails_validation() {
        let service = VolatileStorageService::new();
        let raw = service.open(STORAGE_NAME).await.unwrap();
        raw.put(
            "dup",
            r#"hubcore.automation.RuleDto@@@{"uid":"dup","triggers":[{"id":"m","type":"a"}],"actions":[{"id":"m","type":"b"}]}"#
                .to_string(),
        )
        .await
        .unwrap();

        let provider = ManagedRuleProvider::open(&service, RuleMapping).await.unwrap();
        assert!(provider.get_all().is_empty());
    }
}
