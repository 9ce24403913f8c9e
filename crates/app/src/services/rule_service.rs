//! Rule service — use-cases for managing automation rules.

use std::sync::Arc;

use hubcore_domain::error::{HubError, NotFoundError};
use hubcore_domain::rule::Rule;

use crate::managed_provider::ManagedRuleProvider;
use crate::ports::KeyValueBackend;
use crate::registry::Registry;

/// Application service for rule CRUD operations.
pub struct RuleService<B> {
    provider: Arc<ManagedRuleProvider<B>>,
    registry: Arc<Registry<Rule>>,
}

impl<B: KeyValueBackend + 'static> RuleService<B> {
    /// Create a service writing to `provider` and reading from `registry`.
    pub fn new(provider: Arc<ManagedRuleProvider<B>>, registry: Arc<Registry<Rule>>) -> Self {
        Self { provider, registry }
    }

    /// Persist a new rule after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if invariants fail,
    /// [`HubError::AlreadyExists`] if a managed rule has the same uid, or a
    /// storage error.
    #[tracing::instrument(skip(self, rule), fields(uid = %rule.uid))]
    pub async fn create_rule(&self, rule: Rule) -> Result<Rule, HubError> {
        rule.validate()?;
        self.provider.add(rule.clone()).await?;
        Ok(rule)
    }

    /// Look up a rule by uid, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no provider contributes `uid`.
    pub fn get_rule(&self, uid: &str) -> Result<Rule, HubError> {
        self.registry.get(&uid.to_string()).ok_or_else(|| {
            NotFoundError {
                kind: "Rule",
                key: uid.to_string(),
            }
            .into()
        })
    }

    /// List every visible rule, sorted by uid.
    #[must_use]
    pub fn list_rules(&self) -> Vec<Rule> {
        let mut rules = self.registry.get_all();
        rules.sort_by(|a, b| a.uid.cmp(&b.uid));
        rules
    }

    /// Replace a managed rule, returning the previous version.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if invariants fail,
    /// [`HubError::NotFound`] if the rule is not managed, or a storage error.
    #[tracing::instrument(skip(self, rule), fields(uid = %rule.uid))]
    pub async fn update_rule(&self, rule: Rule) -> Result<Rule, HubError> {
        rule.validate()?;
        self.provider.update(rule).await
    }

    /// Delete a managed rule, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the rule is not managed, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(&self, uid: &str) -> Result<Rule, HubError> {
        self.provider.remove(&uid.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use hubcore_domain::error::ValidationError;
    use hubcore_domain::rule::Module;

    use crate::managed_provider::RuleMapping;
    use crate::registry::StaticProvider;
    use crate::storage::VolatileStorageService;
    use crate::storage::volatile::VolatileBackend;

    use super::*;

    async fn make_service() -> (RuleService<VolatileBackend>, Arc<Registry<Rule>>) {
        let service = VolatileStorageService::new();
        let provider = Arc::new(
            ManagedRuleProvider::open(&service, RuleMapping)
                .await
                .unwrap(),
        );
        let registry = Arc::new(Registry::<Rule>::new("rules"));
        registry.add_managed_provider(provider.clone());
        (RuleService::new(provider, Arc::clone(&registry)), registry)
    }

    fn evening_lights() -> Rule {
        Rule::builder()
            .uid("rule1")
            .name("Evening Lights")
            .trigger(Module::new("t1", "core.SystemStartlevelTrigger").config("startlevel", 80))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_rule_when_valid() {
        let (svc, _) = make_service().await;
        let created = svc.create_rule(evening_lights()).await.unwrap();
        assert_eq!(created.uid, "rule1");

        let fetched = svc.get_rule("rule1").unwrap();
        assert_eq!(fetched.name.as_deref(), Some("Evening Lights"));
    }

    #[tokio::test]
    async fn should_return_validation_error_when_rule_is_invalid() {
        let (svc, _) = make_service().await;
        let mut rule = evening_lights();
        rule.uid = String::new();

        let result = svc.create_rule(rule).await;
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::EmptyUid))
        ));
    }

    #[tokio::test]
    async fn should_return_not_found_when_rule_does_not_exist() {
        let (svc, _) = make_service().await;
        assert!(matches!(
            svc.get_rule("nope"),
            Err(HubError::NotFound(_))
        ));
        assert!(matches!(
            svc.delete_rule("nope").await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_update_and_delete_rule() {
        let (svc, _) = make_service().await;
        svc.create_rule(evening_lights()).await.unwrap();

        let mut renamed = evening_lights();
        renamed.name = Some("Dusk".to_string());
        let previous = svc.update_rule(renamed).await.unwrap();
        assert_eq!(previous.name.as_deref(), Some("Evening Lights"));
        assert_eq!(svc.get_rule("rule1").unwrap().name.as_deref(), Some("Dusk"));

        let deleted = svc.delete_rule("rule1").await.unwrap();
        assert_eq!(deleted.name.as_deref(), Some("Dusk"));
        assert!(svc.list_rules().is_empty());
    }

    #[tokio::test]
    async fn should_list_rules_from_every_provider() {
        let (svc, registry) = make_service().await;
        let file_rule = Rule::builder().uid("from_file").build().unwrap();
        registry.add_provider(Arc::new(StaticProvider::with([file_rule])));
        svc.create_rule(evening_lights()).await.unwrap();

        let uids: Vec<_> = svc.list_rules().into_iter().map(|r| r.uid).collect();
        assert_eq!(uids, vec!["from_file", "rule1"]);
    }
}
