//! Wiring of the running hub.
//!
//! [`Hub::start`] opens the database, loads the managed collections, puts
//! them into their registries and arms the rule engine. [`Hub::climb`] then
//! walks the start-level sequence, which is what fires start-level rules.

use std::sync::Arc;
use std::time::Duration;

use hubcore_adapter_storage_sqlite_sqlx::{Config, Database, SqliteNamespace, SqliteStorageService};
use hubcore_app::event_bus::{EventBus, EventInterest, EventSubscriber};
use hubcore_app::managed_provider::{
    ManagedMetadataProvider, ManagedRuleProvider, MetadataMapping, RuleMapping,
};
use hubcore_app::registry::{Registry, RegistryEventForwarder};
use hubcore_app::rule_engine::RuleEngine;
use hubcore_app::services::{MetadataService, RuleService};
use hubcore_app::start_level::StartLevelTracker;
use hubcore_app::trigger::TriggerHandlerFactory;
use hubcore_domain::error::HubError;
use hubcore_domain::event::Event;
use hubcore_domain::metadata::Metadata;
use hubcore_domain::rule::Rule;
use hubcore_domain::startlevel::SEQUENCE;

/// Traces every event posted on the bus.
struct EventLogger;

impl EventSubscriber for EventLogger {
    fn subscribed_event_types(&self) -> EventInterest {
        EventInterest::All
    }

    fn receive(&self, event: &Event) {
        tracing::debug!(
            topic = %event.topic,
            event_type = %event.event_type,
            source = event.source.as_deref().unwrap_or("-"),
            "event"
        );
    }
}

/// Every long-lived component of a running hub.
pub struct Hub {
    database: Database,
    bus: Arc<EventBus>,
    start_levels: Arc<StartLevelTracker>,
    rules: Arc<Registry<Rule>>,
    metadata: Arc<Registry<Metadata>>,
    rule_service: RuleService<SqliteNamespace>,
    metadata_service: MetadataService<SqliteNamespace>,
    engine: RuleEngine,
}

impl Hub {
    /// Open the database at `database_url` and wire every component.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the database cannot be opened or a
    /// managed collection cannot be loaded.
    #[tracing::instrument]
    pub async fn start(database_url: &str) -> Result<Self, HubError> {
        let database = Config {
            database_url: database_url.to_string(),
        }
        .build()
        .await?;
        let storage = SqliteStorageService::new(database.pool().clone());

        let bus = Arc::new(EventBus::new());
        bus.subscribe(Arc::new(EventLogger));
        let start_levels = Arc::new(StartLevelTracker::new(Arc::clone(&bus)));

        let rule_provider = Arc::new(ManagedRuleProvider::open(&storage, RuleMapping).await?);
        let rules = Arc::new(Registry::<Rule>::new("rules"));
        RegistryEventForwarder::attach(&rules, Arc::clone(&bus));
        rules.add_managed_provider(rule_provider.clone());

        let metadata_provider =
            Arc::new(ManagedMetadataProvider::open(&storage, MetadataMapping).await?);
        let metadata = Arc::new(Registry::<Metadata>::new("metadata"));
        RegistryEventForwarder::attach(&metadata, Arc::clone(&bus));
        metadata.add_managed_provider(metadata_provider.clone());

        let factory = TriggerHandlerFactory::new(Arc::clone(&bus), start_levels.clone());
        let engine = RuleEngine::new(factory, Arc::clone(&bus));
        engine.attach(&rules);

        tracing::info!(
            rules = rules.get_all().len(),
            active = engine.active_rules().len(),
            metadata = metadata.get_all().len(),
            "hub wired"
        );

        Ok(Self {
            database,
            rule_service: RuleService::new(rule_provider, Arc::clone(&rules)),
            metadata_service: MetadataService::new(metadata_provider, Arc::clone(&metadata)),
            bus,
            start_levels,
            rules,
            metadata,
            engine,
        })
    }

    /// Announce every start level up to `target`, pausing `step_delay`
    /// between two levels.
    pub async fn climb(&self, target: u32, step_delay: Duration) {
        let mut levels: Vec<u32> = SEQUENCE.into_iter().filter(|level| *level <= target).collect();
        if levels.last() != Some(&target) {
            levels.push(target);
        }
        for (step, level) in levels.into_iter().enumerate() {
            if step > 0 && !step_delay.is_zero() {
                tokio::time::sleep(step_delay).await;
            }
            self.start_levels.set_start_level(level);
        }
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    #[must_use]
    pub fn rules(&self) -> &Registry<Rule> {
        &self.rules
    }

    #[must_use]
    pub fn metadata(&self) -> &Registry<Metadata> {
        &self.metadata
    }

    #[must_use]
    pub fn rule_service(&self) -> &RuleService<SqliteNamespace> {
        &self.rule_service
    }

    #[must_use]
    pub fn metadata_service(&self) -> &MetadataService<SqliteNamespace> {
        &self.metadata_service
    }

    #[must_use]
    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Disarm every rule and close the database.
    pub async fn shutdown(self) {
        let Self {
            database, engine, ..
        } = self;
        drop(engine);
        database.close().await;
        tracing::info!("hub stopped");
    }
}
