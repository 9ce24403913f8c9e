//! Application services — use-case implementations.
//!
//! Services write through a managed provider and read through the registry
//! the provider is part of, so callers see exactly what other consumers see.

pub mod metadata_service;
pub mod rule_service;

pub use metadata_service::MetadataService;
pub use rule_service::RuleService;
