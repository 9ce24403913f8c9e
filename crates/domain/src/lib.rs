//! # hubcore-domain
//!
//! Pure domain model for the hubcore automation backbone.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, configuration maps
//! - Define **Events** (immutable records flowing through the event bus)
//! - Define **Start levels** (ordinal system readiness)
//! - Define the **Identifiable** contract every registry element satisfies
//! - Define **Rules** and **Metadata** together with their persistable DTOs
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! Persistence and dispatch are expressed as traits in the `app` crate (ports).

pub mod configuration;
pub mod error;
pub mod id;
pub mod identifiable;
pub mod startlevel;

pub mod event;
pub mod metadata;
pub mod rule;
