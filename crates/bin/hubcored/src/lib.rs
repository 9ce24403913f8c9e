//! # hubcored — hubcore daemon
//!
//! Composition root that wires every layer together and runs the start-level
//! sequence.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Load the managed rule and metadata collections into their registries
//! - Arm the rule engine and announce start levels
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

pub mod config;
pub mod hub;

pub use hub::Hub;
