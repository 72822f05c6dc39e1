//! # Audit Watch Storage
//!
//! [`auditwatch_engine::storage::RuleStorage`] implementations: a
//! TOML-file-backed store for persistent deployments, and an in-memory
//! store for tests and ad-hoc rule seeding.

pub mod error;
pub mod memory_storage;
pub mod toml_storage;

pub use error::*;
pub use memory_storage::InMemoryRuleStorage;
pub use toml_storage::TomlRuleStorage;
