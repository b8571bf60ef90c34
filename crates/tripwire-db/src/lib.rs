//! Persistence of permanent trigger state (`SQLite`).
//!
//! The trigger engine keeps all runtime state in memory. Rules flagged
//! `permanent` additionally have their fire count and last firing time
//! written here so one-shot puzzles stay solved across restarts.
//!
//! ```text
//! TriggerEngine::export_permanent()
//!     |
//!     +-- autosave / shutdown --> RuleStateStore::save_all  (upsert)
//!
//! startup
//!     |
//!     +-- RuleStateStore::load_all --> TriggerEngine::restore()
//! ```
//!
//! # Modules
//!
//! - [`sqlite`] -- `SQLite` connection pool, configuration, and schema
//! - [`rule_state_store`] -- Upsert and query of [`PersistedRuleState`] rows
//! - [`error`] -- Shared error types
//!
//! [`PersistedRuleState`]: tripwire_types::PersistedRuleState

pub mod error;
pub mod rule_state_store;
pub mod sqlite;

// Re-export primary types for convenience.
pub use error::DbError;
pub use rule_state_store::{RuleStateRow, RuleStateStore};
pub use sqlite::{SqliteConfig, StatePool};
