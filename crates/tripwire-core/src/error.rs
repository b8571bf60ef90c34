//! Errors surfaced by the engine's control API.
//!
//! Dispatch itself never fails; these only come back from operations that
//! address a specific scope or rule on behalf of a caller.

use tripwire_types::{RuleId, ScopeKey};

/// Errors returned by [`TriggerEngine`](crate::TriggerEngine) control
/// operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No rules are loaded for the scope.
    #[error("scope {0} is not loaded")]
    ScopeNotLoaded(ScopeKey),

    /// The scope is loaded but has no rule with this id.
    #[error("rule `{rule_id}` not found in {scope}")]
    RuleNotFound {
        /// The scope searched.
        scope: ScopeKey,
        /// The missing rule.
        rule_id: RuleId,
    },
}
