//! Runtime state records for permanent rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::RuleId;
use crate::scope::ScopeKey;

/// The slice of a rule's runtime state that survives restarts.
///
/// Only rules flagged `permanent` produce these. `last_fired_at` is the
/// most recent successful firing across all cooldown keys; per-actor
/// cooldown timestamps are not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRuleState {
    /// The rule.
    pub rule_id: RuleId,
    /// Scope owning the rule.
    #[serde(rename = "scopeId")]
    pub scope: ScopeKey,
    /// Successful firings so far.
    pub fire_count: u32,
    /// Most recent successful firing.
    pub last_fired_at: Option<DateTime<Utc>>,
}
