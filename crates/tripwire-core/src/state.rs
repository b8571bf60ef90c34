//! Per-rule mutable runtime state.
//!
//! State is keyed by `(scope, rule id)`, created lazily on first use and
//! dropped with its scope. Only the fire count and latest firing time of
//! `permanent` rules leave the process (see [`PersistedRuleState`]).

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeDelta, Utc};
use tripwire_types::{ActorId, PersistedRuleState, RuleId, ScopeKey};

use crate::timer::TimerHandle;

/// Rate-limiting key within one rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CooldownKey {
    /// Rule-wide (timer firings and actor-less manual fires).
    Rule,
    /// Per acting entity.
    Actor(ActorId),
}

/// Runtime state of one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerRuntimeState {
    /// Successful firings so far.
    pub fire_count: u32,
    /// Last successful firing per cooldown key.
    pub last_fired_at: BTreeMap<CooldownKey, DateTime<Utc>>,
    /// Last successful firing under any key.
    pub last_fired_any: Option<DateTime<Utc>>,
    /// Firing time restored from storage. Applies to every cooldown key,
    /// since the stored record does not say which key fired.
    pub restored_floor: Option<DateTime<Utc>>,
    /// Pending recurring registration of an `on_timer` rule.
    pub timer_handle: Option<TimerHandle>,
    /// Runtime enable/disable, overriding the authored flag.
    pub enabled_override: Option<bool>,
}

impl TriggerRuntimeState {
    /// Effective enabled flag given the authored default.
    pub fn is_enabled(&self, authored: bool) -> bool {
        self.enabled_override.unwrap_or(authored)
    }

    /// Whether `key` is still inside its cooldown window at `now`.
    pub fn is_cooling_down(&self, key: &CooldownKey, cooldown: TimeDelta, now: DateTime<Utc>) -> bool {
        self.last_fired_at
            .get(key)
            .copied()
            .max(self.restored_floor)
            .is_some_and(|last| now.signed_duration_since(last) < cooldown)
    }

    /// Whether the firing limit has been reached.
    pub fn is_exhausted(&self, limit: Option<u32>) -> bool {
        limit.is_some_and(|max| self.fire_count >= max)
    }

    /// Record a successful firing.
    pub fn record_firing(&mut self, key: CooldownKey, now: DateTime<Utc>) {
        self.fire_count = self.fire_count.saturating_add(1);
        self.last_fired_at.insert(key, now);
        self.last_fired_any = Some(now);
    }
}

/// All rule states.
#[derive(Debug, Default)]
pub struct RuntimeStateStore {
    states: HashMap<(ScopeKey, RuleId), TriggerRuntimeState>,
}

impl RuntimeStateStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a rule, if it has any yet.
    pub fn get(&self, scope: &ScopeKey, rule_id: &RuleId) -> Option<&TriggerRuntimeState> {
        self.states.get(&(scope.clone(), rule_id.clone()))
    }

    /// State of a rule, created on first access.
    pub fn entry(&mut self, scope: &ScopeKey, rule_id: &RuleId) -> &mut TriggerRuntimeState {
        self.states
            .entry((scope.clone(), rule_id.clone()))
            .or_default()
    }

    /// Remove and return every state of a scope.
    pub fn take_scope(&mut self, scope: &ScopeKey) -> Vec<(RuleId, TriggerRuntimeState)> {
        let keys: Vec<(ScopeKey, RuleId)> = self
            .states
            .keys()
            .filter(|(s, _)| s == scope)
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|key| self.states.remove(&key).map(|state| (key.1, state)))
            .collect()
    }

    /// Install restored counters for a rule.
    pub fn restore(&mut self, record: &PersistedRuleState) {
        let state = self.entry(&record.scope, &record.rule_id);
        state.fire_count = record.fire_count;
        state.last_fired_any = record.last_fired_at;
        state.restored_floor = record.last_fired_at;
    }

    /// Persistable view of one rule.
    pub fn snapshot(&self, scope: &ScopeKey, rule_id: &RuleId) -> PersistedRuleState {
        let state = self.get(scope, rule_id);
        PersistedRuleState {
            rule_id: rule_id.clone(),
            scope: scope.clone(),
            fire_count: state.map_or(0, |s| s.fire_count),
            last_fired_at: state.and_then(|s| s.last_fired_any),
        }
    }

    /// Number of rules with state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no rule has state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
