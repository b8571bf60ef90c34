//! The trigger engine: catalog, runtime state, and scheduler under one owner.
//!
//! [`TriggerEngine`] is the façade the simulation talks to. This module
//! holds its lifecycle operations (scope load, unload, reload), runtime
//! control, persistence hooks, and scheduled-job processing. The dispatch
//! path itself lives in [`crate::dispatch`].
//!
//! The engine is synchronous and never reads the clock. Every entry point
//! takes `now`, and the caller (normally [`crate::runner`]) is responsible
//! for serialising calls and for waking up at [`TriggerEngine::next_deadline`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use tripwire_types::{
    ActorId, OutboundEvent, PersistedRuleState, RuleId, ScopeKey, TriggerContext,
    TriggerDefinition, TriggerEvent,
};
use tripwire_world::WorldAccess;

use crate::action::ActionRegistry;
use crate::catalog::{ScopeTriggers, TriggerCatalog};
use crate::condition::ConditionRegistry;
use crate::config::RuntimeConfig;
use crate::content::{LoadDiagnostic, ScopeContent};
use crate::dispatch::DispatchRun;
use crate::error::EngineError;
use crate::state::{RuntimeStateStore, TriggerRuntimeState};
use crate::timer::{TimerHandle, TimerService};

/// The remainder of an action list deferred past a delay.
#[derive(Debug)]
pub(crate) struct Continuation {
    pub scope: ScopeKey,
    pub epoch: u64,
    pub rule: Arc<TriggerDefinition>,
    pub next: usize,
    pub context: TriggerContext,
}

/// Work held by the timer service.
#[derive(Debug, Clone)]
pub(crate) enum ScheduledJob {
    /// Recurring firing of an `on_timer` rule.
    RuleTimer {
        scope: ScopeKey,
        epoch: u64,
        rule_id: RuleId,
    },
    /// Resume an action list.
    Continuation(Arc<Continuation>),
    /// End a timed effect. Not bound to any scope.
    ExpireEffect {
        actor: ActorId,
        effect: String,
        stat: Option<(String, i64)>,
    },
}

/// Outcome of installing a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// The installed scope.
    pub scope: ScopeKey,
    /// Number of rules accepted.
    pub loaded: usize,
    /// Records rejected at validation.
    pub rejected: Vec<LoadDiagnostic>,
    /// Condition types referenced but not registered.
    pub unknown_conditions: Vec<String>,
    /// Action types referenced but not registered.
    pub unknown_actions: Vec<String>,
    /// Rules whose counters were restored or carried over.
    pub restored: usize,
}

/// Condition/action rule engine for one world.
#[derive(Debug)]
pub struct TriggerEngine {
    pub(crate) catalog: TriggerCatalog,
    pub(crate) states: RuntimeStateStore,
    pub(crate) timers: TimerService<ScheduledJob>,
    pub(crate) continuations: HashMap<ScopeKey, HashMap<TimerHandle, RuleId>>,
    pub(crate) pending_restore: HashMap<(ScopeKey, RuleId), PersistedRuleState>,
    pub(crate) conditions: ConditionRegistry,
    pub(crate) actions: ActionRegistry,
    pub(crate) max_cascade_depth: u32,
}

impl TriggerEngine {
    /// An engine with every built-in condition and action type.
    pub fn new(config: &RuntimeConfig) -> Self {
        Self::with_registries(
            ConditionRegistry::with_builtins(),
            ActionRegistry::with_builtins(),
            config.max_cascade_depth,
        )
    }

    /// An engine with caller-supplied registries.
    pub fn with_registries(
        conditions: ConditionRegistry,
        actions: ActionRegistry,
        max_cascade_depth: u32,
    ) -> Self {
        Self {
            catalog: TriggerCatalog::new(),
            states: RuntimeStateStore::new(),
            timers: TimerService::new(),
            continuations: HashMap::new(),
            pending_restore: HashMap::new(),
            conditions,
            actions,
            max_cascade_depth,
        }
    }

    /// Register additional condition types before loading content.
    pub const fn conditions_mut(&mut self) -> &mut ConditionRegistry {
        &mut self.conditions
    }

    /// Register additional action types before loading content.
    pub const fn actions_mut(&mut self) -> &mut ActionRegistry {
        &mut self.actions
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The loaded catalog.
    pub const fn catalog(&self) -> &TriggerCatalog {
        &self.catalog
    }

    /// Runtime state of a rule, if it has been touched.
    pub fn runtime_state(&self, scope: &ScopeKey, rule_id: &RuleId) -> Option<&TriggerRuntimeState> {
        self.states.get(scope, rule_id)
    }

    /// Effective enabled flag of a loaded rule.
    pub fn is_enabled(&self, scope: &ScopeKey, rule_id: &RuleId) -> Option<bool> {
        let definition = self.catalog.definition(scope, rule_id)?;
        Some(
            self.states
                .get(scope, rule_id)
                .map_or(definition.enabled, |s| s.is_enabled(definition.enabled)),
        )
    }

    /// Earliest time at which [`advance`](Self::advance) has work.
    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    /// Number of pending scheduler registrations.
    pub fn pending_jobs(&self) -> usize {
        self.timers.len()
    }

    // -----------------------------------------------------------------------
    // Scope lifecycle
    // -----------------------------------------------------------------------

    /// Install a scope. Loading an already-loaded scope reloads it.
    pub fn load_scope(&mut self, content: ScopeContent, now: DateTime<Utc>) -> LoadReport {
        if self.catalog.contains(content.scope()) {
            return self.reload_scope(content, now);
        }
        self.install(content, Vec::new(), now)
    }

    /// Remove a scope, cancelling its timers and poisoning its pending
    /// continuations. Returns `false` if the scope was not loaded.
    pub fn unload_scope(&mut self, scope: &ScopeKey) -> bool {
        let detached = self.detach(scope);
        if detached.is_some() {
            info!(scope = %scope, "Trigger scope unloaded");
        }
        detached.is_some()
    }

    /// Replace a scope's rules. Counters of rules that are `permanent` both
    /// before and after the reload carry over; everything else starts fresh.
    pub fn reload_scope(&mut self, content: ScopeContent, now: DateTime<Utc>) -> LoadReport {
        let scope = content.scope().clone();
        let carried = match self.detach(&scope) {
            None => Vec::new(),
            Some((old, states)) => states
                .into_iter()
                .filter(|(rule_id, _)| {
                    old.rule(rule_id).is_some_and(|r| r.definition.permanent)
                        && content
                            .rules()
                            .iter()
                            .any(|r| r.id == *rule_id && r.permanent)
                })
                .map(|(rule_id, state)| {
                    let carried = TriggerRuntimeState {
                        fire_count: state.fire_count,
                        last_fired_at: state.last_fired_at,
                        last_fired_any: state.last_fired_any,
                        restored_floor: state.restored_floor,
                        timer_handle: None,
                        enabled_override: None,
                    };
                    (rule_id, carried)
                })
                .collect(),
        };
        info!(scope = %scope, carried = carried.len(), "Reloading trigger scope");
        self.install(content, carried, now)
    }

    fn install(
        &mut self,
        content: ScopeContent,
        carried: Vec<(RuleId, TriggerRuntimeState)>,
        now: DateTime<Utc>,
    ) -> LoadReport {
        let (scope, rules, rejected) = content.into_parts();
        let mut unknown_conditions: Vec<String> = Vec::new();
        let mut unknown_actions: Vec<String> = Vec::new();
        for rule in &rules {
            for kind in self.conditions.unknown_kinds(&rule.conditions) {
                warn!(scope = %scope, rule_id = %rule.id, condition = %kind, "Unknown condition type");
                if !unknown_conditions.contains(&kind) {
                    unknown_conditions.push(kind);
                }
            }
            for kind in self.actions.unknown_kinds(&rule.actions) {
                warn!(scope = %scope, rule_id = %rule.id, action = %kind, "Unknown action type");
                if !unknown_actions.contains(&kind) {
                    unknown_actions.push(kind);
                }
            }
        }

        let loaded = rules.len();
        let (epoch, _) = self.catalog.insert(scope.clone(), rules);

        let mut restored = 0_usize;
        for (rule_id, state) in carried {
            *self.states.entry(&scope, &rule_id) = state;
            restored = restored.saturating_add(1);
        }
        let pending_keys: Vec<(ScopeKey, RuleId)> = self
            .pending_restore
            .keys()
            .filter(|(s, _)| *s == scope)
            .cloned()
            .collect();
        let pending: Vec<PersistedRuleState> = pending_keys
            .iter()
            .filter_map(|key| self.pending_restore.remove(key))
            .collect();
        for record in pending {
            if self.apply_restore(&record) {
                restored = restored.saturating_add(1);
            }
        }

        let timer_rules: Vec<Arc<TriggerDefinition>> = self
            .catalog
            .candidates(&scope, TriggerEvent::OnTimer)
            .into_iter()
            .map(|r| r.definition)
            .collect();
        for definition in &timer_rules {
            self.arm_timer(&scope, epoch, definition, now);
        }

        info!(
            scope = %scope,
            loaded,
            rejected = rejected.len(),
            timers = timer_rules.len(),
            restored,
            "Trigger scope loaded"
        );
        LoadReport {
            scope,
            loaded,
            rejected,
            unknown_conditions,
            unknown_actions,
            restored,
        }
    }

    /// Remove a scope from the catalog, cancel its scheduler registrations,
    /// and hand back its old rules and states.
    fn detach(
        &mut self,
        scope: &ScopeKey,
    ) -> Option<(ScopeTriggers, Vec<(RuleId, TriggerRuntimeState)>)> {
        let old = self.catalog.remove(scope)?;
        if let Some(handles) = self.continuations.remove(scope) {
            for handle in handles.into_keys() {
                self.timers.cancel(handle);
            }
        }
        let states = self.states.take_scope(scope);
        for (_, state) in &states {
            if let Some(handle) = state.timer_handle {
                self.timers.cancel(handle);
            }
        }
        Some((old, states))
    }

    // -----------------------------------------------------------------------
    // Runtime control
    // -----------------------------------------------------------------------

    /// Enable a rule. Re-enabling an `on_timer` rule re-arms it with a fresh
    /// initial delay.
    pub fn enable(
        &mut self,
        scope: &ScopeKey,
        rule_id: &RuleId,
        now: DateTime<Utc>,
    ) -> Result<OutboundEvent, EngineError> {
        self.set_enabled(scope, rule_id, true, now)
    }

    /// Disable a rule, cancelling its timer and any of its delayed actions
    /// synchronously.
    pub fn disable(
        &mut self,
        scope: &ScopeKey,
        rule_id: &RuleId,
        now: DateTime<Utc>,
    ) -> Result<OutboundEvent, EngineError> {
        self.set_enabled(scope, rule_id, false, now)
    }

    pub(crate) fn set_enabled(
        &mut self,
        scope: &ScopeKey,
        rule_id: &RuleId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<OutboundEvent, EngineError> {
        let epoch = self
            .catalog
            .epoch(scope)
            .ok_or_else(|| EngineError::ScopeNotLoaded(scope.clone()))?;
        let definition = self
            .catalog
            .definition(scope, rule_id)
            .cloned()
            .ok_or_else(|| EngineError::RuleNotFound {
                scope: scope.clone(),
                rule_id: rule_id.clone(),
            })?;
        self.states.entry(scope, rule_id).enabled_override = Some(enabled);
        if definition.event == TriggerEvent::OnTimer {
            if enabled {
                self.arm_timer(scope, epoch, &definition, now);
            } else {
                self.disarm_timer(scope, rule_id);
            }
        }
        if !enabled {
            self.cancel_continuations(scope, rule_id);
        }
        info!(scope = %scope, rule_id = %rule_id, enabled, "Trigger control changed");
        Ok(OutboundEvent::ControlChanged {
            scope: scope.clone(),
            rule_id: rule_id.clone(),
            enabled,
        })
    }

    /// Register the recurring callback of an enabled, unexhausted
    /// `on_timer` rule that is not armed yet.
    fn arm_timer(
        &mut self,
        scope: &ScopeKey,
        epoch: u64,
        definition: &TriggerDefinition,
        now: DateTime<Utc>,
    ) {
        let Some((initial, interval)) = definition.timer_schedule() else {
            return;
        };
        let state = self.states.entry(scope, &definition.id);
        if state.timer_handle.is_some_and(|handle| self.timers.is_pending(handle))
            || !state.is_enabled(definition.enabled)
            || state.is_exhausted(definition.fire_limit())
        {
            return;
        }
        let Some(first) = now.checked_add_signed(initial) else {
            return;
        };
        let handle = self.timers.schedule_recurring(
            first,
            interval,
            ScheduledJob::RuleTimer {
                scope: scope.clone(),
                epoch,
                rule_id: definition.id.clone(),
            },
        );
        self.states.entry(scope, &definition.id).timer_handle = Some(handle);
        debug!(scope = %scope, rule_id = %definition.id, first_due = %first, "Timer armed");
    }

    fn cancel_continuations(&mut self, scope: &ScopeKey, rule_id: &RuleId) {
        let Some(handles) = self.continuations.get_mut(scope) else {
            return;
        };
        let cancelled: Vec<TimerHandle> = handles
            .iter()
            .filter(|(_, owner)| *owner == rule_id)
            .map(|(handle, _)| *handle)
            .collect();
        for handle in &cancelled {
            handles.remove(handle);
            self.timers.cancel(*handle);
        }
        if !cancelled.is_empty() {
            debug!(scope = %scope, rule_id = %rule_id, cancelled = cancelled.len(), "Delayed actions cancelled");
        }
    }

    pub(crate) fn disarm_timer(&mut self, scope: &ScopeKey, rule_id: &RuleId) {
        let handle = self
            .states
            .entry(scope, rule_id)
            .timer_handle
            .take();
        if let Some(handle) = handle {
            self.timers.cancel(handle);
            debug!(scope = %scope, rule_id = %rule_id, "Timer disarmed");
        }
    }

    // -----------------------------------------------------------------------
    // Scheduled work
    // -----------------------------------------------------------------------

    /// Run every job due at or before `now`: timer rule firings, delayed
    /// action continuations, and effect expiries.
    pub fn advance(&mut self, world: &mut dyn WorldAccess, now: DateTime<Utc>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Some((handle, job)) = self.timers.pop_due(now) {
            match job {
                ScheduledJob::RuleTimer {
                    scope,
                    epoch,
                    rule_id,
                } => events.extend(self.run_timer_rule(world, &scope, epoch, &rule_id, now)),
                ScheduledJob::Continuation(continuation) => {
                    if let Some(handles) = self.continuations.get_mut(&continuation.scope) {
                        handles.remove(&handle);
                    }
                    events.extend(self.resume(world, &continuation, now));
                }
                ScheduledJob::ExpireEffect {
                    actor,
                    effect,
                    stat,
                } => events.extend(expire_effect(world, actor, &effect, stat)),
            }
        }
        events
    }

    fn run_timer_rule(
        &mut self,
        world: &mut dyn WorldAccess,
        scope: &ScopeKey,
        epoch: u64,
        rule_id: &RuleId,
        now: DateTime<Utc>,
    ) -> Vec<OutboundEvent> {
        if self.catalog.epoch(scope) != Some(epoch) {
            debug!(scope = %scope, rule_id = %rule_id, "Stale timer ignored");
            return Vec::new();
        }
        let Some(definition) = self.catalog.definition(scope, rule_id).cloned() else {
            return Vec::new();
        };
        let context = timer_context(scope, world);
        let mut run = DispatchRun::new(now);
        self.attempt(&mut run, world, scope, epoch, &definition, &context);
        run.events
    }

    fn resume(
        &mut self,
        world: &mut dyn WorldAccess,
        continuation: &Continuation,
        now: DateTime<Utc>,
    ) -> Vec<OutboundEvent> {
        if self.catalog.epoch(&continuation.scope) != Some(continuation.epoch) {
            debug!(
                scope = %continuation.scope,
                rule_id = %continuation.rule.id,
                "Continuation from an unloaded scope ignored"
            );
            return Vec::new();
        }
        let mut run = DispatchRun::new(now);
        run.visited
            .insert((continuation.scope.clone(), continuation.rule.id.clone()));
        self.run_actions(
            &mut run,
            world,
            &continuation.scope,
            continuation.epoch,
            &continuation.rule,
            continuation.next,
            &continuation.context,
            true,
        );
        run.events
    }

    pub(crate) fn schedule_continuation(&mut self, continuation: Continuation, due: DateTime<Utc>) {
        let scope = continuation.scope.clone();
        let rule_id = continuation.rule.id.clone();
        let handle = self
            .timers
            .schedule_once(due, ScheduledJob::Continuation(Arc::new(continuation)));
        self.continuations
            .entry(scope)
            .or_default()
            .insert(handle, rule_id);
    }

    pub(crate) fn schedule_expiry(
        &mut self,
        actor: ActorId,
        effect: String,
        stat: Option<(String, i64)>,
        due: DateTime<Utc>,
    ) {
        self.timers
            .schedule_once(due, ScheduledJob::ExpireEffect { actor, effect, stat });
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Counters of every loaded `permanent` rule, plus restored records
    /// for scopes that are not loaded yet.
    pub fn export_permanent(&self) -> Vec<PersistedRuleState> {
        let mut records: Vec<PersistedRuleState> = self
            .catalog
            .scopes()
            .flat_map(|scope| {
                self.catalog
                    .definitions(scope)
                    .into_iter()
                    .filter(|d| d.permanent)
                    .map(move |d| self.states.snapshot(scope, &d.id))
            })
            .collect();
        records.extend(self.pending_restore.values().cloned());
        records
    }

    /// Apply persisted counters. Records for loaded scopes apply now;
    /// records for other scopes apply when the scope loads. Returns how many
    /// records applied immediately.
    pub fn restore(&mut self, records: impl IntoIterator<Item = PersistedRuleState>) -> usize {
        let mut applied = 0_usize;
        for record in records {
            if self.catalog.contains(&record.scope) {
                if self.apply_restore(&record) {
                    applied = applied.saturating_add(1);
                }
            } else {
                self.pending_restore
                    .insert((record.scope.clone(), record.rule_id.clone()), record);
            }
        }
        applied
    }

    fn apply_restore(&mut self, record: &PersistedRuleState) -> bool {
        let Some(definition) = self
            .catalog
            .definition(&record.scope, &record.rule_id)
            .cloned()
        else {
            debug!(scope = %record.scope, rule_id = %record.rule_id, "Restored state for unknown rule ignored");
            return false;
        };
        if !definition.permanent {
            debug!(scope = %record.scope, rule_id = %record.rule_id, "Restored state for non-permanent rule ignored");
            return false;
        }
        self.states.restore(record);
        let exhausted = self
            .states
            .entry(&record.scope, &record.rule_id)
            .is_exhausted(definition.fire_limit());
        if exhausted {
            self.disarm_timer(&record.scope, &record.rule_id);
        }
        true
    }
}

/// Context for a timer firing: no actor, the scope's room or area.
fn timer_context(scope: &ScopeKey, world: &dyn WorldAccess) -> TriggerContext {
    match scope {
        ScopeKey::Room(room) => TriggerContext {
            room: Some(room.clone()),
            area: world.room_area(room).cloned(),
            ..TriggerContext::ambient()
        },
        ScopeKey::Area(area) => TriggerContext::ambient().with_area(area.clone()),
    }
}

fn expire_effect(
    world: &mut dyn WorldAccess,
    actor: ActorId,
    effect: &str,
    stat: Option<(String, i64)>,
) -> Vec<OutboundEvent> {
    match world.remove_effect(&actor, effect) {
        Ok(_) => {
            debug!(actor = %actor, effect, "Timed effect expired");
            stat.map(|(stat, amount)| OutboundEvent::StatDelta {
                actor,
                stat,
                delta: amount.saturating_neg(),
            })
            .into_iter()
            .collect()
        }
        Err(err) => {
            warn!(actor = %actor, effect, error = %err, "Timed effect could not expire");
            Vec::new()
        }
    }
}
