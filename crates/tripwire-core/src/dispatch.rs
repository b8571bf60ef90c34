//! Event dispatch: selecting, gating, and executing rules.
//!
//! Dispatch never fails. A rule that is disabled, cooling down, exhausted,
//! or whose conditions do not hold is skipped; an action that cannot run
//! produces an [`OutboundEvent::ActionFailed`] and the chain moves on.
//!
//! Every dispatch shares a [`DispatchRun`] with the cascades it causes
//! (`fire_trigger`, `enable_trigger`). A rule fires at most once per run
//! and cascades stop at the configured depth.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use tripwire_types::{
    InboundEvent, OutboundEvent, RuleId, ScopeKey, TriggerContext, TriggerDefinition, TriggerEvent,
};
use tripwire_world::WorldAccess;

use crate::action::{ActionEnv, Followup};
use crate::condition::ConditionContext;
use crate::engine::{Continuation, TriggerEngine};
use crate::error::EngineError;
use crate::state::CooldownKey;

/// What a dispatch produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FireResult {
    /// Outbound events in emission order.
    pub events: Vec<OutboundEvent>,
    /// Rules that fired, in firing order (cascades included).
    pub fired: Vec<(ScopeKey, RuleId)>,
    /// Whether at least one rule fired. For commands this tells the router
    /// to stop looking for a handler.
    pub handled: bool,
}

impl FireResult {
    /// Whether a rule with this id fired in any scope.
    pub fn did_fire(&self, rule_id: &str) -> bool {
        self.fired.iter().any(|(_, id)| id.as_str() == rule_id)
    }

    /// Message texts, in order.
    pub fn messages(&self) -> Vec<&str> {
        self.events.iter().filter_map(OutboundEvent::text).collect()
    }
}

/// Bookkeeping shared by one top-level dispatch and its cascades.
#[derive(Debug)]
pub(crate) struct DispatchRun {
    pub now: DateTime<Utc>,
    pub visited: HashSet<(ScopeKey, RuleId)>,
    pub depth: u32,
    pub events: Vec<OutboundEvent>,
    pub fired: Vec<(ScopeKey, RuleId)>,
}

impl DispatchRun {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            visited: HashSet::new(),
            depth: 0,
            events: Vec::new(),
            fired: Vec::new(),
        }
    }

    fn finish(self) -> FireResult {
        FireResult {
            handled: !self.fired.is_empty(),
            events: self.events,
            fired: self.fired,
        }
    }
}

impl TriggerEngine {
    /// Offer an event to every rule of a scope bound to it, in authored
    /// order. `on_command` rules additionally need their pattern to match
    /// `context.command`.
    pub fn fire(
        &mut self,
        scope: &ScopeKey,
        event: TriggerEvent,
        context: &TriggerContext,
        world: &mut dyn WorldAccess,
        now: DateTime<Utc>,
    ) -> FireResult {
        let mut run = DispatchRun::new(now);
        self.fire_in(&mut run, scope, event, context, world);
        run.finish()
    }

    /// Translate a simulation event into scope dispatches.
    ///
    /// Commands go to the room first; the room's area only sees the command
    /// when no room rule fired.
    pub fn handle(
        &mut self,
        event: &InboundEvent,
        world: &mut dyn WorldAccess,
        now: DateTime<Utc>,
    ) -> FireResult {
        let mut run = DispatchRun::new(now);
        match event {
            InboundEvent::RoomEntered {
                actor,
                room,
                direction,
            }
            | InboundEvent::RoomExited {
                actor,
                room,
                direction,
            } => {
                let kind = if matches!(event, InboundEvent::RoomEntered { .. }) {
                    TriggerEvent::OnEnter
                } else {
                    TriggerEvent::OnExit
                };
                let context = TriggerContext {
                    area: world.room_area(room).cloned(),
                    direction: *direction,
                    ..TriggerContext::actor_in(actor.clone(), room.clone())
                };
                self.fire_in(&mut run, &ScopeKey::Room(room.clone()), kind, &context, world);
            }
            InboundEvent::AreaEntered { actor, from, to }
            | InboundEvent::AreaExited { actor, from, to } => {
                let (kind, area) = if matches!(event, InboundEvent::AreaEntered { .. }) {
                    (TriggerEvent::OnAreaEnter, to)
                } else {
                    (TriggerEvent::OnAreaExit, from)
                };
                let context = TriggerContext {
                    actor: Some(actor.clone()),
                    room: world.actor_room(actor).cloned(),
                    ..TriggerContext::ambient()
                }
                .with_area(area.clone())
                .with_transition(from.clone(), to.clone());
                self.fire_in(&mut run, &ScopeKey::Area(area.clone()), kind, &context, world);
            }
            InboundEvent::CommandAttempted { actor, room, text } => {
                let area = world.room_area(room).cloned();
                let context = TriggerContext {
                    area: area.clone(),
                    ..TriggerContext::actor_in(actor.clone(), room.clone())
                }
                .with_command(text.clone());
                self.fire_in(
                    &mut run,
                    &ScopeKey::Room(room.clone()),
                    TriggerEvent::OnCommand,
                    &context,
                    world,
                );
                if run.fired.is_empty()
                    && let Some(area) = area
                {
                    self.fire_in(
                        &mut run,
                        &ScopeKey::Area(area),
                        TriggerEvent::OnCommand,
                        &context,
                        world,
                    );
                }
            }
        }
        run.finish()
    }

    /// Fire one rule directly, ignoring its event binding. Enabled,
    /// cooldown, fire-limit, and condition checks still apply.
    pub fn fire_rule(
        &mut self,
        scope: &ScopeKey,
        rule_id: &RuleId,
        context: &TriggerContext,
        world: &mut dyn WorldAccess,
        now: DateTime<Utc>,
    ) -> Result<FireResult, EngineError> {
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
        let mut run = DispatchRun::new(now);
        self.attempt(&mut run, world, scope, epoch, &definition, context);
        Ok(run.finish())
    }

    fn fire_in(
        &mut self,
        run: &mut DispatchRun,
        scope: &ScopeKey,
        event: TriggerEvent,
        context: &TriggerContext,
        world: &mut dyn WorldAccess,
    ) {
        let Some(epoch) = self.catalog.epoch(scope) else {
            return;
        };
        let command = context.command.as_deref();
        for rule in self.catalog.candidates(scope, event) {
            if event == TriggerEvent::OnCommand && !command.is_some_and(|c| rule.matches_command(c)) {
                continue;
            }
            self.attempt(run, world, scope, epoch, &rule.definition, context);
        }
    }

    /// Run the gate checks for one rule and, if they pass, record the firing
    /// and execute its actions. Returns whether the rule fired.
    pub(crate) fn attempt(
        &mut self,
        run: &mut DispatchRun,
        world: &mut dyn WorldAccess,
        scope: &ScopeKey,
        epoch: u64,
        definition: &Arc<TriggerDefinition>,
        context: &TriggerContext,
    ) -> bool {
        let key = (scope.clone(), definition.id.clone());
        if run.visited.contains(&key) {
            debug!(scope = %scope, rule_id = %definition.id, "Re-entrant firing suppressed");
            return false;
        }

        let cooldown_key = match (&context.actor, definition.event.is_actor_scoped()) {
            (Some(actor), true) => CooldownKey::Actor(actor.clone()),
            _ => CooldownKey::Rule,
        };
        let last_fired_any = match self.states.get(scope, &definition.id) {
            Some(state) => {
                if !state.is_enabled(definition.enabled) {
                    return false;
                }
                if definition
                    .cooldown_delta()
                    .is_some_and(|cd| state.is_cooling_down(&cooldown_key, cd, run.now))
                {
                    debug!(scope = %scope, rule_id = %definition.id, "Trigger cooling down");
                    return false;
                }
                if state.is_exhausted(definition.fire_limit()) {
                    return false;
                }
                state.last_fired_any
            }
            None => {
                if !definition.enabled || definition.fire_limit() == Some(0) {
                    return false;
                }
                None
            }
        };

        let passed = {
            let ctx = ConditionContext {
                world: &*world,
                trigger: context,
                rule_id: &definition.id,
                now: run.now,
                last_fired_at: last_fired_any,
            };
            self.conditions.evaluate_all(&definition.conditions, &ctx)
        };
        if !passed {
            return false;
        }

        run.visited.insert(key.clone());
        let state = self.states.entry(scope, &definition.id);
        state.record_firing(cooldown_key, run.now);
        let exhausted = state.is_exhausted(definition.fire_limit());
        debug!(
            scope = %scope,
            rule_id = %definition.id,
            fire_count = state.fire_count,
            "Trigger fired"
        );
        run.fired.push(key);
        if exhausted && definition.event == TriggerEvent::OnTimer {
            self.disarm_timer(scope, &definition.id);
        }
        self.run_actions(run, world, scope, epoch, definition, 0, context, false);
        true
    }

    /// Execute actions from index `start`. A delayed action defers itself and
    /// everything after it; `resume` marks the call that picks the deferred
    /// action back up so its delay is not applied twice.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn run_actions(
        &mut self,
        run: &mut DispatchRun,
        world: &mut dyn WorldAccess,
        scope: &ScopeKey,
        epoch: u64,
        rule: &Arc<TriggerDefinition>,
        start: usize,
        context: &TriggerContext,
        resume: bool,
    ) {
        for (index, action) in rule.actions.iter().enumerate().skip(start) {
            let delay_consumed = resume && index == start;
            if !delay_consumed && let Some(delay) = action.delay_delta() {
                let Some(due) = run.now.checked_add_signed(delay) else {
                    warn!(rule_id = %rule.id, action = %action.kind, "Action delay out of range");
                    return;
                };
                self.schedule_continuation(
                    Continuation {
                        scope: scope.clone(),
                        epoch,
                        rule: Arc::clone(rule),
                        next: index,
                        context: context.clone(),
                    },
                    due,
                );
                debug!(rule_id = %rule.id, action = %action.kind, due = %due, "Actions deferred");
                return;
            }

            let Some(handler) = self.actions.get(&action.kind) else {
                warn!(rule_id = %rule.id, action = %action.kind, "Unknown action type skipped");
                continue;
            };
            let result = {
                let mut env = ActionEnv {
                    world: &mut *world,
                    trigger: context,
                    scope,
                    rule_id: &rule.id,
                    now: run.now,
                };
                handler.execute(&action.params, &mut env)
            };
            match result {
                Ok(outcome) => {
                    run.events.extend(outcome.events);
                    for followup in outcome.followups {
                        self.apply_followup(run, world, &rule.id, followup, context);
                    }
                    if outcome.cancel_remaining {
                        debug!(rule_id = %rule.id, "Remaining actions cancelled");
                        return;
                    }
                }
                Err(err) => {
                    warn!(rule_id = %rule.id, action = %action.kind, error = %err, "Action failed");
                    run.events.push(OutboundEvent::ActionFailed {
                        rule_id: rule.id.clone(),
                        action: action.kind.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    fn apply_followup(
        &mut self,
        run: &mut DispatchRun,
        world: &mut dyn WorldAccess,
        source: &RuleId,
        followup: Followup,
        context: &TriggerContext,
    ) {
        match followup {
            Followup::SetEnabled {
                scope,
                rule_id,
                enabled,
            } => match self.set_enabled(&scope, &rule_id, enabled, run.now) {
                Ok(event) => run.events.push(event),
                Err(err) => {
                    let action = if enabled { "enable_trigger" } else { "disable_trigger" };
                    warn!(rule_id = %source, error = %err, "Trigger control failed");
                    run.events.push(OutboundEvent::ActionFailed {
                        rule_id: source.clone(),
                        action: action.to_owned(),
                        reason: err.to_string(),
                    });
                }
            },
            Followup::FireRule { scope, rule_id } => {
                if run.depth >= self.max_cascade_depth {
                    warn!(
                        rule_id = %source,
                        target = %rule_id,
                        depth = run.depth,
                        "Cascade depth limit reached"
                    );
                    return;
                }
                let target = self
                    .catalog
                    .epoch(&scope)
                    .zip(self.catalog.definition(&scope, &rule_id).cloned());
                let Some((epoch, definition)) = target else {
                    let err = EngineError::RuleNotFound {
                        scope,
                        rule_id,
                    };
                    warn!(rule_id = %source, error = %err, "Cascade target missing");
                    run.events.push(OutboundEvent::ActionFailed {
                        rule_id: source.clone(),
                        action: "fire_trigger".to_owned(),
                        reason: err.to_string(),
                    });
                    return;
                };
                run.depth = run.depth.saturating_add(1);
                self.attempt(run, world, &scope, epoch, &definition, context);
                run.depth = run.depth.saturating_sub(1);
            }
            Followup::ExpireEffect {
                actor,
                effect,
                stat,
                after,
            } => match run.now.checked_add_signed(after) {
                Some(due) => self.schedule_expiry(actor, effect, stat, due),
                None => warn!(actor = %actor, effect, "Effect duration out of range"),
            },
        }
    }
}
