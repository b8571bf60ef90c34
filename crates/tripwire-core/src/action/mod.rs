//! Action executor: a registry of named side-effecting operations.
//!
//! An [`ActionHandler`] mutates the world through [`ActionEnv`] and returns
//! an [`ActionOutcome`]: outbound events, an optional request to stop the
//! rest of the action list, and [`Followup`]s that only the dispatcher can
//! carry out (trigger control and timed effect expiry).
//!
//! Sequencing, delays and failure handling live in the dispatcher; a
//! handler only ever sees one action.

mod builtin;

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tripwire_types::{
    ActorId, AreaId, OutboundEvent, ParamError, Params, RoomId, RuleId, ScopeKey, TriggerAction,
    TriggerContext,
};
use tripwire_world::{WorldAccess, WorldError};

use crate::template::{self, TemplateVars};

/// Why an action could not run.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// A parameter was missing or mistyped.
    #[error(transparent)]
    Param(#[from] ParamError),

    /// A parameter had the right type but an unusable value.
    #[error("invalid parameter `{key}`: {reason}")]
    InvalidParam {
        /// The offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The action needs an acting entity and the firing has none.
    #[error("action requires an actor")]
    NoActor,

    /// The action needs a room and none could be resolved.
    #[error("action requires a room")]
    NoRoom,

    /// The action needs an area and none could be resolved.
    #[error("action requires an area")]
    NoArea,

    /// The world refused the mutation.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Work an action hands back to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Followup {
    /// Enable or disable a rule.
    SetEnabled {
        /// Owning scope of the target rule.
        scope: ScopeKey,
        /// Target rule.
        rule_id: RuleId,
        /// New state.
        enabled: bool,
    },
    /// Fire another rule within the current dispatch.
    FireRule {
        /// Owning scope of the target rule.
        scope: ScopeKey,
        /// Target rule.
        rule_id: RuleId,
    },
    /// Remove an effect (and reverse its stat change) later.
    ExpireEffect {
        /// Affected actor.
        actor: ActorId,
        /// Effect name.
        effect: String,
        /// Stat to restore, with the amount originally applied.
        stat: Option<(String, i64)>,
        /// Time until expiry.
        after: TimeDelta,
    },
}

/// Result of one action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
    /// Events for the broadcast layer.
    pub events: Vec<OutboundEvent>,
    /// Stop the remainder of the action list.
    pub cancel_remaining: bool,
    /// Dispatcher-level work.
    pub followups: Vec<Followup>,
}

impl ActionOutcome {
    /// Nothing to report.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single event.
    pub fn event(event: OutboundEvent) -> Self {
        Self {
            events: vec![event],
            ..Self::default()
        }
    }

    /// Stop the remaining actions.
    pub fn cancel() -> Self {
        Self {
            cancel_remaining: true,
            ..Self::default()
        }
    }

    /// A single followup.
    pub fn followup(followup: Followup) -> Self {
        Self {
            followups: vec![followup],
            ..Self::default()
        }
    }
}

/// Everything an action may read or mutate.
pub struct ActionEnv<'a> {
    /// World access.
    pub world: &'a mut dyn WorldAccess,
    /// The firing context.
    pub trigger: &'a TriggerContext,
    /// Scope of the rule being executed.
    pub scope: &'a ScopeKey,
    /// Rule being executed.
    pub rule_id: &'a RuleId,
    /// Execution time.
    pub now: DateTime<Utc>,
}

impl ActionEnv<'_> {
    /// The acting entity.
    pub fn actor(&self) -> Result<&ActorId, ActionError> {
        self.trigger.actor.as_ref().ok_or(ActionError::NoActor)
    }

    /// Room from the `room` parameter, the firing context, the scope, or the
    /// actor's current room, in that order.
    pub fn room(&self, params: &Params) -> Result<RoomId, ActionError> {
        if let Some(room) = params.opt_str("room")? {
            return Ok(RoomId::from(room));
        }
        self.trigger
            .room
            .clone()
            .or_else(|| self.scope.as_room().cloned())
            .or_else(|| {
                self.trigger
                    .actor
                    .as_ref()
                    .and_then(|a| self.world.actor_room(a).cloned())
            })
            .ok_or(ActionError::NoRoom)
    }

    /// Area from the `area` parameter, the firing context, the scope, or the
    /// area of the resolved room.
    pub fn area(&self, params: &Params) -> Result<AreaId, ActionError> {
        if let Some(area) = params.opt_str("area")? {
            return Ok(AreaId::from(area));
        }
        if let Some(area) = self.trigger.area.clone().or_else(|| self.scope.as_area().cloned()) {
            return Ok(area);
        }
        let room = self.room(params).map_err(|_err| ActionError::NoArea)?;
        self.world.room_area(&room).cloned().ok_or(ActionError::NoArea)
    }

    /// Target scope for trigger-control actions: `room`/`area` parameter,
    /// else the executing rule's own scope.
    pub fn target_scope(&self, params: &Params) -> Result<ScopeKey, ActionError> {
        if let Some(room) = params.opt_str("room")? {
            return Ok(ScopeKey::room(room));
        }
        if let Some(area) = params.opt_str("area")? {
            return Ok(ScopeKey::area(area));
        }
        Ok(self.scope.clone())
    }

    /// Substitute placeholders in authored text.
    pub fn render(&self, text: &str) -> String {
        let vars = TemplateVars::resolve(self.trigger, &*self.world);
        template::render(text, &vars)
    }
}

/// A registered action type.
pub trait ActionHandler: Send + Sync {
    /// Run the action.
    fn execute(&self, params: &Params, env: &mut ActionEnv<'_>) -> Result<ActionOutcome, ActionError>;
}

impl<F> ActionHandler for F
where
    F: Fn(&Params, &mut ActionEnv<'_>) -> Result<ActionOutcome, ActionError> + Send + Sync,
{
    fn execute(&self, params: &Params, env: &mut ActionEnv<'_>) -> Result<ActionOutcome, ActionError> {
        self(params, env)
    }
}

/// Action type name to handler.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Box<dyn ActionHandler>>,
}

impl core::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl ActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in action type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register (or replace) a handler.
    pub fn register(&mut self, kind: impl Into<String>, handler: impl ActionHandler + 'static) {
        self.handlers.insert(kind.into(), Box::new(handler));
    }

    /// Whether a type is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Look up a handler.
    pub fn get(&self, kind: &str) -> Option<&dyn ActionHandler> {
        self.handlers.get(kind).map(Box::as_ref)
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Action types referenced but not registered, in first-seen order.
    pub fn unknown_kinds(&self, actions: &[TriggerAction]) -> Vec<String> {
        let mut unknown: Vec<String> = Vec::new();
        for action in actions {
            if !self.contains(&action.kind) && !unknown.contains(&action.kind) {
                unknown.push(action.kind.clone());
            }
        }
        unknown
    }
}
