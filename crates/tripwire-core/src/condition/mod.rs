//! Condition evaluator: a registry of named boolean predicates.
//!
//! Every condition type is an explicitly registered [`ConditionHandler`].
//! Evaluation never fails outward: an unregistered type or a handler error
//! evaluates to `false` and is logged, so a missing handler can never make
//! a guarded rule fire. `negate` is applied after the handler result.
//!
//! The logical combinators `all`, `any` and `not` are ordinary handlers
//! that recurse through the registry they are given.

mod builtin;

pub(crate) use builtin::flag_and_value;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;
use tripwire_types::{ActorId, ParamError, Params, RoomId, RuleId, TriggerCondition, TriggerContext};
use tripwire_world::WorldAccess;

/// Condition types that take a nested `conditions` list.
pub const COMPOSITE_KINDS: [&str; 3] = ["all", "any", "not"];

/// Why a handler could not decide.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
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

    /// The condition needs an acting entity and the firing has none.
    #[error("condition requires an actor")]
    NoActor,

    /// The condition needs a room and none could be resolved.
    #[error("condition requires a room")]
    NoRoom,

    /// The actor is not known to the world.
    #[error("actor {0} not found")]
    UnknownActor(ActorId),

    /// A composite condition's `conditions` parameter is malformed.
    #[error("malformed nested conditions: {0}")]
    Nested(String),
}

/// Read-only snapshot a condition is evaluated against.
pub struct ConditionContext<'a> {
    /// World queries.
    pub world: &'a dyn WorldAccess,
    /// The firing context.
    pub trigger: &'a TriggerContext,
    /// Rule being evaluated, for diagnostics.
    pub rule_id: &'a RuleId,
    /// Dispatch time.
    pub now: DateTime<Utc>,
    /// When the rule last fired for any cooldown key.
    pub last_fired_at: Option<DateTime<Utc>>,
}

impl ConditionContext<'_> {
    /// The acting entity.
    pub fn actor(&self) -> Result<&ActorId, ConditionError> {
        self.trigger.actor.as_ref().ok_or(ConditionError::NoActor)
    }

    /// Room named by the `room` parameter, else the firing room, else the
    /// actor's current room.
    pub fn room(&self, params: &Params) -> Result<RoomId, ConditionError> {
        if let Some(room) = params.opt_str("room")? {
            return Ok(RoomId::from(room));
        }
        self.trigger
            .room
            .clone()
            .or_else(|| {
                self.trigger
                    .actor
                    .as_ref()
                    .and_then(|a| self.world.actor_room(a).cloned())
            })
            .ok_or(ConditionError::NoRoom)
    }
}

/// A registered condition type.
pub trait ConditionHandler: Send + Sync {
    /// Decide the condition. `registry` is available for nested conditions.
    fn evaluate(
        &self,
        params: &Params,
        ctx: &ConditionContext<'_>,
        registry: &ConditionRegistry,
    ) -> Result<bool, ConditionError>;
}

impl<F> ConditionHandler for F
where
    F: Fn(&Params, &ConditionContext<'_>, &ConditionRegistry) -> Result<bool, ConditionError>
        + Send
        + Sync,
{
    fn evaluate(
        &self,
        params: &Params,
        ctx: &ConditionContext<'_>,
        registry: &ConditionRegistry,
    ) -> Result<bool, ConditionError> {
        self(params, ctx, registry)
    }
}

/// Condition type name to handler.
#[derive(Default)]
pub struct ConditionRegistry {
    handlers: HashMap<String, Box<dyn ConditionHandler>>,
}

impl core::fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl ConditionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in condition type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register (or replace) a handler.
    pub fn register(&mut self, kind: impl Into<String>, handler: impl ConditionHandler + 'static) {
        self.handlers.insert(kind.into(), Box::new(handler));
    }

    /// Whether a type is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Evaluate one condition, applying `negate`.
    pub fn evaluate(&self, condition: &TriggerCondition, ctx: &ConditionContext<'_>) -> bool {
        let Some(handler) = self.handlers.get(&condition.kind) else {
            warn!(
                rule_id = %ctx.rule_id,
                condition = %condition.kind,
                "Unknown condition type evaluates to false"
            );
            return false;
        };
        match handler.evaluate(&condition.params, ctx, self) {
            Ok(result) => result != condition.negate,
            Err(err) => {
                warn!(
                    rule_id = %ctx.rule_id,
                    condition = %condition.kind,
                    error = %err,
                    "Condition failed to evaluate"
                );
                false
            }
        }
    }

    /// AND over a list; `true` when empty.
    pub fn evaluate_all(&self, conditions: &[TriggerCondition], ctx: &ConditionContext<'_>) -> bool {
        conditions.iter().all(|c| self.evaluate(c, ctx))
    }

    /// OR over a list; `false` when empty.
    pub fn evaluate_any(&self, conditions: &[TriggerCondition], ctx: &ConditionContext<'_>) -> bool {
        conditions.iter().any(|c| self.evaluate(c, ctx))
    }

    /// Condition types referenced (at any nesting depth) that are not
    /// registered, in first-seen order.
    pub fn unknown_kinds(&self, conditions: &[TriggerCondition]) -> Vec<String> {
        let mut unknown = Vec::new();
        self.collect_unknown(conditions, &mut unknown);
        unknown
    }

    fn collect_unknown(&self, conditions: &[TriggerCondition], out: &mut Vec<String>) {
        for condition in conditions {
            if !self.contains(&condition.kind) && !out.contains(&condition.kind) {
                out.push(condition.kind.clone());
            }
            if COMPOSITE_KINDS.contains(&condition.kind.as_str())
                && let Ok(nested) = nested_conditions(&condition.params)
            {
                self.collect_unknown(&nested, out);
            }
        }
    }
}

/// Parse the `conditions` list of a composite condition.
pub fn nested_conditions(params: &Params) -> Result<Vec<TriggerCondition>, ConditionError> {
    let value = params.get("conditions").ok_or(ParamError::Missing {
        key: "conditions".to_owned(),
    })?;
    serde_json::from_value(value.clone()).map_err(|err| ConditionError::Nested(err.to_string()))
}

/// Check composite structure recursively, without evaluating anything.
pub fn validate_structure(conditions: &[TriggerCondition]) -> Result<(), ConditionError> {
    for condition in conditions {
        if COMPOSITE_KINDS.contains(&condition.kind.as_str()) {
            validate_structure(&nested_conditions(&condition.params)?)?;
        }
    }
    Ok(())
}

/// Numeric comparison operator used by compare-style conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
}

impl CompareOp {
    /// Parse a word (`gte`) or symbol (`>=`) operator.
    pub fn parse(op: &str) -> Option<Self> {
        Some(match op.trim() {
            "eq" | "==" | "=" => Self::Eq,
            "ne" | "!=" => Self::Ne,
            "lt" | "<" => Self::Lt,
            "lte" | "le" | "<=" => Self::Lte,
            "gt" | ">" => Self::Gt,
            "gte" | "ge" | ">=" => Self::Gte,
            _ => return None,
        })
    }

    /// Apply to two numbers. NaN compares false under every operator.
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        use core::cmp::Ordering::{Equal, Greater, Less};
        let Some(ordering) = lhs.partial_cmp(&rhs) else {
            return false;
        };
        match self {
            Self::Eq => ordering == Equal,
            Self::Ne => ordering != Equal,
            Self::Lt => ordering == Less,
            Self::Lte => ordering != Greater,
            Self::Gt => ordering == Greater,
            Self::Gte => ordering != Less,
        }
    }

    /// Read `op` (default `gte`) and `value` from parameters.
    pub fn from_params(params: &Params) -> Result<(Self, f64), ConditionError> {
        let op = match params.opt_str("op")? {
            None => Self::Gte,
            Some(raw) => Self::parse(raw).ok_or_else(|| ConditionError::InvalidParam {
                key: "op",
                reason: format!("unknown comparison `{raw}`"),
            })?,
        };
        Ok((op, params.f64("value")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_ops_accept_words_and_symbols() {
        assert_eq!(CompareOp::parse(">="), Some(CompareOp::Gte));
        assert_eq!(CompareOp::parse("lte"), Some(CompareOp::Lte));
        assert_eq!(CompareOp::parse("~"), None);
        assert!(CompareOp::Gte.apply(5.0, 5.0));
        assert!(!CompareOp::Gt.apply(5.0, 5.0));
        assert!(CompareOp::Ne.apply(4.0, 5.0));
        assert!(!CompareOp::Eq.apply(f64::NAN, f64::NAN));
        assert!(CompareOp::Gt.apply(f64::INFINITY, 10.0));
    }

    #[test]
    fn composite_structure_is_validated_recursively() {
        let good = TriggerCondition::new("any").param(
            "conditions",
            serde_json::json!([{ "type": "in_combat" }, { "type": "not", "params": { "conditions": [] } }]),
        );
        assert!(validate_structure(&[good]).is_ok());

        let bad = TriggerCondition::new("all").param(
            "conditions",
            serde_json::json!([{ "type": "not", "params": { "conditions": "oops" } }]),
        );
        assert!(matches!(validate_structure(&[bad]), Err(ConditionError::Nested(_))));

        let missing = TriggerCondition::new("not");
        assert!(matches!(validate_structure(&[missing]), Err(ConditionError::Param(_))));
    }

    #[test]
    fn unknown_kinds_are_found_in_nested_lists() {
        let registry = ConditionRegistry::with_builtins();
        let conditions = vec![
            TriggerCondition::new("has_item"),
            TriggerCondition::new("any").param(
                "conditions",
                serde_json::json!([{ "type": "moon_phase" }, { "type": "moon_phase" }]),
            ),
            TriggerCondition::new("weather"),
        ];
        assert_eq!(registry.unknown_kinds(&conditions), vec!["moon_phase", "weather"]);
    }
}
