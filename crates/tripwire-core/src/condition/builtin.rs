//! Built-in condition types.

use rand::Rng;
use serde_json::Value;
use tripwire_types::{Direction, Params, TemplateId};

use super::{CompareOp, ConditionContext, ConditionError, ConditionRegistry, nested_conditions};

type Outcome = Result<bool, ConditionError>;

pub(super) fn register_all(registry: &mut ConditionRegistry) {
    // Actor state
    registry.register("has_item", has_item);
    registry.register("has_equipped", has_equipped);
    registry.register("health_percent", health_percent);
    registry.register("level", level);
    registry.register("has_effect", has_effect);
    registry.register("in_combat", in_combat);

    // Location state
    registry.register("flag_set", flag_set);
    registry.register("exit_open", exit_open);
    registry.register("entity_present", entity_present);
    registry.register("item_present", item_present);
    registry.register("player_count", player_count);

    // Temporal
    registry.register("time_of_day", time_of_day);
    registry.register("seconds_since_fired", seconds_since_fired);

    // Logic
    registry.register("all", all);
    registry.register("any", any);
    registry.register("not", not);
    registry.register("random_chance", random_chance);
}

// ---------------------------------------------------------------------------
// Actor state
// ---------------------------------------------------------------------------

fn has_item(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let actor = ctx.actor()?;
    let item = TemplateId::from(params.str("item")?);
    let quantity = params.u32_or("quantity", 1)?;
    Ok(ctx.world.actor_item_count(actor, &item) >= quantity)
}

fn has_equipped(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let actor = ctx.actor()?;
    let item = TemplateId::from(params.str("item")?);
    Ok(ctx.world.actor_has_equipped(actor, &item))
}

fn health_percent(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let actor = ctx.actor()?;
    let (op, value) = CompareOp::from_params(params)?;
    let (health, max) = ctx
        .world
        .actor_health(actor)
        .ok_or_else(|| ConditionError::UnknownActor(actor.clone()))?;
    let percent = f64::from(health) * 100.0 / f64::from(max.max(1));
    Ok(op.apply(percent, value))
}

fn level(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let actor = ctx.actor()?;
    let (op, value) = CompareOp::from_params(params)?;
    let level = ctx
        .world
        .actor_level(actor)
        .ok_or_else(|| ConditionError::UnknownActor(actor.clone()))?;
    Ok(op.apply(f64::from(level), value))
}

fn has_effect(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let actor = ctx.actor()?;
    Ok(ctx.world.actor_has_effect(actor, params.str("effect")?))
}

fn in_combat(_: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    Ok(ctx.world.actor_in_combat(ctx.actor()?))
}

// ---------------------------------------------------------------------------
// Location state
// ---------------------------------------------------------------------------

/// `{flag: gate_open, value: false}` or the shorthand `{gate_open: false}`.
/// An unset flag equals `false` and `null`.
fn flag_set(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let room = ctx.room(params)?;
    let (flag, expected) = flag_and_value(params)?;
    let actual = ctx.world.room_flag(&room, &flag);
    Ok(flag_matches(actual, &expected))
}

fn exit_open(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let room = ctx.room(params)?;
    let direction = direction_param(params)?;
    Ok(ctx.world.exit_target(&room, direction).is_some())
}

fn entity_present(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let room = ctx.room(params)?;
    let template = TemplateId::from(params.str("template")?);
    let quantity = params.u32_or("quantity", 1)?;
    Ok(ctx.world.npc_count(&room, &template) >= quantity)
}

fn item_present(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let room = ctx.room(params)?;
    let item = TemplateId::from(params.str("item")?);
    let quantity = params.u32_or("quantity", 1)?;
    Ok(ctx.world.room_item_count(&room, &item) >= quantity)
}

fn player_count(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let room = ctx.room(params)?;
    let (op, value) = CompareOp::from_params(params)?;
    let count = u32::try_from(ctx.world.actors_in_room(&room).len()).unwrap_or(u32::MAX);
    Ok(op.apply(f64::from(count), value))
}

// ---------------------------------------------------------------------------
// Temporal
// ---------------------------------------------------------------------------

/// Hour window `[from, to)`, wrapping past midnight when `from > to`.
/// Equal bounds cover the whole day.
fn time_of_day(params: &Params, ctx: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let from = params.u32_or("from", 0)?;
    let to = params.u32_or("to", 24)?;
    if from > 24 || to > 24 {
        return Err(ConditionError::InvalidParam {
            key: "from",
            reason: "hours must be within 0..=24".to_owned(),
        });
    }
    let hour = ctx.world.hour_of_day();
    Ok(match from.cmp(&to) {
        core::cmp::Ordering::Less => from <= hour && hour < to,
        core::cmp::Ordering::Greater => hour >= from || hour < to,
        core::cmp::Ordering::Equal => true,
    })
}

/// Never having fired counts as infinitely long ago.
fn seconds_since_fired(
    params: &Params,
    ctx: &ConditionContext<'_>,
    _: &ConditionRegistry,
) -> Outcome {
    let (op, value) = CompareOp::from_params(params)?;
    let elapsed = ctx.last_fired_at.map_or(f64::INFINITY, |last| {
        ctx.now
            .signed_duration_since(last)
            .to_std()
            .map_or(0.0, |d| d.as_secs_f64())
    });
    Ok(op.apply(elapsed, value))
}

// ---------------------------------------------------------------------------
// Logic
// ---------------------------------------------------------------------------

fn all(params: &Params, ctx: &ConditionContext<'_>, registry: &ConditionRegistry) -> Outcome {
    Ok(registry.evaluate_all(&nested_conditions(params)?, ctx))
}

fn any(params: &Params, ctx: &ConditionContext<'_>, registry: &ConditionRegistry) -> Outcome {
    Ok(registry.evaluate_any(&nested_conditions(params)?, ctx))
}

/// NOT over the conjunction of the nested list.
fn not(params: &Params, ctx: &ConditionContext<'_>, registry: &ConditionRegistry) -> Outcome {
    Ok(!registry.evaluate_all(&nested_conditions(params)?, ctx))
}

fn random_chance(params: &Params, _: &ConditionContext<'_>, _: &ConditionRegistry) -> Outcome {
    let percent = params.f64("percent")?;
    if percent <= 0.0 {
        return Ok(false);
    }
    if percent >= 100.0 {
        return Ok(true);
    }
    Ok(rand::rng().random_range(0.0..100.0) < percent)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve the flag name and expected value, accepting the single-key
/// shorthand. A missing `value` means `true`.
pub(crate) fn flag_and_value(params: &Params) -> Result<(String, Value), ConditionError> {
    if let Some(flag) = params.opt_str("flag")? {
        let value = params.get("value").cloned().unwrap_or(Value::Bool(true));
        return Ok((flag.to_owned(), value));
    }
    let mut extra = params.iter().filter(|(key, _)| key.as_str() != "room");
    match (extra.next(), extra.next()) {
        (Some((flag, value)), None) => Ok((flag.clone(), value.clone())),
        _ => Err(ConditionError::InvalidParam {
            key: "flag",
            reason: "expected `flag`/`value` or a single `<flag>: <value>` pair".to_owned(),
        }),
    }
}

fn flag_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => matches!(expected, Value::Bool(false) | Value::Null),
        Some(Value::Number(a)) => match (a.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => CompareOp::Eq.apply(a, b),
            _ => false,
        },
        Some(actual) => actual == expected,
    }
}

fn direction_param(params: &Params) -> Result<Direction, ConditionError> {
    let raw = params.str("direction")?;
    raw.parse().map_err(|_err| ConditionError::InvalidParam {
        key: "direction",
        reason: format!("unknown direction `{raw}`"),
    })
}
