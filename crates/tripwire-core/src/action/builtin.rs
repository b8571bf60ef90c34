//! Built-in action types.

use serde_json::Value;
use tracing::debug;
use tripwire_types::{
    Direction, EntityAction, EntityKind, MessageTarget, OutboundEvent, Params, RoomId, RuleId,
    TemplateId, seconds_to_delta,
};

use super::{ActionEnv, ActionError, ActionOutcome, ActionRegistry, Followup};
use crate::condition::flag_and_value;

type Outcome = Result<ActionOutcome, ActionError>;

pub(super) fn register_all(registry: &mut ActionRegistry) {
    // Messaging
    registry.register("message_actor", message_actor);
    registry.register("message_room", message_room);
    registry.register("message_area", message_area);

    // Entity control
    registry.register("spawn_npc", spawn_npc);
    registry.register("despawn_npc", despawn_npc);
    registry.register("move_npc", move_npc);
    registry.register("npc_say", npc_say);

    // Location mutation
    registry.register("set_flag", set_flag);
    registry.register("toggle_flag", toggle_flag);
    registry.register("open_exit", open_exit);
    registry.register("close_exit", close_exit);
    registry.register("set_description", set_description);
    registry.register("reset_description", reset_description);

    // Actor mutation
    registry.register("teleport", teleport);
    registry.register("apply_effect", apply_effect);
    registry.register("remove_effect", remove_effect);
    registry.register("damage", damage);
    registry.register("heal", heal);
    registry.register("give_item", give_item);
    registry.register("take_item", take_item);
    registry.register("grant_xp", grant_xp);

    // Items
    registry.register("spawn_item", spawn_item);
    registry.register("despawn_item", despawn_item);

    // Trigger control
    registry.register("enable_trigger", enable_trigger);
    registry.register("disable_trigger", disable_trigger);
    registry.register("fire_trigger", fire_trigger);
    registry.register("cancel", cancel);
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

fn message_actor(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let actor = env.actor()?.clone();
    let text = env.render(params.str("text")?);
    Ok(ActionOutcome::event(OutboundEvent::to_actor(actor, text)))
}

/// Everyone in the room except the acting entity.
fn message_room(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let text = env.render(params.str("text")?);
    Ok(ActionOutcome::event(OutboundEvent::Message {
        target: MessageTarget::Room {
            room,
            exclude: env.trigger.actor.clone(),
        },
        text,
    }))
}

fn message_area(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let area = env.area(params)?;
    let text = env.render(params.str("text")?);
    Ok(ActionOutcome::event(OutboundEvent::Message {
        target: MessageTarget::Area { area },
        text,
    }))
}

// ---------------------------------------------------------------------------
// Entity control
// ---------------------------------------------------------------------------

fn spawn_npc(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let template = TemplateId::from(params.str("template")?);
    env.world.spawn_npc(&room, &template)?;
    Ok(ActionOutcome::event(entity_event(
        EntityAction::Spawn,
        EntityKind::Npc,
        template,
        room,
    )))
}

fn despawn_npc(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let template = TemplateId::from(params.str("template")?);
    env.world.despawn_npc(&room, &template)?;
    Ok(ActionOutcome::event(entity_event(
        EntityAction::Despawn,
        EntityKind::Npc,
        template,
        room,
    )))
}

/// Reported as a despawn at the origin followed by a spawn at the target.
fn move_npc(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let from = match params.opt_str("from")? {
        Some(room) => RoomId::from(room),
        None => env.room(&Params::new())?,
    };
    let to = RoomId::from(params.str("to")?);
    let template = TemplateId::from(params.str("template")?);
    env.world.move_npc(&template, &from, &to)?;
    Ok(ActionOutcome {
        events: vec![
            entity_event(EntityAction::Despawn, EntityKind::Npc, template.clone(), from),
            entity_event(EntityAction::Spawn, EntityKind::Npc, template, to),
        ],
        ..ActionOutcome::default()
    })
}

fn npc_say(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let template = TemplateId::from(params.str("template")?);
    if env.world.npc_count(&room, &template) == 0 {
        return Err(tripwire_world::WorldError::NpcNotPresent { template, room }.into());
    }
    let speaker = env
        .world
        .template_name(&template)
        .map_or_else(|| template.to_string(), str::to_owned);
    let text = env.render(params.str("text")?);
    Ok(ActionOutcome::event(OutboundEvent::Message {
        target: MessageTarget::Room {
            room,
            exclude: None,
        },
        text: format!("{speaker} says, \"{text}\""),
    }))
}

// ---------------------------------------------------------------------------
// Location mutation
// ---------------------------------------------------------------------------

fn set_flag(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let (flag, value) = flag_and_value(params).map_err(|err| ActionError::InvalidParam {
        key: "flag",
        reason: err.to_string(),
    })?;
    env.world.set_room_flag(&room, &flag, value)?;
    Ok(ActionOutcome::none())
}

/// Anything other than `true` (including unset) toggles to `true`.
fn toggle_flag(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let flag = params.str("flag")?;
    let current = env.world.room_flag(&room, flag) == Some(&Value::Bool(true));
    env.world.set_room_flag(&room, flag, Value::Bool(!current))?;
    Ok(ActionOutcome::none())
}

fn open_exit(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let direction = direction_param(params)?;
    let target = RoomId::from(params.str("target")?);
    env.world.open_exit(&room, direction, &target)?;
    Ok(ActionOutcome::none())
}

fn close_exit(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let direction = direction_param(params)?;
    env.world.close_exit(&room, direction)?;
    Ok(ActionOutcome::none())
}

fn set_description(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let text = env.render(params.str("text")?);
    env.world.set_description(&room, text)?;
    Ok(ActionOutcome::none())
}

fn reset_description(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    env.world.reset_description(&room)?;
    Ok(ActionOutcome::none())
}

// ---------------------------------------------------------------------------
// Actor mutation
// ---------------------------------------------------------------------------

fn teleport(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let actor = env.actor()?.clone();
    let to = RoomId::from(params.str("room")?);
    let from = env.world.move_actor(&actor, &to)?;
    Ok(ActionOutcome::event(OutboundEvent::ActorMoved { actor, from, to }))
}

/// Adds the named effect; with `stat`/`amount` also requests a stat change,
/// and with `duration` schedules the reversal. Reapplying an active effect
/// changes nothing.
fn apply_effect(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let actor = env.actor()?.clone();
    let effect = params.str("effect")?.to_owned();
    let stat = match (params.opt_str("stat")?, params.opt_i64("amount")?) {
        (Some(stat), Some(amount)) => Some((stat.to_owned(), amount)),
        (Some(_), None) => return Err(missing("amount")),
        (None, _) => None,
    };
    let duration = match params.opt_f64("duration")? {
        None => None,
        Some(secs) if secs <= 0.0 => None,
        Some(secs) => Some(seconds_to_delta(secs).ok_or_else(|| ActionError::InvalidParam {
            key: "duration",
            reason: format!("{secs} is not a representable number of seconds"),
        })?),
    };

    if !env.world.add_effect(&actor, &effect)? {
        debug!(actor = %actor, effect = %effect, "Effect already active");
        return Ok(ActionOutcome::none());
    }
    let mut outcome = ActionOutcome::none();
    if let Some((stat, amount)) = &stat {
        outcome.events.push(OutboundEvent::StatDelta {
            actor: actor.clone(),
            stat: stat.clone(),
            delta: *amount,
        });
    }
    if let Some(after) = duration {
        outcome.followups.push(Followup::ExpireEffect {
            actor,
            effect,
            stat,
            after,
        });
    }
    Ok(outcome)
}

fn remove_effect(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let actor = env.actor()?.clone();
    env.world.remove_effect(&actor, params.str("effect")?)?;
    Ok(ActionOutcome::none())
}

fn damage(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let amount = non_negative(params, "amount")?;
    adjust_health(env, amount.saturating_neg())
}

fn heal(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let amount = non_negative(params, "amount")?;
    adjust_health(env, amount)
}

fn adjust_health(env: &mut ActionEnv<'_>, delta: i64) -> Outcome {
    let actor = env.actor()?.clone();
    let applied = env.world.adjust_health(&actor, delta)?;
    Ok(ActionOutcome::event(OutboundEvent::StatDelta {
        actor,
        stat: "health".to_owned(),
        delta: applied,
    }))
}

fn give_item(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let actor = env.actor()?.clone();
    let item = TemplateId::from(params.str("item")?);
    let quantity = params.u32_or("quantity", 1)?;
    env.world.give_item(&actor, &item, quantity)?;
    Ok(ActionOutcome::none())
}

fn take_item(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let actor = env.actor()?.clone();
    let item = TemplateId::from(params.str("item")?);
    let quantity = params.u32_or("quantity", 1)?;
    env.world.take_item(&actor, &item, quantity)?;
    Ok(ActionOutcome::none())
}

fn grant_xp(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let actor = env.actor()?.clone();
    let amount = non_negative(params, "amount")?;
    env.world
        .add_experience(&actor, amount.unsigned_abs())?;
    Ok(ActionOutcome::event(OutboundEvent::StatDelta {
        actor,
        stat: "experience".to_owned(),
        delta: amount,
    }))
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

fn spawn_item(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let item = TemplateId::from(params.str("item")?);
    let quantity = params.u32_or("quantity", 1)?;
    env.world.add_room_items(&room, &item, quantity)?;
    Ok(ActionOutcome::event(entity_event(
        EntityAction::Spawn,
        EntityKind::Item,
        item,
        room,
    )))
}

/// Removes up to `quantity`; removing nothing is not an error.
fn despawn_item(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    let room = env.room(params)?;
    let item = TemplateId::from(params.str("item")?);
    let quantity = params.u32_or("quantity", 1)?;
    let removed = env.world.remove_room_items(&room, &item, quantity)?;
    if removed == 0 {
        return Ok(ActionOutcome::none());
    }
    Ok(ActionOutcome::event(entity_event(
        EntityAction::Despawn,
        EntityKind::Item,
        item,
        room,
    )))
}

// ---------------------------------------------------------------------------
// Trigger control
// ---------------------------------------------------------------------------

fn enable_trigger(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    set_enabled(params, env, true)
}

fn disable_trigger(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    set_enabled(params, env, false)
}

fn set_enabled(params: &Params, env: &ActionEnv<'_>, enabled: bool) -> Outcome {
    Ok(ActionOutcome::followup(Followup::SetEnabled {
        scope: env.target_scope(params)?,
        rule_id: RuleId::from(params.str("trigger")?),
        enabled,
    }))
}

fn fire_trigger(params: &Params, env: &mut ActionEnv<'_>) -> Outcome {
    Ok(ActionOutcome::followup(Followup::FireRule {
        scope: env.target_scope(params)?,
        rule_id: RuleId::from(params.str("trigger")?),
    }))
}

fn cancel(_: &Params, _: &mut ActionEnv<'_>) -> Outcome {
    Ok(ActionOutcome::cancel())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const fn entity_event(
    action: EntityAction,
    kind: EntityKind,
    template: TemplateId,
    location: RoomId,
) -> OutboundEvent {
    OutboundEvent::Entity {
        action,
        kind,
        template,
        location,
    }
}

fn direction_param(params: &Params) -> Result<Direction, ActionError> {
    let raw = params.str("direction")?;
    raw.parse().map_err(|_err| ActionError::InvalidParam {
        key: "direction",
        reason: format!("unknown direction `{raw}`"),
    })
}

fn non_negative(params: &Params, key: &'static str) -> Result<i64, ActionError> {
    let value = params.i64(key)?;
    if value < 0 {
        return Err(ActionError::InvalidParam {
            key,
            reason: format!("{value} is negative"),
        });
    }
    Ok(value)
}

fn missing(key: &str) -> ActionError {
    ActionError::Param(tripwire_types::ParamError::Missing {
        key: key.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};
    use serde_json::json;
    use tripwire_types::{ActorId, AreaId, ScopeKey, TriggerContext};
    use tripwire_world::{ActorState, MemoryWorld, RoomState, WorldAccess};

    use super::*;

    fn world() -> MemoryWorld {
        let mut world = MemoryWorld::new();
        world.add_area(AreaId::from("old_mine"), "The Old Mine");
        world.add_template(TemplateId::from("miner"), "Old Pete");
        let mut cellar = RoomState::new(RoomId::from("cellar"), "Cellar");
        cellar.area = Some(AreaId::from("old_mine"));
        cellar.add_npc(TemplateId::from("miner"));
        world.add_room(cellar).unwrap();
        world.add_room(RoomState::new(RoomId::from("vault"), "Vault")).unwrap();
        let mut alice = ActorState::new(ActorId::from("alice"), "Alice");
        alice.room = Some(RoomId::from("cellar"));
        world.add_actor(alice).unwrap();
        world
    }

    fn run(world: &mut MemoryWorld, kind: &str, params: Value) -> Outcome {
        let registry = ActionRegistry::with_builtins();
        let trigger = TriggerContext::actor_in("alice", "cellar");
        let scope = ScopeKey::room("cellar");
        let rule_id = RuleId::from("test");
        let mut env = ActionEnv {
            world,
            trigger: &trigger,
            scope: &scope,
            rule_id: &rule_id,
            now: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        let params: Params = serde_json::from_value(params).unwrap();
        registry.get(kind).unwrap().execute(&params, &mut env)
    }

    #[test]
    fn messages_render_placeholders_and_exclude_actor() {
        let mut world = world();
        let outcome = run(&mut world, "message_room", json!({ "text": "{actor} arrives." })).unwrap();
        assert_eq!(
            outcome.events,
            vec![OutboundEvent::Message {
                target: MessageTarget::Room {
                    room: RoomId::from("cellar"),
                    exclude: Some(ActorId::from("alice")),
                },
                text: "Alice arrives.".to_owned(),
            }]
        );
        let outcome = run(&mut world, "message_area", json!({ "text": "Rumble." })).unwrap();
        assert!(matches!(
            outcome.events.first(),
            Some(OutboundEvent::Message { target: MessageTarget::Area { area }, .. }) if area.as_str() == "old_mine"
        ));
    }

    #[test]
    fn open_exit_is_idempotent() {
        let mut world = world();
        let params = json!({ "direction": "north", "target": "vault" });
        run(&mut world, "open_exit", params.clone()).unwrap();
        run(&mut world, "open_exit", params).unwrap();
        assert_eq!(
            world.exit_target(&RoomId::from("cellar"), Direction::North),
            Some(&RoomId::from("vault"))
        );
        run(&mut world, "close_exit", json!({ "direction": "n" })).unwrap();
        assert!(world.exit_target(&RoomId::from("cellar"), Direction::North).is_none());
    }

    #[test]
    fn flags_set_and_toggle() {
        let mut world = world();
        let cellar = RoomId::from("cellar");
        run(&mut world, "set_flag", json!({ "gate_open": true })).unwrap();
        assert_eq!(world.room_flag(&cellar, "gate_open"), Some(&Value::Bool(true)));
        run(&mut world, "toggle_flag", json!({ "flag": "gate_open" })).unwrap();
        assert_eq!(world.room_flag(&cellar, "gate_open"), Some(&Value::Bool(false)));
        run(&mut world, "toggle_flag", json!({ "flag": "lit" })).unwrap();
        assert_eq!(world.room_flag(&cellar, "lit"), Some(&Value::Bool(true)));
    }

    #[test]
    fn teleport_to_missing_room_fails() {
        let mut world = world();
        let result = run(&mut world, "teleport", json!({ "room": "nowhere" }));
        assert!(matches!(result, Err(ActionError::World(_))));
        let outcome = run(&mut world, "teleport", json!({ "room": "vault" })).unwrap();
        assert_eq!(
            outcome.events,
            vec![OutboundEvent::ActorMoved {
                actor: ActorId::from("alice"),
                from: Some(RoomId::from("cellar")),
                to: RoomId::from("vault"),
            }]
        );
    }

    #[test]
    fn damage_reports_applied_delta() {
        let mut world = world();
        let outcome = run(&mut world, "damage", json!({ "amount": 150 })).unwrap();
        assert!(matches!(
            outcome.events.first(),
            Some(OutboundEvent::StatDelta { delta: -100, .. })
        ));
        assert!(run(&mut world, "heal", json!({ "amount": -5 })).is_err());
    }

    #[test]
    fn timed_effect_requests_expiry() {
        let mut world = world();
        let outcome = run(
            &mut world,
            "apply_effect",
            json!({ "effect": "blessed", "stat": "strength", "amount": 2, "duration": 30 }),
        )
        .unwrap();
        assert!(world.actor_has_effect(&ActorId::from("alice"), "blessed"));
        assert_eq!(
            outcome.followups,
            vec![Followup::ExpireEffect {
                actor: ActorId::from("alice"),
                effect: "blessed".to_owned(),
                stat: Some(("strength".to_owned(), 2)),
                after: TimeDelta::seconds(30),
            }]
        );

        let again = run(
            &mut world,
            "apply_effect",
            json!({ "effect": "blessed", "stat": "strength", "amount": 2, "duration": 30 }),
        )
        .unwrap();
        assert!(again.events.is_empty());
        assert!(again.followups.is_empty());
    }

    #[test]
    fn npc_say_requires_presence() {
        let mut world = world();
        let outcome = run(&mut world, "npc_say", json!({ "template": "miner", "text": "Hello, {actor}." })).unwrap();
        assert_eq!(outcome.events.first().and_then(OutboundEvent::text), Some("Old Pete says, \"Hello, Alice.\""));
        assert!(run(&mut world, "npc_say", json!({ "template": "ghost", "text": "Boo" })).is_err());
    }

    #[test]
    fn items_and_npcs_emit_entity_events() {
        let mut world = world();
        let outcome = run(&mut world, "spawn_item", json!({ "item": "coin", "quantity": 3 })).unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(world.room_item_count(&RoomId::from("cellar"), &TemplateId::from("coin")), 3);
        let outcome = run(&mut world, "despawn_item", json!({ "item": "gem" })).unwrap();
        assert!(outcome.events.is_empty());
        let outcome = run(&mut world, "move_npc", json!({ "template": "miner", "to": "vault" })).unwrap();
        assert_eq!(outcome.events.len(), 2);
        assert_eq!(world.npc_count(&RoomId::from("vault"), &TemplateId::from("miner")), 1);
    }

    #[test]
    fn trigger_control_becomes_followups() {
        let mut world = world();
        let outcome = run(&mut world, "disable_trigger", json!({ "trigger": "drip", "area": "old_mine" })).unwrap();
        assert_eq!(
            outcome.followups,
            vec![Followup::SetEnabled {
                scope: ScopeKey::area("old_mine"),
                rule_id: RuleId::from("drip"),
                enabled: false,
            }]
        );
        let outcome = run(&mut world, "fire_trigger", json!({ "trigger": "bell" })).unwrap();
        assert!(matches!(
            outcome.followups.first(),
            Some(Followup::FireRule { scope, .. }) if *scope == ScopeKey::room("cellar")
        ));
        assert!(run(&mut world, "cancel", json!({})).unwrap().cancel_remaining);
    }
}
