//! End-to-end trigger scenarios.
//!
//! Each test loads YAML rule content into a [`TriggerEngine`] against a
//! small in-memory world and drives it with simulation events and explicit
//! timestamps. Nothing here sleeps: time only moves when a test says so.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeDelta, Utc};
use tripwire_core::{
    ActionRegistry, ConditionRegistry, EngineError, RuntimeConfig, ScopeContent, TriggerEngine,
};
use tripwire_types::{
    ActorId, AreaId, Direction, InboundEvent, OutboundEvent, RoomId, RuleId, ScopeKey,
    TriggerContext,
};
use tripwire_world::{MemoryWorld, WorldAccess, WorldFixture};

const WORLD: &str = r"
hour: 12
areas:
  - { id: old_mine, name: The Old Mine }
templates:
  rat: a rat
rooms:
  - id: cellar
    name: Damp Cellar
    area: old_mine
    description: Water drips from the ceiling.
  - id: vault
    name: Vault
    area: old_mine
  - id: hall
    name: Great Hall
actors:
  - { id: alice, name: Alice, room: cellar, health: 80 }
  - { id: bob, name: Bob, room: cellar }
";

fn world() -> MemoryWorld {
    WorldFixture::parse(WORLD).unwrap().build().unwrap()
}

fn engine() -> TriggerEngine {
    TriggerEngine::new(&RuntimeConfig::default())
}

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn at(millis: i64) -> DateTime<Utc> {
    t0().checked_add_signed(TimeDelta::milliseconds(millis)).unwrap()
}

fn content(yaml: &str) -> ScopeContent {
    let content = ScopeContent::parse(yaml, None).unwrap();
    assert!(content.rejected().is_empty(), "{:?}", content.rejected());
    content
}

fn cellar() -> ScopeKey {
    ScopeKey::room("cellar")
}

fn enter(actor: &str) -> InboundEvent {
    InboundEvent::RoomEntered {
        actor: ActorId::from(actor),
        room: RoomId::from("cellar"),
        direction: Some(Direction::Down),
    }
}

fn command(actor: &str, text: &str) -> InboundEvent {
    InboundEvent::CommandAttempted {
        actor: ActorId::from(actor),
        room: RoomId::from("cellar"),
        text: text.to_owned(),
    }
}

fn texts(events: &[OutboundEvent]) -> Vec<&str> {
    events.iter().filter_map(OutboundEvent::text).collect()
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[test]
fn cooldown_limits_each_actor_separately() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: drip_warning
    event: on_enter
    cooldown: 30
    actions:
      - { type: message_actor, params: { text: "Cold water drips on {actor}." } }
"#,
        ),
        t0(),
    );

    let first = engine.handle(&enter("alice"), &mut world, at(0));
    assert_eq!(first.messages(), vec!["Cold water drips on Alice."]);

    let again = engine.handle(&enter("alice"), &mut world, at(10_000));
    assert!(!again.handled);
    assert!(again.events.is_empty());

    let bob = engine.handle(&enter("bob"), &mut world, at(10_000));
    assert!(bob.handled);

    let later = engine.handle(&enter("alice"), &mut world, at(30_000));
    assert!(later.handled);
    let state = engine.runtime_state(&cellar(), &RuleId::from("drip_warning")).unwrap();
    assert_eq!(state.fire_count, 3);
}

#[test]
fn max_fires_stops_a_rule_for_good() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: first_visits
    event: on_enter
    max_fires: 2
    actions:
      - { type: grant_xp, params: { amount: 5 } }
"#,
        ),
        t0(),
    );

    for second in 0..2 {
        assert!(engine.handle(&enter("alice"), &mut world, at(second * 1000)).handled);
    }
    let third = engine.handle(&enter("bob"), &mut world, at(5000));
    assert!(!third.handled);
    assert!(third.events.is_empty());
    let state = engine.runtime_state(&cellar(), &RuleId::from("first_visits")).unwrap();
    assert_eq!(state.fire_count, 2);
}

#[test]
fn max_fires_zero_never_fires() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r"
scope: { room: cellar }
triggers:
  - { id: dormant, event: on_enter, max_fires: 0 }
",
        ),
        t0(),
    );
    assert!(!engine.handle(&enter("alice"), &mut world, at(0)).handled);
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

#[test]
fn composite_conditions_gate_firing() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: either_lever
    event: on_enter
    conditions:
      - type: any
        params:
          conditions:
            - { type: flag_set, params: { left_lever: true } }
            - { type: flag_set, params: { right_lever: true } }
    actions:
      - { type: message_actor, params: { text: "The floor rumbles." } }
  - id: unarmed
    event: on_enter
    conditions:
      - type: not
        params:
          conditions:
            - { type: has_item, params: { item: sword } }
    actions:
      - { type: message_actor, params: { text: "You feel exposed." } }
"#,
        ),
        t0(),
    );

    let none = engine.handle(&enter("alice"), &mut world, at(0));
    assert_eq!(none.messages(), vec!["You feel exposed."]);

    world
        .set_room_flag(&RoomId::from("cellar"), "right_lever", serde_json::Value::Bool(true))
        .unwrap();
    let one = engine.handle(&enter("alice"), &mut world, at(1000));
    assert_eq!(one.messages(), vec!["The floor rumbles.", "You feel exposed."]);

    world
        .give_item(&ActorId::from("alice"), &"sword".into(), 1)
        .unwrap();
    let armed = engine.handle(&enter("alice"), &mut world, at(2000));
    assert_eq!(armed.messages(), vec!["The floor rumbles."]);
}

#[test]
fn unknown_condition_types_are_reported_and_never_pass() {
    let mut world = world();
    let mut engine = engine();
    let report = engine.load_scope(
        content(
            r"
scope: { room: cellar }
triggers:
  - id: lunar
    event: on_enter
    conditions:
      - { type: moon_phase, params: { phase: full } }
    actions:
      - { type: summon_wolves }
",
        ),
        t0(),
    );
    assert_eq!(report.loaded, 1);
    assert_eq!(report.unknown_conditions, vec!["moon_phase".to_owned()]);
    assert_eq!(report.unknown_actions, vec!["summon_wolves".to_owned()]);
    assert!(!engine.handle(&enter("alice"), &mut world, at(0)).handled);
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[test]
fn command_patterns_select_rules() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: pull_anything
    event: on_command
    command_pattern: "pull *"
    actions:
      - { type: message_actor, params: { text: "You pull the {command}." } }
  - id: button
    event: on_command
    command_pattern: "press button"
    actions:
      - { type: message_actor, params: { text: "Click." } }
"#,
        ),
        t0(),
    );

    assert!(engine.handle(&command("alice", "pull lever"), &mut world, at(0)).handled);
    assert!(engine.handle(&command("alice", "pull rope"), &mut world, at(1)).handled);
    assert!(!engine.handle(&command("alice", "push lever"), &mut world, at(2)).handled);

    let pressed = engine.handle(&command("alice", "PRESS  Button"), &mut world, at(3));
    assert_eq!(pressed.messages(), vec!["Click."]);
    assert!(!engine.handle(&command("alice", "press button twice"), &mut world, at(4)).handled);
}

#[test]
fn area_commands_only_run_when_the_room_did_not_handle_them() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: listen_here
    event: on_command
    command_pattern: listen
    actions:
      - { type: message_actor, params: { text: "Dripping." } }
"#,
        ),
        t0(),
    );
    engine.load_scope(
        content(
            r#"
scope: { area: old_mine }
triggers:
  - id: listen_anywhere
    event: on_command
    command_pattern: listen
    actions:
      - { type: message_actor, params: { text: "Distant picks." } }
  - id: xyzzy
    event: on_command
    command_pattern: xyzzy
    actions:
      - { type: message_actor, params: { text: "Nothing happens in {area}." } }
"#,
        ),
        t0(),
    );

    let listen = engine.handle(&command("alice", "listen"), &mut world, at(0));
    assert_eq!(listen.messages(), vec!["Dripping."]);

    let magic = engine.handle(&command("alice", "xyzzy"), &mut world, at(1));
    assert!(magic.handled);
    assert_eq!(magic.messages(), vec!["Nothing happens in The Old Mine."]);

    assert!(!engine.handle(&command("alice", "dance"), &mut world, at(2)).handled);
}

// ---------------------------------------------------------------------------
// World-changing scenarios
// ---------------------------------------------------------------------------

const GATE: &str = r#"
scope: { room: cellar }
triggers:
  - id: gate
    event: on_enter
    conditions:
      - { type: flag_set, params: { gate_open: false } }
    actions:
      - { type: set_flag, params: { gate_open: true } }
      - { type: open_exit, params: { direction: north, target: vault } }
      - { type: message_room, params: { text: "A gate grinds open as {actor} enters." } }
"#;

#[test]
fn gate_opens_once_on_first_entry() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(content(GATE), t0());

    let first = engine.handle(&enter("alice"), &mut world, at(0));
    assert!(first.did_fire("gate"));
    assert_eq!(first.messages(), vec!["A gate grinds open as Alice enters."]);
    let cellar_room = RoomId::from("cellar");
    assert_eq!(
        world.exit_target(&cellar_room, Direction::North),
        Some(&RoomId::from("vault"))
    );
    assert_eq!(
        world.room_flag(&cellar_room, "gate_open"),
        Some(&serde_json::Value::Bool(true))
    );

    let second = engine.handle(&enter("bob"), &mut world, at(5000));
    assert!(!second.handled);
    assert_eq!(
        world.exit_target(&cellar_room, Direction::North),
        Some(&RoomId::from("vault"))
    );
}

#[test]
fn failing_actions_do_not_abort_the_chain() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: rat_greeting
    event: on_enter
    actions:
      - { type: npc_say, params: { template: rat, text: "Squeak." } }
      - { type: message_actor, params: { text: "Something scurries away." } }
"#,
        ),
        t0(),
    );

    let result = engine.handle(&enter("alice"), &mut world, at(0));
    assert!(result.handled);
    assert!(matches!(
        result.events.first(),
        Some(OutboundEvent::ActionFailed { action, .. }) if action == "npc_say"
    ));
    assert_eq!(result.messages(), vec!["Something scurries away."]);
}

#[test]
fn cancel_stops_the_remaining_actions() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: short_story
    event: on_enter
    actions:
      - { type: message_actor, params: { text: "Once upon a time." } }
      - { type: cancel }
      - { type: message_actor, params: { text: "The end." } }
"#,
        ),
        t0(),
    );
    let result = engine.handle(&enter("alice"), &mut world, at(0));
    assert_eq!(result.messages(), vec!["Once upon a time."]);
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

const DRIP_TIMER: &str = r#"
scope: { room: cellar }
triggers:
  - id: drip
    event: on_timer
    timer_interval: 45
    timer_initial_delay: 10
    actions:
      - { type: message_room, params: { text: "Water drips in {room}." } }
"#;

#[test]
fn timer_rules_fire_on_schedule_until_disabled() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(content(DRIP_TIMER), t0());
    assert_eq!(engine.next_deadline(), Some(at(10_000)));

    assert!(engine.advance(&mut world, at(9_999)).is_empty());
    assert_eq!(texts(&engine.advance(&mut world, at(10_000))), vec!["Water drips in Damp Cellar."]);
    assert!(engine.advance(&mut world, at(54_999)).is_empty());
    assert_eq!(engine.advance(&mut world, at(55_000)).len(), 1);
    assert_eq!(engine.next_deadline(), Some(at(100_000)));

    let changed = engine
        .disable(&cellar(), &RuleId::from("drip"), at(60_000))
        .unwrap();
    assert_eq!(
        changed,
        OutboundEvent::ControlChanged {
            scope: cellar(),
            rule_id: RuleId::from("drip"),
            enabled: false,
        }
    );
    assert_eq!(engine.pending_jobs(), 0);
    assert!(engine.advance(&mut world, at(500_000)).is_empty());

    engine
        .enable(&cellar(), &RuleId::from("drip"), at(600_000))
        .unwrap();
    assert_eq!(engine.next_deadline(), Some(at(610_000)));
}

#[test]
fn timer_rules_honour_their_firing_limit() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: twice
    event: on_timer
    timer_interval: 5
    timer_initial_delay: 5
    max_fires: 2
    actions:
      - { type: message_room, params: { text: "Bong." } }
"#,
        ),
        t0(),
    );
    assert_eq!(engine.advance(&mut world, at(5_000)).len(), 1);
    assert_eq!(engine.advance(&mut world, at(10_000)).len(), 1);
    assert_eq!(engine.pending_jobs(), 0);
    assert!(engine.advance(&mut world, at(60_000)).is_empty());
}

#[test]
fn delayed_actions_resume_later() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: trap
    event: on_enter
    actions:
      - { type: message_actor, params: { text: "a" } }
      - { type: damage, params: { amount: 10 }, delay: 0.5 }
      - { type: message_actor, params: { text: "b" } }
"#,
        ),
        t0(),
    );

    let immediate = engine.handle(&enter("alice"), &mut world, at(0));
    assert_eq!(immediate.events, vec![OutboundEvent::to_actor(ActorId::from("alice"), "a")]);
    assert_eq!(engine.pending_jobs(), 1);

    assert!(engine.advance(&mut world, at(499)).is_empty());
    let later = engine.advance(&mut world, at(500));
    assert_eq!(
        later,
        vec![
            OutboundEvent::StatDelta {
                actor: ActorId::from("alice"),
                stat: "health".to_owned(),
                delta: -10,
            },
            OutboundEvent::to_actor(ActorId::from("alice"), "b"),
        ]
    );
    assert_eq!(world.actor_health(&ActorId::from("alice")), Some((70, 100)));
}

#[test]
fn timed_effects_expire() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r"
scope: { room: cellar }
triggers:
  - id: blessing
    event: on_enter
    actions:
      - { type: apply_effect, params: { effect: blessed, stat: strength, amount: 2, duration: 5 } }
",
        ),
        t0(),
    );
    let alice = ActorId::from("alice");
    let applied = engine.handle(&enter("alice"), &mut world, at(0));
    assert_eq!(applied.events.len(), 1);
    assert!(world.actor_has_effect(&alice, "blessed"));

    let expired = engine.advance(&mut world, at(5_000));
    assert_eq!(
        expired,
        vec![OutboundEvent::StatDelta {
            actor: alice.clone(),
            stat: "strength".to_owned(),
            delta: -2,
        }]
    );
    assert!(!world.actor_has_effect(&alice, "blessed"));
}

#[test]
fn reapplying_an_active_effect_changes_nothing() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r"
scope: { room: cellar }
triggers:
  - id: blessing
    event: on_enter
    actions:
      - { type: apply_effect, params: { effect: blessed, stat: strength, amount: 2, duration: 5 } }
",
        ),
        t0(),
    );
    let alice = ActorId::from("alice");
    assert_eq!(engine.handle(&enter("alice"), &mut world, at(0)).events.len(), 1);
    let again = engine.handle(&enter("alice"), &mut world, at(3_000));
    assert!(again.handled);
    assert!(again.events.is_empty());
    assert_eq!(engine.pending_jobs(), 1);

    assert_eq!(engine.advance(&mut world, at(5_000)).len(), 1);
    assert!(!world.actor_has_effect(&alice, "blessed"));
    assert!(engine.advance(&mut world, at(10_000)).is_empty());

    assert_eq!(engine.handle(&enter("alice"), &mut world, at(11_000)).events.len(), 1);
    assert!(world.actor_has_effect(&alice, "blessed"));
}

#[test]
fn unloading_cancels_timers_and_pending_continuations() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: drip
    event: on_timer
    timer_interval: 45
    timer_initial_delay: 10
    actions:
      - { type: message_room, params: { text: "drip" } }
  - id: slow_door
    event: on_enter
    actions:
      - { type: message_actor, params: { text: "The door creaks shut." }, delay: 2 }
"#,
        ),
        t0(),
    );
    let result = engine.handle(&enter("alice"), &mut world, at(0));
    assert!(result.handled);
    assert!(result.events.is_empty());
    assert_eq!(engine.pending_jobs(), 2);

    assert!(engine.unload_scope(&cellar()));
    assert_eq!(engine.pending_jobs(), 0);
    assert!(engine.advance(&mut world, at(1_000_000)).is_empty());
    assert!(!engine.unload_scope(&cellar()));
}

#[test]
fn disabling_a_rule_drops_its_delayed_actions() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: tale
    event: on_enter
    actions:
      - { type: message_actor, params: { text: "a" } }
      - { type: message_actor, params: { text: "b" }, delay: 5 }
  - id: other
    event: on_enter
    actions:
      - { type: message_actor, params: { text: "c" }, delay: 5 }
"#,
        ),
        t0(),
    );
    let tale = RuleId::from("tale");
    let fired = engine.handle(&enter("alice"), &mut world, at(0));
    assert_eq!(fired.messages(), vec!["a"]);
    assert_eq!(engine.pending_jobs(), 2);

    engine.disable(&cellar(), &tale, at(1_000)).unwrap();
    assert_eq!(engine.pending_jobs(), 1);
    engine.enable(&cellar(), &tale, at(2_000)).unwrap();

    let later = engine.advance(&mut world, at(5_000));
    assert_eq!(later, vec![OutboundEvent::to_actor(ActorId::from("alice"), "c")]);
}

// ---------------------------------------------------------------------------
// Cascades
// ---------------------------------------------------------------------------

#[test]
fn mutual_fire_trigger_cycles_stop() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: ping
    event: on_enter
    actions:
      - { type: message_actor, params: { text: "ping" } }
      - { type: fire_trigger, params: { trigger: pong } }
  - id: pong
    event: on_command
    command_pattern: pong
    actions:
      - { type: message_actor, params: { text: "pong" } }
      - { type: fire_trigger, params: { trigger: ping } }
"#,
        ),
        t0(),
    );
    let result = engine.handle(&enter("alice"), &mut world, at(0));
    assert_eq!(result.messages(), vec!["ping", "pong"]);
    assert_eq!(
        result.fired,
        vec![(cellar(), RuleId::from("ping")), (cellar(), RuleId::from("pong"))]
    );
}

#[test]
fn cascade_depth_is_bounded() {
    let mut world = world();
    let mut engine = TriggerEngine::with_registries(
        ConditionRegistry::with_builtins(),
        ActionRegistry::with_builtins(),
        1,
    );
    engine.load_scope(
        content(
            r"
scope: { room: cellar }
triggers:
  - id: one
    event: on_enter
    actions: [{ type: fire_trigger, params: { trigger: two } }]
  - id: two
    event: on_timer
    timer_interval: 1000
    actions: [{ type: fire_trigger, params: { trigger: three } }]
  - id: three
    event: on_timer
    timer_interval: 1000
",
        ),
        t0(),
    );
    let result = engine.handle(&enter("alice"), &mut world, at(0));
    assert!(result.did_fire("one"));
    assert!(result.did_fire("two"));
    assert!(!result.did_fire("three"));
}

#[test]
fn triggers_can_enable_each_other() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { room: cellar }
triggers:
  - id: reveal
    event: on_command
    command_pattern: search
    max_fires: 1
    actions:
      - { type: enable_trigger, params: { trigger: secret_door } }
  - id: secret_door
    event: on_command
    command_pattern: push wall
    enabled: false
    actions:
      - { type: teleport, params: { room: vault } }
  - id: broken
    event: on_command
    command_pattern: kick wall
    actions:
      - { type: disable_trigger, params: { trigger: missing, area: old_mine } }
"#,
        ),
        t0(),
    );

    assert!(!engine.handle(&command("alice", "push wall"), &mut world, at(0)).handled);
    let search = engine.handle(&command("alice", "search"), &mut world, at(1));
    assert!(search.events.contains(&OutboundEvent::ControlChanged {
        scope: cellar(),
        rule_id: RuleId::from("secret_door"),
        enabled: true,
    }));
    assert_eq!(engine.is_enabled(&cellar(), &RuleId::from("secret_door")), Some(true));

    let pushed = engine.handle(&command("alice", "push wall"), &mut world, at(2));
    assert!(matches!(
        pushed.events.as_slice(),
        [OutboundEvent::ActorMoved { to, .. }] if *to == RoomId::from("vault")
    ));
    assert_eq!(world.actor_room(&ActorId::from("alice")), Some(&RoomId::from("vault")));

    let kicked = engine.handle(&command("bob", "kick wall"), &mut world, at(3));
    assert!(matches!(
        kicked.events.as_slice(),
        [OutboundEvent::ActionFailed { action, .. }] if action == "disable_trigger"
    ));
}

#[test]
fn manual_fire_ignores_event_binding_but_not_gates() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(content(GATE), t0());
    let ctx = TriggerContext::actor_in("alice", "cellar");

    let fired = engine
        .fire_rule(&cellar(), &RuleId::from("gate"), &ctx, &mut world, at(0))
        .unwrap();
    assert!(fired.handled);
    let refused = engine
        .fire_rule(&cellar(), &RuleId::from("gate"), &ctx, &mut world, at(1))
        .unwrap();
    assert!(!refused.handled);

    assert_eq!(
        engine
            .fire_rule(&cellar(), &RuleId::from("nope"), &ctx, &mut world, at(2))
            .unwrap_err(),
        EngineError::RuleNotFound {
            scope: cellar(),
            rule_id: RuleId::from("nope"),
        }
    );
    assert_eq!(
        engine
            .fire_rule(&ScopeKey::room("hall"), &RuleId::from("gate"), &ctx, &mut world, at(3))
            .unwrap_err(),
        EngineError::ScopeNotLoaded(ScopeKey::room("hall"))
    );
}

#[test]
fn area_transitions_fire_area_rules() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(
        content(
            r#"
scope: { area: old_mine }
triggers:
  - id: welcome
    event: on_area_enter
    actions:
      - { type: message_actor, params: { text: "Welcome to {to_area}, {actor}." } }
  - id: farewell
    event: on_area_exit
    actions:
      - { type: message_actor, params: { text: "You leave {from_area}." } }
"#,
        ),
        t0(),
    );
    let entered = engine.handle(
        &InboundEvent::AreaEntered {
            actor: ActorId::from("alice"),
            from: AreaId::from("surface"),
            to: AreaId::from("old_mine"),
        },
        &mut world,
        at(0),
    );
    assert_eq!(entered.messages(), vec!["Welcome to old_mine, Alice."]);

    let exited = engine.handle(
        &InboundEvent::AreaExited {
            actor: ActorId::from("alice"),
            from: AreaId::from("old_mine"),
            to: AreaId::from("surface"),
        },
        &mut world,
        at(1),
    );
    assert_eq!(exited.messages(), vec!["You leave old_mine."]);
}

// ---------------------------------------------------------------------------
// Persistence and reload
// ---------------------------------------------------------------------------

const LEVER: &str = r#"
scope: { room: cellar }
triggers:
  - id: lever
    event: on_command
    command_pattern: pull lever
    max_fires: 1
    permanent: true
    actions:
      - { type: message_actor, params: { text: "The lever clunks." } }
  - id: chatter
    event: on_enter
    actions:
      - { type: message_actor, params: { text: "Echoes." } }
"#;

#[test]
fn permanent_state_survives_a_restart() {
    let mut world = world();
    let mut first = engine();
    first.load_scope(content(LEVER), t0());
    assert!(first.handle(&command("alice", "pull lever"), &mut world, at(0)).handled);
    first.handle(&enter("alice"), &mut world, at(1));

    let saved = first.export_permanent();
    assert_eq!(saved.len(), 1);
    let lever = saved.first().unwrap();
    assert_eq!(lever.fire_count, 1);
    assert_eq!(lever.last_fired_at, Some(at(0)));

    let mut second = engine();
    assert_eq!(second.restore(saved.clone()), 0);
    assert_eq!(second.export_permanent(), saved);
    let report = second.load_scope(content(LEVER), at(10));
    assert_eq!(report.restored, 1);
    assert!(!second.handle(&command("bob", "pull lever"), &mut world, at(20)).handled);

    let mut third = engine();
    third.load_scope(content(LEVER), at(10));
    assert_eq!(third.restore(saved), 1);
    assert!(!third.handle(&command("bob", "pull lever"), &mut world, at(20)).handled);
}

#[test]
fn actor_cooldowns_hold_across_a_restart() {
    let shrine = r#"
scope: { room: cellar }
triggers:
  - id: shrine
    event: on_enter
    cooldown: 3600
    permanent: true
    actions:
      - { type: message_actor, params: { text: "The shrine glows." } }
"#;
    let mut world = world();
    let mut first = engine();
    first.load_scope(content(shrine), t0());
    assert!(first.handle(&enter("alice"), &mut world, at(0)).handled);
    let saved = first.export_permanent();

    let mut second = engine();
    second.restore(saved);
    second.load_scope(content(shrine), at(10_000));
    assert!(!second.handle(&enter("alice"), &mut world, at(20_000)).handled);
    assert!(!second.handle(&enter("bob"), &mut world, at(20_000)).handled);
    assert!(second.handle(&enter("alice"), &mut world, at(3_600_000)).handled);
}

#[test]
fn reload_carries_permanent_counters_only() {
    let mut world = world();
    let mut engine = engine();
    engine.load_scope(content(LEVER), t0());
    engine.handle(&command("alice", "pull lever"), &mut world, at(0));
    engine.handle(&enter("alice"), &mut world, at(1));
    engine
        .disable(&cellar(), &RuleId::from("chatter"), at(2))
        .unwrap();

    let report = engine.reload_scope(content(LEVER), at(3));
    assert_eq!(report.loaded, 2);
    assert_eq!(report.restored, 1);

    let lever = engine.runtime_state(&cellar(), &RuleId::from("lever")).unwrap();
    assert_eq!(lever.fire_count, 1);
    assert!(engine.runtime_state(&cellar(), &RuleId::from("chatter")).is_none());
    assert_eq!(engine.is_enabled(&cellar(), &RuleId::from("chatter")), Some(true));
    assert!(!engine.handle(&command("alice", "pull lever"), &mut world, at(4)).handled);
}

#[test]
fn invalid_records_are_rejected_without_losing_the_file() {
    let content = ScopeContent::parse(
        r"
scope: { room: cellar }
triggers:
  - { id: ok, event: on_enter }
  - { id: no_pattern, event: on_command }
  - { id: ok, event: on_exit }
  - { event: on_enter }
",
        None,
    )
    .unwrap();
    assert_eq!(content.rules().len(), 1);
    assert_eq!(content.rejected().len(), 3);

    let mut engine = engine();
    let report = engine.load_scope(content, t0());
    assert_eq!(report.loaded, 1);
    assert_eq!(report.rejected.len(), 3);
}
