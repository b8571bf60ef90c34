//! Placeholder substitution for authored text.
//!
//! Recognised placeholders are resolved from the firing context and the
//! world at execution time. Unknown placeholders and unmatched braces are
//! left verbatim so authoring mistakes are visible in play.

use tripwire_types::TriggerContext;
use tripwire_world::WorldAccess;

/// Values available to `{placeholder}` substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    actor: Option<String>,
    actor_id: Option<String>,
    room: Option<String>,
    room_id: Option<String>,
    area: Option<String>,
    direction: Option<String>,
    command: Option<String>,
    from_area: Option<String>,
    to_area: Option<String>,
}

impl TemplateVars {
    /// Resolve variables from a context, preferring display names from
    /// the world and falling back to identifiers.
    pub fn resolve(ctx: &TriggerContext, world: &dyn WorldAccess) -> Self {
        let room_id = ctx
            .room
            .clone()
            .or_else(|| ctx.actor.as_ref().and_then(|a| world.actor_room(a).cloned()));
        let area_id = ctx
            .area
            .clone()
            .or_else(|| room_id.as_ref().and_then(|r| world.room_area(r).cloned()));
        Self {
            actor: ctx.actor.as_ref().map(|a| {
                world
                    .actor_name(a)
                    .map_or_else(|| a.to_string(), str::to_owned)
            }),
            actor_id: ctx.actor.as_ref().map(ToString::to_string),
            room: room_id.as_ref().map(|r| {
                world
                    .room_name(r)
                    .map_or_else(|| r.to_string(), str::to_owned)
            }),
            room_id: room_id.as_ref().map(ToString::to_string),
            area: area_id.as_ref().map(|a| {
                world
                    .area_name(a)
                    .map_or_else(|| a.to_string(), str::to_owned)
            }),
            direction: ctx.direction.map(|d| d.as_str().to_owned()),
            command: ctx.command.clone(),
            from_area: ctx.transition.as_ref().map(|t| t.from.to_string()),
            to_area: ctx.transition.as_ref().map(|t| t.to.to_string()),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        let value = match name {
            "actor" => &self.actor,
            "actor_id" => &self.actor_id,
            "room" => &self.room,
            "room_id" => &self.room_id,
            "area" => &self.area,
            "direction" => &self.direction,
            "command" => &self.command,
            "from_area" => &self.from_area,
            "to_area" => &self.to_area,
            _ => return None,
        };
        value.as_deref()
    }
}

/// Replace `{name}` placeholders in `text`.
pub fn render(text: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let (before, from_brace) = rest.split_at(open);
        out.push_str(before);
        let Some(close) = from_brace.find('}') else {
            out.push_str(from_brace);
            return out;
        };
        let (placeholder, after) = from_brace.split_at(close);
        let name = placeholder.trim_start_matches('{');
        match vars.lookup(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str(placeholder);
                out.push('}');
            }
        }
        rest = after.strip_prefix('}').unwrap_or(after);
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tripwire_types::{ActorId, AreaId, Direction, RoomId};
    use tripwire_world::{ActorState, MemoryWorld, RoomState};

    use super::*;

    fn world() -> MemoryWorld {
        let mut world = MemoryWorld::new();
        world.add_area(AreaId::from("old_mine"), "The Old Mine");
        let mut room = RoomState::new(RoomId::from("cellar"), "Damp Cellar");
        room.area = Some(AreaId::from("old_mine"));
        world.add_room(room).unwrap();
        let mut actor = ActorState::new(ActorId::from("alice"), "Alice");
        actor.room = Some(RoomId::from("cellar"));
        world.add_actor(actor).unwrap();
        world
    }

    #[test]
    fn placeholders_resolve_to_display_names() {
        let world = world();
        let ctx = TriggerContext::actor_in("alice", "cellar").with_direction(Direction::North);
        let vars = TemplateVars::resolve(&ctx, &world);
        assert_eq!(
            render("{actor} ({actor_id}) enters {room} in {area} from the {direction}.", &vars),
            "Alice (alice) enters Damp Cellar in The Old Mine from the north."
        );
    }

    #[test]
    fn unknown_and_unresolved_placeholders_stay_verbatim() {
        let world = world();
        let vars = TemplateVars::resolve(&TriggerContext::ambient(), &world);
        assert_eq!(render("{actor} sees {nothing}", &vars), "{actor} sees {nothing}");
        assert_eq!(render("broken {brace", &vars), "broken {brace");
        assert_eq!(render("no placeholders", &vars), "no placeholders");
    }

    #[test]
    fn transition_and_command_are_available() {
        let world = world();
        let ctx = TriggerContext::default()
            .with_transition("surface", "old_mine")
            .with_command("pull lever");
        let vars = TemplateVars::resolve(&ctx, &world);
        assert_eq!(
            render("{from_area} -> {to_area}: {command}", &vars),
            "surface -> old_mine: pull lever"
        );
    }
}
