//! YAML world fixtures.
//!
//! A fixture describes a small world for play-testing trigger content
//! without the full simulation:
//!
//! ```yaml
//! hour: 12
//! areas:
//!   - { id: old_mine, name: The Old Mine }
//! templates:
//!   rat: a rat
//! rooms:
//!   - id: cellar
//!     name: Damp Cellar
//!     area: old_mine
//!     description: Water drips from the ceiling.
//!     exits: { up: hall }
//!     flags: { gate_open: false }
//!     items: { torch: 1 }
//!     npcs: [rat]
//! actors:
//!   - { id: alice, name: Alice, room: cellar, health: 80, level: 3 }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tripwire_types::{ActorId, AreaId, Direction, RoomId, TemplateId};

use crate::actor::ActorState;
use crate::error::WorldError;
use crate::memory::MemoryWorld;
use crate::room::RoomState;

/// Top-level fixture document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldFixture {
    /// Starting in-world hour.
    #[serde(default)]
    pub hour: u32,
    /// Areas.
    #[serde(default)]
    pub areas: Vec<AreaFixture>,
    /// Template id to display name.
    #[serde(default)]
    pub templates: BTreeMap<TemplateId, String>,
    /// Rooms.
    #[serde(default)]
    pub rooms: Vec<RoomFixture>,
    /// Actors.
    #[serde(default)]
    pub actors: Vec<ActorFixture>,
}

/// An area entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaFixture {
    /// Area identifier.
    pub id: AreaId,
    /// Display name.
    pub name: String,
}

/// A room entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomFixture {
    /// Room identifier.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Owning area.
    #[serde(default)]
    pub area: Option<AreaId>,
    /// Authored description.
    #[serde(default)]
    pub description: String,
    /// Exits open at load.
    #[serde(default)]
    pub exits: BTreeMap<Direction, RoomId>,
    /// Initial flags.
    #[serde(default)]
    pub flags: BTreeMap<String, Value>,
    /// Items lying in the room.
    #[serde(default)]
    pub items: BTreeMap<TemplateId, u32>,
    /// NPC templates present at load, one instance each.
    #[serde(default)]
    pub npcs: Vec<TemplateId>,
}

const fn default_health() -> u32 {
    100
}

const fn default_level() -> u32 {
    1
}

/// An actor entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorFixture {
    /// Actor identifier.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    /// Starting room.
    #[serde(default)]
    pub room: Option<RoomId>,
    /// Current health.
    #[serde(default = "default_health")]
    pub health: u32,
    /// Maximum health.
    #[serde(default = "default_health")]
    pub max_health: u32,
    /// Character level.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Carried items.
    #[serde(default)]
    pub inventory: BTreeMap<TemplateId, u32>,
    /// Equipped items.
    #[serde(default)]
    pub equipped: Vec<TemplateId>,
    /// Active effects.
    #[serde(default)]
    pub effects: Vec<String>,
    /// Whether the actor starts in combat.
    #[serde(default)]
    pub in_combat: bool,
}

impl WorldFixture {
    /// Parse a fixture from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Yaml`] if the text is not a valid fixture.
    pub fn parse(yaml: &str) -> Result<Self, WorldError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Read and parse a fixture file.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Io`] or [`WorldError::Yaml`].
    pub fn from_file(path: &Path) -> Result<Self, WorldError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Build the in-memory world described by the fixture.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] for duplicate ids, actors in unknown rooms,
    /// or exits leading to unknown rooms.
    pub fn build(self) -> Result<MemoryWorld, WorldError> {
        let mut world = MemoryWorld::new();
        world.set_hour(self.hour);
        for area in self.areas {
            world.add_area(area.id, area.name);
        }
        for (id, name) in self.templates {
            world.add_template(id, name);
        }
        for fixture in self.rooms {
            let mut room = RoomState::new(fixture.id, fixture.name);
            room.area = fixture.area;
            room.description = fixture.description;
            room.exits = fixture.exits;
            room.flags = fixture.flags;
            room.items = fixture.items;
            for npc in fixture.npcs {
                room.add_npc(npc);
            }
            world.add_room(room)?;
        }
        world.validate_exits()?;
        for fixture in self.actors {
            let mut actor = ActorState::new(fixture.id, fixture.name);
            actor.room = fixture.room;
            actor.max_health = fixture.max_health.max(1);
            actor.health = fixture.health.min(actor.max_health);
            actor.level = fixture.level;
            actor.inventory = fixture.inventory;
            actor.equipped = fixture.equipped.into_iter().collect();
            actor.effects = fixture.effects.into_iter().collect();
            actor.in_combat = fixture.in_combat;
            world.add_actor(actor)?;
        }
        tracing::info!(
            rooms = world.room_count(),
            actors = world.actor_count(),
            "World fixture built"
        );
        Ok(world)
    }
}
