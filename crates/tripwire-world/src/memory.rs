//! In-memory world model implementing [`WorldAccess`].
//!
//! [`MemoryWorld`] stands in for the simulation's authoritative world when
//! the trigger engine runs standalone (the play-testing binary, tests).
//! Rooms and actors are indexed by identifier in `BTreeMap`s so iteration
//! order is deterministic.

use std::collections::BTreeMap;

use serde_json::Value;
use tripwire_types::{ActorId, AreaId, Direction, EntityId, RoomId, TemplateId};

use crate::access::WorldAccess;
use crate::actor::ActorState;
use crate::error::WorldError;
use crate::room::RoomState;

/// Hours in an in-world day.
const HOURS_PER_DAY: u32 = 24;

/// An in-memory world of rooms, areas, actors, and templates.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    rooms: BTreeMap<RoomId, RoomState>,
    actors: BTreeMap<ActorId, ActorState>,
    areas: BTreeMap<AreaId, String>,
    templates: BTreeMap<TemplateId, String>,
    hour: u32,
}

impl MemoryWorld {
    /// Create an empty world at midnight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a room.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateRoom`] if the id is taken.
    pub fn add_room(&mut self, room: RoomState) -> Result<(), WorldError> {
        if self.rooms.contains_key(&room.id) {
            return Err(WorldError::DuplicateRoom(room.id));
        }
        self.rooms.insert(room.id.clone(), room);
        Ok(())
    }

    /// Add an actor. Its room, if set, must exist.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateActor`] or [`WorldError::RoomNotFound`].
    pub fn add_actor(&mut self, actor: ActorState) -> Result<(), WorldError> {
        if self.actors.contains_key(&actor.id) {
            return Err(WorldError::DuplicateActor(actor.id));
        }
        if let Some(room) = &actor.room
            && !self.rooms.contains_key(room)
        {
            return Err(WorldError::RoomNotFound(room.clone()));
        }
        self.actors.insert(actor.id.clone(), actor);
        Ok(())
    }

    /// Register an area and its display name.
    pub fn add_area(&mut self, id: AreaId, name: impl Into<String>) {
        self.areas.insert(id, name.into());
    }

    /// Register an NPC or item template display name.
    pub fn add_template(&mut self, id: TemplateId, name: impl Into<String>) {
        self.templates.insert(id, name.into());
    }

    /// Set the in-world hour (wrapped into `0..24`).
    pub fn set_hour(&mut self, hour: u32) {
        self.hour = hour.checked_rem(HOURS_PER_DAY).unwrap_or(0);
    }

    /// Immutable room lookup.
    pub fn room(&self, id: &RoomId) -> Option<&RoomState> {
        self.rooms.get(id)
    }

    /// Mutable room lookup.
    pub fn room_mut(&mut self, id: &RoomId) -> Option<&mut RoomState> {
        self.rooms.get_mut(id)
    }

    /// Immutable actor lookup.
    pub fn actor(&self, id: &ActorId) -> Option<&ActorState> {
        self.actors.get(id)
    }

    /// Mutable actor lookup.
    pub fn actor_mut(&mut self, id: &ActorId) -> Option<&mut ActorState> {
        self.actors.get_mut(id)
    }

    /// Iterate over all rooms.
    pub fn rooms(&self) -> impl Iterator<Item = &RoomState> {
        self.rooms.values()
    }

    /// Number of rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of actors.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Check every exit points at an existing room.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DanglingExit`] for the first bad exit found.
    pub fn validate_exits(&self) -> Result<(), WorldError> {
        for room in self.rooms.values() {
            for (direction, target) in &room.exits {
                if !self.rooms.contains_key(target) {
                    return Err(WorldError::DanglingExit {
                        room: room.id.clone(),
                        direction: *direction,
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn room_entry(&mut self, id: &RoomId) -> Result<&mut RoomState, WorldError> {
        self.rooms
            .get_mut(id)
            .ok_or_else(|| WorldError::RoomNotFound(id.clone()))
    }

    fn actor_entry(&mut self, id: &ActorId) -> Result<&mut ActorState, WorldError> {
        self.actors
            .get_mut(id)
            .ok_or_else(|| WorldError::ActorNotFound(id.clone()))
    }
}

impl WorldAccess for MemoryWorld {
    fn actor_name(&self, actor: &ActorId) -> Option<&str> {
        self.actors.get(actor).map(|a| a.name.as_str())
    }

    fn actor_room(&self, actor: &ActorId) -> Option<&RoomId> {
        self.actors.get(actor).and_then(|a| a.room.as_ref())
    }

    fn actor_item_count(&self, actor: &ActorId, item: &TemplateId) -> u32 {
        self.actors.get(actor).map_or(0, |a| a.item_count(item))
    }

    fn actor_has_equipped(&self, actor: &ActorId, item: &TemplateId) -> bool {
        self.actors
            .get(actor)
            .is_some_and(|a| a.equipped.contains(item))
    }

    fn actor_health(&self, actor: &ActorId) -> Option<(u32, u32)> {
        self.actors.get(actor).map(|a| (a.health, a.max_health))
    }

    fn actor_level(&self, actor: &ActorId) -> Option<u32> {
        self.actors.get(actor).map(|a| a.level)
    }

    fn actor_has_effect(&self, actor: &ActorId, effect: &str) -> bool {
        self.actors
            .get(actor)
            .is_some_and(|a| a.effects.contains(effect))
    }

    fn actor_in_combat(&self, actor: &ActorId) -> bool {
        self.actors.get(actor).is_some_and(|a| a.in_combat)
    }

    fn room_exists(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    fn room_name(&self, room: &RoomId) -> Option<&str> {
        self.rooms.get(room).map(|r| r.name.as_str())
    }

    fn room_area(&self, room: &RoomId) -> Option<&AreaId> {
        self.rooms.get(room).and_then(|r| r.area.as_ref())
    }

    fn area_name(&self, area: &AreaId) -> Option<&str> {
        self.areas.get(area).map(String::as_str)
    }

    fn room_flag(&self, room: &RoomId, flag: &str) -> Option<&Value> {
        self.rooms.get(room).and_then(|r| r.flags.get(flag))
    }

    fn exit_target(&self, room: &RoomId, direction: Direction) -> Option<&RoomId> {
        self.rooms.get(room).and_then(|r| r.exits.get(&direction))
    }

    fn npc_count(&self, room: &RoomId, template: &TemplateId) -> u32 {
        self.rooms.get(room).map_or(0, |r| r.npc_count(template))
    }

    fn room_item_count(&self, room: &RoomId, item: &TemplateId) -> u32 {
        self.rooms.get(room).map_or(0, |r| r.item_count(item))
    }

    fn actors_in_room(&self, room: &RoomId) -> Vec<ActorId> {
        self.actors
            .values()
            .filter(|a| a.room.as_ref() == Some(room))
            .map(|a| a.id.clone())
            .collect()
    }

    fn template_name(&self, template: &TemplateId) -> Option<&str> {
        self.templates.get(template).map(String::as_str)
    }

    fn hour_of_day(&self) -> u32 {
        self.hour
    }

    fn set_room_flag(&mut self, room: &RoomId, flag: &str, value: Value) -> Result<(), WorldError> {
        self.room_entry(room)?.flags.insert(flag.to_owned(), value);
        Ok(())
    }

    fn open_exit(
        &mut self,
        room: &RoomId,
        direction: Direction,
        target: &RoomId,
    ) -> Result<bool, WorldError> {
        if !self.rooms.contains_key(target) {
            return Err(WorldError::RoomNotFound(target.clone()));
        }
        Ok(self.room_entry(room)?.open_exit(direction, target.clone()))
    }

    fn close_exit(&mut self, room: &RoomId, direction: Direction) -> Result<bool, WorldError> {
        Ok(self.room_entry(room)?.close_exit(direction))
    }

    fn set_description(&mut self, room: &RoomId, text: String) -> Result<(), WorldError> {
        self.room_entry(room)?.description_override = Some(text);
        Ok(())
    }

    fn reset_description(&mut self, room: &RoomId) -> Result<(), WorldError> {
        self.room_entry(room)?.description_override = None;
        Ok(())
    }

    fn add_room_items(
        &mut self,
        room: &RoomId,
        item: &TemplateId,
        quantity: u32,
    ) -> Result<(), WorldError> {
        self.room_entry(room)?.add_items(item, quantity)
    }

    fn remove_room_items(
        &mut self,
        room: &RoomId,
        item: &TemplateId,
        quantity: u32,
    ) -> Result<u32, WorldError> {
        Ok(self.room_entry(room)?.remove_items(item, quantity))
    }

    fn spawn_npc(&mut self, room: &RoomId, template: &TemplateId) -> Result<EntityId, WorldError> {
        let id = self.room_entry(room)?.add_npc(template.clone());
        tracing::debug!(room = %room, template = %template, entity = %id, "NPC spawned");
        Ok(id)
    }

    fn despawn_npc(&mut self, room: &RoomId, template: &TemplateId) -> Result<EntityId, WorldError> {
        self.room_entry(room)?.take_npc(template)
    }

    fn move_npc(
        &mut self,
        template: &TemplateId,
        from: &RoomId,
        to: &RoomId,
    ) -> Result<EntityId, WorldError> {
        if !self.rooms.contains_key(to) {
            return Err(WorldError::RoomNotFound(to.clone()));
        }
        let id = self.room_entry(from)?.take_npc(template)?;
        self.room_entry(to)?.npcs.insert(id, template.clone());
        Ok(id)
    }

    fn move_actor(&mut self, actor: &ActorId, room: &RoomId) -> Result<Option<RoomId>, WorldError> {
        if !self.rooms.contains_key(room) {
            return Err(WorldError::RoomNotFound(room.clone()));
        }
        let state = self.actor_entry(actor)?;
        Ok(state.room.replace(room.clone()))
    }

    fn adjust_health(&mut self, actor: &ActorId, delta: i64) -> Result<i64, WorldError> {
        Ok(self.actor_entry(actor)?.adjust_health(delta))
    }

    fn add_effect(&mut self, actor: &ActorId, effect: &str) -> Result<bool, WorldError> {
        Ok(self.actor_entry(actor)?.effects.insert(effect.to_owned()))
    }

    fn remove_effect(&mut self, actor: &ActorId, effect: &str) -> Result<bool, WorldError> {
        Ok(self.actor_entry(actor)?.effects.remove(effect))
    }

    fn give_item(
        &mut self,
        actor: &ActorId,
        item: &TemplateId,
        quantity: u32,
    ) -> Result<(), WorldError> {
        self.actor_entry(actor)?.give(item, quantity)
    }

    fn take_item(
        &mut self,
        actor: &ActorId,
        item: &TemplateId,
        quantity: u32,
    ) -> Result<(), WorldError> {
        self.actor_entry(actor)?.take(item, quantity)
    }

    fn add_experience(&mut self, actor: &ActorId, amount: u64) -> Result<(), WorldError> {
        let state = self.actor_entry(actor)?;
        state.experience = state
            .experience
            .checked_add(amount)
            .ok_or(WorldError::ArithmeticOverflow)?;
        Ok(())
    }
}
