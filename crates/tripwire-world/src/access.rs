//! The narrow world interface consumed by trigger conditions and actions.
//!
//! Read methods back the built-in condition families (actor state, location
//! state, time of day); mutation methods back the built-in action families.
//! Implementations must be deterministic for a given state: the trigger
//! engine calls these only from inside a serialized processing step.

use serde_json::Value;
use tripwire_types::{ActorId, AreaId, Direction, EntityId, RoomId, TemplateId};

use crate::error::WorldError;

/// Queries and mutations the trigger engine needs from the world model.
pub trait WorldAccess {
    // -------------------------------------------------------------------
    // Actor queries
    // -------------------------------------------------------------------

    /// Display name of an actor.
    fn actor_name(&self, actor: &ActorId) -> Option<&str>;

    /// Room the actor currently stands in.
    fn actor_room(&self, actor: &ActorId) -> Option<&RoomId>;

    /// How many of an item the actor carries.
    fn actor_item_count(&self, actor: &ActorId, item: &TemplateId) -> u32;

    /// Whether the actor has the item equipped.
    fn actor_has_equipped(&self, actor: &ActorId, item: &TemplateId) -> bool;

    /// Current and maximum health.
    fn actor_health(&self, actor: &ActorId) -> Option<(u32, u32)>;

    /// Character level.
    fn actor_level(&self, actor: &ActorId) -> Option<u32>;

    /// Whether a named effect is active on the actor.
    fn actor_has_effect(&self, actor: &ActorId, effect: &str) -> bool;

    /// Whether the actor is in combat.
    fn actor_in_combat(&self, actor: &ActorId) -> bool;

    // -------------------------------------------------------------------
    // Location queries
    // -------------------------------------------------------------------

    /// Whether the room exists.
    fn room_exists(&self, room: &RoomId) -> bool;

    /// Display name of a room.
    fn room_name(&self, room: &RoomId) -> Option<&str>;

    /// Area the room belongs to.
    fn room_area(&self, room: &RoomId) -> Option<&AreaId>;

    /// Display name of an area.
    fn area_name(&self, area: &AreaId) -> Option<&str>;

    /// Value of a named room flag; `None` means unset.
    fn room_flag(&self, room: &RoomId, flag: &str) -> Option<&Value>;

    /// Target of the open exit in a direction.
    fn exit_target(&self, room: &RoomId, direction: Direction) -> Option<&RoomId>;

    /// Number of NPCs of a template in the room.
    fn npc_count(&self, room: &RoomId, template: &TemplateId) -> u32;

    /// Number of items of a template lying in the room.
    fn room_item_count(&self, room: &RoomId, item: &TemplateId) -> u32;

    /// Actors currently in the room.
    fn actors_in_room(&self, room: &RoomId) -> Vec<ActorId>;

    /// Display name of an NPC or item template.
    fn template_name(&self, template: &TemplateId) -> Option<&str>;

    /// In-world hour of day, `0..24`.
    fn hour_of_day(&self) -> u32;

    // -------------------------------------------------------------------
    // Location mutations
    // -------------------------------------------------------------------

    /// Set a room flag to a value.
    fn set_room_flag(&mut self, room: &RoomId, flag: &str, value: Value) -> Result<(), WorldError>;

    /// Open (or redirect) an exit. Returns `true` if anything changed.
    fn open_exit(
        &mut self,
        room: &RoomId,
        direction: Direction,
        target: &RoomId,
    ) -> Result<bool, WorldError>;

    /// Close an exit. Returns `true` if it was open.
    fn close_exit(&mut self, room: &RoomId, direction: Direction) -> Result<bool, WorldError>;

    /// Override the room description.
    fn set_description(&mut self, room: &RoomId, text: String) -> Result<(), WorldError>;

    /// Drop any description override.
    fn reset_description(&mut self, room: &RoomId) -> Result<(), WorldError>;

    /// Add items to a room.
    fn add_room_items(&mut self, room: &RoomId, item: &TemplateId, quantity: u32)
    -> Result<(), WorldError>;

    /// Remove up to `quantity` items from a room; returns how many were removed.
    fn remove_room_items(
        &mut self,
        room: &RoomId,
        item: &TemplateId,
        quantity: u32,
    ) -> Result<u32, WorldError>;

    // -------------------------------------------------------------------
    // Entity mutations
    // -------------------------------------------------------------------

    /// Spawn an NPC instance in a room.
    fn spawn_npc(&mut self, room: &RoomId, template: &TemplateId) -> Result<EntityId, WorldError>;

    /// Remove one NPC of a template from a room.
    fn despawn_npc(&mut self, room: &RoomId, template: &TemplateId) -> Result<EntityId, WorldError>;

    /// Move one NPC of a template between rooms.
    fn move_npc(
        &mut self,
        template: &TemplateId,
        from: &RoomId,
        to: &RoomId,
    ) -> Result<EntityId, WorldError>;

    // -------------------------------------------------------------------
    // Actor mutations
    // -------------------------------------------------------------------

    /// Move an actor to a room; returns the previous room.
    fn move_actor(&mut self, actor: &ActorId, room: &RoomId) -> Result<Option<RoomId>, WorldError>;

    /// Change health by `delta`, clamped to `0..=max`; returns the applied change.
    fn adjust_health(&mut self, actor: &ActorId, delta: i64) -> Result<i64, WorldError>;

    /// Add a named effect; returns `true` if it was not already active.
    fn add_effect(&mut self, actor: &ActorId, effect: &str) -> Result<bool, WorldError>;

    /// Remove a named effect; returns `true` if it was active.
    fn remove_effect(&mut self, actor: &ActorId, effect: &str) -> Result<bool, WorldError>;

    /// Put items into the actor's inventory.
    fn give_item(&mut self, actor: &ActorId, item: &TemplateId, quantity: u32)
    -> Result<(), WorldError>;

    /// Take items from the actor's inventory; fails without change if short.
    fn take_item(&mut self, actor: &ActorId, item: &TemplateId, quantity: u32)
    -> Result<(), WorldError>;

    /// Grant experience points.
    fn add_experience(&mut self, actor: &ActorId, amount: u64) -> Result<(), WorldError>;
}
