//! Room node with exits, flags, and contents.
//!
//! A [`RoomState`] holds both the authored room (name, base description,
//! base exits) and the mutable runtime overlay that trigger actions touch:
//! flags, description override, opened and closed exits, NPCs and items.

use std::collections::BTreeMap;

use serde_json::Value;
use tripwire_types::{AreaId, Direction, EntityId, RoomId, TemplateId};

use crate::error::WorldError;

/// Mutable runtime state for a room.
#[derive(Debug, Clone)]
pub struct RoomState {
    /// Room identifier.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Owning area, if the room belongs to one.
    pub area: Option<AreaId>,
    /// Authored description.
    pub description: String,
    /// Description set by a rule, shown instead of the authored one.
    pub description_override: Option<String>,
    /// Currently open exits.
    pub exits: BTreeMap<Direction, RoomId>,
    /// Named flags.
    pub flags: BTreeMap<String, Value>,
    /// NPC instances present, by instance id.
    pub npcs: BTreeMap<EntityId, TemplateId>,
    /// Item stacks lying here.
    pub items: BTreeMap<TemplateId, u32>,
}

impl RoomState {
    /// Create an empty room.
    pub fn new(id: RoomId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            area: None,
            description: String::new(),
            description_override: None,
            exits: BTreeMap::new(),
            flags: BTreeMap::new(),
            npcs: BTreeMap::new(),
            items: BTreeMap::new(),
        }
    }

    /// The description players currently see.
    pub fn effective_description(&self) -> &str {
        self.description_override
            .as_deref()
            .unwrap_or(&self.description)
    }

    /// Open an exit; re-opening an identical exit is a no-op.
    pub fn open_exit(&mut self, direction: Direction, target: RoomId) -> bool {
        if self.exits.get(&direction) == Some(&target) {
            return false;
        }
        self.exits.insert(direction, target);
        true
    }

    /// Close an exit; returns `true` if it was open.
    pub fn close_exit(&mut self, direction: Direction) -> bool {
        self.exits.remove(&direction).is_some()
    }

    /// Number of NPCs of a template present.
    pub fn npc_count(&self, template: &TemplateId) -> u32 {
        let count = self.npcs.values().filter(|t| *t == template).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Add an NPC instance.
    pub fn add_npc(&mut self, template: TemplateId) -> EntityId {
        let id = EntityId::new();
        self.npcs.insert(id, template);
        id
    }

    /// Remove one NPC of a template, returning its instance id.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NpcNotPresent`] if none is here.
    pub fn take_npc(&mut self, template: &TemplateId) -> Result<EntityId, WorldError> {
        let id = self
            .npcs
            .iter()
            .find(|(_, t)| *t == template)
            .map(|(id, _)| *id)
            .ok_or_else(|| WorldError::NpcNotPresent {
                template: template.clone(),
                room: self.id.clone(),
            })?;
        self.npcs.remove(&id);
        Ok(id)
    }

    /// Number of items of a template lying here.
    pub fn item_count(&self, item: &TemplateId) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    /// Add items to the room.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ArithmeticOverflow`] if the stack would overflow.
    pub fn add_items(&mut self, item: &TemplateId, quantity: u32) -> Result<(), WorldError> {
        let stack = self.items.entry(item.clone()).or_insert(0);
        *stack = stack
            .checked_add(quantity)
            .ok_or(WorldError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Remove up to `quantity` items, returning how many were removed.
    pub fn remove_items(&mut self, item: &TemplateId, quantity: u32) -> u32 {
        let Some(stack) = self.items.get_mut(item) else {
            return 0;
        };
        let removed = quantity.min(*stack);
        *stack = stack.saturating_sub(removed);
        if *stack == 0 {
            self.items.remove(item);
        }
        removed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn room() -> RoomState {
        let mut room = RoomState::new(RoomId::from("cellar"), "Cellar");
        room.description = "Damp stone walls.".to_owned();
        room
    }

    #[test]
    fn reopening_same_exit_is_idempotent() {
        let mut room = room();
        assert!(room.open_exit(Direction::North, RoomId::from("vault")));
        assert!(!room.open_exit(Direction::North, RoomId::from("vault")));
        assert!(room.close_exit(Direction::North));
        assert!(!room.close_exit(Direction::North));
    }

    #[test]
    fn description_override_takes_precedence() {
        let mut room = room();
        assert_eq!(room.effective_description(), "Damp stone walls.");
        room.description_override = Some("Flooded.".to_owned());
        assert_eq!(room.effective_description(), "Flooded.");
    }

    #[test]
    fn item_stacks_drain_and_disappear() {
        let mut room = room();
        let torch = TemplateId::from("torch");
        room.add_items(&torch, 2).unwrap();
        assert_eq!(room.remove_items(&torch, 5), 2);
        assert_eq!(room.item_count(&torch), 0);
        assert!(room.items.is_empty());
    }

    #[test]
    fn npcs_are_taken_by_template() {
        let mut room = room();
        let rat = TemplateId::from("rat");
        room.add_npc(rat.clone());
        assert_eq!(room.npc_count(&rat), 1);
        assert!(room.take_npc(&rat).is_ok());
        assert!(matches!(room.take_npc(&rat), Err(WorldError::NpcNotPresent { .. })));
    }
}
