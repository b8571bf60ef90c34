//! Actor state: vitals, progression, inventory, and effects.

use std::collections::{BTreeMap, BTreeSet};

use tripwire_types::{ActorId, RoomId, TemplateId};

use crate::error::WorldError;

/// Mutable runtime state for an acting entity.
#[derive(Debug, Clone)]
pub struct ActorState {
    /// Actor identifier.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    /// Room the actor stands in.
    pub room: Option<RoomId>,
    /// Current health.
    pub health: u32,
    /// Maximum health (at least 1).
    pub max_health: u32,
    /// Character level.
    pub level: u32,
    /// Accumulated experience.
    pub experience: u64,
    /// Carried items.
    pub inventory: BTreeMap<TemplateId, u32>,
    /// Equipped items.
    pub equipped: BTreeSet<TemplateId>,
    /// Active named effects.
    pub effects: BTreeSet<String>,
    /// Whether the actor is fighting.
    pub in_combat: bool,
}

impl ActorState {
    /// Create a level-1 actor at full health.
    pub fn new(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            room: None,
            health: 100,
            max_health: 100,
            level: 1,
            experience: 0,
            inventory: BTreeMap::new(),
            equipped: BTreeSet::new(),
            effects: BTreeSet::new(),
            in_combat: false,
        }
    }

    /// Number of an item carried.
    pub fn item_count(&self, item: &TemplateId) -> u32 {
        self.inventory.get(item).copied().unwrap_or(0)
    }

    /// Apply a health change clamped to `0..=max_health`.
    ///
    /// Returns the change actually applied.
    pub fn adjust_health(&mut self, delta: i64) -> i64 {
        let current = i64::from(self.health);
        let max = i64::from(self.max_health);
        let target = current.saturating_add(delta).clamp(0, max);
        self.health = u32::try_from(target).unwrap_or(self.max_health);
        target.saturating_sub(current)
    }

    /// Add items to the inventory.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ArithmeticOverflow`] if the stack would overflow.
    pub fn give(&mut self, item: &TemplateId, quantity: u32) -> Result<(), WorldError> {
        let stack = self.inventory.entry(item.clone()).or_insert(0);
        *stack = stack
            .checked_add(quantity)
            .ok_or(WorldError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Remove items from the inventory; nothing changes if the actor is short.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotEnoughItems`] if fewer than `quantity` are held.
    pub fn take(&mut self, item: &TemplateId, quantity: u32) -> Result<(), WorldError> {
        let held = self.item_count(item);
        let remaining = held
            .checked_sub(quantity)
            .ok_or_else(|| WorldError::NotEnoughItems {
                actor: self.id.clone(),
                item: item.clone(),
                held,
                wanted: quantity,
            })?;
        if remaining == 0 {
            self.inventory.remove(item);
            self.equipped.remove(item);
        } else {
            self.inventory.insert(item.clone(), remaining);
        }
        Ok(())
    }
}
