//! The ephemeral context of a single firing attempt.

use serde::{Deserialize, Serialize};

use crate::enums::Direction;
use crate::ids::{ActorId, AreaId, RoomId};

/// The (from, to) pair of an area transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaTransition {
    /// Area being left.
    pub from: AreaId,
    /// Area being entered.
    pub to: AreaId,
}

/// Everything known about the event that caused a firing attempt.
///
/// Built by the dispatcher per call and discarded afterwards; never
/// persisted. Pure timer firings carry no actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    /// The acting entity, absent for timer firings.
    pub actor: Option<ActorId>,
    /// The room the event happened in.
    pub room: Option<RoomId>,
    /// The area the event happened in, when known.
    pub area: Option<AreaId>,
    /// Direction of movement for enter/exit events.
    pub direction: Option<Direction>,
    /// Raw command text for command events.
    pub command: Option<String>,
    /// Area pair for area transitions.
    pub transition: Option<AreaTransition>,
}

impl TriggerContext {
    /// Context for an actor standing in a room.
    pub fn actor_in(actor: impl Into<ActorId>, room: impl Into<RoomId>) -> Self {
        Self {
            actor: Some(actor.into()),
            room: Some(room.into()),
            ..Self::default()
        }
    }

    /// Context with no acting entity, used for timer firings.
    pub fn ambient() -> Self {
        Self::default()
    }

    /// Attach a movement direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Attach raw command text.
    #[must_use]
    pub fn with_command(mut self, text: impl Into<String>) -> Self {
        self.command = Some(text.into());
        self
    }

    /// Attach the area the event happened in.
    #[must_use]
    pub fn with_area(mut self, area: impl Into<AreaId>) -> Self {
        self.area = Some(area.into());
        self
    }

    /// Attach a room.
    #[must_use]
    pub fn with_room(mut self, room: impl Into<RoomId>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Attach an area transition.
    #[must_use]
    pub fn with_transition(mut self, from: impl Into<AreaId>, to: impl Into<AreaId>) -> Self {
        self.transition = Some(AreaTransition {
            from: from.into(),
            to: to.into(),
        });
        self
    }
}
