//! Events crossing the trigger system boundary.
//!
//! [`InboundEvent`]s are produced by external collaborators (movement,
//! command routing). [`OutboundEvent`]s are produced by rule actions and
//! consumed by the broadcast layer, which turns them into client-visible
//! messages and forwards mutation requests to their owning subsystems.

use serde::{Deserialize, Serialize};

use crate::enums::{Direction, EntityAction, EntityKind};
use crate::ids::{ActorId, AreaId, RoomId, RuleId, TemplateId};
use crate::scope::ScopeKey;

/// A simulation event the dispatcher reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    /// An actor entered a room.
    RoomEntered {
        /// The moving actor.
        actor: ActorId,
        /// The room entered.
        room: RoomId,
        /// Direction of travel, when known.
        direction: Option<Direction>,
    },
    /// An actor left a room.
    RoomExited {
        /// The moving actor.
        actor: ActorId,
        /// The room left.
        room: RoomId,
        /// Direction of travel, when known.
        direction: Option<Direction>,
    },
    /// An actor crossed into an area.
    AreaEntered {
        /// The moving actor.
        actor: ActorId,
        /// Area being left.
        from: AreaId,
        /// Area being entered.
        to: AreaId,
    },
    /// An actor crossed out of an area.
    AreaExited {
        /// The moving actor.
        actor: ActorId,
        /// Area being left.
        from: AreaId,
        /// Area being entered.
        to: AreaId,
    },
    /// An actor typed a command the router has not yet handled.
    CommandAttempted {
        /// The actor issuing the command.
        actor: ActorId,
        /// Room the actor is standing in.
        room: RoomId,
        /// Raw command text.
        text: String,
    },
}

/// Who receives a message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageTarget {
    /// A single actor.
    Actor {
        /// The recipient.
        actor: ActorId,
    },
    /// Everyone in a room, optionally excluding one actor.
    Room {
        /// The room.
        room: RoomId,
        /// Actor excluded from delivery.
        exclude: Option<ActorId>,
    },
    /// Everyone in an area.
    Area {
        /// The area.
        area: AreaId,
    },
}

/// A domain event produced by rule actions.
///
/// Tagged by `event` so entity events keep their own `kind` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Text to deliver to a target.
    Message {
        /// Recipients.
        target: MessageTarget,
        /// Rendered text.
        text: String,
    },
    /// A stat change applied to an actor (health, experience, effect stats).
    StatDelta {
        /// The affected actor.
        actor: ActorId,
        /// Stat name.
        stat: String,
        /// Signed change.
        delta: i64,
    },
    /// An NPC or item was spawned or despawned.
    Entity {
        /// Spawn or despawn.
        action: EntityAction,
        /// NPC or item.
        kind: EntityKind,
        /// Template of the entity.
        template: TemplateId,
        /// Room the entity appeared in or vanished from.
        location: RoomId,
    },
    /// An actor was moved by a rule.
    ActorMoved {
        /// The moved actor.
        actor: ActorId,
        /// Previous room, when known.
        from: Option<RoomId>,
        /// New room.
        to: RoomId,
    },
    /// A rule's enabled state changed.
    ControlChanged {
        /// Scope of the rule.
        scope: ScopeKey,
        /// The rule.
        rule_id: RuleId,
        /// New effective enabled state.
        enabled: bool,
    },
    /// An action's preconditions were not met; the chain continued.
    ActionFailed {
        /// Rule that ran the action.
        rule_id: RuleId,
        /// Action type key.
        action: String,
        /// Why it failed.
        reason: String,
    },
}

impl OutboundEvent {
    /// Message to a single actor.
    pub fn to_actor(actor: ActorId, text: impl Into<String>) -> Self {
        Self::Message {
            target: MessageTarget::Actor { actor },
            text: text.into(),
        }
    }

    /// The message text, if this is a message event.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message { text, .. } => Some(text),
            _ => None,
        }
    }
}
