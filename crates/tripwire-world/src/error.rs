//! Error types for the `tripwire-world` crate.
//!
//! Mutations that cannot be applied return [`WorldError`]. The trigger
//! engine turns these into `ActionFailed` events rather than aborting a
//! rule's action chain.

use tripwire_types::{ActorId, AreaId, Direction, RoomId, TemplateId};

/// Errors that can occur during world queries and mutations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A room was not found.
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// An actor was not found.
    #[error("actor not found: {0}")]
    ActorNotFound(ActorId),

    /// An area was not found.
    #[error("area not found: {0}")]
    AreaNotFound(AreaId),

    /// No NPC of the template is present in the room.
    #[error("no {template} in room {room}")]
    NpcNotPresent {
        /// The NPC template.
        template: TemplateId,
        /// The searched room.
        room: RoomId,
    },

    /// The actor does not carry enough of an item.
    #[error("actor {actor} carries {held} of {item}, needs {wanted}")]
    NotEnoughItems {
        /// The actor.
        actor: ActorId,
        /// The item template.
        item: TemplateId,
        /// How many the actor holds.
        held: u32,
        /// How many were requested.
        wanted: u32,
    },

    /// An exit points at a room that does not exist.
    #[error("exit {direction} of {room} leads to unknown room {target}")]
    DanglingExit {
        /// Room owning the exit.
        room: RoomId,
        /// Exit direction.
        direction: Direction,
        /// Missing target room.
        target: RoomId,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,

    /// A duplicate room was inserted where uniqueness is required.
    #[error("duplicate room id: {0}")]
    DuplicateRoom(RoomId),

    /// A duplicate actor was inserted where uniqueness is required.
    #[error("duplicate actor id: {0}")]
    DuplicateActor(ActorId),

    /// Failed to read a world fixture from disk.
    #[error("failed to read world fixture: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse a world fixture.
    #[error("failed to parse world fixture: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },
}
