//! Shared type definitions for the Tripwire trigger system.
//!
//! This crate is the single source of truth for the vocabulary exchanged
//! between the world model, the trigger engine, persistence, and the
//! outward broadcast layer. It carries no behaviour beyond parsing helpers.
//!
//! # Modules
//!
//! - [`ids`] -- Typed identifiers for actors, rooms, areas, rules, and templates
//! - [`enums`] -- Event kinds, directions, and entity kinds
//! - [`scope`] -- [`ScopeKey`], the room or area a rule set is attached to
//! - [`definition`] -- Authored rule records and their parameter maps
//! - [`context`] -- The per-firing [`TriggerContext`]
//! - [`events`] -- Inbound simulation events and outbound domain events
//! - [`persisted`] -- Runtime state records for permanent rules

pub mod context;
pub mod definition;
pub mod enums;
pub mod events;
pub mod ids;
pub mod persisted;
pub mod scope;

// Re-export all public types at crate root for convenience.
pub use context::{AreaTransition, TriggerContext};
pub use definition::{
    ParamError, Params, TriggerAction, TriggerCondition, TriggerDefinition, seconds_to_delta,
};
pub use enums::{Direction, EntityAction, EntityKind, TriggerEvent};
pub use events::{InboundEvent, MessageTarget, OutboundEvent};
pub use ids::{ActorId, AreaId, EntityId, RoomId, RuleId, TemplateId};
pub use persisted::PersistedRuleState;
pub use scope::{ScopeKey, ScopeParseError};
