//! World-access interface and in-memory world model for the Tripwire
//! trigger system.
//!
//! The trigger engine never owns the world. Conditions read it and actions
//! mutate it through the narrow [`WorldAccess`] trait, so the engine can be
//! embedded in any simulation that implements those queries and mutations.
//!
//! # Modules
//!
//! - [`access`] -- The [`WorldAccess`] trait consumed by the trigger engine.
//! - [`error`] -- Error types for world queries and mutations.
//! - [`room`] -- [`RoomState`]: exits, flags, description overrides, contents.
//! - [`actor`] -- [`ActorState`]: health, level, inventory, effects.
//! - [`memory`] -- [`MemoryWorld`], an in-memory [`WorldAccess`] implementation.
//! - [`fixture`] -- YAML world fixtures for play-testing and tests.

pub mod access;
pub mod actor;
pub mod error;
pub mod fixture;
pub mod memory;
pub mod room;

// Re-export primary types at crate root.
pub use access::WorldAccess;
pub use actor::ActorState;
pub use error::WorldError;
pub use fixture::WorldFixture;
pub use memory::MemoryWorld;
pub use room::RoomState;
