//! Type-safe identifier wrappers.
//!
//! Authored content names rooms, areas, rules, templates, and actors by
//! human-readable keys (`cellar`, `pull_lever`), so those identifiers wrap a
//! [`String`]. Entities spawned at run time have no authored name and get a
//! UUID v7 (time-ordered) [`EntityId`] instead.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around an authored string key.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from any string-like value.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Borrow the inner key.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_key! {
    /// Identifier of an acting entity (usually a player character).
    ActorId
}

define_key! {
    /// Identifier of a room (the smallest trigger scope).
    RoomId
}

define_key! {
    /// Identifier of an area (a zone grouping many rooms).
    AreaId
}

define_key! {
    /// Identifier of a trigger rule, unique within its scope.
    RuleId
}

define_key! {
    /// Identifier of an NPC or item template.
    TemplateId
}

/// Unique identifier for an entity instance spawned at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_serialize_as_plain_strings() {
        let room = RoomId::new("cellar");
        let json = serde_json::to_string(&room).ok();
        assert_eq!(json.as_deref(), Some("\"cellar\""));
    }

    #[test]
    fn key_display_matches_inner() {
        let rule = RuleId::from("pull_lever");
        assert_eq!(rule.to_string(), "pull_lever");
        assert_eq!(rule.as_str(), "pull_lever");
    }

    #[test]
    fn entity_ids_are_unique() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }
}
