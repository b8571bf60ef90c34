//! Trigger scopes: the room or area a rule set is attached to.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::{AreaId, RoomId};

/// The owner of a set of trigger definitions.
///
/// Authored as `{ room: cellar }` or `{ area: old_mine }` in every serde
/// format. The textual form used for persistence keys and logs is
/// `room:cellar` / `area:old_mine`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "ScopeRepr", into = "ScopeRepr")]
pub enum ScopeKey {
    /// Rules attached to a single room.
    Room(RoomId),
    /// Rules attached to a whole area.
    Area(AreaId),
}

impl ScopeKey {
    /// Scope for a room.
    pub fn room(id: impl Into<RoomId>) -> Self {
        Self::Room(id.into())
    }

    /// Scope for an area.
    pub fn area(id: impl Into<AreaId>) -> Self {
        Self::Area(id.into())
    }

    /// The room identifier, if this is a room scope.
    pub const fn as_room(&self) -> Option<&RoomId> {
        match self {
            Self::Room(id) => Some(id),
            Self::Area(_) => None,
        }
    }

    /// The area identifier, if this is an area scope.
    pub const fn as_area(&self) -> Option<&AreaId> {
        match self {
            Self::Area(id) => Some(id),
            Self::Room(_) => None,
        }
    }
}

/// Serde shape of [`ScopeKey`]: a map with exactly one of `room` or `area`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScopeRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    room: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    area: Option<AreaId>,
}

impl TryFrom<ScopeRepr> for ScopeKey {
    type Error = ScopeParseError;

    fn try_from(repr: ScopeRepr) -> Result<Self, Self::Error> {
        match (repr.room, repr.area) {
            (Some(room), None) => Ok(Self::Room(room)),
            (None, Some(area)) => Ok(Self::Area(area)),
            _ => Err(ScopeParseError::Ambiguous),
        }
    }
}

impl From<ScopeKey> for ScopeRepr {
    fn from(scope: ScopeKey) -> Self {
        match scope {
            ScopeKey::Room(room) => Self {
                room: Some(room),
                area: None,
            },
            ScopeKey::Area(area) => Self {
                room: None,
                area: Some(area),
            },
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room(id) => write!(f, "room:{id}"),
            Self::Area(id) => write!(f, "area:{id}"),
        }
    }
}

/// Failure to read a scope key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeParseError {
    /// The textual form is not `room:<id>` or `area:<id>`.
    #[error("invalid scope key `{0}` (expected room:<id> or area:<id>)")]
    Text(String),

    /// The authored map names neither or both of `room` and `area`.
    #[error("scope must name exactly one of `room` or `area`")]
    Ambiguous,
}

impl FromStr for ScopeKey {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| ScopeParseError::Text(s.to_owned()))?;
        if id.is_empty() {
            return Err(ScopeParseError::Text(s.to_owned()));
        }
        match kind {
            "room" => Ok(Self::room(id)),
            "area" => Ok(Self::area(id)),
            _ => Err(ScopeParseError::Text(s.to_owned())),
        }
    }
}
