//! Enumeration types shared across the trigger system.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// The simulation event a rule is bound to.
///
/// Serialized in authored content as `on_enter`, `on_exit`, `on_command`,
/// `on_timer`, `on_area_enter`, and `on_area_exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    /// An actor entered the room.
    OnEnter,
    /// An actor left the room.
    OnExit,
    /// An actor issued free text in the room.
    OnCommand,
    /// A recurring scheduler firing with no acting entity.
    OnTimer,
    /// An actor crossed into the area.
    OnAreaEnter,
    /// An actor crossed out of the area.
    OnAreaExit,
}

impl TriggerEvent {
    /// All event kinds in declaration order.
    pub const ALL: [Self; 6] = [
        Self::OnEnter,
        Self::OnExit,
        Self::OnCommand,
        Self::OnTimer,
        Self::OnAreaEnter,
        Self::OnAreaExit,
    ];

    /// The authored name of the event kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnEnter => "on_enter",
            Self::OnExit => "on_exit",
            Self::OnCommand => "on_command",
            Self::OnTimer => "on_timer",
            Self::OnAreaEnter => "on_area_enter",
            Self::OnAreaExit => "on_area_exit",
        }
    }

    /// Whether firings of this event have an acting entity.
    ///
    /// Cooldowns of actor-scoped events are tracked per (rule, actor);
    /// timer events only per rule.
    pub const fn is_actor_scoped(self) -> bool {
        !matches!(self, Self::OnTimer)
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("unknown trigger event `{s}`"))
    }
}

/// A compass or vertical exit direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// North.
    North,
    /// South.
    South,
    /// East.
    East,
    /// West.
    West,
    /// Northeast.
    Northeast,
    /// Northwest.
    Northwest,
    /// Southeast.
    Southeast,
    /// Southwest.
    Southwest,
    /// Up.
    Up,
    /// Down.
    Down,
}

impl Direction {
    /// The canonical lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
            Self::Northeast => "northeast",
            Self::Northwest => "northwest",
            Self::Southeast => "southeast",
            Self::Southwest => "southwest",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// The direction leading back the way one came.
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
            Self::Northeast => Self::Southwest,
            Self::Northwest => Self::Southeast,
            Self::Southeast => Self::Northwest,
            Self::Southwest => Self::Northeast,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let direction = match s.trim().to_lowercase().as_str() {
            "north" | "n" => Self::North,
            "south" | "s" => Self::South,
            "east" | "e" => Self::East,
            "west" | "w" => Self::West,
            "northeast" | "ne" => Self::Northeast,
            "northwest" | "nw" => Self::Northwest,
            "southeast" | "se" => Self::Southeast,
            "southwest" | "sw" => Self::Southwest,
            "up" | "u" => Self::Up,
            "down" | "d" => Self::Down,
            other => return Err(format!("unknown direction `{other}`")),
        };
        Ok(direction)
    }
}

/// What kind of entity a spawn or despawn refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A non-player character.
    Npc,
    /// An item lying in a room.
    Item,
}

/// Whether an entity event created or removed something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    /// The entity was created.
    Spawn,
    /// The entity was removed.
    Despawn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_event_parses_authored_names() {
        assert_eq!("on_area_enter".parse::<TriggerEvent>(), Ok(TriggerEvent::OnAreaEnter));
        assert!("on_sneeze".parse::<TriggerEvent>().is_err());
    }

    #[test]
    fn only_timer_events_lack_an_actor() {
        for event in TriggerEvent::ALL {
            assert_eq!(event.is_actor_scoped(), event != TriggerEvent::OnTimer);
        }
    }

    #[test]
    fn direction_accepts_short_forms() {
        assert_eq!("N".parse::<Direction>(), Ok(Direction::North));
        assert_eq!("sw".parse::<Direction>(), Ok(Direction::Southwest));
        assert_eq!(Direction::Up.opposite(), Direction::Down);
    }
}
