//! Line-oriented play-test console.
//!
//! Each stdin line is one command. Simulation events go to the engine as
//! [`InboundEvent`]s; control commands map onto [`EngineHandle`] calls.
//!
//! ```text
//! enter alice cellar [down]        exit alice cellar [north]
//! area-enter alice surface old_mine
//! area-exit alice old_mine surface
//! do alice cellar pull lever       (`cmd` works too; text is the rest of the line)
//! enable room:cellar gate          disable room:cellar gate
//! fire room:cellar gate [alice]
//! load triggers/cellar.yaml        unload room:cellar
//! save                             quit
//! ```
//!
//! [`EngineHandle`]: tripwire_core::EngineHandle

use std::path::PathBuf;

use tripwire_types::{ActorId, AreaId, Direction, InboundEvent, RoomId, RuleId, ScopeKey};

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Forward a simulation event.
    Event(InboundEvent),
    /// Enable or disable a rule.
    SetEnabled {
        /// Scope of the rule.
        scope: ScopeKey,
        /// The rule.
        rule_id: RuleId,
        /// New state.
        enabled: bool,
    },
    /// Fire a rule directly, optionally on behalf of an actor.
    Fire {
        /// Scope of the rule.
        scope: ScopeKey,
        /// The rule.
        rule_id: RuleId,
        /// Acting entity.
        actor: Option<ActorId>,
    },
    /// Load or reload a scope file.
    Load(PathBuf),
    /// Remove a scope.
    Unload(ScopeKey),
    /// Persist permanent rule state now.
    Save,
    /// Stop the engine.
    Quit,
}

/// A line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    /// The first word is not a command.
    #[error("unknown command `{0}` (try: enter, exit, area-enter, area-exit, do, enable, disable, fire, load, unload, save, quit)")]
    UnknownCommand(String),

    /// Wrong number or shape of arguments.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// An argument did not parse.
    #[error("{0}")]
    BadArgument(String),
}

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match verb.to_lowercase().as_str() {
        "enter" | "exit" => {
            const USAGE: &str = "enter|exit <actor> <room> [direction]";
            let (actor, room, direction) = match args.as_slice() {
                [actor, room] => (*actor, *room, None),
                [actor, room, dir] => (*actor, *room, Some(parse_direction(dir)?)),
                _ => return Err(ConsoleError::Usage(USAGE)),
            };
            let (actor, room) = (ActorId::from(actor), RoomId::from(room));
            if verb.eq_ignore_ascii_case("enter") {
                ConsoleCommand::Event(InboundEvent::RoomEntered {
                    actor,
                    room,
                    direction,
                })
            } else {
                ConsoleCommand::Event(InboundEvent::RoomExited {
                    actor,
                    room,
                    direction,
                })
            }
        }
        "area-enter" | "area-exit" => {
            let [actor, from, to] = args.as_slice() else {
                return Err(ConsoleError::Usage("area-enter|area-exit <actor> <from> <to>"));
            };
            let (actor, from, to) = (ActorId::from(*actor), AreaId::from(*from), AreaId::from(*to));
            if verb.eq_ignore_ascii_case("area-enter") {
                ConsoleCommand::Event(InboundEvent::AreaEntered { actor, from, to })
            } else {
                ConsoleCommand::Event(InboundEvent::AreaExited { actor, from, to })
            }
        }
        "do" | "cmd" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            let (Some(actor), Some(room), Some(text)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(ConsoleError::Usage("do <actor> <room> <command text>"));
            };
            ConsoleCommand::Event(InboundEvent::CommandAttempted {
                actor: ActorId::from(actor),
                room: RoomId::from(room),
                text: text.trim().to_owned(),
            })
        }
        "enable" | "disable" => {
            let [scope, rule] = args.as_slice() else {
                return Err(ConsoleError::Usage("enable|disable <scope> <rule>"));
            };
            ConsoleCommand::SetEnabled {
                scope: parse_scope(scope)?,
                rule_id: RuleId::from(*rule),
                enabled: verb.eq_ignore_ascii_case("enable"),
            }
        }
        "fire" => {
            let (scope, rule, actor) = match args.as_slice() {
                [scope, rule] => (*scope, *rule, None),
                [scope, rule, actor] => (*scope, *rule, Some(ActorId::from(*actor))),
                _ => return Err(ConsoleError::Usage("fire <scope> <rule> [actor]")),
            };
            ConsoleCommand::Fire {
                scope: parse_scope(scope)?,
                rule_id: RuleId::from(rule),
                actor,
            }
        }
        "load" | "reload" => {
            if rest.is_empty() {
                return Err(ConsoleError::Usage("load <path>"));
            }
            ConsoleCommand::Load(PathBuf::from(rest))
        }
        "unload" => {
            let [scope] = args.as_slice() else {
                return Err(ConsoleError::Usage("unload <scope>"));
            };
            ConsoleCommand::Unload(parse_scope(scope)?)
        }
        "save" => ConsoleCommand::Save,
        "quit" | "q" => ConsoleCommand::Quit,
        other => return Err(ConsoleError::UnknownCommand(other.to_owned())),
    };
    Ok(Some(command))
}

fn parse_scope(raw: &str) -> Result<ScopeKey, ConsoleError> {
    raw.parse()
        .map_err(|e: tripwire_types::ScopeParseError| ConsoleError::BadArgument(e.to_string()))
}

fn parse_direction(raw: &str) -> Result<Direction, ConsoleError> {
    raw.parse().map_err(ConsoleError::BadArgument)
}
