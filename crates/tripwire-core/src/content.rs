//! Trigger content files and rule validation.
//!
//! One YAML file describes one scope:
//!
//! ```yaml
//! scope: { room: cellar }
//! triggers:
//!   - id: gate
//!     event: on_enter
//!     conditions:
//!       - { type: flag_set, params: { gate_open: false } }
//!     actions:
//!       - { type: set_flag, params: { gate_open: true } }
//!       - { type: open_exit, params: { direction: north, target: vault } }
//! ```
//!
//! Each trigger record is decoded and validated on its own. A bad record
//! becomes a [`LoadDiagnostic`] and the rest of the file still loads; only
//! an unreadable or structurally broken file is a [`ContentError`].

use core::fmt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;
use tripwire_types::{ScopeKey, TriggerDefinition, TriggerEvent};

use crate::condition;

/// A content file could not be used at all.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The file or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not a scope file.
    #[error("failed to parse {}: {source}", display_source(path.as_deref()))]
    Yaml {
        /// Offending file, if loaded from disk.
        path: Option<PathBuf>,
        /// The underlying YAML error.
        source: serde_yml::Error,
    },
}

fn display_source(path: Option<&Path>) -> String {
    path.map_or_else(|| "<inline>".to_owned(), |p| p.display().to_string())
}

/// One rejected trigger record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDiagnostic {
    /// Source file, if loaded from disk.
    pub file: Option<PathBuf>,
    /// Scope the record belonged to, if known.
    pub scope: Option<ScopeKey>,
    /// Rule id, if readable.
    pub rule_id: Option<String>,
    /// Why the record was rejected.
    pub reason: String,
}

impl fmt::Display for LoadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}: ", file.display())?;
        }
        if let Some(scope) = &self.scope {
            write!(f, "{scope}: ")?;
        }
        if let Some(rule_id) = &self.rule_id {
            write!(f, "rule `{rule_id}`: ")?;
        }
        f.write_str(&self.reason)
    }
}

#[derive(Deserialize)]
struct ScopeFile {
    scope: ScopeKey,
    #[serde(default)]
    triggers: Vec<serde_json::Value>,
}

/// Validated rules of one scope, with the records that were rejected.
#[derive(Debug, Clone)]
pub struct ScopeContent {
    scope: ScopeKey,
    rules: Vec<TriggerDefinition>,
    rejected: Vec<LoadDiagnostic>,
    source: Option<PathBuf>,
}

impl ScopeContent {
    /// Validate programmatically built rules.
    pub fn new(scope: ScopeKey, rules: Vec<TriggerDefinition>) -> Self {
        let mut content = Self {
            scope,
            rules: Vec::with_capacity(rules.len()),
            rejected: Vec::new(),
            source: None,
        };
        let mut seen = HashSet::new();
        for rule in rules {
            content.accept(rule, &mut seen);
        }
        content
    }

    /// Parse a scope document.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Yaml`] if the document has no valid `scope`
    /// or `triggers` is not a list.
    pub fn parse(yaml: &str, source: Option<&Path>) -> Result<Self, ContentError> {
        let file: ScopeFile = serde_yml::from_str(yaml).map_err(|source_err| ContentError::Yaml {
            path: source.map(Path::to_path_buf),
            source: source_err,
        })?;
        let mut content = Self {
            scope: file.scope,
            rules: Vec::with_capacity(file.triggers.len()),
            rejected: Vec::new(),
            source: source.map(Path::to_path_buf),
        };
        let mut seen = HashSet::new();
        for record in file.triggers {
            let rule_id = record.get("id").and_then(|v| v.as_str()).map(str::to_owned);
            match serde_json::from_value::<TriggerDefinition>(record) {
                Ok(rule) => content.accept(rule, &mut seen),
                Err(err) => content.reject(rule_id, err.to_string()),
            }
        }
        Ok(content)
    }

    /// Read and parse a scope file.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Io`] or [`ContentError::Yaml`].
    pub fn from_file(path: &Path) -> Result<Self, ContentError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, Some(path))
    }

    /// The owning scope.
    pub const fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    /// Accepted rules in authored order.
    pub fn rules(&self) -> &[TriggerDefinition] {
        &self.rules
    }

    /// Rejected records.
    pub fn rejected(&self) -> &[LoadDiagnostic] {
        &self.rejected
    }

    /// Source file, if loaded from disk.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Split into the scope, accepted rules and diagnostics.
    pub fn into_parts(self) -> (ScopeKey, Vec<TriggerDefinition>, Vec<LoadDiagnostic>) {
        (self.scope, self.rules, self.rejected)
    }

    fn accept(&mut self, rule: TriggerDefinition, seen: &mut HashSet<String>) {
        if let Err(reason) = validate_rule(&rule) {
            self.reject(Some(rule.id.to_string()), reason);
            return;
        }
        if !seen.insert(rule.id.to_string()) {
            self.reject(Some(rule.id.to_string()), "duplicate id in scope".to_owned());
            return;
        }
        self.rules.push(rule);
    }

    fn reject(&mut self, rule_id: Option<String>, reason: String) {
        let diagnostic = LoadDiagnostic {
            file: self.source.clone(),
            scope: Some(self.scope.clone()),
            rule_id,
            reason,
        };
        warn!(diagnostic = %diagnostic, "Rejected trigger definition");
        self.rejected.push(diagnostic);
    }
}

/// Every scope file in a directory.
#[derive(Debug, Default)]
pub struct ContentSet {
    /// Successfully parsed scopes, in file-name order.
    pub scopes: Vec<ScopeContent>,
    /// Files that could not be used at all.
    pub failures: Vec<LoadDiagnostic>,
}

/// Load every `*.yaml`/`*.yml` file in `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`ContentError::Io`] only if the directory itself cannot be
/// listed; broken files are reported in [`ContentSet::failures`].
pub fn load_directory(dir: &Path) -> Result<ContentSet, ContentError> {
    let io_err = |source| ContentError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut set = ContentSet::default();
    for path in paths {
        match ScopeContent::from_file(&path) {
            Ok(content) => set.scopes.push(content),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Skipping unreadable trigger file");
                set.failures.push(LoadDiagnostic {
                    file: Some(path),
                    scope: None,
                    rule_id: None,
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(set)
}

/// Structural checks on one rule, independent of registries.
pub fn validate_rule(rule: &TriggerDefinition) -> Result<(), String> {
    if rule.id.as_str().trim().is_empty() {
        return Err("id must not be blank".to_owned());
    }
    check_seconds("cooldown", rule.cooldown)?;
    check_seconds("timer_initial_delay", rule.timer_initial_delay)?;
    if rule.max_fires < -1 {
        return Err(format!("max_fires must be -1 or greater, got {}", rule.max_fires));
    }
    for (index, action) in rule.actions.iter().enumerate() {
        check_seconds("delay", action.delay)
            .map_err(|reason| format!("action {index} (`{}`): {reason}", action.kind))?;
    }
    match rule.event {
        TriggerEvent::OnCommand => {
            let blank = rule
                .command_pattern
                .as_deref()
                .is_none_or(|p| p.trim().is_empty());
            if blank {
                return Err("on_command rules require a command_pattern".to_owned());
            }
        }
        TriggerEvent::OnTimer => {
            if rule.timer_schedule().is_none() {
                return Err("on_timer rules require a positive timer_interval".to_owned());
            }
        }
        _ => {}
    }
    condition::validate_structure(&rule.conditions).map_err(|err| err.to_string())
}

fn check_seconds(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{field} must be a non-negative number of seconds, got {value}"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use tripwire_types::RuleId;

    use super::*;

    const CELLAR: &str = "
scope: { room: cellar }
triggers:
  - id: gate
    event: on_enter
    actions:
      - { type: message_actor, params: { text: hi } }
  - id: gate
    event: on_exit
  - id: warp
    event: on_teleport
  - id: lever
    event: on_command
  - id: drip
    event: on_timer
    timer_interval: -5
  - id: slow
    event: on_enter
    cooldown: -1
  - id: limit
    event: on_enter
    max_fires: -2
  - id: nested
    event: on_enter
    conditions:
      - { type: any, params: { conditions: 7 } }
  - event: on_enter
  - id: late
    event: on_enter
    actions:
      - { type: message_actor, delay: -0.5 }
  - id: pull
    event: on_command
    command_pattern: pull *
";

    #[test]
    fn bad_records_are_rejected_individually() {
        let content = ScopeContent::parse(CELLAR, None).unwrap();
        assert_eq!(content.scope(), &ScopeKey::room("cellar"));
        let accepted: Vec<&str> = content.rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(accepted, vec!["gate", "pull"]);

        let rejected: Vec<Option<&str>> = content
            .rejected()
            .iter()
            .map(|d| d.rule_id.as_deref())
            .collect();
        assert_eq!(
            rejected,
            vec![
                Some("gate"),
                Some("warp"),
                Some("lever"),
                Some("drip"),
                Some("slow"),
                Some("limit"),
                Some("nested"),
                None,
                Some("late"),
            ]
        );
        assert!(content.rejected().iter().all(|d| d.scope.is_some()));
    }

    #[test]
    fn missing_scope_is_a_file_error() {
        let result = ScopeContent::parse("triggers: []", None);
        assert!(matches!(result, Err(ContentError::Yaml { .. })));
        let both = ScopeContent::parse("scope: { room: cellar, area: old_mine }\n", None);
        assert!(matches!(both, Err(ContentError::Yaml { .. })));
    }

    #[test]
    fn inline_and_block_scope_maps_both_parse() {
        let inline = ScopeContent::parse("scope: { area: old_mine }\ntriggers: []\n", None).unwrap();
        assert_eq!(inline.scope(), &ScopeKey::area("old_mine"));
        let block = ScopeContent::parse("scope:\n  room: cellar\n", None).unwrap();
        assert_eq!(block.scope(), &ScopeKey::room("cellar"));
    }

    #[test]
    fn programmatic_rules_are_validated_too() {
        let good = TriggerDefinition::new("ok", TriggerEvent::OnEnter);
        let bad = TriggerDefinition::new(" ", TriggerEvent::OnEnter);
        let content = ScopeContent::new(ScopeKey::area("old_mine"), vec![good, bad]);
        assert_eq!(content.rules().len(), 1);
        assert_eq!(content.rejected().len(), 1);
        assert_eq!(content.rules().first().map(|r| r.id.clone()), Some(RuleId::from("ok")));
    }

    #[test]
    fn directory_loads_sorted_and_reports_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            file.write_all(body.as_bytes()).unwrap();
        };
        write("b_mine.yaml", "scope: { area: old_mine }\ntriggers: []\n");
        write("a_cellar.yml", "scope: { room: cellar }\n");
        write("broken.yaml", "scope: [nope");
        write("notes.txt", "ignored");

        let set = load_directory(dir.path()).unwrap();
        let scopes: Vec<String> = set.scopes.iter().map(|s| s.scope().to_string()).collect();
        assert_eq!(scopes, vec!["room:cellar", "area:old_mine"]);
        assert_eq!(set.failures.len(), 1);
        assert!(set.failures.first().unwrap().file.as_ref().unwrap().ends_with("broken.yaml"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_directory(&dir.path().join("absent")),
            Err(ContentError::Io { .. })
        ));
    }
}
