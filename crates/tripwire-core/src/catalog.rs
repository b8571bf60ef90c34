//! The trigger catalog: loaded rule definitions grouped by scope.
//!
//! A scope's rule list is replaced wholesale on reload and never edited in
//! place. Each installation gets a fresh epoch number; work scheduled
//! against an older epoch of the same scope is stale.

use std::collections::BTreeMap;
use std::sync::Arc;

use tripwire_types::{RuleId, ScopeKey, TriggerDefinition, TriggerEvent};

use crate::pattern::CommandPattern;

/// A definition with its precompiled command pattern.
#[derive(Debug, Clone)]
pub struct LoadedRule {
    /// The authored definition.
    pub definition: Arc<TriggerDefinition>,
    /// Compiled `command_pattern`, for `on_command` rules.
    pub pattern: Option<CommandPattern>,
}

impl LoadedRule {
    fn new(definition: TriggerDefinition) -> Self {
        let pattern = (definition.event == TriggerEvent::OnCommand)
            .then(|| definition.command_pattern.as_deref().map(CommandPattern::parse))
            .flatten();
        Self {
            definition: Arc::new(definition),
            pattern,
        }
    }

    /// Whether raw command text selects this rule. Rules without a pattern
    /// never match.
    pub fn matches_command(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.matches(text))
    }
}

/// The rules of one scope.
#[derive(Debug, Clone)]
pub struct ScopeTriggers {
    epoch: u64,
    rules: Vec<LoadedRule>,
}

impl ScopeTriggers {
    /// Installation epoch.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Rules in authored order.
    pub fn rules(&self) -> &[LoadedRule] {
        &self.rules
    }

    /// Look up a rule by id.
    pub fn rule(&self, rule_id: &RuleId) -> Option<&LoadedRule> {
        self.rules.iter().find(|r| r.definition.id == *rule_id)
    }

    /// Rules bound to an event, in authored order.
    pub fn for_event(&self, event: TriggerEvent) -> impl Iterator<Item = &LoadedRule> {
        self.rules.iter().filter(move |r| r.definition.event == event)
    }
}

/// All loaded scopes.
#[derive(Debug, Default)]
pub struct TriggerCatalog {
    scopes: BTreeMap<ScopeKey, ScopeTriggers>,
    next_epoch: u64,
}

impl TriggerCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) a scope's rules; returns the new epoch and the
    /// replaced rule set, if any.
    pub fn insert(
        &mut self,
        scope: ScopeKey,
        rules: Vec<TriggerDefinition>,
    ) -> (u64, Option<ScopeTriggers>) {
        self.next_epoch = self.next_epoch.wrapping_add(1);
        let epoch = self.next_epoch;
        let triggers = ScopeTriggers {
            epoch,
            rules: rules.into_iter().map(LoadedRule::new).collect(),
        };
        (epoch, self.scopes.insert(scope, triggers))
    }

    /// Remove a scope.
    pub fn remove(&mut self, scope: &ScopeKey) -> Option<ScopeTriggers> {
        self.scopes.remove(scope)
    }

    /// Rules of a scope.
    pub fn get(&self, scope: &ScopeKey) -> Option<&ScopeTriggers> {
        self.scopes.get(scope)
    }

    /// Whether a scope is loaded.
    pub fn contains(&self, scope: &ScopeKey) -> bool {
        self.scopes.contains_key(scope)
    }

    /// Current epoch of a scope.
    pub fn epoch(&self, scope: &ScopeKey) -> Option<u64> {
        self.scopes.get(scope).map(ScopeTriggers::epoch)
    }

    /// Loaded scopes, sorted.
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeKey> {
        self.scopes.keys()
    }

    /// Definitions of a scope in authored order.
    pub fn definitions(&self, scope: &ScopeKey) -> Vec<&TriggerDefinition> {
        self.scopes
            .get(scope)
            .map(|s| s.rules.iter().map(|r| r.definition.as_ref()).collect())
            .unwrap_or_default()
    }

    /// One definition.
    pub fn definition(&self, scope: &ScopeKey, rule_id: &RuleId) -> Option<&Arc<TriggerDefinition>> {
        self.scopes
            .get(scope)
            .and_then(|s| s.rule(rule_id))
            .map(|r| &r.definition)
    }

    /// Snapshot of the rules a dispatch should consider, detached from the
    /// catalog so actions may reload or unload scopes meanwhile.
    pub fn candidates(&self, scope: &ScopeKey, event: TriggerEvent) -> Vec<LoadedRule> {
        self.scopes
            .get(scope)
            .map(|s| s.for_event(event).cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of loaded rules.
    pub fn rule_count(&self) -> usize {
        self.scopes.values().map(|s| s.rules.len()).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rules() -> Vec<TriggerDefinition> {
        let mut pull = TriggerDefinition::new("pull", TriggerEvent::OnCommand);
        pull.command_pattern = Some("pull *".to_owned());
        vec![
            TriggerDefinition::new("greet", TriggerEvent::OnEnter),
            pull,
            TriggerDefinition::new("farewell", TriggerEvent::OnExit),
            TriggerDefinition::new("greet_again", TriggerEvent::OnEnter),
        ]
    }

    #[test]
    fn candidates_keep_authored_order() {
        let mut catalog = TriggerCatalog::new();
        let scope = ScopeKey::room("cellar");
        catalog.insert(scope.clone(), rules());
        let ids: Vec<String> = catalog
            .candidates(&scope, TriggerEvent::OnEnter)
            .iter()
            .map(|r| r.definition.id.to_string())
            .collect();
        assert_eq!(ids, vec!["greet", "greet_again"]);
        assert!(catalog.candidates(&ScopeKey::room("hall"), TriggerEvent::OnEnter).is_empty());
        assert_eq!(catalog.rule_count(), 4);
    }

    #[test]
    fn command_patterns_are_precompiled() {
        let mut catalog = TriggerCatalog::new();
        let scope = ScopeKey::room("cellar");
        catalog.insert(scope.clone(), rules());
        let rule = catalog.get(&scope).unwrap().rule(&RuleId::from("pull")).unwrap();
        assert!(rule.matches_command("Pull Lever"));
        assert!(!rule.matches_command("push lever"));
        let greet = catalog.get(&scope).unwrap().rule(&RuleId::from("greet")).unwrap();
        assert!(!greet.matches_command("greet"));
    }

    #[test]
    fn reinstalling_bumps_the_epoch() {
        let mut catalog = TriggerCatalog::new();
        let scope = ScopeKey::area("old_mine");
        let (first, previous) = catalog.insert(scope.clone(), rules());
        assert!(previous.is_none());
        let (second, previous) = catalog.insert(scope.clone(), Vec::new());
        assert!(second > first);
        assert_eq!(previous.unwrap().epoch(), first);
        assert!(catalog.definitions(&scope).is_empty());
        assert!(catalog.remove(&scope).is_some());
        assert!(catalog.epoch(&scope).is_none());
    }
}
