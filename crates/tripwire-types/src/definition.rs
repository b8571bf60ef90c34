//! Authored trigger rule records.
//!
//! These types mirror the declarative content schema one-to-one. A
//! [`TriggerDefinition`] is immutable once loaded; reload replaces it
//! wholesale. Condition and action parameters stay loosely typed
//! ([`Params`]) because their shape is owned by whichever handler the
//! `type` key resolves to.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::TriggerEvent;
use crate::ids::RuleId;

/// Convert an authored number of seconds into a [`TimeDelta`].
///
/// Returns `None` for negative, non-finite, or out-of-range values.
pub fn seconds_to_delta(seconds: f64) -> Option<TimeDelta> {
    let duration = Duration::try_from_secs_f64(seconds).ok()?;
    TimeDelta::from_std(duration).ok()
}

/// A parameter lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// A required key is absent.
    #[error("missing parameter `{key}`")]
    Missing {
        /// The missing key.
        key: String,
    },
    /// The key is present but holds the wrong kind of value.
    #[error("parameter `{key}` must be {expected}")]
    WrongType {
        /// The offending key.
        key: String,
        /// What the handler expected.
        expected: &'static str,
    },
}

/// Key-to-value parameter map of a condition or action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    /// An empty parameter map.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert, mostly for tests and programmatic rules.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Required string parameter.
    pub fn str(&self, key: &str) -> Result<&str, ParamError> {
        match self.0.get(key) {
            None => Err(missing(key)),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(wrong(key, "a string")),
        }
    }

    /// Optional string parameter; wrong types are an error.
    pub fn opt_str(&self, key: &str) -> Result<Option<&str>, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(wrong(key, "a string")),
        }
    }

    /// Required numeric parameter.
    pub fn f64(&self, key: &str) -> Result<f64, ParamError> {
        self.opt_f64(key)?.ok_or_else(|| missing(key))
    }

    /// Optional numeric parameter; wrong types are an error.
    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| wrong(key, "a number")),
            Some(_) => Err(wrong(key, "a number")),
        }
    }

    /// Required integer parameter.
    pub fn i64(&self, key: &str) -> Result<i64, ParamError> {
        self.opt_i64(key)?.ok_or_else(|| missing(key))
    }

    /// Optional integer parameter; wrong types are an error.
    pub fn opt_i64(&self, key: &str) -> Result<Option<i64>, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| wrong(key, "an integer")),
            Some(_) => Err(wrong(key, "an integer")),
        }
    }

    /// Non-negative integer parameter with a default when absent.
    pub fn u32_or(&self, key: &str, default: u32) -> Result<u32, ParamError> {
        match self.opt_i64(key)? {
            None => Ok(default),
            Some(n) => u32::try_from(n).map_err(|_err| wrong(key, "a non-negative integer")),
        }
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn missing(key: &str) -> ParamError {
    ParamError::Missing {
        key: key.to_owned(),
    }
}

fn wrong(key: &str, expected: &'static str) -> ParamError {
    ParamError::WrongType {
        key: key.to_owned(),
        expected,
    }
}

/// One authored condition: a registry key, its parameters, and an
/// optional inversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCondition {
    /// Key into the condition registry.
    #[serde(rename = "type")]
    pub kind: String,
    /// Handler-specific parameters.
    #[serde(default)]
    pub params: Params,
    /// Invert the handler's result before combination.
    #[serde(default)]
    pub negate: bool,
}

impl TriggerCondition {
    /// A condition with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Params::new(),
            negate: false,
        }
    }

    /// Builder-style parameter insert.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params = self.params.with(key, value);
        self
    }

    /// Builder-style negation.
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.negate = true;
        self
    }
}

/// One authored action: a registry key, its parameters, and the delay
/// before it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerAction {
    /// Key into the action registry.
    #[serde(rename = "type")]
    pub kind: String,
    /// Handler-specific parameters.
    #[serde(default)]
    pub params: Params,
    /// Seconds to wait, from the start of this action's turn, before running.
    #[serde(default)]
    pub delay: f64,
}

impl TriggerAction {
    /// An immediate action with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Params::new(),
            delay: 0.0,
        }
    }

    /// Builder-style parameter insert.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params = self.params.with(key, value);
        self
    }

    /// Builder-style delay.
    #[must_use]
    pub const fn delayed(mut self, seconds: f64) -> Self {
        self.delay = seconds;
        self
    }

    /// The delay as a [`TimeDelta`], or `None` when the action is immediate.
    pub fn delay_delta(&self) -> Option<TimeDelta> {
        if self.delay > 0.0 {
            seconds_to_delta(self.delay)
        } else {
            None
        }
    }
}

const fn default_max_fires() -> i64 {
    -1
}

const fn default_true() -> bool {
    true
}

/// An authored condition/action binding to an event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    /// Unique identifier within the owning scope.
    pub id: RuleId,
    /// Event kind the rule reacts to.
    pub event: TriggerEvent,
    /// Conditions, combined with AND.
    #[serde(default)]
    pub conditions: Vec<TriggerCondition>,
    /// Actions, executed in author order.
    #[serde(default)]
    pub actions: Vec<TriggerAction>,
    /// Minimum seconds between successful firings (0 = none).
    #[serde(default)]
    pub cooldown: f64,
    /// Successful-firing limit; -1 means unlimited.
    #[serde(default = "default_max_fires")]
    pub max_fires: i64,
    /// Authored enabled flag; runtime overrides live in the state store.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Persist fire count and last-fired time across restarts.
    #[serde(default)]
    pub permanent: bool,
    /// Glob pattern matched against raw command text (`on_command`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_pattern: Option<String>,
    /// Seconds between recurring firings (`on_timer`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_interval: Option<f64>,
    /// Seconds before the first recurring firing (`on_timer`).
    #[serde(default)]
    pub timer_initial_delay: f64,
}

impl TriggerDefinition {
    /// A rule with default limits and no conditions or actions.
    pub fn new(id: impl Into<RuleId>, event: TriggerEvent) -> Self {
        Self {
            id: id.into(),
            event,
            conditions: Vec::new(),
            actions: Vec::new(),
            cooldown: 0.0,
            max_fires: default_max_fires(),
            enabled: true,
            permanent: false,
            command_pattern: None,
            timer_interval: None,
            timer_initial_delay: 0.0,
        }
    }

    /// The cooldown as a [`TimeDelta`], or `None` when there is none.
    pub fn cooldown_delta(&self) -> Option<TimeDelta> {
        if self.cooldown > 0.0 {
            seconds_to_delta(self.cooldown)
        } else {
            None
        }
    }

    /// The firing limit, or `None` when unlimited.
    pub fn fire_limit(&self) -> Option<u32> {
        if self.max_fires < 0 {
            None
        } else {
            Some(u32::try_from(self.max_fires).unwrap_or(u32::MAX))
        }
    }

    /// Initial delay and interval for `on_timer` rules.
    ///
    /// Returns `None` for other events or when the interval is missing or
    /// not positive.
    pub fn timer_schedule(&self) -> Option<(TimeDelta, TimeDelta)> {
        if self.event != TriggerEvent::OnTimer {
            return None;
        }
        let interval = self.timer_interval.filter(|secs| *secs > 0.0)?;
        let interval = seconds_to_delta(interval)?;
        let initial = seconds_to_delta(self.timer_initial_delay.max(0.0))?;
        Some((initial, interval))
    }
}
