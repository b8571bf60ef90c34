//! Trigger engine for the Tripwire system.
//!
//! Authored rules attach to rooms and areas. When a simulation event
//! occurs (an actor entering a room, typing a command, a timer elapsing)
//! the engine evaluates the conditions of the matching rules against the
//! world and executes their actions, subject to cooldowns, firing limits,
//! and runtime enable/disable.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`content`] -- Parsing and validating rule files
//! - [`catalog`] -- Loaded rules grouped by scope
//! - [`pattern`] -- Command text matching
//! - [`template`] -- Placeholder substitution in action text
//! - [`condition`] -- Condition registry and built-in condition types
//! - [`action`] -- Action registry and built-in action types
//! - [`state`] -- Per-rule runtime counters
//! - [`timer`] -- Deadline-ordered scheduler for timers and delays
//! - [`engine`] -- [`TriggerEngine`]: lifecycle, control, persistence hooks
//! - [`dispatch`] -- Event routing and rule firing
//! - [`runner`] -- Async command loop around the engine
//! - [`error`] -- Control API errors

pub mod action;
pub mod catalog;
pub mod condition;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod runner;
pub mod state;
pub mod template;
pub mod timer;

pub use action::{ActionEnv, ActionError, ActionHandler, ActionOutcome, ActionRegistry, Followup};
pub use catalog::{LoadedRule, ScopeTriggers, TriggerCatalog};
pub use condition::{
    CompareOp, ConditionContext, ConditionError, ConditionHandler, ConditionRegistry,
};
pub use config::{
    ConfigError, ContentConfig, LoggingConfig, PersistenceConfig, RuntimeConfig, TripwireConfig,
};
pub use content::{ContentError, ContentSet, LoadDiagnostic, ScopeContent, load_directory};
pub use dispatch::FireResult;
pub use engine::{LoadReport, TriggerEngine};
pub use error::EngineError;
pub use pattern::CommandPattern;
pub use runner::{
    EngineCommand, EngineHandle, RunnerClock, RunnerError, RunnerOptions, RunnerOutcome,
    run_engine,
};
pub use state::{CooldownKey, RuntimeStateStore, TriggerRuntimeState};
pub use timer::{TimerHandle, TimerService};
