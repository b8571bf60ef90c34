//! Tripwire trigger engine binary.
//!
//! Wires the trigger engine to a world fixture, the rule content
//! directory, and `SQLite` persistence, then drives it from a line-oriented
//! console on stdin until `quit`, end of input, or Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`TRIPWIRE_CONFIG`, default `tripwire-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the world from its fixture file
//! 4. Connect to `SQLite` and read saved permanent rule state
//! 5. Load every scope file from the content directory
//! 6. Spawn the engine runner, persistence task, and event printer
//! 7. Read console commands
//! 8. Shut down with a final save

mod console;
mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tripwire_core::{
    EngineHandle, LoggingConfig, RunnerOptions, ScopeContent, TriggerEngine, TripwireConfig,
    load_directory, run_engine,
};
use tripwire_db::{RuleStateStore, SqliteConfig, StatePool};
use tripwire_types::{OutboundEvent, PersistedRuleState, TriggerContext};
use tripwire_world::{MemoryWorld, WorldFixture};

use crate::console::ConsoleCommand;
use crate::error::AppError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "tripwire-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails or a background task
/// dies.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration.
    let config_path = std::env::var("TRIPWIRE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = TripwireConfig::from_file_or_default(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(config = %config_path.display(), "tripwire-engine starting");

    // 3. Build the world.
    let world = load_world(&config.content.world_file)?;

    // 4. Connect to SQLite and read saved state.
    let db_config = SqliteConfig::new(&config.persistence.database_url)
        .with_connect_timeout(Duration::from_secs(config.persistence.connect_timeout_secs));
    let db = StatePool::connect(&db_config).await?;
    let saved = RuleStateStore::new(db.pool()).load_all().await?;
    info!(records = saved.len(), "Saved trigger state loaded");

    // 5. Build the engine and load content.
    let mut engine = TriggerEngine::new(&config.runtime);
    engine.restore(saved);
    let now = chrono::Utc::now();
    let content = load_directory(&config.content.triggers_dir)?;
    for failure in &content.failures {
        warn!(diagnostic = %failure, "Trigger file skipped");
    }
    for scope in content.scopes {
        let report = engine.load_scope(scope, now);
        if !report.unknown_conditions.is_empty() || !report.unknown_actions.is_empty() {
            warn!(
                scope = %report.scope,
                conditions = ?report.unknown_conditions,
                actions = ?report.unknown_actions,
                "Scope references unregistered types"
            );
        }
    }
    info!(
        scopes = engine.catalog().scopes().count(),
        rules = engine.catalog().rule_count(),
        "Trigger content loaded"
    );

    // 6. Spawn the runner and its satellites.
    let (handle, commands) = EngineHandle::channel(config.runtime.command_queue_capacity);
    let (outbound_tx, outbound_rx) = broadcast::channel(config.runtime.outbound_capacity);
    let (snapshot_tx, snapshot_rx) = mpsc::channel(4);
    let options = RunnerOptions {
        autosave_interval: (config.persistence.autosave_interval_secs > 0)
            .then(|| Duration::from_secs(config.persistence.autosave_interval_secs)),
        snapshot_tx: Some(snapshot_tx),
    };
    let runner = tokio::spawn(run_engine(engine, world, commands, outbound_tx, options));
    let persister = tokio::spawn(persist_snapshots(db.clone(), snapshot_rx));
    let printer = tokio::spawn(print_events(outbound_rx));

    // 7. Read console commands.
    tokio::select! {
        result = console_loop(&handle, &db) => result?,
        _ = tokio::signal::ctrl_c() => info!("Ctrl-C received"),
    }

    // 8. Shut down with a final save.
    if handle.shutdown().await.is_err() {
        warn!("Runner already stopped");
    }
    let outcome = runner.await?;
    persister.await?;
    printer.abort();
    db.close().await;

    info!(commands = outcome.commands, "tripwire-engine shutdown complete");
    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Build the world from its fixture, or start empty if the file is absent.
fn load_world(path: &Path) -> Result<MemoryWorld, AppError> {
    if path.exists() {
        let world = WorldFixture::from_file(path)?.build()?;
        info!(
            path = %path.display(),
            rooms = world.room_count(),
            actors = world.actor_count(),
            "World fixture loaded"
        );
        Ok(world)
    } else {
        warn!(path = %path.display(), "World fixture not found, starting with an empty world");
        Ok(MemoryWorld::new())
    }
}

/// Write every snapshot the runner hands off until the runner stops.
async fn persist_snapshots(db: StatePool, mut snapshots: mpsc::Receiver<Vec<PersistedRuleState>>) {
    while let Some(records) = snapshots.recv().await {
        if let Err(e) = RuleStateStore::new(db.pool()).save_all(&records).await {
            error!(error = %e, records = records.len(), "Failed to save trigger state");
        }
    }
}

/// Print outbound events as JSON lines.
async fn print_events(mut events: broadcast::Receiver<OutboundEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to encode outbound event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Read and execute console lines until `quit` or end of input.
async fn console_loop(handle: &EngineHandle, db: &StatePool) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match console::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }
        execute(handle, db, command).await?;
    }
    Ok(())
}

/// Run one console command. Engine-level refusals are reported, not fatal.
async fn execute(
    handle: &EngineHandle,
    db: &StatePool,
    command: ConsoleCommand,
) -> Result<(), AppError> {
    match command {
        ConsoleCommand::Event(event) => {
            let result = handle.dispatch(event).await?;
            if !result.handled {
                eprintln!("(no trigger fired)");
            }
        }
        ConsoleCommand::SetEnabled {
            scope,
            rule_id,
            enabled,
        } => report(handle.set_enabled(scope, rule_id, enabled).await.map(drop))?,
        ConsoleCommand::Fire {
            scope,
            rule_id,
            actor,
        } => {
            let context = TriggerContext {
                actor,
                room: scope.as_room().cloned(),
                area: scope.as_area().cloned(),
                ..TriggerContext::ambient()
            };
            let fired = handle.fire_rule(scope, rule_id, context).await;
            if let Ok(result) = &fired
                && !result.handled
            {
                eprintln!("(trigger did not fire)");
            }
            report(fired.map(drop))?;
        }
        ConsoleCommand::Load(path) => match ScopeContent::from_file(&path) {
            Ok(content) => {
                let report = handle.load_scope(content).await?;
                eprintln!(
                    "{}: {} loaded, {} rejected",
                    report.scope,
                    report.loaded,
                    report.rejected.len()
                );
                for diagnostic in &report.rejected {
                    eprintln!("  {diagnostic}");
                }
            }
            Err(e) => eprintln!("{e}"),
        },
        ConsoleCommand::Unload(scope) => {
            if !handle.unload_scope(scope.clone()).await? {
                eprintln!("{scope} is not loaded");
            }
        }
        ConsoleCommand::Save => {
            let records = handle.snapshot().await?;
            RuleStateStore::new(db.pool()).save_all(&records).await?;
            eprintln!("saved {} records", records.len());
        }
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

/// Print control failures; propagate only a dead runner.
fn report(result: Result<(), tripwire_core::RunnerError>) -> Result<(), AppError> {
    match result {
        Ok(()) => Ok(()),
        Err(tripwire_core::RunnerError::Engine(e)) => {
            eprintln!("{e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
