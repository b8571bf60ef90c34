//! Async runner that owns a [`TriggerEngine`] and its world.
//!
//! The engine is single-threaded by construction. [`run_engine`] gives it a
//! home on the tokio runtime:
//!
//! - **Commands**: inbound events and control requests arrive over a
//!   bounded mpsc queue through an [`EngineHandle`] and are applied one at
//!   a time, in arrival order.
//! - **Scheduler**: the loop sleeps until the engine's next deadline and
//!   then calls [`TriggerEngine::advance`].
//! - **Broadcast**: every outbound event goes out on a broadcast channel.
//! - **Autosave**: permanent rule state is periodically handed to a
//!   persistence task, and once more on shutdown.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tripwire_types::{
    InboundEvent, OutboundEvent, PersistedRuleState, RuleId, ScopeKey, TriggerContext,
};
use tripwire_world::WorldAccess;

use crate::content::ScopeContent;
use crate::dispatch::FireResult;
use crate::engine::{LoadReport, TriggerEngine};
use crate::error::EngineError;

/// Errors returned by [`EngineHandle`] calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunnerError {
    /// The runner has stopped and no longer accepts commands.
    #[error("trigger runner has shut down")]
    Closed,

    /// The engine rejected a control request.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<mpsc::error::SendError<EngineCommand>> for RunnerError {
    fn from(_: mpsc::error::SendError<EngineCommand>) -> Self {
        Self::Closed
    }
}

impl From<oneshot::error::RecvError> for RunnerError {
    fn from(_: oneshot::error::RecvError) -> Self {
        Self::Closed
    }
}

/// A request for the runner.
#[derive(Debug)]
pub enum EngineCommand {
    /// Dispatch a simulation event.
    Dispatch {
        /// The event.
        event: InboundEvent,
        /// Receives the dispatch result, if the sender waits for it.
        reply: Option<oneshot::Sender<FireResult>>,
    },
    /// Install or reload a scope.
    LoadScope {
        /// Parsed scope content.
        content: ScopeContent,
        /// Receives the load report.
        reply: Option<oneshot::Sender<LoadReport>>,
    },
    /// Remove a scope.
    UnloadScope {
        /// The scope.
        scope: ScopeKey,
        /// Receives whether the scope was loaded.
        reply: Option<oneshot::Sender<bool>>,
    },
    /// Enable or disable a rule.
    SetEnabled {
        /// Scope of the rule.
        scope: ScopeKey,
        /// The rule.
        rule_id: RuleId,
        /// New state.
        enabled: bool,
        /// Receives the control event or the failure.
        reply: oneshot::Sender<Result<OutboundEvent, EngineError>>,
    },
    /// Fire a rule directly.
    FireRule {
        /// Scope of the rule.
        scope: ScopeKey,
        /// The rule.
        rule_id: RuleId,
        /// Context the rule sees.
        context: TriggerContext,
        /// Receives the dispatch result or the failure.
        reply: oneshot::Sender<Result<FireResult, EngineError>>,
    },
    /// Apply persisted rule state.
    Restore {
        /// Records to apply.
        records: Vec<PersistedRuleState>,
        /// Receives how many records applied immediately.
        reply: Option<oneshot::Sender<usize>>,
    },
    /// Export permanent rule state.
    Snapshot {
        /// Receives the records.
        reply: oneshot::Sender<Vec<PersistedRuleState>>,
    },
    /// Stop the runner after a final save.
    Shutdown,
}

/// Cloneable sender side of a runner.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Wrap a command sender.
    pub const fn new(tx: mpsc::Sender<EngineCommand>) -> Self {
        Self { tx }
    }

    /// A handle and the receiver to pass to [`run_engine`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineCommand>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    async fn send(&self, command: EngineCommand) -> Result<(), RunnerError> {
        Ok(self.tx.send(command).await?)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        Ok(rx.await?)
    }

    /// Dispatch an event and wait for the result.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<FireResult, RunnerError> {
        self.request(|reply| EngineCommand::Dispatch {
            event,
            reply: Some(reply),
        })
        .await
    }

    /// Dispatch an event without waiting.
    pub async fn submit(&self, event: InboundEvent) -> Result<(), RunnerError> {
        self.send(EngineCommand::Dispatch { event, reply: None }).await
    }

    /// Install or reload a scope.
    pub async fn load_scope(&self, content: ScopeContent) -> Result<LoadReport, RunnerError> {
        self.request(|reply| EngineCommand::LoadScope {
            content,
            reply: Some(reply),
        })
        .await
    }

    /// Remove a scope.
    pub async fn unload_scope(&self, scope: ScopeKey) -> Result<bool, RunnerError> {
        self.request(|reply| EngineCommand::UnloadScope {
            scope,
            reply: Some(reply),
        })
        .await
    }

    /// Enable or disable a rule.
    pub async fn set_enabled(
        &self,
        scope: ScopeKey,
        rule_id: RuleId,
        enabled: bool,
    ) -> Result<OutboundEvent, RunnerError> {
        Ok(self
            .request(|reply| EngineCommand::SetEnabled {
                scope,
                rule_id,
                enabled,
                reply,
            })
            .await??)
    }

    /// Fire a rule directly.
    pub async fn fire_rule(
        &self,
        scope: ScopeKey,
        rule_id: RuleId,
        context: TriggerContext,
    ) -> Result<FireResult, RunnerError> {
        Ok(self
            .request(|reply| EngineCommand::FireRule {
                scope,
                rule_id,
                context,
                reply,
            })
            .await??)
    }

    /// Apply persisted rule state.
    pub async fn restore(&self, records: Vec<PersistedRuleState>) -> Result<usize, RunnerError> {
        self.request(|reply| EngineCommand::Restore {
            records,
            reply: Some(reply),
        })
        .await
    }

    /// Export permanent rule state.
    pub async fn snapshot(&self) -> Result<Vec<PersistedRuleState>, RunnerError> {
        self.request(|reply| EngineCommand::Snapshot { reply }).await
    }

    /// Ask the runner to stop.
    pub async fn shutdown(&self) -> Result<(), RunnerError> {
        self.send(EngineCommand::Shutdown).await
    }
}

/// Runner settings.
#[derive(Debug, Default)]
pub struct RunnerOptions {
    /// Period of permanent-state saves; `None` disables autosave.
    pub autosave_interval: Option<Duration>,
    /// Receives permanent-state snapshots for storage.
    pub snapshot_tx: Option<mpsc::Sender<Vec<PersistedRuleState>>>,
}

/// What the runner hands back when it stops.
#[derive(Debug)]
pub struct RunnerOutcome<W> {
    /// The engine, with its final state.
    pub engine: TriggerEngine,
    /// The world.
    pub world: W,
    /// Commands processed.
    pub commands: u64,
}

/// Maps tokio's monotonic clock onto wall-clock time.
///
/// Engine deadlines are wall-clock; sleeping happens on tokio instants so
/// paused-time tests drive the scheduler deterministically.
#[derive(Debug, Clone, Copy)]
pub struct RunnerClock {
    wall_base: DateTime<Utc>,
    instant_base: Instant,
}

impl RunnerClock {
    /// Anchor the clock at the current instant.
    pub fn start() -> Self {
        Self::anchored(Utc::now(), Instant::now())
    }

    /// Anchor the clock at a given pair.
    pub const fn anchored(wall_base: DateTime<Utc>, instant_base: Instant) -> Self {
        Self {
            wall_base,
            instant_base,
        }
    }

    /// Current wall-clock time.
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.instant_base.elapsed()).unwrap_or(TimeDelta::MAX);
        self.wall_base
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The instant corresponding to a wall-clock deadline. Deadlines before
    /// the anchor map to the anchor.
    pub fn instant_for(&self, deadline: DateTime<Utc>) -> Instant {
        let offset = deadline
            .signed_duration_since(self.wall_base)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.instant_base
            .checked_add(offset)
            .unwrap_or_else(far_future)
    }
}

fn far_future() -> Instant {
    Instant::now()
        .checked_add(Duration::from_secs(31_536_000))
        .unwrap_or_else(Instant::now)
}

/// Drive an engine until [`EngineCommand::Shutdown`] arrives or every
/// [`EngineHandle`] is dropped.
pub async fn run_engine<W: WorldAccess>(
    mut engine: TriggerEngine,
    mut world: W,
    mut commands: mpsc::Receiver<EngineCommand>,
    outbound: broadcast::Sender<OutboundEvent>,
    options: RunnerOptions,
) -> RunnerOutcome<W> {
    let RunnerOptions {
        autosave_interval,
        snapshot_tx,
    } = options;
    let clock = RunnerClock::start();
    let mut autosave = autosave_interval.filter(|d| !d.is_zero()).map(|period| {
        let mut interval =
            tokio::time::interval_at(Instant::now().checked_add(period).unwrap_or_else(far_future), period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    let mut processed: u64 = 0;

    info!(
        scopes = engine.catalog().scopes().count(),
        rules = engine.catalog().rule_count(),
        autosave_secs = autosave_interval.map(|d| d.as_secs()),
        "Trigger runner starting"
    );

    loop {
        let deadline = engine.next_deadline().map(|d| clock.instant_for(d));
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    info!("All engine handles dropped");
                    break;
                };
                if matches!(command, EngineCommand::Shutdown) {
                    info!("Trigger runner shutdown requested");
                    break;
                }
                processed = processed.saturating_add(1);
                apply_command(&mut engine, &mut world, command, &outbound, clock.now());
            }
            () = tokio::time::sleep_until(deadline.unwrap_or_else(far_future)), if deadline.is_some() => {
                let events = engine.advance(&mut world, clock.now());
                publish(&outbound, events);
            }
            () = tick(autosave.as_mut()) => {
                save(&engine, snapshot_tx.as_ref(), false).await;
            }
        }
    }

    save(&engine, snapshot_tx.as_ref(), true).await;
    info!(commands = processed, "Trigger runner stopped");
    RunnerOutcome {
        engine,
        world,
        commands: processed,
    }
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn apply_command(
    engine: &mut TriggerEngine,
    world: &mut dyn WorldAccess,
    command: EngineCommand,
    outbound: &broadcast::Sender<OutboundEvent>,
    now: DateTime<Utc>,
) {
    match command {
        EngineCommand::Dispatch { event, reply } => {
            let result = engine.handle(&event, world, now);
            publish(outbound, result.events.clone());
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }
        EngineCommand::LoadScope { content, reply } => {
            let report = engine.load_scope(content, now);
            if let Some(reply) = reply {
                let _ = reply.send(report);
            }
        }
        EngineCommand::UnloadScope { scope, reply } => {
            let removed = engine.unload_scope(&scope);
            if let Some(reply) = reply {
                let _ = reply.send(removed);
            }
        }
        EngineCommand::SetEnabled {
            scope,
            rule_id,
            enabled,
            reply,
        } => {
            let result = engine.set_enabled(&scope, &rule_id, enabled, now);
            if let Ok(event) = &result {
                publish(outbound, vec![event.clone()]);
            }
            let _ = reply.send(result);
        }
        EngineCommand::FireRule {
            scope,
            rule_id,
            context,
            reply,
        } => {
            let result = engine.fire_rule(&scope, &rule_id, &context, world, now);
            if let Ok(fired) = &result {
                publish(outbound, fired.events.clone());
            }
            let _ = reply.send(result);
        }
        EngineCommand::Restore { records, reply } => {
            let applied = engine.restore(records);
            if let Some(reply) = reply {
                let _ = reply.send(applied);
            }
        }
        EngineCommand::Snapshot { reply } => {
            let _ = reply.send(engine.export_permanent());
        }
        EngineCommand::Shutdown => {}
    }
}

fn publish(outbound: &broadcast::Sender<OutboundEvent>, events: Vec<OutboundEvent>) {
    for event in events {
        if outbound.send(event).is_err() {
            debug!("Outbound event dropped: no subscribers");
        }
    }
}

async fn save(
    engine: &TriggerEngine,
    snapshot_tx: Option<&mpsc::Sender<Vec<PersistedRuleState>>>,
    final_save: bool,
) {
    let Some(tx) = snapshot_tx else {
        return;
    };
    let records = engine.export_permanent();
    let count = records.len();
    let sent = if final_save {
        tx.send(records).await.is_ok()
    } else {
        tx.try_send(records).is_ok()
    };
    if sent {
        debug!(records = count, final_save, "Permanent trigger state handed off");
    } else {
        warn!(records = count, final_save, "Permanent trigger state snapshot dropped");
    }
}
