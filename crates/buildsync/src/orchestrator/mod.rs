//! The orchestration layer: scheduler state machine, single-flight scan
//! executor and multi-target deploy dispatcher, tied together behind one
//! explicitly-owned [`Orchestrator`] handle.

mod dispatcher;
mod executor;
mod scheduler;

pub use dispatcher::DeployDispatcher;
pub use executor::ScanExecutor;
pub use scheduler::{RunState, Scheduler};

use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{AppConfig, ConfigStore};
use crate::deploy::{DeployReport, DeployTransport};
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::history::{self, HistoryLog, HistoryStore};
use crate::journal::{Journal, JournalEntry};
use crate::progress::{ProgressState, ProgressTracker};
use crate::scanner::ArtifactScanner;

/// Which long-running operation currently owns the system.
///
/// Scan/copy cycles and manual deployments are mutually exclusive in both
/// directions; the gate is the single in-process arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveOp {
    Idle,
    Scanning,
    Deploying,
}

pub(crate) struct OpGate {
    state: Mutex<ActiveOp>,
}

impl OpGate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ActiveOp::Idle),
        })
    }

    /// Try to claim the gate; returns a guard that releases it on drop.
    pub(crate) fn try_begin(self: &Arc<Self>, op: ActiveOp) -> Option<OpGuard> {
        let mut state = self.state.lock();
        if *state != ActiveOp::Idle {
            return None;
        }
        *state = op;
        Some(OpGuard {
            gate: Arc::clone(self),
        })
    }

    pub(crate) fn current(&self) -> ActiveOp {
        *self.state.lock()
    }
}

pub(crate) struct OpGuard {
    gate: Arc<OpGate>,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        *self.gate.state.lock() = ActiveOp::Idle;
    }
}

/// One status snapshot for operator surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub run_state: RunState,
    pub next_run_time: Option<DateTime<Local>>,
    pub is_cancelling: bool,
    pub active_op: ActiveOp,
    pub progress: Option<ProgressState>,
}

/// Owner of all orchestration state. One instance exists per process and is
/// passed by handle to every consumer.
pub struct Orchestrator {
    events: EventBus,
    journal: Arc<Journal>,
    tracker: Arc<ProgressTracker>,
    config_store: Arc<dyn ConfigStore>,
    history: Arc<dyn HistoryStore>,
    scheduler: Arc<Scheduler>,
    executor: Arc<ScanExecutor>,
    dispatcher: Arc<DeployDispatcher>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        events: EventBus,
        config_store: Arc<dyn ConfigStore>,
        history: Arc<dyn HistoryStore>,
        scanner: Arc<dyn ArtifactScanner>,
        transport: Arc<dyn DeployTransport>,
    ) -> Arc<Self> {
        let journal = Arc::new(Journal::new());
        let tracker = Arc::new(ProgressTracker::new());
        let gate = OpGate::new();

        let dispatcher = Arc::new(DeployDispatcher::new(
            transport,
            Arc::clone(&journal),
            Arc::clone(&history),
            Arc::clone(&gate),
        ));
        let executor = Arc::new(ScanExecutor::new(
            Arc::clone(&config_store),
            scanner,
            Arc::clone(&dispatcher),
            Arc::clone(&history),
            Arc::clone(&journal),
            Arc::clone(&tracker),
            gate,
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&config_store),
            Arc::clone(&history),
            Arc::clone(&journal),
            Arc::clone(&executor),
        ));

        Arc::new(Self {
            events,
            journal,
            tracker,
            config_store,
            history,
            scheduler,
            executor,
            dispatcher,
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn the consumer tasks that fold collaborator event streams into the
    /// progress snapshot and the journal. Call once at startup.
    pub fn spawn_event_pumps(self: &Arc<Self>) {
        let tracker = Arc::clone(&self.tracker);
        let mut progress_rx = self.events.subscribe_progress();
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = progress_rx.recv() => match event {
                        Ok(event) => tracker.apply(event),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        let journal = Arc::clone(&self.journal);
        let mut log_rx = self.events.subscribe_log();
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = log_rx.recv() => match event {
                        Ok(event) => journal.insert(event.level, event.msg),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    pub async fn get_config(&self) -> Result<AppConfig> {
        self.config_store.load().await
    }

    /// Persist a new configuration.
    ///
    /// Returns `Ok(false)` when the configuration is identical to the stored
    /// one, in which case nothing is written and no event is recorded. A real
    /// change is journaled, recorded as CONFIG_CHANGE, and — when the
    /// scheduler is running and the interval changed — hot-applied to the
    /// timer without triggering an immediate scan.
    pub async fn update_config(&self, new: AppConfig) -> Result<bool> {
        let old = self.config_store.load().await?;
        if old == new {
            return Ok(false);
        }
        self.config_store.save(&new).await?;

        let description = AppConfig::describe_changes(&old, &new);
        self.journal
            .info(format!("Configuration updated: {}", description));
        self.history
            .record(history::actions::CONFIG_CHANGE, &description)
            .await;

        if old.interval_minutes != new.interval_minutes {
            self.scheduler.silent_restart(new.interval_minutes);
        }
        Ok(true)
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    pub async fn pause(&self) {
        self.scheduler.pause().await;
    }

    pub async fn resume(&self) {
        self.scheduler.resume().await;
    }

    /// Trigger one scan cycle without waiting for it.
    pub fn trigger_scan(&self) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            executor.execute().await;
        });
    }

    /// Run one scan cycle to completion.
    pub async fn run_scan(&self) {
        self.executor.execute().await;
    }

    /// Advisory cancel of the in-flight scan cycle.
    pub fn cancel_scan(&self) {
        self.executor.cancel();
    }

    /// Connectivity check against one configured server.
    pub async fn test_server(&self, server_id: &str) -> Result<String> {
        let config = self.config_store.load().await?;
        let server = config
            .servers
            .iter()
            .find(|s| s.id == server_id)
            .ok_or_else(|| Error::validation(format!("unknown server id '{}'", server_id)))?;
        self.dispatcher.test_connection(server).await
    }

    /// Connectivity check against every enabled server; fail-soft.
    pub async fn test_all(&self) -> Result<Vec<String>> {
        let config = self.config_store.load().await?;
        Ok(self.dispatcher.test_all(&config.servers).await)
    }

    /// Manual deploy fan-out. `selection` is either `"all"` or one server id.
    pub async fn manual_deploy(
        &self,
        selection: &str,
        local_path: &str,
        remote_path: &str,
    ) -> Result<DeployReport> {
        let config = self.config_store.load().await?;
        self.dispatcher
            .deploy(&config, selection, local_path, remote_path)
            .await
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            run_state: self.scheduler.run_state(),
            next_run_time: self.scheduler.next_run_time(),
            is_cancelling: self.executor.is_cancelling(),
            active_op: self.executor.active_op(),
            progress: self.tracker.current(),
        }
    }

    pub fn journal_entries(&self) -> Vec<JournalEntry> {
        self.journal.snapshot()
    }

    pub fn clear_journal(&self) {
        self.journal.clear();
    }

    pub async fn history(&self) -> Result<HistoryLog> {
        self.history.load().await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.history.clear().await
    }

    /// Stop the scheduler and the event pumps.
    pub async fn shutdown(&self) {
        info!("Orchestrator shutting down");
        self.scheduler.stop().await;
        self.shutdown.cancel();
    }
}
