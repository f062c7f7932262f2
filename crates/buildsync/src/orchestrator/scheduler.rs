//! Recurring-timer state machine driving the scan executor.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigStore, MIN_INTERVAL_MINUTES};
use crate::error::Result;
use crate::history::{self, HistoryStore};
use crate::journal::Journal;
use crate::orchestrator::executor::ScanExecutor;

/// Public scheduler state. Paused is derived: the timer keeps ticking while
/// the in-flight copy is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

struct SchedulerInner {
    running: bool,
    timer: Option<CancellationToken>,
    next_run_time: Option<DateTime<Local>>,
}

/// Owns the Stopped/Running state, the cancellable recurring timer, and the
/// advisory pause/resume forwarding.
pub struct Scheduler {
    config_store: Arc<dyn ConfigStore>,
    history: Arc<dyn HistoryStore>,
    journal: Arc<Journal>,
    executor: Arc<ScanExecutor>,
    inner: Mutex<SchedulerInner>,
}

impl Scheduler {
    pub(crate) fn new(
        config_store: Arc<dyn ConfigStore>,
        history: Arc<dyn HistoryStore>,
        journal: Arc<Journal>,
        executor: Arc<ScanExecutor>,
    ) -> Self {
        Self {
            config_store,
            history,
            journal,
            executor,
            inner: Mutex::new(SchedulerInner {
                running: false,
                timer: None,
                next_run_time: None,
            }),
        }
    }

    /// Start the recurring timer and trigger one immediate scan.
    ///
    /// A no-op while already running. A configuration load failure aborts the
    /// transition and leaves the scheduler stopped.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.running {
                return Ok(());
            }
            inner.running = true;
        }

        let config = match self.config_store.load().await {
            Ok(config) => config,
            Err(e) => {
                self.inner.lock().running = false;
                self.journal
                    .error(format!("Scheduler start aborted, config unavailable: {}", e));
                return Err(e);
            }
        };

        let interval = config.interval_minutes.max(MIN_INTERVAL_MINUTES);
        // A stop() may have landed while the config load was in flight; the
        // installation re-checks `running` under the lock and backs off.
        if !self.spawn_timer(interval) {
            return Ok(());
        }
        self.journal.info(format!(
            "Scheduler started, scanning every {} minutes",
            interval
        ));
        self.history
            .record(
                history::actions::SCHEDULER_START,
                &format!("Interval: {} minutes", interval),
            )
            .await;

        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            executor.execute().await;
        });
        Ok(())
    }

    /// Replace the timer with one built from the new interval, without an
    /// immediate run. Used to hot-apply an interval change while running.
    pub fn silent_restart(self: &Arc<Self>, interval_minutes: u64) {
        let interval = interval_minutes.max(MIN_INTERVAL_MINUTES);
        if !self.spawn_timer(interval) {
            return;
        }
        self.journal.info(format!(
            "Scheduler interval updated to {} minutes",
            interval
        ));
    }

    /// Cancel the timer and return to Stopped. A no-op while stopped.
    pub async fn stop(&self) {
        {
            let mut inner = self.inner.lock();
            if !inner.running {
                return;
            }
            inner.running = false;
            if let Some(token) = inner.timer.take() {
                token.cancel();
            }
            inner.next_run_time = None;
        }
        self.journal.info("Scheduler stopped");
        self.history
            .record(history::actions::SCHEDULER_STOP, "Scheduler stopped")
            .await;
    }

    /// Advisory pause of the in-flight copy. Gated on the current flag so a
    /// repeated pause emits no duplicate audit event.
    pub async fn pause(&self) {
        if !self.executor.set_paused(true) {
            return;
        }
        let folder = self
            .executor
            .active_folder()
            .unwrap_or_else(|| "(no active copy)".to_string());
        self.journal.info(format!("Paused: {}", folder));
        self.history
            .record(history::actions::PAUSE, &format!("Paused copy of {}", folder))
            .await;
    }

    /// Advisory resume; mirror of [`pause`](Self::pause).
    pub async fn resume(&self) {
        if !self.executor.set_paused(false) {
            return;
        }
        let folder = self
            .executor
            .active_folder()
            .unwrap_or_else(|| "(no active copy)".to_string());
        self.journal.info(format!("Resumed: {}", folder));
        self.history
            .record(
                history::actions::RESUME,
                &format!("Resumed copy of {}", folder),
            )
            .await;
    }

    pub fn run_state(&self) -> RunState {
        if !self.inner.lock().running {
            RunState::Stopped
        } else if self.executor.is_paused() {
            RunState::Paused
        } else {
            RunState::Running
        }
    }

    pub fn next_run_time(&self) -> Option<DateTime<Local>> {
        self.inner.lock().next_run_time
    }

    /// Install a fresh cancellable timer task, tearing down any previous one.
    /// Ticks that fire while a cycle is still running are dropped by the
    /// executor's gate (skip-if-busy).
    ///
    /// The `running` flag is re-checked under the same lock as the
    /// installation, so a timer can never outlive a concurrent `stop()`.
    /// Returns false when the scheduler is no longer running.
    fn spawn_timer(self: &Arc<Self>, interval_minutes: u64) -> bool {
        let token = CancellationToken::new();
        let period = Duration::from_secs(interval_minutes * 60);
        let chrono_period =
            ChronoDuration::from_std(period).unwrap_or_else(|_| ChronoDuration::zero());

        {
            let mut inner = self.inner.lock();
            if !inner.running {
                return false;
            }
            if let Some(old) = inner.timer.take() {
                old.cancel();
            }
            inner.timer = Some(token.clone());
            inner.next_run_time = Some(Local::now() + chrono_period);
        }

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(period) => {
                        scheduler.inner.lock().next_run_time = Some(Local::now() + chrono_period);
                        let executor = Arc::clone(&scheduler.executor);
                        tokio::spawn(async move {
                            executor.execute().await;
                        });
                    }
                }
            }
        });
        true
    }
}
