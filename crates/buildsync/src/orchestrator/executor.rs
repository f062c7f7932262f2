//! Single-flight scan/copy execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::config::ConfigStore;
use crate::history::{self, HistoryEntry, HistoryStore};
use crate::journal::Journal;
use crate::orchestrator::dispatcher::DeployDispatcher;
use crate::orchestrator::{ActiveOp, OpGate};
use crate::progress::ProgressTracker;
use crate::scanner::ArtifactScanner;

/// Runs one scan/copy cycle end-to-end.
///
/// Execution is single-flight through the operation gate, and every exit path
/// runs the cleanup guard that drops the progress snapshot and resets the
/// transient pause/cancel flags, so no stale in-flight state can survive a
/// cycle.
pub struct ScanExecutor {
    config_store: Arc<dyn ConfigStore>,
    scanner: Arc<dyn ArtifactScanner>,
    dispatcher: Arc<DeployDispatcher>,
    history: Arc<dyn HistoryStore>,
    journal: Arc<Journal>,
    tracker: Arc<ProgressTracker>,
    gate: Arc<OpGate>,
    cancelling: AtomicBool,
    paused: AtomicBool,
}

/// Unconditional cleanup on every scan exit route.
struct CleanupGuard<'a> {
    executor: &'a ScanExecutor,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.executor.tracker.clear();
        self.executor.cancelling.store(false, Ordering::SeqCst);
        self.executor.paused.store(false, Ordering::SeqCst);
    }
}

impl ScanExecutor {
    pub(crate) fn new(
        config_store: Arc<dyn ConfigStore>,
        scanner: Arc<dyn ArtifactScanner>,
        dispatcher: Arc<DeployDispatcher>,
        history: Arc<dyn HistoryStore>,
        journal: Arc<Journal>,
        tracker: Arc<ProgressTracker>,
        gate: Arc<OpGate>,
    ) -> Self {
        Self {
            config_store,
            scanner,
            dispatcher,
            history,
            journal,
            tracker,
            gate,
            cancelling: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    /// Run one scan/copy cycle.
    ///
    /// Refused with a journal error while a manual deployment is in progress;
    /// silently dropped (debug trace only) when another cycle is already in
    /// flight, which is how timer ticks skip a busy system.
    pub async fn execute(&self) {
        let _op = match self.gate.try_begin(ActiveOp::Scanning) {
            Some(guard) => guard,
            None => {
                if self.gate.current() == ActiveOp::Deploying {
                    self.journal
                        .error("Scan refused: a deployment is in progress");
                } else {
                    debug!("scan cycle already in flight, trigger dropped");
                }
                return;
            }
        };
        let _cleanup = CleanupGuard { executor: self };

        let config = match self.config_store.load().await {
            Ok(config) => config,
            Err(e) => {
                self.journal
                    .error(format!("Scan aborted, configuration unavailable: {}", e));
                return;
            }
        };

        self.journal.info("Scan cycle running...");
        match self.scanner.scan_and_copy(&config).await {
            Ok(result) => {
                self.journal.info(format!(
                    "Scan finished: {} paths scanned, {} found, {} copied",
                    result.scanned_paths,
                    result.found_folders.len(),
                    result.copied_folders.len()
                ));
                for folder in &result.found_folders {
                    self.journal.info(format!("Found: {}", folder));
                }
                for folder in &result.copied_folders {
                    self.journal.success(format!("Copied: {}", folder));
                }
                for error in &result.errors {
                    self.journal.error(error.clone());
                }

                for detail in &result.copy_details {
                    self.history
                        .add(HistoryEntry::copy_event(
                            &detail.folder,
                            &detail.source_path,
                            &detail.target_path,
                            detail.files_count,
                            detail.total_bytes,
                            detail.files.clone(),
                        ))
                        .await;
                }

                if self.cancelling.load(Ordering::SeqCst) {
                    self.history
                        .record(history::actions::CANCEL, "Scan cycle cancelled")
                        .await;
                } else if config.deploy_enabled && !result.copied_folders.is_empty() {
                    self.dispatcher
                        .auto_deploy(&config, &result.copied_folders)
                        .await;
                }
            }
            Err(e) => {
                self.journal.error(format!("Scan failed: {}", e));
            }
        }
    }

    /// Advisory cancel: mark the cycle as cancelling and signal the scanner.
    /// The in-flight call is still awaited to its natural settlement; the
    /// cleanup guard is the sole authority that resets the flag.
    ///
    /// Ignored while no scan cycle owns the gate, so an idle cancel cannot
    /// latch the flag and taint the next cycle.
    pub fn cancel(&self) {
        if self.gate.current() != ActiveOp::Scanning {
            return;
        }
        if self.cancelling.swap(true, Ordering::SeqCst) {
            return;
        }
        self.journal.info("Cancelling current scan...");
        self.scanner.cancel();
    }

    /// Toggle the advisory pause flag, forwarding the signal to the scanner.
    /// Returns false when the flag already had the requested value, so
    /// repeated requests do not emit duplicate audit events.
    pub fn set_paused(&self, paused: bool) -> bool {
        if self
            .paused
            .compare_exchange(!paused, paused, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        if paused {
            self.scanner.pause();
        } else {
            self.scanner.resume();
        }
        true
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancelling.load(Ordering::SeqCst)
    }

    pub fn active_op(&self) -> ActiveOp {
        self.gate.current()
    }

    /// Folder named by the current progress snapshot, if any.
    pub fn active_folder(&self) -> Option<String> {
        self.tracker.current().map(|p| p.folder)
    }
}
