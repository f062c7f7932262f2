//! End-to-end orchestrator behavior against in-memory fake collaborators.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};
use parking_lot::Mutex;
use tokio::sync::Notify;

use buildsync::config::{AppConfig, ConfigStore, DeployServer};
use buildsync::deploy::DeployTransport;
use buildsync::error::{Error, Result};
use buildsync::events::EventBus;
use buildsync::history::{self, HistoryEntry, HistoryLog, HistoryStore};
use buildsync::journal::JournalLevel;
use buildsync::orchestrator::{ActiveOp, Orchestrator, RunState};
use buildsync::scanner::{ArtifactScanner, CopyDetail, ScanResult};

struct MemConfigStore {
    config: Mutex<AppConfig>,
    fail_load: AtomicBool,
    load_gate: Mutex<Option<Arc<Notify>>>,
}

impl MemConfigStore {
    fn new(config: AppConfig) -> Self {
        Self {
            config: Mutex::new(config),
            fail_load: AtomicBool::new(false),
            load_gate: Mutex::new(None),
        }
    }

    /// Park the next `load` calls until the notify fires.
    fn gate_loads(&self, gate: Arc<Notify>) {
        *self.load_gate.lock() = Some(gate);
    }
}

#[async_trait]
impl ConfigStore for MemConfigStore {
    async fn load(&self) -> Result<AppConfig> {
        let gate = self.load_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(Error::config("store offline"));
        }
        Ok(self.config.lock().clone())
    }

    async fn save(&self, config: &AppConfig) -> Result<()> {
        config.validate()?;
        *self.config.lock() = config.clone();
        Ok(())
    }
}

#[derive(Default)]
struct MemHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemHistoryStore {
    fn count(&self, action: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.action_type == action)
            .count()
    }
}

#[async_trait]
impl HistoryStore for MemHistoryStore {
    async fn add(&self, entry: HistoryEntry) {
        self.entries.lock().insert(0, entry);
    }

    async fn load(&self) -> Result<HistoryLog> {
        Ok(HistoryLog {
            entries: self.entries.lock().clone(),
        })
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

struct FakeScanner {
    result: Mutex<ScanResult>,
    calls: AtomicUsize,
    release: Option<Arc<Notify>>,
    cancelled: AtomicBool,
}

impl FakeScanner {
    fn new(result: ScanResult) -> Self {
        Self {
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
            release: None,
            cancelled: AtomicBool::new(false),
        }
    }

    fn gated(result: ScanResult, release: Arc<Notify>) -> Self {
        Self {
            release: Some(release),
            ..Self::new(result)
        }
    }
}

#[async_trait]
impl ArtifactScanner for FakeScanner {
    async fn scan_and_copy(&self, _config: &AppConfig) -> Result<ScanResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(release) = &self.release {
            release.notified().await;
        }
        Ok(self.result.lock().clone())
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(release) = &self.release {
            release.notify_one();
        }
    }

    fn pause(&self) {}
    fn resume(&self) {}
}

struct FakeTransport {
    fail_ids: HashSet<String>,
    deploys: Mutex<Vec<String>>,
    tests: Mutex<Vec<String>>,
    release: Option<Arc<Notify>>,
}

impl FakeTransport {
    fn new() -> Self {
        Self {
            fail_ids: HashSet::new(),
            deploys: Mutex::new(vec![]),
            tests: Mutex::new(vec![]),
            release: None,
        }
    }

    fn failing(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::new()
        }
    }

    fn gated(release: Arc<Notify>) -> Self {
        Self {
            release: Some(release),
            ..Self::new()
        }
    }

    fn outcome(&self, server: &DeployServer) -> Result<()> {
        if self.fail_ids.contains(&server.id) {
            Err(Error::ssh(format!("unreachable: {}", server.host)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeployTransport for FakeTransport {
    async fn test_connection(&self, server: &DeployServer) -> Result<String> {
        self.tests.lock().push(server.id.clone());
        self.outcome(server)
            .map(|_| format!("Connected to {}", server.name))
    }

    async fn deploy(
        &self,
        server: &DeployServer,
        _post_commands: &[String],
        _local_path: &str,
        _remote_path: &str,
    ) -> Result<()> {
        if let Some(release) = &self.release {
            release.notified().await;
        }
        self.deploys.lock().push(server.id.clone());
        self.outcome(server)
    }

    async fn deploy_folder(
        &self,
        server: &DeployServer,
        _post_commands: &[String],
        _local_folder: &Path,
        folder_name: &str,
    ) -> Result<()> {
        self.deploys
            .lock()
            .push(format!("{}:{}", server.id, folder_name));
        self.outcome(server)
    }
}

fn server(id: &str, enabled: bool) -> DeployServer {
    DeployServer {
        id: id.to_string(),
        enabled,
        name: format!("srv-{}", id),
        host: "10.0.0.1".to_string(),
        port: 22,
        user: "deploy".to_string(),
        password: "pw".to_string(),
        remote_path: "/opt/app".to_string(),
    }
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    config_store: Arc<MemConfigStore>,
    history: Arc<MemHistoryStore>,
    scanner: Arc<FakeScanner>,
    transport: Arc<FakeTransport>,
    events: EventBus,
}

fn harness_with(config: AppConfig, scanner: FakeScanner, transport: FakeTransport) -> Harness {
    let events = EventBus::new();
    let config_store = Arc::new(MemConfigStore::new(config));
    let history = Arc::new(MemHistoryStore::default());
    let scanner = Arc::new(scanner);
    let transport = Arc::new(transport);
    let orchestrator = Orchestrator::new(
        events.clone(),
        Arc::clone(&config_store) as Arc<dyn ConfigStore>,
        Arc::clone(&history) as Arc<dyn HistoryStore>,
        Arc::clone(&scanner) as Arc<dyn ArtifactScanner>,
        Arc::clone(&transport) as Arc<dyn DeployTransport>,
    );
    Harness {
        orchestrator,
        config_store,
        history,
        scanner,
        transport,
        events,
    }
}

fn harness(config: AppConfig) -> Harness {
    harness_with(config, FakeScanner::new(ScanResult::default()), FakeTransport::new())
}

fn journal_contains(h: &Harness, needle: &str) -> bool {
    h.orchestrator
        .journal_entries()
        .iter()
        .any(|e| e.msg.contains(needle))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn start_triggers_immediate_scan_and_is_idempotent() {
    let h = harness(AppConfig {
        interval_minutes: 10,
        ..Default::default()
    });

    h.orchestrator.start().await.unwrap();
    settle().await;

    assert_eq!(h.scanner.calls.load(Ordering::SeqCst), 1);
    let status = h.orchestrator.status();
    assert_eq!(status.run_state, RunState::Running);
    let next = status.next_run_time.expect("next run time must be set");
    assert!(next > Local::now() + ChronoDuration::minutes(9));
    assert!(next <= Local::now() + ChronoDuration::minutes(10));

    // Second start before the next tick: no second timer, no second scan.
    h.orchestrator.start().await.unwrap();
    settle().await;
    assert_eq!(h.scanner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.history.count(history::actions::SCHEDULER_START), 1);
    assert_eq!(h.orchestrator.status().run_state, RunState::Running);
}

#[tokio::test]
async fn start_aborts_when_config_unavailable() {
    let h = harness(AppConfig::default());
    h.config_store.fail_load.store(true, Ordering::SeqCst);

    assert!(h.orchestrator.start().await.is_err());
    assert_eq!(h.orchestrator.status().run_state, RunState::Stopped);
    assert!(journal_contains(&h, "config unavailable"));
    assert_eq!(h.history.count(history::actions::SCHEDULER_START), 0);
    assert_eq!(h.scanner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stop_while_stopped_is_a_noop() {
    let h = harness(AppConfig::default());
    h.orchestrator.stop().await;

    assert!(h.orchestrator.journal_entries().is_empty());
    assert_eq!(h.history.count(history::actions::SCHEDULER_STOP), 0);
}

#[tokio::test]
async fn stop_clears_timer_state() {
    let h = harness(AppConfig::default());
    h.orchestrator.start().await.unwrap();
    h.orchestrator.stop().await;

    let status = h.orchestrator.status();
    assert_eq!(status.run_state, RunState::Stopped);
    assert!(status.next_run_time.is_none());
    assert_eq!(h.history.count(history::actions::SCHEDULER_STOP), 1);
}

#[tokio::test]
async fn stop_during_start_leaves_no_timer_behind() {
    let release = Arc::new(Notify::new());
    let h = harness(AppConfig::default());
    h.config_store.gate_loads(Arc::clone(&release));

    // start() flips to Running, then parks on the config load.
    let orchestrator = Arc::clone(&h.orchestrator);
    let start = tokio::spawn(async move { orchestrator.start().await });
    settle().await;
    assert_eq!(h.orchestrator.status().run_state, RunState::Running);

    h.orchestrator.stop().await;

    release.notify_one();
    start.await.unwrap().unwrap();
    settle().await;

    // The resumed start() must not install a timer over the stop.
    let status = h.orchestrator.status();
    assert_eq!(status.run_state, RunState::Stopped);
    assert!(status.next_run_time.is_none());
    assert_eq!(h.scanner.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.history.count(history::actions::SCHEDULER_START), 0);
}

#[tokio::test]
async fn repeated_pause_emits_a_single_audit_event() {
    let h = harness(AppConfig::default());
    h.orchestrator.start().await.unwrap();

    h.orchestrator.pause().await;
    h.orchestrator.pause().await;
    assert_eq!(h.history.count(history::actions::PAUSE), 1);
    assert_eq!(h.orchestrator.status().run_state, RunState::Paused);

    h.orchestrator.resume().await;
    h.orchestrator.resume().await;
    assert_eq!(h.history.count(history::actions::RESUME), 1);
    assert_eq!(h.orchestrator.status().run_state, RunState::Running);
}

#[tokio::test]
async fn deploy_dispatches_to_enabled_servers_and_isolates_failures() {
    let config = AppConfig {
        servers: vec![server("a", true), server("b", false), server("c", true)],
        ..Default::default()
    };
    let h = harness_with(
        config,
        FakeScanner::new(ScanResult::default()),
        FakeTransport::failing(&["c"]),
    );

    let report = h
        .orchestrator
        .manual_deploy("all", "/local/build", "/remote/app")
        .await
        .unwrap();

    assert_eq!(report.success_count, 1);
    assert_eq!(report.fail_count, 1);
    assert_eq!(*h.transport.deploys.lock(), vec!["a", "c"]);
    // Aggregate success event only on a clean run.
    assert_eq!(h.history.count(history::actions::MANUAL_DEPLOY), 0);
    assert!(journal_contains(&h, "[srv-c] Deployment failed"));
    assert!(journal_contains(&h, "1 succeeded, 1 failed"));
}

#[tokio::test]
async fn clean_deploy_records_one_aggregate_event() {
    let config = AppConfig {
        servers: vec![server("a", true), server("b", true)],
        ..Default::default()
    };
    let h = harness_with(config, FakeScanner::new(ScanResult::default()), FakeTransport::new());

    let report = h
        .orchestrator
        .manual_deploy("all", "/local/build", "/remote/app")
        .await
        .unwrap();

    assert_eq!(report.success_count, 2);
    assert_eq!(report.fail_count, 0);
    assert_eq!(h.history.count(history::actions::MANUAL_DEPLOY), 1);
}

#[tokio::test]
async fn deploy_preconditions_are_silent_noops() {
    let config = AppConfig {
        servers: vec![server("a", true)],
        ..Default::default()
    };
    let h = harness(config);

    // Empty local path.
    let report = h
        .orchestrator
        .manual_deploy("all", "", "/remote/app")
        .await
        .unwrap();
    assert_eq!(report.success_count + report.fail_count, 0);

    // Selection matching no server id.
    let report = h
        .orchestrator
        .manual_deploy("missing-id", "/local", "/remote")
        .await
        .unwrap();
    assert_eq!(report.success_count + report.fail_count, 0);

    assert!(h.transport.deploys.lock().is_empty());
    assert!(!journal_contains(&h, "Starting manual deployment"));
}

#[tokio::test]
async fn scan_is_refused_while_deploy_is_in_flight() {
    let release = Arc::new(Notify::new());
    let config = AppConfig {
        servers: vec![server("a", true)],
        ..Default::default()
    };
    let h = harness_with(
        config,
        FakeScanner::new(ScanResult::default()),
        FakeTransport::gated(Arc::clone(&release)),
    );

    let orchestrator = Arc::clone(&h.orchestrator);
    let deploy = tokio::spawn(async move {
        orchestrator.manual_deploy("all", "/local", "/remote").await
    });
    settle().await;

    h.orchestrator.run_scan().await;
    assert_eq!(h.scanner.calls.load(Ordering::SeqCst), 0);
    assert!(journal_contains(&h, "Scan refused: a deployment is in progress"));

    release.notify_one();
    let report = deploy.await.unwrap().unwrap();
    assert_eq!(report.success_count, 1);
}

#[tokio::test]
async fn deploy_is_refused_while_scan_is_in_flight() {
    let release = Arc::new(Notify::new());
    let config = AppConfig {
        servers: vec![server("a", true)],
        ..Default::default()
    };
    let h = harness_with(
        config,
        FakeScanner::gated(ScanResult::default(), Arc::clone(&release)),
        FakeTransport::new(),
    );

    let orchestrator = Arc::clone(&h.orchestrator);
    let scan = tokio::spawn(async move { orchestrator.run_scan().await });
    settle().await;

    let result = h.orchestrator.manual_deploy("all", "/local", "/remote").await;
    assert!(matches!(result, Err(Error::Busy(_))));
    assert!(h.transport.deploys.lock().is_empty());
    assert!(journal_contains(&h, "Deploy refused"));

    release.notify_one();
    scan.await.unwrap();
}

#[tokio::test]
async fn cancel_resets_transient_state_after_settlement() {
    let release = Arc::new(Notify::new());
    let h = harness_with(
        AppConfig::default(),
        FakeScanner::gated(ScanResult::default(), Arc::clone(&release)),
        FakeTransport::new(),
    );

    let orchestrator = Arc::clone(&h.orchestrator);
    let scan = tokio::spawn(async move { orchestrator.run_scan().await });
    settle().await;
    assert_eq!(h.orchestrator.status().active_op, ActiveOp::Scanning);

    // Advisory cancel releases the gated fake scanner; the executor still
    // awaits the call's natural settlement before cleaning up.
    h.orchestrator.cancel_scan();
    scan.await.unwrap();
    settle().await;

    let status = h.orchestrator.status();
    assert!(!status.is_cancelling);
    assert!(status.progress.is_none());
    assert_eq!(status.active_op, ActiveOp::Idle);
    assert!(h.scanner.cancelled.load(Ordering::SeqCst));
    assert_eq!(h.history.count(history::actions::CANCEL), 1);
}

#[tokio::test]
async fn cancel_while_idle_is_ignored() {
    let result = ScanResult {
        scanned_paths: 1,
        found_folders: vec!["f1".to_string()],
        copied_folders: vec!["f1".to_string()],
        errors: vec![],
        copy_details: vec![],
    };
    let config = AppConfig {
        deploy_enabled: true,
        servers: vec![server("a", true)],
        ..Default::default()
    };
    let h = harness_with(config, FakeScanner::new(result), FakeTransport::new());

    // No scan in flight: the cancel must not latch.
    h.orchestrator.cancel_scan();
    assert!(!h.orchestrator.status().is_cancelling);
    assert!(!h.scanner.cancelled.load(Ordering::SeqCst));

    // The next cycle runs clean: auto-deploy happens, no CANCEL is recorded.
    h.orchestrator.run_scan().await;
    assert_eq!(h.history.count(history::actions::CANCEL), 0);
    assert_eq!(*h.transport.deploys.lock(), vec!["a:f1"]);
}

#[tokio::test]
async fn successful_scan_auto_deploys_copied_folders() {
    let result = ScanResult {
        scanned_paths: 1,
        found_folders: vec!["f1".to_string()],
        copied_folders: vec!["f1".to_string()],
        errors: vec![],
        copy_details: vec![CopyDetail {
            folder: "f1".to_string(),
            source_path: "/mnt/builds/f1".to_string(),
            target_path: "/srv/artifacts/f1".to_string(),
            files_count: 3,
            total_bytes: 999,
            files: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        }],
    };
    let config = AppConfig {
        deploy_enabled: true,
        servers: vec![server("a", true), server("b", false)],
        ..Default::default()
    };
    let h = harness_with(config, FakeScanner::new(result), FakeTransport::new());

    h.orchestrator.run_scan().await;

    assert_eq!(*h.transport.deploys.lock(), vec!["a:f1"]);
    assert_eq!(h.history.count(history::actions::COPY), 1);
    assert!(journal_contains(&h, "Copied: f1"));
    assert!(journal_contains(&h, "1 paths scanned, 1 found, 1 copied"));
}

#[tokio::test]
async fn config_update_detects_changes_and_hot_applies_interval() {
    let h = harness(AppConfig {
        interval_minutes: 10,
        ..Default::default()
    });
    h.orchestrator.start().await.unwrap();

    // Saving an identical config records nothing.
    let unchanged = h.orchestrator.get_config().await.unwrap();
    assert!(!h.orchestrator.update_config(unchanged).await.unwrap());
    assert_eq!(h.history.count(history::actions::CONFIG_CHANGE), 0);

    let mut changed = h.orchestrator.get_config().await.unwrap();
    changed.interval_minutes = 30;
    assert!(h.orchestrator.update_config(changed).await.unwrap());
    assert_eq!(h.history.count(history::actions::CONFIG_CHANGE), 1);
    assert!(journal_contains(&h, "Scheduler interval updated to 30 minutes"));

    // Hot apply replaces the timer without an extra immediate scan.
    settle().await;
    assert_eq!(h.scanner.calls.load(Ordering::SeqCst), 1);
    let next = h.orchestrator.status().next_run_time.unwrap();
    assert!(next > Local::now() + ChronoDuration::minutes(29));
}

#[tokio::test]
async fn event_pumps_feed_progress_and_journal() {
    let h = harness(AppConfig::default());
    h.orchestrator.spawn_event_pumps();

    h.events
        .publish_log(JournalLevel::Success, "collaborator says hi");
    h.events.publish_progress(buildsync::events::ProgressEvent {
        folder: "f1".to_string(),
        total_bytes: 100,
        copied_bytes: 50,
        percentage: 50,
        speed_bps: 10,
        eta_seconds: Some(5),
        elapsed_seconds: 5,
        local_path: None,
        remote_path: None,
    });
    settle().await;

    assert!(journal_contains(&h, "collaborator says hi"));
    let progress = h.orchestrator.status().progress.expect("progress snapshot");
    assert_eq!(progress.folder, "f1");
    assert_eq!(progress.percentage, 50);
}

#[tokio::test]
async fn test_all_reports_per_server_and_continues_past_failures() {
    let config = AppConfig {
        servers: vec![server("a", true), server("b", false), server("c", true)],
        ..Default::default()
    };
    let h = harness_with(
        config,
        FakeScanner::new(ScanResult::default()),
        FakeTransport::failing(&["a"]),
    );

    let report = h.orchestrator.test_all().await.unwrap();
    assert_eq!(report.len(), 2);
    assert!(report[0].starts_with("srv-a: Failed"));
    assert_eq!(report[1], "srv-c: OK");
    assert_eq!(*h.transport.tests.lock(), vec!["a", "c"]);
}
