//! Multi-target deployment dispatcher with partial-failure semantics.

use std::path::Path;
use std::sync::Arc;

use crate::config::{AppConfig, DeployServer};
use crate::deploy::{DeployReport, DeployTransport};
use crate::error::{Error, Result};
use crate::history::{self, HistoryStore};
use crate::journal::Journal;
use crate::orchestrator::{ActiveOp, OpGate};

/// Fans a deploy operation out across targets, isolating per-target failures:
/// one target's failure never prevents attempts on the remaining targets.
pub struct DeployDispatcher {
    transport: Arc<dyn DeployTransport>,
    journal: Arc<Journal>,
    history: Arc<dyn HistoryStore>,
    gate: Arc<OpGate>,
}

impl DeployDispatcher {
    pub(crate) fn new(
        transport: Arc<dyn DeployTransport>,
        journal: Arc<Journal>,
        history: Arc<dyn HistoryStore>,
        gate: Arc<OpGate>,
    ) -> Self {
        Self {
            transport,
            journal,
            history,
            gate,
        }
    }

    /// One connectivity check.
    pub async fn test_connection(&self, server: &DeployServer) -> Result<String> {
        self.transport.test_connection(server).await
    }

    /// Fail-soft connectivity check over the enabled servers, producing one
    /// report line per server.
    pub async fn test_all(&self, servers: &[DeployServer]) -> Vec<String> {
        let mut report = Vec::new();
        for server in servers.iter().filter(|s| s.enabled) {
            match self.transport.test_connection(server).await {
                Ok(_) => report.push(format!("{}: OK", server.name)),
                Err(e) => report.push(format!("{}: Failed ({})", server.name, e)),
            }
        }
        report
    }

    /// Manual deploy fan-out.
    ///
    /// `selection` resolves to a target set: the literal `"all"` expands to
    /// every enabled server, anything else must exactly match a server id.
    /// Empty paths or an empty target set return without side effects. The
    /// dispatcher refuses to run while a scan cycle is in flight.
    pub async fn deploy(
        &self,
        config: &AppConfig,
        selection: &str,
        local_path: &str,
        remote_path: &str,
    ) -> Result<DeployReport> {
        let _op = match self.gate.try_begin(ActiveOp::Deploying) {
            Some(guard) => guard,
            None => {
                self.journal
                    .error("Deploy refused: another operation is in progress");
                return Err(Error::busy("scan or deploy already running"));
            }
        };

        if local_path.is_empty() || remote_path.is_empty() {
            return Ok(DeployReport::default());
        }
        let targets = resolve_targets(&config.servers, selection);
        if targets.is_empty() {
            return Ok(DeployReport::default());
        }

        self.journal.info(format!(
            "Starting manual deployment of {} to {} server(s)",
            local_path,
            targets.len()
        ));

        let mut report = DeployReport::default();
        for server in targets {
            match self
                .transport
                .deploy(server, &config.post_commands, local_path, remote_path)
                .await
            {
                Ok(()) => {
                    report.success_count += 1;
                    self.journal
                        .success(format!("[{}] Deployment successful", server.name));
                }
                Err(e) => {
                    report.fail_count += 1;
                    self.journal
                        .error(format!("[{}] Deployment failed: {}", server.name, e));
                }
            }
        }

        if report.is_success() {
            self.journal.success(format!(
                "Manual deployment complete: {} server(s)",
                report.success_count
            ));
            self.history
                .record(
                    history::actions::MANUAL_DEPLOY,
                    &format!(
                        "Deployed {} to {} server(s)",
                        local_path, report.success_count
                    ),
                )
                .await;
        } else {
            self.journal.error(format!(
                "Manual deployment finished: {} succeeded, {} failed",
                report.success_count, report.fail_count
            ));
        }
        Ok(report)
    }

    /// Post-scan fan-out of freshly copied folders to every enabled server.
    ///
    /// Runs inside the executor's scan gate, so it does not claim the gate
    /// itself. Per-target failures are isolated and counted exactly as in the
    /// manual path.
    pub async fn auto_deploy(&self, config: &AppConfig, folders: &[String]) {
        let enabled: Vec<&DeployServer> = config.enabled_servers().collect();
        if enabled.is_empty() {
            self.journal
                .info("Deployment enabled but no servers configured");
            return;
        }

        for folder in folders {
            let local = Path::new(&config.local_path).join(folder);
            self.journal.info(format!(
                "Deploying {} to {} server(s)...",
                folder,
                enabled.len()
            ));

            let mut report = DeployReport::default();
            for server in &enabled {
                match self
                    .transport
                    .deploy_folder(server, &config.post_commands, &local, folder)
                    .await
                {
                    Ok(()) => {
                        report.success_count += 1;
                        self.journal
                            .success(format!("[{}] Deployment successful", server.name));
                    }
                    Err(e) => {
                        report.fail_count += 1;
                        self.journal
                            .error(format!("[{}] Deployment failed: {}", server.name, e));
                    }
                }
            }

            if report.is_success() {
                self.journal.success(format!(
                    "Deployed {} to {} server(s)",
                    folder, report.success_count
                ));
            } else {
                self.journal.error(format!(
                    "Deployment of {} finished: {} succeeded, {} failed",
                    folder, report.success_count, report.fail_count
                ));
            }
        }
    }
}

fn resolve_targets<'a>(servers: &'a [DeployServer], selection: &str) -> Vec<&'a DeployServer> {
    if selection == "all" {
        servers.iter().filter(|s| s.enabled).collect()
    } else {
        servers.iter().filter(|s| s.id == selection).collect()
    }
}
