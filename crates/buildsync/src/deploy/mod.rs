//! Deployment transport.

mod ssh;

pub use ssh::SshDeployer;

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::DeployServer;
use crate::error::Result;

/// Aggregate outcome of a multi-target deployment.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeployReport {
    pub success_count: usize,
    pub fail_count: usize,
}

impl DeployReport {
    pub fn is_success(&self) -> bool {
        self.fail_count == 0
    }
}

/// Per-server deploy seam.
#[async_trait]
pub trait DeployTransport: Send + Sync {
    /// One connectivity check; returns a status string on success.
    async fn test_connection(&self, server: &DeployServer) -> Result<String>;

    /// Manual deploy: deliver `local_path` to `remote_path` on the server,
    /// then run the post commands there. A `remote_path` ending in a path
    /// separator has the local folder's file name appended.
    async fn deploy(
        &self,
        server: &DeployServer,
        post_commands: &[String],
        local_path: &str,
        remote_path: &str,
    ) -> Result<()>;

    /// Post-scan deploy of one freshly copied artifact folder: deliver
    /// `local_folder` to `<server.remote_path>/<folder_name>`. If the remote
    /// folder already exists the upload is skipped, but the post commands
    /// still run.
    async fn deploy_folder(
        &self,
        server: &DeployServer,
        post_commands: &[String],
        local_folder: &Path,
        folder_name: &str,
    ) -> Result<()>;
}
