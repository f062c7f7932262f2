//! Artifact scanning and copying.

mod fs;

pub use fs::FsArtifactScanner;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::Result;

/// Outcome of one scan/copy cycle. Immutable snapshot returned by one scan
/// invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    /// Number of source locations visited.
    pub scanned_paths: usize,
    /// Folder names that matched the filters, whether or not they were copied.
    pub found_folders: Vec<String>,
    /// Folder names copied successfully this cycle.
    pub copied_folders: Vec<String>,
    /// Per-item errors; the cycle as a whole still counts as successful.
    pub errors: Vec<String>,
    /// Detail records for the copied folders, consumed by the audit history.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copy_details: Vec<CopyDetail>,
}

/// What one successful folder copy moved.
#[derive(Debug, Clone, Serialize)]
pub struct CopyDetail {
    pub folder: String,
    pub source_path: String,
    pub target_path: String,
    pub files_count: usize,
    pub total_bytes: u64,
    pub files: Vec<String>,
}

/// Scan/copy collaborator seam.
///
/// `cancel`, `pause` and `resume` are advisory signals applied to the
/// in-flight cycle; they take effect at the next file boundary.
#[async_trait]
pub trait ArtifactScanner: Send + Sync {
    async fn scan_and_copy(&self, config: &AppConfig) -> Result<ScanResult>;

    fn cancel(&self);
    fn pause(&self);
    fn resume(&self);
}
