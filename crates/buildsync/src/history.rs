//! Audit history persistence.
//!
//! Records system events (scheduler transitions, config changes, deploys,
//! pause/resume) and per-folder copy details as a newest-first log capped at
//! 100 entries, persisted as pretty JSON. Writes are fire-and-forget from the
//! orchestrator's perspective: failures are traced, never propagated.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;

/// Maximum number of retained history entries.
pub const HISTORY_CAPACITY: usize = 100;

/// Audit action vocabulary.
pub mod actions {
    pub const CONFIG_CHANGE: &str = "CONFIG_CHANGE";
    pub const MANUAL_DEPLOY: &str = "MANUAL_DEPLOY";
    pub const PAUSE: &str = "PAUSE";
    pub const RESUME: &str = "RESUME";
    pub const SCHEDULER_START: &str = "SCHEDULER_START";
    pub const SCHEDULER_STOP: &str = "SCHEDULER_STOP";
    pub const COPY: &str = "COPY";
    pub const CANCEL: &str = "CANCEL";
}

/// One audit record. Copy events carry the detail fields; system events leave
/// them empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    /// RFC 3339 local timestamp.
    pub timestamp: String,
    #[serde(default)]
    pub action_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub folder_name: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub target_path: String,
    #[serde(default)]
    pub copied_files_count: usize,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub files: Vec<String>,
}

impl HistoryEntry {
    pub fn system_event(action: &str, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Local::now().to_rfc3339(),
            action_type: action.to_string(),
            description: description.into(),
            folder_name: String::new(),
            source_path: String::new(),
            target_path: String::new(),
            copied_files_count: 0,
            total_size: 0,
            files: vec![],
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn copy_event(
        folder_name: impl Into<String>,
        source_path: impl Into<String>,
        target_path: impl Into<String>,
        copied_files_count: usize,
        total_size: u64,
        files: Vec<String>,
    ) -> Self {
        let folder_name = folder_name.into();
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Local::now().to_rfc3339(),
            action_type: actions::COPY.to_string(),
            description: format!("Copied {}", folder_name),
            folder_name,
            source_path: source_path.into(),
            target_path: target_path.into(),
            copied_files_count,
            total_size,
            files,
        }
    }
}

/// The persisted log shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryLog {
    pub entries: Vec<HistoryEntry>,
}

/// Audit-history seam.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Prepend one entry. Must never fail the caller.
    async fn add(&self, entry: HistoryEntry);

    async fn load(&self) -> Result<HistoryLog>;

    async fn clear(&self) -> Result<()>;

    /// Convenience for the common system-event shape.
    async fn record(&self, action: &str, description: &str) {
        self.add(HistoryEntry::system_event(action, description))
            .await;
    }
}

/// History store backed by a single pretty-printed JSON file.
pub struct JsonHistoryStore {
    path: PathBuf,
    // Serializes the read-modify-write cycle of `add`.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load_inner(&self) -> HistoryLog {
        match fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => HistoryLog::default(),
        }
    }

    async fn save_inner(&self, log: &HistoryLog) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(log)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn add(&self, entry: HistoryEntry) {
        let _guard = self.write_lock.lock().await;
        let mut log = self.load_inner().await;
        log.entries.insert(0, entry);
        log.entries.truncate(HISTORY_CAPACITY);
        if let Err(e) = self.save_inner(&log).await {
            warn!(path = %self.path.display(), error = %e, "Failed to persist history entry");
        }
    }

    async fn load(&self) -> Result<HistoryLog> {
        Ok(self.load_inner().await)
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
