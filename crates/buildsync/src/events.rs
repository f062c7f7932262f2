//! Event bus shared between the collaborators and the orchestrator.
//!
//! The scanner and the SSH deployer publish progress and log events onto
//! broadcast channels owned by the bus; the orchestrator runs consumer tasks
//! that fold them into the progress snapshot and the journal. Publishing with
//! no subscribers is not an error.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::journal::JournalLevel;

/// Broadcast channel capacity for progress/log events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One progress update for the currently active copy.
///
/// Each event fully replaces the previous snapshot (last-write-wins).
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub folder: String,
    pub total_bytes: u64,
    pub copied_bytes: u64,
    pub percentage: u8,
    /// Bytes per second since the copy started.
    pub speed_bps: u64,
    /// Estimated seconds remaining; `None` when the speed is still zero.
    pub eta_seconds: Option<u64>,
    pub elapsed_seconds: u64,
    pub local_path: Option<String>,
    pub remote_path: Option<String>,
}

/// One diagnostic line published by a collaborator, mirrored into the journal.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub msg: String,
    pub level: JournalLevel,
}

impl LogEvent {
    pub fn new(level: JournalLevel, msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            level,
        }
    }
}

/// Owner of the progress and log broadcast channels.
#[derive(Clone)]
pub struct EventBus {
    progress_tx: broadcast::Sender<ProgressEvent>,
    log_tx: broadcast::Sender<LogEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (log_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            progress_tx,
            log_tx,
        }
    }

    /// Publish a progress update. Ignores the absence of subscribers.
    pub fn publish_progress(&self, event: ProgressEvent) {
        let _ = self.progress_tx.send(event);
    }

    /// Publish a log line. Ignores the absence of subscribers.
    pub fn publish_log(&self, level: JournalLevel, msg: impl Into<String>) {
        let _ = self.log_tx.send(LogEvent::new(level, msg));
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    pub fn subscribe_log(&self) -> broadcast::Receiver<LogEvent> {
        self.log_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
