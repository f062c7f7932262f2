//! Current-copy progress snapshot.
//!
//! At most one [`ProgressState`] is live at a time; it is absent while the
//! system is idle. Every incoming [`ProgressEvent`] fully replaces the
//! snapshot. A completed copy (percentage >= 100) schedules a deferred clear
//! after a grace delay so the finished state stays visible briefly; the clear
//! only applies if no newer folder has taken over the snapshot in the
//! meantime.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::events::ProgressEvent;

/// How long a completed copy stays visible before the snapshot clears.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_secs(2);

/// Snapshot of the currently active copy.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressState {
    pub folder: String,
    pub percentage: u8,
    pub copied_bytes: u64,
    pub total_bytes: u64,
    pub speed_bps: u64,
    pub eta_seconds: Option<u64>,
    pub elapsed_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
}

impl From<ProgressEvent> for ProgressState {
    fn from(event: ProgressEvent) -> Self {
        Self {
            folder: event.folder,
            percentage: event.percentage.min(100),
            copied_bytes: event.copied_bytes,
            total_bytes: event.total_bytes,
            speed_bps: event.speed_bps,
            eta_seconds: event.eta_seconds,
            elapsed_seconds: event.elapsed_seconds,
            local_path: event.local_path,
            remote_path: event.remote_path,
        }
    }
}

/// Consumer-side holder of the single progress snapshot.
pub struct ProgressTracker {
    current: Mutex<Option<ProgressState>>,
    grace_delay: Duration,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::with_grace_delay(DEFAULT_GRACE_DELAY)
    }

    pub fn with_grace_delay(grace_delay: Duration) -> Self {
        Self {
            current: Mutex::new(None),
            grace_delay,
        }
    }

    /// Apply one progress event, replacing the snapshot.
    ///
    /// An event at or past 100% schedules the deferred clear; the clear is
    /// dropped if a different folder owns the snapshot when the delay elapses.
    pub fn apply(self: &Arc<Self>, event: ProgressEvent) {
        let state = ProgressState::from(event);
        let completed = state.percentage >= 100;
        let folder = state.folder.clone();
        *self.current.lock() = Some(state);

        if completed {
            let tracker = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(tracker.grace_delay).await;
                let mut current = tracker.current.lock();
                if current.as_ref().is_some_and(|s| s.folder == folder) {
                    *current = None;
                }
            });
        }
    }

    pub fn current(&self) -> Option<ProgressState> {
        self.current.lock().clone()
    }

    /// Unconditionally drop the snapshot. Called by the executor's cleanup
    /// path on every scan exit route.
    pub fn clear(&self) {
        *self.current.lock() = None;
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(folder: &str, percentage: u8) -> ProgressEvent {
        ProgressEvent {
            folder: folder.to_string(),
            total_bytes: 1000,
            copied_bytes: percentage as u64 * 10,
            percentage,
            speed_bps: 100,
            eta_seconds: Some(5),
            elapsed_seconds: 1,
            local_path: None,
            remote_path: None,
        }
    }

    #[tokio::test]
    async fn last_event_wins() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.apply(event("a", 10));
        tracker.apply(event("a", 60));

        let state = tracker.current().unwrap();
        assert_eq!(state.percentage, 60);
    }

    #[tokio::test]
    async fn completion_clears_after_grace_delay() {
        let tracker = Arc::new(ProgressTracker::with_grace_delay(Duration::from_millis(30)));
        tracker.apply(event("a", 100));
        assert!(tracker.current().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(tracker.current().is_none());
    }

    #[tokio::test]
    async fn stale_clear_does_not_erase_newer_folder() {
        let tracker = Arc::new(ProgressTracker::with_grace_delay(Duration::from_millis(50)));
        tracker.apply(event("old", 100));
        // A new cycle starts inside the grace window.
        tokio::time::sleep(Duration::from_millis(10)).await;
        tracker.apply(event("new", 20));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = tracker.current().expect("newer progress must survive");
        assert_eq!(state.folder, "new");
        assert_eq!(state.percentage, 20);
    }

    #[tokio::test]
    async fn clear_drops_snapshot_immediately() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.apply(event("a", 40));
        tracker.clear();
        assert!(tracker.current().is_none());
    }
}
