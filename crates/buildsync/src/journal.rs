//! Bounded, newest-first diagnostic journal.
//!
//! The journal is the shared audit/diagnostic buffer written to by the
//! scheduler timer, manual actions and the collaborator event streams. A
//! single mutex serializes concurrent producers so insertion order and the
//! eviction invariant hold under contention.

use std::collections::VecDeque;

use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Maximum number of retained entries; the oldest entry is evicted beyond it.
pub const JOURNAL_CAPACITY: usize = 1000;

/// Severity of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalLevel {
    Info,
    Error,
    Success,
}

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Local wall-clock time, `HH:MM:SS`.
    pub time: String,
    pub msg: String,
    pub level: JournalLevel,
}

/// Bounded newest-first journal buffer.
pub struct Journal {
    entries: Mutex<VecDeque<JournalEntry>>,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(JOURNAL_CAPACITY)),
        }
    }

    /// Prepend an entry, evicting the oldest once the capacity is exceeded.
    pub fn insert(&self, level: JournalLevel, msg: impl Into<String>) {
        let entry = JournalEntry {
            time: Local::now().format("%H:%M:%S").to_string(),
            msg: msg.into(),
            level,
        };
        let mut entries = self.entries.lock();
        entries.push_front(entry);
        while entries.len() > JOURNAL_CAPACITY {
            entries.pop_back();
        }
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.insert(JournalLevel::Info, msg);
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.insert(JournalLevel::Error, msg);
    }

    pub fn success(&self, msg: impl Into<String>) {
        self.insert(JournalLevel::Success, msg);
    }

    /// Snapshot of all entries, newest first.
    pub fn snapshot(&self) -> Vec<JournalEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_newest_first_order() {
        let journal = Journal::new();
        journal.info("first");
        journal.error("second");
        journal.success("third");

        let entries = journal.snapshot();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].msg, "third");
        assert_eq!(entries[0].level, JournalLevel::Success);
        assert_eq!(entries[2].msg, "first");
    }

    #[test]
    fn capacity_evicts_oldest_entries() {
        let journal = Journal::new();
        for i in 0..(JOURNAL_CAPACITY + 17) {
            journal.info(format!("entry {}", i));
        }

        let entries = journal.snapshot();
        assert_eq!(entries.len(), JOURNAL_CAPACITY);
        // Newest entry first, oldest surviving entry last.
        assert_eq!(entries[0].msg, format!("entry {}", JOURNAL_CAPACITY + 16));
        assert_eq!(entries[JOURNAL_CAPACITY - 1].msg, "entry 17");
    }

    #[test]
    fn clear_empties_the_buffer() {
        let journal = Journal::new();
        journal.info("something");
        assert!(!journal.is_empty());
        journal.clear();
        assert!(journal.is_empty());
    }
}
