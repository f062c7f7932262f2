//! Application configuration model and validation.

mod store;

pub use store::{ConfigStore, JsonConfigStore};

use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Smallest accepted scheduler period.
pub const MIN_INTERVAL_MINUTES: u64 = 5;

fn default_local_path() -> String {
    "artifacts".to_string()
}

fn default_interval() -> u64 {
    10
}

fn default_port() -> u16 {
    22
}

fn default_enabled() -> bool {
    true
}

fn new_server_id() -> String {
    Uuid::new_v4().to_string()
}

/// Top-level application configuration, persisted as pretty JSON.
///
/// Unknown or missing fields are tolerated on load; every field falls back to
/// its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source locations scanned for artifact folders.
    #[serde(default)]
    pub remote_paths: Vec<String>,
    /// Version inclusion filter; only folders carrying one of these versions
    /// are considered.
    #[serde(default)]
    pub target_versions: Vec<String>,
    /// Destination root for copied artifacts.
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// Scheduler period in minutes.
    #[serde(default = "default_interval")]
    pub interval_minutes: u64,
    /// `HH:MM-HH:MM` windows restricting when scans may run; empty means
    /// unrestricted. Windows may wrap midnight ("22:00-06:00").
    #[serde(default)]
    pub time_ranges: Vec<String>,
    /// When non-empty, only files ending with one of these suffixes are
    /// copied.
    #[serde(default)]
    pub file_extensions: Vec<String>,
    /// When non-empty, only files containing one of these substrings are
    /// copied.
    #[serde(default)]
    pub filename_includes: Vec<String>,
    /// Fan freshly copied folders out to the enabled servers after a scan.
    #[serde(default)]
    pub deploy_enabled: bool,
    #[serde(default)]
    pub servers: Vec<DeployServer>,
    /// Commands run on each server after every deploy, in order.
    #[serde(default)]
    pub post_commands: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote_paths: vec![],
            target_versions: vec![],
            local_path: default_local_path(),
            interval_minutes: default_interval(),
            time_ranges: vec![],
            file_extensions: vec![],
            filename_includes: vec![],
            deploy_enabled: false,
            servers: vec![],
            post_commands: vec![],
        }
    }
}

impl AppConfig {
    /// Servers eligible for deployment.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &DeployServer> {
        self.servers.iter().filter(|s| s.enabled)
    }

    /// Check every invariant the configuration must hold before persisting.
    pub fn validate(&self) -> Result<()> {
        if self.interval_minutes < MIN_INTERVAL_MINUTES {
            return Err(Error::validation(format!(
                "interval_minutes must be at least {} (got {})",
                MIN_INTERVAL_MINUTES, self.interval_minutes
            )));
        }
        if self.local_path.trim().is_empty() {
            return Err(Error::validation("local_path must not be empty"));
        }
        for range in &self.time_ranges {
            TimeWindow::parse(range)?;
        }
        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            if server.id.trim().is_empty() {
                return Err(Error::validation(format!(
                    "server '{}' has an empty id",
                    server.name
                )));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(Error::validation(format!(
                    "duplicate server id '{}'",
                    server.id
                )));
            }
        }
        Ok(())
    }

    /// Human-readable summary of the fields that differ from `old`.
    ///
    /// Used for the CONFIG_CHANGE audit record; an empty result means the two
    /// configurations are identical.
    pub fn describe_changes(old: &AppConfig, new: &AppConfig) -> String {
        let mut changed = Vec::new();
        if old.remote_paths != new.remote_paths {
            changed.push(format!("remote_paths ({} entries)", new.remote_paths.len()));
        }
        if old.target_versions != new.target_versions {
            changed.push(format!(
                "target_versions ({} entries)",
                new.target_versions.len()
            ));
        }
        if old.local_path != new.local_path {
            changed.push(format!("local_path -> {}", new.local_path));
        }
        if old.interval_minutes != new.interval_minutes {
            changed.push(format!(
                "interval_minutes {} -> {}",
                old.interval_minutes, new.interval_minutes
            ));
        }
        if old.time_ranges != new.time_ranges {
            changed.push(format!("time_ranges ({} entries)", new.time_ranges.len()));
        }
        if old.file_extensions != new.file_extensions {
            changed.push("file_extensions".to_string());
        }
        if old.filename_includes != new.filename_includes {
            changed.push("filename_includes".to_string());
        }
        if old.deploy_enabled != new.deploy_enabled {
            changed.push(format!("deploy_enabled -> {}", new.deploy_enabled));
        }
        if old.servers != new.servers {
            changed.push(format!("servers ({} entries)", new.servers.len()));
        }
        if old.post_commands != new.post_commands {
            changed.push(format!("post_commands ({} entries)", new.post_commands.len()));
        }
        changed.join(", ")
    }
}

/// One deploy target.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployServer {
    /// Stable identity, generated at creation.
    #[serde(default = "new_server_id")]
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    /// Plaintext secret; redacted from Debug output, never journaled.
    pub password: String,
    pub remote_path: String,
}

impl DeployServer {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for DeployServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployServer")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("remote_path", &self.remote_path)
            .finish()
    }
}

/// One `HH:MM-HH:MM` scan window. Windows whose end precedes their start wrap
/// over midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn parse(s: &str) -> Result<Self> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| Error::validation(format!("invalid time range '{}'", s)))?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M")
            .map_err(|_| Error::validation(format!("invalid time range '{}'", s)))?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M")
            .map_err(|_| Error::validation(format!("invalid time range '{}'", s)))?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }
}

/// Whether `now` falls inside any of the configured windows.
///
/// An empty list means scans are unrestricted. Unparsable entries are skipped;
/// validation rejects them before they ever reach a saved config.
pub fn within_time_ranges(ranges: &[String], now: NaiveTime) -> bool {
    if ranges.is_empty() {
        return true;
    }
    ranges
        .iter()
        .filter_map(|r| TimeWindow::parse(r).ok())
        .any(|w| w.contains(now))
}
