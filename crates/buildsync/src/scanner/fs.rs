//! Filesystem implementation of the artifact scanner.
//!
//! Artifact folders are named `YYYY_MM_DD_HH_MM(Version)`. For every
//! configured source location, candidates are grouped per target version;
//! only the newest candidate of each version is considered, and only if it
//! was produced today or yesterday (local time). Matches are copied
//! recursively under the local destination root, applying the configured
//! file-name filters and publishing progress events as bytes move.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use regex::Regex;
use tokio::fs;

use crate::config::{AppConfig, within_time_ranges};
use crate::error::Result;
use crate::events::{EventBus, ProgressEvent};
use crate::journal::JournalLevel;
use crate::scanner::{ArtifactScanner, CopyDetail, ScanResult};

/// Poll period while paused.
const PAUSE_POLL: Duration = Duration::from_millis(200);

fn folder_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4}_\d{2}_\d{2}_\d{2}_\d{2})\((.+)\)$")
            .expect("folder name pattern is a valid regex")
    })
}

#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    name: String,
    version: String,
    datetime: NaiveDateTime,
}

struct PlannedFile {
    source: PathBuf,
    relative: PathBuf,
    size: u64,
}

struct CopyPlan {
    files: Vec<PlannedFile>,
    total_bytes: u64,
}

/// Scanner operating on locally mounted source paths.
pub struct FsArtifactScanner {
    events: EventBus,
    cancelled: AtomicBool,
    paused: AtomicBool,
}

impl FsArtifactScanner {
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            cancelled: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    async fn wait_while_paused(&self) {
        while self.paused.load(Ordering::SeqCst) && !self.cancelled.load(Ordering::SeqCst) {
            tokio::time::sleep(PAUSE_POLL).await;
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Enumerate the files under `root` that pass the configured filters,
    /// summing their sizes up front so progress can be reported in bytes.
    async fn plan_copy(
        root: &Path,
        extensions: &[String],
        includes: &[String],
    ) -> std::io::Result<CopyPlan> {
        let mut files = Vec::new();
        let mut total_bytes = 0u64;
        let mut dirs = VecDeque::from([root.to_path_buf()]);

        while let Some(dir) = dirs.pop_front() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    dirs.push_back(entry.path());
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                if !file_matches(&name, extensions, includes) {
                    continue;
                }
                let size = entry.metadata().await?.len();
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .map_err(|e| std::io::Error::other(e.to_string()))?
                    .to_path_buf();
                total_bytes += size;
                files.push(PlannedFile {
                    source: entry.path(),
                    relative,
                    size,
                });
            }
        }

        Ok(CopyPlan { files, total_bytes })
    }

    fn publish_progress(
        &self,
        folder: &str,
        total_bytes: u64,
        copied_bytes: u64,
        started: Instant,
        source: &Path,
        target: &Path,
    ) {
        let elapsed = started.elapsed();
        let elapsed_secs = elapsed.as_secs_f64().max(0.001);
        let speed_bps = (copied_bytes as f64 / elapsed_secs) as u64;
        let percentage = if total_bytes == 0 {
            100
        } else {
            ((copied_bytes * 100) / total_bytes).min(100) as u8
        };
        let eta_seconds = if speed_bps > 0 && copied_bytes < total_bytes {
            Some((total_bytes - copied_bytes) / speed_bps)
        } else if copied_bytes >= total_bytes {
            Some(0)
        } else {
            None
        };
        self.events.publish_progress(ProgressEvent {
            folder: folder.to_string(),
            total_bytes,
            copied_bytes,
            percentage,
            speed_bps,
            eta_seconds,
            elapsed_seconds: elapsed.as_secs(),
            local_path: Some(target.to_string_lossy().to_string()),
            remote_path: Some(source.to_string_lossy().to_string()),
        });
    }

    /// Copy one artifact folder, reporting progress per file.
    ///
    /// Errors are pre-formatted for the `ScanResult.errors` list.
    async fn copy_folder(
        &self,
        source: &Path,
        target: &Path,
        folder: &str,
        config: &AppConfig,
    ) -> std::result::Result<CopyDetail, String> {
        let plan = Self::plan_copy(source, &config.file_extensions, &config.filename_includes)
            .await
            .map_err(|e| format!("Failed to copy {}: {}", folder, e))?;

        fs::create_dir_all(target)
            .await
            .map_err(|e| format!("Failed to copy {}: {}", folder, e))?;

        let started = Instant::now();
        let mut copied_bytes = 0u64;
        let mut copied_files = Vec::with_capacity(plan.files.len());

        for file in &plan.files {
            self.wait_while_paused().await;
            if self.is_cancelled() {
                return Err(format!("Cancelled: {}", folder));
            }

            let dest = target.join(&file.relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("Failed to copy {}: {}", folder, e))?;
            }
            fs::copy(&file.source, &dest).await.map_err(|e| {
                format!("Failed to copy {}/{}: {}", folder, file.relative.display(), e)
            })?;

            copied_bytes += file.size;
            copied_files.push(file.relative.to_string_lossy().to_string());
            self.publish_progress(folder, plan.total_bytes, copied_bytes, started, source, target);
        }

        if plan.files.is_empty() {
            // Nothing passed the filters; still surface a completed copy.
            self.publish_progress(folder, 0, 0, started, source, target);
        }

        Ok(CopyDetail {
            folder: folder.to_string(),
            source_path: source.to_string_lossy().to_string(),
            target_path: target.to_string_lossy().to_string(),
            files_count: copied_files.len(),
            total_bytes: plan.total_bytes,
            files: copied_files,
        })
    }
}

fn file_matches(name: &str, extensions: &[String], includes: &[String]) -> bool {
    let lower = name.to_lowercase();
    let extension_ok = extensions.is_empty()
        || extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()));
    let include_ok =
        includes.is_empty() || includes.iter().any(|needle| name.contains(needle.as_str()));
    extension_ok && include_ok
}

#[async_trait]
impl ArtifactScanner for FsArtifactScanner {
    async fn scan_and_copy(&self, config: &AppConfig) -> Result<ScanResult> {
        // Fresh run: advisory flags from a previous cycle must not leak in.
        self.cancelled.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        let mut result = ScanResult::default();

        if !within_time_ranges(&config.time_ranges, Local::now().time()) {
            self.events.publish_log(
                JournalLevel::Info,
                "Current time is outside the configured scan windows, skipping cycle",
            );
            return Ok(result);
        }

        let now = Local::now().naive_local();
        let today = now.date();
        let yesterday = today - ChronoDuration::days(1);

        for remote_path in &config.remote_paths {
            result.scanned_paths += 1;
            let mut entries = match fs::read_dir(Path::new(remote_path)).await {
                Ok(entries) => entries,
                Err(e) => {
                    result
                        .errors
                        .push(format!("Failed to read {}: {}", remote_path, e));
                    continue;
                }
            };

            let mut candidates: Vec<Candidate> = Vec::new();
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name().to_string_lossy().to_string();
                let parsed = folder_pattern().captures(&name).and_then(|caps| {
                    let datetime =
                        NaiveDateTime::parse_from_str(caps.get(1)?.as_str(), "%Y_%m_%d_%H_%M")
                            .ok()?;
                    Some((caps.get(2)?.as_str().to_string(), datetime))
                });
                if let Some((version, datetime)) = parsed {
                    candidates.push(Candidate {
                        path: entry.path(),
                        name,
                        version,
                        datetime,
                    });
                }
            }

            for target_version in &config.target_versions {
                if self.is_cancelled() {
                    result.errors.push("Cancelled".to_string());
                    return Ok(result);
                }

                let latest = candidates
                    .iter()
                    .filter(|c| c.version == *target_version)
                    .max_by_key(|c| c.datetime);
                let Some(latest) = latest else {
                    continue;
                };

                let folder_date = latest.datetime.date();
                if folder_date != today && folder_date != yesterday {
                    continue;
                }

                result.found_folders.push(latest.name.clone());

                let target_dir = Path::new(&config.local_path).join(&latest.name);
                if target_dir.exists() {
                    result.errors.push(format!(
                        "Skipped (Exists): {} -> {}",
                        latest.name,
                        target_dir.display()
                    ));
                    continue;
                }

                match self
                    .copy_folder(&latest.path, &target_dir, &latest.name, config)
                    .await
                {
                    Ok(detail) => {
                        result.copied_folders.push(latest.name.clone());
                        result.copy_details.push(detail);
                    }
                    Err(e) => {
                        let cancelled = e.starts_with("Cancelled");
                        result.errors.push(e);
                        if cancelled {
                            return Ok(result);
                        }
                    }
                }
            }
        }

        Ok(result)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}
