//! # buildsync
//!
//! Orchestration core for the buildsync artifact pipeline: periodically scan
//! configured remote locations for build-artifact folders, copy matches to a
//! local staging directory, and optionally fan the copied artifacts out to a
//! set of deploy servers over SSH, running post-deploy commands on each.
//!
//! The crate is split along the seams of the system:
//!
//! - [`journal`] — bounded, newest-first diagnostic buffer shared by all
//!   components
//! - [`progress`] — single current-or-none snapshot of the active copy
//! - [`config`] / [`history`] — JSON-file backed configuration and audit
//!   history stores
//! - [`scanner`] — filesystem scan/match/copy collaborator
//! - [`deploy`] — SSH connectivity tests, SFTP uploads and remote command
//!   execution
//! - [`orchestrator`] — the scheduler state machine, the single-flight scan
//!   executor and the multi-target deploy dispatcher

pub mod config;
pub mod deploy;
pub mod error;
pub mod events;
pub mod history;
pub mod journal;
pub mod orchestrator;
pub mod progress;
pub mod scanner;

pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
