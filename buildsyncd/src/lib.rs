//! Daemon wiring for the buildsync orchestration core: HTTP control API and
//! logging setup. The binary in `main.rs` assembles the orchestrator from the
//! JSON-backed stores and the real filesystem/SSH collaborators.

pub mod api;
pub mod logging;
