//! API route handlers.

pub mod config;
pub mod deploy;
pub mod health;
pub mod history;
pub mod journal;
pub mod scan;
pub mod scheduler;

use axum::Router;

use crate::api::server::AppState;

/// Build the combined API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/health", health::router())
        .nest("/config", config::router())
        .nest("/scheduler", scheduler::router())
        .nest("/scan", scan::router())
        .nest("/deploy", deploy::router())
        .nest("/journal", journal::router())
        .nest("/history", history::router())
}
