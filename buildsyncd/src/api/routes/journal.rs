//! Journal routes.

use axum::{Json, Router, extract::State, routing::get};

use buildsync::journal::JournalEntry;

use crate::api::models::MessageResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list).delete(clear))
}

/// All journal entries, newest first.
async fn list(State(state): State<AppState>) -> Json<Vec<JournalEntry>> {
    Json(state.orchestrator.journal_entries())
}

async fn clear(State(state): State<AppState>) -> Json<MessageResponse> {
    state.orchestrator.clear_journal();
    Json(MessageResponse::new("Journal cleared"))
}
