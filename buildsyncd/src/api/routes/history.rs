//! Audit history routes.

use axum::{Json, Router, extract::State, routing::get};

use buildsync::history::HistoryLog;

use crate::api::error::ApiResult;
use crate::api::models::MessageResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list).delete(clear))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<HistoryLog>> {
    Ok(Json(state.orchestrator.history().await?))
}

async fn clear(State(state): State<AppState>) -> ApiResult<Json<MessageResponse>> {
    state.orchestrator.clear_history().await?;
    Ok(Json(MessageResponse::new("History cleared")))
}
