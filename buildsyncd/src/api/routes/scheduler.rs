//! Scheduler control routes.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use buildsync::orchestrator::StatusSnapshot;

use crate::api::error::ApiResult;
use crate::api::models::MessageResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/status", get(status))
}

async fn start(State(state): State<AppState>) -> ApiResult<Json<MessageResponse>> {
    state.orchestrator.start().await?;
    Ok(Json(MessageResponse::new("Scheduler started")))
}

async fn stop(State(state): State<AppState>) -> Json<MessageResponse> {
    state.orchestrator.stop().await;
    Json(MessageResponse::new("Scheduler stopped"))
}

async fn pause(State(state): State<AppState>) -> Json<MessageResponse> {
    state.orchestrator.pause().await;
    Json(MessageResponse::new("Pause requested"))
}

async fn resume(State(state): State<AppState>) -> Json<MessageResponse> {
    state.orchestrator.resume().await;
    Json(MessageResponse::new("Resume requested"))
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.orchestrator.status())
}
