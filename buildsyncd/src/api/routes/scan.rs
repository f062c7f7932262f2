//! Manual scan trigger routes.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::api::models::MessageResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(trigger))
        .route("/cancel", post(cancel))
}

/// Kick off one scan cycle in the background. A cycle already in flight
/// simply absorbs the trigger.
async fn trigger(State(state): State<AppState>) -> (StatusCode, Json<MessageResponse>) {
    state.orchestrator.trigger_scan();
    (
        StatusCode::ACCEPTED,
        Json(MessageResponse::new("Scan triggered")),
    )
}

/// Advisory cancel of the in-flight scan cycle.
async fn cancel(State(state): State<AppState>) -> Json<MessageResponse> {
    state.orchestrator.cancel_scan();
    Json(MessageResponse::new("Cancel requested"))
}
