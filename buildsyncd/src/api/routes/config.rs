//! Configuration routes.

use axum::{Json, Router, extract::State, routing::get};

use buildsync::config::AppConfig;

use crate::api::error::ApiResult;
use crate::api::models::MessageResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_config).put(update_config))
}

async fn get_config(State(state): State<AppState>) -> ApiResult<Json<AppConfig>> {
    Ok(Json(state.orchestrator.get_config().await?))
}

/// Persist a new configuration. Identical configurations are acknowledged
/// without being rewritten.
async fn update_config(
    State(state): State<AppState>,
    Json(config): Json<AppConfig>,
) -> ApiResult<Json<MessageResponse>> {
    let changed = state.orchestrator.update_config(config).await?;
    let message = if changed {
        "Configuration saved"
    } else {
        "Configuration unchanged"
    };
    Ok(Json(MessageResponse::new(message)))
}
