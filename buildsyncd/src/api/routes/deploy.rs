//! Manual deployment and connectivity-test routes.

use axum::{Json, Router, extract::State, routing::post};

use crate::api::error::ApiResult;
use crate::api::models::{DeployRequest, DeployResponse, MessageResponse, TestConnectionRequest};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(deploy))
        .route("/test", post(test_connection))
        .route("/test-all", post(test_all))
}

/// Fan a manual deployment out to the selected servers.
async fn deploy(
    State(state): State<AppState>,
    Json(request): Json<DeployRequest>,
) -> ApiResult<Json<DeployResponse>> {
    let report = state
        .orchestrator
        .manual_deploy(&request.server, &request.local_path, &request.remote_path)
        .await?;

    let message = if report.success_count + report.fail_count == 0 {
        "Nothing to deploy".to_string()
    } else if report.is_success() {
        format!("Deployed to {} server(s)", report.success_count)
    } else {
        format!(
            "Deployment finished: {} succeeded, {} failed",
            report.success_count, report.fail_count
        )
    };

    Ok(Json(DeployResponse {
        success_count: report.success_count,
        fail_count: report.fail_count,
        message,
    }))
}

async fn test_connection(
    State(state): State<AppState>,
    Json(request): Json<TestConnectionRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let status = state.orchestrator.test_server(&request.server_id).await?;
    Ok(Json(MessageResponse::new(status)))
}

/// Connectivity check against every enabled server, one line per server.
async fn test_all(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.orchestrator.test_all().await?))
}
