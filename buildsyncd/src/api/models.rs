//! API request/response models.

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Generic message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Manual deploy request.
#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    /// `"all"` or one server id.
    pub server: String,
    pub local_path: String,
    pub remote_path: String,
}

/// Manual deploy outcome.
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub success_count: usize,
    pub fail_count: usize,
    pub message: String,
}

/// Single-server connectivity test request.
#[derive(Debug, Deserialize)]
pub struct TestConnectionRequest {
    pub server_id: String,
}
