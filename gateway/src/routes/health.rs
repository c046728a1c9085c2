use serde_json::json;

use crate::types::ApiResponse;

/// Health check endpoint for monitors and deploy verification
pub async fn handler() -> ApiResponse {
    ApiResponse::ok("service healthy", json!({ "status": "healthy" }))
}
