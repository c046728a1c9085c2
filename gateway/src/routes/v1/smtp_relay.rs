use std::sync::Arc;

use axum::Extension;
use serde_json::json;
use smtp_relay::RelayService;

use crate::types::ApiResponse;

/// Whether the relay is enabled and has usable accounts
pub async fn status(Extension(relay): Extension<Arc<RelayService>>) -> ApiResponse {
    ApiResponse::ok(
        "smtp relay status fetched",
        json!({
            "enabled": relay.is_enabled(),
            "status": "running",
        }),
    )
}

/// Pool-level statistics for the relay
pub async fn statistics(Extension(relay): Extension<Arc<RelayService>>) -> ApiResponse {
    ApiResponse::ok(
        "smtp relay statistics fetched",
        json!({ "statistics": relay.statistics() }),
    )
}
