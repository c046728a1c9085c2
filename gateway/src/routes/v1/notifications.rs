use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::Extension;
use push_storage::{NotificationStatus, NotificationStore};
use serde::Deserialize;
use serde_json::json;

use crate::types::{ApiError, ApiResponse};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// `unread`, `read`, or anything else for all
    status: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

/// Lists notifications newest first, with pagination
pub async fn list(
    Extension(store): Extension<Arc<NotificationStore>>,
    Query(params): Query<ListParams>,
) -> ApiResponse {
    let status = match params.status.as_deref() {
        Some("unread") => Some(NotificationStatus::Unread),
        Some("read") => Some(NotificationStatus::Read),
        _ => None,
    };

    let all = store.list(status);
    let total = all.len();
    let limit = params.limit.unwrap_or(50).clamp(1, 1000);
    let offset = params.offset.unwrap_or(0);
    let page: Vec<_> = all.into_iter().skip(offset).take(limit).collect();
    let count = page.len();

    ApiResponse::ok(
        "notifications fetched",
        json!({
            "notifications": page,
            "pagination": {
                "total": total,
                "limit": limit,
                "offset": offset,
                "count": count,
            },
        }),
    )
}

/// Returns one notification by id
pub async fn get(
    Extension(store): Extension<Arc<NotificationStore>>,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    store.get(&id).map_or_else(
        || Err(ApiError::not_found("notification not found")),
        |notification| {
            Ok(ApiResponse::ok(
                "notification fetched",
                json!({ "notification": notification }),
            ))
        },
    )
}

/// Marks one notification read
pub async fn mark_read(
    Extension(store): Extension<Arc<NotificationStore>>,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    if store.mark_read(&id) {
        Ok(ApiResponse::ok(
            "notification marked read",
            json!({ "notification_id": id }),
        ))
    } else {
        Err(ApiError::not_found("notification not found"))
    }
}

/// Marks every unread notification read
pub async fn mark_all_read(Extension(store): Extension<Arc<NotificationStore>>) -> ApiResponse {
    let count = store.mark_all_read();
    ApiResponse::ok(
        "all notifications marked read",
        json!({ "marked_count": count }),
    )
}

/// Deletes one notification
pub async fn delete(
    Extension(store): Extension<Arc<NotificationStore>>,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    if store.delete(&id) {
        Ok(ApiResponse::ok(
            "notification deleted",
            json!({ "notification_id": id }),
        ))
    } else {
        Err(ApiError::not_found("notification not found"))
    }
}

/// Deletes every notification
pub async fn clear(Extension(store): Extension<Arc<NotificationStore>>) -> ApiResponse {
    let count = store.clear();
    ApiResponse::ok("all notifications cleared", json!({ "cleared_count": count }))
}

/// Aggregate counters over the store
pub async fn statistics(Extension(store): Extension<Arc<NotificationStore>>) -> ApiResponse {
    ApiResponse::ok(
        "notification statistics fetched",
        json!({ "statistics": store.statistics() }),
    )
}
