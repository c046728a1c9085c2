use std::sync::Arc;

use axum::extract::Path;
use axum::Extension;
use push_storage::TaskStore;

use crate::types::{ApiError, ApiResponse};

/// Returns the full task record, including per-destination results
pub async fn get_task(
    Extension(task_store): Extension<Arc<TaskStore>>,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    task_store.get(&id).map_or_else(
        || Err(ApiError::not_found("task not found")),
        |task| Ok(ApiResponse::ok("task fetched", task)),
    )
}
