use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use common_types::{PushRequest, RecipientConfig};
use dispatcher::{EnqueueError, JobSender, PushJob};
use push_storage::TaskStore;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::types::{ApiError, ApiResponse};

/// Accepts a push request and enqueues it for dispatch
///
/// Returns 400 on malformed bodies, failed validation, or an unknown
/// recipient, and 503 when the job queue is full; the task record is
/// created before admission so a rejected job is still observable as
/// `failed`.
pub async fn handler(
    Extension(task_store): Extension<Arc<TaskStore>>,
    Extension(recipients): Extension<Arc<HashMap<String, RecipientConfig>>>,
    Extension(sender): Extension<JobSender>,
    payload: Result<Json<PushRequest>, JsonRejection>,
) -> Result<ApiResponse, ApiError> {
    let Json(request) =
        payload.map_err(|err| ApiError::bad_request(format!("invalid request body: {err}")))?;
    request
        .validate()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let Some(recipient) = recipients.get(&request.recipient_alias) else {
        return Err(ApiError::bad_request(format!(
            "unknown recipient: {}",
            request.recipient_alias
        )));
    };

    info!(
        recipient = %request.recipient_alias,
        message_type = %request.message_type,
        strategy = %request.strategy,
        title = %request.content.title,
        "push request accepted"
    );

    let task = task_store.create(request.clone());
    if let Err(err) = sender.enqueue(PushJob {
        task_id: task.id.clone(),
        request: request.clone(),
    }) {
        task_store.set_error(&task.id, err.to_string());
        return Err(match err {
            EnqueueError::QueueFull => ApiError::service_unavailable("queue full"),
            EnqueueError::Cancelled => ApiError::service_unavailable("server is shutting down"),
        });
    }

    Ok(ApiResponse::ok(
        "push task created",
        json!({
            "task_id": task.id,
            "recipient": recipient.name,
            "type": request.message_type,
            "strategy": request.strategy,
            "style": request.style,
            "title": request.content.title,
        }),
    ))
}
