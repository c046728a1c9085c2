mod notifications;
mod push;
mod smtp_relay;
mod tasks;

use axum::routing::{get, post, put};
use axum::Router;

/// Routes under `/api/v1`
pub fn handler() -> Router {
    Router::new()
        .route("/push", post(push::handler))
        .route("/task/{id}", get(tasks::get_task))
        .route(
            "/notifications",
            get(notifications::list).delete(notifications::clear),
        )
        .route("/notifications/statistics", get(notifications::statistics))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route(
            "/notifications/{id}",
            get(notifications::get).delete(notifications::delete),
        )
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/smtp/status", get(smtp_relay::status))
        .route("/smtp/statistics", get(smtp_relay::statistics))
}
