//! HTTP server assembly and graceful shutdown

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use axum::{Extension, Router};
use common_types::RecipientConfig;
use dispatcher::JobSender;
use push_storage::{NotificationStore, TaskStore};
use smtp_relay::RelayService;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::routes;

/// Builds the router with all handles injected
///
/// Kept separate from [`start`] so tests can drive the router without a
/// listening socket.
pub fn build_router(
    task_store: Arc<TaskStore>,
    notification_store: Arc<NotificationStore>,
    relay: Arc<RelayService>,
    sender: JobSender,
    recipients: Arc<HashMap<String, RecipientConfig>>,
) -> Router {
    routes::handler()
        .layer(Extension(task_store))
        .layer(Extension(notification_store))
        .layer(Extension(relay))
        .layer(Extension(sender))
        .layer(Extension(recipients))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(5)))
}

/// Serves the API until SIGINT/SIGTERM
///
/// # Errors
///
/// Returns an error if the listener fails to bind or the server fails.
pub async fn start(
    config: &AppConfig,
    task_store: Arc<TaskStore>,
    notification_store: Arc<NotificationStore>,
    relay: Arc<RelayService>,
    sender: JobSender,
) -> anyhow::Result<()> {
    let recipients = Arc::new(config.recipients.clone());
    let router = build_router(task_store, notification_store, relay, sender, recipients);

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind http listener on {addr}"))?;
    info!(mode = %config.server.mode, "push gateway listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
