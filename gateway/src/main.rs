use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dispatcher::{standard_registry, DispatchContext, Dispatcher};
use gateway::config::AppConfig;
use gateway::{logger, server};
use push_storage::{run_sweeper, NotificationStore, TaskStore};
use smtp_relay::{RelayService, SmtpServer};

/// In-memory system notifications kept before the oldest is evicted
const NOTIFICATION_STORE_CAP: usize = 1000;

#[derive(Parser)]
#[command(name = "gateway", about = "Message push gateway")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "config/config.toml", env = "PUSH_SERVER_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;
    logger::init(&config.log)?;

    info!(config = %args.config.display(), "push gateway starting");

    let task_store = Arc::new(TaskStore::new());
    let notification_store = Arc::new(NotificationStore::new(NOTIFICATION_STORE_CAP));
    let relay = Arc::new(RelayService::new(
        config.smtp_relay.clone(),
        notification_store.clone(),
    ));

    let registry = standard_registry(
        &config.queue,
        relay.clone(),
        notification_store.clone(),
        &config.system,
    );
    let ctx = Arc::new(DispatchContext {
        task_store: task_store.clone(),
        registry: Arc::new(registry),
        recipients: Arc::new(config.recipients.clone()),
        system: config.system.clone(),
        settings: config.queue,
    });
    let dispatcher = Dispatcher::start(ctx);

    let background_token = CancellationToken::new();
    let sweeper = run_sweeper(task_store.clone(), config.task, background_token.clone());

    let smtp_server = SmtpServer::new(config.smtp_relay.clone(), relay.clone());
    let smtp_handle = tokio::spawn(smtp_server.run(background_token.clone()));

    server::start(
        &config,
        task_store,
        notification_store,
        relay,
        dispatcher.sender(),
    )
    .await?;

    // The HTTP server has stopped accepting; drain the queue and stop the
    // background tasks.
    background_token.cancel();
    dispatcher.shutdown().await;
    let _ = sweeper.await;
    let _ = smtp_handle.await;

    info!("push gateway stopped");
    Ok(())
}
