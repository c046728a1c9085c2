//! Strategy executor: realizes the five fan-out policies
//!
//! Platform iteration follows the recipient's configured order and
//! endpoint iteration follows each platform's configured order; the
//! order-sensitive strategies depend on both. Concurrent fan-out is
//! capped by one shared semaphore per job.

use std::sync::Arc;

use common_types::{Endpoint, PushRequest, RecipientConfig, Strategy};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::types::DispatchContext;

/// Executes one job's fan-out
pub struct StrategyExecutor {
    ctx: Arc<DispatchContext>,
}

impl StrategyExecutor {
    #[must_use]
    pub const fn new(ctx: Arc<DispatchContext>) -> Self {
        Self { ctx }
    }

    /// Runs the requested strategy, recording every attempted outcome
    ///
    /// An explicit `request.platform` bypasses the strategy switch and
    /// walks that platform's endpoints until the first success.
    pub async fn execute(&self, task_id: &str, request: &PushRequest, recipient: &RecipientConfig) {
        if request.platform.is_some() {
            self.execute_platform_only(task_id, request, recipient).await;
            return;
        }

        match request.strategy {
            Strategy::All => self.execute_all(task_id, request, recipient).await,
            Strategy::Failover => self.execute_failover(task_id, request, recipient).await,
            Strategy::WebhookAll => self.execute_webhook_all(task_id, request, recipient).await,
            Strategy::WebhookFailover => {
                self.execute_webhook_failover(task_id, request, recipient)
                    .await;
            }
            Strategy::Mixed => self.execute_mixed(task_id, request, recipient).await,
        }
    }

    /// Single-platform override: endpoints in order, stop on success
    async fn execute_platform_only(
        &self,
        task_id: &str,
        request: &PushRequest,
        recipient: &RecipientConfig,
    ) {
        // The worker has already rejected unknown or disabled platforms.
        let Some(platform) = request
            .platform
            .as_deref()
            .and_then(|name| recipient.platform(name))
            .filter(|platform| platform.enabled)
        else {
            return;
        };

        for endpoint in platform.endpoints() {
            if self
                .attempt(task_id, &platform.platform, &endpoint, request)
                .await
            {
                info!(%task_id, platform = %platform.platform, "explicit platform push succeeded");
                return;
            }
        }
        warn!(%task_id, platform = %platform.platform, "every endpoint of the explicit platform failed");
    }

    /// `all`: the cross product of enabled platforms and their endpoints
    async fn execute_all(&self, task_id: &str, request: &PushRequest, recipient: &RecipientConfig) {
        let semaphore = self.semaphore();
        let mut handles = Vec::new();

        for platform in recipient.enabled_platforms() {
            for endpoint in platform.endpoints() {
                handles.push(self.spawn_send(
                    task_id,
                    &platform.platform,
                    endpoint,
                    request,
                    semaphore.clone(),
                    None,
                ));
            }
        }

        join_all(handles).await;
    }

    /// `failover`: first endpoint per platform, stop at the first success
    async fn execute_failover(
        &self,
        task_id: &str,
        request: &PushRequest,
        recipient: &RecipientConfig,
    ) {
        for platform in recipient.enabled_platforms() {
            let endpoints = platform.endpoints();
            let Some(endpoint) = endpoints.first() else {
                continue;
            };

            if self
                .attempt(task_id, &platform.platform, endpoint, request)
                .await
            {
                info!(%task_id, platform = %platform.platform, "failover succeeded, skipping remaining platforms");
                return;
            }
        }
    }

    /// `webhook_all`: full fan-out within each platform, no short-circuit
    async fn execute_webhook_all(
        &self,
        task_id: &str,
        request: &PushRequest,
        recipient: &RecipientConfig,
    ) {
        let semaphore = self.semaphore();

        for platform in recipient.enabled_platforms() {
            let handles: Vec<_> = platform
                .endpoints()
                .into_iter()
                .map(|endpoint| {
                    self.spawn_send(
                        task_id,
                        &platform.platform,
                        endpoint,
                        request,
                        semaphore.clone(),
                        None,
                    )
                })
                .collect();
            join_all(handles).await;
        }
    }

    /// `webhook_failover`: endpoints in order within each platform
    async fn execute_webhook_failover(
        &self,
        task_id: &str,
        request: &PushRequest,
        recipient: &RecipientConfig,
    ) {
        for platform in recipient.enabled_platforms() {
            let mut platform_success = false;
            for endpoint in platform.endpoints() {
                if self
                    .attempt(task_id, &platform.platform, &endpoint, request)
                    .await
                {
                    platform_success = true;
                    break;
                }
            }
            if !platform_success {
                warn!(%task_id, platform = %platform.platform, "every endpoint of the platform failed");
            }
        }
    }

    /// `mixed`: full fan-out per platform, stop at the first platform
    /// with any success
    async fn execute_mixed(
        &self,
        task_id: &str,
        request: &PushRequest,
        recipient: &RecipientConfig,
    ) {
        let semaphore = self.semaphore();

        for platform in recipient.enabled_platforms() {
            let endpoints = platform.endpoints();
            if endpoints.is_empty() {
                continue;
            }

            // Non-blocking success signal; capacity covers every sender.
            let (success_tx, success_rx) = flume::bounded::<()>(endpoints.len());
            let handles: Vec<_> = endpoints
                .into_iter()
                .map(|endpoint| {
                    self.spawn_send(
                        task_id,
                        &platform.platform,
                        endpoint,
                        request,
                        semaphore.clone(),
                        Some(success_tx.clone()),
                    )
                })
                .collect();
            join_all(handles).await;

            if success_rx.try_recv().is_ok() {
                info!(%task_id, platform = %platform.platform, "platform succeeded, skipping remaining platforms");
                return;
            }
            warn!(%task_id, platform = %platform.platform, "platform failed entirely, trying the next one");
        }
    }

    /// Sends to one endpoint and records the result; returns success
    async fn attempt(
        &self,
        task_id: &str,
        platform: &str,
        endpoint: &Endpoint,
        request: &PushRequest,
    ) -> bool {
        let result = self.ctx.registry.send(platform, endpoint, request).await;
        let succeeded = result.is_success();
        info!(
            %task_id,
            platform,
            endpoint = %endpoint.name,
            status = %result.status,
            "delivery attempt finished"
        );
        self.ctx.task_store.add_result(task_id, result);
        succeeded
    }

    fn spawn_send(
        &self,
        task_id: &str,
        platform: &str,
        endpoint: Endpoint,
        request: &PushRequest,
        semaphore: Arc<Semaphore>,
        success_tx: Option<flume::Sender<()>>,
    ) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let task_id = task_id.to_string();
        let platform = platform.to_string();
        let request = request.clone();

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            let result = ctx.registry.send(&platform, &endpoint, &request).await;
            info!(
                %task_id,
                platform = %platform,
                endpoint = %endpoint.name,
                status = %result.status,
                "delivery attempt finished"
            );
            if result.is_success() {
                if let Some(tx) = &success_tx {
                    let _ = tx.try_send(());
                }
            }
            ctx.task_store.add_result(&task_id, result);
        })
    }

    fn semaphore(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(
            self.ctx.settings.max_concurrent_per_platform.max(1),
        ))
    }
}
