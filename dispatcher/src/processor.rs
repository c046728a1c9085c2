//! Per-worker job processing

use std::sync::Arc;

use common_types::{PushRequest, RecipientConfig, Strategy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::fallback::run_system_fallback;
use crate::strategy::StrategyExecutor;
use crate::types::{DispatchContext, PushJob};

/// One dispatch worker
pub struct JobProcessor {
    worker_id: usize,
    ctx: Arc<DispatchContext>,
}

impl JobProcessor {
    /// Creates a worker bound to the shared context
    #[must_use]
    pub fn new(worker_id: usize, ctx: Arc<DispatchContext>) -> Self {
        Self { worker_id, ctx }
    }

    /// Runs the worker loop until the queue is closed and drained
    ///
    /// Cancellation stops the wait for new jobs, but anything already
    /// queued is still processed before the worker exits.
    pub async fn run(&self, receiver: flume::Receiver<PushJob>, shutdown_token: CancellationToken) {
        info!("dispatch worker {} started", self.worker_id);

        loop {
            tokio::select! {
                biased;
                result = receiver.recv_async() => {
                    match result {
                        Ok(job) => self.process_job(job).await,
                        Err(flume::RecvError::Disconnected) => break,
                    }
                }
                () = shutdown_token.cancelled() => {
                    while let Ok(job) = receiver.try_recv() {
                        self.process_job(job).await;
                    }
                    break;
                }
            }
        }

        info!("dispatch worker {} stopped", self.worker_id);
    }

    async fn process_job(&self, job: PushJob) {
        let PushJob { task_id, request } = job;
        debug!(worker = self.worker_id, %task_id, "processing push job");

        let Some(recipient) = self.ctx.recipients.get(&request.recipient_alias) else {
            self.ctx.task_store.set_error(
                &task_id,
                format!("unknown recipient: {}", request.recipient_alias),
            );
            return;
        };

        if let Some(platform_name) = &request.platform {
            match recipient.platform(platform_name) {
                None => {
                    self.ctx
                        .task_store
                        .set_error(&task_id, format!("unknown platform: {platform_name}"));
                    return;
                }
                Some(platform) if !platform.enabled => {
                    self.ctx
                        .task_store
                        .set_error(&task_id, format!("platform not enabled: {platform_name}"));
                    return;
                }
                Some(_) => {}
            }
        }

        let total = expected_total(recipient, &request);
        if total == 0 {
            self.ctx
                .task_store
                .set_error(&task_id, "no enabled platform has endpoints");
            return;
        }
        self.ctx.task_store.set_total(&task_id, total);

        info!(
            worker = self.worker_id,
            %task_id,
            recipient = %recipient.name,
            strategy = %request.strategy,
            total,
            "dispatching push task"
        );

        let executor = StrategyExecutor::new(self.ctx.clone());
        executor.execute(&task_id, &request, recipient).await;

        if self.ctx.task_store.success_count(&task_id) == 0 {
            run_system_fallback(&self.ctx, &task_id, &request, "all delivery channels failed")
                .await;
        }

        self.ctx.task_store.finalize(&task_id);
    }
}

/// Computes the number of results dispatch is expected to append
///
/// Fail-over counts a single slot for the whole request; the webhook
/// fail-over counts one per platform that has endpoints; the fan-out
/// strategies count every endpoint. An explicit `request.platform`
/// narrows the enumeration to that one platform.
pub(crate) fn expected_total(recipient: &RecipientConfig, request: &PushRequest) -> usize {
    if let Some(platform_name) = &request.platform {
        let Some(platform) = recipient
            .platform(platform_name)
            .filter(|platform| platform.enabled)
        else {
            return 0;
        };
        let endpoints = platform.endpoints().len();
        return match request.strategy {
            Strategy::All | Strategy::WebhookAll | Strategy::Mixed => endpoints,
            Strategy::Failover | Strategy::WebhookFailover => usize::from(endpoints > 0),
        };
    }

    let mut total = 0;
    let mut any_endpoints = false;
    for platform in recipient.enabled_platforms() {
        let endpoints = platform.endpoints().len();
        match request.strategy {
            Strategy::All | Strategy::WebhookAll | Strategy::Mixed => total += endpoints,
            Strategy::WebhookFailover => total += usize::from(endpoints > 0),
            Strategy::Failover => any_endpoints |= endpoints > 0,
        }
    }

    if request.strategy == Strategy::Failover {
        usize::from(any_endpoints)
    } else {
        total
    }
}
