//! Dispatcher lifecycle: worker pool startup, job admission, and
//! drain-on-shutdown

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::processor::JobProcessor;
use crate::types::{DispatchContext, EnqueueError, PushJob};

/// Owns the job channel and the worker pool
pub struct Dispatcher {
    jobs: flume::Sender<PushJob>,
    shutdown_token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Starts the worker pool against the given context
    #[must_use]
    pub fn start(ctx: Arc<DispatchContext>) -> Self {
        let worker_count = ctx.settings.worker_count.max(1);
        let (jobs, receiver) = flume::bounded::<PushJob>(ctx.settings.buffer_size);
        let shutdown_token = CancellationToken::new();

        let workers = (0..worker_count)
            .map(|worker_id| {
                let processor = JobProcessor::new(worker_id, ctx.clone());
                let receiver = receiver.clone();
                let token = shutdown_token.clone();
                tokio::spawn(async move {
                    processor.run(receiver, token).await;
                })
            })
            .collect();

        info!(
            workers = worker_count,
            buffer = ctx.settings.buffer_size,
            "dispatcher started"
        );

        Self {
            jobs,
            shutdown_token,
            workers,
        }
    }

    /// Returns a cloneable handle for enqueueing jobs
    #[must_use]
    pub fn sender(&self) -> JobSender {
        JobSender {
            jobs: self.jobs.clone(),
            shutdown_token: self.shutdown_token.clone(),
        }
    }

    /// Stops admission and waits for the workers to drain
    ///
    /// Jobs already queued are processed to completion; only new
    /// admissions are rejected once shutdown begins.
    pub async fn shutdown(self) {
        info!("stopping dispatcher");
        self.shutdown_token.cancel();
        drop(self.jobs);

        for handle in self.workers {
            if let Err(err) = handle.await {
                error!(error = %err, "dispatch worker panicked");
            }
        }
        info!("all dispatch workers stopped");
    }
}

/// Cheap handle for admitting jobs from request handlers
#[derive(Clone)]
pub struct JobSender {
    jobs: flume::Sender<PushJob>,
    shutdown_token: CancellationToken,
}

impl JobSender {
    /// Admits a job without blocking
    ///
    /// # Errors
    ///
    /// [`EnqueueError::QueueFull`] when the channel is at capacity and
    /// [`EnqueueError::Cancelled`] once shutdown has begun.
    pub fn enqueue(&self, job: PushJob) -> Result<(), EnqueueError> {
        if self.shutdown_token.is_cancelled() {
            return Err(EnqueueError::Cancelled);
        }

        self.jobs.try_send(job).map_err(|err| match err {
            flume::TrySendError::Full(_) => EnqueueError::QueueFull,
            flume::TrySendError::Disconnected(_) => EnqueueError::Cancelled,
        })
    }
}
