use std::collections::HashMap;
use std::sync::Arc;

use common_types::{PushRequest, RecipientConfig, SystemConfig};
use push_storage::TaskStore;

use crate::config::QueueSettings;
use crate::platform::PlatformRegistry;

/// One unit of work flowing through the job queue
#[derive(Debug, Clone)]
pub struct PushJob {
    /// Task record the outcomes are written to
    pub task_id: String,
    /// The request to dispatch
    pub request: PushRequest,
}

/// Shared dependencies of the worker pool
///
/// Built once at startup and handed to the dispatcher; workers never
/// hold per-job state beyond the job itself.
pub struct DispatchContext {
    pub task_store: Arc<TaskStore>,
    pub registry: Arc<PlatformRegistry>,
    pub recipients: Arc<HashMap<String, RecipientConfig>>,
    pub system: SystemConfig,
    pub settings: QueueSettings,
}

/// Why a job was not admitted to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    /// The queue was full at the instant of admission
    #[error("queue full")]
    QueueFull,
    /// The dispatcher is shutting down
    #[error("dispatcher is shutting down")]
    Cancelled,
}
