//! Task records and the store tracking per-destination delivery outcomes

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use common_types::{DeliveryStatus, PushRequest, PushResult};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Lifecycle state of a push task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up by a worker
    Pending,
    /// A worker is dispatching
    Processing,
    /// Every recorded attempt succeeded
    Success,
    /// Every recorded attempt failed
    Failed,
    /// Mixed outcomes
    Partial,
}

impl TaskStatus {
    /// Whether the status is a terminal one
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Partial)
    }
}

/// Progress counters for a task
///
/// `success + failed + pending == total` holds whenever the task is at
/// rest; the store recomputes `pending` on every recorded result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Expected number of delivery attempts
    pub total: usize,
    /// Successful attempts so far
    pub success: usize,
    /// Failed attempts so far
    pub failed: usize,
    /// Attempts still outstanding
    pub pending: usize,
}

/// One in-flight push request and its evolving outcome record
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    /// Globally unique task id
    pub id: String,
    /// Lifecycle state
    pub status: TaskStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Completion time, set when the task reaches a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// The original request
    pub request: PushRequest,
    /// Append-only list of per-destination outcomes
    pub results: Vec<PushResult>,
    /// Early-reject failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Progress counters
    pub progress: TaskProgress,
}

impl Task {
    /// Whether the task accepts no further results
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal() || self.error.is_some()
    }
}

/// Retention settings for the task store sweeper
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskSettings {
    /// Seconds between sweeper passes
    pub cleanup_interval: u64,
    /// Seconds a record may live, regardless of state
    pub max_age: u64,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            cleanup_interval: 60,
            max_age: 3600,
        }
    }
}

/// Thread-safe in-memory task store
///
/// Reads dominate (status polling), so the map sits behind a
/// reader-writer lock; no lock is held across an await point.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new pending task for the given request
    pub fn create(&self, request: PushRequest) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            request,
            results: Vec::new(),
            error: None,
            progress: TaskProgress::default(),
        };

        let mut tasks = self.tasks.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.insert(task.id.clone(), task.clone());
        task
    }

    /// Returns a snapshot of the task
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Task> {
        let tasks = self.tasks.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.get(id).cloned()
    }

    /// Sets the expected attempt count and flips the task to `processing`
    pub fn set_total(&self, id: &str, total: usize) {
        self.update(id, |task| {
            task.progress.total = total;
            task.progress.pending = total;
            task.status = TaskStatus::Processing;
        });
    }

    /// Records one delivery attempt
    ///
    /// Counters are updated immediately; terminal status is derived by
    /// [`Self::finalize`] once the dispatch run completes, so recorded
    /// failures preceding a fail-over success never terminate the task
    /// early. Results arriving after a task is terminal are dropped.
    pub fn add_result(&self, id: &str, result: PushResult) {
        self.update(id, |task| {
            if task.is_terminal() {
                debug!(task_id = %task.id, "dropping result for terminal task");
                return;
            }

            match result.status {
                DeliveryStatus::Success => task.progress.success += 1,
                DeliveryStatus::Failed => task.progress.failed += 1,
            }
            task.progress.pending = task
                .progress
                .total
                .saturating_sub(task.progress.success + task.progress.failed);
            task.results.push(result);
        });
    }

    /// Marks the task failed with an explanatory message
    ///
    /// Used for early rejects (unknown recipient, queue full, empty
    /// dispatch); no results are recorded afterwards.
    pub fn set_error(&self, id: &str, error: impl Into<String>) {
        let error = error.into();
        self.update(id, |task| {
            task.status = TaskStatus::Failed;
            task.error = Some(error.clone());
            task.completed_at = Some(Utc::now());
        });
    }

    /// Derives the terminal status once dispatch has completed
    ///
    /// Reconciles the expected total against what was actually recorded
    /// (`total = success + failed`), stamps `completed_at`, and applies
    /// the derivation rule: no failures means `success`, no successes
    /// means `failed`, otherwise `partial`. Idempotent on terminal tasks.
    pub fn finalize(&self, id: &str) {
        self.update(id, |task| {
            if task.is_terminal() {
                return;
            }

            task.progress.total = task.progress.success + task.progress.failed;
            task.progress.pending = 0;
            task.completed_at = Some(Utc::now());
            task.status = if task.progress.failed == 0 {
                TaskStatus::Success
            } else if task.progress.success == 0 {
                TaskStatus::Failed
            } else {
                TaskStatus::Partial
            };
        });
    }

    /// Successful attempts recorded so far for the task
    #[must_use]
    pub fn success_count(&self, id: &str) -> usize {
        let tasks = self.tasks.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.get(id).map_or(0, |task| task.progress.success)
    }

    /// Number of live task records
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts records older than `max_age`, returning the evicted count
    pub fn sweep(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let mut tasks = self.tasks.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, task| now - task.created_at <= max_age);
        before - tasks.len()
    }

    fn update(&self, id: &str, mutate: impl FnOnce(&mut Task)) {
        let mut tasks = self.tasks.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(task) = tasks.get_mut(id) {
            mutate(task);
            task.updated_at = Utc::now();
        }
    }
}

/// Spawns the periodic sweeper for the store
///
/// Runs every `cleanup_interval` seconds until the token is cancelled.
/// Records older than `max_age` are evicted regardless of state.
pub fn run_sweeper(
    store: Arc<TaskStore>,
    settings: TaskSettings,
    token: CancellationToken,
) -> JoinHandle<()> {
    let period = std::time::Duration::from_secs(settings.cleanup_interval.max(1));
    let max_age = i64::try_from(settings.max_age)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so a fresh store is
        // not swept before anything ages.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    info!("task sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let evicted = store.sweep(max_age);
                    if evicted > 0 {
                        info!(evicted, "swept expired tasks");
                    }
                }
            }
        }
    })
}
