//! Shared harness for dispatcher integration tests: scripted in-process
//! platform adapters and a running worker pool over real stores.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common_types::{
    Endpoint, MessageContent, MessageType, PlatformConfig, PushRequest, PushResult,
    RecipientConfig, Strategy, Style, SystemConfig, WebhookEndpoint,
};
use dispatcher::{
    Dispatcher, DispatchContext, JobSender, Platform, PlatformRegistry, PushJob, QueueSettings,
};
use push_storage::{Task, TaskStore};

/// Adapter with scripted per-endpoint outcomes and call recording
pub struct ScriptedPlatform {
    name: &'static str,
    outcomes: HashMap<String, bool>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedPlatform {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            outcomes: HashMap::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Scripts the outcome for one endpoint name
    pub fn endpoint(mut self, endpoint_name: &str, succeed: bool) -> Self {
        self.outcomes.insert(endpoint_name.to_string(), succeed);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Endpoint names in the order they were attempted
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// High-water mark of concurrently running sends
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for ScriptedPlatform {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, endpoint: &Endpoint, _request: &PushRequest) -> PushResult {
        self.calls.lock().unwrap().push(endpoint.name.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let succeed = self.outcomes.get(&endpoint.name).copied().unwrap_or(true);
        if succeed {
            PushResult::success(self.name, endpoint.name.as_str(), "scripted success")
        } else {
            PushResult::failed(self.name, endpoint.name.as_str(), "scripted failure")
        }
    }
}

/// Chat-style platform entry with webhook endpoints
pub fn chat_platform(name: &str, enabled: bool, endpoints: &[&str]) -> PlatformConfig {
    PlatformConfig {
        platform: name.to_string(),
        enabled,
        webhooks: endpoints
            .iter()
            .map(|endpoint| WebhookEndpoint {
                url: format!("https://hooks.example/{name}/{endpoint}"),
                secret: String::new(),
                name: (*endpoint).to_string(),
            })
            .collect(),
        recipients: Vec::new(),
        notifications: Vec::new(),
    }
}

pub fn recipient(platforms: Vec<PlatformConfig>) -> RecipientConfig {
    RecipientConfig {
        name: "Ops Team".to_string(),
        platforms,
    }
}

pub fn request(strategy: Strategy, platform: Option<&str>) -> PushRequest {
    PushRequest {
        recipient_alias: "ops".to_string(),
        message_type: MessageType::Info,
        platform: platform.map(ToString::to_string),
        strategy,
        style: Style::Text,
        content: MessageContent {
            title: "title".to_string(),
            msg: "body".to_string(),
        },
    }
}

/// A running dispatcher over fresh stores
pub struct Harness {
    pub task_store: Arc<TaskStore>,
    pub sender: JobSender,
    pub dispatcher: Dispatcher,
}

pub fn start_harness(
    registry: PlatformRegistry,
    recipient: RecipientConfig,
    system: SystemConfig,
    settings: QueueSettings,
) -> Harness {
    let task_store = Arc::new(TaskStore::new());
    let mut recipients = HashMap::new();
    recipients.insert("ops".to_string(), recipient);

    let ctx = Arc::new(DispatchContext {
        task_store: task_store.clone(),
        registry: Arc::new(registry),
        recipients: Arc::new(recipients),
        system,
        settings,
    });

    let dispatcher = Dispatcher::start(ctx);
    let sender = dispatcher.sender();
    Harness {
        task_store,
        sender,
        dispatcher,
    }
}

/// Creates a task, enqueues it, and waits for a terminal state
pub async fn push_and_wait(harness: &Harness, request: PushRequest) -> Task {
    let task = harness.task_store.create(request.clone());
    harness
        .sender
        .enqueue(PushJob {
            task_id: task.id.clone(),
            request,
        })
        .expect("enqueue failed");
    wait_for_terminal(&harness.task_store, &task.id).await
}

pub async fn wait_for_terminal(store: &Arc<TaskStore>, id: &str) -> Task {
    for _ in 0..500 {
        if let Some(task) = store.get(id) {
            if task.is_terminal() {
                return task;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {id} never reached a terminal state");
}
