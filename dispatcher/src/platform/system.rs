//! System-notification sinks: the delivery path of last resort
//!
//! Routes on the endpoint's sink kind. The `http` kind stores into the
//! in-memory notification store and, when a URL is configured for the
//! endpoint name, additionally POSTs a JSON envelope.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common_types::{Endpoint, MessageType, PushRequest, PushResult, SystemConfig};
use push_storage::NotificationStore;
use serde_json::json;
use tracing::{error, info, warn};

use super::Platform;

/// Timeout for the outbound POST of the `http` sink kind
const HTTP_SINK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SystemPlatform {
    notifications: Arc<NotificationStore>,
    urls: HashMap<String, String>,
    client: reqwest::Client,
    notify_dir: PathBuf,
}

impl SystemPlatform {
    /// Builds the adapter from the global system configuration
    ///
    /// `notify_dir` is where the `file` sink appends its records.
    #[must_use]
    pub fn new(
        notifications: Arc<NotificationStore>,
        system: &SystemConfig,
        client: reqwest::Client,
        notify_dir: PathBuf,
    ) -> Self {
        let urls = system
            .notifications
            .iter()
            .filter_map(|sink| {
                sink.url
                    .as_ref()
                    .map(|url| (sink.name.clone(), url.clone()))
            })
            .collect();

        Self {
            notifications,
            urls,
            client,
            notify_dir,
        }
    }

    fn send_to_syslog(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult {
        let line = format!(
            "title: {} | msg: {} | type: {} | strategy: {}",
            request.content.title, request.content.msg, request.message_type, request.strategy,
        );
        match request.message_type {
            MessageType::Error => error!("[system notification] {line}"),
            MessageType::Warning => warn!("[system notification] {line}"),
            MessageType::Info => info!("[system notification] {line}"),
        }

        PushResult::success(
            self.name(),
            endpoint.name.as_str(),
            "system notification written to log",
        )
    }

    async fn send_to_file(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult {
        if let Err(err) = tokio::fs::create_dir_all(&self.notify_dir).await {
            return PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("failed to create notification directory: {err}"),
            );
        }

        let filename = format!("system_notify_{}.txt", Utc::now().format("%Y%m%d_%H%M%S%3f"));
        let path = self.notify_dir.join(filename);
        let content = format!(
            "system notification\n==========================================\n\n\
             {} {}\n\n{}\n\ntype: {}\nstrategy: {}\nstyle: {}\nsent: {}\n",
            type_icon(request.message_type),
            request.content.title,
            request.content.msg,
            request.message_type,
            request.strategy,
            request.style,
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
        );

        match tokio::fs::write(&path, content).await {
            Ok(()) => PushResult::success(
                self.name(),
                endpoint.name.as_str(),
                format!("system notification saved to {}", path.display()),
            ),
            Err(err) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("failed to write notification file: {err}"),
            ),
        }
    }

    fn send_to_console(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult {
        let rule = "=".repeat(60);
        println!("{rule}");
        println!("{} {}", type_icon(request.message_type), request.content.title);
        println!("{rule}");
        println!("{}", request.content.msg);
        println!(
            "type: {} | strategy: {} | style: {}",
            request.message_type, request.strategy, request.style
        );
        println!("{rule}");

        PushResult::success(
            self.name(),
            endpoint.name.as_str(),
            "system notification printed to console",
        )
    }

    async fn send_to_http(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult {
        let id = self
            .notifications
            .add("", request, "system notification stored");

        let Some(url) = self.urls.get(endpoint.name.as_str()) else {
            return PushResult::success(
                self.name(),
                endpoint.name.as_str(),
                format!("system notification stored, id: {id}"),
            );
        };

        let envelope = json!({
            "id": id,
            "title": request.content.title,
            "message": request.content.msg,
            "type": request.message_type,
            "strategy": request.strategy,
            "style": request.style,
            "source": "push-gateway",
            "timestamp": Utc::now(),
        });

        match self
            .client
            .post(url)
            .timeout(HTTP_SINK_TIMEOUT)
            .json(&envelope)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => PushResult::success(
                self.name(),
                endpoint.name.as_str(),
                format!("system notification stored ({id}) and posted"),
            ),
            Ok(response) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("system notification endpoint returned {}", response.status()),
            ),
            Err(err) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("system notification post failed: {err}"),
            ),
        }
    }
}

#[async_trait]
impl Platform for SystemPlatform {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn send(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult {
        match endpoint.target.as_str() {
            "syslog" => self.send_to_syslog(endpoint, request),
            "file" => self.send_to_file(endpoint, request).await,
            "console" => self.send_to_console(endpoint, request),
            "http" => self.send_to_http(endpoint, request).await,
            other => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("unsupported system sink: {other}"),
            ),
        }
    }
}

fn type_icon(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Error => "🔴",
        MessageType::Warning => "🟡",
        MessageType::Info => "🔵",
    }
}
