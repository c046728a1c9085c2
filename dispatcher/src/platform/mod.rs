//! Platform adapters and the registry dispatch goes through
//!
//! Adapters are stateless I/O leaves: one network attempt per call,
//! bounded by the configured timeout, and every failure reported as a
//! failed result rather than an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common_types::{Endpoint, PushRequest, PushResult, SystemConfig};
use push_storage::NotificationStore;
use smtp_relay::RelayService;

mod dingtalk;
mod email;
mod feishu;
mod system;
mod wecom;

pub use dingtalk::DingtalkPlatform;
pub use email::EmailPlatform;
pub use feishu::FeishuPlatform;
pub use system::SystemPlatform;
pub use wecom::WecomPlatform;

/// One delivery platform
#[async_trait]
pub trait Platform: Send + Sync {
    /// Registry key of the platform
    fn name(&self) -> &'static str;

    /// Delivers one message to one endpoint
    ///
    /// Never fails out-of-band: transport errors, bad statuses, and
    /// platform API errors all come back as a failed [`PushResult`].
    async fn send(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult;
}

/// Registry of adapters keyed by platform name
///
/// Adding a platform is a registration, not an executor change.
#[derive(Default)]
pub struct PlatformRegistry {
    platforms: HashMap<String, Arc<dyn Platform>>,
}

impl PlatformRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own name
    pub fn register(&mut self, platform: Arc<dyn Platform>) {
        self.platforms.insert(platform.name().to_string(), platform);
    }

    /// Dispatches one send through the named adapter
    pub async fn send(
        &self,
        platform_name: &str,
        endpoint: &Endpoint,
        request: &PushRequest,
    ) -> PushResult {
        match self.platforms.get(platform_name) {
            Some(platform) => platform.send(endpoint, request).await,
            None => PushResult::failed(
                platform_name,
                endpoint.name.as_str(),
                format!("unsupported platform: {platform_name}"),
            ),
        }
    }
}

/// Builds the registry with every built-in adapter
#[must_use]
pub fn standard_registry(
    settings: &crate::config::QueueSettings,
    relay: Arc<RelayService>,
    notifications: Arc<NotificationStore>,
    system: &SystemConfig,
) -> PlatformRegistry {
    let client = reqwest::Client::new();
    let timeout = Duration::from_secs(settings.timeout.max(1));

    let mut registry = PlatformRegistry::new();
    registry.register(Arc::new(FeishuPlatform::new(client.clone(), timeout)));
    registry.register(Arc::new(DingtalkPlatform::new(client.clone(), timeout)));
    registry.register(Arc::new(WecomPlatform::new(client.clone(), timeout)));
    registry.register(Arc::new(EmailPlatform::new(relay)));
    registry.register(Arc::new(SystemPlatform::new(
        notifications,
        system,
        client,
        "notifications".into(),
    )));
    registry
}
