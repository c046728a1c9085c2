use serde::{Deserialize, Serialize};

/// A named bundle of per-platform endpoint lists
///
/// Platforms are configured as an ordered list; iteration order is the
/// configured order, which the order-sensitive strategies rely on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientConfig {
    /// Display name of the recipient
    pub name: String,
    /// Ordered per-platform endpoint lists
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
}

impl RecipientConfig {
    /// Looks up a platform entry by name
    #[must_use]
    pub fn platform(&self, name: &str) -> Option<&PlatformConfig> {
        self.platforms.iter().find(|p| p.platform == name)
    }

    /// Enabled platforms in configured order
    pub fn enabled_platforms(&self) -> impl Iterator<Item = &PlatformConfig> {
        self.platforms.iter().filter(|p| p.enabled)
    }
}

/// One platform's endpoint list for a recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Platform name (`feishu`, `dingtalk`, `wecom`, `email`, `system`)
    pub platform: String,
    /// Whether this platform participates in dispatch
    #[serde(default)]
    pub enabled: bool,
    /// Webhook endpoints (chat platforms)
    #[serde(default)]
    pub webhooks: Vec<WebhookEndpoint>,
    /// Mail endpoints (`email` platform)
    #[serde(default)]
    pub recipients: Vec<EmailEndpoint>,
    /// Sink endpoints (`system` platform)
    #[serde(default)]
    pub notifications: Vec<SystemEndpoint>,
}

impl PlatformConfig {
    /// Normalizes the platform's endpoints to a unified ordered list
    ///
    /// The order is the configured order; strategies that fail over
    /// between endpoints follow it.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = Vec::new();
        for webhook in &self.webhooks {
            endpoints.push(Endpoint {
                target: webhook.url.clone(),
                secret: (!webhook.secret.is_empty()).then(|| webhook.secret.clone()),
                name: webhook.name.clone(),
            });
        }
        for recipient in &self.recipients {
            endpoints.push(Endpoint {
                target: recipient.email.clone(),
                secret: None,
                name: recipient.name.clone(),
            });
        }
        for sink in &self.notifications {
            endpoints.push(Endpoint {
                target: sink.kind.to_string(),
                secret: None,
                name: sink.name.clone(),
            });
        }
        endpoints
    }
}

/// A webhook delivery address within a chat platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub url: String,
    #[serde(default)]
    pub secret: String,
    pub name: String,
}

/// A mail delivery address within the `email` platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailEndpoint {
    pub email: String,
    pub name: String,
}

/// A sink descriptor within the `system` platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEndpoint {
    /// Sink kind
    #[serde(rename = "type")]
    pub kind: SystemSinkKind,
    pub name: String,
    /// Target URL for the `http` kind
    #[serde(default)]
    pub url: Option<String>,
}

/// Supported system-notification sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SystemSinkKind {
    Syslog,
    File,
    Console,
    Http,
}

/// Global system-notification configuration
///
/// These endpoints receive the fallback delivery when every ordinary
/// channel of a task fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub notifications: Vec<SystemEndpoint>,
}

/// A single delivery address in normalized form
///
/// `target` holds the webhook URL, the mail address, or the system sink
/// kind depending on the owning platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub target: String,
    pub secret: Option<String>,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recipient_fixture() -> RecipientConfig {
        toml::from_str(
            r#"
            name = "Ops Team"

            [[platforms]]
            platform = "feishu"
            enabled = true
            webhooks = [
                { url = "https://feishu.example/hook/1", secret = "s1", name = "primary" },
                { url = "https://feishu.example/hook/2", secret = "", name = "backup" },
            ]

            [[platforms]]
            platform = "email"
            enabled = false
            recipients = [{ email = "ops@example.com", name = "ops-mail" }]

            [[platforms]]
            platform = "system"
            enabled = true
            notifications = [{ type = "http", name = "internal" }]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn platform_order_is_preserved() {
        let recipient = recipient_fixture();
        let names: Vec<_> = recipient
            .platforms
            .iter()
            .map(|p| p.platform.as_str())
            .collect();
        assert_eq!(names, vec!["feishu", "email", "system"]);

        let enabled: Vec<_> = recipient
            .enabled_platforms()
            .map(|p| p.platform.as_str())
            .collect();
        assert_eq!(enabled, vec!["feishu", "system"]);
    }

    #[test]
    fn endpoints_normalize_in_order() {
        let recipient = recipient_fixture();
        let feishu = recipient.platform("feishu").unwrap();
        let endpoints = feishu.endpoints();

        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].name, "primary");
        assert_eq!(endpoints[0].secret.as_deref(), Some("s1"));
        assert_eq!(endpoints[1].name, "backup");
        assert_eq!(endpoints[1].secret, None);

        let system = recipient.platform("system").unwrap();
        assert_eq!(system.endpoints()[0].target, "http");
    }
}
