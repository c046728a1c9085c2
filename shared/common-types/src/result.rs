use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

/// Record of one delivery attempt against one endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResult {
    /// Platform the attempt was made on
    pub platform: String,
    /// Configured endpoint name
    pub webhook: String,
    /// Attempt outcome
    pub status: DeliveryStatus,
    /// Human-readable detail
    pub message: String,
    /// Completion time of the attempt
    pub timestamp: DateTime<Utc>,
}

impl PushResult {
    /// Builds a successful result stamped with the current time
    #[must_use]
    pub fn success(platform: impl Into<String>, webhook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(platform, webhook, DeliveryStatus::Success, message)
    }

    /// Builds a failed result stamped with the current time
    #[must_use]
    pub fn failed(platform: impl Into<String>, webhook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(platform, webhook, DeliveryStatus::Failed, message)
    }

    fn new(
        platform: impl Into<String>,
        webhook: impl Into<String>,
        status: DeliveryStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            webhook: webhook.into(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Whether the attempt succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}
