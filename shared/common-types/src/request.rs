use serde::{Deserialize, Serialize};
use validator::Validate;

/// Message severity carried by a push request
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    #[default]
    Info,
    Warning,
    Error,
}

/// Fan-out policy applied to a recipient's platforms and endpoints
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    /// Every endpoint of every enabled platform
    All,
    /// First endpoint per platform, stop on the first success
    #[default]
    Failover,
    /// Every endpoint of every enabled platform, grouped per platform
    WebhookAll,
    /// Endpoints tried in order within each platform, one success per platform
    WebhookFailover,
    /// All endpoints of a platform at once, stop at the first successful platform
    Mixed,
}

/// Rendering style for the outbound message body
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Style {
    #[default]
    Text,
    Card,
}

/// Title and body of a push message
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MessageContent {
    /// Message title
    #[validate(length(min = 1, message = "content.title must not be empty"))]
    pub title: String,
    /// Message body
    #[validate(length(min = 1, message = "content.msg must not be empty"))]
    pub msg: String,
}

/// A caller's push request
///
/// Out-of-set `type`/`strategy`/`style` values are rejected at
/// deserialization time; empty strings are rejected by [`Validate`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PushRequest {
    /// Alias into the configured recipient table
    #[validate(length(min = 1, message = "recipient_alias must not be empty"))]
    pub recipient_alias: String,
    /// Message severity, defaults to `info`
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    /// Optional single-platform override; bypasses the strategy switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Delivery strategy, defaults to `failover`
    #[serde(default)]
    pub strategy: Strategy,
    /// Message style, defaults to `text`
    #[serde(default)]
    pub style: Style,
    /// Message content
    #[validate(nested)]
    pub content: MessageContent,
}
