//! WeCom (WeChat Work) group-robot webhook adapter

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use common_types::{Endpoint, MessageType, PushRequest, PushResult, Style};
use md5::{Digest, Md5};
use serde::Deserialize;
use serde_json::{json, Value};

use super::Platform;

pub struct WecomPlatform {
    client: reqwest::Client,
    timeout: Duration,
}

impl WecomPlatform {
    #[must_use]
    pub const fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[derive(Deserialize)]
struct WecomReply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[async_trait]
impl Platform for WecomPlatform {
    fn name(&self) -> &'static str {
        "wecom"
    }

    async fn send(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult {
        let payload = match request.style {
            Style::Card => markdown_message(request),
            Style::Text => text_message(request),
        };
        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(err) => {
                return PushResult::failed(
                    self.name(),
                    endpoint.name.as_str(),
                    format!("failed to encode wecom payload: {err}"),
                );
            }
        };

        let mut builder = self
            .client
            .post(&endpoint.target)
            .timeout(self.timeout)
            .header("Content-Type", "application/json");
        if let Some(secret) = &endpoint.secret {
            builder = builder.header("X-Signature", sign(&body, secret));
        }

        match builder.body(body).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<WecomReply>().await {
                    Ok(reply) if reply.errcode == 0 => PushResult::success(
                        self.name(),
                        endpoint.name.as_str(),
                        "wecom message delivered",
                    ),
                    Ok(reply) => PushResult::failed(
                        self.name(),
                        endpoint.name.as_str(),
                        format!("wecom api error {}: {}", reply.errcode, reply.errmsg),
                    ),
                    Err(err) => PushResult::failed(
                        self.name(),
                        endpoint.name.as_str(),
                        format!("failed to decode wecom response: {err}"),
                    ),
                }
            }
            Ok(response) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("wecom returned status {}", response.status()),
            ),
            Err(err) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("wecom request failed: {err}"),
            ),
        }
    }
}

/// Payload-integrity signature: base64 over the MD5 of the serialized
/// payload concatenated with the shared secret
fn sign(payload: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(payload.as_bytes());
    hasher.update(secret.as_bytes());
    BASE64.encode(hasher.finalize())
}

fn type_icon(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Error => "🚨",
        MessageType::Warning => "⚠️",
        MessageType::Info => "📋",
    }
}

fn text_message(request: &PushRequest) -> Value {
    let icon = type_icon(request.message_type);
    json!({
        "msgtype": "text",
        "text": {
            "content": format!("{icon} {}\n{}", request.content.title, request.content.msg),
        },
    })
}

fn markdown_message(request: &PushRequest) -> Value {
    let icon = type_icon(request.message_type);
    let color = match request.message_type {
        MessageType::Error => "warning",
        MessageType::Warning => "warning",
        MessageType::Info => "info",
    };

    json!({
        "msgtype": "markdown",
        "markdown": {
            "content": format!(
                "## {icon} {}\n<font color=\"{color}\">{}</font>\n> Sent {}",
                request.content.title,
                request.content.msg,
                Utc::now().format("%Y-%m-%d %H:%M:%S"),
            ),
        },
    })
}
