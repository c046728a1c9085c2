//! Feishu (Lark) custom-bot webhook adapter

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use common_types::{Endpoint, MessageType, PushRequest, PushResult, Style};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;

use super::Platform;

pub struct FeishuPlatform {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeishuPlatform {
    #[must_use]
    pub const fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[derive(Deserialize)]
struct FeishuReply {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

#[async_trait]
impl Platform for FeishuPlatform {
    fn name(&self) -> &'static str {
        "feishu"
    }

    async fn send(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult {
        let mut payload = match request.style {
            Style::Card => card_message(request),
            Style::Text => text_message(request),
        };

        if let Some(secret) = &endpoint.secret {
            let timestamp = Utc::now().timestamp();
            if let Some(object) = payload.as_object_mut() {
                object.insert("timestamp".to_string(), json!(timestamp.to_string()));
                object.insert("sign".to_string(), json!(sign(secret, timestamp)));
            }
        }

        let response = self
            .client
            .post(&endpoint.target)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<FeishuReply>().await {
                    Ok(reply) if reply.code == 0 => PushResult::success(
                        self.name(),
                        endpoint.name.as_str(),
                        "feishu message delivered",
                    ),
                    Ok(reply) => PushResult::failed(
                        self.name(),
                        endpoint.name.as_str(),
                        format!("feishu api error {}: {}", reply.code, reply.msg),
                    ),
                    Err(err) => PushResult::failed(
                        self.name(),
                        endpoint.name.as_str(),
                        format!("failed to decode feishu response: {err}"),
                    ),
                }
            }
            Ok(response) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("feishu returned status {}", response.status()),
            ),
            Err(err) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("feishu request failed: {err}"),
            ),
        }
    }
}

/// Custom-bot signature: HMAC-SHA256 keyed on `timestamp\nsecret` over an
/// empty message, base64-encoded
fn sign(secret: &str, timestamp: i64) -> String {
    let key = format!("{timestamp}\n{secret}");
    let mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .expect("hmac accepts keys of any length");
    BASE64.encode(mac.finalize().into_bytes())
}

fn type_icon(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Error => "🔴",
        MessageType::Warning => "🟡",
        MessageType::Info => "🔵",
    }
}

fn text_message(request: &PushRequest) -> Value {
    let icon = type_icon(request.message_type);
    json!({
        "msg_type": "text",
        "content": {
            "text": format!("{icon} {}\n{}", request.content.title, request.content.msg),
        },
    })
}

fn card_message(request: &PushRequest) -> Value {
    let icon = type_icon(request.message_type);
    let color = match request.message_type {
        MessageType::Error => "red",
        MessageType::Warning => "orange",
        MessageType::Info => "blue",
    };

    json!({
        "msg_type": "interactive",
        "card": {
            "config": { "wide_screen_mode": true },
            "header": {
                "template": color,
                "title": {
                    "tag": "plain_text",
                    "content": format!("{icon} {}", request.content.title),
                },
            },
            "elements": [
                {
                    "tag": "div",
                    "text": { "tag": "lark_md", "content": request.content.msg },
                },
                { "tag": "hr" },
                {
                    "tag": "div",
                    "text": {
                        "tag": "lark_md",
                        "content": format!("**Sent:** {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
                    },
                },
            ],
        },
    })
}
