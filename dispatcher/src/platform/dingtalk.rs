//! DingTalk custom-robot webhook adapter

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
use url::Url;

use super::Platform;

pub struct DingtalkPlatform {
    client: reqwest::Client,
    timeout: Duration,
}

impl DingtalkPlatform {
    #[must_use]
    pub const fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[derive(Deserialize)]
struct DingtalkReply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[async_trait]
impl Platform for DingtalkPlatform {
    fn name(&self) -> &'static str {
        "dingtalk"
    }

    async fn send(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult {
        let payload = match request.style {
            Style::Card => card_message(request),
            Style::Text => text_message(request),
        };

        let target = endpoint
            .secret
            .as_deref()
            .map_or_else(|| endpoint.target.clone(), |secret| signed_url(&endpoint.target, secret));

        let response = self
            .client
            .post(target)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<DingtalkReply>().await {
                    Ok(reply) if reply.errcode == 0 => PushResult::success(
                        self.name(),
                        endpoint.name.as_str(),
                        "dingtalk message delivered",
                    ),
                    Ok(reply) => PushResult::failed(
                        self.name(),
                        endpoint.name.as_str(),
                        format!("dingtalk api error {}: {}", reply.errcode, reply.errmsg),
                    ),
                    Err(err) => PushResult::failed(
                        self.name(),
                        endpoint.name.as_str(),
                        format!("failed to decode dingtalk response: {err}"),
                    ),
                }
            }
            Ok(response) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("dingtalk returned status {}", response.status()),
            ),
            Err(err) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("dingtalk request failed: {err}"),
            ),
        }
    }
}

/// Robot signature: `&timestamp=…&sign=…` appended to the webhook URL,
/// where the signature is HMAC-SHA256 over `timestamp\nsecret`
fn signed_url(webhook_url: &str, secret: &str) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let string_to_sign = format!("{timestamp}\n{secret}");
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    Url::parse(webhook_url).map_or_else(
        |_| webhook_url.to_string(),
        |mut url| {
            url.query_pairs_mut()
                .append_pair("timestamp", &timestamp.to_string())
                .append_pair("sign", &signature);
            url.to_string()
        },
    )
}

fn type_icon(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Error => "❌",
        MessageType::Warning => "⚠️",
        MessageType::Info => "ℹ️",
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

fn card_message(request: &PushRequest) -> Value {
    let icon = type_icon(request.message_type);
    json!({
        "msgtype": "actionCard",
        "actionCard": {
            "title": format!("{icon} {}", request.content.title),
            "text": format!(
                "### {icon} {}\n\n{}\n\n---\n*Sent {}*",
                request.content.title,
                request.content.msg,
                Utc::now().format("%Y-%m-%d %H:%M:%S"),
            ),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_url_appends_timestamp_and_sign() {
        let signed = signed_url("https://oapi.dingtalk.com/robot/send?access_token=abc", "s");
        let url = Url::parse(&signed).unwrap();
        let params: Vec<_> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert!(params.contains(&"access_token".to_string()));
        assert!(params.contains(&"timestamp".to_string()));
        assert!(params.contains(&"sign".to_string()));
    }

    #[test]
    fn card_payload_is_an_action_card() {
        let request = PushRequest {
            recipient_alias: "ops".to_string(),
            message_type: MessageType::Error,
            platform: None,
            strategy: common_types::Strategy::All,
            style: Style::Card,
            content: common_types::MessageContent {
                title: "deploy failed".to_string(),
                msg: "rollback initiated".to_string(),
            },
        };

        let payload = card_message(&request);
        assert_eq!(payload["msgtype"], "actionCard");
        assert!(payload["actionCard"]["text"]
            .as_str()
            .unwrap()
            .contains("rollback initiated"));
    }
}
