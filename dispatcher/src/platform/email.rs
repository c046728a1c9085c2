//! Mail adapter: renders the message as HTML and submits it through the
//! relay core's account pool

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common_types::{Endpoint, MessageType, PushRequest, PushResult, Style};
use smtp_relay::{EmailMessage, RelayService};

use super::Platform;

pub struct EmailPlatform {
    relay: Arc<RelayService>,
}

impl EmailPlatform {
    #[must_use]
    pub const fn new(relay: Arc<RelayService>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl Platform for EmailPlatform {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, endpoint: &Endpoint, request: &PushRequest) -> PushResult {
        let (prefix, color, icon) = type_theme(request.message_type);
        let subject = format!("{prefix} {}", request.content.title);
        let body = match request.style {
            Style::Card => card_body(request, color, icon),
            Style::Text => text_body(request, color, icon),
        };

        let message = EmailMessage {
            to: vec![endpoint.target.clone()],
            subject,
            body,
            is_html: true,
        };

        match self.relay.send(&message).await {
            Ok(()) => PushResult::success(self.name(), endpoint.name.as_str(), "email delivered"),
            Err(err) => PushResult::failed(
                self.name(),
                endpoint.name.as_str(),
                format!("smtp send failed: {err}"),
            ),
        }
    }
}

const fn type_theme(message_type: MessageType) -> (&'static str, &'static str, &'static str) {
    match message_type {
        MessageType::Error => ("[Error]", "#dc3545", "🔴"),
        MessageType::Warning => ("[Warning]", "#ffc107", "🟡"),
        MessageType::Info => ("[Info]", "#17a2b8", "🔵"),
    }
}

fn text_body(request: &PushRequest, color: &str, icon: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: {color}; border-left: 4px solid {color}; padding-left: 10px;">{icon} {title}</h2>
    <div style="background-color: #f8f9fa; padding: 15px; border-radius: 5px;">
      <p style="margin: 0; white-space: pre-wrap;">{msg}</p>
    </div>
    <hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;">
    <p style="color: #666; font-size: 12px; margin: 0;">Sent {sent} · type {kind}</p>
  </div>
</body>
</html>"#,
        title = request.content.title,
        msg = request.content.msg,
        sent = Utc::now().format("%Y-%m-%d %H:%M:%S"),
        kind = request.message_type,
    )
}

fn card_body(request: &PushRequest, color: &str, icon: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; background-color: #f5f5f5; padding: 20px;">
  <div style="max-width: 600px; margin: 0 auto; background-color: white; border-radius: 8px; overflow: hidden;">
    <div style="background-color: {color}; color: white; padding: 20px; text-align: center;">
      <h1 style="margin: 0; font-size: 24px;">{icon} {title}</h1>
    </div>
    <div style="padding: 30px;">
      <div style="background-color: #f8f9fa; border-left: 4px solid {color}; padding: 20px; border-radius: 4px;">
        <p style="margin: 0; white-space: pre-wrap; font-size: 16px;">{msg}</p>
      </div>
      <div style="background-color: #e9ecef; padding: 15px; border-radius: 4px; margin-top: 20px; color: #6c757d; font-size: 13px;">
        Sent {sent}<br>Type {kind}<br>Strategy {strategy}
      </div>
    </div>
    <div style="background-color: #f8f9fa; padding: 15px; text-align: center; border-top: 1px solid #dee2e6;">
      <p style="margin: 0; color: #6c757d; font-size: 12px;">Automated delivery, do not reply</p>
    </div>
  </div>
</body>
</html>"#,
        title = request.content.title,
        msg = request.content.msg,
        sent = Utc::now().format("%Y-%m-%d %H:%M:%S"),
        kind = request.message_type,
        strategy = request.strategy,
    )
}
