//! Escalation to the configured system sinks when every ordinary
//! delivery channel of a task has failed

use std::sync::Arc;

use chrono::Utc;
use common_types::{Endpoint, MessageContent, PushRequest};
use tracing::{debug, warn};

use crate::types::DispatchContext;

/// Delivers the failure notice to each configured system sink
///
/// Each sink call appends a result to the original task; the fallback
/// itself never escalates again, whatever its outcome.
pub(crate) async fn run_system_fallback(
    ctx: &Arc<DispatchContext>,
    task_id: &str,
    request: &PushRequest,
    reason: &str,
) {
    if !ctx.system.enabled || ctx.system.notifications.is_empty() {
        debug!(%task_id, "no system sinks configured, skipping fallback");
        return;
    }

    warn!(%task_id, reason, "escalating to system sinks");
    let fallback = fallback_request(request, task_id, reason);

    for sink in &ctx.system.notifications {
        let endpoint = Endpoint {
            target: sink.kind.to_string(),
            secret: None,
            name: sink.name.clone(),
        };
        let result = ctx.registry.send("system", &endpoint, &fallback).await;
        ctx.task_store.add_result(task_id, result);
    }
}

fn fallback_request(request: &PushRequest, task_id: &str, reason: &str) -> PushRequest {
    PushRequest {
        recipient_alias: request.recipient_alias.clone(),
        message_type: request.message_type,
        platform: None,
        strategy: request.strategy,
        style: request.style,
        content: MessageContent {
            title: request.content.title.clone(),
            msg: format!(
                "{}\n\nReason: {reason}\nTask: {task_id}\nTime: {}",
                request.content.msg,
                Utc::now().format("%Y-%m-%d %H:%M:%S"),
            ),
        },
    }
}
