//! Router-level API tests: envelope shape, validation, and an
//! end-to-end push through the real dispatcher against a console sink

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common_types::{
    PlatformConfig, RecipientConfig, SystemConfig, SystemEndpoint, SystemSinkKind,
};
use dispatcher::{standard_registry, DispatchContext, Dispatcher, QueueSettings};
use gateway::server::build_router;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use push_storage::{NotificationStore, TaskStore};
use serde_json::{json, Value};
use smtp_relay::{RelayConfig, RelayService};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    task_store: Arc<TaskStore>,
    notification_store: Arc<NotificationStore>,
    _dispatcher: Dispatcher,
}

fn test_app() -> TestApp {
    let task_store = Arc::new(TaskStore::new());
    let notification_store = Arc::new(NotificationStore::new(64));
    let relay = Arc::new(RelayService::new(
        RelayConfig::default(),
        notification_store.clone(),
    ));

    let mut recipients = HashMap::new();
    recipients.insert(
        "ops".to_string(),
        RecipientConfig {
            name: "Ops Team".to_string(),
            platforms: vec![PlatformConfig {
                platform: "system".to_string(),
                enabled: true,
                webhooks: Vec::new(),
                recipients: Vec::new(),
                notifications: vec![SystemEndpoint {
                    kind: SystemSinkKind::Console,
                    name: "tty".to_string(),
                    url: None,
                }],
            }],
        },
    );
    let recipients = Arc::new(recipients);

    let system = SystemConfig::default();
    let settings = QueueSettings::default();
    let registry = standard_registry(&settings, relay.clone(), notification_store.clone(), &system);

    let ctx = Arc::new(DispatchContext {
        task_store: task_store.clone(),
        registry: Arc::new(registry),
        recipients: recipients.clone(),
        system,
        settings,
    });
    let dispatcher = Dispatcher::start(ctx);

    let router = build_router(
        task_store.clone(),
        notification_store.clone(),
        relay,
        dispatcher.sender(),
        recipients,
    );

    TestApp {
        router,
        task_store,
        notification_store,
        _dispatcher: dispatcher,
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    decompose(response).await
}

async fn put(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    decompose(response).await
}

async fn delete(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    decompose(response).await
}

async fn post_json(router: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    decompose(response).await
}

async fn decompose(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn push_body() -> Value {
    json!({
        "recipient_alias": "ops",
        "content": { "title": "deploy done", "msg": "v42 is live" },
    })
}

#[tokio::test]
async fn health_returns_the_envelope() {
    let app = test_app();

    let (status, body) = get(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn push_accepts_and_runs_to_completion() {
    let app = test_app();

    let (status, body) = post_json(&app.router, "/api/v1/push", &push_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["recipient"], "Ops Team");
    assert_eq!(body["data"]["strategy"], "failover");
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    // The console sink needs no network, so the job completes quickly.
    let mut task = Value::Null;
    for _ in 0..200 {
        let (status, body) = get(&app.router, &format!("/api/v1/task/{task_id}")).await;
        assert_eq!(status, StatusCode::OK);
        let fetched = body["data"].clone();
        let state = fetched["status"].as_str().unwrap_or_default().to_string();
        if ["success", "failed", "partial"].contains(&state.as_str()) {
            task = fetched;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(task["status"], "success");
    assert_eq!(task["progress"]["total"], 1);
    assert_eq!(task["results"][0]["platform"], "system");
}

#[tokio::test]
async fn push_rejects_a_malformed_body() {
    let app = test_app();

    let (status, body) =
        post_json(&app.router, "/api/v1/push", &json!({ "recipient_alias": "ops" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(app.task_store.is_empty());
}

#[tokio::test]
async fn push_rejects_an_unknown_strategy_value() {
    let app = test_app();

    let mut body = push_body();
    body["strategy"] = json!("broadcast");
    let (status, reply) = post_json(&app.router, "/api/v1/push", &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["code"], 400);
}

#[tokio::test]
async fn push_rejects_an_empty_title() {
    let app = test_app();

    let mut body = push_body();
    body["content"]["title"] = json!("");
    let (status, reply) = post_json(&app.router, "/api/v1/push", &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(reply["message"].as_str().unwrap().contains("title"));
}

#[tokio::test]
async fn push_rejects_an_unknown_recipient() {
    let app = test_app();

    let mut body = push_body();
    body["recipient_alias"] = json!("nobody");
    let (status, reply) = post_json(&app.router, "/api/v1/push", &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(reply["message"]
        .as_str()
        .unwrap()
        .contains("unknown recipient"));
}

#[tokio::test]
async fn missing_task_returns_404() {
    let app = test_app();

    let (status, body) = get(&app.router, "/api/v1/task/does-not-exist").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn notification_crud_round_trip() {
    let app = test_app();
    let request: common_types::PushRequest = serde_json::from_value(json!({
        "recipient_alias": "ops",
        "type": "error",
        "content": { "title": "all channels down", "msg": "no delivery possible" },
    }))
    .unwrap();
    let first = app.notification_store.add("task-1", &request, "test seed");
    let _second = app.notification_store.add("task-2", &request, "test seed");

    let (status, body) = get(&app.router, "/api/v1/notifications").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 2);

    let (status, _) = put(&app.router, &format!("/api/v1/notifications/{first}/read")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app.router, "/api/v1/notifications?status=unread").await;
    assert_eq!(body["data"]["pagination"]["total"], 1);

    let (_, body) = get(&app.router, "/api/v1/notifications/statistics").await;
    assert_eq!(body["data"]["statistics"]["total"], 2);
    assert_eq!(body["data"]["statistics"]["read"], 1);

    let (status, _) = delete(&app.router, &format!("/api/v1/notifications/{first}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&app.router, &format!("/api/v1/notifications/{first}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = delete(&app.router, "/api/v1/notifications").await;
    assert_eq!(body["data"]["cleared_count"], 1);
}

#[tokio::test]
async fn mark_all_read_reports_the_count() {
    let app = test_app();
    let request: common_types::PushRequest = serde_json::from_value(json!({
        "recipient_alias": "ops",
        "content": { "title": "t", "msg": "m" },
    }))
    .unwrap();
    app.notification_store.add("task-1", &request, "seed");
    app.notification_store.add("task-2", &request, "seed");

    let (status, body) = put(&app.router, "/api/v1/notifications/read-all").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["marked_count"], 2);
}

#[tokio::test]
async fn smtp_endpoints_report_the_disabled_relay() {
    let app = test_app();

    let (status, body) = get(&app.router, "/api/v1/smtp/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], false);

    let (_, body) = get(&app.router, "/api/v1/smtp/statistics").await;
    assert_eq!(body["data"]["statistics"]["total_accounts"], 0);
}
