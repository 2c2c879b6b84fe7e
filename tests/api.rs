mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::Harness;
use one_timer::{
    api::{create_router, ServerState},
    state::DEFAULT_TIMER_ID,
};

fn app(h: &Harness) -> Router {
    let ctx = h.context(false);
    ctx.reconcile().unwrap();
    create_router(Arc::new(ServerState::new(ctx, "127.0.0.1", 0)))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test(start_paused = true)]
async fn test_health() {
    let h = Harness::with_tokio_clock();
    let app = app(&h);

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test(start_paused = true)]
async fn test_resume_shows_card_and_status() {
    let h = Harness::with_tokio_clock();
    let app = app(&h);

    let (status, _) = call(&app, "GET", "/card", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, "POST", "/resume", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["status"], "running");
    assert_eq!(body["timer"]["remaining_ms"], 60_000);

    let (status, body) = call(&app, "GET", "/card", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["card"]["timer_id"], DEFAULT_TIMER_ID);
    assert_eq!(body["card"]["content"]["is_paused"], false);
    assert_eq!(body["stale"], false);

    let (status, body) = call(&app, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["card_active"], true);
    assert_eq!(body["countdown_active"], true);
    assert_eq!(h.surface.live_count(DEFAULT_TIMER_ID), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_transitions_are_conflicts() {
    let h = Harness::with_tokio_clock();
    let app = app(&h);

    let (status, body) = call(&app, "POST", "/cancel", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("already reset"));

    let (status, _) = call(&app, "POST", "/pause", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&app, "POST", "/resume", None).await;
    let (status, _) = call(&app, "POST", "/resume", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, "POST", "/duration", Some(json!({ "seconds": 30 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn test_pause_then_cancel() {
    let h = Harness::with_tokio_clock();
    let app = app(&h);

    call(&app, "POST", "/resume", None).await;
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;

    let (status, body) = call(&app, "POST", "/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["status"], "paused");
    assert_eq!(body["timer"]["remaining_ms"], 50_000);

    let (_, body) = call(&app, "GET", "/card", None).await;
    assert_eq!(body["card"]["content"]["is_paused"], true);
    assert_eq!(body["remaining_ms"], 50_000);

    let (status, body) = call(&app, "POST", "/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["status"], "idle");
    let (status, _) = call(&app, "GET", "/card", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_set_duration() {
    let h = Harness::with_tokio_clock();
    let app = app(&h);

    let (status, body) = call(
        &app,
        "POST",
        "/duration",
        Some(json!({ "seconds": 90, "sound": "gong" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["total_ms"], 90_000);
    assert_eq!(body["timer"]["sound"], "gong");

    let (status, _) = call(&app, "POST", "/duration", Some(json!({ "seconds": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
