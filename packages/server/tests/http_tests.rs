//! Route tests driven through the axum router

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use scribing_flow::{FlowContent, FlowOperation, FlowTheme};
use scribing_server::{router, AppState};
use scribing_sync::{MemoryAuthority, Snapshot, SyncInput, SyncOutput};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app(authority: MemoryAuthority) -> Router {
    router(AppState::new(Arc::new(authority)))
}

async fn post<T: DeserializeOwned>(app: &Router, uri: &str, body: Value) -> (StatusCode, T) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn sync_input(client: &str, version: u64, text: &str) -> Value {
    serde_json::to_value(SyncInput {
        client: client.to_string(),
        version,
        operation: Some(FlowOperation::insert(0, FlowContent::from_text(text))),
        selection: None,
    })
    .unwrap()
}

#[tokio::test]
async fn test_read_returns_snapshot() {
    let app = app(MemoryAuthority::new(
        FlowContent::from_text("Hello"),
        FlowTheme::default(),
    ));
    let (status, snapshot): (_, Snapshot) = post(&app, "/read", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot.version, 0);
    assert_eq!(snapshot.content.text(), "Hello");
}

#[tokio::test]
async fn test_concurrent_syncs_over_http() {
    let app = app(MemoryAuthority::new(FlowContent::empty(), FlowTheme::default()));

    let (status, first): (_, SyncOutput) = post(&app, "/sync", sync_input("a", 0, "X")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first.version, 1);

    let (_, second): (_, SyncOutput) = post(&app, "/sync", sync_input("b", 0, "Y")).await;
    assert_eq!(second.version, 2);
    assert_eq!(
        second.merge,
        Some(FlowOperation::insert(0, FlowContent::from_text("X")))
    );
    assert_eq!(second.presence.len(), 1);

    let (_, snapshot): (_, Snapshot) = post(&app, "/read", serde_json::json!({})).await;
    assert_eq!(snapshot.content.text(), "XY");
}

#[tokio::test]
async fn test_future_version_conflicts() {
    let app = app(MemoryAuthority::new(FlowContent::empty(), FlowTheme::default()));
    let (status, body): (_, Value) = post(&app, "/sync", sync_input("a", 9, "X")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("version 9"));
}

#[tokio::test]
async fn test_missing_document_is_not_found() {
    let app = app(MemoryAuthority::missing());
    let (status, _): (_, Value) = post(&app, "/read", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
