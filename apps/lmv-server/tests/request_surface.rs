//! End-to-end exercises of the literal scenarios in spec `# 8`, driven
//! in-process against the router via `tower::ServiceExt::oneshot`.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use lmv_domain::ApiConfig;
use lmv_server::Server;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_router(dir: &TempDir, write_token: Option<&str>) -> Router {
    let mut config = ApiConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.passphrase = Some("pass-a".to_owned());
    config.write_token = write_token.map(str::to_owned);

    Server::builder().config(config).build().await.expect("server builds").into_router()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("request completes");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
    let body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    };
    let _ = headers;
    (status, body)
}

fn etag_header(response_headers: &axum::http::HeaderMap) -> Option<String> {
    response_headers.get(axum::http::header::ETAG).map(|v| v.to_str().unwrap().to_owned())
}

async fn send_with_headers(
    router: &Router,
    request: Request<Body>,
) -> (StatusCode, Option<String>, Value) {
    let response = router.clone().oneshot(request).await.expect("request completes");
    let status = response.status();
    let etag = etag_header(response.headers());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
    let body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    };
    (status, etag, body)
}

fn get(path: &str) -> Request<Body> {
    Request::builder().method("GET").uri(path).body(Body::empty()).unwrap()
}

fn patch(if_match: &str, body: Value, actor: &str, reason: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PATCH")
        .uri("/v1/memory")
        .header("content-type", "application/json-patch+json")
        .header("if-match", if_match)
        .header("x-lmv-actor", actor)
        .header("x-lmv-reason", reason);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(serde_json::to_vec(&body).unwrap())).unwrap()
}

#[tokio::test]
async fn fresh_initialization_returns_empty_memory_at_version_zero() {
    let dir = TempDir::new().unwrap();
    let router = test_router(&dir, None).await;

    let (status, etag, body) = send_with_headers(&router, get("/v1/memory")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(etag.as_deref(), Some("\"v0\""));
    assert_eq!(body["memory"]["version"], 0);
    assert_eq!(body["ledger_cursor"], 0);
    for key in ["identity", "methodology", "projects", "rules"] {
        assert_eq!(body["memory"]["blocks"][key], serde_json::json!({}));
    }
}

#[tokio::test]
async fn basic_patch_advances_version_and_appends_ledger_entry() {
    let dir = TempDir::new().unwrap();
    let router = test_router(&dir, None).await;

    let op = serde_json::json!([{"op": "add", "path": "/identity/name", "value": "Alice"}]);
    let (status, etag, body) =
        send_with_headers(&router, patch("\"v0\"", op, "alice", "init", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(etag.as_deref(), Some("\"v1\""));
    assert_eq!(body["memory"]["version"], 1);
    assert_eq!(body["applied_entry_cursor"], 1);

    let (status, page) = send(&router, get("/v1/ledger?since=0&limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = page["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["base_version"], 0);
    assert_eq!(entries[0]["new_version"], 1);
    assert_eq!(entries[0]["prev_hash"], "");
    assert!(entries[0]["entry_hash"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn stale_if_match_is_rejected_with_current_etag() {
    let dir = TempDir::new().unwrap();
    let router = test_router(&dir, None).await;

    let op = serde_json::json!([{"op": "add", "path": "/identity/name", "value": "Alice"}]);
    send_with_headers(&router, patch("\"v0\"", op.clone(), "alice", "init", None)).await;

    let (status, etag, body) =
        send_with_headers(&router, patch("\"v0\"", op, "alice", "retry", None)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(etag.as_deref(), Some("\"v1\""));
    assert_eq!(body["current_etag"], "\"v1\"");
}

#[tokio::test]
async fn write_gate_rejects_missing_or_wrong_token_then_accepts_the_right_one() {
    let dir = TempDir::new().unwrap();
    let router = test_router(&dir, Some("testtoken")).await;
    let op = serde_json::json!([{"op": "add", "path": "/identity/name", "value": "Alice"}]);

    let (status, _) = send(&router, patch("\"v0\"", op.clone(), "alice", "init", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) =
        send(&router, patch("\"v0\"", op.clone(), "alice", "init", Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) =
        send(&router, patch("\"v0\"", op, "alice", "init", Some("testtoken"))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, page) = send(&router, get("/v1/ledger?since=0&limit=10")).await;
    let entry = &page["entries"][0];
    assert_eq!(entry["auth"], "token");
    assert!(!entry.to_string().contains("testtoken"));
}

#[tokio::test]
async fn compact_then_read_preserves_memory() {
    let dir = TempDir::new().unwrap();
    let router = test_router(&dir, None).await;

    for i in 0..3 {
        let op = serde_json::json!([{"op": "add", "path": format!("/identity/field{i}"), "value": i}]);
        send_with_headers(&router, patch(&format!("\"v{i}\""), op, "alice", "seed", None)).await;
    }

    let (before_status, _, before) = send_with_headers(&router, get("/v1/memory")).await;
    assert_eq!(before_status, StatusCode::OK);

    let snapshot_request =
        Request::builder().method("POST").uri("/v1/snapshot").body(Body::empty()).unwrap();
    let (status, result) = send(&router, snapshot_request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["snapshot_cursor"], 3);
    assert_eq!(result["memory_version"], 3);

    let (_, _, after) = send_with_headers(&router, get("/v1/memory")).await;
    assert_eq!(before["memory"], after["memory"]);
}
