//! End-to-end tests for the happy paths through the gateway.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use api_gateway::config::RateLimitPolicy;
use api_gateway::http::ErrorEnvelope;

mod common;

use common::Seen;

#[tokio::test]
async fn test_rewrite_and_correlation() {
    let seen: Arc<Mutex<Option<Seen>>> = Arc::new(Mutex::new(None));
    let recorder = seen.clone();
    let backend = common::start_programmable_backend(move |request| {
        let recorder = recorder.clone();
        async move {
            let target = request.target.clone();
            *recorder.lock().unwrap() = Some(request);
            (200, target)
        }
    })
    .await;

    let mut auth = common::route("auth", "/auth", backend);
    auth.base_path_rewrite = "/api/v1".to_string();
    let (gateway, _shutdown) = common::start_gateway(common::gateway_config(vec![auth])).await;

    let res = common::client()
        .get(format!("http://{}/auth/login?next=/home", gateway))
        .header("x-request-id", "test-request-123")
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-request-id"], "test-request-123");
    assert_eq!(res.text().await.unwrap(), "/api/v1/login?next=/home");

    let seen = seen.lock().unwrap().clone().expect("backend not called");
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.header("x-request-id"), Some("test-request-123"));
    assert_eq!(seen.header("x-forwarded-for"), Some("127.0.0.1"));
    assert_eq!(seen.header("host"), Some(backend.to_string().as_str()));
}

#[tokio::test]
async fn test_generated_request_ids_are_distinct() {
    let backend = common::start_mock_backend("ok").await;
    let (gateway, _shutdown) =
        common::start_gateway(common::gateway_config(vec![common::route("orders", "/orders", backend)])).await;
    let client = common::client();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let res = client.get(format!("http://{}/orders", gateway)).send().await.unwrap();
        let id = res.headers()["x-request-id"].to_str().unwrap().to_string();
        assert!(!id.is_empty());
        ids.push(id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_post_body_forwarded() {
    let backend = common::start_programmable_backend(|request| async move {
        let content_type = request.header("content-type").unwrap_or_default().to_string();
        (201, format!("{}|{}", content_type, request.body))
    })
    .await;
    let (gateway, _shutdown) =
        common::start_gateway(common::gateway_config(vec![common::route("orders", "/orders", backend)])).await;

    let res = common::client()
        .post(format!("http://{}/orders", gateway))
        .header("content-type", "application/json")
        .body(r#"{"item":"book"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 201);
    assert_eq!(res.text().await.unwrap(), r#"application/json|{"item":"book"}"#);
}

#[tokio::test]
async fn test_backend_status_passes_through() {
    let backend = common::start_programmable_backend(|_| async { (404, "no such order".to_string()) }).await;
    let (gateway, _shutdown) =
        common::start_gateway(common::gateway_config(vec![common::route("orders", "/orders", backend)])).await;

    let res = common::client()
        .get(format!("http://{}/orders/999", gateway))
        .send()
        .await
        .unwrap();

    // The backend's own 404 is relayed untouched, not wrapped in an envelope.
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "no such order");
}

#[tokio::test]
async fn test_missing_content_type_rejected_before_backend() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = common::start_programmable_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { (200, "ok".to_string()) }
    })
    .await;
    let (gateway, _shutdown) =
        common::start_gateway(common::gateway_config(vec![common::route("orders", "/orders", backend)])).await;

    let res = common::client()
        .post(format!("http://{}/orders", gateway))
        .body("plain bytes")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let envelope: ErrorEnvelope = res.json().await.unwrap();
    assert_eq!(envelope.error, "Bad Request");
    assert_eq!(envelope.message, "Missing Content-Type");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_route_rate_limit() {
    let backend = common::start_mock_backend("ok").await;
    let mut orders = common::route("orders", "/orders", backend);
    orders.rate_limit = Some(RateLimitPolicy::new(60_000, 3));
    let (gateway, _shutdown) = common::start_gateway(common::gateway_config(vec![orders])).await;
    let client = common::client();

    for i in 0..3 {
        let res = client.get(format!("http://{}/orders", gateway)).send().await.unwrap();
        assert_eq!(res.status(), 200, "request {} should pass", i + 1);
        assert_eq!(res.headers()["ratelimit-remaining"], (2 - i).to_string().as_str());
    }

    let res = client.get(format!("http://{}/orders", gateway)).send().await.unwrap();
    assert_eq!(res.status(), 429);
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after > 0 && retry_after <= 60);

    let envelope: ErrorEnvelope = res.json().await.unwrap();
    assert_eq!(envelope.error, "Too Many Requests");
    assert!(!envelope.request_id.is_empty());
}

#[tokio::test]
async fn test_health_never_limited() {
    let mut config = common::gateway_config(Vec::new());
    config.gateway.rate_limit = Some(RateLimitPolicy::new(60_000, 1));
    let (gateway, _shutdown) = common::start_gateway(config).await;
    let client = common::client();

    for _ in 0..5 {
        let res = client.get(format!("http://{}/health", gateway)).send().await.unwrap();
        assert_eq!(res.status(), 200);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["status"], "Healthy");
        assert_eq!(body["environment"], "test");
        assert!(body["timestamp"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_root_info() {
    let (gateway, _shutdown) = common::start_gateway(common::gateway_config(Vec::new())).await;

    let res = common::client().get(format!("http://{}/", gateway)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Welcome to API Gateway!");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
