use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use market_cache_admin::{build_router, new_shared_state};
use market_cache_common::AppConfig;
use market_cache_service::RateLimitedCacheService;
use serde_json::{json, Value};
use tower::ServiceExt;

fn build_test_router() -> (axum::Router, Arc<RateLimitedCacheService>) {
    let service = Arc::new(RateLimitedCacheService::new(AppConfig::default()));
    let router = build_router(new_shared_state(Arc::clone(&service)));
    (router, service)
}

async fn send(router: axum::Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(router: axum::Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(router, method, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_reports_component_breakdown() {
    let (router, _service) = build_test_router();
    let (status, body) = send_json(router, Method::GET, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["report"]["overall_healthy"], true);
    assert!(body["report"]["components"]["cache"]["issues"].is_array());
}

#[tokio::test]
async fn stats_include_every_component() {
    let (router, service) = build_test_router();
    service.record_successful_request("2330", json!({"price": 500}), 42.0, "quote");

    let (status, body) = send_json(router, Method::GET, "/api/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rate_limiter"]["global_requests_last_minute"], 1);
    assert_eq!(body["cache_manager"]["cache_entries"], 1);
    assert_eq!(body["request_tracker"]["global"]["total_requests"], 1);
    assert_eq!(body["configuration"]["rate_limiting"]["per_key_interval_secs"], 30.0);
    assert!(body["uptime_secs"].is_u64());
}

#[tokio::test]
async fn invalidate_existing_and_missing_entries() {
    let (router, service) = build_test_router();
    service.record_successful_request("2330", json!(1), 10.0, "quote");

    let (status, body) = send_json(router.clone(), Method::DELETE, "/api/cache/quote/2330").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "invalidated");

    let (status, _) = send_json(router, Method::DELETE, "/api/cache/quote/2330").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_and_clear_cache() {
    let (router, service) = build_test_router();
    service.record_successful_request("2330", json!(1), 10.0, "quote");
    service.record_successful_request("2317", json!(2), 10.0, "quote");

    let (_, body) = send_json(router.clone(), Method::GET, "/api/cache/keys").await;
    assert_eq!(body["keys"], json!(["2317", "2330"]));

    let (status, _) = send_json(router, Method::DELETE, "/api/cache").await;
    assert_eq!(status, StatusCode::OK);
    assert!(service.cached_keys().is_empty());
}

#[tokio::test]
async fn reset_endpoints_restore_budget() {
    let (router, service) = build_test_router();
    service.record_successful_request("2330", json!(1), 10.0, "quote");
    assert!(!service.can_make_request("2330").allowed);

    let (status, _) = send_json(router.clone(), Method::POST, "/api/rate-limits/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert!(service.can_make_request("2330").allowed);

    let (status, _) = send_json(router, Method::POST, "/api/stats/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        service.comprehensive_stats().request_tracker.global.total_requests,
        0
    );
}

#[tokio::test]
async fn service_switch_toggles_flag() {
    let (router, service) = build_test_router();

    let (_, body) = send_json(router.clone(), Method::POST, "/api/service/disable").await;
    assert_eq!(body["enabled"], false);
    assert!(!service.is_enabled());

    let (_, body) = send_json(router, Method::POST, "/api/service/enable").await;
    assert_eq!(body["enabled"], true);
    assert!(service.is_enabled());
}

#[tokio::test]
async fn metrics_are_refreshed_on_scrape() {
    let (router, service) = build_test_router();
    service.record_successful_request("2330", json!(1), 10.0, "quote");

    let (status, body) = send(router, Method::GET, "/api/metrics").await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("market_cache_entries 1"));
    assert!(text.contains("market_cache_upstream_requests_last_minute 1"));
    assert!(text.contains("market_cache_healthy 1"));
}
