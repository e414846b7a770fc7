//! Integration tests for the health and metrics endpoints.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_health_returns_200_with_status_ok() {
    let service = common::build_service();

    let (status, json) = common::get_json(service.router(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_metrics_starts_at_zero() {
    let service = common::build_service();

    let (status, json) = common::get_json(service.router(), "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["commands_received"], 0);
    assert_eq!(json["publish_failures"], 0);
    assert_eq!(json["rebuild"]["runs"], 0);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let service = common::build_service();

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/accounts")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(service.router(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
