mod common;

use axum::http::StatusCode;
use common::*;

#[tokio::test]
async fn health_reports_both_stores() {
    let app = TestApp::new().await;

    let (status, body) = app.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["credential_store"], "up");
    assert_eq!(body["checks"]["session_store"], "up");
}

#[tokio::test]
async fn openapi_document_lists_the_routes() {
    let app = TestApp::new().await;

    let (status, doc) = app.request("GET", "/.well-known/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"].get("/api/v1/login").is_some());
    assert!(doc["paths"].get("/api/v1/usage").is_some());
    assert!(doc["components"]["securitySchemes"].get("bearer_auth").is_some());
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::new().await;

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::builder()
            .uri("/health")
            .header("x-request-id", "req-42")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
    assert!(response.headers().contains_key("x-content-type-options"));
}
