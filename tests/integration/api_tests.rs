//! Health endpoints and routing basics

use crate::common::TestApp;

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health").await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_detailed_health_reports_database() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/detailed").await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["components"]["database"]["status"], "healthy");
    assert_eq!(json["inventory"]["sites"], 0);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new().await;
    app.get("/api/v1/health/live").await.assert_ok();
    app.get("/api/v1/health/ready").await.assert_ok();
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    app.get("/api/v1/sites").await.assert_unauthorized();
    app.get("/api/v2/storage/summary").await.assert_unauthorized();
    app.get("/api/v1/2fa/status").await.assert_unauthorized();
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = TestApp::new().await;
    app.get_as("/api/v1/sites", "not-a-jwt")
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = TestApp::new().await;
    app.get("/api/v1/nonexistent").await.assert_not_found();
}
