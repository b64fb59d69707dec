//! Login, refresh and logout tests

use serde_json::{json, Value};
use sp_governance::{models::UserRole, services::AuthService};

use crate::common::TestApp;

#[tokio::test]
async fn test_login_returns_working_tokens() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::Auditor).await;

    let response = app
        .post_json(
            "/api/v1/auth/login",
            json!({ "username": user.user.username, "password": user.password }),
        )
        .await;
    response.assert_ok();
    let auth: Value = response.json();
    assert_eq!(auth["token_type"], "Bearer");
    assert_eq!(auth["expires_in"], 24 * 3600);
    assert_eq!(auth["user"]["role"], "auditor");
    assert!(auth["user"].get("password_hash").is_none());

    let me = app
        .get_as("/api/v1/auth/me", auth["access_token"].as_str().unwrap())
        .await;
    me.assert_ok();
    let me: Value = me.json();
    assert_eq!(me["id"], json!(user.user.id));
}

#[tokio::test]
async fn test_wrong_password_is_rejected_and_recorded() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::SiteOwner).await;
    let auditor = app.create_user(UserRole::Auditor).await;

    app.post_json(
        "/api/v1/auth/login",
        json!({ "username": user.user.username, "password": "wrong-password" }),
    )
    .await
    .assert_unauthorized();

    let actions: Value = app
        .get_as("/api/v1/audit/actions?action=login", &auditor.token)
        .await
        .json();
    assert_eq!(actions["total"], 1);
    assert_eq!(actions["actions"][0]["status"], "failed");
}

#[tokio::test]
async fn test_disabled_user_cannot_log_in() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::SiteOwner).await;
    AuthService::new(app.state.db.clone())
        .set_active(&user.user.id, false)
        .await
        .unwrap();

    app.post_json(
        "/api/v1/auth/login",
        json!({ "username": user.user.username, "password": user.password }),
    )
    .await
    .assert_forbidden();
}

#[tokio::test]
async fn test_refresh_issues_new_tokens() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::Executive).await;

    let auth: Value = app
        .post_json(
            "/api/v1/auth/login",
            json!({ "username": user.user.username, "password": user.password }),
        )
        .await
        .json();

    let response = app
        .post_json(
            "/api/v1/auth/refresh",
            json!({ "refresh_token": auth["refresh_token"] }),
        )
        .await;
    response.assert_ok();
    let refreshed: Value = response.json();
    assert!(refreshed["access_token"].is_string());

    // Access tokens are not accepted for refresh, refresh tokens not for API calls
    app.post_json(
        "/api/v1/auth/refresh",
        json!({ "refresh_token": auth["access_token"] }),
    )
    .await
    .assert_unauthorized();
    app.get_as("/api/v1/auth/me", auth["refresh_token"].as_str().unwrap())
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn test_logout() {
    let app = TestApp::new().await;
    let response = app.post_json("/api/v1/auth/logout", json!({})).await;

    response.assert_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Successfully logged out");
}
