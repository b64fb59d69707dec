//! Two-factor authentication tests

use serde_json::{json, Value};
use sp_governance::{models::UserRole, services::totp::Totp};

use crate::common::{TestApp, TestUser};

fn current_code(app: &TestApp, secret: &str) -> String {
    Totp::new(&app.state.config.two_factor)
        .generate_at(secret, chrono::Utc::now().timestamp() as u64)
        .unwrap()
}

/// Enable 2FA for the user, returning the secret and backup codes
async fn enroll(app: &TestApp, user: &TestUser) -> (String, Vec<String>) {
    let response = app.post_empty_as("/api/v1/2fa/enable", &user.token).await;
    response.assert_ok();
    let setup: Value = response.json();
    let secret = setup["totp_secret"].as_str().unwrap().to_string();
    let backup_codes: Vec<String> = serde_json::from_value(setup["backup_codes"].clone()).unwrap();
    assert!(setup["provisioning_uri"]
        .as_str()
        .unwrap()
        .starts_with("otpauth://totp/"));

    app.post_as(
        "/api/v1/2fa/verify-setup",
        &user.token,
        json!({ "totp_code": current_code(app, &secret) }),
    )
    .await
    .assert_ok();

    (secret, backup_codes)
}

fn login_body(user: &TestUser, extra: Value) -> Value {
    let mut body = json!({ "username": user.user.username, "password": user.password });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    body
}

#[tokio::test]
async fn test_status_before_and_after_enrollment() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::SiteOwner).await;

    let status: Value = app.get_as("/api/v1/2fa/status", &user.token).await.json();
    assert_eq!(status["enabled"], false);
    assert_eq!(status["setup_started"], false);

    enroll(&app, &user).await;

    let status: Value = app.get_as("/api/v1/2fa/status", &user.token).await.json();
    assert_eq!(status["enabled"], true);
    assert_eq!(status["backup_codes_remaining"], 10);

    app.post_empty_as("/api/v1/2fa/enable", &user.token)
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_wrong_setup_code_keeps_two_factor_off() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::SiteOwner).await;

    app.post_empty_as("/api/v1/2fa/enable", &user.token)
        .await
        .assert_ok();
    app.post_as(
        "/api/v1/2fa/verify-setup",
        &user.token,
        json!({ "totp_code": "000000x" }),
    )
    .await
    .assert_bad_request();

    let qr: Value = app.get_as("/api/v1/2fa/qr-code", &user.token).await.json();
    assert_eq!(qr["account_name"], user.user.email.as_str());

    let status: Value = app.get_as("/api/v1/2fa/status", &user.token).await.json();
    assert_eq!(status["enabled"], false);
    assert_eq!(status["setup_started"], true);
}

#[tokio::test]
async fn test_login_requires_second_factor_once_enabled() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::Auditor).await;
    let (secret, _) = enroll(&app, &user).await;

    let response = app
        .post_json("/api/v1/auth/login", login_body(&user, json!({})))
        .await;
    response.assert_unauthorized();
    let body: Value = response.json();
    assert_eq!(body["code"], "TWO_FACTOR_REQUIRED");

    app.post_json(
        "/api/v1/auth/login",
        login_body(&user, json!({ "totp_code": "12345678" })),
    )
    .await
    .assert_unauthorized();

    app.post_json(
        "/api/v1/auth/login",
        login_body(&user, json!({ "totp_code": current_code(&app, &secret) })),
    )
    .await
    .assert_ok();
}

#[tokio::test]
async fn test_backup_codes_are_single_use() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::SiteOwner).await;
    let (_, backup_codes) = enroll(&app, &user).await;
    let code = &backup_codes[0];

    app.post_json(
        "/api/v1/auth/login",
        login_body(&user, json!({ "backup_code": code })),
    )
    .await
    .assert_ok();
    app.post_json(
        "/api/v1/auth/login",
        login_body(&user, json!({ "backup_code": code })),
    )
    .await
    .assert_unauthorized();

    let remaining: Value = app
        .get_as("/api/v1/2fa/backup-codes/remaining", &user.token)
        .await
        .json();
    assert_eq!(remaining["remaining"], 9);

    let regenerated: Value = app
        .post_empty_as("/api/v1/2fa/backup-codes/generate", &user.token)
        .await
        .json();
    assert_eq!(regenerated["backup_codes"].as_array().unwrap().len(), 10);
    app.post_json(
        "/api/v1/auth/login",
        login_body(&user, json!({ "backup_code": backup_codes[1] })),
    )
    .await
    .assert_unauthorized();
}

#[tokio::test]
async fn test_trusted_device_skips_code_until_revoked() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::SiteOwner).await;
    let (secret, _) = enroll(&app, &user).await;

    let response = app
        .post_as(
            "/api/v1/2fa/verify",
            &user.token,
            json!({
                "totp_code": current_code(&app, &secret),
                "trust_device": true,
                "device_name": "Work laptop",
            }),
        )
        .await;
    response.assert_ok();
    let verified: Value = response.json();
    assert_eq!(verified["method"], "totp");
    let device_token = verified["device_token"].as_str().unwrap().to_string();

    app.post_json(
        "/api/v1/auth/login",
        login_body(&user, json!({ "device_token": device_token })),
    )
    .await
    .assert_ok();

    let devices: Vec<Value> = app.get_as("/api/v1/2fa/devices", &user.token).await.json();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["device_name"], "Work laptop");
    assert!(devices[0].get("token_hash").is_none());

    app.delete_as(
        &format!("/api/v1/2fa/devices/{}", devices[0]["id"].as_str().unwrap()),
        &user.token,
    )
    .await
    .assert_no_content();

    app.post_json(
        "/api/v1/auth/login",
        login_body(&user, json!({ "device_token": device_token })),
    )
    .await
    .assert_unauthorized();
}

#[tokio::test]
async fn test_disable_requires_password() {
    let app = TestApp::new().await;
    let user = app.create_user(UserRole::SiteOwner).await;
    enroll(&app, &user).await;

    app.post_as(
        "/api/v1/2fa/disable",
        &user.token,
        json!({ "password": "not-my-password" }),
    )
    .await
    .assert_unauthorized();

    app.post_as(
        "/api/v1/2fa/disable",
        &user.token,
        json!({ "password": user.password }),
    )
    .await
    .assert_ok();

    app.post_json("/api/v1/auth/login", login_body(&user, json!({})))
        .await
        .assert_ok();
}
