//! Site inventory tests

use serde_json::{json, Value};
use sp_governance::models::UserRole;

use crate::common::{library_payload, site_payload, SiteBuilder, TestApp};

async fn create_site(app: &TestApp, token: &str, payload: Value) -> Value {
    let response = app.post_as("/api/v1/sites", token, payload).await;
    response.assert_created();
    response.json()
}

#[tokio::test]
async fn test_create_then_lookup_by_url_returns_same_record() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let created = create_site(&app, &admin.token, site_payload()).await;
    let url = created["url"].as_str().unwrap();

    let response = app
        .get_as(
            &format!("/api/v1/sites/lookup?url={}", urlencoding::encode(url)),
            &admin.token,
        )
        .await;
    response.assert_ok();
    let found: Value = response.json();
    assert_eq!(found, created);

    let by_id: Value = app
        .get_as(&format!("/api/v1/sites/{}", created["id"].as_str().unwrap()), &admin.token)
        .await
        .json();
    assert_eq!(by_id, created);
}

#[tokio::test]
async fn test_duplicate_url_is_rejected() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let url = "https://contoso.sharepoint.com/sites/finance";

    create_site(&app, &admin.token, SiteBuilder::new().url(url).build()).await;
    app.post_as("/api/v1/sites", &admin.token, SiteBuilder::new().url(url).build())
        .await
        .assert_conflict();

    let listing: Value = app.get_as("/api/v1/sites", &admin.token).await.json();
    assert_eq!(listing["total"], 1);
}

#[tokio::test]
async fn test_update_cannot_take_another_sites_url() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let first = create_site(&app, &admin.token, site_payload()).await;
    let second = create_site(&app, &admin.token, site_payload()).await;

    app.put_as(
        &format!("/api/v1/sites/{}", second["id"].as_str().unwrap()),
        &admin.token,
        json!({ "url": first["url"] }),
    )
    .await
    .assert_conflict();

    let response = app
        .put_as(
            &format!("/api/v1/sites/{}", second["id"].as_str().unwrap()),
            &admin.token,
            json!({ "title": "Renamed" }),
        )
        .await;
    response.assert_ok();
    let updated: Value = response.json();
    assert_eq!(updated["title"], "Renamed");
    assert_eq!(updated["url"], second["url"]);
}

#[tokio::test]
async fn test_listing_reflects_additions_and_removals() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let listing: Value = app.get_as("/api/v1/sites", &admin.token).await.json();
    assert_eq!(listing["total"], 0);

    let a = create_site(&app, &admin.token, site_payload()).await;
    let b = create_site(&app, &admin.token, site_payload()).await;

    let listing: Value = app.get_as("/api/v1/sites", &admin.token).await.json();
    assert_eq!(listing["total"], 2);
    let ids: Vec<&str> = listing["sites"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&a["id"].as_str().unwrap()));
    assert!(ids.contains(&b["id"].as_str().unwrap()));

    app.delete_as(&format!("/api/v1/sites/{}", a["id"].as_str().unwrap()), &admin.token)
        .await
        .assert_no_content();

    let listing: Value = app.get_as("/api/v1/sites", &admin.token).await.json();
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["sites"][0]["id"], b["id"]);

    app.get_as(&format!("/api/v1/sites/{}", a["id"].as_str().unwrap()), &admin.token)
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_invalid_input() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    app.post_as(
        "/api/v1/sites",
        &admin.token,
        SiteBuilder::new().url("not a url").build(),
    )
    .await
    .assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

    app.get_as("/api/v1/sites/not-a-uuid", &admin.token)
        .await
        .assert_bad_request();
    app.get_as("/api/v1/sites?limit=0", &admin.token)
        .await
        .assert_bad_request();
    app.get_as("/api/v1/sites?limit=1001", &admin.token)
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_only_admins_register_sites() {
    let app = TestApp::new().await;
    let auditor = app.create_user(UserRole::Auditor).await;

    app.post_as("/api/v1/sites", &auditor.token, site_payload())
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_site_owner_sees_only_owned_sites() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let owner = app.create_user(UserRole::SiteOwner).await;

    let mine = create_site(&app, &admin.token, site_payload()).await;
    let other = create_site(&app, &admin.token, site_payload()).await;

    app.post_as(
        &format!("/api/v1/sites/{}/owners", mine["id"].as_str().unwrap()),
        &admin.token,
        json!({
            "user_id": owner.user.id,
            "user_email": owner.user.email,
            "ownership_type": "owner",
            "is_primary_owner": true,
        }),
    )
    .await
    .assert_created();

    let listing: Value = app.get_as("/api/v1/sites", &owner.token).await.json();
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["sites"][0]["id"], mine["id"]);

    app.get_as(&format!("/api/v1/sites/{}", mine["id"].as_str().unwrap()), &owner.token)
        .await
        .assert_ok();
    app.get_as(&format!("/api/v1/sites/{}", other["id"].as_str().unwrap()), &owner.token)
        .await
        .assert_forbidden();

    let auditor = app.create_user(UserRole::Auditor).await;
    let listing: Value = app.get_as("/api/v1/sites", &auditor.token).await.json();
    assert_eq!(listing["total"], 2);
}

#[tokio::test]
async fn test_access_matrix() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let site = create_site(&app, &admin.token, site_payload()).await;
    let uri = format!("/api/v1/sites/{}/access", site["id"].as_str().unwrap());

    app.post_as(
        &uri,
        &admin.token,
        json!({ "user_email": "jane@contoso.com", "permission_level": "Full Control" }),
    )
    .await
    .assert_created();
    app.post_as(
        &uri,
        &admin.token,
        json!({
            "user_email": "guest@fabrikam.com",
            "permission_level": "Read",
            "is_external_user": true,
            "external_user_email": "guest@fabrikam.com",
        }),
    )
    .await
    .assert_created();
    app.post_as(&uri, &admin.token, json!({ "permission_level": "Read" }))
        .await
        .assert_bad_request();

    let response = app.get_as(&uri, &admin.token).await;
    response.assert_ok();
    let access: Value = response.json();
    assert_eq!(access["total_entries"], 2);
    assert_eq!(access["external_users"], 1);
}

#[tokio::test]
async fn test_health_flags_missing_owner_and_inactivity() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let site = create_site(
        &app,
        &admin.token,
        SiteBuilder::new().storage(9500, 10000).inactive_for(200).build(),
    )
    .await;

    let response = app
        .get_as(
            &format!("/api/v1/sites/{}/health", site["id"].as_str().unwrap()),
            &admin.token,
        )
        .await;
    response.assert_ok();
    let health: Value = response.json();
    // inactivity -30, storage -20, no owner -30
    assert_eq!(health["health_score"], 20);
    assert_eq!(health["has_primary_owner"], false);
    assert_eq!(health["issues"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_dormant_and_review_require_compliance_role() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let officer = app.create_user(UserRole::ComplianceOfficer).await;
    let executive = app.create_user(UserRole::Executive).await;
    let site = create_site(&app, &admin.token, site_payload()).await;
    let id = site["id"].as_str().unwrap();

    app.post_empty_as(&format!("/api/v1/sites/{}/dormant", id), &executive.token)
        .await
        .assert_forbidden();

    let dormant: Value = app
        .post_empty_as(&format!("/api/v1/sites/{}/dormant", id), &officer.token)
        .await
        .json();
    assert_eq!(dormant["is_dormant"], true);

    let reviewed: Value = app
        .post_empty_as(&format!("/api/v1/sites/{}/review", id), &officer.token)
        .await
        .json();
    assert!(reviewed["last_reviewed"].is_string());

    let listing: Value = app
        .get_as("/api/v1/sites?is_dormant=true", &officer.token)
        .await
        .json();
    assert_eq!(listing["total"], 1);
}

#[tokio::test]
async fn test_libraries_are_listed_per_site() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let site = create_site(&app, &admin.token, site_payload()).await;
    let uri = format!("/api/v1/sites/{}/libraries", site["id"].as_str().unwrap());

    app.post_as(&uri, &admin.token, library_payload(100, 400, 800))
        .await
        .assert_created();

    let libraries: Vec<Value> = app.get_as(&uri, &admin.token).await.json();
    assert_eq!(libraries.len(), 1);
    assert_eq!(libraries[0]["item_count"], 100);
}
