//! Dashboard tests

use serde_json::{json, Value};
use sp_governance::models::UserRole;

use crate::common::{site_payload, SiteBuilder, TestApp};

#[tokio::test]
async fn test_overview_scope_follows_role() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let owner = app.create_user(UserRole::SiteOwner).await;
    let executive = app.create_user(UserRole::Executive).await;

    let mine: Value = app
        .post_as(
            "/api/v1/sites",
            &admin.token,
            SiteBuilder::new().storage(2048, 25600).build(),
        )
        .await
        .json();
    app.post_as("/api/v1/sites", &admin.token, site_payload())
        .await
        .assert_created();
    app.post_as(
        &format!("/api/v1/sites/{}/owners", mine["id"].as_str().unwrap()),
        &admin.token,
        json!({ "user_id": owner.user.id, "user_email": owner.user.email, "is_primary_owner": true }),
    )
    .await
    .assert_created();

    let response = app.get_as("/api/v1/dashboard/overview", &owner.token).await;
    response.assert_ok();
    let scoped: Value = response.json();
    assert_eq!(scoped["scope"], "owner");
    assert_eq!(scoped["sites"]["total"], 1);
    assert_eq!(scoped["sites"]["storage_used_mb"], 2048);
    assert!(scoped.get("audit").is_none());

    let tenant: Value = app
        .get_as("/api/v1/dashboard/overview", &executive.token)
        .await
        .json();
    assert_eq!(tenant["scope"], "tenant");
    assert_eq!(tenant["sites"]["total"], 2);
    assert_eq!(tenant["storage"]["total_used_mb"], 3072);
    assert_eq!(tenant["by_template"]["STS#3"], 2);
    assert_eq!(tenant["audit"]["events_last_24h"], 0);
}

#[tokio::test]
async fn test_owner_dashboard_lists_owned_sites_and_reviews() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let owner = app.create_user(UserRole::SiteOwner).await;

    let site: Value = app
        .post_as("/api/v1/sites", &admin.token, site_payload())
        .await
        .json();
    app.post_as(
        &format!("/api/v1/sites/{}/owners", site["id"].as_str().unwrap()),
        &admin.token,
        json!({ "user_id": owner.user.id, "user_email": owner.user.email, "is_primary_owner": true }),
    )
    .await
    .assert_created();
    app.post_empty_as("/api/v1/access-reviews/initiate", &admin.token)
        .await
        .assert_ok();

    let response = app.get_as("/api/v1/dashboard/owner", &owner.token).await;
    response.assert_ok();
    let dashboard: Value = response.json();
    assert_eq!(dashboard["total_sites"], 1);
    assert_eq!(dashboard["owned_sites"][0]["site_id"], site["id"]);
    assert_eq!(dashboard["total_open_reviews"], 1);
    assert_eq!(dashboard["open_reviews"][0]["site_url"], site["url"]);

    let stranger = app.create_user(UserRole::SiteOwner).await;
    let empty: Value = app
        .get_as("/api/v1/dashboard/owner", &stranger.token)
        .await
        .json();
    assert_eq!(empty["total_sites"], 0);
}
