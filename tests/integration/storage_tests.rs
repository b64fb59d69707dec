//! Storage analytics and version management tests

use serde_json::{json, Value};
use sp_governance::models::UserRole;

use crate::common::{library_payload, SiteBuilder, TestApp};

async fn create_site(app: &TestApp, token: &str, builder: SiteBuilder) -> Value {
    let response = app.post_as("/api/v1/sites", token, builder.build()).await;
    response.assert_created();
    response.json()
}

async fn create_library(app: &TestApp, token: &str, site: &Value, payload: Value) -> Value {
    let response = app
        .post_as(
            &format!("/api/v1/sites/{}/libraries", site["id"].as_str().unwrap()),
            token,
            payload,
        )
        .await;
    response.assert_created();
    response.json()
}

#[tokio::test]
async fn test_summary_totals_and_thresholds() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let executive = app.create_user(UserRole::Executive).await;

    let full = create_site(&app, &admin.token, SiteBuilder::new().storage(9500, 10000)).await;
    create_site(&app, &admin.token, SiteBuilder::new().storage(1024, 25600)).await;

    let response = app.get_as("/api/v2/storage/summary", &executive.token).await;
    response.assert_ok();
    let summary: Value = response.json();

    assert_eq!(summary["total_storage_gb"], 10.28);
    assert_eq!(summary["total_quota_gb"], 34.77);
    assert_eq!(summary["sites_over_90_percent"], 1);
    assert_eq!(summary["sites_over_75_percent"], 1);
    assert_eq!(summary["top_consumers"][0]["site_id"], full["id"]);
    assert_eq!(summary["top_consumers"][0]["usage_percent"], 95.0);
}

#[tokio::test]
async fn test_summary_requires_executive() {
    let app = TestApp::new().await;
    let owner = app.create_user(UserRole::SiteOwner).await;

    app.get_as("/api/v2/storage/summary", &owner.token)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_recommendations() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let full = create_site(&app, &admin.token, SiteBuilder::new().storage(9500, 10000)).await;
    let idle = create_site(
        &app,
        &admin.token,
        SiteBuilder::new().storage(20000, 100000).inactive_for(200),
    )
    .await;
    create_site(&app, &admin.token, SiteBuilder::new().storage(500, 10000)).await;

    let response = app.get_as("/api/v2/storage/recommendations", &admin.token).await;
    response.assert_ok();
    let recommendations: Vec<Value> = response.json();
    assert_eq!(recommendations.len(), 2);

    let quota = recommendations
        .iter()
        .find(|r| r["recommendation_type"] == "quota_increase")
        .unwrap();
    assert_eq!(quota["site_id"], full["id"]);
    assert_eq!(quota["priority"], "critical");
    assert_eq!(quota["recommended_quota_mb"], 14250);

    let archive = recommendations
        .iter()
        .find(|r| r["recommendation_type"] == "archive_candidate")
        .unwrap();
    assert_eq!(archive["site_id"], idle["id"]);
    assert_eq!(archive["priority"], "medium");
}

#[tokio::test]
async fn test_trends() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let site = create_site(&app, &admin.token, SiteBuilder::new().storage(2048, 4096)).await;

    app.get_as("/api/v2/storage/trends?days=3", &admin.token)
        .await
        .assert_bad_request();
    app.get_as("/api/v2/storage/trends?days=400", &admin.token)
        .await
        .assert_bad_request();

    let points: Vec<Value> = app
        .get_as(
            &format!("/api/v2/storage/trends?site_id={}", site["id"].as_str().unwrap()),
            &admin.token,
        )
        .await
        .json();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["storage_used_mb"], 2048);
    assert_eq!(points[0]["usage_percent"], 50.0);
}

#[tokio::test]
async fn test_breakdown_lists_libraries() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let site = create_site(&app, &admin.token, SiteBuilder::new()).await;
    create_library(&app, &admin.token, &site, library_payload(10, 20, 300)).await;
    create_library(&app, &admin.token, &site, library_payload(5, 5, 200)).await;

    let response = app
        .get_as(
            &format!("/api/v2/storage/sites/{}/breakdown", site["id"].as_str().unwrap()),
            &admin.token,
        )
        .await;
    response.assert_ok();
    let breakdown: Value = response.json();
    assert_eq!(breakdown["total_size_mb"], 500);
    assert_eq!(breakdown["libraries"].as_array().unwrap().len(), 2);

    app.get_as(
        &format!("/api/v2/storage/sites/{}/breakdown", uuid::Uuid::new_v4()),
        &admin.token,
    )
    .await
    .assert_not_found();
}

#[tokio::test]
async fn test_version_scan_cleanup_and_recommendations() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let site = create_site(&app, &admin.token, SiteBuilder::new()).await;
    let library = create_library(&app, &admin.token, &site, library_payload(100, 2500, 3000)).await;
    let library_id = library["id"].as_str().unwrap();

    let stats: Value = app
        .get_as(&format!("/api/v2/storage/libraries/{}/versions", library_id), &admin.token)
        .await
        .json();
    assert_eq!(stats["avg_versions_per_doc"], 25.0);
    assert_eq!(stats["docs_over_threshold"], 100);
    assert_eq!(stats["estimated_version_storage_mb"], 1200.0);

    let recommendations: Vec<Value> = app
        .get_as(
            &format!(
                "/api/v2/storage/sites/{}/version-recommendations",
                site["id"].as_str().unwrap()
            ),
            &admin.token,
        )
        .await
        .json();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0]["priority"], "high");
    assert_eq!(recommendations[0]["estimated_savings_mb"], 1000.0);

    let uri = format!("/api/v2/storage/libraries/{}/cleanup-versions", library_id);
    app.post_as(&format!("{}?keep_minimum=0", uri), &admin.token, json!({}))
        .await
        .assert_bad_request();
    app.post_as(&format!("{}?retention_days=7", uri), &admin.token, json!({}))
        .await
        .assert_bad_request();

    let response = app.post_as(&uri, &admin.token, json!({})).await;
    response.assert_ok();
    let result: Value = response.json();
    assert_eq!(result["versions_deleted"], 2200);
    assert_eq!(result["storage_freed_mb"], 1100.0);
    assert_eq!(result["keep_minimum"], 3);

    let stats: Value = app
        .get_as(&format!("/api/v2/storage/libraries/{}/versions", library_id), &admin.token)
        .await
        .json();
    assert_eq!(stats["total_versions"], 300);
    assert_eq!(stats["docs_over_threshold"], 0);
}

#[tokio::test]
async fn test_site_owner_scans_only_own_libraries() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let owner = app.create_user(UserRole::SiteOwner).await;
    let executive = app.create_user(UserRole::Executive).await;

    let mine = create_site(&app, &admin.token, SiteBuilder::new()).await;
    let other = create_site(&app, &admin.token, SiteBuilder::new()).await;
    app.post_as(
        &format!("/api/v1/sites/{}/owners", mine["id"].as_str().unwrap()),
        &admin.token,
        json!({ "user_id": owner.user.id, "user_email": owner.user.email }),
    )
    .await
    .assert_created();

    let own_library = create_library(&app, &admin.token, &mine, library_payload(10, 30, 50)).await;
    let other_library = create_library(&app, &admin.token, &other, library_payload(10, 30, 50)).await;

    app.get_as(
        &format!("/api/v2/storage/libraries/{}/versions", own_library["id"].as_str().unwrap()),
        &owner.token,
    )
    .await
    .assert_ok();
    app.get_as(
        &format!("/api/v2/storage/libraries/{}/versions", other_library["id"].as_str().unwrap()),
        &owner.token,
    )
    .await
    .assert_forbidden();
    app.get_as(
        &format!("/api/v2/storage/libraries/{}/versions", own_library["id"].as_str().unwrap()),
        &executive.token,
    )
    .await
    .assert_forbidden();

    app.post_as(
        &format!(
            "/api/v2/storage/libraries/{}/cleanup-versions",
            own_library["id"].as_str().unwrap()
        ),
        &owner.token,
        json!({}),
    )
    .await
    .assert_forbidden();
}

#[tokio::test]
async fn test_version_recommendations_are_scoped_to_owned_sites() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let owner = app.create_user(UserRole::SiteOwner).await;
    let auditor = app.create_user(UserRole::Auditor).await;

    let mine = create_site(&app, &admin.token, SiteBuilder::new()).await;
    let other = create_site(&app, &admin.token, SiteBuilder::new()).await;
    app.post_as(
        &format!("/api/v1/sites/{}/owners", mine["id"].as_str().unwrap()),
        &admin.token,
        json!({ "user_id": owner.user.id, "user_email": owner.user.email }),
    )
    .await
    .assert_created();
    create_library(&app, &admin.token, &mine, library_payload(10, 300, 50)).await;
    create_library(&app, &admin.token, &other, library_payload(10, 300, 50)).await;

    let uri = |site: &Value| {
        format!(
            "/api/v2/storage/sites/{}/version-recommendations",
            site["id"].as_str().unwrap()
        )
    };

    let own: Vec<Value> = app.get_as(&uri(&mine), &owner.token).await.json();
    assert_eq!(own.len(), 1);
    app.get_as(&uri(&other), &owner.token)
        .await
        .assert_forbidden();
    app.get_as(&uri(&mine), &auditor.token)
        .await
        .assert_forbidden();
    app.get_as(
        &format!(
            "/api/v2/storage/sites/{}/version-recommendations",
            uuid::Uuid::new_v4()
        ),
        &admin.token,
    )
    .await
    .assert_not_found();
}

#[tokio::test]
async fn test_storage_figures_are_bounded() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    app.post_as(
        "/api/v1/sites",
        &admin.token,
        SiteBuilder::new().storage(i64::MAX, i64::MAX).build(),
    )
    .await
    .assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

    let site = create_site(&app, &admin.token, SiteBuilder::new()).await;
    app.post_as(
        &format!("/api/v1/sites/{}/libraries", site["id"].as_str().unwrap()),
        &admin.token,
        library_payload(i64::MAX / 2, 10, 10),
    )
    .await
    .assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}
