//! Audit trail tests

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sp_governance::models::UserRole;

use crate::common::{audit_record, site_payload, TestApp};

#[tokio::test]
async fn test_ingest_then_query_with_filters() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let auditor = app.create_user(UserRole::Auditor).await;
    let now = Utc::now();

    let response = app
        .post_as(
            "/api/v1/audit/logs",
            &admin.token,
            json!({
                "records": [
                    audit_record("FileAccessed", "jane@contoso.com", now - Duration::hours(2)),
                    audit_record("FileDeleted", "jane@contoso.com", now - Duration::hours(1)),
                    audit_record("FileAccessed", "bob@contoso.com", now - Duration::minutes(5)),
                ]
            }),
        )
        .await;
    response.assert_created();
    let inserted: Value = response.json();
    assert_eq!(inserted["inserted"], 3);

    let all: Value = app.get_as("/api/v1/audit/logs", &auditor.token).await.json();
    assert_eq!(all["total"], 3);

    let accessed: Value = app
        .get_as("/api/v1/audit/logs?operation=FileAccessed", &auditor.token)
        .await
        .json();
    assert_eq!(accessed["total"], 2);

    let jane: Value = app
        .get_as(
            "/api/v1/audit/logs?user_id=jane@contoso.com&limit=1",
            &auditor.token,
        )
        .await
        .json();
    assert_eq!(jane["total"], 2);
    assert_eq!(jane["logs"].as_array().unwrap().len(), 1);

    let id = all["logs"][0]["id"].as_str().unwrap();
    app.get_as(&format!("/api/v1/audit/logs/{}", id), &auditor.token)
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_reversed_date_range_is_rejected() {
    let app = TestApp::new().await;
    let auditor = app.create_user(UserRole::Auditor).await;

    app.get_as(
        "/api/v1/audit/logs?start_date=2024-02-01T00:00:00Z&end_date=2024-01-01T00:00:00Z",
        &auditor.token,
    )
    .await
    .assert_bad_request();
}

#[tokio::test]
async fn test_audit_access_is_restricted() {
    let app = TestApp::new().await;
    let owner = app.create_user(UserRole::SiteOwner).await;
    let auditor = app.create_user(UserRole::Auditor).await;

    app.get_as("/api/v1/audit/logs", &owner.token)
        .await
        .assert_forbidden();
    app.post_as(
        "/api/v1/audit/logs",
        &auditor.token,
        json!({ "records": [audit_record("FileAccessed", "x", Utc::now())] }),
    )
    .await
    .assert_forbidden();
}

#[tokio::test]
async fn test_empty_batch_is_invalid() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    app.post_as("/api/v1/audit/logs", &admin.token, json!({ "records": [] }))
        .await
        .assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_oversized_batch_is_invalid() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let auditor = app.create_user(UserRole::Auditor).await;
    let now = Utc::now();

    // Minimal records keep the body under the default JSON limit
    let records: Vec<Value> = (0..5001)
        .map(|_| {
            json!({
                "content_id": uuid::Uuid::new_v4(),
                "creation_time": now,
                "operation": "FileAccessed",
                "workload": "SharePoint",
            })
        })
        .collect();
    app.post_as("/api/v1/audit/logs", &admin.token, json!({ "records": records }))
        .await
        .assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

    let all: Value = app.get_as("/api/v1/audit/logs", &auditor.token).await.json();
    assert_eq!(all["total"], 0);
}

#[tokio::test]
async fn test_admin_actions_are_recorded() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let auditor = app.create_user(UserRole::Auditor).await;

    app.post_as("/api/v1/sites", &admin.token, site_payload())
        .await
        .assert_created();

    let response = app
        .get_as("/api/v1/audit/actions?action=site_created", &auditor.token)
        .await;
    response.assert_ok();
    let actions: Value = response.json();
    assert_eq!(actions["total"], 1);
    assert_eq!(actions["actions"][0]["username"], admin.user.username.as_str());
    assert_eq!(actions["actions"][0]["resource_type"], "site");
}

async fn seed_for_reports(app: &TestApp) {
    let admin = app.admin().await;
    let now = Utc::now();
    app.post_as(
        "/api/v1/audit/logs",
        &admin.token,
        json!({
            "records": [
                audit_record("FileDownloaded", "jane@contoso.com", now - Duration::days(2)),
                audit_record("SharingChanged", "bob@contoso.com", now - Duration::days(1)),
                audit_record("PolicyModified", "ops@contoso.com", now - Duration::hours(3)),
                audit_record("FileAccessed", "jane@contoso.com", now - Duration::days(200)),
            ]
        }),
    )
    .await
    .assert_created();
}

#[tokio::test]
async fn test_export_as_csv_and_json() {
    let app = TestApp::new().await;
    seed_for_reports(&app).await;
    let auditor = app.create_user(UserRole::Auditor).await;

    let response = app.get_as("/api/v1/audit/logs/export", &auditor.token).await;
    response.assert_ok();
    assert_eq!(
        response.headers["content-type"],
        "text/csv; charset=utf-8"
    );
    let disposition = response.headers["content-disposition"].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"audit_logs_"));
    assert!(disposition.ends_with(".csv\""));

    let csv = response.text();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("Creation Time,Operation,Workload,User ID,Client IP,Site URL,Object ID")
    );
    // the 200 day old record falls outside the default window
    assert_eq!(lines.count(), 3);
    assert!(csv.contains("Shared Documents/plan.docx"));

    let response = app
        .get_as("/api/v1/audit/logs/export?format=json", &auditor.token)
        .await;
    response.assert_ok();
    assert_eq!(response.headers["content-type"], "application/json");
    let logs: Vec<Value> = response.json();
    assert_eq!(logs.len(), 3);

    let owner = app.create_user(UserRole::SiteOwner).await;
    app.get_as("/api/v1/audit/logs/export", &owner.token)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_compliance_report_by_framework() {
    let app = TestApp::new().await;
    seed_for_reports(&app).await;
    let officer = app.create_user(UserRole::ComplianceOfficer).await;
    let auditor = app.create_user(UserRole::Auditor).await;

    let start = (Utc::now() - Duration::days(30)).format("%Y-%m-%dT%H:%M:%SZ");
    let end = (Utc::now() + Duration::hours(1)).format("%Y-%m-%dT%H:%M:%SZ");
    let uri = |framework: &str| {
        format!(
            "/api/v1/audit/compliance-report?report_type={}&start_date={}&end_date={}",
            framework, start, end
        )
    };

    let response = app.get_as(&uri("sox"), &officer.token).await;
    response.assert_ok();
    let sox: Value = response.json();
    assert_eq!(sox["report_type"], "SOX");
    assert_eq!(sox["summary"]["total_events"], 1);
    assert_eq!(sox["events"][0]["operation"], "PolicyModified");

    let gdpr: Value = app.get_as(&uri("gdpr"), &officer.token).await.json();
    assert_eq!(gdpr["summary"]["total_events"], 1);
    assert_eq!(gdpr["summary"]["unique_users"], 1);

    app.get_as(&uri("hipaa"), &officer.token)
        .await
        .assert_bad_request();
    app.get_as(&uri("sox"), &auditor.token)
        .await
        .assert_forbidden();
    app.get_as(
        &format!(
            "/api/v1/audit/compliance-report?report_type=sox&start_date={}&end_date={}",
            end, start
        ),
        &officer.token,
    )
    .await
    .assert_bad_request();
}
