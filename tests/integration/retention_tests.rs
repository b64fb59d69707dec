//! Retention policy and exclusion workflow tests

use serde_json::{json, Value};
use sp_governance::models::UserRole;

use crate::common::{policy_payload, site_payload, TestApp, TestUser};

struct Fixture {
    app: TestApp,
    admin: TestUser,
    officer: TestUser,
    owner: TestUser,
    site: Value,
    policy: Value,
}

async fn fixture() -> Fixture {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let officer = app.create_user(UserRole::ComplianceOfficer).await;
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

    let response = app
        .post_as("/api/v2/retention/policies", &officer.token, policy_payload())
        .await;
    response.assert_created();
    let policy: Value = response.json();

    Fixture {
        app,
        admin,
        officer,
        owner,
        site,
        policy,
    }
}

fn exclusion_request(f: &Fixture) -> Value {
    json!({
        "site_id": f.site["id"],
        "policy_id": f.policy["id"],
        "reason": "Litigation hold handled by legal",
    })
}

#[tokio::test]
async fn test_policies_are_listed() {
    let f = fixture().await;

    let policies: Vec<Value> = f
        .app
        .get_as("/api/v2/retention/policies", &f.owner.token)
        .await
        .json();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0]["id"], f.policy["id"]);

    f.app
        .post_as("/api/v2/retention/policies", &f.owner.token, policy_payload())
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_exclusion_lifecycle() {
    let f = fixture().await;

    let response = f
        .app
        .post_as("/api/v2/retention/exclusions", &f.owner.token, exclusion_request(&f))
        .await;
    response.assert_created();
    let exclusion: Value = response.json();
    assert_eq!(exclusion["status"], "pending_approval");
    assert_eq!(exclusion["requested_by"], f.owner.user.username.as_str());
    let id = exclusion["id"].as_str().unwrap();

    // Pending requests do not affect compliance yet
    let report: Value = f
        .app
        .get_as("/api/v2/retention/compliance", &f.officer.token)
        .await
        .json();
    assert_eq!(report["non_compliant_sites"], 0);

    let approved: Value = f
        .app
        .put_empty_as(&format!("/api/v2/retention/exclusions/{}/approve", id), &f.officer.token)
        .await
        .json();
    assert_eq!(approved["status"], "active");
    assert_eq!(approved["approved_by"], f.officer.user.username.as_str());

    f.app
        .post_as("/api/v2/retention/exclusions", &f.owner.token, exclusion_request(&f))
        .await
        .assert_conflict();

    let report: Value = f
        .app
        .get_as("/api/v2/retention/compliance", &f.officer.token)
        .await
        .json();
    assert_eq!(report["total_sites"], 1);
    assert_eq!(report["non_compliant_sites"], 1);
    assert_eq!(report["sites"][0]["status"], "non_compliant");
    assert_eq!(report["sites"][0]["exclusion_count"], 1);

    let active: Vec<Value> = f
        .app
        .get_as("/api/v2/retention/exclusions?status=active", &f.owner.token)
        .await
        .json();
    assert_eq!(active.len(), 1);

    let removed: Value = f
        .app
        .delete_as(&format!("/api/v2/retention/exclusions/{}", id), &f.officer.token)
        .await
        .json();
    assert_eq!(removed["status"], "removed");

    let report: Value = f
        .app
        .get_as("/api/v2/retention/compliance", &f.officer.token)
        .await
        .json();
    assert_eq!(report["compliant_sites"], 1);
}

#[tokio::test]
async fn test_approve_with_comments() {
    let f = fixture().await;
    let exclusion: Value = f
        .app
        .post_as("/api/v2/retention/exclusions", &f.admin.token, exclusion_request(&f))
        .await
        .json();

    let approved: Value = f
        .app
        .put_as(
            &format!(
                "/api/v2/retention/exclusions/{}/approve",
                exclusion["id"].as_str().unwrap()
            ),
            &f.officer.token,
            json!({ "comments": "Reviewed with legal" }),
        )
        .await
        .json();
    assert_eq!(approved["approval_comments"], "Reviewed with legal");
}

#[tokio::test]
async fn test_request_validation() {
    let f = fixture().await;

    f.app
        .post_as(
            "/api/v2/retention/exclusions",
            &f.admin.token,
            json!({ "site_id": uuid::Uuid::new_v4(), "policy_id": f.policy["id"], "reason": "x" }),
        )
        .await
        .assert_not_found();
    f.app
        .post_as(
            "/api/v2/retention/exclusions",
            &f.admin.token,
            json!({ "site_id": f.site["id"], "policy_id": uuid::Uuid::new_v4(), "reason": "x" }),
        )
        .await
        .assert_not_found();
    f.app
        .put_empty_as(
            &format!("/api/v2/retention/exclusions/{}/approve", uuid::Uuid::new_v4()),
            &f.officer.token,
        )
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_only_site_owners_request_for_their_sites() {
    let f = fixture().await;
    let stranger = f.app.create_user(UserRole::SiteOwner).await;
    let auditor = f.app.create_user(UserRole::Auditor).await;

    f.app
        .post_as("/api/v2/retention/exclusions", &stranger.token, exclusion_request(&f))
        .await
        .assert_forbidden();
    f.app
        .post_as("/api/v2/retention/exclusions", &auditor.token, exclusion_request(&f))
        .await
        .assert_forbidden();
    f.app
        .get_as("/api/v2/retention/compliance", &auditor.token)
        .await
        .assert_forbidden();
}

fn approve(exclusion: &Value) -> String {
    format!(
        "/api/v2/retention/exclusions/{}/approve",
        exclusion["id"].as_str().unwrap()
    )
}

fn remove(exclusion: &Value) -> String {
    format!("/api/v2/retention/exclusions/{}", exclusion["id"].as_str().unwrap())
}

#[tokio::test]
async fn test_only_pending_exclusions_can_be_approved() {
    let f = fixture().await;
    let first: Value = f
        .app
        .post_as("/api/v2/retention/exclusions", &f.owner.token, exclusion_request(&f))
        .await
        .json();
    let second: Value = f
        .app
        .post_as("/api/v2/retention/exclusions", &f.owner.token, exclusion_request(&f))
        .await
        .json();

    f.app
        .put_empty_as(&approve(&first), &f.officer.token)
        .await
        .assert_ok();
    // one active exclusion per site and policy
    f.app
        .put_empty_as(&approve(&second), &f.officer.token)
        .await
        .assert_conflict();
    f.app
        .put_empty_as(&approve(&first), &f.officer.token)
        .await
        .assert_conflict();

    f.app
        .delete_as(&remove(&first), &f.officer.token)
        .await
        .assert_ok();
    f.app
        .delete_as(&remove(&first), &f.officer.token)
        .await
        .assert_conflict();
    f.app
        .put_empty_as(&approve(&first), &f.officer.token)
        .await
        .assert_conflict();

    let removed: Value = f
        .app
        .get_as(
            &format!(
                "/api/v2/retention/exclusions?status=removed&site_id={}",
                f.site["id"].as_str().unwrap()
            ),
            &f.officer.token,
        )
        .await
        .json();
    assert_eq!(removed.as_array().unwrap().len(), 1);

    // the earlier pending request can now be approved
    f.app
        .put_empty_as(&approve(&second), &f.officer.token)
        .await
        .assert_ok();
}
