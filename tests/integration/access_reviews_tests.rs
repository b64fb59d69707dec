//! Quarterly access review tests

use serde_json::{json, Value};
use sp_governance::models::UserRole;

use crate::common::{site_payload, TestApp, TestUser};

struct Fixture {
    app: TestApp,
    admin: TestUser,
    owner: TestUser,
    review_id: String,
}

/// One site owned by `owner` with two access entries, reviews initiated
async fn fixture() -> Fixture {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let owner = app.create_user(UserRole::SiteOwner).await;

    let site: Value = app
        .post_as("/api/v1/sites", &admin.token, site_payload())
        .await
        .json();
    let site_id = site["id"].as_str().unwrap();
    app.post_as(
        &format!("/api/v1/sites/{}/owners", site_id),
        &admin.token,
        json!({ "user_id": owner.user.id, "user_email": owner.user.email, "is_primary_owner": true }),
    )
    .await
    .assert_created();
    for (email, level) in [("jane@contoso.com", "Edit"), ("bob@contoso.com", "Read")] {
        app.post_as(
            &format!("/api/v1/sites/{}/access", site_id),
            &admin.token,
            json!({ "user_email": email, "permission_level": level }),
        )
        .await
        .assert_created();
    }

    let response = app
        .post_empty_as("/api/v1/access-reviews/initiate", &admin.token)
        .await;
    response.assert_ok();
    let stats: Value = response.json();
    assert_eq!(stats["reviews_created"], 1);

    let list: Value = app
        .get_as("/api/v1/access-reviews", &owner.token)
        .await
        .json();
    let review_id = list["reviews"][0]["id"].as_str().unwrap().to_string();

    Fixture {
        app,
        admin,
        owner,
        review_id,
    }
}

#[tokio::test]
async fn test_only_admins_initiate() {
    let app = TestApp::new().await;
    let officer = app.create_user(UserRole::ComplianceOfficer).await;

    app.post_empty_as("/api/v1/access-reviews/initiate", &officer.token)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_owner_sees_only_assigned_reviews() {
    let f = fixture().await;
    let other_owner = f.app.create_user(UserRole::SiteOwner).await;
    let auditor = f.app.create_user(UserRole::Auditor).await;

    let mine: Value = f
        .app
        .get_as("/api/v1/access-reviews", &f.owner.token)
        .await
        .json();
    assert_eq!(mine["total"], 1);
    assert_eq!(mine["reviews"][0]["status"], "pending");
    assert_eq!(mine["reviews"][0]["items"]["total"], 2);

    let theirs: Value = f
        .app
        .get_as("/api/v1/access-reviews", &other_owner.token)
        .await
        .json();
    assert_eq!(theirs["total"], 0);

    let uri = format!("/api/v1/access-reviews/{}", f.review_id);
    f.app
        .get_as(&uri, &other_owner.token)
        .await
        .assert_forbidden();
    f.app.get_as(&uri, &auditor.token).await.assert_ok();
    f.app
        .get_as(
            &format!("/api/v1/access-reviews/{}", uuid::Uuid::new_v4()),
            &auditor.token,
        )
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_decide_then_certify() {
    let f = fixture().await;
    let auditor = f.app.create_user(UserRole::Auditor).await;
    let base = format!("/api/v1/access-reviews/{}", f.review_id);

    let items: Vec<Value> = f
        .app
        .get_as(&format!("{}/items", base), &f.owner.token)
        .await
        .json();
    assert_eq!(items.len(), 2);

    let first = format!("{}/items/{}", base, items[0]["id"].as_str().unwrap());
    // oversight roles read but do not decide
    f.app
        .put_as(&first, &auditor.token, json!({ "decision": "approved" }))
        .await
        .assert_forbidden();
    f.app
        .put_as(&first, &f.owner.token, json!({ "decision": "pending" }))
        .await
        .assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

    let response = f
        .app
        .put_as(&first, &f.owner.token, json!({ "decision": "approved" }))
        .await;
    response.assert_ok();
    let decided: Value = response.json();
    assert_eq!(decided["decision"], "approved");

    // one item still pending
    f.app
        .post_empty_as(&format!("{}/certify", base), &f.owner.token)
        .await
        .assert_bad_request();

    let second = format!("{}/items/{}", base, items[1]["id"].as_str().unwrap());
    let revoked: Value = f
        .app
        .put_as(
            &second,
            &f.owner.token,
            json!({ "decision": "revoke", "reviewer_comments": "Left the team" }),
        )
        .await
        .json();
    assert_eq!(revoked["removal_requested"], true);

    let response = f
        .app
        .post_as(
            &format!("{}/certify", base),
            &f.owner.token,
            json!({ "comments": "Reviewed with HR" }),
        )
        .await;
    response.assert_ok();
    let certified: Value = response.json();
    assert_eq!(certified["status"], "completed");
    assert_eq!(certified["items"]["revoked"], 1);

    f.app
        .post_empty_as(&format!("{}/certify", base), &f.admin.token)
        .await
        .assert_conflict();
    f.app
        .put_as(&first, &f.owner.token, json!({ "decision": "revoke" }))
        .await
        .assert_conflict();
}

#[tokio::test]
async fn test_second_initiation_skips_existing_cycle() {
    let f = fixture().await;

    let stats: Value = f
        .app
        .post_empty_as("/api/v1/access-reviews/initiate", &f.admin.token)
        .await
        .json();
    assert_eq!(stats["reviews_created"], 0);
    assert_eq!(stats["reviews_skipped"], 1);
}
