//! Access review endpoints
//!
//! Site owners see and work the cycles assigned to them; auditors and
//! compliance officers can read every cycle.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    api::record_action,
    db::AccessReviewRepository,
    middleware::AuthUser,
    models::{
        AccessReviewItem, AccessReviewListResponse, AccessReviewSummary, CertifyReviewRequest,
        NewAdminAction, ReviewDecisionRequest, ReviewInitiationStats, ReviewQuery, UserRole,
    },
    services::AccessReviewService,
    utils::{validation::parse_id, AppError, AppResult},
    AppState,
};

const MAX_PAGE_SIZE: i64 = 1000;

const OVERSIGHT_ROLES: &[UserRole] = &[UserRole::Auditor, UserRole::ComplianceOfficer];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews))
        .route("/initiate", post(initiate_reviews))
        .route("/{id}", get(get_review))
        .route("/{id}/items", get(list_items))
        .route("/{id}/items/{item_id}", put(decide_item))
        .route("/{id}/certify", post(certify_review))
}

/// Load a cycle the caller may read
async fn load_review(
    state: &AppState,
    auth_user: &AuthUser,
    id: &str,
) -> AppResult<AccessReviewSummary> {
    let id = parse_id(id, "review cycle")?;
    let review = AccessReviewRepository::new(&state.db)
        .get_summary(id)
        .await?
        .ok_or_else(|| AppError::not_found("Review cycle not found"))?;

    if !auth_user.has_any_role(OVERSIGHT_ROLES) && review.cycle.assigned_to != auth_user.id {
        return Err(AppError::forbidden("You are not assigned to this review"));
    }
    Ok(review)
}

/// Only the assignee (or an admin) records decisions and certifies
fn ensure_reviewer(auth_user: &AuthUser, review: &AccessReviewSummary) -> AppResult<()> {
    if auth_user.is_admin() || review.cycle.assigned_to == auth_user.id {
        Ok(())
    } else {
        Err(AppError::forbidden("You are not assigned to this review"))
    }
}

async fn list_reviews(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(mut query): Query<ReviewQuery>,
) -> AppResult<Json<AccessReviewListResponse>> {
    if query.skip < 0 {
        return Err(AppError::bad_request("skip must be zero or greater"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&query.limit) {
        return Err(AppError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if !auth_user.has_any_role(OVERSIGHT_ROLES) {
        query.assigned_to = Some(auth_user.id);
    }

    let repo = AccessReviewRepository::new(&state.db);
    let total = repo.count(&query).await?;
    let reviews = repo.list_summaries(&query).await?;

    Ok(Json(AccessReviewListResponse {
        total,
        reviews,
        skip: query.skip,
        limit: query.limit,
    }))
}

async fn initiate_reviews(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<ReviewInitiationStats>> {
    auth_user.require_admin()?;

    let stats = AccessReviewService::new(&state.db, &state.config.governance)
        .initiate_quarterly_reviews(Utc::now())
        .await?;
    record_action(
        &state,
        NewAdminAction::new("access_reviews_initiated", "access_review")
            .by(auth_user.id, &auth_user.username)
            .details(serde_json::json!({
                "cycle_number": stats.cycle_number,
                "created": stats.reviews_created,
                "skipped": stats.reviews_skipped,
            })),
    )
    .await;

    Ok(Json(stats))
}

async fn get_review(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<AccessReviewSummary>> {
    Ok(Json(load_review(&state, &auth_user, &id).await?))
}

async fn list_items(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<AccessReviewItem>>> {
    let review = load_review(&state, &auth_user, &id).await?;
    Ok(Json(
        AccessReviewRepository::new(&state.db)
            .list_items(review.cycle.id)
            .await?,
    ))
}

async fn decide_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, item_id)): Path<(String, String)>,
    Json(payload): Json<ReviewDecisionRequest>,
) -> AppResult<Json<AccessReviewItem>> {
    payload.validate()?;
    let review = load_review(&state, &auth_user, &id).await?;
    ensure_reviewer(&auth_user, &review)?;
    let item_id = parse_id(&item_id, "review item")?;

    let item = AccessReviewService::new(&state.db, &state.config.governance)
        .decide(
            review.cycle.id,
            item_id,
            payload.decision,
            payload.reviewer_comments.as_deref(),
        )
        .await?;

    Ok(Json(item))
}

async fn certify_review(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    payload: Option<Json<CertifyReviewRequest>>,
) -> AppResult<Json<AccessReviewSummary>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;
    let review = load_review(&state, &auth_user, &id).await?;
    ensure_reviewer(&auth_user, &review)?;

    let certified = AccessReviewService::new(&state.db, &state.config.governance)
        .certify(review.cycle.id, &auth_user.username, payload.comments.as_deref())
        .await?;
    record_action(
        &state,
        NewAdminAction::new("access_review_certified", "access_review")
            .by(auth_user.id, &auth_user.username)
            .resource(certified.cycle.id)
            .details(serde_json::json!({
                "site_id": certified.cycle.site_id,
                "revoked": certified.items.revoked,
            })),
    )
    .await;

    Ok(Json(certified))
}
