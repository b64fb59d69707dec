//! Retention policy and exclusion endpoints (`/api/v2/retention`)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use validator::Validate;

use crate::{
    api::record_action,
    db::{RetentionRepository, SiteOwnerRepository},
    middleware::AuthUser,
    models::{
        ApproveExclusionRequest, ComplianceReport, CreateExclusionRequest,
        CreateRetentionPolicyRequest, ExclusionQuery, NewAdminAction, RetentionExclusion,
        RetentionPolicy, UserRole,
    },
    services::RetentionService,
    utils::{validation::parse_id, AppError, AppResult},
    AppState,
};

const COMPLIANCE_ROLES: &[UserRole] = &[UserRole::ComplianceOfficer];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/policies", get(list_policies).post(create_policy))
        .route("/exclusions", get(list_exclusions).post(request_exclusion))
        .route("/exclusions/{id}", delete(remove_exclusion))
        .route("/exclusions/{id}/approve", put(approve_exclusion))
        .route("/compliance", get(compliance_report))
}

fn exclusion_action(auth_user: &AuthUser, action: &str, exclusion: &RetentionExclusion) -> NewAdminAction {
    NewAdminAction::new(action, "retention_exclusion")
        .by(auth_user.id, &auth_user.username)
        .resource(exclusion.id)
        .details(serde_json::json!({
            "site_id": exclusion.site_id,
            "policy_id": exclusion.policy_id,
        }))
}

async fn list_policies(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> AppResult<Json<Vec<RetentionPolicy>>> {
    Ok(Json(
        RetentionRepository::new(&state.db)
            .list_active_policies()
            .await?,
    ))
}

async fn create_policy(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateRetentionPolicyRequest>,
) -> AppResult<(StatusCode, Json<RetentionPolicy>)> {
    auth_user.require_any_role(COMPLIANCE_ROLES)?;
    payload.validate()?;

    let policy = RetentionRepository::new(&state.db)
        .create_policy(&payload)
        .await?;
    record_action(
        &state,
        NewAdminAction::new("retention_policy_created", "retention_policy")
            .by(auth_user.id, &auth_user.username)
            .resource(policy.id)
            .details(serde_json::json!({ "name": policy.name })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(policy)))
}

async fn list_exclusions(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<ExclusionQuery>,
) -> AppResult<Json<Vec<RetentionExclusion>>> {
    Ok(Json(
        RetentionRepository::new(&state.db)
            .list_exclusions(&query)
            .await?,
    ))
}

async fn request_exclusion(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateExclusionRequest>,
) -> AppResult<(StatusCode, Json<RetentionExclusion>)> {
    auth_user.require_any_role(&[UserRole::SiteOwner])?;
    payload.validate()?;

    if !auth_user.is_admin()
        && !SiteOwnerRepository::new(&state.db)
            .is_owner(payload.site_id, auth_user.id)
            .await?
    {
        return Err(AppError::forbidden("Not an owner of this site"));
    }

    let exclusion = RetentionService::new(&state.db)
        .request_exclusion(
            payload.site_id,
            payload.policy_id,
            &auth_user.username,
            &payload.reason,
        )
        .await?;
    record_action(
        &state,
        exclusion_action(&auth_user, "retention_exclusion_requested", &exclusion),
    )
    .await;

    Ok((StatusCode::CREATED, Json(exclusion)))
}

async fn approve_exclusion(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    payload: Option<Json<ApproveExclusionRequest>>,
) -> AppResult<Json<RetentionExclusion>> {
    auth_user.require_any_role(COMPLIANCE_ROLES)?;
    let id = parse_id(&id, "exclusion")?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;

    let exclusion = RetentionService::new(&state.db)
        .approve_exclusion(id, &auth_user.username, payload.comments.as_deref())
        .await?;
    record_action(
        &state,
        exclusion_action(&auth_user, "retention_exclusion_approved", &exclusion),
    )
    .await;

    Ok(Json(exclusion))
}

async fn remove_exclusion(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<RetentionExclusion>> {
    auth_user.require_any_role(COMPLIANCE_ROLES)?;
    let id = parse_id(&id, "exclusion")?;

    let exclusion = RetentionService::new(&state.db)
        .remove_exclusion(id, &auth_user.username)
        .await?;
    record_action(
        &state,
        exclusion_action(&auth_user, "retention_exclusion_removed", &exclusion),
    )
    .await;

    Ok(Json(exclusion))
}

async fn compliance_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<ComplianceReport>> {
    auth_user.require_any_role(COMPLIANCE_ROLES)?;
    Ok(Json(RetentionService::new(&state.db).compliance_report().await?))
}
