//! Storage analytics and version management endpoints (`/api/v2/storage`)

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    api::record_action,
    db::{SiteOwnerRepository, SiteRepository},
    middleware::AuthUser,
    models::{
        DocumentLibrary, NewAdminAction, StorageBreakdown, StorageRecommendation, StorageSummary,
        StorageTrendPoint, StorageTrendQuery, UserRole, VersionCleanupQuery, VersionCleanupResult,
        VersionRecommendation, VersionStats,
    },
    services::{StorageAnalyticsService, VersionManagementService},
    utils::{validation::parse_id, AppError, AppResult},
    AppState,
};

const TREND_DAYS: std::ops::RangeInclusive<i64> = 7..=365;
const CLEANUP_RETENTION_DAYS: std::ops::RangeInclusive<i64> = 30..=365;
const CLEANUP_KEEP_MINIMUM: std::ops::RangeInclusive<i64> = 1..=10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(get_summary))
        .route("/trends", get(get_trends))
        .route("/recommendations", get(get_recommendations))
        .route("/sites/{id}/breakdown", get(get_breakdown))
        .route(
            "/sites/{id}/version-recommendations",
            get(get_version_recommendations),
        )
        .route("/libraries/{id}/versions", get(scan_library_versions))
        .route("/libraries/{id}/cleanup-versions", post(cleanup_versions))
}

async fn get_summary(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<StorageSummary>> {
    auth_user.require_any_role(&[UserRole::Executive])?;
    let service = StorageAnalyticsService::new(&state.db, &state.config.governance);
    Ok(Json(service.summary().await?))
}

async fn get_trends(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<StorageTrendQuery>,
) -> AppResult<Json<Vec<StorageTrendPoint>>> {
    if !TREND_DAYS.contains(&query.days) {
        return Err(AppError::bad_request("days must be between 7 and 365"));
    }
    let service = StorageAnalyticsService::new(&state.db, &state.config.governance);
    Ok(Json(service.trends(query.site_id, query.days).await?))
}

async fn get_recommendations(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<StorageRecommendation>>> {
    auth_user.require_admin()?;
    let service = StorageAnalyticsService::new(&state.db, &state.config.governance);
    Ok(Json(service.recommendations().await?))
}

async fn get_breakdown(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<StorageBreakdown>> {
    let id = parse_id(&id, "site")?;
    if SiteRepository::new(&state.db).get_by_id(id).await?.is_none() {
        return Err(AppError::not_found(format!("Site {} not found", id)));
    }

    let service = StorageAnalyticsService::new(&state.db, &state.config.governance);
    Ok(Json(service.breakdown(id).await?))
}

/// Site owners may only work with their own sites
async fn ensure_site_access(state: &AppState, auth_user: &AuthUser, site_id: Uuid) -> AppResult<()> {
    if auth_user.is_admin() {
        return Ok(());
    }
    if SiteOwnerRepository::new(&state.db)
        .is_owner(site_id, auth_user.id)
        .await?
    {
        Ok(())
    } else {
        Err(AppError::forbidden("Not an owner of this site"))
    }
}

async fn ensure_library_access(
    state: &AppState,
    auth_user: &AuthUser,
    library: &DocumentLibrary,
) -> AppResult<()> {
    ensure_site_access(state, auth_user, library.site_id).await
}

async fn scan_library_versions(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<VersionStats>> {
    auth_user.require_any_role(&[UserRole::SiteOwner])?;
    let id = parse_id(&id, "library")?;
    let service = VersionManagementService::new(&state.db, state.config.governance.version_threshold);

    let library = service
        .get_library(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Library {} not found", id)))?;
    ensure_library_access(&state, &auth_user, &library).await?;

    let stats = service
        .scan(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Library {} not found", id)))?;
    Ok(Json(stats))
}

async fn cleanup_versions(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<VersionCleanupQuery>,
) -> AppResult<Json<VersionCleanupResult>> {
    auth_user.require_admin()?;
    if !CLEANUP_RETENTION_DAYS.contains(&query.retention_days) {
        return Err(AppError::bad_request("retention_days must be between 30 and 365"));
    }
    if !CLEANUP_KEEP_MINIMUM.contains(&query.keep_minimum) {
        return Err(AppError::bad_request("keep_minimum must be between 1 and 10"));
    }
    let id = parse_id(&id, "library")?;

    let service = VersionManagementService::new(&state.db, state.config.governance.version_threshold);
    let result = service
        .cleanup(id, &query)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Library {} not found", id)))?;

    record_action(
        &state,
        NewAdminAction::new("version_cleanup", "library")
            .by(auth_user.id, &auth_user.username)
            .resource(id)
            .details(serde_json::json!({
                "retention_days": query.retention_days,
                "keep_minimum": query.keep_minimum,
                "versions_deleted": result.versions_deleted,
                "storage_freed_mb": result.storage_freed_mb,
            })),
    )
    .await;

    Ok(Json(result))
}

async fn get_version_recommendations(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<VersionRecommendation>>> {
    auth_user.require_any_role(&[UserRole::SiteOwner])?;
    let id = parse_id(&id, "site")?;
    if SiteRepository::new(&state.db).get_by_id(id).await?.is_none() {
        return Err(AppError::not_found(format!("Site {} not found", id)));
    }
    ensure_site_access(&state, &auth_user, id).await?;

    let service = VersionManagementService::new(&state.db, state.config.governance.version_threshold);
    Ok(Json(service.recommendations(id).await?))
}
