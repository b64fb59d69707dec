//! Site collection API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    api::record_action,
    db::{AccessRepository, LibraryRepository, SiteOwnerRepository, SiteRepository},
    middleware::AuthUser,
    models::{
        AccessEntry, AddSiteOwnerRequest, CreateLibraryRequest, CreateSiteRequest,
        DocumentLibrary, GrantAccessRequest, NewAdminAction, SiteAccessResponse, SiteCollection,
        SiteHealth, SiteListResponse, SiteLookupQuery, SiteOwner, SiteQuery, UpdateSiteRequest,
        UpdateSiteStatsRequest, UserRole,
    },
    services::assess_site_health,
    utils::{validation::parse_id, AppError, AppResult},
    AppState,
};

const MAX_PAGE_SIZE: i64 = 1000;

/// Roles that see the whole inventory; everyone else only sees sites they own
const INVENTORY_ROLES: &[UserRole] = &[
    UserRole::Auditor,
    UserRole::ComplianceOfficer,
    UserRole::Executive,
];

const REVIEW_ROLES: &[UserRole] = &[UserRole::ComplianceOfficer];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sites).post(create_site))
        .route("/lookup", get(get_site_by_url))
        .route("/{id}", get(get_site).put(update_site).delete(delete_site))
        .route("/{id}/stats", put(update_site_stats))
        .route("/{id}/dormant", post(mark_dormant))
        .route("/{id}/review", post(mark_reviewed))
        .route("/{id}/health", get(get_site_health))
        .route("/{id}/owners", get(list_owners).post(add_owner))
        .route("/{id}/access", get(get_site_access).post(grant_access))
        .route("/{id}/libraries", get(list_libraries).post(create_library))
}

fn sees_all_sites(auth_user: &AuthUser) -> bool {
    auth_user.has_any_role(INVENTORY_ROLES)
}

/// Load a site the caller may see
async fn load_site(state: &AppState, auth_user: &AuthUser, id: &str) -> AppResult<SiteCollection> {
    let id = parse_id(id, "site")?;
    let site = SiteRepository::new(&state.db)
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Site {} not found", id)))?;

    ensure_visible(state, auth_user, site).await
}

async fn ensure_visible(
    state: &AppState,
    auth_user: &AuthUser,
    site: SiteCollection,
) -> AppResult<SiteCollection> {
    if !sees_all_sites(auth_user)
        && !SiteOwnerRepository::new(&state.db)
            .is_owner(site.id, auth_user.id)
            .await?
    {
        return Err(AppError::forbidden("Not an owner of this site"));
    }

    Ok(site)
}

fn site_action(auth_user: &AuthUser, action: &str, site: &SiteCollection) -> NewAdminAction {
    NewAdminAction::new(action, "site")
        .by(auth_user.id, &auth_user.username)
        .resource(site.id)
        .details(serde_json::json!({ "url": site.url }))
}

async fn list_sites(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(mut query): Query<SiteQuery>,
) -> AppResult<Json<SiteListResponse>> {
    if query.skip < 0 {
        return Err(AppError::bad_request("skip must be zero or greater"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&query.limit) {
        return Err(AppError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if !sees_all_sites(&auth_user) {
        query.owner_user_id = Some(auth_user.id);
    }

    let repo = SiteRepository::new(&state.db);
    let total = repo.count(&query).await?;
    let sites = repo.list(&query).await?;

    Ok(Json(SiteListResponse {
        total,
        sites,
        skip: query.skip,
        limit: query.limit,
    }))
}

async fn create_site(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateSiteRequest>,
) -> AppResult<(StatusCode, Json<SiteCollection>)> {
    auth_user.require_admin()?;
    payload.validate()?;

    let repo = SiteRepository::new(&state.db);
    if repo.exists(payload.url.trim()).await? {
        return Err(AppError::conflict(format!(
            "A site with URL {} already exists",
            payload.url.trim()
        )));
    }

    let site = repo.create(&payload.into_site()).await?;
    record_action(&state, site_action(&auth_user, "site_created", &site)).await;
    tracing::info!("Site {} registered by {}", site.url, auth_user.username);

    Ok((StatusCode::CREATED, Json(site)))
}

async fn get_site_by_url(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<SiteLookupQuery>,
) -> AppResult<Json<SiteCollection>> {
    let site = SiteRepository::new(&state.db)
        .get_by_url(query.url.trim())
        .await?
        .ok_or_else(|| AppError::not_found(format!("No site with URL {}", query.url)))?;

    Ok(Json(ensure_visible(&state, &auth_user, site).await?))
}

async fn get_site(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<SiteCollection>> {
    Ok(Json(load_site(&state, &auth_user, &id).await?))
}

async fn update_site(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSiteRequest>,
) -> AppResult<Json<SiteCollection>> {
    auth_user.require_admin()?;
    payload.validate()?;

    let mut site = load_site(&state, &auth_user, &id).await?;
    let repo = SiteRepository::new(&state.db);

    if let Some(ref url) = payload.url {
        let url = url.trim();
        if url != site.url && repo.exists(url).await? {
            return Err(AppError::conflict(format!("A site with URL {} already exists", url)));
        }
    }

    payload.apply(&mut site);
    let site = repo
        .update(&site)
        .await?
        .ok_or_else(|| AppError::not_found("Site not found"))?;
    record_action(&state, site_action(&auth_user, "site_updated", &site)).await;

    Ok(Json(site))
}

async fn delete_site(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    auth_user.require_admin()?;
    let site = load_site(&state, &auth_user, &id).await?;

    if !SiteRepository::new(&state.db).delete(site.id).await? {
        return Err(AppError::not_found("Site not found"));
    }
    record_action(&state, site_action(&auth_user, "site_deleted", &site)).await;
    tracing::info!("Site {} deleted by {}", site.url, auth_user.username);

    Ok(StatusCode::NO_CONTENT)
}

async fn update_site_stats(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSiteStatsRequest>,
) -> AppResult<Json<SiteCollection>> {
    auth_user.require_admin()?;
    payload.validate()?;
    let id = parse_id(&id, "site")?;

    let site = SiteRepository::new(&state.db)
        .update_stats(
            id,
            payload.storage_used_mb,
            payload.storage_quota_mb,
            payload.last_activity,
        )
        .await?
        .ok_or_else(|| AppError::not_found(format!("Site {} not found", id)))?;

    Ok(Json(site))
}

async fn mark_dormant(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<SiteCollection>> {
    auth_user.require_any_role(REVIEW_ROLES)?;
    let id = parse_id(&id, "site")?;

    let site = SiteRepository::new(&state.db)
        .mark_dormant(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Site {} not found", id)))?;
    record_action(&state, site_action(&auth_user, "site_marked_dormant", &site)).await;

    Ok(Json(site))
}

async fn mark_reviewed(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<SiteCollection>> {
    auth_user.require_any_role(REVIEW_ROLES)?;
    let id = parse_id(&id, "site")?;

    let site = SiteRepository::new(&state.db)
        .mark_reviewed(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Site {} not found", id)))?;
    record_action(&state, site_action(&auth_user, "site_reviewed", &site)).await;

    Ok(Json(site))
}

async fn get_site_health(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<SiteHealth>> {
    let site = load_site(&state, &auth_user, &id).await?;
    let owners = SiteOwnerRepository::new(&state.db).list_for_site(site.id).await?;

    Ok(Json(assess_site_health(
        &site,
        &owners,
        &state.config.governance,
        Utc::now(),
    )))
}

async fn list_owners(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<SiteOwner>>> {
    let site = load_site(&state, &auth_user, &id).await?;
    Ok(Json(SiteOwnerRepository::new(&state.db).list_for_site(site.id).await?))
}

async fn add_owner(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<AddSiteOwnerRequest>,
) -> AppResult<(StatusCode, Json<SiteOwner>)> {
    auth_user.require_admin()?;
    payload.validate()?;
    let site = load_site(&state, &auth_user, &id).await?;

    let owner = SiteOwnerRepository::new(&state.db).add(site.id, &payload).await?;
    record_action(
        &state,
        site_action(&auth_user, "site_owner_added", &site)
            .details(serde_json::json!({ "url": site.url, "owner": owner.user_email })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(owner)))
}

async fn get_site_access(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<SiteAccessResponse>> {
    let site = load_site(&state, &auth_user, &id).await?;
    let entries = AccessRepository::new(&state.db).list_for_site(site.id).await?;

    Ok(Json(SiteAccessResponse {
        site_id: site.id,
        total_entries: entries.len(),
        external_users: entries.iter().filter(|e| e.is_external_user).count(),
        entries,
    }))
}

async fn grant_access(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<GrantAccessRequest>,
) -> AppResult<(StatusCode, Json<AccessEntry>)> {
    auth_user.require_admin()?;
    payload.validate()?;
    if payload.user_id.is_none() && payload.user_email.is_none() && payload.group_name.is_none() {
        return Err(AppError::bad_request(
            "One of user_id, user_email or group_name is required",
        ));
    }
    let site = load_site(&state, &auth_user, &id).await?;

    let entry = AccessRepository::new(&state.db).grant(site.id, &payload).await?;
    record_action(
        &state,
        site_action(&auth_user, "site_access_granted", &site).details(serde_json::json!({
            "url": site.url,
            "permission_level": entry.permission_level,
            "external": entry.is_external_user,
        })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_libraries(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<DocumentLibrary>>> {
    let site = load_site(&state, &auth_user, &id).await?;
    Ok(Json(LibraryRepository::new(&state.db).list_for_site(site.id).await?))
}

async fn create_library(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<CreateLibraryRequest>,
) -> AppResult<(StatusCode, Json<DocumentLibrary>)> {
    auth_user.require_admin()?;
    payload.validate()?;
    let site = load_site(&state, &auth_user, &id).await?;

    let library = LibraryRepository::new(&state.db)
        .create(&payload.into_library(site.id))
        .await?;
    record_action(
        &state,
        NewAdminAction::new("library_created", "library")
            .by(auth_user.id, &auth_user.username)
            .resource(library.id)
            .details(serde_json::json!({ "site_id": site.id, "name": library.name })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(library)))
}
