//! Dashboard endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;

use crate::{
    middleware::AuthUser,
    models::{DashboardOverview, OwnerDashboard, UserRole},
    services::DashboardService,
    utils::AppResult,
    AppState,
};

/// Roles that get the tenant-wide overview
const TENANT_VIEW_ROLES: &[UserRole] = &[
    UserRole::Auditor,
    UserRole::ComplianceOfficer,
    UserRole::Executive,
];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/overview", get(get_overview))
        .route("/owner", get(get_owner_dashboard))
}

async fn get_overview(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DashboardOverview>> {
    let service = DashboardService::new(&state.db, &state.config.governance);
    let now = Utc::now();

    let overview = if auth_user.has_any_role(TENANT_VIEW_ROLES) {
        service.tenant_overview(now).await?
    } else {
        service.owner_overview(auth_user.id, now).await?
    };
    Ok(Json(overview))
}

async fn get_owner_dashboard(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<OwnerDashboard>> {
    Ok(Json(
        DashboardService::new(&state.db, &state.config.governance)
            .owner_dashboard(auth_user.id, Utc::now())
            .await?,
    ))
}
