//! API routes and handlers
//!
//! `/api/v1` carries sites, access reviews, dashboards, audit, auth and 2FA;
//! `/api/v2` carries the storage and retention governance endpoints.

use axum::{
    http::{header::USER_AGENT, HeaderMap},
    routing::get,
    Router,
};

use crate::{db::AdminActionRepository, models::NewAdminAction, AppState};

mod access_reviews;
mod audit_logs;
mod auth;
mod dashboard;
mod health;
mod retention;
mod sites;
mod storage;
mod two_factor;

pub use health::*;

/// Public v1 routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth::public_routes())
}

/// Protected v1 routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::protected_routes())
        .nest("/sites", sites::routes())
        .nest("/access-reviews", access_reviews::routes())
        .nest("/dashboard", dashboard::routes())
        .nest("/audit", audit_logs::routes())
        .nest("/2fa", two_factor::routes())
}

/// Protected v2 routes
pub fn v2_routes() -> Router<AppState> {
    Router::new()
        .nest("/storage", storage::routes())
        .nest("/retention", retention::routes())
}

/// Write an admin action; failures are logged and never fail the request
pub(crate) async fn record_action(state: &AppState, action: NewAdminAction) {
    let name = action.action.clone();
    if let Err(e) = AdminActionRepository::new(&state.db).insert(action).await {
        tracing::warn!("Failed to record admin action {}: {:#}", name, e);
    }
}

/// Client address as reported by the reverse proxy
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
