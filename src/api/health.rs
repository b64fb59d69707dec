//! Health and readiness checks

use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{
    db::{self, SiteRepository},
    models::SiteQuery,
    AppState,
};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub components: Components,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Inventory>,
}

#[derive(Serialize)]
pub struct Components {
    pub database: DatabaseStatus,
}

#[derive(Serialize)]
pub struct DatabaseStatus {
    pub status: &'static str,
    pub latency_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tracked site counts
#[derive(Serialize)]
pub struct Inventory {
    pub sites: i64,
    pub dormant_sites: i64,
}

fn label(ok: bool) -> &'static str {
    if ok {
        "healthy"
    } else {
        "unhealthy"
    }
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Database round trip plus site inventory; 503 when the store is unreachable
pub async fn health_check_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<DetailedHealthResponse>) {
    let started = Instant::now();
    let check = db::check_health(&state.db).await;
    let latency_ms = started.elapsed().as_millis();
    let ok = check.is_ok();

    let inventory = if ok {
        inventory(&state).await
    } else {
        None
    };

    let body = DetailedHealthResponse {
        status: label(ok),
        version: env!("CARGO_PKG_VERSION"),
        components: Components {
            database: DatabaseStatus {
                status: label(ok),
                latency_ms,
                error: check.err().map(|e| format!("{:#}", e)),
            },
        },
        inventory,
    };

    let code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

async fn inventory(state: &AppState) -> Option<Inventory> {
    let repo = SiteRepository::new(&state.db);
    let dormant = SiteQuery {
        is_dormant: Some(true),
        ..SiteQuery::default()
    };

    match (repo.count(&SiteQuery::default()).await, repo.count(&dormant).await) {
        (Ok(sites), Ok(dormant_sites)) => Some(Inventory {
            sites,
            dormant_sites,
        }),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("Inventory counts unavailable: {:#}", e);
            None
        }
    }
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match db::check_health(&state.db).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("Readiness check failed: {:#}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
