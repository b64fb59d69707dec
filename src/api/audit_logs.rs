//! Audit log API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    api::record_action,
    db::{AdminActionRepository, AuditLogRepository},
    middleware::AuthUser,
    models::{
        AdminActionListResponse, AdminActionQuery, AuditComplianceReport, AuditExportQuery,
        AuditLog, AuditLogListResponse, AuditLogQuery, ComplianceReportQuery,
        IngestAuditLogsRequest, IngestAuditLogsResponse, NewAdminAction, UserRole,
    },
    services::AuditReportingService,
    utils::{validation::parse_id, AppError, AppResult},
    AppState,
};

const MAX_PAGE_SIZE: i64 = 1000;

const AUDIT_READERS: &[UserRole] = &[UserRole::Auditor, UserRole::ComplianceOfficer];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/logs", get(list_audit_logs).post(ingest_audit_logs))
        .route("/logs/export", get(export_audit_logs))
        .route("/logs/{id}", get(get_audit_log))
        .route("/actions", get(list_admin_actions))
        .route("/compliance-report", get(compliance_report))
}

fn check_paging(skip: i64, limit: i64) -> AppResult<()> {
    if skip < 0 {
        return Err(AppError::bad_request("skip must be zero or greater"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(())
}

async fn list_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<AuditLogQuery>,
) -> AppResult<Json<AuditLogListResponse>> {
    auth_user.require_any_role(AUDIT_READERS)?;
    check_paging(query.skip, query.limit)?;
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(AppError::bad_request("start_date must not be after end_date"));
        }
    }

    let repo = AuditLogRepository::new(&state.db);
    let total = repo.count(&query).await?;
    let logs = repo.list(&query).await?;

    Ok(Json(AuditLogListResponse {
        total,
        logs,
        skip: query.skip,
        limit: query.limit,
    }))
}

async fn get_audit_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<AuditLog>> {
    auth_user.require_any_role(AUDIT_READERS)?;
    let id = parse_id(&id, "audit log")?;

    let log = AuditLogRepository::new(&state.db)
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Audit log {} not found", id)))?;

    Ok(Json(log))
}

/// Bulk ingestion from the Management Activity API collector
async fn ingest_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<IngestAuditLogsRequest>,
) -> AppResult<(StatusCode, Json<IngestAuditLogsResponse>)> {
    auth_user.require_admin()?;
    payload.validate()?;

    let logs: Vec<AuditLog> = payload
        .records
        .into_iter()
        .map(|r| r.into_audit_log())
        .collect();
    let inserted = AuditLogRepository::new(&state.db).bulk_insert(&logs).await?;

    record_action(
        &state,
        NewAdminAction::new("audit_logs_ingested", "audit_log")
            .by(auth_user.id, &auth_user.username)
            .details(serde_json::json!({ "inserted": inserted })),
    )
    .await;
    tracing::info!("Ingested {} audit records", inserted);

    Ok((StatusCode::CREATED, Json(IngestAuditLogsResponse { inserted })))
}

/// Download the audit trail as CSV or JSON
async fn export_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<AuditExportQuery>,
) -> AppResult<(StatusCode, [(String, String); 2], Vec<u8>)> {
    auth_user.require_any_role(AUDIT_READERS)?;

    let export = AuditReportingService::new(&state.db)
        .export(&query, Utc::now())
        .await?;
    record_action(
        &state,
        NewAdminAction::new("audit_logs_exported", "audit_log")
            .by(auth_user.id, &auth_user.username)
            .details(serde_json::json!({
                "format": export.format.file_extension(),
                "records": export.records,
            })),
    )
    .await;

    Ok((
        StatusCode::OK,
        [
            (
                "Content-Type".to_string(),
                export.format.content_type().to_string(),
            ),
            (
                "Content-Disposition".to_string(),
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.data,
    ))
}

async fn compliance_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ComplianceReportQuery>,
) -> AppResult<Json<AuditComplianceReport>> {
    auth_user.require_any_role(&[UserRole::ComplianceOfficer])?;

    let report = AuditReportingService::new(&state.db)
        .compliance_report(&query)
        .await?;
    tracing::info!(
        "{} compliance report generated by {}: {} events",
        report.report_type,
        auth_user.username,
        report.summary.total_events
    );

    Ok(Json(report))
}

async fn list_admin_actions(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<AdminActionQuery>,
) -> AppResult<Json<AdminActionListResponse>> {
    auth_user.require_any_role(&[UserRole::Auditor])?;
    check_paging(query.skip, query.limit)?;

    let repo = AdminActionRepository::new(&state.db);
    let total = repo.count(&query).await?;
    let actions = repo.list(&query).await?;

    Ok(Json(AdminActionListResponse {
        total,
        actions,
        skip: query.skip,
        limit: query.limit,
    }))
}
