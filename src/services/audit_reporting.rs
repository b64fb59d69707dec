//! Audit log export and framework compliance reports

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::AuditLogRepository;
use crate::models::{
    AuditComplianceReport, AuditExportQuery, AuditLog, AuditLogQuery, ComplianceReportQuery,
    ExportFormat, ReportPeriod,
};
use crate::utils::AppError;

/// Window exported when neither date bound is given
pub const EXPORT_DEFAULT_DAYS: i64 = 90;

/// Largest number of records a single export may carry
pub const MAX_EXPORT_ROWS: i64 = 50_000;

/// Events listed in a compliance report; the summary covers all of them
pub const MAX_REPORT_EVENTS: i64 = 100;

#[derive(Debug, Error)]
pub enum AuditReportError {
    #[error("start_date must not be after end_date")]
    InvalidPeriod,

    #[error("Export exceeds {0} records, narrow the date range")]
    TooManyRecords(i64),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AuditReportError> for AppError {
    fn from(err: AuditReportError) -> Self {
        match err {
            AuditReportError::InvalidPeriod | AuditReportError::TooManyRecords(_) => {
                AppError::BadRequest(err.to_string())
            }
            AuditReportError::Internal(e) => {
                tracing::error!("Audit report failed: {:#}", e);
                AppError::internal("Audit report failed")
            }
        }
    }
}

/// Rendered export ready to be sent as a download
#[derive(Debug)]
pub struct AuditExport {
    pub format: ExportFormat,
    pub filename: String,
    pub records: usize,
    pub data: Vec<u8>,
}

pub struct AuditReportingService<'a> {
    logs: AuditLogRepository<'a>,
}

impl<'a> AuditReportingService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self {
            logs: AuditLogRepository::new(pool),
        }
    }

    pub async fn export(
        &self,
        query: &AuditExportQuery,
        now: DateTime<Utc>,
    ) -> Result<AuditExport, AuditReportError> {
        let (start, end) = match (query.start_date, query.end_date) {
            (None, None) => (Some(now - Duration::days(EXPORT_DEFAULT_DAYS)), None),
            bounds => bounds,
        };
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AuditReportError::InvalidPeriod);
            }
        }

        let logs = self
            .logs
            .list(&AuditLogQuery {
                start_date: start,
                end_date: end,
                limit: MAX_EXPORT_ROWS + 1,
                ..Default::default()
            })
            .await?;
        if logs.len() as i64 > MAX_EXPORT_ROWS {
            return Err(AuditReportError::TooManyRecords(MAX_EXPORT_ROWS));
        }

        let data = match query.format {
            ExportFormat::Csv => render_csv(&logs).into_bytes(),
            ExportFormat::Json => serde_json::to_vec_pretty(&logs)
                .map_err(|e| AuditReportError::Internal(e.into()))?,
        };
        tracing::info!(
            "Exported {} audit records as {}",
            logs.len(),
            query.format.file_extension()
        );

        Ok(AuditExport {
            format: query.format,
            filename: format!(
                "audit_logs_{}.{}",
                now.format("%Y%m%d"),
                query.format.file_extension()
            ),
            records: logs.len(),
            data,
        })
    }

    pub async fn compliance_report(
        &self,
        query: &ComplianceReportQuery,
    ) -> Result<AuditComplianceReport, AuditReportError> {
        if query.start_date > query.end_date {
            return Err(AuditReportError::InvalidPeriod);
        }

        let operations = query.report_type.operations();
        let summary = self
            .logs
            .operation_summary(operations, query.start_date, query.end_date)
            .await?;
        let events = self
            .logs
            .list_operations(operations, query.start_date, query.end_date, MAX_REPORT_EVENTS)
            .await?;

        Ok(AuditComplianceReport {
            report_type: query.report_type.label().to_string(),
            period: ReportPeriod {
                start_date: query.start_date,
                end_date: query.end_date,
            },
            summary,
            events,
        })
    }
}

fn render_csv(logs: &[AuditLog]) -> String {
    let mut csv = String::new();
    csv.push_str("Creation Time,Operation,Workload,User ID,Client IP,Site URL,Object ID\n");

    for log in logs {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            log.creation_time.to_rfc3339(),
            csv_field(&log.operation),
            csv_field(&log.workload),
            csv_field(&log.user_id),
            csv_field(log.client_ip.as_deref().unwrap_or("")),
            csv_field(payload_str(log, "SiteUrl")),
            csv_field(payload_str(log, "ObjectId")),
        ));
    }

    csv
}

fn payload_str<'l>(log: &'l AuditLog, key: &str) -> &'l str {
    log.audit_data.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Quote fields containing separators, quotes or line breaks
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
