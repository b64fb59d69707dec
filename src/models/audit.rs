//! Audit log models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A Microsoft 365 unified audit log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    /// Content identifier assigned by Microsoft 365
    pub content_id: Uuid,
    pub creation_time: DateTime<Utc>,
    pub operation: String,
    /// Source service: SharePoint, OneDrive, Exchange, AzureActiveDirectory, ...
    pub workload: String,
    pub user_id: String,
    pub client_ip: Option<String>,
    /// Opaque record payload
    pub audit_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A record submitted for ingestion
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewAuditLog {
    pub content_id: Uuid,
    pub creation_time: DateTime<Utc>,
    #[validate(length(min = 1, max = 100, message = "Operation is required (max 100 characters)"))]
    pub operation: String,
    #[validate(length(min = 1, max = 50, message = "Workload is required (max 50 characters)"))]
    pub workload: String,
    #[serde(default)]
    #[validate(length(max = 256, message = "User ID must be at most 256 characters"))]
    pub user_id: String,
    #[validate(length(max = 45, message = "Client IP must be at most 45 characters"))]
    pub client_ip: Option<String>,
    #[serde(default = "empty_object")]
    pub audit_data: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

impl NewAuditLog {
    pub fn into_audit_log(self) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4(),
            content_id: self.content_id,
            creation_time: self.creation_time,
            operation: self.operation,
            workload: self.workload,
            user_id: self.user_id,
            client_ip: self.client_ip,
            audit_data: self.audit_data,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IngestAuditLogsRequest {
    #[validate(
        length(min = 1, max = 5000, message = "Batch must contain between 1 and 5000 records"),
        nested
    )]
    pub records: Vec<NewAuditLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestAuditLogsResponse {
    pub inserted: u64,
}

/// Audit log filter
#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub operation: Option<String>,
    pub workload: Option<String>,
    /// Substring match on the acting user
    pub user_id: Option<String>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            operation: None,
            workload: None,
            user_id: None,
            skip: 0,
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogListResponse {
    pub total: i64,
    pub logs: Vec<AuditLog>,
    pub skip: i64,
    pub limit: i64,
}

/// Download format for audit exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditExportQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub format: ExportFormat,
}

/// Regulatory framework a compliance report is cut for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceFramework {
    Gdpr,
    Iso27001,
    Sox,
}

impl ComplianceFramework {
    pub fn label(&self) -> &'static str {
        match self {
            ComplianceFramework::Gdpr => "GDPR",
            ComplianceFramework::Iso27001 => "ISO27001",
            ComplianceFramework::Sox => "SOX",
        }
    }

    /// Audit operations relevant to the framework
    pub fn operations(&self) -> &'static [&'static str] {
        match self {
            // data access, export and deletion
            ComplianceFramework::Gdpr => &[
                "FileAccessed",
                "FileDownloaded",
                "FileDeleted",
                "UserDeleted",
                "SiteDeleted",
            ],
            // security events and permission changes
            ComplianceFramework::Iso27001 => &[
                "PermissionModified",
                "SharingChanged",
                "SecurityRoleChanged",
                "SiteAccessChanged",
            ],
            // administrative and configuration changes
            ComplianceFramework::Sox => &[
                "ConfigurationChanged",
                "PolicyModified",
                "AdminActionPerformed",
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceReportQuery {
    pub report_type: ComplianceFramework,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub total_events: i64,
    pub unique_users: i64,
    /// Distinct `SiteUrl` values in the record payloads
    pub unique_sites: i64,
}

/// Audit events relevant to one framework over a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditComplianceReport {
    pub report_type: String,
    pub period: ReportPeriod,
    pub summary: ComplianceSummary,
    /// Newest first, capped
    pub events: Vec<AuditLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_audit_log_defaults() {
        let record: NewAuditLog = serde_json::from_value(serde_json::json!({
            "content_id": Uuid::new_v4(),
            "creation_time": "2024-03-01T10:00:00Z",
            "operation": "FileAccessed",
            "workload": "SharePoint",
        }))
        .unwrap();

        assert_eq!(record.user_id, "");
        assert_eq!(record.audit_data, serde_json::json!({}));
        assert!(record.validate().is_ok());

        let log = record.into_audit_log();
        assert_eq!(log.operation, "FileAccessed");
    }

    #[test]
    fn test_empty_batch_rejected() {
        let req = IngestAuditLogsRequest { records: vec![] };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_nested_record_validation() {
        let req: IngestAuditLogsRequest = serde_json::from_value(serde_json::json!({
            "records": [{
                "content_id": Uuid::new_v4(),
                "creation_time": "2024-03-01T10:00:00Z",
                "operation": "",
                "workload": "SharePoint",
            }]
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_export_format_defaults_to_csv() {
        let query: AuditExportQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(query.format, ExportFormat::Csv);
        assert_eq!(ExportFormat::Json.file_extension(), "json");
    }

    #[test]
    fn test_compliance_framework_parsing() {
        let query: ComplianceReportQuery = serde_json::from_value(serde_json::json!({
            "report_type": "iso27001",
            "start_date": "2024-01-01T00:00:00Z",
            "end_date": "2024-02-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(query.report_type, ComplianceFramework::Iso27001);
        assert_eq!(query.report_type.label(), "ISO27001");
        assert!(ComplianceFramework::Sox.operations().contains(&"PolicyModified"));
        assert!(serde_json::from_value::<ComplianceFramework>(serde_json::json!("hipaa")).is_err());
    }
}
