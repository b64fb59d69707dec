//! Retention policy and exclusion models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A Microsoft Purview retention policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub retention_period_days: Option<i64>,
    pub scope: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRetentionPolicyRequest {
    #[validate(length(min = 1, max = 255, message = "Policy name is required"))]
    pub name: String,
    #[validate(length(max = 2000, message = "Description too long"))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Retention period must be positive"))]
    pub retention_period_days: Option<i64>,
    #[validate(length(max = 255, message = "Scope too long"))]
    pub scope: Option<String>,
}

/// Lifecycle of an exclusion: requested, approved, then removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionStatus {
    #[default]
    PendingApproval,
    Active,
    Removed,
}

impl ExclusionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionStatus::PendingApproval => "pending_approval",
            ExclusionStatus::Active => "active",
            ExclusionStatus::Removed => "removed",
        }
    }
}

impl std::str::FromStr for ExclusionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_approval" => Ok(ExclusionStatus::PendingApproval),
            "active" => Ok(ExclusionStatus::Active),
            "removed" => Ok(ExclusionStatus::Removed),
            _ => Err(format!("Invalid exclusion status: {}", s)),
        }
    }
}

/// Exemption of one site from one retention policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionExclusion {
    pub id: Uuid,
    pub site_id: Uuid,
    pub policy_id: Uuid,
    pub requested_by: String,
    pub reason: String,
    pub status: ExclusionStatus,
    pub added_date: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approval_comments: Option<String>,
    pub removed_date: Option<DateTime<Utc>>,
    pub removed_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateExclusionRequest {
    pub site_id: Uuid,
    pub policy_id: Uuid,
    #[validate(length(min = 1, max = 2000, message = "A reason is required"))]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ApproveExclusionRequest {
    #[validate(length(max = 2000, message = "Comments too long"))]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExclusionQuery {
    pub status: Option<ExclusionStatus>,
    pub site_id: Option<Uuid>,
}

/// Retention compliance of one site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteComplianceStatus {
    pub site_id: Uuid,
    pub site_url: String,
    pub site_title: String,
    pub exclusion_count: usize,
    pub excluded_policies: Vec<ExcludedPolicy>,
    pub status: ComplianceState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedPolicy {
    pub policy_id: Uuid,
    pub reason: String,
    pub added_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceState {
    Compliant,
    NonCompliant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub total_sites: usize,
    pub compliant_sites: usize,
    pub non_compliant_sites: usize,
    pub sites: Vec<SiteComplianceStatus>,
}
