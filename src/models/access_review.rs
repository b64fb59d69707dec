//! Access review models
//!
//! A review cycle asks a site's primary owner to confirm, once per quarter,
//! every entry of the site's access matrix. Items are a snapshot taken when
//! the cycle opens; certification closes the cycle once no item is pending.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::AssignmentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    InProgress,
    /// Still open past its due date
    Overdue,
    Completed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::InProgress => "in_progress",
            ReviewStatus::Overdue => "overdue",
            ReviewStatus::Completed => "completed",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, ReviewStatus::Completed)
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "in_progress" => Ok(ReviewStatus::InProgress),
            "overdue" => Ok(ReviewStatus::Overdue),
            "completed" => Ok(ReviewStatus::Completed),
            _ => Err(format!("Invalid review status: {}", s)),
        }
    }
}

/// Reviewer verdict on one access entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    #[default]
    Pending,
    Approved,
    Revoke,
    NeedsInvestigation,
}

impl AccessDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::Pending => "pending",
            AccessDecision::Approved => "approved",
            AccessDecision::Revoke => "revoke",
            AccessDecision::NeedsInvestigation => "needs_investigation",
        }
    }
}

impl std::str::FromStr for AccessDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AccessDecision::Pending),
            "approved" => Ok(AccessDecision::Approved),
            "revoke" => Ok(AccessDecision::Revoke),
            "needs_investigation" => Ok(AccessDecision::NeedsInvestigation),
            _ => Err(format!("Invalid access decision: {}", s)),
        }
    }
}

/// Cycle identifier for the quarter containing `at`, e.g. 20252 for Q2 2025
pub fn cycle_number_for(at: DateTime<Utc>) -> i64 {
    let quarter = (at.month0() / 3 + 1) as i64;
    i64::from(at.year()) * 10 + quarter
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessReviewCycle {
    pub id: Uuid,
    pub site_id: Uuid,
    pub cycle_number: i64,
    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: ReviewStatus,
    /// Primary owner responsible for the review
    pub assigned_to: Uuid,
    pub certified_date: Option<DateTime<Utc>>,
    pub certified_by: Option<String>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItemCounts {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub revoked: i64,
    pub needs_investigation: i64,
}

/// Cycle tallies for dashboards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCounts {
    pub total: i64,
    pub open: i64,
    pub overdue: i64,
    pub completed: i64,
}

/// A cycle with its site, assignee and decision tally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessReviewSummary {
    #[serde(flatten)]
    pub cycle: AccessReviewCycle,
    pub site_title: String,
    pub site_url: String,
    pub assigned_to_email: Option<String>,
    pub is_overdue: bool,
    pub items: ReviewItemCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessReviewItem {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_email: String,
    pub permission_level: String,
    pub assignment_type: AssignmentType,
    pub last_access_date: Option<DateTime<Utc>>,
    pub decision: AccessDecision,
    pub reviewer_comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Set when the decision is to revoke the entry
    pub removal_requested: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewQuery {
    pub status: Option<ReviewStatus>,
    /// Only cycles that are not completed
    #[serde(default)]
    pub open_only: bool,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Restrict to cycles assigned to this user
    #[serde(skip)]
    pub assigned_to: Option<Uuid>,
}

fn default_limit() -> i64 {
    100
}

impl Default for ReviewQuery {
    fn default() -> Self {
        Self {
            status: None,
            open_only: false,
            skip: 0,
            limit: default_limit(),
            assigned_to: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessReviewListResponse {
    pub total: i64,
    pub reviews: Vec<AccessReviewSummary>,
    pub skip: i64,
    pub limit: i64,
}

fn decided(decision: &AccessDecision) -> Result<(), ValidationError> {
    if *decision == AccessDecision::Pending {
        Err(ValidationError::new("decision")
            .with_message("A decision must approve, revoke or flag the entry".into()))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewDecisionRequest {
    #[validate(custom(function = "decided"))]
    pub decision: AccessDecision,
    #[validate(length(max = 2000, message = "Comments too long"))]
    pub reviewer_comments: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CertifyReviewRequest {
    #[validate(length(max = 2000, message = "Comments too long"))]
    pub comments: Option<String>,
}

/// Outcome of opening the quarter's cycles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewInitiationStats {
    pub cycle_number: i64,
    pub total_sites: usize,
    pub reviews_created: usize,
    /// Sites that already have a cycle this quarter or lack a primary owner account
    pub reviews_skipped: usize,
    pub marked_overdue: u64,
}
