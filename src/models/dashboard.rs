//! Dashboard views

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccessReviewSummary, ReviewCounts};

/// Site tallies for an inventory or for one owner's sites
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInventory {
    pub total: i64,
    pub active: i64,
    pub deleted: i64,
    pub dormant: i64,
    /// Live sites whose last activity is older than the inactivity window
    pub inactive: i64,
    pub storage_used_mb: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageTotals {
    pub total_used_mb: i64,
    pub total_used_gb: f64,
}

impl StorageTotals {
    pub fn from_mb(total_used_mb: i64) -> Self {
        Self {
            total_used_mb,
            total_used_gb: (total_used_mb as f64 / 1024.0 * 100.0).round() / 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditActivity {
    pub events_last_24h: i64,
}

/// Headline numbers; site owners get their own sites and reviews only
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum DashboardOverview {
    Owner {
        sites: SiteInventory,
        access_reviews: ReviewCounts,
    },
    Tenant {
        sites: SiteInventory,
        /// Live sites per web template
        by_template: BTreeMap<String, i64>,
        storage: StorageTotals,
        access_reviews: ReviewCounts,
        audit: AuditActivity,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedSiteSummary {
    pub site_id: Uuid,
    pub title: String,
    pub url: String,
    pub health_score: i32,
    pub storage_used_mb: i64,
    pub storage_usage_percent: f64,
    pub last_activity: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerDashboard {
    pub owned_sites: Vec<OwnedSiteSummary>,
    /// Cycles assigned to the caller that are not yet certified
    pub open_reviews: Vec<AccessReviewSummary>,
    pub total_sites: usize,
    pub total_open_reviews: usize,
}
