//! Storage analytics and version management models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant-wide storage summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSummary {
    pub total_storage_gb: f64,
    pub total_quota_gb: f64,
    pub usage_percentage: f64,
    pub sites_over_90_percent: usize,
    pub sites_over_75_percent: usize,
    pub top_consumers: Vec<StorageConsumer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConsumer {
    pub site_id: Uuid,
    pub site_url: String,
    pub site_title: String,
    pub storage_used_mb: i64,
    pub storage_quota_mb: i64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageTrendPoint {
    pub date: DateTime<Utc>,
    pub storage_used_mb: i64,
    pub storage_quota_mb: i64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageTrendQuery {
    /// Tenant-wide totals when absent
    pub site_id: Option<Uuid>,
    #[serde(default = "default_trend_days")]
    pub days: i64,
}

fn default_trend_days() -> i64 {
    30
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    QuotaIncrease,
    ArchiveCandidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRecommendation {
    pub site_id: Uuid,
    pub site_url: String,
    pub recommendation_type: RecommendationType,
    pub priority: Priority,
    pub message: String,
    pub storage_used_mb: i64,
    /// Only set for quota increases
    pub recommended_quota_mb: Option<i64>,
    pub days_inactive: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryStorage {
    pub library_id: Uuid,
    pub name: String,
    pub item_count: i64,
    pub version_count: i64,
    pub total_size_mb: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageBreakdown {
    pub site_id: Uuid,
    pub total_size_mb: i64,
    pub libraries: Vec<LibraryStorage>,
}

/// Version statistics of one library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionStats {
    pub library_id: Uuid,
    pub library_name: String,
    pub total_documents: i64,
    pub total_versions: i64,
    pub avg_versions_per_doc: f64,
    /// Documents counted against the version threshold
    pub docs_over_threshold: i64,
    pub estimated_version_storage_mb: f64,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionCleanupQuery {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_keep_minimum")]
    pub keep_minimum: i64,
}

fn default_retention_days() -> i64 {
    90
}

fn default_keep_minimum() -> i64 {
    3
}

impl Default for VersionCleanupQuery {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            keep_minimum: default_keep_minimum(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionCleanupResult {
    pub library_id: Uuid,
    pub versions_deleted: i64,
    pub storage_freed_mb: f64,
    pub documents_processed: i64,
    pub retention_days: i64,
    pub keep_minimum: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecommendation {
    pub library_id: Uuid,
    pub library_name: String,
    pub avg_versions: f64,
    pub estimated_savings_mb: f64,
    pub priority: Priority,
    pub recommendation: String,
}
