//! Storage analytics across the site inventory

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::GovernanceConfig;
use crate::db::{LibraryRepository, SiteRepository};
use crate::models::{
    LibraryStorage, Priority, RecommendationType, SiteCollection, StorageBreakdown,
    StorageConsumer, StorageRecommendation, StorageSummary, StorageTrendPoint,
};

const TOP_CONSUMER_COUNT: usize = 10;
const QUOTA_GROWTH_FACTOR: f64 = 1.5;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mb_to_gb(mb: i64) -> f64 {
    round2(mb as f64 / 1024.0)
}

/// Sum that clamps at `i64::MAX` instead of overflowing
fn total_mb(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0i64, i64::saturating_add)
}

fn percent(used: i64, quota: i64) -> f64 {
    if quota <= 0 {
        return 0.0;
    }
    round2(used as f64 / quota as f64 * 100.0)
}

/// Aggregate storage figures over live (non-deleted) sites
pub fn summarize(sites: &[SiteCollection], config: &GovernanceConfig) -> StorageSummary {
    let live: Vec<&SiteCollection> = sites.iter().filter(|s| !s.is_deleted).collect();

    let total_used = total_mb(live.iter().map(|s| s.storage_used_mb));
    let total_quota = total_mb(live.iter().map(|s| s.storage_quota_mb));

    let sites_over_90_percent = live
        .iter()
        .filter(|s| s.storage_usage_percent() > config.storage_critical_percent)
        .count();
    let sites_over_75_percent = live
        .iter()
        .filter(|s| s.storage_usage_percent() > config.storage_warning_percent)
        .count();

    let mut by_size = live.clone();
    by_size.sort_by(|a, b| b.storage_used_mb.cmp(&a.storage_used_mb));
    let top_consumers = by_size
        .into_iter()
        .take(TOP_CONSUMER_COUNT)
        .map(|s| StorageConsumer {
            site_id: s.id,
            site_url: s.url.clone(),
            site_title: s.title.clone(),
            storage_used_mb: s.storage_used_mb,
            storage_quota_mb: s.storage_quota_mb,
            usage_percent: round2(s.storage_usage_percent()),
        })
        .collect();

    StorageSummary {
        total_storage_gb: mb_to_gb(total_used),
        total_quota_gb: mb_to_gb(total_quota),
        usage_percentage: percent(total_used, total_quota),
        sites_over_90_percent,
        sites_over_75_percent,
        top_consumers,
    }
}

/// Quota increases for nearly full sites, archiving for large idle ones
pub fn recommend(
    sites: &[SiteCollection],
    config: &GovernanceConfig,
    now: DateTime<Utc>,
) -> Vec<StorageRecommendation> {
    let live = || sites.iter().filter(|s| !s.is_deleted);
    let mut recommendations = Vec::new();

    for site in live().filter(|s| s.storage_usage_percent() > config.storage_critical_percent) {
        recommendations.push(StorageRecommendation {
            site_id: site.id,
            site_url: site.url.clone(),
            recommendation_type: RecommendationType::QuotaIncrease,
            priority: Priority::Critical,
            message: format!("Site is at {:.2}% capacity", site.storage_usage_percent()),
            storage_used_mb: site.storage_used_mb,
            recommended_quota_mb: Some((site.storage_used_mb as f64 * QUOTA_GROWTH_FACTOR).round() as i64),
            days_inactive: None,
        });
    }

    for site in live().filter(|s| s.storage_used_mb > config.archive_candidate_min_mb) {
        let Some(last_activity) = site.last_activity else {
            continue;
        };
        let days_inactive = (now - last_activity).num_days();
        if days_inactive <= config.inactive_critical_days {
            continue;
        }
        recommendations.push(StorageRecommendation {
            site_id: site.id,
            site_url: site.url.clone(),
            recommendation_type: RecommendationType::ArchiveCandidate,
            priority: Priority::Medium,
            message: format!(
                "Site inactive for {} days with {:.2} GB storage",
                days_inactive,
                mb_to_gb(site.storage_used_mb)
            ),
            storage_used_mb: site.storage_used_mb,
            recommended_quota_mb: None,
            days_inactive: Some(days_inactive),
        });
    }

    recommendations
}

pub struct StorageAnalyticsService<'a> {
    pool: &'a SqlitePool,
    config: &'a GovernanceConfig,
}

impl<'a> StorageAnalyticsService<'a> {
    pub fn new(pool: &'a SqlitePool, config: &'a GovernanceConfig) -> Self {
        Self { pool, config }
    }

    pub async fn summary(&self) -> Result<StorageSummary> {
        let sites = SiteRepository::new(self.pool).list_all(false).await?;
        Ok(summarize(&sites, self.config))
    }

    /// Only the current snapshot is recorded, so the series has one point
    pub async fn trends(&self, site_id: Option<Uuid>, days: i64) -> Result<Vec<StorageTrendPoint>> {
        tracing::debug!("Storage trend requested for {:?} over {} days", site_id, days);
        let now = Utc::now();
        let repo = SiteRepository::new(self.pool);

        let (used, quota) = match site_id {
            Some(id) => match repo.get_by_id(id).await? {
                Some(site) => (site.storage_used_mb, site.storage_quota_mb),
                None => return Ok(Vec::new()),
            },
            None => {
                let sites = repo.list_all(false).await?;
                (
                    total_mb(sites.iter().map(|s| s.storage_used_mb)),
                    total_mb(sites.iter().map(|s| s.storage_quota_mb)),
                )
            }
        };

        Ok(vec![StorageTrendPoint {
            date: now,
            storage_used_mb: used,
            storage_quota_mb: quota,
            usage_percent: percent(used, quota),
        }])
    }

    pub async fn recommendations(&self) -> Result<Vec<StorageRecommendation>> {
        let sites = SiteRepository::new(self.pool).list_all(false).await?;
        Ok(recommend(&sites, self.config, Utc::now()))
    }

    pub async fn breakdown(&self, site_id: Uuid) -> Result<StorageBreakdown> {
        let libraries = LibraryRepository::new(self.pool).list_for_site(site_id).await?;
        let total_size_mb = total_mb(libraries.iter().map(|l| l.total_size_mb));

        Ok(StorageBreakdown {
            site_id,
            total_size_mb,
            libraries: libraries
                .into_iter()
                .map(|l| LibraryStorage {
                    library_id: l.id,
                    name: l.name,
                    item_count: l.item_count,
                    version_count: l.version_count,
                    total_size_mb: l.total_size_mb,
                })
                .collect(),
        })
    }
}
