//! Dashboard aggregation

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::GovernanceConfig;
use crate::db::{AccessReviewRepository, AuditLogRepository, SiteOwnerRepository, SiteRepository};
use crate::models::{
    AuditActivity, AuditLogQuery, DashboardOverview, OwnedSiteSummary, OwnerDashboard, ReviewQuery,
    StorageTotals,
};
use crate::services::assess_site_health;

/// Largest number of open reviews listed on an owner's dashboard
const MAX_OPEN_REVIEWS: i64 = 100;

pub struct DashboardService<'a> {
    pool: &'a SqlitePool,
    config: &'a GovernanceConfig,
}

impl<'a> DashboardService<'a> {
    pub fn new(pool: &'a SqlitePool, config: &'a GovernanceConfig) -> Self {
        Self { pool, config }
    }

    fn inactive_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.config.inactive_warning_days)
    }

    /// Sites and reviews of one owner
    pub async fn owner_overview(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<DashboardOverview> {
        let sites = SiteRepository::new(self.pool)
            .inventory(Some(user_id), self.inactive_before(now))
            .await?;
        let access_reviews = AccessReviewRepository::new(self.pool)
            .counts(Some(user_id), now)
            .await?;

        Ok(DashboardOverview::Owner {
            sites,
            access_reviews,
        })
    }

    /// Tenant-wide inventory, storage, review and audit figures
    pub async fn tenant_overview(&self, now: DateTime<Utc>) -> Result<DashboardOverview> {
        let site_repo = SiteRepository::new(self.pool);
        let sites = site_repo.inventory(None, self.inactive_before(now)).await?;
        let by_template = site_repo.template_counts().await?;
        let access_reviews = AccessReviewRepository::new(self.pool).counts(None, now).await?;
        let events_last_24h = AuditLogRepository::new(self.pool)
            .count(&AuditLogQuery {
                start_date: Some(now - Duration::hours(24)),
                ..Default::default()
            })
            .await?;

        Ok(DashboardOverview::Tenant {
            storage: StorageTotals::from_mb(sites.storage_used_mb),
            sites,
            by_template,
            access_reviews,
            audit: AuditActivity { events_last_24h },
        })
    }

    /// Health of every owned site plus the owner's uncertified reviews
    pub async fn owner_dashboard(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<OwnerDashboard> {
        let sites = SiteRepository::new(self.pool).list_owned(user_id).await?;
        let owners = SiteOwnerRepository::new(self.pool);

        let mut owned_sites = Vec::with_capacity(sites.len());
        for site in sites {
            let site_owners = owners.list_for_site(site.id).await?;
            let health = assess_site_health(&site, &site_owners, self.config, now);
            owned_sites.push(OwnedSiteSummary {
                site_id: site.id,
                title: site.title,
                url: site.url,
                health_score: health.health_score,
                storage_used_mb: site.storage_used_mb,
                storage_usage_percent: health.storage_usage_percent,
                last_activity: site.last_activity,
                is_deleted: site.is_deleted,
            });
        }

        let open_reviews = AccessReviewRepository::new(self.pool)
            .list_summaries(&ReviewQuery {
                open_only: true,
                limit: MAX_OPEN_REVIEWS,
                assigned_to: Some(user_id),
                ..Default::default()
            })
            .await?;

        Ok(OwnerDashboard {
            total_sites: owned_sites.len(),
            total_open_reviews: open_reviews.len(),
            owned_sites,
            open_reviews,
        })
    }
}
