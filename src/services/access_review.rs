//! Quarterly access review workflow

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::config::GovernanceConfig;
use crate::db::{AccessReviewRepository, ReviewUpdate};
use crate::models::{
    cycle_number_for, AccessDecision, AccessReviewItem, AccessReviewSummary, ReviewInitiationStats,
};
use crate::utils::AppError;

#[derive(Debug, Error)]
pub enum AccessReviewError {
    #[error("Review cycle not found")]
    CycleNotFound,

    #[error("Review item not found")]
    ItemNotFound,

    #[error("Review cycle is already certified")]
    AlreadyCertified,

    #[error("Cannot certify: {0} items still pending review")]
    PendingItems(i64),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AccessReviewError> for AppError {
    fn from(err: AccessReviewError) -> Self {
        match err {
            AccessReviewError::CycleNotFound | AccessReviewError::ItemNotFound => {
                AppError::NotFound(err.to_string())
            }
            AccessReviewError::AlreadyCertified => AppError::Conflict(err.to_string()),
            AccessReviewError::PendingItems(_) => AppError::BadRequest(err.to_string()),
            AccessReviewError::Internal(e) => {
                tracing::error!("Access review operation failed: {:#}", e);
                AppError::internal("Access review operation failed")
            }
        }
    }
}

pub struct AccessReviewService<'a> {
    reviews: AccessReviewRepository<'a>,
    review_period: Duration,
}

impl<'a> AccessReviewService<'a> {
    pub fn new(pool: &'a SqlitePool, config: &GovernanceConfig) -> Self {
        Self {
            reviews: AccessReviewRepository::new(pool),
            review_period: Duration::days(config.review_period_days),
        }
    }

    /// Open this quarter's cycle on every live site with a primary owner account.
    /// Cycles that already exist are left alone, and open cycles past their due
    /// date are flagged overdue first.
    pub async fn initiate_quarterly_reviews(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ReviewInitiationStats, AccessReviewError> {
        let mut stats = ReviewInitiationStats {
            cycle_number: cycle_number_for(now),
            marked_overdue: self.reviews.mark_overdue(now).await?,
            ..Default::default()
        };

        let candidates = self.reviews.candidates().await?;
        stats.total_sites = candidates.len();
        let due = now + self.review_period;

        for candidate in candidates {
            let Some(reviewer) = candidate.reviewer else {
                tracing::warn!(
                    "Site {} has no primary owner account, skipping access review",
                    candidate.site_url
                );
                stats.reviews_skipped += 1;
                continue;
            };

            match self
                .reviews
                .open_cycle(candidate.site_id, stats.cycle_number, reviewer, now, due)
                .await?
            {
                Some(cycle_id) => {
                    tracing::info!(
                        "Access review {} opened for {} (cycle {})",
                        cycle_id,
                        candidate.site_url,
                        stats.cycle_number
                    );
                    stats.reviews_created += 1;
                }
                None => stats.reviews_skipped += 1,
            }
        }

        tracing::info!(
            "Access review initiation for cycle {}: {} created, {} skipped, {} overdue",
            stats.cycle_number,
            stats.reviews_created,
            stats.reviews_skipped,
            stats.marked_overdue
        );
        Ok(stats)
    }

    pub async fn decide(
        &self,
        cycle_id: Uuid,
        item_id: Uuid,
        decision: AccessDecision,
        comments: Option<&str>,
    ) -> Result<AccessReviewItem, AccessReviewError> {
        match self
            .reviews
            .record_decision(cycle_id, item_id, decision, comments)
            .await?
        {
            ReviewUpdate::Applied(item) => {
                tracing::debug!("Review item {} marked {}", item_id, decision.as_str());
                Ok(item)
            }
            ReviewUpdate::Completed => Err(AccessReviewError::AlreadyCertified),
            ReviewUpdate::NotFound | ReviewUpdate::PendingItems(_) => {
                Err(AccessReviewError::ItemNotFound)
            }
        }
    }

    pub async fn certify(
        &self,
        cycle_id: Uuid,
        certified_by: &str,
        comments: Option<&str>,
    ) -> Result<AccessReviewSummary, AccessReviewError> {
        match self.reviews.certify(cycle_id, certified_by, comments).await? {
            ReviewUpdate::Applied(summary) => {
                tracing::info!(
                    "Access review {} for {} certified by {}",
                    cycle_id,
                    summary.site_url,
                    certified_by
                );
                Ok(summary)
            }
            ReviewUpdate::NotFound => Err(AccessReviewError::CycleNotFound),
            ReviewUpdate::Completed => Err(AccessReviewError::AlreadyCertified),
            ReviewUpdate::PendingItems(n) => Err(AccessReviewError::PendingItems(n)),
        }
    }
}
