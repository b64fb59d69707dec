//! Retention exclusion workflow and compliance reporting

use std::collections::HashMap;

use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{ExclusionTransition, RetentionRepository, SiteRepository};
use crate::models::{
    ComplianceReport, ComplianceState, ExcludedPolicy, ExclusionQuery, ExclusionStatus,
    RetentionExclusion, SiteCollection, SiteComplianceStatus,
};
use crate::utils::AppError;

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("Site not found")]
    SiteNotFound,

    #[error("Retention policy not found")]
    PolicyNotFound,

    #[error("Exclusion not found")]
    ExclusionNotFound,

    #[error("Exclusion already exists for this site and policy")]
    AlreadyExcluded,

    #[error("Exclusion is already {}", .0.as_str())]
    InvalidTransition(ExclusionStatus),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RetentionError> for AppError {
    fn from(err: RetentionError) -> Self {
        match err {
            RetentionError::SiteNotFound
            | RetentionError::PolicyNotFound
            | RetentionError::ExclusionNotFound => AppError::NotFound(err.to_string()),
            RetentionError::AlreadyExcluded | RetentionError::InvalidTransition(_) => {
                AppError::Conflict(err.to_string())
            }
            RetentionError::Internal(e) => {
                tracing::error!("Retention operation failed: {:#}", e);
                AppError::internal("Retention operation failed")
            }
        }
    }
}

pub struct RetentionService<'a> {
    sites: SiteRepository<'a>,
    retention: RetentionRepository<'a>,
}

impl<'a> RetentionService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self {
            sites: SiteRepository::new(pool),
            retention: RetentionRepository::new(pool),
        }
    }

    pub async fn request_exclusion(
        &self,
        site_id: Uuid,
        policy_id: Uuid,
        requested_by: &str,
        reason: &str,
    ) -> Result<RetentionExclusion, RetentionError> {
        if self.sites.get_by_id(site_id).await?.is_none() {
            return Err(RetentionError::SiteNotFound);
        }
        if self.retention.get_policy(policy_id).await?.is_none() {
            return Err(RetentionError::PolicyNotFound);
        }
        if self.retention.has_active_exclusion(site_id, policy_id).await? {
            return Err(RetentionError::AlreadyExcluded);
        }

        let exclusion = self
            .retention
            .create_exclusion(site_id, policy_id, requested_by, reason)
            .await?;
        tracing::info!(
            "Exclusion {} requested for site {} from policy {} by {}",
            exclusion.id,
            site_id,
            policy_id,
            requested_by
        );
        Ok(exclusion)
    }

    pub async fn approve_exclusion(
        &self,
        exclusion_id: Uuid,
        approved_by: &str,
        comments: Option<&str>,
    ) -> Result<RetentionExclusion, RetentionError> {
        let exclusion = applied(
            self.retention
                .approve_exclusion(exclusion_id, approved_by, comments)
                .await?,
        )?;
        tracing::info!("Exclusion {} approved by {}", exclusion_id, approved_by);
        Ok(exclusion)
    }

    pub async fn remove_exclusion(
        &self,
        exclusion_id: Uuid,
        removed_by: &str,
    ) -> Result<RetentionExclusion, RetentionError> {
        let exclusion = applied(self.retention.remove_exclusion(exclusion_id, removed_by).await?)?;
        tracing::info!("Exclusion {} removed by {}", exclusion_id, removed_by);
        Ok(exclusion)
    }

    /// Compliance of every live site against its active exclusions
    pub async fn compliance_report(&self) -> Result<ComplianceReport, RetentionError> {
        let sites = self.sites.list_all(false).await?;
        let active = self
            .retention
            .list_exclusions(&ExclusionQuery {
                status: Some(ExclusionStatus::Active),
                site_id: None,
            })
            .await?;
        Ok(build_compliance_report(&sites, active))
    }
}

fn applied(transition: ExclusionTransition) -> Result<RetentionExclusion, RetentionError> {
    match transition {
        ExclusionTransition::Applied(exclusion) => Ok(exclusion),
        ExclusionTransition::NotFound => Err(RetentionError::ExclusionNotFound),
        ExclusionTransition::InvalidState(status) => Err(RetentionError::InvalidTransition(status)),
        ExclusionTransition::PairAlreadyActive => Err(RetentionError::AlreadyExcluded),
    }
}

pub fn build_compliance_report(
    sites: &[SiteCollection],
    active_exclusions: Vec<RetentionExclusion>,
) -> ComplianceReport {
    let mut by_site: HashMap<Uuid, Vec<ExcludedPolicy>> = HashMap::new();
    for exclusion in active_exclusions {
        by_site.entry(exclusion.site_id).or_default().push(ExcludedPolicy {
            policy_id: exclusion.policy_id,
            reason: exclusion.reason,
            added_date: exclusion.added_date,
        });
    }

    let statuses: Vec<SiteComplianceStatus> = sites
        .iter()
        .filter(|s| !s.is_deleted)
        .map(|site| {
            let excluded_policies = by_site.remove(&site.id).unwrap_or_default();
            SiteComplianceStatus {
                site_id: site.id,
                site_url: site.url.clone(),
                site_title: site.title.clone(),
                exclusion_count: excluded_policies.len(),
                status: if excluded_policies.is_empty() {
                    ComplianceState::Compliant
                } else {
                    ComplianceState::NonCompliant
                },
                excluded_policies,
            }
        })
        .collect();

    let non_compliant_sites = statuses
        .iter()
        .filter(|s| s.status == ComplianceState::NonCompliant)
        .count();

    ComplianceReport {
        total_sites: statuses.len(),
        compliant_sites: statuses.len() - non_compliant_sites,
        non_compliant_sites,
        sites: statuses,
    }
}
