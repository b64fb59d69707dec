//! Retention policy and exclusion repository

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_timestamp, now_timestamp, parse_db_timestamp, parse_db_uuid, parse_optional_timestamp};
use crate::models::{
    CreateRetentionPolicyRequest, ExclusionQuery, ExclusionStatus, RetentionExclusion,
    RetentionPolicy,
};

#[derive(Debug, sqlx::FromRow)]
struct PolicyRow {
    id: String,
    name: String,
    description: Option<String>,
    retention_period_days: Option<i64>,
    scope: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ExclusionRow {
    id: String,
    site_id: String,
    policy_id: String,
    requested_by: String,
    reason: String,
    status: String,
    added_date: String,
    approved_by: Option<String>,
    approval_comments: Option<String>,
    removed_date: Option<String>,
    removed_by: Option<String>,
}

const EXCLUSION_COLUMNS: &str = "id, site_id, policy_id, requested_by, reason, status, added_date, \
    approved_by, approval_comments, removed_date, removed_by";

pub struct RetentionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RetentionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_active_policies(&self) -> Result<Vec<RetentionPolicy>> {
        let rows = sqlx::query_as::<_, PolicyRow>(
            r#"
            SELECT id, name, description, retention_period_days, scope, is_active, created_at, updated_at
            FROM retention_policies
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list retention policies")?;

        Ok(rows.into_iter().map(row_to_policy).collect())
    }

    pub async fn get_policy(&self, id: Uuid) -> Result<Option<RetentionPolicy>> {
        let row = sqlx::query_as::<_, PolicyRow>(
            r#"
            SELECT id, name, description, retention_period_days, scope, is_active, created_at, updated_at
            FROM retention_policies
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get retention policy")?;

        Ok(row.map(row_to_policy))
    }

    pub async fn create_policy(&self, req: &CreateRetentionPolicyRequest) -> Result<RetentionPolicy> {
        let id = Uuid::new_v4();
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO retention_policies (id, name, description, retention_period_days, scope, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.retention_period_days)
        .bind(&req.scope)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .context("Failed to create retention policy")?;

        self.get_policy(id)
            .await?
            .context("Failed to retrieve created retention policy")
    }

    pub async fn get_exclusion(&self, id: Uuid) -> Result<Option<RetentionExclusion>> {
        let sql = format!("SELECT {} FROM retention_exclusions WHERE id = ?", EXCLUSION_COLUMNS);
        let row = sqlx::query_as::<_, ExclusionRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await
            .context("Failed to get retention exclusion")?;

        Ok(row.map(row_to_exclusion))
    }

    pub async fn list_exclusions(&self, query: &ExclusionQuery) -> Result<Vec<RetentionExclusion>> {
        let mut sql = format!("SELECT {} FROM retention_exclusions WHERE 1 = 1", EXCLUSION_COLUMNS);
        if query.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if query.site_id.is_some() {
            sql.push_str(" AND site_id = ?");
        }
        sql.push_str(" ORDER BY added_date DESC");

        let mut q = sqlx::query_as::<_, ExclusionRow>(&sql);
        if let Some(status) = query.status {
            q = q.bind(status.as_str());
        }
        if let Some(site_id) = query.site_id {
            q = q.bind(site_id.to_string());
        }

        let rows = q
            .fetch_all(self.pool)
            .await
            .context("Failed to list retention exclusions")?;

        Ok(rows.into_iter().map(row_to_exclusion).collect())
    }

    /// Whether an active exclusion already covers this site and policy
    pub async fn has_active_exclusion(&self, site_id: Uuid, policy_id: Uuid) -> Result<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM retention_exclusions WHERE site_id = ? AND policy_id = ? AND status = 'active'",
        )
        .bind(site_id.to_string())
        .bind(policy_id.to_string())
        .fetch_one(self.pool)
        .await
        .context("Failed to check existing exclusions")?;

        Ok(row.0 > 0)
    }

    /// Record a new request in `pending_approval`
    pub async fn create_exclusion(
        &self,
        site_id: Uuid,
        policy_id: Uuid,
        requested_by: &str,
        reason: &str,
    ) -> Result<RetentionExclusion> {
        let exclusion = RetentionExclusion {
            id: Uuid::new_v4(),
            site_id,
            policy_id,
            requested_by: requested_by.to_string(),
            reason: reason.to_string(),
            status: ExclusionStatus::PendingApproval,
            added_date: Utc::now(),
            approved_by: None,
            approval_comments: None,
            removed_date: None,
            removed_by: None,
        };

        sqlx::query(
            r#"
            INSERT INTO retention_exclusions (id, site_id, policy_id, requested_by, reason, status, added_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(exclusion.id.to_string())
        .bind(site_id.to_string())
        .bind(policy_id.to_string())
        .bind(requested_by)
        .bind(reason)
        .bind(exclusion.status.as_str())
        .bind(format_timestamp(exclusion.added_date))
        .execute(self.pool)
        .await
        .context("Failed to create retention exclusion")?;

        Ok(exclusion)
    }

    /// Activate a pending request unless the pair already has an active exclusion
    pub async fn approve_exclusion(
        &self,
        id: Uuid,
        approved_by: &str,
        comments: Option<&str>,
    ) -> Result<ExclusionTransition> {
        let result = sqlx::query(
            r#"
            UPDATE retention_exclusions
            SET status = 'active', approved_by = ?, approval_comments = ?, added_date = ?
            WHERE id = ?
              AND status = 'pending_approval'
              AND NOT EXISTS (
                  SELECT 1 FROM retention_exclusions other
                  WHERE other.site_id = retention_exclusions.site_id
                    AND other.policy_id = retention_exclusions.policy_id
                    AND other.status = 'active'
              )
            "#,
        )
        .bind(approved_by)
        .bind(comments)
        .bind(now_timestamp())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to approve retention exclusion")?;

        self.transition_outcome(id, result.rows_affected(), ExclusionStatus::PendingApproval)
            .await
    }

    /// Withdraw a pending or active exclusion
    pub async fn remove_exclusion(&self, id: Uuid, removed_by: &str) -> Result<ExclusionTransition> {
        let result = sqlx::query(
            r#"
            UPDATE retention_exclusions
            SET status = 'removed', removed_date = ?, removed_by = ?
            WHERE id = ? AND status <> 'removed'
            "#,
        )
        .bind(now_timestamp())
        .bind(removed_by)
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to remove retention exclusion")?;

        self.transition_outcome(id, result.rows_affected(), ExclusionStatus::Active)
            .await
    }

    /// Classify a guarded UPDATE. `expected` is a status the update accepts,
    /// so a row still in it was blocked by another active exclusion.
    async fn transition_outcome(
        &self,
        id: Uuid,
        rows_affected: u64,
        expected: ExclusionStatus,
    ) -> Result<ExclusionTransition> {
        let current = self.get_exclusion(id).await?;
        Ok(match current {
            None => ExclusionTransition::NotFound,
            Some(exclusion) if rows_affected > 0 => ExclusionTransition::Applied(exclusion),
            Some(exclusion) if exclusion.status == expected => ExclusionTransition::PairAlreadyActive,
            Some(exclusion) => ExclusionTransition::InvalidState(exclusion.status),
        })
    }
}

/// Result of a status change on an exclusion
#[derive(Debug)]
pub enum ExclusionTransition {
    Applied(RetentionExclusion),
    NotFound,
    /// The exclusion is in a status the change does not accept
    InvalidState(ExclusionStatus),
    /// Another exclusion for the same site and policy is already active
    PairAlreadyActive,
}

fn row_to_policy(row: PolicyRow) -> RetentionPolicy {
    RetentionPolicy {
        id: parse_db_uuid(&row.id),
        name: row.name,
        description: row.description,
        retention_period_days: row.retention_period_days,
        scope: row.scope,
        is_active: row.is_active,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}

fn row_to_exclusion(row: ExclusionRow) -> RetentionExclusion {
    RetentionExclusion {
        id: parse_db_uuid(&row.id),
        site_id: parse_db_uuid(&row.site_id),
        policy_id: parse_db_uuid(&row.policy_id),
        requested_by: row.requested_by,
        reason: row.reason,
        status: row.status.parse().unwrap_or_default(),
        added_date: parse_db_timestamp(&row.added_date),
        approved_by: row.approved_by,
        approval_comments: row.approval_comments,
        removed_date: parse_optional_timestamp(row.removed_date),
        removed_by: row.removed_by,
    }
}
