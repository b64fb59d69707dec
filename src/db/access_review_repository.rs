//! Access review cycle and item repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_timestamp, now_timestamp, parse_db_timestamp, parse_db_uuid, parse_optional_timestamp};
use crate::models::{
    AccessDecision, AccessReviewCycle, AccessReviewItem, AccessReviewSummary, ReviewCounts,
    ReviewItemCounts, ReviewQuery, ReviewStatus,
};

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: String,
    site_id: String,
    cycle_number: i64,
    start_date: String,
    due_date: String,
    status: String,
    assigned_to: String,
    certified_date: Option<String>,
    certified_by: Option<String>,
    comments: Option<String>,
    site_title: String,
    site_url: String,
    assigned_to_email: Option<String>,
    total_items: i64,
    pending_items: i64,
    approved_items: i64,
    revoked_items: i64,
    flagged_items: i64,
}

const SUMMARY_SELECT: &str = r#"
    SELECT c.id, c.site_id, c.cycle_number, c.start_date, c.due_date, c.status, c.assigned_to,
           c.certified_date, c.certified_by, c.comments,
           s.title AS site_title, s.url AS site_url, u.email AS assigned_to_email,
           (SELECT COUNT(*) FROM access_review_items i WHERE i.cycle_id = c.id) AS total_items,
           (SELECT COUNT(*) FROM access_review_items i
             WHERE i.cycle_id = c.id AND i.decision = 'pending') AS pending_items,
           (SELECT COUNT(*) FROM access_review_items i
             WHERE i.cycle_id = c.id AND i.decision = 'approved') AS approved_items,
           (SELECT COUNT(*) FROM access_review_items i
             WHERE i.cycle_id = c.id AND i.decision = 'revoke') AS revoked_items,
           (SELECT COUNT(*) FROM access_review_items i
             WHERE i.cycle_id = c.id AND i.decision = 'needs_investigation') AS flagged_items
    FROM access_review_cycles c
    JOIN site_collections s ON s.id = c.site_id
    LEFT JOIN users u ON u.id = c.assigned_to
"#;

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    cycle_id: String,
    user_id: Option<String>,
    user_email: String,
    permission_level: String,
    assignment_type: String,
    last_access_date: Option<String>,
    decision: String,
    reviewer_comments: Option<String>,
    decided_at: Option<String>,
    removal_requested: bool,
}

const ITEM_COLUMNS: &str = "id, cycle_id, user_id, user_email, permission_level, assignment_type, \
    last_access_date, decision, reviewer_comments, decided_at, removal_requested";

/// Access entry as it is copied into a new cycle
#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    user_id: Option<String>,
    user_email: String,
    permission_level: String,
    assignment_type: String,
    last_access: Option<String>,
}

/// A live site and the local account of its primary owner, if any
#[derive(Debug, Clone)]
pub struct ReviewCandidate {
    pub site_id: Uuid,
    pub site_url: String,
    pub reviewer: Option<Uuid>,
}

/// Result of a guarded change to a cycle or one of its items
#[derive(Debug)]
pub enum ReviewUpdate<T> {
    Applied(T),
    NotFound,
    /// The cycle is already certified
    Completed,
    /// Items still waiting for a decision
    PendingItems(i64),
}

pub struct AccessReviewRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccessReviewRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_summary(&self, id: Uuid) -> Result<Option<AccessReviewSummary>> {
        let sql = format!("{} WHERE c.id = ?", SUMMARY_SELECT);
        let row = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await
            .context("Failed to get access review")?;

        Ok(row.map(|r| row_to_summary(r, Utc::now())))
    }

    /// Soonest due first
    pub async fn list_summaries(&self, query: &ReviewQuery) -> Result<Vec<AccessReviewSummary>> {
        let (where_clause, binds) = build_filter(query);
        let sql = format!(
            "{}{} ORDER BY c.due_date ASC, s.url ASC LIMIT ? OFFSET ?",
            SUMMARY_SELECT, where_clause
        );

        let mut q = sqlx::query_as::<_, SummaryRow>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        let rows = q
            .bind(query.limit)
            .bind(query.skip)
            .fetch_all(self.pool)
            .await
            .context("Failed to list access reviews")?;

        let now = Utc::now();
        Ok(rows.into_iter().map(|r| row_to_summary(r, now)).collect())
    }

    pub async fn count(&self, query: &ReviewQuery) -> Result<i64> {
        let (where_clause, binds) = build_filter(query);
        let sql = format!("SELECT COUNT(*) FROM access_review_cycles c{}", where_clause);

        let mut q = sqlx::query_as::<_, (i64,)>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        let row = q
            .fetch_one(self.pool)
            .await
            .context("Failed to count access reviews")?;

        Ok(row.0)
    }

    pub async fn list_items(&self, cycle_id: Uuid) -> Result<Vec<AccessReviewItem>> {
        let sql = format!(
            "SELECT {} FROM access_review_items WHERE cycle_id = ? ORDER BY user_email, permission_level",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(cycle_id.to_string())
            .fetch_all(self.pool)
            .await
            .context("Failed to list access review items")?;

        Ok(rows.into_iter().map(row_to_item).collect())
    }

    async fn get_item(&self, cycle_id: Uuid, item_id: Uuid) -> Result<Option<AccessReviewItem>> {
        let sql = format!(
            "SELECT {} FROM access_review_items WHERE id = ? AND cycle_id = ?",
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item_id.to_string())
            .bind(cycle_id.to_string())
            .fetch_optional(self.pool)
            .await
            .context("Failed to get access review item")?;

        Ok(row.map(row_to_item))
    }

    async fn status_of(&self, cycle_id: Uuid) -> Result<Option<ReviewStatus>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT status FROM access_review_cycles WHERE id = ?")
                .bind(cycle_id.to_string())
                .fetch_optional(self.pool)
                .await
                .context("Failed to read access review status")?;

        Ok(row.and_then(|(s,)| s.parse().ok()))
    }

    /// Live sites with the account of their primary owner
    pub async fn candidates(&self) -> Result<Vec<ReviewCandidate>> {
        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT s.id, s.url,
                   (SELECT o.user_id FROM site_owners o
                     WHERE o.site_id = s.id AND o.is_primary_owner = 1 AND o.user_id IS NOT NULL
                     LIMIT 1)
            FROM site_collections s
            WHERE s.is_deleted = 0
            ORDER BY s.url
            "#,
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list access review candidates")?;

        Ok(rows
            .into_iter()
            .map(|(site_id, site_url, reviewer)| ReviewCandidate {
                site_id: parse_db_uuid(&site_id),
                site_url,
                reviewer: reviewer.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
            })
            .collect())
    }

    /// Open a cycle with a snapshot of the site's access matrix.
    /// Returns `None` when the site already has a cycle with this number.
    pub async fn open_cycle(
        &self,
        site_id: Uuid,
        cycle_number: i64,
        reviewer: Uuid,
        start: DateTime<Utc>,
        due: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO access_review_cycles (id, site_id, cycle_number, start_date, due_date, status, assigned_to)
            VALUES (?, ?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(id.to_string())
        .bind(site_id.to_string())
        .bind(cycle_number)
        .bind(format_timestamp(start))
        .bind(format_timestamp(due))
        .bind(reviewer.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to open access review cycle")?
        .rows_affected();

        if inserted == 0 {
            return Ok(None);
        }

        let snapshot = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT a.user_id,
                   COALESCE(
                       CASE WHEN a.is_external_user = 1 THEN a.external_user_email END,
                       a.user_email, u.email, a.group_name, ''
                   ) AS user_email,
                   a.permission_level, a.assignment_type, a.last_access
            FROM site_access_entries a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.site_id = ?
            "#,
        )
        .bind(site_id.to_string())
        .fetch_all(&mut *tx)
        .await
        .context("Failed to read access matrix for review")?;

        for entry in snapshot {
            sqlx::query(
                r#"
                INSERT INTO access_review_items (
                    id, cycle_id, user_id, user_email, permission_level, assignment_type, last_access_date
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(id.to_string())
            .bind(entry.user_id)
            .bind(entry.user_email)
            .bind(entry.permission_level)
            .bind(entry.assignment_type)
            .bind(entry.last_access)
            .execute(&mut *tx)
            .await
            .context("Failed to add access review item")?;
        }

        tx.commit().await.context("Failed to commit access review cycle")?;
        Ok(Some(id))
    }

    /// Flag open cycles whose due date has passed
    pub async fn mark_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE access_review_cycles SET status = 'overdue' \
             WHERE status IN ('pending', 'in_progress') AND due_date < ?",
        )
        .bind(format_timestamp(now))
        .execute(self.pool)
        .await
        .context("Failed to mark overdue access reviews")?;

        Ok(result.rows_affected())
    }

    /// Record a decision on an item of an uncertified cycle; a pending cycle
    /// moves to in progress with its first decision.
    pub async fn record_decision(
        &self,
        cycle_id: Uuid,
        item_id: Uuid,
        decision: AccessDecision,
        comments: Option<&str>,
    ) -> Result<ReviewUpdate<AccessReviewItem>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let updated = sqlx::query(
            r#"
            UPDATE access_review_items
            SET decision = ?1, reviewer_comments = ?2, decided_at = ?3, removal_requested = ?4
            WHERE id = ?5 AND cycle_id = ?6
              AND EXISTS (
                  SELECT 1 FROM access_review_cycles c
                  WHERE c.id = ?6 AND c.status <> 'completed'
              )
            "#,
        )
        .bind(decision.as_str())
        .bind(comments)
        .bind(now_timestamp())
        .bind(decision == AccessDecision::Revoke)
        .bind(item_id.to_string())
        .bind(cycle_id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to record access review decision")?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.context("Failed to roll back decision")?;
            return Ok(match self.status_of(cycle_id).await? {
                Some(ReviewStatus::Completed) => ReviewUpdate::Completed,
                _ => ReviewUpdate::NotFound,
            });
        }

        sqlx::query(
            "UPDATE access_review_cycles SET status = 'in_progress' WHERE id = ? AND status = 'pending'",
        )
        .bind(cycle_id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to start access review")?;

        tx.commit().await.context("Failed to commit access review decision")?;

        Ok(match self.get_item(cycle_id, item_id).await? {
            Some(item) => ReviewUpdate::Applied(item),
            None => ReviewUpdate::NotFound,
        })
    }

    /// Complete a cycle whose items all carry a decision and stamp the site as reviewed
    pub async fn certify(
        &self,
        cycle_id: Uuid,
        certified_by: &str,
        comments: Option<&str>,
    ) -> Result<ReviewUpdate<AccessReviewSummary>> {
        let now = now_timestamp();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let updated = sqlx::query(
            r#"
            UPDATE access_review_cycles
            SET status = 'completed', certified_date = ?1, certified_by = ?2, comments = ?3
            WHERE id = ?4 AND status <> 'completed'
              AND NOT EXISTS (
                  SELECT 1 FROM access_review_items i
                  WHERE i.cycle_id = ?4 AND i.decision = 'pending'
              )
            "#,
        )
        .bind(&now)
        .bind(certified_by)
        .bind(comments)
        .bind(cycle_id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to certify access review")?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.context("Failed to roll back certification")?;
            return Ok(match self.status_of(cycle_id).await? {
                None => ReviewUpdate::NotFound,
                Some(ReviewStatus::Completed) => ReviewUpdate::Completed,
                Some(_) => ReviewUpdate::PendingItems(self.pending_items(cycle_id).await?),
            });
        }

        sqlx::query(
            r#"
            UPDATE site_collections SET last_reviewed = ?1, updated_at = ?1
            WHERE id = (SELECT site_id FROM access_review_cycles WHERE id = ?2)
            "#,
        )
        .bind(&now)
        .bind(cycle_id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to mark site as reviewed")?;

        tx.commit().await.context("Failed to commit certification")?;

        Ok(match self.get_summary(cycle_id).await? {
            Some(summary) => ReviewUpdate::Applied(summary),
            None => ReviewUpdate::NotFound,
        })
    }

    async fn pending_items(&self, cycle_id: Uuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM access_review_items WHERE cycle_id = ? AND decision = 'pending'",
        )
        .bind(cycle_id.to_string())
        .fetch_one(self.pool)
        .await
        .context("Failed to count pending review items")?;

        Ok(row.0)
    }

    /// Cycle tallies, optionally for one assignee
    pub async fn counts(&self, assigned_to: Option<Uuid>, now: DateTime<Utc>) -> Result<ReviewCounts> {
        let row: (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(status <> 'completed'), 0),
                   COALESCE(SUM(status <> 'completed' AND due_date < ?1), 0),
                   COALESCE(SUM(status = 'completed'), 0)
            FROM access_review_cycles
            WHERE ?2 IS NULL OR assigned_to = ?2
            "#,
        )
        .bind(format_timestamp(now))
        .bind(assigned_to.map(|u| u.to_string()))
        .fetch_one(self.pool)
        .await
        .context("Failed to count access reviews")?;

        Ok(ReviewCounts {
            total: row.0,
            open: row.1,
            overdue: row.2,
            completed: row.3,
        })
    }
}

fn build_filter(query: &ReviewQuery) -> (String, Vec<String>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut binds = Vec::new();

    if let Some(status) = query.status {
        conditions.push("c.status = ?");
        binds.push(status.as_str().to_string());
    }
    if query.open_only {
        conditions.push("c.status <> 'completed'");
    }
    if let Some(user_id) = query.assigned_to {
        conditions.push("c.assigned_to = ?");
        binds.push(user_id.to_string());
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), binds)
    }
}

fn row_to_summary(row: SummaryRow, now: DateTime<Utc>) -> AccessReviewSummary {
    let status: ReviewStatus = row.status.parse().unwrap_or_default();
    let due_date = parse_db_timestamp(&row.due_date);

    AccessReviewSummary {
        is_overdue: status.is_open() && due_date < now,
        cycle: AccessReviewCycle {
            id: parse_db_uuid(&row.id),
            site_id: parse_db_uuid(&row.site_id),
            cycle_number: row.cycle_number,
            start_date: parse_db_timestamp(&row.start_date),
            due_date,
            status,
            assigned_to: parse_db_uuid(&row.assigned_to),
            certified_date: parse_optional_timestamp(row.certified_date),
            certified_by: row.certified_by,
            comments: row.comments,
        },
        site_title: row.site_title,
        site_url: row.site_url,
        assigned_to_email: row.assigned_to_email,
        items: ReviewItemCounts {
            total: row.total_items,
            pending: row.pending_items,
            approved: row.approved_items,
            revoked: row.revoked_items,
            needs_investigation: row.flagged_items,
        },
    }
}

fn row_to_item(row: ItemRow) -> AccessReviewItem {
    AccessReviewItem {
        id: parse_db_uuid(&row.id),
        cycle_id: parse_db_uuid(&row.cycle_id),
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        user_email: row.user_email,
        permission_level: row.permission_level,
        assignment_type: row.assignment_type.parse().unwrap_or_default(),
        last_access_date: parse_optional_timestamp(row.last_access_date),
        decision: row.decision.parse().unwrap_or_default(),
        reviewer_comments: row.reviewer_comments,
        decided_at: parse_optional_timestamp(row.decided_at),
        removal_requested: row.removal_requested,
    }
}
