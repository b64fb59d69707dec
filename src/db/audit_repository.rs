//! Audit log repository

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{contains_pattern, format_timestamp, parse_db_timestamp, parse_db_uuid};
use crate::models::{AuditLog, AuditLogQuery, ComplianceSummary};

/// Window used when a query names neither date bound
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    content_id: String,
    creation_time: String,
    operation: String,
    workload: String,
    user_id: String,
    client_ip: Option<String>,
    audit_data: String,
    created_at: String,
}

pub struct AuditLogRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditLogRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<AuditLog>> {
        let row = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, content_id, creation_time, operation, workload, user_id, client_ip, audit_data, created_at
            FROM audit_logs
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get audit log")?;

        Ok(row.map(row_to_audit))
    }

    pub async fn create(&self, log: &AuditLog) -> Result<AuditLog> {
        insert_query(log)
            .execute(self.pool)
            .await
            .context("Failed to insert audit log")?;

        Ok(log.clone())
    }

    /// Insert a batch in one transaction; either every record lands or none
    pub async fn bulk_insert(&self, logs: &[AuditLog]) -> Result<u64> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut inserted = 0;

        for log in logs {
            inserted += insert_query(log)
                .execute(&mut *tx)
                .await
                .context("Failed to insert audit log batch")?
                .rows_affected();
        }

        tx.commit().await.context("Failed to commit audit log batch")?;
        Ok(inserted)
    }

    /// Newest first
    pub async fn list(&self, query: &AuditLogQuery) -> Result<Vec<AuditLog>> {
        let (where_clause, binds) = build_filter(query, Utc::now());
        let sql = format!(
            "SELECT id, content_id, creation_time, operation, workload, user_id, client_ip, audit_data, created_at \
             FROM audit_logs{} ORDER BY creation_time DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut q = sqlx::query_as::<_, AuditRow>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        let rows = q
            .bind(query.limit)
            .bind(query.skip)
            .fetch_all(self.pool)
            .await
            .context("Failed to list audit logs")?;

        Ok(rows.into_iter().map(row_to_audit).collect())
    }

    pub async fn count(&self, query: &AuditLogQuery) -> Result<i64> {
        let (where_clause, binds) = build_filter(query, Utc::now());
        let sql = format!("SELECT COUNT(*) FROM audit_logs{}", where_clause);

        let mut q = sqlx::query_as::<_, (i64,)>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        let row = q
            .fetch_one(self.pool)
            .await
            .context("Failed to count audit logs")?;

        Ok(row.0)
    }

    /// Totals over records whose operation is in `operations`
    pub async fn operation_summary(
        &self,
        operations: &[&str],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ComplianceSummary> {
        let sql = format!(
            "SELECT COUNT(*), COUNT(DISTINCT NULLIF(user_id, '')), \
                    COUNT(DISTINCT json_extract(audit_data, '$.SiteUrl')) \
             FROM audit_logs WHERE {}",
            operations_filter(operations.len())
        );

        let mut q = sqlx::query_as::<_, (i64, i64, i64)>(&sql)
            .bind(format_timestamp(start))
            .bind(format_timestamp(end));
        for operation in operations {
            q = q.bind(*operation);
        }
        let row = q
            .fetch_one(self.pool)
            .await
            .context("Failed to summarize audit operations")?;

        Ok(ComplianceSummary {
            total_events: row.0,
            unique_users: row.1,
            unique_sites: row.2,
        })
    }

    /// Newest records whose operation is in `operations`
    pub async fn list_operations(
        &self,
        operations: &[&str],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AuditLog>> {
        let sql = format!(
            "SELECT id, content_id, creation_time, operation, workload, user_id, client_ip, audit_data, created_at \
             FROM audit_logs WHERE {} ORDER BY creation_time DESC LIMIT ?",
            operations_filter(operations.len())
        );

        let mut q = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(format_timestamp(start))
            .bind(format_timestamp(end));
        for operation in operations {
            q = q.bind(*operation);
        }
        let rows = q
            .bind(limit)
            .fetch_all(self.pool)
            .await
            .context("Failed to list audit operations")?;

        Ok(rows.into_iter().map(row_to_audit).collect())
    }

    /// Purge records created before the cutoff
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM audit_logs WHERE creation_time < ?")
            .bind(format_timestamp(cutoff))
            .execute(self.pool)
            .await
            .context("Failed to purge audit logs")?;

        Ok(result.rows_affected())
    }
}

fn insert_query(log: &AuditLog) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, content_id, creation_time, operation, workload, user_id, client_ip, audit_data, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(log.id.to_string())
    .bind(log.content_id.to_string())
    .bind(format_timestamp(log.creation_time))
    .bind(&log.operation)
    .bind(&log.workload)
    .bind(&log.user_id)
    .bind(&log.client_ip)
    .bind(log.audit_data.to_string())
    .bind(format_timestamp(log.created_at))
}

/// Period bounds followed by an `IN` list with one placeholder per operation
fn operations_filter(operations: usize) -> String {
    let placeholders = vec!["?"; operations.max(1)].join(", ");
    format!(
        "creation_time >= ? AND creation_time <= ? AND operation IN ({})",
        placeholders
    )
}

fn build_filter(query: &AuditLogQuery, now: DateTime<Utc>) -> (String, Vec<String>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut binds = Vec::new();

    let (start, end) = match (query.start_date, query.end_date) {
        (None, None) => (Some(now - Duration::days(DEFAULT_WINDOW_DAYS)), None),
        bounds => bounds,
    };
    if let Some(start) = start {
        conditions.push("creation_time >= ?");
        binds.push(format_timestamp(start));
    }
    if let Some(end) = end {
        conditions.push("creation_time <= ?");
        binds.push(format_timestamp(end));
    }
    if let Some(ref operation) = query.operation {
        conditions.push("operation = ?");
        binds.push(operation.clone());
    }
    if let Some(ref workload) = query.workload {
        conditions.push("workload = ?");
        binds.push(workload.clone());
    }
    if let Some(ref user_id) = query.user_id {
        conditions.push("user_id LIKE ? ESCAPE '\\'");
        binds.push(contains_pattern(user_id));
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), binds)
    }
}

fn row_to_audit(row: AuditRow) -> AuditLog {
    AuditLog {
        id: parse_db_uuid(&row.id),
        content_id: parse_db_uuid(&row.content_id),
        creation_time: parse_db_timestamp(&row.creation_time),
        operation: row.operation,
        workload: row.workload,
        user_id: row.user_id,
        client_ip: row.client_ip,
        audit_data: serde_json::from_str(&row.audit_data).unwrap_or_else(|_| serde_json::json!({})),
        created_at: parse_db_timestamp(&row.created_at),
    }
}
