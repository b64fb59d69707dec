//! Administrative action log repository

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_timestamp, parse_db_timestamp, parse_db_uuid};
use crate::models::{ActionStatus, AdminActionLog, AdminActionQuery, NewAdminAction};

#[derive(Debug, sqlx::FromRow)]
struct ActionRow {
    id: String,
    user_id: Option<String>,
    username: Option<String>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    details: Option<String>,
    status: String,
    ip_address: Option<String>,
    created_at: String,
}

pub struct AdminActionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AdminActionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, action: NewAdminAction) -> Result<AdminActionLog> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let details_str = action.details.as_ref().map(|d| d.to_string());

        sqlx::query(
            r#"
            INSERT INTO admin_action_logs (id, user_id, username, action, resource_type, resource_id, details, status, ip_address, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(action.user_id.map(|u| u.to_string()))
        .bind(&action.username)
        .bind(&action.action)
        .bind(&action.resource_type)
        .bind(&action.resource_id)
        .bind(details_str.as_deref())
        .bind(action.status.as_str())
        .bind(&action.ip_address)
        .bind(format_timestamp(created_at))
        .execute(self.pool)
        .await
        .context("Failed to insert admin action log entry")?;

        Ok(AdminActionLog {
            id,
            user_id: action.user_id,
            username: action.username,
            action: action.action,
            resource_type: action.resource_type,
            resource_id: action.resource_id,
            details: action.details,
            status: action.status,
            ip_address: action.ip_address,
            created_at,
        })
    }

    pub async fn list(&self, query: &AdminActionQuery) -> Result<Vec<AdminActionLog>> {
        let (where_clause, binds) = build_filter(query);
        let sql = format!(
            "SELECT id, user_id, username, action, resource_type, resource_id, details, status, ip_address, created_at \
             FROM admin_action_logs{} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut q = sqlx::query_as::<_, ActionRow>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        let rows = q
            .bind(query.limit)
            .bind(query.skip)
            .fetch_all(self.pool)
            .await
            .context("Failed to list admin actions")?;

        Ok(rows.into_iter().map(row_to_action).collect())
    }

    pub async fn count(&self, query: &AdminActionQuery) -> Result<i64> {
        let (where_clause, binds) = build_filter(query);
        let sql = format!("SELECT COUNT(*) FROM admin_action_logs{}", where_clause);

        let mut q = sqlx::query_as::<_, (i64,)>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        let row = q
            .fetch_one(self.pool)
            .await
            .context("Failed to count admin actions")?;

        Ok(row.0)
    }
}

fn build_filter(query: &AdminActionQuery) -> (String, Vec<String>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut binds = Vec::new();

    if let Some(user_id) = query.user_id {
        conditions.push("user_id = ?");
        binds.push(user_id.to_string());
    }
    if let Some(ref action) = query.action {
        conditions.push("action = ?");
        binds.push(action.clone());
    }
    if let Some(ref resource_type) = query.resource_type {
        conditions.push("resource_type = ?");
        binds.push(resource_type.clone());
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), binds)
    }
}

fn row_to_action(row: ActionRow) -> AdminActionLog {
    AdminActionLog {
        id: parse_db_uuid(&row.id),
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        username: row.username,
        action: row.action,
        resource_type: row.resource_type,
        resource_id: row.resource_id,
        details: row.details.and_then(|s| serde_json::from_str(&s).ok()),
        status: if row.status == "failed" {
            ActionStatus::Failed
        } else {
            ActionStatus::Success
        },
        ip_address: row.ip_address,
        created_at: parse_db_timestamp(&row.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    #[tokio::test]
    async fn test_insert_and_filter() {
        let pool = test_pool().await;
        let repo = AdminActionRepository::new(&pool);
        let admin = Uuid::new_v4();

        repo.insert(
            NewAdminAction::new("site_created", "site")
                .by(admin, "admin")
                .details(serde_json::json!({"url": "https://contoso.sharepoint.com/sites/a"})),
        )
        .await
        .unwrap();
        repo.insert(NewAdminAction::new("login_failed", "user").failed())
            .await
            .unwrap();

        let all = AdminActionQuery {
            user_id: None,
            action: None,
            resource_type: None,
            skip: 0,
            limit: 100,
        };
        assert_eq!(repo.count(&all).await.unwrap(), 2);

        let by_user = AdminActionQuery {
            user_id: Some(admin),
            ..all.clone()
        };
        let actions = repo.list(&by_user).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].details.as_ref().unwrap()["url"], "https://contoso.sharepoint.com/sites/a");

        let failed = AdminActionQuery {
            action: Some("login_failed".to_string()),
            ..all
        };
        assert_eq!(repo.list(&failed).await.unwrap()[0].status, ActionStatus::Failed);
    }
}
