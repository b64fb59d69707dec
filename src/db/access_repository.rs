//! Site ownership and access matrix repositories

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_timestamp, parse_db_timestamp, parse_db_uuid, parse_optional_timestamp};
use crate::models::{AccessEntry, AddSiteOwnerRequest, GrantAccessRequest, SiteOwner};

#[derive(Debug, sqlx::FromRow)]
struct OwnerRow {
    id: String,
    site_id: String,
    user_id: Option<String>,
    user_email: String,
    ownership_type: String,
    is_primary_owner: bool,
    assigned_date: String,
}

pub struct SiteOwnerRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SiteOwnerRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_for_site(&self, site_id: Uuid) -> Result<Vec<SiteOwner>> {
        let rows = sqlx::query_as::<_, OwnerRow>(
            r#"
            SELECT id, site_id, user_id, user_email, ownership_type, is_primary_owner, assigned_date
            FROM site_owners
            WHERE site_id = ?
            ORDER BY is_primary_owner DESC, assigned_date
            "#,
        )
        .bind(site_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list site owners")?;

        Ok(rows.into_iter().map(row_to_owner).collect())
    }

    /// Whether the user is listed as an owner of the site
    pub async fn is_owner(&self, site_id: Uuid, user_id: Uuid) -> Result<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM site_owners WHERE site_id = ? AND user_id = ?",
        )
        .bind(site_id.to_string())
        .bind(user_id.to_string())
        .fetch_one(self.pool)
        .await
        .context("Failed to check site ownership")?;

        Ok(row.0 > 0)
    }

    pub async fn add(&self, site_id: Uuid, req: &AddSiteOwnerRequest) -> Result<SiteOwner> {
        let owner = SiteOwner {
            id: Uuid::new_v4(),
            site_id,
            user_id: req.user_id,
            user_email: req.user_email.clone(),
            ownership_type: req.ownership_type,
            is_primary_owner: req.is_primary_owner,
            assigned_date: Utc::now(),
        };

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // A site has at most one primary owner
        if owner.is_primary_owner {
            sqlx::query("UPDATE site_owners SET is_primary_owner = 0 WHERE site_id = ?")
                .bind(site_id.to_string())
                .execute(&mut *tx)
                .await
                .context("Failed to demote previous primary owner")?;
        }

        sqlx::query(
            r#"
            INSERT INTO site_owners (id, site_id, user_id, user_email, ownership_type, is_primary_owner, assigned_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner.id.to_string())
        .bind(site_id.to_string())
        .bind(owner.user_id.map(|u| u.to_string()))
        .bind(&owner.user_email)
        .bind(owner.ownership_type.as_str())
        .bind(owner.is_primary_owner)
        .bind(format_timestamp(owner.assigned_date))
        .execute(&mut *tx)
        .await
        .context("Failed to add site owner")?;

        tx.commit().await.context("Failed to commit site owner")?;

        Ok(owner)
    }
}

fn row_to_owner(row: OwnerRow) -> SiteOwner {
    SiteOwner {
        id: parse_db_uuid(&row.id),
        site_id: parse_db_uuid(&row.site_id),
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        user_email: row.user_email,
        ownership_type: row.ownership_type.parse().unwrap_or_default(),
        is_primary_owner: row.is_primary_owner,
        assigned_date: parse_db_timestamp(&row.assigned_date),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccessRow {
    id: String,
    site_id: String,
    user_id: Option<String>,
    user_email: Option<String>,
    permission_level: String,
    assignment_type: String,
    group_name: Option<String>,
    is_external_user: bool,
    external_user_email: Option<String>,
    expiry_date: Option<String>,
    assigned_date: String,
    last_access: Option<String>,
}

pub struct AccessRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccessRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_for_site(&self, site_id: Uuid) -> Result<Vec<AccessEntry>> {
        let rows = sqlx::query_as::<_, AccessRow>(
            r#"
            SELECT id, site_id, user_id, user_email, permission_level, assignment_type, group_name,
                   is_external_user, external_user_email, expiry_date, assigned_date, last_access
            FROM site_access_entries
            WHERE site_id = ?
            ORDER BY assigned_date
            "#,
        )
        .bind(site_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list site access")?;

        Ok(rows.into_iter().map(row_to_access).collect())
    }

    pub async fn grant(&self, site_id: Uuid, req: &GrantAccessRequest) -> Result<AccessEntry> {
        let entry = AccessEntry {
            id: Uuid::new_v4(),
            site_id,
            user_id: req.user_id,
            user_email: req.user_email.clone(),
            permission_level: req.permission_level.clone(),
            assignment_type: req.assignment_type,
            group_name: req.group_name.clone(),
            is_external_user: req.is_external_user,
            external_user_email: req.external_user_email.clone(),
            expiry_date: req.expiry_date,
            assigned_date: Utc::now(),
            last_access: None,
        };

        sqlx::query(
            r#"
            INSERT INTO site_access_entries (
                id, site_id, user_id, user_email, permission_level, assignment_type, group_name,
                is_external_user, external_user_email, expiry_date, assigned_date, last_access
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(site_id.to_string())
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(&entry.user_email)
        .bind(&entry.permission_level)
        .bind(entry.assignment_type.as_str())
        .bind(&entry.group_name)
        .bind(entry.is_external_user)
        .bind(&entry.external_user_email)
        .bind(entry.expiry_date.map(format_timestamp))
        .bind(format_timestamp(entry.assigned_date))
        .execute(self.pool)
        .await
        .context("Failed to grant site access")?;

        Ok(entry)
    }
}

fn row_to_access(row: AccessRow) -> AccessEntry {
    AccessEntry {
        id: parse_db_uuid(&row.id),
        site_id: parse_db_uuid(&row.site_id),
        user_id: row.user_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
        user_email: row.user_email,
        permission_level: row.permission_level,
        assignment_type: row.assignment_type.parse().unwrap_or_default(),
        group_name: row.group_name,
        is_external_user: row.is_external_user,
        external_user_email: row.external_user_email,
        expiry_date: parse_optional_timestamp(row.expiry_date),
        assigned_date: parse_db_timestamp(&row.assigned_date),
        last_access: parse_optional_timestamp(row.last_access),
    }
}
