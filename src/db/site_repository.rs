//! Site collection repository

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{
    contains_pattern, format_timestamp, now_timestamp, parse_db_timestamp, parse_db_uuid,
    parse_optional_timestamp,
};
use crate::models::{SiteCollection, SiteInventory, SiteQuery};

const SITE_COLUMNS: &str = "s.id, s.url, s.title, s.template, s.tenant_id, s.storage_used_mb, \
    s.storage_quota_mb, s.is_hub_site, s.sharing_capability, s.last_activity, s.last_classified, \
    s.last_reviewed, s.is_dormant, s.is_deleted, s.created_at, s.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SiteRow {
    id: String,
    url: String,
    title: String,
    template: String,
    tenant_id: String,
    storage_used_mb: i64,
    storage_quota_mb: i64,
    is_hub_site: bool,
    sharing_capability: String,
    last_activity: Option<String>,
    last_classified: Option<String>,
    last_reviewed: Option<String>,
    is_dormant: bool,
    is_deleted: bool,
    created_at: String,
    updated_at: String,
}

/// Bind values collected while building a filtered query
enum Bind {
    Text(String),
    Bool(bool),
}

pub struct SiteRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SiteRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<SiteCollection>> {
        let sql = format!("SELECT {} FROM site_collections s WHERE s.id = ?", SITE_COLUMNS);
        let row = sqlx::query_as::<_, SiteRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await
            .context("Failed to get site collection")?;

        Ok(row.map(row_to_site))
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<SiteCollection>> {
        let sql = format!("SELECT {} FROM site_collections s WHERE s.url = ?", SITE_COLUMNS);
        let row = sqlx::query_as::<_, SiteRow>(&sql)
            .bind(url.trim())
            .fetch_optional(self.pool)
            .await
            .context("Failed to get site collection by URL")?;

        Ok(row.map(row_to_site))
    }

    /// Whether any site already uses this URL
    pub async fn exists(&self, url: &str) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM site_collections WHERE url = ?")
            .bind(url.trim())
            .fetch_one(self.pool)
            .await
            .context("Failed to check site URL")?;

        Ok(row.0 > 0)
    }

    /// Every site, ordered by URL
    pub async fn list_all(&self, include_deleted: bool) -> Result<Vec<SiteCollection>> {
        let mut sql = format!("SELECT {} FROM site_collections s", SITE_COLUMNS);
        if !include_deleted {
            sql.push_str(" WHERE s.is_deleted = 0");
        }
        sql.push_str(" ORDER BY s.url");

        let rows = sqlx::query_as::<_, SiteRow>(&sql)
            .fetch_all(self.pool)
            .await
            .context("Failed to list site collections")?;

        Ok(rows.into_iter().map(row_to_site).collect())
    }

    /// Sites listing the user as an owner, deleted ones included
    pub async fn list_owned(&self, user_id: Uuid) -> Result<Vec<SiteCollection>> {
        let sql = format!(
            "SELECT {} FROM site_collections s \
             WHERE EXISTS (SELECT 1 FROM site_owners o WHERE o.site_id = s.id AND o.user_id = ?) \
             ORDER BY s.url",
            SITE_COLUMNS
        );
        let rows = sqlx::query_as::<_, SiteRow>(&sql)
            .bind(user_id.to_string())
            .fetch_all(self.pool)
            .await
            .context("Failed to list owned site collections")?;

        Ok(rows.into_iter().map(row_to_site).collect())
    }

    /// Site tallies across the inventory, or across one owner's sites
    pub async fn inventory(
        &self,
        owner_user_id: Option<Uuid>,
        inactive_before: DateTime<Utc>,
    ) -> Result<SiteInventory> {
        let row: (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(s.is_deleted = 0), 0),
                   COALESCE(SUM(s.is_deleted = 1), 0),
                   COALESCE(SUM(s.is_deleted = 0 AND s.is_dormant = 1), 0),
                   COALESCE(SUM(s.is_deleted = 0 AND s.last_activity < ?1), 0),
                   COALESCE(SUM(s.storage_used_mb), 0)
            FROM site_collections s
            WHERE ?2 IS NULL
               OR EXISTS (SELECT 1 FROM site_owners o WHERE o.site_id = s.id AND o.user_id = ?2)
            "#,
        )
        .bind(format_timestamp(inactive_before))
        .bind(owner_user_id.map(|u| u.to_string()))
        .fetch_one(self.pool)
        .await
        .context("Failed to summarize site inventory")?;

        Ok(SiteInventory {
            total: row.0,
            active: row.1,
            deleted: row.2,
            dormant: row.3,
            inactive: row.4,
            storage_used_mb: row.5,
        })
    }

    /// Live sites per web template
    pub async fn template_counts(&self) -> Result<BTreeMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT template, COUNT(*) FROM site_collections WHERE is_deleted = 0 GROUP BY template",
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to count sites by template")?;

        Ok(rows.into_iter().collect())
    }

    pub async fn list(&self, query: &SiteQuery) -> Result<Vec<SiteCollection>> {
        let (where_clause, binds) = build_filter(query);
        let sql = format!(
            "SELECT {} FROM site_collections s{} ORDER BY s.url LIMIT ? OFFSET ?",
            SITE_COLUMNS, where_clause
        );

        let mut q = sqlx::query_as::<_, SiteRow>(&sql);
        for bind in binds {
            q = match bind {
                Bind::Text(v) => q.bind(v),
                Bind::Bool(v) => q.bind(v),
            };
        }
        let rows = q
            .bind(query.limit)
            .bind(query.skip)
            .fetch_all(self.pool)
            .await
            .context("Failed to list site collections")?;

        Ok(rows.into_iter().map(row_to_site).collect())
    }

    pub async fn count(&self, query: &SiteQuery) -> Result<i64> {
        let (where_clause, binds) = build_filter(query);
        let sql = format!("SELECT COUNT(*) FROM site_collections s{}", where_clause);

        let mut q = sqlx::query_as::<_, (i64,)>(&sql);
        for bind in binds {
            q = match bind {
                Bind::Text(v) => q.bind(v),
                Bind::Bool(v) => q.bind(v),
            };
        }
        let row = q
            .fetch_one(self.pool)
            .await
            .context("Failed to count site collections")?;

        Ok(row.0)
    }

    /// Insert a site; fails with a unique violation when the URL is taken
    pub async fn create(&self, site: &SiteCollection) -> Result<SiteCollection> {
        sqlx::query(
            r#"
            INSERT INTO site_collections (
                id, url, title, template, tenant_id, storage_used_mb, storage_quota_mb,
                is_hub_site, sharing_capability, last_activity, last_classified, last_reviewed,
                is_dormant, is_deleted, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(site.id.to_string())
        .bind(&site.url)
        .bind(&site.title)
        .bind(&site.template)
        .bind(site.tenant_id.to_string())
        .bind(site.storage_used_mb)
        .bind(site.storage_quota_mb)
        .bind(site.is_hub_site)
        .bind(&site.sharing_capability)
        .bind(site.last_activity.map(format_timestamp))
        .bind(site.last_classified.map(format_timestamp))
        .bind(site.last_reviewed.map(format_timestamp))
        .bind(site.is_dormant)
        .bind(site.is_deleted)
        .bind(format_timestamp(site.created_at))
        .bind(format_timestamp(site.updated_at))
        .execute(self.pool)
        .await
        .context("Failed to create site collection")?;

        self.get_by_id(site.id)
            .await?
            .context("Failed to retrieve created site collection")
    }

    /// Persist every mutable column of an existing site
    pub async fn update(&self, site: &SiteCollection) -> Result<Option<SiteCollection>> {
        let result = sqlx::query(
            r#"
            UPDATE site_collections
            SET url = ?, title = ?, template = ?, storage_used_mb = ?, storage_quota_mb = ?,
                is_hub_site = ?, sharing_capability = ?, last_activity = ?, last_classified = ?,
                last_reviewed = ?, is_dormant = ?, is_deleted = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&site.url)
        .bind(&site.title)
        .bind(&site.template)
        .bind(site.storage_used_mb)
        .bind(site.storage_quota_mb)
        .bind(site.is_hub_site)
        .bind(&site.sharing_capability)
        .bind(site.last_activity.map(format_timestamp))
        .bind(site.last_classified.map(format_timestamp))
        .bind(site.last_reviewed.map(format_timestamp))
        .bind(site.is_dormant)
        .bind(site.is_deleted)
        .bind(now_timestamp())
        .bind(site.id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update site collection")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(site.id).await
    }

    pub async fn update_stats(
        &self,
        id: Uuid,
        storage_used_mb: i64,
        storage_quota_mb: i64,
        last_activity: Option<DateTime<Utc>>,
    ) -> Result<Option<SiteCollection>> {
        let result = sqlx::query(
            r#"
            UPDATE site_collections
            SET storage_used_mb = ?, storage_quota_mb = ?,
                last_activity = COALESCE(?, last_activity), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(storage_used_mb)
        .bind(storage_quota_mb)
        .bind(last_activity.map(format_timestamp))
        .bind(now_timestamp())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update site statistics")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    pub async fn mark_dormant(&self, id: Uuid) -> Result<Option<SiteCollection>> {
        let result = sqlx::query(
            "UPDATE site_collections SET is_dormant = 1, updated_at = ? WHERE id = ?",
        )
        .bind(now_timestamp())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to mark site as dormant")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    pub async fn mark_reviewed(&self, id: Uuid) -> Result<Option<SiteCollection>> {
        let now = now_timestamp();
        let result = sqlx::query(
            "UPDATE site_collections SET last_reviewed = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to mark site as reviewed")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Remove a site together with its owners, access entries and libraries
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM site_collections WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete site collection")?;

        Ok(result.rows_affected() > 0)
    }
}

fn build_filter(query: &SiteQuery) -> (String, Vec<Bind>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut binds = Vec::new();

    if !query.include_deleted {
        conditions.push("s.is_deleted = 0");
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(LOWER(s.title) LIKE ? ESCAPE '\\' OR LOWER(s.url) LIKE ? ESCAPE '\\')");
        let pattern = contains_pattern(&search.to_lowercase());
        binds.push(Bind::Text(pattern.clone()));
        binds.push(Bind::Text(pattern));
    }
    if let Some(ref template) = query.template {
        conditions.push("s.template = ?");
        binds.push(Bind::Text(template.clone()));
    }
    if let Some(is_hub_site) = query.is_hub_site {
        conditions.push("s.is_hub_site = ?");
        binds.push(Bind::Bool(is_hub_site));
    }
    if let Some(is_dormant) = query.is_dormant {
        conditions.push("s.is_dormant = ?");
        binds.push(Bind::Bool(is_dormant));
    }
    if let Some(owner) = query.owner_user_id {
        conditions.push("EXISTS (SELECT 1 FROM site_owners o WHERE o.site_id = s.id AND o.user_id = ?)");
        binds.push(Bind::Text(owner.to_string()));
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), binds)
    }
}

fn row_to_site(row: SiteRow) -> SiteCollection {
    SiteCollection {
        id: parse_db_uuid(&row.id),
        url: row.url,
        title: row.title,
        template: row.template,
        tenant_id: parse_db_uuid(&row.tenant_id),
        storage_used_mb: row.storage_used_mb,
        storage_quota_mb: row.storage_quota_mb,
        is_hub_site: row.is_hub_site,
        sharing_capability: row.sharing_capability,
        last_activity: parse_optional_timestamp(row.last_activity),
        last_classified: parse_optional_timestamp(row.last_classified),
        last_reviewed: parse_optional_timestamp(row.last_reviewed),
        is_dormant: row.is_dormant,
        is_deleted: row.is_deleted,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}
