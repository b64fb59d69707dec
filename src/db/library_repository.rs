//! Document library repository

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_timestamp, now_timestamp, parse_db_timestamp, parse_db_uuid, parse_optional_timestamp};
use crate::models::DocumentLibrary;

#[derive(Debug, sqlx::FromRow)]
struct LibraryRow {
    id: String,
    site_id: String,
    name: String,
    library_url: Option<String>,
    item_count: i64,
    version_count: i64,
    total_size_mb: i64,
    last_modified: Option<String>,
    last_scanned: Option<String>,
    created_at: String,
}

pub struct LibraryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LibraryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<DocumentLibrary>> {
        let row = sqlx::query_as::<_, LibraryRow>(
            r#"
            SELECT id, site_id, name, library_url, item_count, version_count, total_size_mb,
                   last_modified, last_scanned, created_at
            FROM document_libraries
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get document library")?;

        Ok(row.map(row_to_library))
    }

    /// Libraries of a site, largest first
    pub async fn list_for_site(&self, site_id: Uuid) -> Result<Vec<DocumentLibrary>> {
        let rows = sqlx::query_as::<_, LibraryRow>(
            r#"
            SELECT id, site_id, name, library_url, item_count, version_count, total_size_mb,
                   last_modified, last_scanned, created_at
            FROM document_libraries
            WHERE site_id = ?
            ORDER BY total_size_mb DESC, name
            "#,
        )
        .bind(site_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list document libraries")?;

        Ok(rows.into_iter().map(row_to_library).collect())
    }

    pub async fn create(&self, library: &DocumentLibrary) -> Result<DocumentLibrary> {
        sqlx::query(
            r#"
            INSERT INTO document_libraries (
                id, site_id, name, library_url, item_count, version_count, total_size_mb,
                last_modified, last_scanned, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(library.id.to_string())
        .bind(library.site_id.to_string())
        .bind(&library.name)
        .bind(&library.library_url)
        .bind(library.item_count)
        .bind(library.version_count)
        .bind(library.total_size_mb)
        .bind(library.last_modified.map(format_timestamp))
        .bind(library.last_scanned.map(format_timestamp))
        .bind(format_timestamp(library.created_at))
        .execute(self.pool)
        .await
        .context("Failed to create document library")?;

        self.get_by_id(library.id)
            .await?
            .context("Failed to retrieve created document library")
    }

    pub async fn mark_scanned(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE document_libraries SET last_scanned = ? WHERE id = ?")
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to stamp library scan time")?;
        Ok(())
    }

    /// Record the result of a version cleanup
    pub async fn update_versions(&self, id: Uuid, version_count: i64, total_size_mb: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE document_libraries
            SET version_count = ?, total_size_mb = ?, last_modified = ?
            WHERE id = ?
            "#,
        )
        .bind(version_count)
        .bind(total_size_mb)
        .bind(now_timestamp())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update library version count")?;
        Ok(())
    }
}

fn row_to_library(row: LibraryRow) -> DocumentLibrary {
    DocumentLibrary {
        id: parse_db_uuid(&row.id),
        site_id: parse_db_uuid(&row.site_id),
        name: row.name,
        library_url: row.library_url,
        item_count: row.item_count,
        version_count: row.version_count,
        total_size_mb: row.total_size_mb,
        last_modified: parse_optional_timestamp(row.last_modified),
        last_scanned: parse_optional_timestamp(row.last_scanned),
        created_at: parse_db_timestamp(&row.created_at),
    }
}
