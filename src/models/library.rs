//! Document library model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A document library inside a site collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLibrary {
    pub id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    pub library_url: Option<String>,
    pub item_count: i64,
    /// Tracked document versions across all items
    pub version_count: i64,
    pub total_size_mb: i64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Last time version statistics were computed
    pub last_scanned: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DocumentLibrary {
    pub fn avg_versions_per_item(&self) -> f64 {
        if self.item_count <= 0 {
            return 0.0;
        }
        self.version_count as f64 / self.item_count as f64
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLibraryRequest {
    #[validate(length(min = 1, max = 255, message = "Library name is required"))]
    pub name: String,
    #[validate(length(max = 2048, message = "Library URL too long"))]
    pub library_url: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = 100_000_000, message = "Item count out of range"))]
    pub item_count: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 100_000_000_000i64, message = "Version count out of range"))]
    pub version_count: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 1_000_000_000, message = "Size out of range"))]
    pub total_size_mb: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl CreateLibraryRequest {
    pub fn into_library(self, site_id: Uuid) -> DocumentLibrary {
        DocumentLibrary {
            id: Uuid::new_v4(),
            site_id,
            name: self.name,
            library_url: self.library_url,
            item_count: self.item_count,
            version_count: self.version_count,
            total_size_mb: self.total_size_mb,
            last_modified: self.last_modified,
            last_scanned: None,
            created_at: Utc::now(),
        }
    }
}
