//! Document version statistics and cleanup

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::LibraryRepository;
use crate::models::{
    DocumentLibrary, Priority, VersionCleanupQuery, VersionCleanupResult, VersionRecommendation,
    VersionStats,
};

/// Estimated size of one stored version
const MB_PER_VERSION: f64 = 0.5;
/// Versions per document considered healthy when estimating savings
const TARGET_VERSIONS_PER_DOC: f64 = 5.0;
const HIGH_PRIORITY_AVG_VERSIONS: f64 = 20.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn version_stats(library: &DocumentLibrary, threshold: f64, now: DateTime<Utc>) -> VersionStats {
    let avg = library.avg_versions_per_item();
    let surplus = (library.version_count - library.item_count).max(0);

    VersionStats {
        library_id: library.id,
        library_name: library.name.clone(),
        total_documents: library.item_count,
        total_versions: library.version_count,
        avg_versions_per_doc: round2(avg),
        docs_over_threshold: if avg > threshold { library.item_count } else { 0 },
        estimated_version_storage_mb: round2(surplus as f64 * MB_PER_VERSION),
        scanned_at: now,
    }
}

/// Versions above `keep_minimum` per document are removed
pub fn plan_cleanup(library: &DocumentLibrary, query: &VersionCleanupQuery) -> VersionCleanupResult {
    let keep = query.keep_minimum.saturating_mul(library.item_count);
    let versions_deleted = (library.version_count - keep).max(0);

    VersionCleanupResult {
        library_id: library.id,
        versions_deleted,
        storage_freed_mb: round2(versions_deleted as f64 * MB_PER_VERSION),
        documents_processed: library.item_count,
        retention_days: query.retention_days,
        keep_minimum: query.keep_minimum,
    }
}

pub fn recommend_versions(libraries: &[DocumentLibrary], threshold: f64) -> Vec<VersionRecommendation> {
    let mut recommendations: Vec<VersionRecommendation> = libraries
        .iter()
        .filter(|l| l.item_count > 0 && l.version_count > 0)
        .filter_map(|l| {
            let avg = l.avg_versions_per_item();
            if avg <= threshold {
                return None;
            }
            let savings = (avg - TARGET_VERSIONS_PER_DOC) * l.item_count as f64 * MB_PER_VERSION;
            Some(VersionRecommendation {
                library_id: l.id,
                library_name: l.name.clone(),
                avg_versions: round2(avg),
                estimated_savings_mb: round2(savings),
                priority: if avg > HIGH_PRIORITY_AVG_VERSIONS {
                    Priority::High
                } else {
                    Priority::Medium
                },
                recommendation: format!(
                    "Average of {:.1} versions per document; limit version history to reclaim space",
                    avg
                ),
            })
        })
        .collect();

    recommendations.sort_by(|a, b| b.estimated_savings_mb.total_cmp(&a.estimated_savings_mb));
    recommendations
}

pub struct VersionManagementService<'a> {
    libraries: LibraryRepository<'a>,
    threshold: f64,
}

impl<'a> VersionManagementService<'a> {
    pub fn new(pool: &'a SqlitePool, threshold: f64) -> Self {
        Self {
            libraries: LibraryRepository::new(pool),
            threshold,
        }
    }

    pub async fn get_library(&self, id: Uuid) -> Result<Option<DocumentLibrary>> {
        self.libraries.get_by_id(id).await
    }

    /// Compute statistics and stamp the library as scanned
    pub async fn scan(&self, library_id: Uuid) -> Result<Option<VersionStats>> {
        let Some(library) = self.libraries.get_by_id(library_id).await? else {
            return Ok(None);
        };

        let stats = version_stats(&library, self.threshold, Utc::now());
        self.libraries.mark_scanned(library_id).await?;
        tracing::info!(
            "Scanned library {}: {} versions over {} documents",
            library_id,
            stats.total_versions,
            stats.total_documents
        );
        Ok(Some(stats))
    }

    pub async fn cleanup(
        &self,
        library_id: Uuid,
        query: &VersionCleanupQuery,
    ) -> Result<Option<VersionCleanupResult>> {
        let Some(library) = self.libraries.get_by_id(library_id).await? else {
            return Ok(None);
        };

        let result = plan_cleanup(&library, query);
        if result.versions_deleted > 0 {
            let remaining_size = (library.total_size_mb as f64 - result.storage_freed_mb)
                .max(0.0)
                .round() as i64;
            self.libraries
                .update_versions(
                    library_id,
                    library.version_count - result.versions_deleted,
                    remaining_size,
                )
                .await?;
        }

        tracing::info!(
            "Version cleanup for library {} removed {} versions ({} MB)",
            library_id,
            result.versions_deleted,
            result.storage_freed_mb
        );
        Ok(Some(result))
    }

    pub async fn recommendations(&self, site_id: Uuid) -> Result<Vec<VersionRecommendation>> {
        let libraries = self.libraries.list_for_site(site_id).await?;
        Ok(recommend_versions(&libraries, self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_support::test_pool, SiteRepository};
    use crate::models::SiteCollection;

    fn library(name: &str, items: i64, versions: i64, size: i64) -> DocumentLibrary {
        DocumentLibrary {
            id: Uuid::new_v4(),
            site_id: Uuid::nil(),
            name: name.to_string(),
            library_url: None,
            item_count: items,
            version_count: versions,
            total_size_mb: size,
            last_modified: None,
            last_scanned: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_version_stats() {
        let stats = version_stats(&library("Docs", 100, 1500, 900), 10.0, Utc::now());
        assert_eq!(stats.avg_versions_per_doc, 15.0);
        assert_eq!(stats.docs_over_threshold, 100);
        assert_eq!(stats.estimated_version_storage_mb, 700.0);

        let quiet = version_stats(&library("Quiet", 100, 300, 10), 10.0, Utc::now());
        assert_eq!(quiet.docs_over_threshold, 0);

        let empty = version_stats(&library("Empty", 0, 0, 0), 10.0, Utc::now());
        assert_eq!(empty.avg_versions_per_doc, 0.0);
        assert_eq!(empty.estimated_version_storage_mb, 0.0);
    }

    #[test]
    fn test_plan_cleanup_keeps_minimum_per_document() {
        let query = VersionCleanupQuery::default();
        let result = plan_cleanup(&library("Docs", 10, 100, 200), &query);
        assert_eq!(result.versions_deleted, 70);
        assert_eq!(result.storage_freed_mb, 35.0);
        assert_eq!(result.documents_processed, 10);

        let nothing = plan_cleanup(&library("Lean", 10, 20, 5), &query);
        assert_eq!(nothing.versions_deleted, 0);
        assert_eq!(nothing.storage_freed_mb, 0.0);
    }

    #[test]
    fn test_plan_cleanup_with_huge_item_count() {
        let query = VersionCleanupQuery::default();
        let result = plan_cleanup(&library("Archive", i64::MAX / 2, i64::MAX, 0), &query);

        // keep_minimum * items saturates, so nothing is planned for deletion
        assert_eq!(result.versions_deleted, 0);
        assert_eq!(result.documents_processed, i64::MAX / 2);
    }

    #[test]
    fn test_recommendations_sorted_by_savings() {
        let libraries = vec![
            library("Skipped", 0, 0, 0),
            library("Healthy", 10, 50, 0),
            library("Medium", 100, 1200, 0),
            library("High", 50, 1250, 0),
        ];
        let recs = recommend_versions(&libraries, 10.0);

        assert_eq!(recs.len(), 2);
        // (25 - 5) * 50 * 0.5 = 500 vs (12 - 5) * 100 * 0.5 = 350
        assert_eq!(recs[0].library_name, "High");
        assert_eq!(recs[0].estimated_savings_mb, 500.0);
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[1].library_name, "Medium");
        assert_eq!(recs[1].estimated_savings_mb, 350.0);
        assert_eq!(recs[1].priority, Priority::Medium);
    }

    #[tokio::test]
    async fn test_cleanup_updates_tracked_versions() {
        let pool = test_pool().await;
        let site = SiteRepository::new(&pool)
            .create(&SiteCollection::new("https://contoso.sharepoint.com/sites/hr", Uuid::new_v4()))
            .await
            .unwrap();
        let mut lib = library("Shared Documents", 10, 100, 200);
        lib.site_id = site.id;
        let lib = LibraryRepository::new(&pool).create(&lib).await.unwrap();

        let service = VersionManagementService::new(&pool, 10.0);
        let result = service
            .cleanup(lib.id, &VersionCleanupQuery::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.versions_deleted, 70);

        let stored = service.get_library(lib.id).await.unwrap().unwrap();
        assert_eq!(stored.version_count, 30);
        assert_eq!(stored.total_size_mb, 165);

        let stats = service.scan(lib.id).await.unwrap().unwrap();
        assert_eq!(stats.total_versions, 30);
        assert!(service.get_library(lib.id).await.unwrap().unwrap().last_scanned.is_some());

        assert!(service.scan(Uuid::new_v4()).await.unwrap().is_none());
    }
}
