//! Site collection data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::utils::validation::{validate_sharing_capability, validate_site_url};

/// A SharePoint site collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteCollection {
    /// Unique identifier
    pub id: Uuid,

    /// Absolute site URL, unique across the inventory
    pub url: String,

    pub title: String,

    /// Web template, e.g. `STS#3` or `GROUP#0`
    pub template: String,

    /// Microsoft 365 tenant the site belongs to
    pub tenant_id: Uuid,

    pub storage_used_mb: i64,

    /// Quota in MB, 0 when no quota is set
    pub storage_quota_mb: i64,

    pub is_hub_site: bool,

    /// External sharing setting reported by SharePoint
    pub sharing_capability: String,

    pub last_activity: Option<DateTime<Utc>>,
    pub last_classified: Option<DateTime<Utc>>,
    pub last_reviewed: Option<DateTime<Utc>>,

    pub is_dormant: bool,

    /// Soft-delete flag carried from the tenant inventory
    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteCollection {
    pub fn new(url: impl Into<String>, tenant_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            title: String::new(),
            template: String::new(),
            tenant_id,
            storage_used_mb: 0,
            storage_quota_mb: 0,
            is_hub_site: false,
            sharing_capability: String::new(),
            last_activity: None,
            last_classified: None,
            last_reviewed: None,
            is_dormant: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Share of the quota in use, 0 when no quota is set
    pub fn storage_usage_percent(&self) -> f64 {
        if self.storage_quota_mb <= 0 {
            return 0.0;
        }
        self.storage_used_mb as f64 / self.storage_quota_mb as f64 * 100.0
    }

    pub fn update_stats(
        &mut self,
        storage_used_mb: i64,
        storage_quota_mb: i64,
        last_activity: Option<DateTime<Utc>>,
    ) {
        self.storage_used_mb = storage_used_mb;
        self.storage_quota_mb = storage_quota_mb;
        if last_activity.is_some() {
            self.last_activity = last_activity;
        }
        self.updated_at = Utc::now();
    }

    pub fn mark_as_dormant(&mut self) {
        self.is_dormant = true;
        self.updated_at = Utc::now();
    }

    pub fn mark_reviewed(&mut self) {
        let now = Utc::now();
        self.last_reviewed = Some(now);
        self.updated_at = now;
    }
}

fn site_url(url: &str) -> Result<(), ValidationError> {
    if validate_site_url(url) {
        Ok(())
    } else {
        Err(ValidationError::new("site_url")
            .with_message("Site URL must be an absolute http(s) URL".into()))
    }
}

fn valid_sharing_capability(value: &str) -> Result<(), ValidationError> {
    if validate_sharing_capability(value) {
        Ok(())
    } else {
        Err(ValidationError::new("sharing_capability")
            .with_message("Unknown sharing capability".into()))
    }
}

/// Request to register a site collection
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSiteRequest {
    #[validate(custom(function = "site_url"))]
    pub url: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Title must be at most 500 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Template must be at most 100 characters"))]
    pub template: String,
    pub tenant_id: Uuid,
    #[serde(default)]
    #[validate(range(min = 0, max = 1_000_000_000, message = "Storage used out of range"))]
    pub storage_used_mb: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 1_000_000_000, message = "Storage quota out of range"))]
    pub storage_quota_mb: i64,
    #[serde(default)]
    pub is_hub_site: bool,
    #[serde(default)]
    #[validate(custom(function = "valid_sharing_capability"))]
    pub sharing_capability: String,
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl CreateSiteRequest {
    pub fn into_site(self) -> SiteCollection {
        let mut site = SiteCollection::new(self.url.trim(), self.tenant_id);
        site.title = self.title;
        site.template = self.template;
        site.storage_used_mb = self.storage_used_mb;
        site.storage_quota_mb = self.storage_quota_mb;
        site.is_hub_site = self.is_hub_site;
        site.sharing_capability = self.sharing_capability;
        site.last_activity = self.last_activity;
        site.is_deleted = self.is_deleted;
        site
    }
}

/// Request to update the descriptive fields of a site
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSiteRequest {
    #[validate(custom(function = "site_url"))]
    pub url: Option<String>,
    #[validate(length(max = 500, message = "Title must be at most 500 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 100, message = "Template must be at most 100 characters"))]
    pub template: Option<String>,
    pub is_hub_site: Option<bool>,
    #[validate(custom(function = "valid_sharing_capability"))]
    pub sharing_capability: Option<String>,
    pub last_classified: Option<DateTime<Utc>>,
    pub is_deleted: Option<bool>,
}

impl UpdateSiteRequest {
    pub fn apply(self, site: &mut SiteCollection) {
        if let Some(url) = self.url {
            site.url = url.trim().to_string();
        }
        if let Some(title) = self.title {
            site.title = title;
        }
        if let Some(template) = self.template {
            site.template = template;
        }
        if let Some(is_hub_site) = self.is_hub_site {
            site.is_hub_site = is_hub_site;
        }
        if let Some(sharing) = self.sharing_capability {
            site.sharing_capability = sharing;
        }
        if self.last_classified.is_some() {
            site.last_classified = self.last_classified;
        }
        if let Some(is_deleted) = self.is_deleted {
            site.is_deleted = is_deleted;
        }
        site.updated_at = Utc::now();
    }
}

/// Storage and activity statistics pushed from the tenant scan
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSiteStatsRequest {
    #[validate(range(min = 0, max = 1_000_000_000, message = "Storage used out of range"))]
    pub storage_used_mb: i64,
    #[validate(range(min = 0, max = 1_000_000_000, message = "Storage quota out of range"))]
    pub storage_quota_mb: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Filter, sort and paging parameters for site listings
#[derive(Debug, Clone, Deserialize)]
pub struct SiteQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub search: Option<String>,
    pub template: Option<String>,
    pub is_hub_site: Option<bool>,
    pub is_dormant: Option<bool>,
    #[serde(default)]
    pub include_deleted: bool,
    /// Restrict to sites listing this user as an owner
    #[serde(skip)]
    pub owner_user_id: Option<Uuid>,
}

fn default_limit() -> i64 {
    100
}

impl Default for SiteQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
            search: None,
            template: None,
            is_hub_site: None,
            is_dormant: None,
            include_deleted: false,
            owner_user_id: None,
        }
    }
}

/// Paged site listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteListResponse {
    pub total: i64,
    pub sites: Vec<SiteCollection>,
    pub skip: i64,
    pub limit: i64,
}

/// Health assessment of a single site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteHealth {
    pub site_id: Uuid,
    pub site_name: String,
    pub health_score: i32,
    pub issues: Vec<String>,
    pub storage_usage_percent: f64,
    pub owner_count: i64,
    pub has_primary_owner: bool,
    pub last_activity_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SiteLookupQuery {
    pub url: String,
}
