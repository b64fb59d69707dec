//! Test factories for generating request payloads
//!
//! Every factory call yields unique URLs and names so tests never collide.

use chrono::{DateTime, Duration, Utc};
use fake::faker::company::en::CompanyName;
use fake::faker::lorem::en::Word;
use fake::Fake;
use serde_json::{json, Value};
use uuid::Uuid;

pub const TENANT_ID: &str = "6f1c2a3b-4d5e-4f60-8a71-92b3c4d5e6f7";

/// Builder for `POST /api/v1/sites` payloads
pub struct SiteBuilder {
    url: String,
    title: String,
    template: String,
    storage_used_mb: i64,
    storage_quota_mb: i64,
    last_activity: Option<DateTime<Utc>>,
}

impl SiteBuilder {
    pub fn new() -> Self {
        let word: String = Word().fake();
        Self {
            url: format!(
                "https://contoso.sharepoint.com/sites/{}-{}",
                word.to_lowercase(),
                &Uuid::new_v4().simple().to_string()[..8]
            ),
            title: CompanyName().fake(),
            template: "STS#3".to_string(),
            storage_used_mb: 1024,
            storage_quota_mb: 25600,
            last_activity: Some(Utc::now() - Duration::days(3)),
        }
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn storage(mut self, used_mb: i64, quota_mb: i64) -> Self {
        self.storage_used_mb = used_mb;
        self.storage_quota_mb = quota_mb;
        self
    }

    pub fn inactive_for(mut self, days: i64) -> Self {
        self.last_activity = Some(Utc::now() - Duration::days(days));
        self
    }

    pub fn build(self) -> Value {
        json!({
            "url": self.url,
            "title": self.title,
            "template": self.template,
            "tenant_id": TENANT_ID,
            "storage_used_mb": self.storage_used_mb,
            "storage_quota_mb": self.storage_quota_mb,
            "sharing_capability": "ExternalUserSharingOnly",
            "last_activity": self.last_activity,
        })
    }
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn site_payload() -> Value {
    SiteBuilder::new().build()
}

pub fn library_payload(item_count: i64, version_count: i64, total_size_mb: i64) -> Value {
    let name: String = Word().fake();
    json!({
        "name": format!("{} Documents", name),
        "item_count": item_count,
        "version_count": version_count,
        "total_size_mb": total_size_mb,
    })
}

pub fn policy_payload() -> Value {
    let name: String = CompanyName().fake();
    json!({
        "name": format!("{} records", name),
        "description": "Keep business records for seven years",
        "retention_period_days": 2555,
        "scope": "sharepoint",
    })
}

pub fn audit_record(operation: &str, user_id: &str, at: DateTime<Utc>) -> Value {
    json!({
        "content_id": Uuid::new_v4(),
        "creation_time": at,
        "operation": operation,
        "workload": "SharePoint",
        "user_id": user_id,
        "client_ip": "203.0.113.7",
        "audit_data": { "ObjectId": "https://contoso.sharepoint.com/sites/hr/Shared Documents/plan.docx" },
    })
}
