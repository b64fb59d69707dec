//! Administrative action log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record of a security-relevant or administrative operation performed
/// through this service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminActionLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub status: ActionStatus,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    #[default]
    Success,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "success",
            ActionStatus::Failed => "failed",
        }
    }
}

/// An action about to be recorded
#[derive(Debug, Clone)]
pub struct NewAdminAction {
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub status: ActionStatus,
    pub ip_address: Option<String>,
}

impl NewAdminAction {
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            user_id: None,
            username: None,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            details: None,
            status: ActionStatus::Success,
            ip_address: None,
        }
    }

    pub fn by(mut self, user_id: Uuid, username: impl Into<String>) -> Self {
        self.user_id = Some(user_id);
        self.username = Some(username.into());
        self
    }

    pub fn resource(mut self, resource_id: impl ToString) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn failed(mut self) -> Self {
        self.status = ActionStatus::Failed;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminActionQuery {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminActionListResponse {
    pub total: i64,
    pub actions: Vec<AdminActionLog>,
    pub skip: i64,
    pub limit: i64,
}
