//! Site ownership and access matrix models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Owner or co-owner of a site collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteOwner {
    pub id: Uuid,
    pub site_id: Uuid,
    /// Local account, when the owner has one
    pub user_id: Option<Uuid>,
    pub user_email: String,
    pub ownership_type: OwnershipType,
    pub is_primary_owner: bool,
    pub assigned_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OwnershipType {
    #[default]
    Owner,
    CoOwner,
}

impl OwnershipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnershipType::Owner => "owner",
            OwnershipType::CoOwner => "co-owner",
        }
    }
}

impl std::str::FromStr for OwnershipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(OwnershipType::Owner),
            "co-owner" => Ok(OwnershipType::CoOwner),
            _ => Err(format!("Invalid ownership type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddSiteOwnerRequest {
    pub user_id: Option<Uuid>,
    #[validate(email(message = "Invalid owner email"))]
    pub user_email: String,
    #[serde(default)]
    pub ownership_type: OwnershipType,
    #[serde(default)]
    pub is_primary_owner: bool,
}

/// How a permission reached the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentType {
    #[default]
    Direct,
    Group,
    Inherited,
}

impl AssignmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentType::Direct => "direct",
            AssignmentType::Group => "group",
            AssignmentType::Inherited => "inherited",
        }
    }
}

impl std::str::FromStr for AssignmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(AssignmentType::Direct),
            "group" => Ok(AssignmentType::Group),
            "inherited" => Ok(AssignmentType::Inherited),
            _ => Err(format!("Invalid assignment type: {}", s)),
        }
    }
}

/// One row of a site's access matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEntry {
    pub id: Uuid,
    pub site_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    /// SharePoint permission level, e.g. "Full Control" or "Read"
    pub permission_level: String,
    pub assignment_type: AssignmentType,
    pub group_name: Option<String>,
    pub is_external_user: bool,
    pub external_user_email: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub assigned_date: DateTime<Utc>,
    pub last_access: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GrantAccessRequest {
    pub user_id: Option<Uuid>,
    #[validate(email(message = "Invalid user email"))]
    pub user_email: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Permission level is required"))]
    pub permission_level: String,
    #[serde(default)]
    pub assignment_type: AssignmentType,
    #[validate(length(max = 255, message = "Group name too long"))]
    pub group_name: Option<String>,
    #[serde(default)]
    pub is_external_user: bool,
    #[validate(email(message = "Invalid external user email"))]
    pub external_user_email: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Access matrix of a site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteAccessResponse {
    pub site_id: Uuid,
    pub total_entries: usize,
    pub external_users: usize,
    pub entries: Vec<AccessEntry>,
}
