//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Governance roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Sees and manages only the sites they own
    #[default]
    SiteOwner,
    Admin,
    /// Read access to audit data
    Auditor,
    ComplianceOfficer,
    /// Read access to tenant-wide analytics
    Executive,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SiteOwner => "site_owner",
            UserRole::Admin => "admin",
            UserRole::Auditor => "auditor",
            UserRole::ComplianceOfficer => "compliance_officer",
            UserRole::Executive => "executive",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "site_owner" => Ok(UserRole::SiteOwner),
            "admin" => Ok(UserRole::Admin),
            "auditor" => Ok(UserRole::Auditor),
            "compliance_officer" => Ok(UserRole::ComplianceOfficer),
            "executive" => Ok(UserRole::Executive),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub department: Option<String>,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            display_name: username.clone(),
            username,
            email,
            department: None,
            role,
            password_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// User without password hash for safe serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub department: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            department: user.department,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Request to create a new user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Username must be between 1 and 100 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(max = 255, message = "Display name too long"))]
    pub display_name: Option<String>,
    #[validate(length(max = 255, message = "Department too long"))]
    pub department: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Second factor for accounts with 2FA enabled
    #[serde(default)]
    pub totp_code: Option<String>,
    #[serde(default)]
    pub backup_code: Option<String>,
    /// Trusted device token issued by a previous verification
    #[serde(default)]
    pub device_token: Option<String>,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Authentication response with tokens
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserPublic,
}
