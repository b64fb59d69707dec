//! Two-factor authentication models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored 2FA settings of a user
#[derive(Debug, Clone)]
pub struct UserTwoFactor {
    pub user_id: Uuid,
    /// Base32-encoded TOTP secret
    pub totp_secret: String,
    pub is_enabled: bool,
    /// SHA-256 hex digests of the issued backup codes
    pub backup_codes_hash: Vec<String>,
    pub backup_codes_used: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub enabled_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl UserTwoFactor {
    pub fn backup_codes_remaining(&self) -> usize {
        self.backup_codes_hash
            .iter()
            .filter(|h| !self.backup_codes_used.contains(h))
            .count()
    }
}

/// A browser allowed to skip the second factor until `expires_at`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedDevice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnableTwoFactorResponse {
    pub totp_secret: String,
    pub qr_code_url: String,
    pub provisioning_uri: String,
    pub backup_codes: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningUriResponse {
    pub provisioning_uri: String,
    pub issuer: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifySetupRequest {
    pub totp_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyTwoFactorRequest {
    pub totp_code: Option<String>,
    pub backup_code: Option<String>,
    #[serde(default)]
    pub trust_device: bool,
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyTwoFactorResponse {
    pub verified: bool,
    pub method: VerificationMethod,
    /// Returned once, only when a device was trusted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Totp,
    BackupCode,
    TrustedDevice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisableTwoFactorRequest {
    pub password: String,
    pub totp_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupCodesResponse {
    pub backup_codes: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupCodesRemaining {
    pub remaining: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TwoFactorStatus {
    pub enabled: bool,
    pub setup_started: bool,
    pub enabled_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub backup_codes_remaining: usize,
}
