//! Two-factor authentication workflows
//!
//! Setup, verification, backup codes and trusted devices on top of
//! [`TwoFactorRepository`].

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::config::TwoFactorConfig;
use crate::db::TwoFactorRepository;
use crate::models::{
    BackupCodesRemaining, EnableTwoFactorResponse, ProvisioningUriResponse, TrustedDevice,
    TwoFactorStatus, User, UserTwoFactor, VerificationMethod,
};
use crate::services::totp::{self, Totp};
use crate::utils::AppError;

#[derive(Debug, Error)]
pub enum TwoFactorError {
    #[error("Two-factor authentication has not been set up")]
    NotInitialized,

    #[error("Two-factor authentication is already enabled")]
    AlreadyEnabled,

    #[error("Two-factor authentication is not enabled")]
    NotEnabled,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Trusted device not found")]
    DeviceNotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<TwoFactorError> for AppError {
    fn from(err: TwoFactorError) -> Self {
        match err {
            TwoFactorError::NotInitialized | TwoFactorError::DeviceNotFound => {
                AppError::NotFound(err.to_string())
            }
            TwoFactorError::AlreadyEnabled
            | TwoFactorError::NotEnabled
            | TwoFactorError::InvalidCode => AppError::BadRequest(err.to_string()),
            TwoFactorError::Internal(e) => {
                tracing::error!("Two-factor operation failed: {:#}", e);
                AppError::internal("Two-factor operation failed")
            }
        }
    }
}

pub type TwoFactorResult<T> = Result<T, TwoFactorError>;

/// Second-factor proof offered with a login or verification request
#[derive(Debug, Default, Clone)]
pub struct SecondFactor<'r> {
    pub totp_code: Option<&'r str>,
    pub backup_code: Option<&'r str>,
    pub device_token: Option<&'r str>,
}

impl SecondFactor<'_> {
    fn is_empty(&self) -> bool {
        self.totp_code.is_none() && self.backup_code.is_none() && self.device_token.is_none()
    }
}

/// Outcome of the second-factor check during login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginCheck {
    /// The account has no second factor enabled
    NotRequired,
    Passed(VerificationMethod),
    /// No proof was supplied
    Required,
    /// Proof was supplied but did not match
    Failed,
}

/// A freshly issued trusted-device token
#[derive(Debug, Clone)]
pub struct IssuedDevice {
    pub token: String,
    pub device: TrustedDevice,
}

pub struct TwoFactorService<'a> {
    repo: TwoFactorRepository<'a>,
    config: &'a TwoFactorConfig,
    totp: Totp,
}

impl<'a> TwoFactorService<'a> {
    pub fn new(pool: &'a SqlitePool, config: &'a TwoFactorConfig) -> Self {
        Self {
            repo: TwoFactorRepository::new(pool),
            config,
            totp: Totp::new(config),
        }
    }

    async fn settings(&self, user_id: Uuid) -> TwoFactorResult<UserTwoFactor> {
        self.repo
            .get(user_id)
            .await?
            .ok_or(TwoFactorError::NotInitialized)
    }

    async fn enabled_settings(&self, user_id: Uuid) -> TwoFactorResult<UserTwoFactor> {
        let settings = self.repo.get(user_id).await?.ok_or(TwoFactorError::NotEnabled)?;
        if !settings.is_enabled {
            return Err(TwoFactorError::NotEnabled);
        }
        Ok(settings)
    }

    /// Create a new secret and backup codes; 2FA stays off until verified
    pub async fn begin_setup(&self, user: &User) -> TwoFactorResult<EnableTwoFactorResponse> {
        if let Some(existing) = self.repo.get(user.id).await? {
            if existing.is_enabled {
                return Err(TwoFactorError::AlreadyEnabled);
            }
        }

        let secret = totp::generate_secret();
        let backup_codes = totp::generate_backup_codes(self.config.backup_code_count);
        let hashes: Vec<String> = backup_codes.iter().map(|c| totp::hash_backup_code(c)).collect();
        self.repo.begin_setup(user.id, &secret, &hashes).await?;

        let provisioning_uri = self.totp.provisioning_uri(&secret, &user.email);
        Ok(EnableTwoFactorResponse {
            totp_secret: secret,
            qr_code_url: "/api/v1/2fa/qr-code".to_string(),
            provisioning_uri,
            backup_codes,
            message: "Scan the QR code with your authenticator app, then verify a code to finish setup".to_string(),
        })
    }

    pub async fn provisioning_uri(&self, user: &User) -> TwoFactorResult<ProvisioningUriResponse> {
        let settings = self.settings(user.id).await?;
        Ok(ProvisioningUriResponse {
            provisioning_uri: self.totp.provisioning_uri(&settings.totp_secret, &user.email),
            issuer: self.totp.issuer().to_string(),
            account_name: user.email.clone(),
        })
    }

    /// Confirm the authenticator works and switch 2FA on
    pub async fn verify_setup(&self, user_id: Uuid, code: &str) -> TwoFactorResult<()> {
        let settings = self.settings(user_id).await?;
        if settings.is_enabled {
            return Err(TwoFactorError::AlreadyEnabled);
        }
        if !self.totp.verify(&settings.totp_secret, code)? {
            return Err(TwoFactorError::InvalidCode);
        }

        self.repo.enable(user_id).await?;
        Ok(())
    }

    /// Check a TOTP or backup code for an enabled account
    ///
    /// Backup codes are consumed on success.
    pub async fn verify_code(
        &self,
        user_id: Uuid,
        proof: &SecondFactor<'_>,
    ) -> TwoFactorResult<VerificationMethod> {
        let settings = self.enabled_settings(user_id).await?;
        self.check_code(&settings, proof).await
    }

    async fn check_code(
        &self,
        settings: &UserTwoFactor,
        proof: &SecondFactor<'_>,
    ) -> TwoFactorResult<VerificationMethod> {
        if let Some(code) = proof.totp_code {
            if self.totp.verify(&settings.totp_secret, code)? {
                self.repo.touch(settings.user_id).await?;
                return Ok(VerificationMethod::Totp);
            }
        }

        if let Some(code) = proof.backup_code {
            let hash = totp::hash_backup_code(code);
            if self.repo.consume_backup_code(settings.user_id, &hash).await? {
                return Ok(VerificationMethod::BackupCode);
            }
        }

        Err(TwoFactorError::InvalidCode)
    }

    /// Second-factor gate applied after the password check
    pub async fn check_login(&self, user_id: Uuid, proof: &SecondFactor<'_>) -> TwoFactorResult<LoginCheck> {
        let settings = match self.repo.get(user_id).await? {
            Some(settings) if settings.is_enabled => settings,
            _ => return Ok(LoginCheck::NotRequired),
        };

        if proof.is_empty() {
            return Ok(LoginCheck::Required);
        }

        if let Some(token) = proof.device_token {
            let hash = totp::sha256_hex(token);
            if let Some(device) = self.repo.find_valid_device(user_id, &hash, Utc::now()).await? {
                self.repo.touch_device(device.id).await?;
                return Ok(LoginCheck::Passed(VerificationMethod::TrustedDevice));
            }
            if proof.totp_code.is_none() && proof.backup_code.is_none() {
                return Ok(LoginCheck::Required);
            }
        }

        match self.check_code(&settings, proof).await {
            Ok(method) => Ok(LoginCheck::Passed(method)),
            Err(TwoFactorError::InvalidCode) => Ok(LoginCheck::Failed),
            Err(e) => Err(e),
        }
    }

    /// Issue a trusted-device token; only its hash is stored
    pub async fn trust_device(
        &self,
        user_id: Uuid,
        device_name: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> TwoFactorResult<IssuedDevice> {
        let token = totp::generate_device_token();
        let now = Utc::now();
        let device = TrustedDevice {
            id: Uuid::new_v4(),
            user_id,
            device_name: device_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown device".to_string()),
            token_hash: totp::sha256_hex(&token),
            ip_address,
            user_agent,
            created_at: now,
            last_used_at: now,
            expires_at: now + Duration::days(self.config.trusted_device_days),
            is_active: true,
        };
        self.repo.create_device(&device).await?;

        Ok(IssuedDevice { token, device })
    }

    /// Turn 2FA off; the caller has already checked the password
    pub async fn disable(&self, user_id: Uuid, totp_code: Option<&str>) -> TwoFactorResult<()> {
        let settings = self.enabled_settings(user_id).await?;
        if let Some(code) = totp_code {
            if !self.totp.verify(&settings.totp_secret, code)? {
                return Err(TwoFactorError::InvalidCode);
            }
        }

        self.repo.delete(user_id).await?;
        self.repo.revoke_all_devices(user_id).await?;
        Ok(())
    }

    /// Replace the backup code set, invalidating the old codes
    pub async fn regenerate_backup_codes(&self, user_id: Uuid) -> TwoFactorResult<Vec<String>> {
        self.enabled_settings(user_id).await?;

        let codes = totp::generate_backup_codes(self.config.backup_code_count);
        let hashes: Vec<String> = codes.iter().map(|c| totp::hash_backup_code(c)).collect();
        self.repo.replace_backup_codes(user_id, &hashes).await?;

        Ok(codes)
    }

    pub async fn backup_codes_remaining(&self, user_id: Uuid) -> TwoFactorResult<BackupCodesRemaining> {
        let settings = self.enabled_settings(user_id).await?;
        Ok(BackupCodesRemaining {
            remaining: settings.backup_codes_remaining(),
            total: self.config.backup_code_count,
        })
    }

    pub async fn list_devices(&self, user_id: Uuid) -> TwoFactorResult<Vec<TrustedDevice>> {
        Ok(self.repo.list_active_devices(user_id).await?)
    }

    pub async fn revoke_device(&self, user_id: Uuid, device_id: Uuid) -> TwoFactorResult<()> {
        if self.repo.revoke_device(user_id, device_id).await? {
            Ok(())
        } else {
            Err(TwoFactorError::DeviceNotFound)
        }
    }

    pub async fn status(&self, user_id: Uuid) -> TwoFactorResult<TwoFactorStatus> {
        let status = match self.repo.get(user_id).await? {
            Some(settings) => TwoFactorStatus {
                enabled: settings.is_enabled,
                setup_started: true,
                enabled_at: settings.enabled_at,
                last_used_at: settings.last_used_at,
                backup_codes_remaining: if settings.is_enabled {
                    settings.backup_codes_remaining()
                } else {
                    0
                },
            },
            None => TwoFactorStatus {
                enabled: false,
                setup_started: false,
                enabled_at: None,
                last_used_at: None,
                backup_codes_remaining: 0,
            },
        };
        Ok(status)
    }
}
