//! Two-factor settings and trusted device repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_timestamp, now_timestamp, parse_db_timestamp, parse_db_uuid, parse_optional_timestamp};
use crate::models::{TrustedDevice, UserTwoFactor};

#[derive(Debug, sqlx::FromRow)]
struct TwoFactorRow {
    user_id: String,
    totp_secret: String,
    is_enabled: bool,
    backup_codes_hash: String,
    backup_codes_used: String,
    created_at: String,
    enabled_at: Option<String>,
    last_used_at: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct DeviceRow {
    id: String,
    user_id: String,
    device_name: String,
    token_hash: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: String,
    last_used_at: String,
    expires_at: String,
    is_active: bool,
}

const DEVICE_COLUMNS: &str = "id, user_id, device_name, token_hash, ip_address, user_agent, \
    created_at, last_used_at, expires_at, is_active";

pub struct TwoFactorRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TwoFactorRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<UserTwoFactor>> {
        let row = sqlx::query_as::<_, TwoFactorRow>(
            r#"
            SELECT user_id, totp_secret, is_enabled, backup_codes_hash, backup_codes_used,
                   created_at, enabled_at, last_used_at
            FROM user_two_factor
            WHERE user_id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get two-factor settings")?;

        Ok(row.map(row_to_settings))
    }

    /// Start (or restart) setup with a fresh secret and backup codes, disabled
    pub async fn begin_setup(
        &self,
        user_id: Uuid,
        totp_secret: &str,
        backup_code_hashes: &[String],
    ) -> Result<()> {
        let hashes = serde_json::to_string(backup_code_hashes)?;

        sqlx::query(
            r#"
            INSERT INTO user_two_factor (user_id, totp_secret, is_enabled, backup_codes_hash, backup_codes_used, created_at)
            VALUES (?, ?, 0, ?, '[]', ?)
            ON CONFLICT(user_id) DO UPDATE SET
                totp_secret = excluded.totp_secret,
                is_enabled = 0,
                backup_codes_hash = excluded.backup_codes_hash,
                backup_codes_used = '[]',
                created_at = excluded.created_at,
                enabled_at = NULL,
                last_used_at = NULL
            "#,
        )
        .bind(user_id.to_string())
        .bind(totp_secret)
        .bind(&hashes)
        .bind(now_timestamp())
        .execute(self.pool)
        .await
        .context("Failed to store two-factor setup")?;

        Ok(())
    }

    pub async fn enable(&self, user_id: Uuid) -> Result<()> {
        let now = now_timestamp();
        sqlx::query(
            "UPDATE user_two_factor SET is_enabled = 1, enabled_at = ?, last_used_at = ? WHERE user_id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(user_id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to enable two-factor authentication")?;
        Ok(())
    }

    pub async fn delete(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_two_factor WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete two-factor settings")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn touch(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE user_two_factor SET last_used_at = ? WHERE user_id = ?")
            .bind(now_timestamp())
            .bind(user_id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update two-factor usage")?;
        Ok(())
    }

    /// Replace the backup code set, clearing the used list
    pub async fn replace_backup_codes(&self, user_id: Uuid, hashes: &[String]) -> Result<()> {
        sqlx::query(
            "UPDATE user_two_factor SET backup_codes_hash = ?, backup_codes_used = '[]' WHERE user_id = ?",
        )
        .bind(serde_json::to_string(hashes)?)
        .bind(user_id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to store backup codes")?;
        Ok(())
    }

    /// Mark a backup code hash as used in a single statement
    ///
    /// Returns false when the hash is unknown or was already used, so two
    /// concurrent logins cannot both spend the same code.
    pub async fn consume_backup_code(&self, user_id: Uuid, hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_two_factor
            SET backup_codes_used = json_insert(backup_codes_used, '$[#]', ?1), last_used_at = ?2
            WHERE user_id = ?3
              AND is_enabled = 1
              AND EXISTS (SELECT 1 FROM json_each(user_two_factor.backup_codes_hash) WHERE value = ?1)
              AND NOT EXISTS (SELECT 1 FROM json_each(user_two_factor.backup_codes_used) WHERE value = ?1)
            "#,
        )
        .bind(hash)
        .bind(now_timestamp())
        .bind(user_id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to mark backup code as used")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create_device(&self, device: &TrustedDevice) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trusted_devices (id, user_id, device_name, token_hash, ip_address, user_agent,
                                         created_at, last_used_at, expires_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(device.id.to_string())
        .bind(device.user_id.to_string())
        .bind(&device.device_name)
        .bind(&device.token_hash)
        .bind(&device.ip_address)
        .bind(&device.user_agent)
        .bind(format_timestamp(device.created_at))
        .bind(format_timestamp(device.last_used_at))
        .bind(format_timestamp(device.expires_at))
        .execute(self.pool)
        .await
        .context("Failed to store trusted device")?;
        Ok(())
    }

    /// Active, unexpired device of this user matching the token hash
    pub async fn find_valid_device(
        &self,
        user_id: Uuid,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TrustedDevice>> {
        let sql = format!(
            "SELECT {} FROM trusted_devices WHERE user_id = ? AND token_hash = ? AND is_active = 1 AND expires_at > ?",
            DEVICE_COLUMNS
        );
        let row = sqlx::query_as::<_, DeviceRow>(&sql)
            .bind(user_id.to_string())
            .bind(token_hash)
            .bind(format_timestamp(now))
            .fetch_optional(self.pool)
            .await
            .context("Failed to look up trusted device")?;

        Ok(row.map(row_to_device))
    }

    pub async fn touch_device(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE trusted_devices SET last_used_at = ? WHERE id = ?")
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update trusted device")?;
        Ok(())
    }

    pub async fn list_active_devices(&self, user_id: Uuid) -> Result<Vec<TrustedDevice>> {
        let sql = format!(
            "SELECT {} FROM trusted_devices WHERE user_id = ? AND is_active = 1 AND expires_at > ? ORDER BY last_used_at DESC",
            DEVICE_COLUMNS
        );
        let rows = sqlx::query_as::<_, DeviceRow>(&sql)
            .bind(user_id.to_string())
            .bind(now_timestamp())
            .fetch_all(self.pool)
            .await
            .context("Failed to list trusted devices")?;

        Ok(rows.into_iter().map(row_to_device).collect())
    }

    /// Revoke one of the user's devices; false when it does not belong to them
    pub async fn revoke_device(&self, user_id: Uuid, device_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE trusted_devices SET is_active = 0 WHERE id = ? AND user_id = ? AND is_active = 1",
        )
        .bind(device_id.to_string())
        .bind(user_id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to revoke trusted device")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke_all_devices(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("UPDATE trusted_devices SET is_active = 0 WHERE user_id = ? AND is_active = 1")
            .bind(user_id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to revoke trusted devices")?;
        Ok(result.rows_affected())
    }
}

fn row_to_settings(row: TwoFactorRow) -> UserTwoFactor {
    UserTwoFactor {
        user_id: parse_db_uuid(&row.user_id),
        totp_secret: row.totp_secret,
        is_enabled: row.is_enabled,
        backup_codes_hash: serde_json::from_str(&row.backup_codes_hash).unwrap_or_default(),
        backup_codes_used: serde_json::from_str(&row.backup_codes_used).unwrap_or_default(),
        created_at: parse_db_timestamp(&row.created_at),
        enabled_at: parse_optional_timestamp(row.enabled_at),
        last_used_at: parse_optional_timestamp(row.last_used_at),
    }
}

fn row_to_device(row: DeviceRow) -> TrustedDevice {
    TrustedDevice {
        id: parse_db_uuid(&row.id),
        user_id: parse_db_uuid(&row.user_id),
        device_name: row.device_name,
        token_hash: row.token_hash,
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        created_at: parse_db_timestamp(&row.created_at),
        last_used_at: parse_db_timestamp(&row.last_used_at),
        expires_at: parse_db_timestamp(&row.expires_at),
        is_active: row.is_active,
    }
}
