//! Database layer
//!
//! SQLite storage for:
//! - Site collections with their owners, access matrix and libraries
//! - Quarterly access review cycles
//! - Microsoft 365 audit log records
//! - Retention policies and exclusions
//! - Users, two-factor settings and trusted devices

pub mod access_repository;
pub mod access_review_repository;
pub mod admin_action_repository;
pub mod audit_repository;
pub mod library_repository;
pub mod retention_repository;
pub mod site_repository;
pub mod two_factor_repository;

pub use access_repository::{AccessRepository, SiteOwnerRepository};
pub use access_review_repository::{AccessReviewRepository, ReviewCandidate, ReviewUpdate};
pub use admin_action_repository::AdminActionRepository;
pub use audit_repository::AuditLogRepository;
pub use library_repository::LibraryRepository;
pub use retention_repository::{ExclusionTransition, RetentionRepository};
pub use site_repository::SiteRepository;
pub use two_factor_repository::TwoFactorRepository;

use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use uuid::Uuid;

use crate::config::DatabaseConfig;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool and run pending migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let connect_options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Failed to parse database URL: {}", config.url))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(config.connect_timeout_secs))
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Verify the database answers a trivial query
pub async fn check_health(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database health check failed")?;
    Ok(())
}

/// Fixed-width UTC timestamp so that text comparison orders chronologically
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn parse_db_timestamp(ts: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
        return DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc);
    }
    Utc::now()
}

pub(crate) fn parse_optional_timestamp(ts: Option<String>) -> Option<DateTime<Utc>> {
    ts.as_deref().map(parse_db_timestamp)
}

/// `%needle%` pattern for `LIKE ... ESCAPE '\'` with wildcards in the needle escaped
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub(crate) fn parse_db_uuid(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|_| Uuid::nil())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fresh database in a temporary file
    pub async fn test_pool() -> DbPool {
        let path = std::env::temp_dir().join(format!(
            "spgov_unit_{}.db",
            Uuid::new_v4().simple()
        ));
        let config = DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        };
        init_pool(&config).await.expect("Failed to create test database")
    }
}
