//! Configuration management
//!
//! YAML-based configuration with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings
//! - Governance thresholds used by health scoring and storage analytics

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub two_factor: TwoFactorConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// TLS/HTTPS configuration (if not set, server runs HTTP)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Built dashboard assets
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
    /// Serve the dashboard with an index.html fallback for client-side routes
    #[serde(default = "default_serve_frontend")]
    pub serve_frontend: bool,
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to TLS certificate file (PEM format)
    pub cert_file: PathBuf,
    /// Path to TLS private key file (PEM format)
    pub key_file: PathBuf,
    /// Minimum TLS version (1.2 or 1.3)
    #[serde(default = "default_min_tls_version")]
    pub min_version: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8400
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_static_dir() -> Option<PathBuf> {
    let path = PathBuf::from("frontend/dist");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

fn default_serve_frontend() -> bool {
    true
}

fn default_min_tls_version() -> String {
    "1.3".to_string()
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry_days: u64,
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    /// Administrator created on first start when no users exist
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

/// Initial administrator account
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapAdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,
    #[serde(default = "default_admin_email")]
    pub email: String,
    pub password: String,
}

fn default_token_expiry() -> u64 {
    24
}

fn default_refresh_expiry() -> u64 {
    7
}

fn default_password_min_length() -> usize {
    8
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_email() -> String {
    "admin@localhost.localdomain".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (file and both targets)
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
    /// Maximum number of log files to keep (0 = unlimited)
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// stdout/stderr
    #[default]
    Console,
    /// Rolling file
    File,
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/sp-governance")
}

fn default_log_prefix() -> String {
    "sp-governance".to_string()
}

fn default_log_rotation() -> bool {
    true
}

fn default_max_log_files() -> usize {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
            max_log_files: default_max_log_files(),
        }
    }
}

/// Two-factor authentication settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwoFactorConfig {
    /// Issuer label shown by authenticator apps
    #[serde(default = "default_totp_issuer")]
    pub issuer: String,
    #[serde(default = "default_totp_digits")]
    pub digits: u32,
    #[serde(default = "default_totp_period")]
    pub period_secs: u64,
    /// Accepted clock drift in whole periods on either side
    #[serde(default = "default_totp_skew")]
    pub skew_steps: u64,
    #[serde(default = "default_backup_code_count")]
    pub backup_code_count: usize,
    #[serde(default = "default_trusted_device_days")]
    pub trusted_device_days: i64,
}

fn default_totp_issuer() -> String {
    "SharePoint Governance Platform".to_string()
}

fn default_totp_digits() -> u32 {
    6
}

fn default_totp_period() -> u64 {
    30
}

fn default_totp_skew() -> u64 {
    1
}

fn default_backup_code_count() -> usize {
    10
}

fn default_trusted_device_days() -> i64 {
    30
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            issuer: default_totp_issuer(),
            digits: default_totp_digits(),
            period_secs: default_totp_period(),
            skew_steps: default_totp_skew(),
            backup_code_count: default_backup_code_count(),
            trusted_device_days: default_trusted_device_days(),
        }
    }
}

/// Thresholds for site health and storage analytics
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GovernanceConfig {
    #[serde(default = "default_inactive_warning_days")]
    pub inactive_warning_days: i64,
    #[serde(default = "default_inactive_critical_days")]
    pub inactive_critical_days: i64,
    #[serde(default = "default_storage_warning_percent")]
    pub storage_warning_percent: f64,
    #[serde(default = "default_storage_critical_percent")]
    pub storage_critical_percent: f64,
    /// Minimum size of an inactive site before it is proposed for archiving
    #[serde(default = "default_archive_candidate_min_mb")]
    pub archive_candidate_min_mb: i64,
    /// Average versions per item above which a library is flagged
    #[serde(default = "default_version_threshold")]
    pub version_threshold: f64,
    /// Days an owner has to certify an access review
    #[serde(default = "default_review_period_days")]
    pub review_period_days: i64,
}

fn default_inactive_warning_days() -> i64 {
    90
}

fn default_inactive_critical_days() -> i64 {
    180
}

fn default_storage_warning_percent() -> f64 {
    75.0
}

fn default_storage_critical_percent() -> f64 {
    90.0
}

fn default_archive_candidate_min_mb() -> i64 {
    10240
}

fn default_version_threshold() -> f64 {
    10.0
}

fn default_review_period_days() -> i64 {
    30
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            inactive_warning_days: default_inactive_warning_days(),
            inactive_critical_days: default_inactive_critical_days(),
            storage_warning_percent: default_storage_warning_percent(),
            storage_critical_percent: default_storage_critical_percent(),
            archive_candidate_min_mb: default_archive_candidate_min_mb(),
            version_threshold: default_version_threshold(),
            review_period_days: default_review_period_days(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                workers: default_workers(),
                request_timeout_secs: None,
                tls: None,
                static_dir: default_static_dir(),
                serve_frontend: default_serve_frontend(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production-minimum-32-characters-long".to_string(),
                token_expiry_hours: default_token_expiry(),
                refresh_token_expiry_days: default_refresh_expiry(),
                password_min_length: default_password_min_length(),
                bootstrap_admin: None,
            },
            database: DatabaseConfig {
                url: "sqlite://./data/sp-governance.db".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            logging: LoggingConfig::default(),
            two_factor: TwoFactorConfig::default(),
            governance: GovernanceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("SPGOV_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                Self::from_file(path)?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/sp-governance/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("sp-governance/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SPGOV_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SPGOV_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(password) = std::env::var("SPGOV_ADMIN_PASSWORD") {
            let admin = self
                .auth
                .bootstrap_admin
                .get_or_insert_with(|| BootstrapAdminConfig {
                    username: default_admin_username(),
                    email: default_admin_email(),
                    password: String::new(),
                });
            admin.password = password;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SPGOV_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
        if let Ok(target) = std::env::var("SPGOV_LOG_TARGET") {
            self.logging.target = match target.to_lowercase().as_str() {
                "file" => LogTarget::File,
                "both" => LogTarget::Both,
                _ => LogTarget::Console,
            };
        }
        if let Ok(dir) = std::env::var("SPGOV_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }

        if let Ok(cert) = std::env::var("SPGOV_TLS_CERT") {
            let key = std::env::var("SPGOV_TLS_KEY").unwrap_or_default();
            if !key.is_empty() {
                self.server.tls = Some(TlsConfig {
                    cert_file: PathBuf::from(cert),
                    key_file: PathBuf::from(key),
                    min_version: std::env::var("SPGOV_TLS_MIN_VERSION")
                        .unwrap_or_else(|_| default_min_tls_version()),
                });
            }
        }

        if let Ok(dir) = std::env::var("SPGOV_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(dir));
        }
        if let Ok(serve) = std::env::var("SPGOV_SERVE_FRONTEND") {
            self.server.serve_frontend = serve.parse().unwrap_or(true);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 characters long");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if let Some(ref admin) = self.auth.bootstrap_admin {
            if admin.password.len() < self.auth.password_min_length {
                anyhow::bail!(
                    "Bootstrap admin password must be at least {} characters long",
                    self.auth.password_min_length
                );
            }
        }

        if let Some(ref tls) = self.server.tls {
            if !tls.cert_file.exists() {
                anyhow::bail!("TLS certificate file not found: {:?}", tls.cert_file);
            }
            if !tls.key_file.exists() {
                anyhow::bail!("TLS key file not found: {:?}", tls.key_file);
            }
            if tls.min_version != "1.2" && tls.min_version != "1.3" {
                anyhow::bail!(
                    "Invalid TLS minimum version: {}. Must be '1.2' or '1.3'",
                    tls.min_version
                );
            }
        }

        let tf = &self.two_factor;
        if !(6..=8).contains(&tf.digits) {
            anyhow::bail!("two_factor.digits must be between 6 and 8");
        }
        if tf.period_secs == 0 {
            anyhow::bail!("two_factor.period_secs cannot be 0");
        }
        if tf.backup_code_count == 0 {
            anyhow::bail!("two_factor.backup_code_count cannot be 0");
        }

        let gov = &self.governance;
        if gov.inactive_warning_days > gov.inactive_critical_days {
            anyhow::bail!("governance.inactive_warning_days must not exceed inactive_critical_days");
        }
        if gov.storage_warning_percent > gov.storage_critical_percent {
            anyhow::bail!(
                "governance.storage_warning_percent must not exceed storage_critical_percent"
            );
        }
        if gov.review_period_days <= 0 {
            anyhow::bail!("governance.review_period_days must be positive");
        }

        if let Some(ref static_dir) = self.server.static_dir {
            if !static_dir.exists() {
                tracing::warn!(
                    "Static directory does not exist: {:?}. Frontend will not be served.",
                    static_dir
                );
            }
        }

        Ok(())
    }

    /// Write a configuration file holding the defaults
    pub fn create_default_config(path: &PathBuf) -> Result<()> {
        let config = AppConfig::default();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_norway::to_string(&config)?;
        std::fs::write(path, yaml)?;

        Ok(())
    }
}
