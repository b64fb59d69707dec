//! Business logic services

pub mod access_review;
pub mod audit_reporting;
pub mod auth;
pub mod dashboard;
pub mod retention;
pub mod site_health;
pub mod storage_analytics;
pub mod totp;
pub mod two_factor;
pub mod version_management;

pub use access_review::{AccessReviewError, AccessReviewService};
pub use audit_reporting::{AuditExport, AuditReportError, AuditReportingService};
pub use auth::AuthService;
pub use dashboard::DashboardService;
pub use retention::{RetentionError, RetentionService};
pub use site_health::assess_site_health;
pub use storage_analytics::StorageAnalyticsService;
pub use two_factor::{LoginCheck, SecondFactor, TwoFactorError, TwoFactorService};
pub use version_management::VersionManagementService;
