//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use super::error::AppError;

/// Absolute http(s) URL with a host part
static SITE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[A-Za-z0-9]([A-Za-z0-9.-]*[A-Za-z0-9])?(:\d{1,5})?(/[^\s]*)?$").unwrap()
});

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9._-]*$").unwrap());

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub const MAX_SITE_URL_LEN: usize = 2048;

/// Sharing capability values reported by SharePoint Online
pub const SHARING_CAPABILITIES: &[&str] = &[
    "Disabled",
    "ExternalUserSharingOnly",
    "ExternalUserAndGuestSharing",
    "ExistingExternalUserSharingOnly",
];

/// Validate a site collection URL
pub fn validate_site_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && url.len() <= MAX_SITE_URL_LEN && SITE_URL_REGEX.is_match(url)
}

/// Validate a sharing capability value (empty means "not reported")
pub fn validate_sharing_capability(value: &str) -> bool {
    value.is_empty() || SHARING_CAPABILITIES.contains(&value)
}

/// Validate a login name
pub fn validate_username(username: &str) -> bool {
    !username.is_empty() && username.len() <= 100 && USERNAME_REGEX.is_match(username)
}

/// Validate an email address
pub fn validate_email(email: &str) -> bool {
    email.len() <= 255 && EMAIL_REGEX.is_match(email)
}

/// Strip the separators users type into one-time codes
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Parse a path identifier, reporting a 400 on malformed input
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {} ID format", what)))
}
