//! Site health scoring

use chrono::{DateTime, Utc};

use crate::config::GovernanceConfig;
use crate::models::{SiteCollection, SiteHealth, SiteOwner};

const INACTIVE_CRITICAL_PENALTY: i32 = 30;
const INACTIVE_WARNING_PENALTY: i32 = 15;
const NO_ACTIVITY_PENALTY: i32 = 30;
const STORAGE_CRITICAL_PENALTY: i32 = 20;
const STORAGE_WARNING_PENALTY: i32 = 10;
const NO_PRIMARY_OWNER_PENALTY: i32 = 30;
const SINGLE_OWNER_PENALTY: i32 = 10;

/// Score a site from 100 down, one penalty per finding
pub fn assess_site_health(
    site: &SiteCollection,
    owners: &[SiteOwner],
    config: &GovernanceConfig,
    now: DateTime<Utc>,
) -> SiteHealth {
    let mut score = 100;
    let mut issues = Vec::new();

    let last_activity_days = site.last_activity.map(|ts| (now - ts).num_days());
    match last_activity_days {
        Some(days) if days > config.inactive_critical_days => {
            score -= INACTIVE_CRITICAL_PENALTY;
            issues.push(format!("No activity in {}+ days", config.inactive_critical_days));
        }
        Some(days) if days > config.inactive_warning_days => {
            score -= INACTIVE_WARNING_PENALTY;
            issues.push(format!("No activity in {}+ days", config.inactive_warning_days));
        }
        Some(_) => {}
        None => {
            score -= NO_ACTIVITY_PENALTY;
            issues.push("No activity data available".to_string());
        }
    }

    let usage = site.storage_usage_percent();
    if usage > config.storage_critical_percent {
        score -= STORAGE_CRITICAL_PENALTY;
        issues.push(format!("Storage usage >{}%", config.storage_critical_percent));
    } else if usage > config.storage_warning_percent {
        score -= STORAGE_WARNING_PENALTY;
        issues.push(format!("Storage usage >{}%", config.storage_warning_percent));
    }

    let has_primary_owner = owners.iter().any(|o| o.is_primary_owner);
    if !has_primary_owner {
        score -= NO_PRIMARY_OWNER_PENALTY;
        issues.push("No primary owner assigned".to_string());
    } else if owners.len() == 1 {
        score -= SINGLE_OWNER_PENALTY;
        issues.push("Only one owner (no redundancy)".to_string());
    }

    SiteHealth {
        site_id: site.id,
        site_name: site.title.clone(),
        health_score: score.clamp(0, 100),
        issues,
        storage_usage_percent: (usage * 100.0).round() / 100.0,
        owner_count: owners.len() as i64,
        has_primary_owner,
        last_activity_days,
    }
}
