//! Storage usage accounting, limit alerts, and policy recommendations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use idman_core::models::{BackupMetadata, RetentionPolicy, StorageLimit};

use crate::engine::RetentionPeriod;

/// Aggregate usage over the stored backups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageUsage {
    pub total_size_bytes: u64,
    pub total_backup_count: usize,
    pub size_by_period: BTreeMap<String, u64>,
    pub count_by_period: BTreeMap<String, usize>,
    pub oldest_backup: Option<DateTime<Utc>>,
    pub newest_backup: Option<DateTime<Utc>>,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// One limit-monitoring alert, always with a recommended action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageAlert {
    pub level: AlertLevel,
    pub message: String,
    pub threshold_exceeded: Option<f64>,
    pub recommended_action: String,
}

/// One retention-policy recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: String,
    pub message: String,
    pub impact: String,
}

/// Compute usage statistics from a listing.
pub fn usage_from(backups: &[BackupMetadata], now: DateTime<Utc>) -> StorageUsage {
    let mut usage = StorageUsage {
        total_backup_count: backups.len(),
        ..Default::default()
    };
    for backup in backups {
        usage.total_size_bytes += backup.size_bytes;
        if usage
            .oldest_backup
            .map(|t| backup.timestamp < t)
            .unwrap_or(true)
        {
            usage.oldest_backup = Some(backup.timestamp);
        }
        if usage
            .newest_backup
            .map(|t| backup.timestamp > t)
            .unwrap_or(true)
        {
            usage.newest_backup = Some(backup.timestamp);
        }
        let period = RetentionPeriod::for_age(now.signed_duration_since(backup.timestamp));
        *usage.size_by_period.entry(period.to_string()).or_default() += backup.size_bytes;
        *usage.count_by_period.entry(period.to_string()).or_default() += 1;
    }
    usage
}

/// Evaluate usage against the configured limits.
///
/// Size crossings of the warning/critical thresholds alert at those
/// levels; a count at 90% of the maximum warns, at the maximum is
/// critical.
pub fn alerts_for(usage: &StorageUsage, limits: &StorageLimit) -> Vec<StorageAlert> {
    let mut alerts = Vec::new();

    if let Some(max_size) = limits.max_size_bytes {
        if max_size > 0 {
            let percent = (usage.total_size_bytes as f64 / max_size as f64) * 100.0;
            if percent >= limits.critical_threshold_percent {
                alerts.push(StorageAlert {
                    level: AlertLevel::Critical,
                    message: format!("storage usage critical: {percent:.1}% of limit"),
                    threshold_exceeded: Some(percent),
                    recommended_action:
                        "immediate cleanup required, consider reducing retention periods"
                            .to_string(),
                });
            } else if percent >= limits.warning_threshold_percent {
                alerts.push(StorageAlert {
                    level: AlertLevel::Warning,
                    message: format!("storage usage warning: {percent:.1}% of limit"),
                    threshold_exceeded: Some(percent),
                    recommended_action:
                        "consider running cleanup or adjusting the retention policy".to_string(),
                });
            }
        }
    }

    if let Some(max_count) = limits.max_backup_count {
        if max_count > 0 {
            if usage.total_backup_count >= max_count {
                alerts.push(StorageAlert {
                    level: AlertLevel::Critical,
                    message: format!("backup count limit reached: {}", usage.total_backup_count),
                    threshold_exceeded: None,
                    recommended_action:
                        "delete old backups or increase the backup count limit".to_string(),
                });
            } else if usage.total_backup_count as f64 >= max_count as f64 * 0.9 {
                alerts.push(StorageAlert {
                    level: AlertLevel::Warning,
                    message: format!(
                        "approaching backup count limit: {}",
                        usage.total_backup_count
                    ),
                    threshold_exceeded: None,
                    recommended_action: "monitor backup count and consider cleanup".to_string(),
                });
            }
        }
    }

    alerts
}

/// Derive policy recommendations from usage and active alerts.
pub fn recommendations_for(
    usage: &StorageUsage,
    alerts: &[StorageAlert],
    policy: &RetentionPolicy,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    if usage.total_backup_count == 0 {
        return recommendations;
    }
    let average_size = usage.total_size_bytes / usage.total_backup_count as u64;

    let daily = usage.count_by_period.get("daily").copied().unwrap_or(0);
    if daily as f64 > policy.keep_daily as f64 * 1.5 {
        let suggested = (daily / 2).max(1);
        recommendations.push(Recommendation {
            kind: "reduce_daily".to_string(),
            message: format!(
                "consider reducing daily retention from {} to {suggested}",
                policy.keep_daily
            ),
            impact: format!(
                "would free approximately {} bytes",
                (daily.saturating_sub(suggested)) as u64 * average_size
            ),
        });
    }

    if alerts.iter().any(|a| a.level == AlertLevel::Critical) {
        recommendations.push(Recommendation {
            kind: "immediate_cleanup".to_string(),
            message: "immediate cleanup required: critical storage alerts are active".to_string(),
            impact: "prevents storage exhaustion".to_string(),
        });
    }

    let yearly = usage.count_by_period.get("yearly").copied().unwrap_or(0);
    if yearly > policy.keep_yearly * 2 {
        recommendations.push(Recommendation {
            kind: "archive_yearly".to_string(),
            message: "consider archiving very old backups to cheaper storage".to_string(),
            impact: "reduces primary storage cost".to_string(),
        });
    }

    recommendations
}
