//! Retention policy and storage limit configuration.

use serde::{Deserialize, Serialize};

/// How many backups to keep per age period.
///
/// A backup's period is derived from its age: up to one day old is daily,
/// up to a week weekly, up to thirty days monthly, older is yearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Backups kept in the daily bucket. Default: 7.
    pub keep_daily: usize,
    /// Backups kept in the weekly bucket. Default: 4.
    pub keep_weekly: usize,
    /// Backups kept in the monthly bucket. Default: 12.
    pub keep_monthly: usize,
    /// Backups kept in the yearly bucket. Default: 3.
    pub keep_yearly: usize,
    /// Whether enforcement runs automatically after each store. Default: false.
    pub auto_cleanup: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_daily: 7,
            keep_weekly: 4,
            keep_monthly: 12,
            keep_yearly: 3,
            auto_cleanup: false,
        }
    }
}

/// Limits monitored by the retention engine's storage checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageLimit {
    /// Maximum aggregate size in bytes; None disables the size check.
    pub max_size_bytes: Option<u64>,
    /// Maximum number of stored backups; None disables the count check.
    pub max_backup_count: Option<usize>,
    /// Percent of the size limit at which a WARNING alert fires. Default: 80.
    pub warning_threshold_percent: f64,
    /// Percent of the size limit at which a CRITICAL alert fires. Default: 95.
    pub critical_threshold_percent: f64,
}

impl Default for StorageLimit {
    fn default() -> Self {
        Self {
            max_size_bytes: None,
            max_backup_count: None,
            warning_threshold_percent: 80.0,
            critical_threshold_percent: 95.0,
        }
    }
}
