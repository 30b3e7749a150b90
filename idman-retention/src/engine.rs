//! Retention enforcement: categorise by age, keep the newest N per
//! period, delete the rest.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use idman_backup::storage::StorageEngine;
use idman_core::errors::IdmanResult;
use idman_core::models::{BackupMetadata, RetentionPolicy, StorageLimit};
use idman_core::traits::{IProgressReporter, TracingProgressReporter};

use crate::compare::{compare_metadata, BackupComparison};
use crate::usage::{self, Recommendation, StorageAlert, StorageUsage};

/// Age bucket a backup falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RetentionPeriod {
    pub const ALL: [RetentionPeriod; 4] = [
        RetentionPeriod::Daily,
        RetentionPeriod::Weekly,
        RetentionPeriod::Monthly,
        RetentionPeriod::Yearly,
    ];

    /// Bucket for a backup of the given age: up to a day daily, up to a
    /// week weekly, up to thirty days monthly, older yearly.
    pub fn for_age(age: Duration) -> Self {
        if age <= Duration::days(1) {
            RetentionPeriod::Daily
        } else if age <= Duration::days(7) {
            RetentionPeriod::Weekly
        } else if age <= Duration::days(30) {
            RetentionPeriod::Monthly
        } else {
            RetentionPeriod::Yearly
        }
    }

    pub fn keep_count(&self, policy: &RetentionPolicy) -> usize {
        match self {
            RetentionPeriod::Daily => policy.keep_daily,
            RetentionPeriod::Weekly => policy.keep_weekly,
            RetentionPeriod::Monthly => policy.keep_monthly,
            RetentionPeriod::Yearly => policy.keep_yearly,
        }
    }
}

impl fmt::Display for RetentionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RetentionPeriod::Daily => "daily",
            RetentionPeriod::Weekly => "weekly",
            RetentionPeriod::Monthly => "monthly",
            RetentionPeriod::Yearly => "yearly",
        };
        write!(f, "{label}")
    }
}

/// Outcome of one enforcement pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupResult {
    pub success: bool,
    pub deleted_backups: Vec<String>,
    pub freed_bytes: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Retention over a storage engine.
pub struct RetentionManager {
    storage: Arc<StorageEngine>,
    limits: StorageLimit,
    progress: Arc<dyn IProgressReporter>,
}

impl RetentionManager {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            storage,
            limits: StorageLimit::default(),
            progress: Arc::new(TracingProgressReporter),
        }
    }

    pub fn with_limits(mut self, limits: StorageLimit) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn IProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Bucket backups by age, each bucket sorted newest first.
    pub fn categorize(
        backups: Vec<BackupMetadata>,
        now: DateTime<Utc>,
    ) -> BTreeMap<RetentionPeriod, Vec<BackupMetadata>> {
        let mut buckets: BTreeMap<RetentionPeriod, Vec<BackupMetadata>> =
            RetentionPeriod::ALL.iter().map(|p| (*p, Vec::new())).collect();
        for backup in backups {
            let age = now.signed_duration_since(backup.timestamp);
            buckets
                .entry(RetentionPeriod::for_age(age))
                .or_default()
                .push(backup);
        }
        for bucket in buckets.values_mut() {
            bucket.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }
        buckets
    }

    /// Backups past each period's keep count, i.e. everything but the
    /// newest `keep_<period>` per bucket.
    pub fn deletions_for(
        buckets: &BTreeMap<RetentionPeriod, Vec<BackupMetadata>>,
        policy: &RetentionPolicy,
    ) -> Vec<BackupMetadata> {
        let mut doomed = Vec::new();
        for (period, backups) in buckets {
            let keep = period.keep_count(policy);
            if backups.len() > keep {
                doomed.extend(backups[keep..].iter().cloned());
            }
        }
        doomed
    }

    /// Enforce the policy. Dry-run returns the plan without deleting;
    /// a live run deletes sequentially, aggregating errors instead of
    /// aborting on the first failure.
    pub async fn enforce(
        &self,
        policy: &RetentionPolicy,
        dry_run: bool,
    ) -> IdmanResult<CleanupResult> {
        let operation_id = format!("retention-{}", Utc::now().timestamp());
        self.progress
            .start_operation(&operation_id, 3, "enforcing retention policy")
            .await;

        let backups = self.storage.list(None).await?;
        tracing::info!(
            "retention: enforcing policy over {} backups (dry_run={dry_run})",
            backups.len()
        );
        self.progress
            .update_progress(
                &operation_id,
                1,
                Some(&format!("found {} backups", backups.len())),
            )
            .await;
        let buckets = Self::categorize(backups, Utc::now());
        let doomed = Self::deletions_for(&buckets, policy);
        self.progress
            .update_progress(
                &operation_id,
                2,
                Some(&format!("{} backups past retention", doomed.len())),
            )
            .await;

        let mut result = CleanupResult {
            success: true,
            ..Default::default()
        };
        for backup in doomed {
            if dry_run {
                tracing::info!("retention: would delete {}", backup.backup_id);
                result.deleted_backups.push(backup.backup_id);
                result.freed_bytes += backup.size_bytes;
                continue;
            }
            match self.storage.delete(&backup.backup_id).await {
                Ok(true) => {
                    result.deleted_backups.push(backup.backup_id);
                    result.freed_bytes += backup.size_bytes;
                }
                Ok(false) => result
                    .errors
                    .push(format!("failed to delete backup {}", backup.backup_id)),
                Err(error) => result
                    .errors
                    .push(format!("error deleting backup {}: {error}", backup.backup_id)),
            }
        }
        result.success = result.errors.is_empty();
        tracing::info!(
            "retention: {} deleted, {} bytes freed, {} errors",
            result.deleted_backups.len(),
            result.freed_bytes,
            result.errors.len()
        );
        self.progress
            .complete_operation(
                &operation_id,
                result.success,
                Some(&format!("{} backups deleted", result.deleted_backups.len())),
            )
            .await;
        Ok(result)
    }

    /// Current usage statistics.
    pub async fn storage_usage(&self) -> IdmanResult<StorageUsage> {
        let backups = self.storage.list(None).await?;
        Ok(usage::usage_from(&backups, Utc::now()))
    }

    /// Alerts for usage against the configured limits.
    pub async fn check_storage_limits(&self) -> IdmanResult<Vec<StorageAlert>> {
        let current = self.storage_usage().await?;
        Ok(usage::alerts_for(&current, &self.limits))
    }

    /// Policy recommendations from the current usage and alerts.
    pub async fn recommendations(
        &self,
        policy: &RetentionPolicy,
    ) -> IdmanResult<Vec<Recommendation>> {
        let current = self.storage_usage().await?;
        let alerts = usage::alerts_for(&current, &self.limits);
        Ok(usage::recommendations_for(&current, &alerts, policy))
    }

    /// Structured comparison between two stored backups.
    pub async fn compare(
        &self,
        source_backup_id: &str,
        target_backup_id: &str,
    ) -> IdmanResult<BackupComparison> {
        let source = self
            .storage
            .get_backup_metadata(source_backup_id)
            .await?
            .ok_or_else(|| idman_core::errors::StorageError::BackupNotFound {
                backup_id: source_backup_id.to_string(),
            })?;
        let target = self
            .storage
            .get_backup_metadata(target_backup_id)
            .await?
            .ok_or_else(|| idman_core::errors::StorageError::BackupNotFound {
                backup_id: target_backup_id.to_string(),
            })?;
        Ok(compare_metadata(&source, &target))
    }
}
