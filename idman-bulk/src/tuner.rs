//! Input-size-keyed performance presets for the batch executor.

use std::time::Duration;

use idman_core::constants::DEFAULT_ITEM_TIMEOUT_SECS;

use crate::executor::BulkOperation;

/// Executor tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceConfig {
    pub max_concurrent_accounts: usize,
    pub batch_size: usize,
    pub rate_limit_delay: Duration,
    pub item_timeout: Duration,
    pub max_retries: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_accounts: 25,
            batch_size: 50,
            rate_limit_delay: Duration::from_millis(50),
            item_timeout: Duration::from_secs(DEFAULT_ITEM_TIMEOUT_SECS),
            max_retries: 2,
        }
    }
}

/// Selects a preset from the number of distinct accounts in the input.
///
/// Buckets: up to 10 accounts, 11 to 50, and above 50. Revoke runs get
/// the more aggressive setting of the two adjacent buckets.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerformanceTuner;

impl PerformanceTuner {
    pub fn config_for(account_count: usize, operation: BulkOperation) -> PerformanceConfig {
        let base = Self::bucket_config(account_count);
        match operation {
            BulkOperation::Assign => base,
            BulkOperation::Revoke => {
                let next = Self::bucket_config(Self::next_bucket_count(account_count));
                PerformanceConfig {
                    max_concurrent_accounts: base
                        .max_concurrent_accounts
                        .max(next.max_concurrent_accounts),
                    batch_size: base.batch_size.max(next.batch_size),
                    rate_limit_delay: base.rate_limit_delay.min(next.rate_limit_delay),
                    ..base
                }
            }
        }
    }

    fn bucket_config(account_count: usize) -> PerformanceConfig {
        let count = account_count.max(1);
        if count <= 10 {
            PerformanceConfig {
                max_concurrent_accounts: count.min(15),
                batch_size: count,
                rate_limit_delay: Duration::from_millis(100),
                ..PerformanceConfig::default()
            }
        } else if count <= 50 {
            PerformanceConfig {
                max_concurrent_accounts: 25,
                batch_size: count.min(50),
                rate_limit_delay: Duration::from_millis(50),
                ..PerformanceConfig::default()
            }
        } else {
            PerformanceConfig {
                max_concurrent_accounts: 30,
                batch_size: 50,
                rate_limit_delay: Duration::from_millis(20),
                ..PerformanceConfig::default()
            }
        }
    }

    /// A representative count one bucket up, used for revoke presets.
    fn next_bucket_count(account_count: usize) -> usize {
        if account_count <= 10 {
            account_count.max(1) + 10
        } else if account_count <= 50 {
            51
        } else {
            account_count
        }
    }
}
