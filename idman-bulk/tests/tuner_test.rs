use std::time::Duration;

use idman_bulk::executor::BulkOperation;
use idman_bulk::tuner::{PerformanceConfig, PerformanceTuner};

#[test]
fn small_inputs_match_account_count() {
    let config = PerformanceTuner::config_for(5, BulkOperation::Assign);
    assert!(config.max_concurrent_accounts <= 15);
    assert_eq!(config.batch_size, 5);
    assert_eq!(config.rate_limit_delay, Duration::from_millis(100));
}

#[test]
fn medium_inputs_use_the_middle_bucket() {
    let config = PerformanceTuner::config_for(30, BulkOperation::Assign);
    assert_eq!(config.max_concurrent_accounts, 25);
    assert!(config.batch_size <= 50);
    assert_eq!(config.rate_limit_delay, Duration::from_millis(50));
}

#[test]
fn large_inputs_use_the_top_bucket() {
    let config = PerformanceTuner::config_for(100, BulkOperation::Assign);
    assert_eq!(config.max_concurrent_accounts, 30);
    assert_eq!(config.batch_size, 50);
    assert_eq!(config.rate_limit_delay, Duration::from_millis(20));
}

#[test]
fn revoke_is_at_least_as_aggressive_as_assign() {
    for count in [3, 10, 30, 50, 80] {
        let assign = PerformanceTuner::config_for(count, BulkOperation::Assign);
        let revoke = PerformanceTuner::config_for(count, BulkOperation::Revoke);
        assert!(revoke.max_concurrent_accounts >= assign.max_concurrent_accounts);
        assert!(revoke.rate_limit_delay <= assign.rate_limit_delay);
    }
}

#[test]
fn defaults_are_the_middle_preset() {
    let config = PerformanceConfig::default();
    assert_eq!(config.max_concurrent_accounts, 25);
    assert_eq!(config.batch_size, 50);
    assert_eq!(config.max_retries, 2);
    assert_eq!(config.item_timeout, Duration::from_secs(60));
}
