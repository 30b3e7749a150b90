use std::sync::Arc;

use chrono::{Duration, Utc};

use idman_backup::collector::IdentityCollector;
use idman_backup::storage::StorageEngine;
use idman_core::models::{RetentionPolicy, StorageLimit};
use idman_retention::engine::{RetentionManager, RetentionPeriod};
use idman_retention::usage::AlertLevel;
use test_fixtures::{user, MemoryDirectory, MemoryStorageBackend};

const INSTANCE: &str = "arn:aws:sso:us-east-1:123456789012:instance/ins-1";

/// Store one backup aged by `hours`, returning its id.
async fn store_aged(storage: &StorageEngine, hours: i64) -> String {
    let directory = Arc::new(MemoryDirectory::new().with_user(user("alice")));
    let mut backup = IdentityCollector::new(directory, INSTANCE)
        .collect_all()
        .await
        .unwrap();
    backup.metadata.timestamp = Utc::now() - Duration::hours(hours);
    storage.store(backup).await.unwrap()
}

fn policy(daily: usize, weekly: usize, monthly: usize, yearly: usize) -> RetentionPolicy {
    RetentionPolicy {
        keep_daily: daily,
        keep_weekly: weekly,
        keep_monthly: monthly,
        keep_yearly: yearly,
        auto_cleanup: false,
    }
}

#[test]
fn age_buckets_follow_the_period_rule() {
    assert_eq!(
        RetentionPeriod::for_age(Duration::hours(12)),
        RetentionPeriod::Daily
    );
    assert_eq!(
        RetentionPeriod::for_age(Duration::days(1)),
        RetentionPeriod::Daily
    );
    assert_eq!(
        RetentionPeriod::for_age(Duration::days(3)),
        RetentionPeriod::Weekly
    );
    assert_eq!(
        RetentionPeriod::for_age(Duration::days(7)),
        RetentionPeriod::Weekly
    );
    assert_eq!(
        RetentionPeriod::for_age(Duration::days(20)),
        RetentionPeriod::Monthly
    );
    assert_eq!(
        RetentionPeriod::for_age(Duration::days(400)),
        RetentionPeriod::Yearly
    );
}

// Daily bucket of four, keep three: exactly the oldest daily backup is
// deleted; the weekly bucket is trimmed to its two newest.
#[tokio::test]
async fn enforcement_keeps_the_newest_n_per_period() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    // Four daily-bucket backups (ages in hours) and four weekly-bucket
    // backups (ages in days).
    let daily_ids = [
        store_aged(&storage, 2).await,
        store_aged(&storage, 8).await,
        store_aged(&storage, 14).await,
        store_aged(&storage, 20).await,
    ];
    let weekly_ids = [
        store_aged(&storage, 2 * 24).await,
        store_aged(&storage, 3 * 24).await,
        store_aged(&storage, 4 * 24).await,
        store_aged(&storage, 5 * 24).await,
    ];

    let manager = RetentionManager::new(storage.clone());
    let result = manager.enforce(&policy(3, 2, 2, 1), false).await.unwrap();

    assert!(result.success);
    let deleted: std::collections::BTreeSet<_> =
        result.deleted_backups.iter().cloned().collect();
    // The 4th-newest daily and the two oldest weeklies go.
    assert!(deleted.contains(&daily_ids[3]));
    assert!(deleted.contains(&weekly_ids[2]));
    assert!(deleted.contains(&weekly_ids[3]));
    assert_eq!(deleted.len(), 3);

    // Kept backups are still retrievable.
    assert!(storage.retrieve(&daily_ids[0]).await.unwrap().is_some());
    assert!(storage.retrieve(&weekly_ids[1]).await.unwrap().is_some());
    assert!(storage.retrieve(&daily_ids[3]).await.unwrap().is_none());
}

// Monotonicity: no kept backup is older than a deleted one in the same
// period.
#[tokio::test]
async fn deletions_are_always_the_oldest_in_their_bucket() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    for hours in [1, 5, 9, 13, 17, 21] {
        store_aged(&storage, hours).await;
    }
    let manager = RetentionManager::new(storage.clone());
    let result = manager.enforce(&policy(2, 2, 2, 2), true).await.unwrap();

    let listed = storage.list(None).await.unwrap();
    let deleted: std::collections::BTreeSet<_> =
        result.deleted_backups.iter().cloned().collect();
    let kept_oldest = listed
        .iter()
        .filter(|m| !deleted.contains(&m.backup_id))
        .map(|m| m.timestamp)
        .min()
        .unwrap();
    let deleted_newest = listed
        .iter()
        .filter(|m| deleted.contains(&m.backup_id))
        .map(|m| m.timestamp)
        .max()
        .unwrap();
    assert!(kept_oldest > deleted_newest);
}

#[tokio::test]
async fn dry_run_reports_the_plan_but_deletes_nothing() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    for hours in [1, 5, 9, 13] {
        store_aged(&storage, hours).await;
    }
    let manager = RetentionManager::new(storage.clone());

    let dry = manager.enforce(&policy(3, 2, 2, 1), true).await.unwrap();
    assert!(dry.success);
    assert_eq!(dry.deleted_backups.len(), 1);
    let expected_bytes: u64 = {
        let listed = storage.list(None).await.unwrap();
        listed
            .iter()
            .filter(|m| dry.deleted_backups.contains(&m.backup_id))
            .map(|m| m.size_bytes)
            .sum()
    };
    assert_eq!(dry.freed_bytes, expected_bytes);
    assert!(expected_bytes > 0);
    // Nothing actually deleted.
    assert_eq!(storage.list(None).await.unwrap().len(), 4);

    let live = manager.enforce(&policy(3, 2, 2, 1), false).await.unwrap();
    assert_eq!(live.deleted_backups, dry.deleted_backups);
    assert_eq!(storage.list(None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn under_quota_buckets_are_untouched() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    store_aged(&storage, 2).await;
    store_aged(&storage, 50).await;
    let manager = RetentionManager::new(storage.clone());
    let result = manager
        .enforce(&RetentionPolicy::default(), false)
        .await
        .unwrap();
    assert!(result.success);
    assert!(result.deleted_backups.is_empty());
    assert_eq!(storage.list(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn usage_accounts_by_period() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    store_aged(&storage, 2).await;
    store_aged(&storage, 8).await;
    store_aged(&storage, 3 * 24).await;
    store_aged(&storage, 40 * 24).await;

    let manager = RetentionManager::new(storage);
    let usage = manager.storage_usage().await.unwrap();
    assert_eq!(usage.total_backup_count, 4);
    assert_eq!(usage.count_by_period["daily"], 2);
    assert_eq!(usage.count_by_period["weekly"], 1);
    assert_eq!(usage.count_by_period["yearly"], 1);
    assert!(usage.total_size_bytes > 0);
    assert!(usage.oldest_backup.unwrap() < usage.newest_backup.unwrap());
}

#[tokio::test]
async fn limit_alerts_escalate_from_warning_to_critical() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    store_aged(&storage, 1).await;
    let usage = RetentionManager::new(storage.clone())
        .storage_usage()
        .await
        .unwrap();

    // Limit sized so current usage sits between warning and critical.
    let warn_limits = StorageLimit {
        max_size_bytes: Some(usage.total_size_bytes * 100 / 85),
        max_backup_count: None,
        warning_threshold_percent: 80.0,
        critical_threshold_percent: 95.0,
    };
    let alerts = RetentionManager::new(storage.clone())
        .with_limits(warn_limits)
        .check_storage_limits()
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Warning);
    assert!(!alerts[0].recommended_action.is_empty());

    let critical_limits = StorageLimit {
        max_size_bytes: Some(usage.total_size_bytes),
        max_backup_count: Some(1),
        warning_threshold_percent: 80.0,
        critical_threshold_percent: 95.0,
    };
    let alerts = RetentionManager::new(storage)
        .with_limits(critical_limits)
        .check_storage_limits()
        .await
        .unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|a| a.level == AlertLevel::Critical));
}

#[tokio::test]
async fn recommendations_follow_usage_patterns() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    // Four daily backups against keep_daily = 2 exceeds the 1.5x bar.
    for hours in [1, 5, 9, 13] {
        store_aged(&storage, hours).await;
    }
    let manager = RetentionManager::new(storage).with_limits(StorageLimit {
        max_backup_count: Some(4),
        ..Default::default()
    });
    let recommendations = manager.recommendations(&policy(2, 2, 2, 1)).await.unwrap();
    let kinds: Vec<&str> = recommendations.iter().map(|r| r.kind.as_str()).collect();
    assert!(kinds.contains(&"reduce_daily"));
    assert!(kinds.contains(&"immediate_cleanup"));
}

#[tokio::test]
async fn comparison_matches_the_similarity_properties() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    let a = store_aged(&storage, 1).await;
    let b = store_aged(&storage, 5).await;
    let manager = RetentionManager::new(storage);

    let self_compare = manager.compare(&a, &a).await.unwrap();
    assert_eq!(self_compare.similarity_score, 1.0);
    assert_eq!(self_compare.size_difference, 0);

    let cross = manager.compare(&a, &b).await.unwrap();
    assert_eq!(cross.similarity_score, 1.0);
    assert_eq!(cross.resource_changes["users"].difference, 0);

    assert!(manager.compare(&a, "backup-missing").await.is_err());
}
