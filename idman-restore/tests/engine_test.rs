use std::sync::Arc;

use idman_backup::collector::IdentityCollector;
use idman_backup::storage::StorageEngine;
use idman_core::errors::ExecutionError;
use idman_core::models::{ConflictStrategy, PrincipalType, ResourceType, RestoreOptions};
use idman_restore::engine::RestoreEngine;
use test_fixtures::{
    account, assignment, group, permission_set, user, MemoryDirectory, MemoryStorageBackend,
};

const INSTANCE: &str = "arn:aws:sso:us-east-1:123456789012:instance/ins-1";
const PS_ARN: &str = "arn:aws:sso:::permissionSet/ins-1/ps-ReadOnlyAccess";

fn source_directory() -> Arc<MemoryDirectory> {
    Arc::new(
        MemoryDirectory::new()
            .with_user(user("alice"))
            .with_group(group("devs", &["alice"]))
            .with_permission_set(permission_set("ReadOnlyAccess"))
            .with_account(account("123456789012", "Prod"))
            .with_assignment(assignment(
                "123456789012",
                PS_ARN,
                PrincipalType::User,
                "u-alice",
            )),
    )
}

/// Capture a backup of the source directory into a fresh storage engine.
async fn stored_backup(source: Arc<MemoryDirectory>) -> (Arc<StorageEngine>, String) {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    let backup = IdentityCollector::new(source, INSTANCE)
        .collect_all()
        .await
        .unwrap();
    let backup_id = storage.store(backup).await.unwrap();
    (storage, backup_id)
}

fn options(strategy: ConflictStrategy) -> RestoreOptions {
    RestoreOptions {
        conflict_strategy: strategy,
        ..Default::default()
    }
}

#[tokio::test]
async fn restore_into_an_empty_instance_creates_everything_in_order() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    let target = Arc::new(MemoryDirectory::new());
    let engine = RestoreEngine::new(target.clone(), storage);

    let result = engine
        .restore(&backup_id, &options(ConflictStrategy::Overwrite))
        .await
        .unwrap();

    assert!(result.success, "{result:?}");
    assert_eq!(result.changes_applied["users"], 1);
    assert_eq!(result.changes_applied["groups"], 1);
    assert_eq!(result.changes_applied["permission_sets"], 1);
    assert_eq!(result.changes_applied["assignments"], 1);
    assert_eq!(target.users().len(), 1);
    assert_eq!(target.assignments().len(), 1);

    // Strict phase ordering: each kind's create happens before the next
    // kind's first create.
    let log = target.call_log();
    let position = |prefix: &str| log.iter().position(|c| c.starts_with(prefix)).unwrap();
    assert!(position("create_user") < position("create_group"));
    assert!(position("create_group") < position("create_permission_set"));
    assert!(position("create_permission_set") < position("create_assignment"));
}

#[tokio::test]
async fn dry_run_counts_changes_without_touching_the_directory() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    let target = Arc::new(MemoryDirectory::new());
    let engine = RestoreEngine::new(target.clone(), storage);

    let mut opts = options(ConflictStrategy::Overwrite);
    opts.dry_run = true;
    let result = engine.restore(&backup_id, &opts).await.unwrap();

    assert!(result.success);
    assert_eq!(result.changes_applied["users"], 1);
    assert_eq!(target.mutating_call_count(), 0);
}

#[tokio::test]
async fn skip_strategy_records_warnings_and_no_journal_entries() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    // Target already has the user with a different email.
    let mut existing = user("alice");
    existing.email = Some("old@example.com".to_string());
    let target = Arc::new(MemoryDirectory::new().with_user(existing));
    let engine = RestoreEngine::new(target.clone(), storage);

    let mut opts = options(ConflictStrategy::Skip);
    opts.target_resources = vec![ResourceType::Users];
    let result = engine.restore(&backup_id, &opts).await.unwrap();

    assert!(result.success);
    assert_eq!(result.changes_applied["users"], 0);
    assert!(result.warnings.iter().any(|w| w.contains("skipped existing user: alice")));
    assert_eq!(target.call_count("update_user"), 0);

    let state = engine.states().get(&result.operation_id).unwrap();
    let state = state.lock().await;
    assert!(state.rollback_actions.is_empty());
    assert!(state.applied_changes.is_empty());
}

// Backup has alice with one email, the target another. OVERWRITE updates
// the user (journalling the prior value); a simulated hard failure in
// the assignments phase then rolls the email back.
#[tokio::test]
async fn overwrite_conflict_with_assignment_failure_rolls_back() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    let mut existing = user("alice");
    existing.email = Some("old@example.com".to_string());
    let target = Arc::new(
        MemoryDirectory::new()
            .with_user(existing)
            .with_account(account("123456789012", "Prod")),
    );
    target.fail_times(
        "create_assignment",
        ExecutionError::InvalidParameters {
            operation: "create_assignment".to_string(),
            reason: "simulated".to_string(),
        }
        .into(),
        1,
    );
    let engine = RestoreEngine::new(target.clone(), storage);

    let result = engine
        .restore(&backup_id, &options(ConflictStrategy::Overwrite))
        .await
        .unwrap();

    assert!(!result.success);
    let rollback = result.rollback.as_ref().expect("rollback expected");
    assert!(rollback.success, "{rollback:?}");
    // User update + group create + permission set create, all reverted.
    assert_eq!(rollback.applied_changes_reverted, 3);

    // The user's email is back to its prior value, and the resources
    // created mid-run are gone again.
    let users = target.users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].email.as_deref(), Some("old@example.com"));
    assert!(target.groups().is_empty());
    assert!(target.permission_sets().is_empty());
    assert!(target.assignments().is_empty());
}

// Property: rollback reverts exactly the applied changes, or reports
// per-change errors summing with successes to that count.
#[tokio::test]
async fn rollback_accounts_for_every_applied_change() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    let target = Arc::new(MemoryDirectory::new());
    target.fail_times(
        "create_assignment",
        ExecutionError::InvalidParameters {
            operation: "create_assignment".to_string(),
            reason: "simulated".to_string(),
        }
        .into(),
        1,
    );
    let engine = RestoreEngine::new(target.clone(), storage);

    let result = engine
        .restore(&backup_id, &options(ConflictStrategy::Overwrite))
        .await
        .unwrap();
    assert!(!result.success);
    let applied: usize = result.changes_applied.values().sum();
    let rollback = result.rollback.unwrap();
    assert_eq!(
        rollback.applied_changes_reverted + rollback.errors.len(),
        applied
    );
}

#[tokio::test]
async fn merge_strategy_skips_identical_users() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    // Identical copy of the backup's user.
    let target = Arc::new(MemoryDirectory::new().with_user(user("alice")));
    let engine = RestoreEngine::new(target.clone(), storage);

    let mut opts = options(ConflictStrategy::Merge);
    opts.target_resources = vec![ResourceType::Users];
    let result = engine.restore(&backup_id, &opts).await.unwrap();

    assert!(result.success);
    assert_eq!(result.changes_applied["users"], 0);
    assert_eq!(target.call_count("update_user"), 0);
}

#[tokio::test]
async fn resume_skips_checkpointed_phases() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    let target = Arc::new(MemoryDirectory::new());
    let engine = RestoreEngine::new(target.clone(), storage);

    let first = engine
        .restore(&backup_id, &options(ConflictStrategy::Overwrite))
        .await
        .unwrap();
    assert!(first.success);
    let creates_after_first = target.mutating_call_count();

    let resumed = engine
        .resume(
            &backup_id,
            &options(ConflictStrategy::Overwrite),
            &first.operation_id,
        )
        .await
        .unwrap();
    assert!(resumed.success);
    assert_eq!(
        resumed
            .warnings
            .iter()
            .filter(|w| w.contains("already checkpointed"))
            .count(),
        4
    );
    assert_eq!(target.mutating_call_count(), creates_after_first);
}

#[tokio::test]
async fn unknown_backups_fail_cleanly() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    let engine = RestoreEngine::new(Arc::new(MemoryDirectory::new()), storage);
    let result = engine
        .restore("backup-missing", &RestoreOptions::default())
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.message.contains("not found"));
    assert!(result.rollback.is_none());
}

#[tokio::test]
async fn target_resource_filter_limits_phases() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    let target = Arc::new(MemoryDirectory::new());
    let engine = RestoreEngine::new(target.clone(), storage);

    let mut opts = options(ConflictStrategy::Overwrite);
    opts.target_resources = vec![ResourceType::Users, ResourceType::Groups];
    let result = engine.restore(&backup_id, &opts).await.unwrap();

    assert!(result.success);
    assert!(result.changes_applied.contains_key("users"));
    assert!(!result.changes_applied.contains_key("permission_sets"));
    assert!(target.permission_sets().is_empty());
    assert!(target.assignments().is_empty());
}

#[tokio::test]
async fn preview_reports_counts_and_conflicts_without_writing() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    let mut existing = user("alice");
    existing.email = Some("old@example.com".to_string());
    let target = Arc::new(MemoryDirectory::new().with_user(existing));
    let engine = RestoreEngine::new(target.clone(), storage);

    let preview = engine
        .preview(&backup_id, &RestoreOptions::default())
        .await
        .unwrap();
    assert_eq!(preview.changes_summary["users"], 1);
    assert_eq!(preview.changes_summary["assignments"], 1);
    assert_eq!(preview.conflicts.len(), 1);
    assert_eq!(preview.conflicts[0].resource_id, "alice");
    assert_eq!(target.mutating_call_count(), 0);
    assert!(preview.estimated_duration_secs.unwrap() >= 8);
}

#[tokio::test]
async fn validate_compatibility_surface() {
    let (storage, backup_id) = stored_backup(source_directory()).await;
    let engine = RestoreEngine::new(Arc::new(MemoryDirectory::new()), storage);
    let issues = engine
        .validate_compatibility(&backup_id, INSTANCE)
        .await
        .unwrap();
    assert!(issues.is_valid);

    let missing = engine
        .validate_compatibility("backup-missing", INSTANCE)
        .await
        .unwrap();
    assert!(!missing.is_valid);
}
