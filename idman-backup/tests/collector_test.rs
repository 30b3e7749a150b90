use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use idman_backup::collector::{IDirectoryFactory, IdentityCollector};
use idman_core::errors::{IdmanResult, PermissionError};
use idman_core::models::{BackupType, CrossAccountConfig, PrincipalType};
use idman_core::traits::IDirectory;
use test_fixtures::{account, assignment, group, permission_set, user, MemoryDirectory};

const INSTANCE: &str = "arn:aws:sso:us-east-1:123456789012:instance/ins-1";
const PS_ARN: &str = "arn:aws:sso:::permissionSet/ins-1/ps-ReadOnlyAccess";

fn directory() -> Arc<MemoryDirectory> {
    Arc::new(
        MemoryDirectory::new()
            .with_user(user("alice"))
            .with_user(user("bob"))
            .with_group(group("devs", &["alice", "bob"]))
            .with_permission_set(permission_set("ReadOnlyAccess"))
            .with_account(account("123456789012", "Prod"))
            .with_assignment(assignment(
                "123456789012",
                PS_ARN,
                PrincipalType::Group,
                "g-devs",
            )),
    )
}

#[tokio::test]
async fn full_collection_captures_and_seals_everything() {
    let collector = IdentityCollector::new(directory(), INSTANCE);
    let backup = collector.collect_all().await.unwrap();

    assert_eq!(backup.users.len(), 2);
    assert_eq!(backup.groups.len(), 1);
    assert_eq!(backup.permission_sets.len(), 1);
    assert_eq!(backup.assignments.len(), 1);
    assert_eq!(backup.metadata.source_account, "123456789012");
    assert_eq!(backup.metadata.source_region, "us-east-1");
    assert_eq!(backup.metadata.resource_counts["users"], 2);
    assert!(backup.verify_integrity());
    assert_eq!(
        backup.relationships.group_members["g-devs"],
        vec!["u-alice", "u-bob"]
    );
}

#[tokio::test]
async fn incremental_collection_filters_by_modification_stamp() {
    let now = Utc::now();
    let mut stale = user("old");
    stale.last_modified = Some(now - Duration::days(10));
    let mut fresh = user("new");
    fresh.last_modified = Some(now - Duration::hours(1));
    let directory = Arc::new(
        MemoryDirectory::new()
            .with_user(stale)
            .with_user(fresh)
            .with_assignment(assignment(
                "123456789012",
                PS_ARN,
                PrincipalType::User,
                "u-new",
            )),
    );

    let collector = IdentityCollector::new(directory, INSTANCE);
    let backup = collector
        .collect_incremental(now - Duration::days(1))
        .await
        .unwrap();

    assert_eq!(backup.metadata.backup_type, BackupType::Incremental);
    assert_eq!(backup.users.len(), 1);
    assert_eq!(backup.users[0].user_name, "new");
    // Assignments carry no stamp and are always captured.
    assert_eq!(backup.assignments.len(), 1);
    assert!(backup.verify_integrity());
}

#[tokio::test]
async fn connection_validation_lists_missing_capabilities() {
    let directory = directory();
    directory.fail_times(
        "list_users",
        PermissionError::AccessDenied {
            operation: "list_users".to_string(),
        }
        .into(),
        1,
    );
    let collector = IdentityCollector::new(directory, INSTANCE);
    let issues = collector.validate_connection().await;
    assert!(!issues.is_valid);
    assert!(issues.errors[0].contains("list_users"));
}

struct FixedFactory {
    healthy: Arc<MemoryDirectory>,
}

#[async_trait]
impl IDirectoryFactory for FixedFactory {
    async fn directory_for(
        &self,
        config: &CrossAccountConfig,
    ) -> IdmanResult<Arc<dyn IDirectory>> {
        if config.target_account_id == "999999999999" {
            return Err(PermissionError::CrossAccountAccessDenied {
                account_id: config.target_account_id.clone(),
                role_arn: config.role_arn.clone(),
            }
            .into());
        }
        Ok(self.healthy.clone())
    }
}

#[tokio::test]
async fn cross_account_collection_maps_accounts_and_collects_errors() {
    let factory = FixedFactory {
        healthy: directory(),
    };
    let configs = vec![
        CrossAccountConfig {
            target_account_id: "234567890123".to_string(),
            role_arn: "arn:aws:iam::234567890123:role/backup".to_string(),
            external_id: None,
            target_region: Some("eu-west-1".to_string()),
        },
        CrossAccountConfig {
            target_account_id: "999999999999".to_string(),
            role_arn: "arn:aws:iam::999999999999:role/backup".to_string(),
            external_id: Some("ext".to_string()),
            target_region: None,
        },
    ];
    let collection =
        IdentityCollector::collect_cross_account(&factory, INSTANCE, &configs).await;

    assert_eq!(collection.backups.len(), 1);
    let backup = &collection.backups["234567890123"];
    assert_eq!(backup.metadata.source_account, "234567890123");
    assert_eq!(backup.metadata.source_region, "eu-west-1");
    assert!(backup.verify_integrity());
    assert_eq!(collection.errors.len(), 1);
    assert!(collection.errors[0].contains("999999999999"));
}

#[tokio::test]
async fn collection_propagates_directory_failures() {
    let directory = directory();
    directory.fail_times(
        "list_groups",
        PermissionError::AccessDenied {
            operation: "list_groups".to_string(),
        }
        .into(),
        1,
    );
    let collector = IdentityCollector::new(directory, INSTANCE);
    assert!(collector.collect_all().await.is_err());
}

#[tokio::test]
async fn empty_directory_still_seals() {
    let collector = IdentityCollector::new(Arc::new(MemoryDirectory::new()), INSTANCE);
    let backup = collector.collect_all().await.unwrap();
    assert_eq!(backup.total_resources(), 0);
    assert!(backup.verify_integrity());
}
