use std::collections::BTreeMap;
use std::sync::Arc;

use idman_backup::collector::IdentityCollector;
use idman_core::models::{PrincipalType, ResourceMapping};
use idman_restore::mapping::apply_resource_mappings;
use test_fixtures::{account, assignment, permission_set, user, MemoryDirectory};

const INSTANCE: &str = "arn:aws:sso:us-east-1:123456789012:instance/ins-1";

async fn source_backup() -> idman_core::models::BackupData {
    let permission_set_arn =
        "arn:aws:sso:us-east-1:123456789012:permissionSet/ins-1/ps-1".to_string();
    let mut ps = permission_set("ReadOnlyAccess");
    ps.permission_set_arn = permission_set_arn.clone();
    let directory = Arc::new(
        MemoryDirectory::new()
            .with_user(user("alice"))
            .with_permission_set(ps)
            .with_account(account("123456789012", "Prod"))
            .with_assignment(assignment(
                "123456789012",
                &permission_set_arn,
                PrincipalType::User,
                "u-alice",
            )),
    );
    IdentityCollector::new(directory, INSTANCE)
        .collect_all()
        .await
        .unwrap()
}

fn mapping() -> ResourceMapping {
    ResourceMapping {
        source_account_id: "123456789012".to_string(),
        target_account_id: "234567890123".to_string(),
        source_region: Some("us-east-1".to_string()),
        target_region: Some("eu-west-1".to_string()),
        permission_set_name_map: BTreeMap::from([(
            "ReadOnlyAccess".to_string(),
            "ReadOnlyAccess-EU".to_string(),
        )]),
    }
}

#[tokio::test]
async fn mappings_rewrite_arns_accounts_and_names() {
    let original = source_backup().await;
    let mapped = apply_resource_mappings(&original, &[mapping()]);

    let ps = &mapped.permission_sets[0];
    assert_eq!(ps.name, "ReadOnlyAccess-EU");
    assert!(ps.permission_set_arn.contains("234567890123"));
    assert!(ps.permission_set_arn.contains("eu-west-1"));

    let assignment = &mapped.assignments[0];
    assert_eq!(assignment.account_id, "234567890123");
    assert!(assignment.permission_set_arn.contains("eu-west-1"));

    assert_eq!(mapped.metadata.source_account, "234567890123");
    assert_eq!(mapped.metadata.source_region, "eu-west-1");
    assert!(mapped.verify_integrity());
}

#[tokio::test]
async fn the_original_backup_is_untouched() {
    let original = source_backup().await;
    let checksum = original.metadata.checksum.clone();
    let _mapped = apply_resource_mappings(&original, &[mapping()]);

    assert_eq!(original.metadata.source_account, "123456789012");
    assert_eq!(original.assignments[0].account_id, "123456789012");
    assert_eq!(original.metadata.checksum, checksum);
    assert!(original.verify_integrity());
}

#[tokio::test]
async fn unmapped_fields_pass_through() {
    let original = source_backup().await;
    let other = ResourceMapping {
        source_account_id: "999999999999".to_string(),
        target_account_id: "888888888888".to_string(),
        source_region: None,
        target_region: None,
        permission_set_name_map: BTreeMap::new(),
    };
    let mapped = apply_resource_mappings(&original, &[other]);
    assert_eq!(mapped.assignments[0].account_id, "123456789012");
    assert_eq!(mapped.permission_sets[0].name, "ReadOnlyAccess");
}

#[tokio::test]
async fn empty_mappings_are_a_plain_copy() {
    let original = source_backup().await;
    let mapped = apply_resource_mappings(&original, &[]);
    assert_eq!(mapped, original);
}
