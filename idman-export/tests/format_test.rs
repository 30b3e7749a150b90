use std::collections::BTreeMap;
use std::sync::Arc;

use idman_backup::collector::IdentityCollector;
use idman_core::models::{BackupData, PrincipalType};
use idman_export::convert;
use test_fixtures::{account, assignment, group, permission_set, user, MemoryDirectory};

const INSTANCE: &str = "arn:aws:sso:us-east-1:123456789012:instance/ins-1";
const PS_ARN: &str = "arn:aws:sso:::permissionSet/ins-1/ps-ReadOnlyAccess";

/// A backup whose scalar fields hold every character CSV escaping must
/// survive.
async fn awkward_backup() -> BackupData {
    let mut alice = user("alice");
    alice.display_name = Some("User \"with quotes\"".to_string());
    alice.given_name = Some("line one\nline two\nline three".to_string());
    alice.family_name = Some("tab\there, and a comma".to_string());
    alice.external_ids = BTreeMap::from([("scim".to_string(), "ext,\"x\"".to_string())]);

    let mut devs = group("devs", &["alice"]);
    devs.description = Some("multi\nline, \"desc\"".to_string());

    let directory = Arc::new(
        MemoryDirectory::new()
            .with_user(alice)
            .with_group(devs)
            .with_permission_set(permission_set("ReadOnlyAccess"))
            .with_account(account("123456789012", "Prod"))
            .with_assignment(assignment(
                "123456789012",
                PS_ARN,
                PrincipalType::User,
                "u-alice",
            )),
    );
    IdentityCollector::new(directory, INSTANCE)
        .collect_all()
        .await
        .unwrap()
}

fn assert_scalars_preserved(original: &BackupData, restored: &BackupData) {
    assert_eq!(restored.users[0].user_name, original.users[0].user_name);
    assert_eq!(
        restored.users[0].display_name,
        original.users[0].display_name
    );
    assert_eq!(restored.users[0].given_name, original.users[0].given_name);
    assert_eq!(
        restored.users[0].family_name,
        original.users[0].family_name
    );
    assert_eq!(
        restored.users[0].external_ids,
        original.users[0].external_ids
    );
    assert_eq!(
        restored.groups[0].description,
        original.groups[0].description
    );
    assert_eq!(
        restored.assignments[0].assignment_key(),
        original.assignments[0].assignment_key()
    );
    assert_eq!(
        restored.metadata.backup_id,
        original.metadata.backup_id
    );
    assert_eq!(restored.metadata.checksum, original.metadata.checksum);
}

#[tokio::test]
async fn json_dialect_round_trips() {
    let original = awkward_backup().await;
    let text = convert::to_json(&original, true).unwrap();
    let restored = convert::from_json(&text).unwrap();
    assert_scalars_preserved(&original, &restored);
    assert!(restored.verify_integrity());
}

#[tokio::test]
async fn yaml_dialect_round_trips() {
    let original = awkward_backup().await;
    let text = convert::to_yaml(&original).unwrap();
    let restored = convert::from_yaml(&text).unwrap();
    assert_scalars_preserved(&original, &restored);
    assert!(restored.verify_integrity());
}

#[tokio::test]
async fn csv_dialect_round_trips() {
    let original = awkward_backup().await;
    let tables = convert::to_csv(&original).unwrap();
    assert_eq!(tables.len(), 5);
    assert!(tables.contains_key("metadata"));

    let restored = convert::from_csv(&tables).unwrap();
    assert_scalars_preserved(&original, &restored);
    // Relationships are rebuilt from the tables.
    assert_eq!(
        restored.relationships.user_groups["u-alice"],
        vec!["g-devs"]
    );
}

#[tokio::test]
async fn csv_metadata_preserves_numeric_strings() {
    let original = awkward_backup().await;
    let tables = convert::to_csv(&original).unwrap();
    let restored = convert::from_csv(&tables).unwrap();
    // A 12-digit account id must stay a string, not become a number.
    assert_eq!(restored.metadata.source_account, "123456789012");
    assert_eq!(
        restored.metadata.size_bytes,
        original.metadata.size_bytes
    );
    assert_eq!(
        restored.metadata.resource_counts,
        original.metadata.resource_counts
    );
}

#[tokio::test]
async fn csv_requires_the_metadata_table() {
    let original = awkward_backup().await;
    let mut tables = convert::to_csv(&original).unwrap();
    tables.remove("metadata");
    assert!(convert::from_csv(&tables).is_err());
}

#[tokio::test]
async fn streaming_json_matches_the_plain_dialect() {
    let original = awkward_backup().await;
    let mut streamed = Vec::new();
    idman_export::stream::stream_json_export(&original, &mut streamed).unwrap();
    let restored = convert::from_json(std::str::from_utf8(&streamed).unwrap()).unwrap();
    assert_scalars_preserved(&original, &restored);
    assert!(restored.verify_integrity());
}
