use std::collections::BTreeMap;

use idman_core::models::{
    AssignmentData, BackupData, BackupMetadata, GroupData, PermissionSetData, PrincipalType,
    UserData,
};

fn make_user(name: &str, email: Option<&str>) -> UserData {
    UserData {
        user_id: format!("u-{name}"),
        user_name: name.to_string(),
        display_name: Some(format!("User {name}")),
        email: email.map(str::to_string),
        given_name: Some("Given\nName".to_string()),
        family_name: Some("Family".to_string()),
        active: true,
        external_ids: BTreeMap::from([("scim".to_string(), format!("ext-{name}"))]),
        last_modified: None,
    }
}

fn make_backup() -> BackupData {
    let mut backup = BackupData::new(BackupMetadata::new(
        "arn:aws:sso:::instance/ins-1",
        "123456789012",
        "us-east-1",
    ));
    backup.users = vec![make_user("alice", Some("alice@example.com")), make_user("bob", None)];
    backup.groups = vec![GroupData {
        group_id: "g-devs".to_string(),
        display_name: "devs".to_string(),
        description: Some("Developers".to_string()),
        members: vec!["u-alice".to_string(), "u-bob".to_string()],
        last_modified: None,
    }];
    backup.permission_sets = vec![PermissionSetData {
        permission_set_arn: "arn:aws:sso:::permissionSet/ins-1/ps-1".to_string(),
        name: "ReadOnlyAccess".to_string(),
        description: None,
        session_duration: Some("PT1H".to_string()),
        relay_state: None,
        inline_policy: None,
        managed_policies: vec!["arn:aws:iam::aws:policy/ReadOnlyAccess".to_string()],
        customer_managed_policies: vec![],
        permissions_boundary: None,
        last_modified: None,
    }];
    backup.assignments = vec![AssignmentData {
        account_id: "123456789012".to_string(),
        permission_set_arn: "arn:aws:sso:::permissionSet/ins-1/ps-1".to_string(),
        principal_type: PrincipalType::Group,
        principal_id: "g-devs".to_string(),
    }];
    backup.seal();
    backup
}

// Serialize/deserialize must preserve names, 4-tuples, and relationships.

#[test]
fn backup_round_trips_through_json() {
    let original = make_backup();
    let json = serde_json::to_string(&original).unwrap();
    let restored: BackupData = serde_json::from_str(&json).unwrap();

    let names: Vec<_> = restored.users.iter().map(|u| u.user_name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);
    assert_eq!(restored.groups[0].display_name, "devs");
    assert_eq!(restored.permission_sets[0].name, "ReadOnlyAccess");
    assert_eq!(
        restored.assignments[0].assignment_key(),
        original.assignments[0].assignment_key()
    );
    assert_eq!(
        restored.relationships.user_groups["u-alice"],
        vec!["g-devs"]
    );
    assert!(restored.verify_integrity());
}

#[test]
fn round_trip_preserves_embedded_newlines() {
    let original = make_backup();
    let json = serde_json::to_string(&original).unwrap();
    let restored: BackupData = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.users[0].given_name.as_deref(), Some("Given\nName"));
}

#[test]
fn integrity_matches_iff_checksum_matches() {
    let mut backup = make_backup();
    assert!(backup.verify_integrity());
    backup.metadata.checksum = "0".repeat(64);
    assert!(!backup.verify_integrity());
}

#[test]
fn unsealed_backup_fails_integrity() {
    let backup = BackupData::new(BackupMetadata::new(
        "arn:aws:sso:::instance/ins-1",
        "123456789012",
        "us-east-1",
    ));
    // No checksum yet.
    assert!(!backup.verify_integrity());
}
