use std::sync::Arc;

use idman_bulk::ingest::BulkOperationRecord;
use idman_bulk::resolver::ResourceResolver;
use idman_core::models::PrincipalType;
use test_fixtures::{account, group, permission_set, user, MemoryDirectory};

fn record(principal: &str, kind: PrincipalType) -> BulkOperationRecord {
    BulkOperationRecord {
        principal_name: principal.to_string(),
        permission_set_name: "ReadOnlyAccess".to_string(),
        account_name: "Prod".to_string(),
        principal_type: kind,
        line_number: Some(2),
    }
}

fn directory() -> Arc<MemoryDirectory> {
    Arc::new(
        MemoryDirectory::new()
            .with_user(user("alice"))
            .with_group(group("devs", &["alice"]))
            .with_permission_set(permission_set("ReadOnlyAccess"))
            .with_account(account("123456789012", "Prod")),
    )
}

#[tokio::test]
async fn repeated_lookups_issue_one_directory_call() {
    let directory = directory();
    let resolver = ResourceResolver::new(directory.clone());
    for _ in 0..5 {
        let id = resolver
            .resolve_principal("alice", PrincipalType::User)
            .await
            .unwrap();
        assert_eq!(id, "u-alice");
    }
    assert_eq!(directory.call_count("find_user_by_name"), 1);
}

#[tokio::test]
async fn negative_lookups_are_cached() {
    let directory = directory();
    let resolver = ResourceResolver::new(directory.clone());
    for _ in 0..3 {
        assert!(resolver
            .resolve_principal("bob", PrincipalType::User)
            .await
            .is_err());
    }
    assert_eq!(directory.call_count("find_user_by_name:bob"), 1);
}

#[tokio::test]
async fn warm_cache_avoids_per_record_lookups() {
    let directory = directory();
    let resolver = ResourceResolver::new(directory.clone());
    let records = vec![record("alice", PrincipalType::User)];
    resolver.warm_cache_for(&records).await.unwrap();

    let resolved = resolver.resolve_assignment(&records[0]).await;
    assert!(resolved.success());
    assert_eq!(resolved.principal_id.as_deref(), Some("u-alice"));
    assert_eq!(
        resolved.account_id.as_deref(),
        Some("123456789012")
    );
    assert_eq!(directory.call_count("find_user_by_name"), 0);
    assert_eq!(directory.call_count("find_permission_set_by_name"), 0);
}

#[tokio::test]
async fn group_records_resolve_to_group_ids() {
    let resolver = ResourceResolver::new(directory());
    let resolved = resolver
        .resolve_assignment(&record("devs", PrincipalType::Group))
        .await;
    assert!(resolved.success());
    assert_eq!(resolved.principal_id.as_deref(), Some("g-devs"));
    let assignment = resolved.to_assignment().unwrap();
    assert_eq!(assignment.principal_type, PrincipalType::Group);
}

#[tokio::test]
async fn lookup_is_case_sensitive() {
    let resolver = ResourceResolver::new(directory());
    assert!(resolver
        .resolve_principal("Alice", PrincipalType::User)
        .await
        .is_err());
}

#[tokio::test]
async fn failed_fields_carry_the_case_sensitivity_hint() {
    let resolver = ResourceResolver::new(directory());
    let resolved = resolver
        .resolve_assignment(&record("bob", PrincipalType::User))
        .await;
    assert!(!resolved.success());
    assert_eq!(resolved.resolution_errors.len(), 1);
    assert!(resolved.resolution_errors[0].contains("bob"));
    assert!(resolved.resolution_errors[0]
        .contains("Verify names match exactly (case-sensitive)"));
}

#[tokio::test]
async fn concurrent_misses_collapse_to_one_fetch() {
    let directory = directory();
    let resolver = Arc::new(ResourceResolver::new(directory.clone()));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let resolver = Arc::clone(&resolver);
        handles.push(tokio::spawn(async move {
            resolver
                .resolve_permission_set("ReadOnlyAccess")
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(directory.call_count("find_permission_set_by_name"), 1);
}
