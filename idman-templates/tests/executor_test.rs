use std::sync::Arc;

use idman_templates::executor::TemplateExecutor;
use idman_templates::models::{Template, TemplateAssignment, TemplateMetadata, TemplateTarget};
use test_fixtures::{account, group, permission_set, user, MemoryDirectory};

const INSTANCE: &str = "arn:aws:sso:us-east-1:123456789012:instance/ins-1";

fn directory() -> Arc<MemoryDirectory> {
    Arc::new(
        MemoryDirectory::new()
            .with_user(user("alice"))
            .with_group(group("devs", &["alice"]))
            .with_permission_set(permission_set("DevAccess"))
            .with_permission_set(permission_set("ReadOnly"))
            .with_account(account("123456789012", "Prod"))
            .with_account(account("234567890123", "Dev")),
    )
}

fn template() -> Template {
    Template {
        metadata: TemplateMetadata::new("developer-access"),
        assignments: vec![TemplateAssignment {
            entities: vec!["user:alice".to_string(), "group:devs".to_string()],
            permission_sets: vec!["DevAccess".to_string(), "ReadOnly".to_string()],
            targets: TemplateTarget {
                account_ids: Some(vec![
                    "123456789012".to_string(),
                    "234567890123".to_string(),
                ]),
                account_tags: None,
                exclude_accounts: None,
            },
        }],
    }
}

// 2 entities x 2 permission sets x 2 accounts = 8 concrete triples.
#[tokio::test]
async fn preview_reports_the_full_cross_product() {
    let executor = TemplateExecutor::new(directory(), INSTANCE);
    let preview = executor.preview(&template()).await.unwrap();
    assert_eq!(preview.total_assignments, 8);
    assert_eq!(preview.resolved_accounts.len(), 2);
    assert!(preview.entities.iter().all(|e| e.exists));
    assert!(preview.permission_sets.iter().all(|p| p.exists));
}

#[tokio::test]
async fn preview_issues_no_writes() {
    let directory = directory();
    let executor = TemplateExecutor::new(directory.clone(), INSTANCE);
    executor.preview(&template()).await.unwrap();
    assert_eq!(directory.mutating_call_count(), 0);
}

#[tokio::test]
async fn apply_creates_every_expanded_assignment() {
    let directory = directory();
    let executor = TemplateExecutor::new(directory.clone(), INSTANCE);
    let result = executor.apply(&template(), false).await.unwrap();
    assert!(result.success);
    assert_eq!(result.created.len(), 8);
    assert_eq!(result.failed.len(), 0);
    assert_eq!(directory.assignments().len(), 8);
}

#[tokio::test]
async fn apply_skips_existing_assignments() {
    let directory = directory();
    let executor = TemplateExecutor::new(directory.clone(), INSTANCE);
    executor.apply(&template(), false).await.unwrap();
    let rerun = executor.apply(&template(), false).await.unwrap();
    assert!(rerun.success);
    assert_eq!(rerun.created.len(), 0);
    assert_eq!(rerun.skipped.len(), 8);
    assert_eq!(directory.assignments().len(), 8);
}

#[tokio::test]
async fn dry_run_apply_touches_nothing() {
    let directory = directory();
    let executor = TemplateExecutor::new(directory.clone(), INSTANCE);
    let result = executor.apply(&template(), true).await.unwrap();
    assert!(result.success);
    assert_eq!(result.created.len(), 8);
    assert_eq!(directory.mutating_call_count(), 0);
    assert!(directory.assignments().is_empty());
}

#[tokio::test]
async fn invalid_templates_do_not_execute() {
    let directory = directory();
    let executor = TemplateExecutor::new(directory.clone(), INSTANCE);
    let mut bad = template();
    bad.assignments[0].entities = vec!["user:ghost".to_string()];
    let result = executor.apply(&bad, false).await.unwrap();
    assert!(!result.success);
    assert!(result
        .error_message
        .as_deref()
        .unwrap()
        .contains("entity not found"));
    assert_eq!(directory.mutating_call_count(), 0);
}
