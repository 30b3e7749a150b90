use std::sync::Arc;

use idman_bulk::executor::BulkOperation;
use idman_bulk::ingest::BulkOperationRecord;
use idman_bulk::preview::{gate, summarize, PreviewDecision};
use idman_bulk::resolver::ResourceResolver;
use idman_core::models::{ConflictAction, ConflictInfo};
use idman_core::traits::{AutoPrompter, IPrompter};
use test_fixtures::{account, group, permission_set, user, MemoryDirectory};

struct DenyingPrompter;

impl IPrompter for DenyingPrompter {
    fn confirm(&self, _question: &str) -> bool {
        false
    }
    fn resolve_conflict(&self, _conflict: &ConflictInfo) -> ConflictAction {
        ConflictAction::Skip
    }
}

fn record(principal: &str, kind: idman_core::models::PrincipalType, ps: &str, acct: &str) -> BulkOperationRecord {
    BulkOperationRecord {
        principal_name: principal.to_string(),
        permission_set_name: ps.to_string(),
        account_name: acct.to_string(),
        principal_type: kind,
        line_number: None,
    }
}

fn full_directory() -> Arc<MemoryDirectory> {
    Arc::new(
        MemoryDirectory::new()
            .with_user(user("alice"))
            .with_group(group("devs", &["alice"]))
            .with_permission_set(permission_set("ReadOnlyAccess"))
            .with_permission_set(permission_set("PowerUserAccess"))
            .with_account(account("123456789012", "Prod"))
            .with_account(account("234567890123", "Dev")),
    )
}

// Two resolvable rows, dry-run: preview says 2/0, nothing executes.
#[tokio::test]
async fn dry_run_previews_without_touching_the_executor() {
    use idman_core::models::PrincipalType::{Group, User};
    let directory = full_directory();
    let resolver = ResourceResolver::new(directory.clone());
    let records = vec![
        record("alice", User, "ReadOnlyAccess", "Prod"),
        record("devs", Group, "PowerUserAccess", "Dev"),
    ];
    let mut resolved = Vec::new();
    for r in &records {
        resolved.push(resolver.resolve_assignment(r).await);
    }

    let summary = summarize(&resolved, BulkOperation::Assign);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.resolvable, 2);
    assert_eq!(summary.unresolvable, 0);
    assert_eq!(summary.principals.len(), 2);

    let decision = gate(&summary, true, false, &AutoPrompter::default());
    assert_eq!(decision, PreviewDecision::DryRunComplete);
    assert_eq!(directory.mutating_call_count(), 0);
}

// One unresolvable row and no dry-run: the batch must abort.
#[tokio::test]
async fn unresolvable_records_abort_execution() {
    use idman_core::models::PrincipalType::User;
    let directory = full_directory();
    let resolver = ResourceResolver::new(directory.clone());
    let records = vec![
        record("alice", User, "ReadOnlyAccess", "Prod"),
        record("bob", User, "ReadOnlyAccess", "Prod"),
    ];
    let mut resolved = Vec::new();
    for r in &records {
        resolved.push(resolver.resolve_assignment(r).await);
    }

    let summary = summarize(&resolved, BulkOperation::Assign);
    assert_eq!(summary.unresolvable, 1);
    let decision = gate(&summary, false, false, &AutoPrompter::default());
    assert_eq!(decision, PreviewDecision::AbortUnresolvable);
    assert_eq!(directory.mutating_call_count(), 0);

    let failing = resolved.iter().find(|r| !r.success()).unwrap();
    assert!(failing.resolution_errors[0].contains("bob"));
    assert!(failing.resolution_errors[0]
        .contains("Verify names match exactly (case-sensitive)"));
}

#[tokio::test]
async fn force_skips_the_prompt_and_declined_prompts_cancel() {
    use idman_core::models::PrincipalType::User;
    let directory = full_directory();
    let resolver = ResourceResolver::new(directory.clone());
    let resolved = vec![
        resolver
            .resolve_assignment(&record("alice", User, "ReadOnlyAccess", "Prod"))
            .await,
    ];
    let summary = summarize(&resolved, BulkOperation::Revoke);

    assert_eq!(
        gate(&summary, false, true, &DenyingPrompter),
        PreviewDecision::Proceed
    );
    assert_eq!(
        gate(&summary, false, false, &DenyingPrompter),
        PreviewDecision::Cancelled
    );
}

// Preview summaries are a pure function of the resolved inputs, so the
// dry-run flag cannot change them.
#[tokio::test]
async fn preview_is_identical_with_and_without_dry_run() {
    use idman_core::models::PrincipalType::User;
    let directory = full_directory();
    let resolver = ResourceResolver::new(directory.clone());
    let resolved = vec![
        resolver
            .resolve_assignment(&record("alice", User, "ReadOnlyAccess", "Prod"))
            .await,
    ];
    let a = summarize(&resolved, BulkOperation::Assign);
    let b = summarize(&resolved, BulkOperation::Assign);
    assert_eq!(a, b);
}
