use std::sync::Arc;

use idman_core::models::{ConflictAction, ConflictInfo, ConflictStrategy, ResourceType};
use idman_core::traits::AutoPrompter;
use idman_restore::conflict::ConflictResolver;
use test_fixtures::user;

fn conflict_for_users(existing_email: &str, new_email: &str) -> ConflictInfo {
    let mut existing = user("alice");
    existing.email = Some(existing_email.to_string());
    let mut incoming = user("alice");
    incoming.email = Some(new_email.to_string());
    ConflictInfo {
        resource_type: ResourceType::Users,
        resource_id: "alice".to_string(),
        conflict_type: "user_exists".to_string(),
        existing_value: serde_json::to_value(&existing).unwrap(),
        new_value: serde_json::to_value(&incoming).unwrap(),
        suggested_action: Some(ConflictAction::Overwrite),
    }
}

fn resolver(strategy: ConflictStrategy) -> ConflictResolver {
    ConflictResolver::new(strategy, Arc::new(AutoPrompter::default()))
}

#[test]
fn overwrite_and_skip_are_unconditional() {
    let conflict = conflict_for_users("a@example.com", "a@example.com");
    assert_eq!(
        resolver(ConflictStrategy::Overwrite).resolve(&conflict),
        ConflictAction::Overwrite
    );
    assert_eq!(
        resolver(ConflictStrategy::Skip).resolve(&conflict),
        ConflictAction::Skip
    );
}

#[test]
fn merge_overwrites_users_only_when_identity_fields_differ() {
    let changed = conflict_for_users("old@example.com", "new@example.com");
    assert_eq!(
        resolver(ConflictStrategy::Merge).resolve(&changed),
        ConflictAction::Overwrite
    );

    let unchanged = conflict_for_users("same@example.com", "same@example.com");
    assert_eq!(
        resolver(ConflictStrategy::Merge).resolve(&unchanged),
        ConflictAction::Skip
    );
}

#[test]
fn merge_compares_group_descriptions() {
    let mut existing = test_fixtures::group("devs", &["alice"]);
    existing.description = Some("old".to_string());
    let mut incoming = test_fixtures::group("devs", &["alice"]);
    incoming.description = Some("new".to_string());
    let conflict = ConflictInfo {
        resource_type: ResourceType::Groups,
        resource_id: "devs".to_string(),
        conflict_type: "group_exists".to_string(),
        existing_value: serde_json::to_value(&existing).unwrap(),
        new_value: serde_json::to_value(&incoming).unwrap(),
        suggested_action: None,
    };
    assert_eq!(
        resolver(ConflictStrategy::Merge).resolve(&conflict),
        ConflictAction::Overwrite
    );

    let same = ConflictInfo {
        new_value: serde_json::to_value(&existing).unwrap(),
        ..conflict
    };
    assert_eq!(
        resolver(ConflictStrategy::Merge).resolve(&same),
        ConflictAction::Skip
    );
}

#[test]
fn merge_of_permission_sets_is_overwrite() {
    let permission_set = test_fixtures::permission_set("ReadOnly");
    let conflict = ConflictInfo {
        resource_type: ResourceType::PermissionSets,
        resource_id: "ReadOnly".to_string(),
        conflict_type: "permission_set_exists".to_string(),
        existing_value: serde_json::to_value(&permission_set).unwrap(),
        new_value: serde_json::to_value(&permission_set).unwrap(),
        suggested_action: None,
    };
    assert_eq!(
        resolver(ConflictStrategy::Merge).resolve(&conflict),
        ConflictAction::Overwrite
    );
}

#[test]
fn prompt_uses_the_suggested_action_and_caches_the_decision() {
    let resolver = resolver(ConflictStrategy::Prompt);
    let mut conflict = conflict_for_users("a@example.com", "b@example.com");
    assert_eq!(resolver.resolve(&conflict), ConflictAction::Overwrite);

    // Same resource again, different suggestion: the cached decision wins.
    conflict.suggested_action = Some(ConflictAction::Merge);
    assert_eq!(resolver.resolve(&conflict), ConflictAction::Overwrite);
}

#[test]
fn prompt_without_suggestion_falls_back_to_skip() {
    let resolver = resolver(ConflictStrategy::Prompt);
    let mut conflict = conflict_for_users("a@example.com", "b@example.com");
    conflict.suggested_action = None;
    assert_eq!(resolver.resolve(&conflict), ConflictAction::Skip);
}
