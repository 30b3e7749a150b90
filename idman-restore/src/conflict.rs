//! Conflict resolution during restore.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use idman_core::models::{
    ConflictAction, ConflictInfo, ConflictStrategy, GroupData, ResourceType, UserData,
};
use idman_core::traits::IPrompter;

/// Applies the configured strategy to each detected conflict.
///
/// PROMPT decisions are cached per (resource type, resource id) so the
/// same resource resolves consistently across a run.
pub struct ConflictResolver {
    strategy: ConflictStrategy,
    prompter: Arc<dyn IPrompter>,
    decisions: Mutex<HashMap<(ResourceType, String), ConflictAction>>,
}

impl ConflictResolver {
    pub fn new(strategy: ConflictStrategy, prompter: Arc<dyn IPrompter>) -> Self {
        Self {
            strategy,
            prompter,
            decisions: Mutex::new(HashMap::new()),
        }
    }

    pub fn strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    /// Decide what to do with one conflict.
    pub fn resolve(&self, conflict: &ConflictInfo) -> ConflictAction {
        match self.strategy {
            ConflictStrategy::Overwrite => ConflictAction::Overwrite,
            ConflictStrategy::Skip => ConflictAction::Skip,
            ConflictStrategy::Merge => merge_action(conflict),
            ConflictStrategy::Prompt => {
                let key = (conflict.resource_type, conflict.resource_id.clone());
                if let Some(cached) = self.decisions.lock().unwrap().get(&key) {
                    return *cached;
                }
                let action = self.prompter.resolve_conflict(conflict);
                self.decisions.lock().unwrap().insert(key, action);
                action
            }
        }
    }
}

/// Semantics-aware merge.
///
/// Users overwrite when any scalar identity field differs, groups when
/// the description differs; permission sets and assignments have no
/// meaningful field-level merge and overwrite.
fn merge_action(conflict: &ConflictInfo) -> ConflictAction {
    match conflict.resource_type {
        ResourceType::Users => {
            let existing: Option<UserData> =
                serde_json::from_value(conflict.existing_value.clone()).ok();
            let incoming: Option<UserData> =
                serde_json::from_value(conflict.new_value.clone()).ok();
            match (existing, incoming) {
                (Some(existing), Some(incoming)) => {
                    if incoming.identity_differs_from(&existing) {
                        ConflictAction::Overwrite
                    } else {
                        ConflictAction::Skip
                    }
                }
                _ => ConflictAction::Overwrite,
            }
        }
        ResourceType::Groups => {
            let existing: Option<GroupData> =
                serde_json::from_value(conflict.existing_value.clone()).ok();
            let incoming: Option<GroupData> =
                serde_json::from_value(conflict.new_value.clone()).ok();
            match (existing, incoming) {
                (Some(existing), Some(incoming)) => {
                    if incoming.description != existing.description {
                        ConflictAction::Overwrite
                    } else {
                        ConflictAction::Skip
                    }
                }
                _ => ConflictAction::Overwrite,
            }
        }
        _ => ConflictAction::Overwrite,
    }
}
