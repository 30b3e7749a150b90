//! Rollback execution: walk the journal in reverse, invoking inverse
//! operations.

use std::sync::Arc;

use idman_core::errors::IdmanResult;
use idman_core::models::RollbackSummary;
use idman_core::traits::IDirectory;

use crate::state::{OperationState, RollbackAction};

/// Executes rollback journals against the directory.
pub struct RollbackManager {
    directory: Arc<dyn IDirectory>,
}

/// Outcome of one inverse operation.
enum Inversion {
    Reverted,
    /// The forward change never landed; nothing to undo.
    NothingToUndo,
    Failed(String),
}

impl RollbackManager {
    pub fn new(directory: Arc<dyn IDirectory>) -> Self {
        Self { directory }
    }

    /// Walk `state`'s rollback actions in reverse order.
    ///
    /// Failures are collected and do not stop the walk; a partial
    /// rollback never retries the forward path. Journal entries whose
    /// forward change never landed are skipped without counting.
    pub async fn execute(&self, state: &OperationState) -> RollbackSummary {
        let mut summary = RollbackSummary {
            success: true,
            applied_changes_reverted: 0,
            message: String::new(),
            errors: Vec::new(),
        };
        tracing::info!(
            "rollback: reverting operation {} ({} journal entries)",
            state.operation_id,
            state.rollback_actions.len()
        );

        for action in state.rollback_actions.iter().rev() {
            match self.invert(action).await {
                Inversion::Reverted => summary.applied_changes_reverted += 1,
                Inversion::NothingToUndo => {}
                Inversion::Failed(error) => {
                    summary.success = false;
                    summary.errors.push(error);
                }
            }
        }

        summary.message = if summary.success {
            format!(
                "rolled back {} applied changes",
                summary.applied_changes_reverted
            )
        } else {
            format!(
                "rolled back {} applied changes, {} failures",
                summary.applied_changes_reverted,
                summary.errors.len()
            )
        };
        summary
    }

    async fn invert(&self, action: &RollbackAction) -> Inversion {
        let attempt: IdmanResult<Inversion> = match action {
            RollbackAction::DeleteUser { user_name } => {
                match self.directory.find_user_by_name(user_name).await {
                    Ok(Some(user)) => self
                        .directory
                        .delete_user(&user.user_id)
                        .await
                        .map(|()| Inversion::Reverted),
                    Ok(None) => Ok(Inversion::NothingToUndo),
                    Err(error) => Err(error),
                }
            }
            RollbackAction::DeleteGroup { display_name } => {
                match self.directory.find_group_by_name(display_name).await {
                    Ok(Some(group)) => self
                        .directory
                        .delete_group(&group.group_id)
                        .await
                        .map(|()| Inversion::Reverted),
                    Ok(None) => Ok(Inversion::NothingToUndo),
                    Err(error) => Err(error),
                }
            }
            RollbackAction::DeletePermissionSet { name } => {
                match self.directory.find_permission_set_by_name(name).await {
                    Ok(Some(permission_set)) => self
                        .directory
                        .delete_permission_set(&permission_set.permission_set_arn)
                        .await
                        .map(|()| Inversion::Reverted),
                    Ok(None) => Ok(Inversion::NothingToUndo),
                    Err(error) => Err(error),
                }
            }
            RollbackAction::DeleteAssignment { assignment } => {
                let existing = self
                    .directory
                    .list_assignments(&assignment.account_id, &assignment.permission_set_arn)
                    .await;
                match existing {
                    Ok(existing) if existing.contains(assignment) => self
                        .directory
                        .delete_assignment(assignment)
                        .await
                        .map(|()| Inversion::Reverted),
                    Ok(_) => Ok(Inversion::NothingToUndo),
                    Err(error) => Err(error),
                }
            }
            RollbackAction::RestoreUser { prior } => {
                match self.directory.find_user_by_name(&prior.user_name).await {
                    Ok(Some(current)) => self
                        .directory
                        .update_user(&current.user_id, prior)
                        .await
                        .map(|()| Inversion::Reverted),
                    Ok(None) => Ok(Inversion::Failed(format!(
                        "cannot restore prior user '{}': resource missing",
                        prior.user_name
                    ))),
                    Err(error) => Err(error),
                }
            }
            RollbackAction::RestoreGroup { prior } => {
                match self.directory.find_group_by_name(&prior.display_name).await {
                    Ok(Some(current)) => self
                        .directory
                        .update_group(&current.group_id, prior)
                        .await
                        .map(|()| Inversion::Reverted),
                    Ok(None) => Ok(Inversion::Failed(format!(
                        "cannot restore prior group '{}': resource missing",
                        prior.display_name
                    ))),
                    Err(error) => Err(error),
                }
            }
            RollbackAction::RestorePermissionSet { prior } => {
                match self.directory.find_permission_set_by_name(&prior.name).await {
                    Ok(Some(current)) => self
                        .directory
                        .update_permission_set(&current.permission_set_arn, prior)
                        .await
                        .map(|()| Inversion::Reverted),
                    Ok(None) => Ok(Inversion::Failed(format!(
                        "cannot restore prior permission set '{}': resource missing",
                        prior.name
                    ))),
                    Err(error) => Err(error),
                }
            }
        };

        match attempt {
            Ok(inversion) => inversion,
            Err(error) => Inversion::Failed(format!("{action:?}: {error}")),
        }
    }
}
