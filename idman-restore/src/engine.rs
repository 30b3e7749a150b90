//! The restore engine: ordered replay with conflict resolution,
//! checkpointing, and rollback.
//!
//! Phases run in dependency order (users, groups, permission sets,
//! assignments) with a strict barrier between them; within a phase,
//! items run concurrently under a semaphore bound with the executor's
//! retry discipline. The rollback journal is appended under the
//! operation-state lock and consumed in reverse on failure.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use idman_backup::storage::StorageEngine;
use idman_core::cancel::CancellationToken;
use idman_core::errors::{ExecutionError, IdmanResult};
use idman_core::models::{
    AssignmentData, ConflictAction, ConflictInfo, GroupData, PermissionSetData, ResourceType,
    RestoreOptions, RestorePreview, RestoreResult, RollbackSummary, UserData, ValidationIssues,
};
use idman_core::retry::{retry_with_backoff, RetryConfig};
use idman_core::traits::{AutoPrompter, IDirectory, IPrompter};

use crate::compat::CompatibilityValidator;
use crate::conflict::ConflictResolver;
use crate::mapping::apply_resource_mappings;
use crate::rollback::RollbackManager;
use crate::state::{ChangeAction, OperationState, OperationStateStore, RollbackAction};

/// Shared context handed to every phase worker.
#[derive(Clone)]
struct PhaseContext {
    directory: Arc<dyn IDirectory>,
    state: Arc<tokio::sync::Mutex<OperationState>>,
    resolver: Arc<ConflictResolver>,
    retry: RetryConfig,
    semaphore: Arc<Semaphore>,
    stop: Arc<AtomicBool>,
    cancel: CancellationToken,
    dry_run: bool,
}

/// One item's contribution to a phase.
struct ItemOutcome {
    applied: bool,
    warning: Option<String>,
}

#[derive(Default)]
struct PhaseStats {
    applied: usize,
    warnings: Vec<String>,
}

/// The restore engine.
pub struct RestoreEngine {
    directory: Arc<dyn IDirectory>,
    storage: Arc<StorageEngine>,
    prompter: Arc<dyn IPrompter>,
    states: OperationStateStore,
    retry: RetryConfig,
    concurrency: usize,
    cancel: CancellationToken,
}

impl RestoreEngine {
    pub fn new(directory: Arc<dyn IDirectory>, storage: Arc<StorageEngine>) -> Self {
        Self {
            directory,
            storage,
            prompter: Arc::new(AutoPrompter::default()),
            states: OperationStateStore::default(),
            retry: RetryConfig::default(),
            concurrency: 10,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn IPrompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.states = OperationStateStore::new(ttl);
        self
    }

    /// Tracked operation states (retained for the inspection window).
    pub fn states(&self) -> &OperationStateStore {
        &self.states
    }

    /// Restore a backup under a fresh operation id.
    pub async fn restore(
        &self,
        backup_id: &str,
        options: &RestoreOptions,
    ) -> IdmanResult<RestoreResult> {
        let operation_id = format!("restore-{}", &Uuid::new_v4().simple().to_string()[..8]);
        self.run(backup_id, options, operation_id).await
    }

    /// Rerun against a tracked operation state: phases whose checkpoint
    /// is already present are skipped.
    pub async fn resume(
        &self,
        backup_id: &str,
        options: &RestoreOptions,
        operation_id: &str,
    ) -> IdmanResult<RestoreResult> {
        self.run(backup_id, options, operation_id.to_string()).await
    }

    async fn run(
        &self,
        backup_id: &str,
        options: &RestoreOptions,
        operation_id: String,
    ) -> IdmanResult<RestoreResult> {
        let started = Instant::now();
        tracing::info!("restore: operation {operation_id} starting for backup {backup_id}");

        let Some(backup) = self.storage.retrieve(backup_id).await? else {
            return Ok(failure_result(
                &operation_id,
                format!("backup {backup_id} not found"),
                vec![format!("backup {backup_id} not found")],
                Vec::new(),
                BTreeMap::new(),
                started,
                None,
            ));
        };
        if !backup.verify_integrity() {
            return Ok(failure_result(
                &operation_id,
                "backup integrity validation failed".to_string(),
                vec!["backup data integrity check failed".to_string()],
                Vec::new(),
                BTreeMap::new(),
                started,
                None,
            ));
        }

        let target_instance_arn = options
            .target_instance_arn
            .clone()
            .unwrap_or_else(|| backup.metadata.instance_arn.clone());

        let mut warnings: Vec<String> = Vec::new();
        if !options.skip_validation {
            let compat = CompatibilityValidator::new(Arc::clone(&self.directory))
                .validate(&backup, &target_instance_arn)
                .await?;
            warnings.extend(compat.warnings.clone());
            if !compat.is_valid {
                return Ok(failure_result(
                    &operation_id,
                    "compatibility validation failed".to_string(),
                    compat.errors,
                    warnings,
                    BTreeMap::new(),
                    started,
                    None,
                ));
            }
        }
        if options.cross_account.is_some() {
            warnings.push("cross-account restore: role access is validated per operation".to_string());
        }

        let backup = apply_resource_mappings(&backup, &options.resource_mappings);

        let state = match self.states.get(&operation_id) {
            Some(existing) => existing,
            None => {
                let mut fresh = OperationState::new(&operation_id, "restore");
                fresh.add_checkpoint(
                    "backup_retrieved",
                    serde_json::json!({
                        "backup_id": backup_id,
                        "resource_counts": backup.metadata.resource_counts,
                    }),
                );
                self.states.insert(fresh)
            }
        };

        let ctx = PhaseContext {
            directory: Arc::clone(&self.directory),
            state: Arc::clone(&state),
            resolver: Arc::new(ConflictResolver::new(
                options.conflict_strategy,
                Arc::clone(&self.prompter),
            )),
            retry: self.retry,
            semaphore: Arc::new(Semaphore::new(self.concurrency)),
            stop: Arc::new(AtomicBool::new(false)),
            cancel: self.cancel.clone(),
            dry_run: options.dry_run,
        };

        let mut changes_applied: BTreeMap<String, usize> = BTreeMap::new();
        let phase_error = self
            .run_phases(&backup, options, &ctx, &mut changes_applied, &mut warnings)
            .await;

        match phase_error {
            None => {
                {
                    let mut state = state.lock().await;
                    state.completed = true;
                    state.success = true;
                }
                self.states.schedule_eviction(&operation_id);
                tracing::info!("restore: operation {operation_id} completed");
                Ok(RestoreResult {
                    success: true,
                    message: "restore completed successfully".to_string(),
                    operation_id,
                    errors: Vec::new(),
                    warnings,
                    changes_applied,
                    duration_ms: started.elapsed().as_millis() as u64,
                    rollback: None,
                })
            }
            Some(error) => {
                let snapshot = { state.lock().await.clone() };
                let rollback = if !options.dry_run && !snapshot.applied_changes.is_empty() {
                    tracing::warn!(
                        "restore: operation {operation_id} failed after {} changes, rolling back",
                        snapshot.applied_changes.len()
                    );
                    Some(
                        RollbackManager::new(Arc::clone(&self.directory))
                            .execute(&snapshot)
                            .await,
                    )
                } else {
                    None
                };
                let mut applied: BTreeMap<String, usize> = BTreeMap::new();
                for change in &snapshot.applied_changes {
                    *applied.entry(change.resource_type.to_string()).or_default() += 1;
                }
                {
                    let mut state = state.lock().await;
                    state.completed = true;
                    state.success = false;
                }
                self.states.schedule_eviction(&operation_id);
                Ok(failure_result(
                    &operation_id,
                    format!("restore failed: {error}"),
                    vec![format!("{error}. {}", error.recovery_suggestion())],
                    warnings,
                    applied,
                    started,
                    rollback,
                ))
            }
        }
    }

    async fn run_phases(
        &self,
        backup: &idman_core::models::BackupData,
        options: &RestoreOptions,
        ctx: &PhaseContext,
        changes_applied: &mut BTreeMap<String, usize>,
        warnings: &mut Vec<String>,
    ) -> Option<idman_core::errors::IdmanError> {
        // Users before groups before permission sets before assignments.
        if options.targets(ResourceType::Users) {
            match self
                .run_phase(
                    ResourceType::Users,
                    backup.users.clone(),
                    ctx,
                    restore_user_item,
                )
                .await
            {
                Ok(Some(stats)) => {
                    changes_applied.insert("users".to_string(), stats.applied);
                    warnings.extend(stats.warnings);
                }
                Ok(None) => warnings.push("phase users already checkpointed, skipped".to_string()),
                Err(error) => return Some(error),
            }
        }
        if options.targets(ResourceType::Groups) {
            match self
                .run_phase(
                    ResourceType::Groups,
                    backup.groups.clone(),
                    ctx,
                    restore_group_item,
                )
                .await
            {
                Ok(Some(stats)) => {
                    changes_applied.insert("groups".to_string(), stats.applied);
                    warnings.extend(stats.warnings);
                }
                Ok(None) => warnings.push("phase groups already checkpointed, skipped".to_string()),
                Err(error) => return Some(error),
            }
        }
        if options.targets(ResourceType::PermissionSets) {
            match self
                .run_phase(
                    ResourceType::PermissionSets,
                    backup.permission_sets.clone(),
                    ctx,
                    restore_permission_set_item,
                )
                .await
            {
                Ok(Some(stats)) => {
                    changes_applied.insert("permission_sets".to_string(), stats.applied);
                    warnings.extend(stats.warnings);
                }
                Ok(None) => {
                    warnings.push("phase permission_sets already checkpointed, skipped".to_string())
                }
                Err(error) => return Some(error),
            }
        }
        if options.targets(ResourceType::Assignments) {
            match self
                .run_phase(
                    ResourceType::Assignments,
                    backup.assignments.clone(),
                    ctx,
                    restore_assignment_item,
                )
                .await
            {
                Ok(Some(stats)) => {
                    changes_applied.insert("assignments".to_string(), stats.applied);
                    warnings.extend(stats.warnings);
                }
                Ok(None) => {
                    warnings.push("phase assignments already checkpointed, skipped".to_string())
                }
                Err(error) => return Some(error),
            }
        }
        None
    }

    /// Run one phase to completion. Returns None when the phase was
    /// already checkpointed by a previous run.
    async fn run_phase<T, F, Fut>(
        &self,
        kind: ResourceType,
        items: Vec<T>,
        ctx: &PhaseContext,
        worker: F,
    ) -> IdmanResult<Option<PhaseStats>>
    where
        T: Send + 'static,
        F: Fn(PhaseContext, T) -> Fut + Clone + Send + 'static,
        Fut: std::future::Future<Output = IdmanResult<ItemOutcome>> + Send + 'static,
    {
        let checkpoint = format!("phase_{kind}");
        if ctx.state.lock().await.has_checkpoint(&checkpoint) {
            tracing::info!("restore: {checkpoint} present, skipping phase");
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled {
                operation: format!("restore phase {kind}"),
            }
            .into());
        }

        let total = items.len();
        let mut tasks = JoinSet::new();
        for item in items {
            let ctx = ctx.clone();
            let worker = worker.clone();
            tasks.spawn(async move {
                let permit = ctx.semaphore.clone().acquire_owned().await;
                if permit.is_err()
                    || ctx.stop.load(Ordering::SeqCst)
                    || ctx.cancel.is_cancelled()
                {
                    return Ok(ItemOutcome {
                        applied: false,
                        warning: None,
                    });
                }
                let result = worker(ctx.clone(), item).await;
                if result.is_err() {
                    ctx.stop.store(true, Ordering::SeqCst);
                }
                result
            });
        }

        let mut stats = PhaseStats::default();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    if outcome.applied {
                        stats.applied += 1;
                    }
                    if let Some(warning) = outcome.warning {
                        stats.warnings.push(warning);
                    }
                }
                Ok(Err(error)) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        first_error = Some(
                            ExecutionError::AssignmentFailed {
                                assignment: format!("restore phase {kind}"),
                                reason: join_error.to_string(),
                            }
                            .into(),
                        );
                    }
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }
        ctx.state.lock().await.add_checkpoint(
            &checkpoint,
            serde_json::json!({"total": total, "applied": stats.applied}),
        );
        tracing::info!(
            "restore: phase {kind} complete ({}/{} applied)",
            stats.applied,
            total
        );
        Ok(Some(stats))
    }

    /// What a restore would change, without touching the directory's
    /// write surface.
    pub async fn preview(
        &self,
        backup_id: &str,
        options: &RestoreOptions,
    ) -> IdmanResult<RestorePreview> {
        let Some(backup) = self.storage.retrieve(backup_id).await? else {
            return Ok(RestorePreview {
                warnings: vec![format!("backup {backup_id} not found")],
                ..Default::default()
            });
        };
        let backup = apply_resource_mappings(&backup, &options.resource_mappings);

        let mut preview = RestorePreview::default();
        if let Some(config) = &options.cross_account {
            preview.warnings.push(format!(
                "cross-account restore to account {}",
                config.target_account_id
            ));
        }
        for mapping in &options.resource_mappings {
            preview.warnings.push(format!(
                "resource mapping: {} -> {}",
                mapping.source_account_id, mapping.target_account_id
            ));
        }

        if options.targets(ResourceType::Users) {
            preview
                .changes_summary
                .insert("users".to_string(), backup.users.len());
            for user in &backup.users {
                if let Some(existing) = self.directory.find_user_by_name(&user.user_name).await? {
                    preview.conflicts.push(ConflictInfo {
                        resource_type: ResourceType::Users,
                        resource_id: user.user_name.clone(),
                        conflict_type: "user_exists".to_string(),
                        existing_value: serde_json::to_value(&existing).unwrap_or_default(),
                        new_value: serde_json::to_value(user).unwrap_or_default(),
                        suggested_action: Some(ConflictAction::Overwrite),
                    });
                }
            }
        }
        if options.targets(ResourceType::Groups) {
            preview
                .changes_summary
                .insert("groups".to_string(), backup.groups.len());
            for group in &backup.groups {
                if let Some(existing) = self
                    .directory
                    .find_group_by_name(&group.display_name)
                    .await?
                {
                    preview.conflicts.push(ConflictInfo {
                        resource_type: ResourceType::Groups,
                        resource_id: group.display_name.clone(),
                        conflict_type: "group_exists".to_string(),
                        existing_value: serde_json::to_value(&existing).unwrap_or_default(),
                        new_value: serde_json::to_value(group).unwrap_or_default(),
                        suggested_action: Some(ConflictAction::Merge),
                    });
                }
            }
        }
        if options.targets(ResourceType::PermissionSets) {
            preview
                .changes_summary
                .insert("permission_sets".to_string(), backup.permission_sets.len());
            for permission_set in &backup.permission_sets {
                if let Some(existing) = self
                    .directory
                    .find_permission_set_by_name(&permission_set.name)
                    .await?
                {
                    preview.conflicts.push(ConflictInfo {
                        resource_type: ResourceType::PermissionSets,
                        resource_id: permission_set.name.clone(),
                        conflict_type: "permission_set_exists".to_string(),
                        existing_value: serde_json::to_value(&existing).unwrap_or_default(),
                        new_value: serde_json::to_value(permission_set).unwrap_or_default(),
                        suggested_action: Some(ConflictAction::Overwrite),
                    });
                }
            }
        }
        if options.targets(ResourceType::Assignments) {
            preview
                .changes_summary
                .insert("assignments".to_string(), backup.assignments.len());
        }

        let total: usize = preview.changes_summary.values().sum();
        preview.estimated_duration_secs = Some((total as u64) * 2);
        Ok(preview)
    }

    /// Compatibility of a stored backup with a target instance.
    pub async fn validate_compatibility(
        &self,
        backup_id: &str,
        target_instance_arn: &str,
    ) -> IdmanResult<ValidationIssues> {
        let Some(backup) = self.storage.retrieve(backup_id).await? else {
            return Ok(ValidationIssues::invalid(format!(
                "backup {backup_id} not found"
            )));
        };
        CompatibilityValidator::new(Arc::clone(&self.directory))
            .validate(&backup, target_instance_arn)
            .await
    }

    /// Manually roll back a tracked operation.
    pub async fn execute_rollback(&self, operation_id: &str) -> IdmanResult<RollbackSummary> {
        let Some(state) = self.states.get(operation_id) else {
            return Ok(RollbackSummary {
                success: false,
                applied_changes_reverted: 0,
                message: format!("operation {operation_id} not found or already evicted"),
                errors: Vec::new(),
            });
        };
        let snapshot = { state.lock().await.clone() };
        Ok(RollbackManager::new(Arc::clone(&self.directory))
            .execute(&snapshot)
            .await)
    }
}

#[allow(clippy::too_many_arguments)]
fn failure_result(
    operation_id: &str,
    message: String,
    errors: Vec<String>,
    warnings: Vec<String>,
    changes_applied: BTreeMap<String, usize>,
    started: Instant,
    rollback: Option<RollbackSummary>,
) -> RestoreResult {
    let mut message = message;
    if let Some(summary) = &rollback {
        message = format!("{message} ({})", summary.message);
    }
    RestoreResult {
        success: false,
        message,
        operation_id: operation_id.to_string(),
        errors,
        warnings,
        changes_applied,
        duration_ms: started.elapsed().as_millis() as u64,
        rollback,
    }
}

async fn restore_user_item(ctx: PhaseContext, user: UserData) -> IdmanResult<ItemOutcome> {
    if ctx.dry_run {
        return Ok(ItemOutcome {
            applied: true,
            warning: None,
        });
    }
    let existing = {
        let directory = Arc::clone(&ctx.directory);
        let name = user.user_name.clone();
        retry_with_backoff(&ctx.retry, "find_user_by_name", move || {
            let directory = Arc::clone(&directory);
            let name = name.clone();
            async move { directory.find_user_by_name(&name).await }
        })
        .await?
    };

    match existing {
        None => {
            ctx.state
                .lock()
                .await
                .add_rollback_action(RollbackAction::DeleteUser {
                    user_name: user.user_name.clone(),
                });
            {
                let directory = Arc::clone(&ctx.directory);
                let user = user.clone();
                retry_with_backoff(&ctx.retry, "create_user", move || {
                    let directory = Arc::clone(&directory);
                    let user = user.clone();
                    async move { directory.create_user(&user).await.map(|_| ()) }
                })
                .await?;
            }
            ctx.state.lock().await.add_change(
                ResourceType::Users,
                &user.user_name,
                ChangeAction::Create,
                None,
                serde_json::to_value(&user).unwrap_or_default(),
            );
            Ok(ItemOutcome {
                applied: true,
                warning: None,
            })
        }
        Some(existing) => {
            let conflict = ConflictInfo {
                resource_type: ResourceType::Users,
                resource_id: user.user_name.clone(),
                conflict_type: "user_exists".to_string(),
                existing_value: serde_json::to_value(&existing).unwrap_or_default(),
                new_value: serde_json::to_value(&user).unwrap_or_default(),
                suggested_action: Some(ConflictAction::Overwrite),
            };
            match ctx.resolver.resolve(&conflict) {
                ConflictAction::Skip => Ok(ItemOutcome {
                    applied: false,
                    warning: Some(format!("skipped existing user: {}", user.user_name)),
                }),
                ConflictAction::Overwrite | ConflictAction::Merge => {
                    ctx.state
                        .lock()
                        .await
                        .add_rollback_action(RollbackAction::RestoreUser {
                            prior: existing.clone(),
                        });
                    {
                        let directory = Arc::clone(&ctx.directory);
                        let user_id = existing.user_id.clone();
                        let user = user.clone();
                        retry_with_backoff(&ctx.retry, "update_user", move || {
                            let directory = Arc::clone(&directory);
                            let user_id = user_id.clone();
                            let user = user.clone();
                            async move { directory.update_user(&user_id, &user).await }
                        })
                        .await?;
                    }
                    ctx.state.lock().await.add_change(
                        ResourceType::Users,
                        &user.user_name,
                        ChangeAction::Update,
                        Some(serde_json::to_value(&existing).unwrap_or_default()),
                        serde_json::to_value(&user).unwrap_or_default(),
                    );
                    Ok(ItemOutcome {
                        applied: true,
                        warning: None,
                    })
                }
            }
        }
    }
}

async fn restore_group_item(ctx: PhaseContext, group: GroupData) -> IdmanResult<ItemOutcome> {
    if ctx.dry_run {
        return Ok(ItemOutcome {
            applied: true,
            warning: None,
        });
    }
    let existing = {
        let directory = Arc::clone(&ctx.directory);
        let name = group.display_name.clone();
        retry_with_backoff(&ctx.retry, "find_group_by_name", move || {
            let directory = Arc::clone(&directory);
            let name = name.clone();
            async move { directory.find_group_by_name(&name).await }
        })
        .await?
    };

    match existing {
        None => {
            ctx.state
                .lock()
                .await
                .add_rollback_action(RollbackAction::DeleteGroup {
                    display_name: group.display_name.clone(),
                });
            {
                let directory = Arc::clone(&ctx.directory);
                let group = group.clone();
                retry_with_backoff(&ctx.retry, "create_group", move || {
                    let directory = Arc::clone(&directory);
                    let group = group.clone();
                    async move { directory.create_group(&group).await.map(|_| ()) }
                })
                .await?;
            }
            ctx.state.lock().await.add_change(
                ResourceType::Groups,
                &group.display_name,
                ChangeAction::Create,
                None,
                serde_json::to_value(&group).unwrap_or_default(),
            );
            Ok(ItemOutcome {
                applied: true,
                warning: None,
            })
        }
        Some(existing) => {
            let conflict = ConflictInfo {
                resource_type: ResourceType::Groups,
                resource_id: group.display_name.clone(),
                conflict_type: "group_exists".to_string(),
                existing_value: serde_json::to_value(&existing).unwrap_or_default(),
                new_value: serde_json::to_value(&group).unwrap_or_default(),
                suggested_action: Some(ConflictAction::Merge),
            };
            match ctx.resolver.resolve(&conflict) {
                ConflictAction::Skip => Ok(ItemOutcome {
                    applied: false,
                    warning: Some(format!("skipped existing group: {}", group.display_name)),
                }),
                ConflictAction::Overwrite | ConflictAction::Merge => {
                    ctx.state
                        .lock()
                        .await
                        .add_rollback_action(RollbackAction::RestoreGroup {
                            prior: existing.clone(),
                        });
                    {
                        let directory = Arc::clone(&ctx.directory);
                        let group_id = existing.group_id.clone();
                        let group = group.clone();
                        retry_with_backoff(&ctx.retry, "update_group", move || {
                            let directory = Arc::clone(&directory);
                            let group_id = group_id.clone();
                            let group = group.clone();
                            async move { directory.update_group(&group_id, &group).await }
                        })
                        .await?;
                    }
                    ctx.state.lock().await.add_change(
                        ResourceType::Groups,
                        &group.display_name,
                        ChangeAction::Update,
                        Some(serde_json::to_value(&existing).unwrap_or_default()),
                        serde_json::to_value(&group).unwrap_or_default(),
                    );
                    Ok(ItemOutcome {
                        applied: true,
                        warning: None,
                    })
                }
            }
        }
    }
}

async fn restore_permission_set_item(
    ctx: PhaseContext,
    permission_set: PermissionSetData,
) -> IdmanResult<ItemOutcome> {
    if ctx.dry_run {
        return Ok(ItemOutcome {
            applied: true,
            warning: None,
        });
    }
    let existing = {
        let directory = Arc::clone(&ctx.directory);
        let name = permission_set.name.clone();
        retry_with_backoff(&ctx.retry, "find_permission_set_by_name", move || {
            let directory = Arc::clone(&directory);
            let name = name.clone();
            async move { directory.find_permission_set_by_name(&name).await }
        })
        .await?
    };

    match existing {
        None => {
            ctx.state
                .lock()
                .await
                .add_rollback_action(RollbackAction::DeletePermissionSet {
                    name: permission_set.name.clone(),
                });
            {
                let directory = Arc::clone(&ctx.directory);
                let permission_set = permission_set.clone();
                retry_with_backoff(&ctx.retry, "create_permission_set", move || {
                    let directory = Arc::clone(&directory);
                    let permission_set = permission_set.clone();
                    async move {
                        directory
                            .create_permission_set(&permission_set)
                            .await
                            .map(|_| ())
                    }
                })
                .await?;
            }
            ctx.state.lock().await.add_change(
                ResourceType::PermissionSets,
                &permission_set.name,
                ChangeAction::Create,
                None,
                serde_json::to_value(&permission_set).unwrap_or_default(),
            );
            Ok(ItemOutcome {
                applied: true,
                warning: None,
            })
        }
        Some(existing) => {
            let conflict = ConflictInfo {
                resource_type: ResourceType::PermissionSets,
                resource_id: permission_set.name.clone(),
                conflict_type: "permission_set_exists".to_string(),
                existing_value: serde_json::to_value(&existing).unwrap_or_default(),
                new_value: serde_json::to_value(&permission_set).unwrap_or_default(),
                suggested_action: Some(ConflictAction::Overwrite),
            };
            match ctx.resolver.resolve(&conflict) {
                ConflictAction::Skip => Ok(ItemOutcome {
                    applied: false,
                    warning: Some(format!(
                        "skipped existing permission set: {}",
                        permission_set.name
                    )),
                }),
                ConflictAction::Overwrite | ConflictAction::Merge => {
                    ctx.state.lock().await.add_rollback_action(
                        RollbackAction::RestorePermissionSet {
                            prior: existing.clone(),
                        },
                    );
                    {
                        let directory = Arc::clone(&ctx.directory);
                        let arn = existing.permission_set_arn.clone();
                        let permission_set = permission_set.clone();
                        retry_with_backoff(&ctx.retry, "update_permission_set", move || {
                            let directory = Arc::clone(&directory);
                            let arn = arn.clone();
                            let permission_set = permission_set.clone();
                            async move {
                                directory
                                    .update_permission_set(&arn, &permission_set)
                                    .await
                            }
                        })
                        .await?;
                    }
                    ctx.state.lock().await.add_change(
                        ResourceType::PermissionSets,
                        &permission_set.name,
                        ChangeAction::Update,
                        Some(serde_json::to_value(&existing).unwrap_or_default()),
                        serde_json::to_value(&permission_set).unwrap_or_default(),
                    );
                    Ok(ItemOutcome {
                        applied: true,
                        warning: None,
                    })
                }
            }
        }
    }
}

async fn restore_assignment_item(
    ctx: PhaseContext,
    assignment: AssignmentData,
) -> IdmanResult<ItemOutcome> {
    if ctx.dry_run {
        return Ok(ItemOutcome {
            applied: true,
            warning: None,
        });
    }
    let existing = {
        let directory = Arc::clone(&ctx.directory);
        let assignment = assignment.clone();
        retry_with_backoff(&ctx.retry, "list_assignments", move || {
            let directory = Arc::clone(&directory);
            let assignment = assignment.clone();
            async move {
                directory
                    .list_assignments(&assignment.account_id, &assignment.permission_set_arn)
                    .await
            }
        })
        .await?
    };
    if existing.contains(&assignment) {
        return Ok(ItemOutcome {
            applied: false,
            warning: Some(format!(
                "assignment already exists for {}",
                assignment.principal_id
            )),
        });
    }

    ctx.state
        .lock()
        .await
        .add_rollback_action(RollbackAction::DeleteAssignment {
            assignment: assignment.clone(),
        });
    {
        let directory = Arc::clone(&ctx.directory);
        let assignment = assignment.clone();
        retry_with_backoff(&ctx.retry, "create_assignment", move || {
            let directory = Arc::clone(&directory);
            let assignment = assignment.clone();
            async move { directory.create_assignment(&assignment).await }
        })
        .await?;
    }
    ctx.state.lock().await.add_change(
        ResourceType::Assignments,
        &assignment.assignment_key(),
        ChangeAction::Create,
        None,
        serde_json::to_value(&assignment).unwrap_or_default(),
    );
    Ok(ItemOutcome {
        applied: true,
        warning: None,
    })
}
