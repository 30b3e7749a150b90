//! Template execution: cross-product expansion driven through the bulk
//! batch executor.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use idman_bulk::executor::{BatchProcessor, BulkOperation, ItemStatus};
use idman_bulk::ingest::BulkOperationRecord;
use idman_bulk::resolver::ResolvedAssignment;
use idman_core::errors::IdmanResult;
use idman_core::models::PrincipalType;
use idman_core::traits::IDirectory;

use crate::models::{parse_entity_reference, Template};
use crate::validator::{TemplateValidation, TemplateValidator};

/// One expanded assignment's fate.
#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub entity_name: String,
    pub entity_type: PrincipalType,
    pub permission_set_name: String,
    pub account_id: String,
    pub status: String,
    pub error: Option<String>,
}

/// Result of applying a template.
#[derive(Debug)]
pub struct ExecutionResult {
    pub success: bool,
    pub created: Vec<AssignmentOutcome>,
    pub skipped: Vec<AssignmentOutcome>,
    pub failed: Vec<AssignmentOutcome>,
    pub operation_id: String,
    pub duration_ms: u64,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    pub fn total(&self) -> usize {
        self.created.len() + self.skipped.len() + self.failed.len()
    }
}

/// Entity existence detail for previews.
#[derive(Debug, Clone)]
pub struct EntityDetail {
    pub reference: String,
    pub exists: bool,
    pub id: Option<String>,
}

/// Permission set existence detail for previews.
#[derive(Debug, Clone)]
pub struct PermissionSetDetail {
    pub name: String,
    pub exists: bool,
    pub arn: Option<String>,
}

/// What applying the template would do; no writes are issued.
#[derive(Debug)]
pub struct PreviewResult {
    pub template_name: String,
    pub total_assignments: usize,
    pub resolved_accounts: Vec<String>,
    pub entities: Vec<EntityDetail>,
    pub permission_sets: Vec<PermissionSetDetail>,
    pub issues: idman_core::models::ValidationIssues,
}

/// Applies validated templates through the bulk pipeline.
pub struct TemplateExecutor {
    directory: Arc<dyn IDirectory>,
    instance_arn: String,
    cancel: idman_core::cancel::CancellationToken,
}

impl TemplateExecutor {
    pub fn new(directory: Arc<dyn IDirectory>, instance_arn: &str) -> Self {
        Self {
            directory,
            instance_arn: instance_arn.to_string(),
            cancel: idman_core::cancel::CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: idman_core::cancel::CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Validate, expand, and execute. Dry-run resolves everything and
    /// issues no writes.
    pub async fn apply(&self, template: &Template, dry_run: bool) -> IdmanResult<ExecutionResult> {
        let started = Instant::now();
        let operation_id = Uuid::new_v4().to_string();
        tracing::info!(
            "templates: applying {} (dry_run={dry_run}, operation {operation_id})",
            template.metadata.name
        );

        let validator = TemplateValidator::new(Arc::clone(&self.directory));
        let validation = validator.validate(template).await?;
        if !validation.is_valid() {
            return Ok(ExecutionResult {
                success: false,
                created: Vec::new(),
                skipped: Vec::new(),
                failed: Vec::new(),
                operation_id,
                duration_ms: started.elapsed().as_millis() as u64,
                error_message: Some(validation.issues.errors.join("; ")),
            });
        }

        let records = expand(template, &validation);
        let processor = BatchProcessor::new(Arc::clone(&self.directory))
            .with_cancellation(self.cancel.clone());
        let results = processor
            .process(
                records,
                BulkOperation::Assign,
                &self.instance_arn,
                dry_run,
                true,
            )
            .await;

        let mut outcome = ExecutionResult {
            success: results.is_success(),
            created: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            operation_id,
            duration_ms: started.elapsed().as_millis() as u64,
            error_message: None,
        };
        for item in results
            .successful
            .iter()
            .chain(results.skipped.iter())
            .chain(results.failed.iter())
        {
            let detail = AssignmentOutcome {
                entity_name: item.record.principal_name.clone(),
                entity_type: item.record.principal_type,
                permission_set_name: item.record.permission_set_name.clone(),
                account_id: item.record.account_name.clone(),
                status: format!("{:?}", item.status).to_lowercase(),
                error: item.error.clone(),
            };
            match item.status {
                ItemStatus::Created | ItemStatus::DryRun => outcome.created.push(detail),
                ItemStatus::Failed => outcome.failed.push(detail),
                _ => outcome.skipped.push(detail),
            }
        }
        tracing::info!(
            "templates: {} finished: {} created, {} skipped, {} failed",
            template.metadata.name,
            outcome.created.len(),
            outcome.skipped.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// Resolve everything and report the expansion without writing.
    pub async fn preview(&self, template: &Template) -> IdmanResult<PreviewResult> {
        let validator = TemplateValidator::new(Arc::clone(&self.directory));
        let validation = validator.validate(template).await?;

        let mut entities = Vec::new();
        let mut seen_entities = std::collections::BTreeSet::new();
        for assignment in &template.assignments {
            for reference in &assignment.entities {
                if !seen_entities.insert(reference.clone()) {
                    continue;
                }
                let resolved = validation.resolved_entities.get(reference);
                entities.push(EntityDetail {
                    reference: reference.clone(),
                    exists: resolved.is_some(),
                    id: resolved.map(|(_, id)| id.clone()),
                });
            }
        }
        let mut permission_sets = Vec::new();
        let mut seen_ps = std::collections::BTreeSet::new();
        for assignment in &template.assignments {
            for name in &assignment.permission_sets {
                if !seen_ps.insert(name.clone()) {
                    continue;
                }
                let arn = validation.resolved_permission_sets.get(name);
                permission_sets.push(PermissionSetDetail {
                    name: name.clone(),
                    exists: arn.is_some(),
                    arn: arn.cloned(),
                });
            }
        }

        let account_count = validation.resolved_accounts.len();
        let total_assignments = template
            .assignments
            .iter()
            .map(|a| a.entities.len() * a.permission_sets.len() * account_count)
            .sum();

        Ok(PreviewResult {
            template_name: template.metadata.name.clone(),
            total_assignments,
            resolved_accounts: validation.resolved_accounts,
            entities,
            permission_sets,
            issues: validation.issues,
        })
    }
}

/// Expand a validated template into executor-ready records.
fn expand(template: &Template, validation: &TemplateValidation) -> Vec<ResolvedAssignment> {
    let mut records = Vec::new();
    for assignment in &template.assignments {
        for reference in &assignment.entities {
            let Ok((kind, name)) = parse_entity_reference(reference) else {
                continue;
            };
            let principal_id = validation
                .resolved_entities
                .get(reference)
                .map(|(_, id)| id.clone());
            for permission_set in &assignment.permission_sets {
                let permission_set_arn =
                    validation.resolved_permission_sets.get(permission_set).cloned();
                for account_id in &validation.resolved_accounts {
                    records.push(ResolvedAssignment {
                        record: BulkOperationRecord {
                            principal_name: name.clone(),
                            permission_set_name: permission_set.clone(),
                            account_name: account_id.clone(),
                            principal_type: kind,
                            line_number: None,
                        },
                        principal_id: principal_id.clone(),
                        permission_set_arn: permission_set_arn.clone(),
                        account_id: Some(account_id.clone()),
                        resolution_errors: Vec::new(),
                    });
                }
            }
        }
    }
    records
}
