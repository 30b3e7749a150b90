//! Template validation: structure, entity/permission-set resolution,
//! account checks, and tag-based account expansion.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use idman_core::errors::IdmanResult;
use idman_core::models::{PrincipalType, ValidationIssues};
use idman_core::traits::IDirectory;

use crate::models::{is_valid_account_id, parse_entity_reference, Template};

/// Validation outcome, carrying the resolutions the executor reuses.
#[derive(Debug, Default)]
pub struct TemplateValidation {
    pub issues: ValidationIssues,
    /// Entity reference -> (kind, directory id).
    pub resolved_entities: BTreeMap<String, (PrincipalType, String)>,
    /// Permission set name -> arn.
    pub resolved_permission_sets: BTreeMap<String, String>,
    /// Final expanded target account ids, excludes already applied.
    pub resolved_accounts: Vec<String>,
}

impl TemplateValidation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_valid
    }
}

/// Validates templates against the live directory.
pub struct TemplateValidator {
    directory: Arc<dyn IDirectory>,
}

impl TemplateValidator {
    pub fn new(directory: Arc<dyn IDirectory>) -> Self {
        Self { directory }
    }

    /// Full validation: structure first, then semantics and account
    /// expansion. Structural failure short-circuits.
    pub async fn validate(&self, template: &Template) -> IdmanResult<TemplateValidation> {
        let mut validation = TemplateValidation::default();
        validation.issues.is_valid = true;

        for error in template.validate_structure() {
            validation.issues.add_error(error);
        }
        if !validation.is_valid() {
            return Ok(validation);
        }

        self.validate_entities(template, &mut validation).await?;
        self.validate_permission_sets(template, &mut validation)
            .await?;
        self.validate_accounts(template, &mut validation)?;
        validation.resolved_accounts = self.expand_accounts(template).await?;
        if validation.resolved_accounts.is_empty() {
            validation
                .issues
                .add_warning("no target accounts resolved".to_string());
        }
        Ok(validation)
    }

    async fn validate_entities(
        &self,
        template: &Template,
        validation: &mut TemplateValidation,
    ) -> IdmanResult<()> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        for assignment in &template.assignments {
            for reference in &assignment.entities {
                if !seen.insert(reference.clone()) {
                    continue;
                }
                let (kind, name) = match parse_entity_reference(reference) {
                    Ok(parsed) => parsed,
                    Err(error) => {
                        validation.issues.add_error(error.to_string());
                        continue;
                    }
                };
                let resolved = match kind {
                    PrincipalType::User => self
                        .directory
                        .find_user_by_name(&name)
                        .await?
                        .map(|u| u.user_id),
                    PrincipalType::Group => self
                        .directory
                        .find_group_by_name(&name)
                        .await?
                        .map(|g| g.group_id),
                };
                match resolved {
                    Some(id) => {
                        validation
                            .resolved_entities
                            .insert(reference.clone(), (kind, id));
                    }
                    None => validation
                        .issues
                        .add_error(format!("entity not found: {reference}")),
                }
            }
        }
        Ok(())
    }

    async fn validate_permission_sets(
        &self,
        template: &Template,
        validation: &mut TemplateValidation,
    ) -> IdmanResult<()> {
        let existing: BTreeMap<String, String> = self
            .directory
            .list_permission_sets()
            .await?
            .into_iter()
            .map(|p| (p.name, p.permission_set_arn))
            .collect();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        for assignment in &template.assignments {
            for name in &assignment.permission_sets {
                if !seen.insert(name.clone()) {
                    continue;
                }
                match existing.get(name) {
                    Some(arn) => {
                        validation
                            .resolved_permission_sets
                            .insert(name.clone(), arn.clone());
                    }
                    None => validation
                        .issues
                        .add_error(format!("permission set not found: {name}")),
                }
            }
        }
        Ok(())
    }

    fn validate_accounts(
        &self,
        template: &Template,
        validation: &mut TemplateValidation,
    ) -> IdmanResult<()> {
        for assignment in &template.assignments {
            let targets = &assignment.targets;
            if let Some(ids) = &targets.account_ids {
                for id in ids {
                    if !is_valid_account_id(id) {
                        validation
                            .issues
                            .add_error(format!("invalid account ID format: {id}"));
                    }
                }
            }
            if let Some(tags) = &targets.account_tags {
                for (key, value) in tags {
                    if key.trim().is_empty() || value.trim().is_empty() {
                        validation
                            .issues
                            .add_error(format!("invalid tag: {key}={value}"));
                    }
                }
            }
            if let Some(excluded) = &targets.exclude_accounts {
                for id in excluded {
                    if !is_valid_account_id(id) {
                        validation
                            .issues
                            .add_error(format!("invalid exclude account ID format: {id}"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Expand every block's targets into a deduplicated account set.
    ///
    /// Tag filters select ACTIVE accounts matching all pairs; excludes
    /// are subtracted per block.
    pub async fn expand_accounts(&self, template: &Template) -> IdmanResult<Vec<String>> {
        let mut accounts: BTreeSet<String> = BTreeSet::new();
        for assignment in &template.assignments {
            let targets = &assignment.targets;
            let mut block: BTreeSet<String> = BTreeSet::new();
            if let Some(ids) = &targets.account_ids {
                block.extend(ids.iter().cloned());
            } else if let Some(tags) = &targets.account_tags {
                block.extend(self.resolve_accounts_by_tags(tags).await?);
            }
            if let Some(excluded) = &targets.exclude_accounts {
                for id in excluded {
                    block.remove(id);
                }
            }
            accounts.extend(block);
        }
        Ok(accounts.into_iter().collect())
    }

    async fn resolve_accounts_by_tags(
        &self,
        required: &BTreeMap<String, String>,
    ) -> IdmanResult<Vec<String>> {
        let mut matching = Vec::new();
        for account in self.directory.list_accounts().await? {
            if !account.is_active() {
                continue;
            }
            let tags = match self.directory.list_account_tags(&account.account_id).await {
                Ok(tags) => tags,
                Err(error) => {
                    tracing::warn!(
                        "templates: failed to read tags for {}: {error}",
                        account.account_id
                    );
                    continue;
                }
            };
            let matches = required
                .iter()
                .all(|(key, value)| tags.get(key) == Some(value));
            if matches {
                matching.push(account.account_id);
            }
        }
        Ok(matching)
    }
}
