//! Snapshot collection from the live directory service.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use idman_core::arn::parse_instance_arn;
use idman_core::errors::IdmanResult;
use idman_core::models::{
    BackupData, BackupMetadata, BackupType, CrossAccountConfig, ValidationIssues,
};
use idman_core::traits::IDirectory;

/// Produces a directory capability for a cross-account configuration.
///
/// The concrete factory assumes the role named by the config; tests
/// supply canned directories.
#[async_trait]
pub trait IDirectoryFactory: Send + Sync {
    async fn directory_for(
        &self,
        config: &CrossAccountConfig,
    ) -> IdmanResult<Arc<dyn IDirectory>>;
}

/// Fleet snapshot outcome: per-account backups plus per-account errors.
#[derive(Debug, Default)]
pub struct CrossAccountCollection {
    pub backups: BTreeMap<String, BackupData>,
    pub errors: Vec<String>,
}

/// Collects the four resource kinds into a sealed [`BackupData`].
pub struct IdentityCollector {
    directory: Arc<dyn IDirectory>,
    instance_arn: String,
}

impl IdentityCollector {
    pub fn new(directory: Arc<dyn IDirectory>, instance_arn: &str) -> Self {
        Self {
            directory,
            instance_arn: instance_arn.to_string(),
        }
    }

    fn fresh_metadata(&self) -> BackupMetadata {
        let (region, account) = parse_instance_arn(&self.instance_arn)
            .unwrap_or_else(|| (String::new(), String::new()));
        BackupMetadata::new(&self.instance_arn, &account, &region)
    }

    /// Full snapshot of users, groups, permission sets, and assignments.
    pub async fn collect_all(&self) -> IdmanResult<BackupData> {
        let (users, groups, permission_sets, assignments) = tokio::try_join!(
            self.directory.list_users(),
            self.directory.list_groups(),
            self.directory.list_permission_sets(),
            self.directory.list_all_assignments(),
        )?;
        let mut backup = BackupData::new(self.fresh_metadata());
        backup.users = users;
        backup.groups = groups;
        backup.permission_sets = permission_sets;
        backup.assignments = assignments;
        backup.seal();
        tracing::info!(
            "collector: captured {} resources from {}",
            backup.total_resources(),
            self.instance_arn
        );
        Ok(backup)
    }

    /// Snapshot of resources modified after `since`.
    ///
    /// Users, groups, and permission sets are filtered by their
    /// directory-reported modification stamp; assignments carry no stamp
    /// and are always captured in full.
    pub async fn collect_incremental(&self, since: DateTime<Utc>) -> IdmanResult<BackupData> {
        let mut backup = self.collect_all().await?;
        backup
            .users
            .retain(|u| u.last_modified.is_some_and(|t| t > since));
        backup
            .groups
            .retain(|g| g.last_modified.is_some_and(|t| t > since));
        backup
            .permission_sets
            .retain(|p| p.last_modified.is_some_and(|t| t > since));
        backup.metadata.backup_type = BackupType::Incremental;
        backup.seal();
        Ok(backup)
    }

    /// Probe one benign read per capability, listing anything missing.
    pub async fn validate_connection(&self) -> ValidationIssues {
        let mut issues = ValidationIssues::valid();
        let mut missing = Vec::new();

        if let Err(error) = self.directory.list_instances().await {
            missing.push(format!("list_instances: {error}"));
        }
        if let Err(error) = self.directory.list_users().await {
            missing.push(format!("list_users: {error}"));
        }
        if let Err(error) = self.directory.list_groups().await {
            missing.push(format!("list_groups: {error}"));
        }
        if let Err(error) = self.directory.list_permission_sets().await {
            missing.push(format!("list_permission_sets: {error}"));
        }
        if let Err(error) = self.directory.list_all_assignments().await {
            missing.push(format!("list_assignments: {error}"));
        }
        if let Err(error) = self.directory.list_accounts().await {
            missing.push(format!("list_accounts: {error}"));
        }

        if missing.is_empty() {
            issues.add_detail("capabilities", serde_json::json!("all present"));
        } else {
            for capability in &missing {
                issues.add_error(format!("missing capability: {capability}"));
            }
        }
        issues
    }

    /// Snapshot a fleet of accounts through assumed-role directories.
    pub async fn collect_cross_account(
        factory: &dyn IDirectoryFactory,
        instance_arn: &str,
        configs: &[CrossAccountConfig],
    ) -> CrossAccountCollection {
        let mut collection = CrossAccountCollection::default();
        for config in configs {
            let directory = match factory.directory_for(config).await {
                Ok(directory) => directory,
                Err(error) => {
                    collection.errors.push(format!(
                        "account {}: {error}",
                        config.target_account_id
                    ));
                    continue;
                }
            };
            let collector = IdentityCollector::new(directory, instance_arn);
            match collector.collect_all().await {
                Ok(mut backup) => {
                    backup.metadata.source_account = config.target_account_id.clone();
                    if let Some(region) = &config.target_region {
                        backup.metadata.source_region = region.clone();
                    }
                    backup.seal();
                    collection
                        .backups
                        .insert(config.target_account_id.clone(), backup);
                }
                Err(error) => collection.errors.push(format!(
                    "account {}: {error}",
                    config.target_account_id
                )),
            }
        }
        collection
    }
}
