//! Compatibility validation between a backup and a target instance.

use std::collections::BTreeSet;
use std::sync::Arc;

use idman_core::arn::parse_instance_arn;
use idman_core::constants::{
    GROUP_COUNT_WARNING, PERMISSION_SET_COUNT_WARNING, USER_COUNT_WARNING,
};
use idman_core::errors::IdmanResult;
use idman_core::models::{BackupData, ValidationIssues};
use idman_core::traits::IDirectory;

/// Checks a backup against a target instance before restore.
pub struct CompatibilityValidator {
    directory: Arc<dyn IDirectory>,
}

impl CompatibilityValidator {
    pub fn new(directory: Arc<dyn IDirectory>) -> Self {
        Self { directory }
    }

    /// Full compatibility pass: instance accessibility, managed-policy
    /// references, cardinality warnings, and cross-account/region
    /// detection.
    pub async fn validate(
        &self,
        backup: &BackupData,
        target_instance_arn: &str,
    ) -> IdmanResult<ValidationIssues> {
        let mut issues = ValidationIssues::valid();

        let instances = self.directory.list_instances().await?;
        let accessible = instances
            .iter()
            .any(|i| i.instance_arn == target_instance_arn);
        if !accessible {
            issues.add_error(format!(
                "cannot access target instance: {target_instance_arn}"
            ));
            return Ok(issues);
        }

        if !backup.verify_integrity() {
            issues.add_error("backup data integrity check failed".to_string());
        }
        if backup.total_resources() == 0 {
            issues.add_warning("backup contains no resources to restore".to_string());
        }

        self.validate_permission_sets(backup, &mut issues).await?;
        self.validate_limits(backup, &mut issues);
        self.validate_cross_account(backup, target_instance_arn, &mut issues);

        issues.add_detail(
            "resource_counts",
            serde_json::json!(backup.metadata.resource_counts),
        );
        Ok(issues)
    }

    async fn validate_permission_sets(
        &self,
        backup: &BackupData,
        issues: &mut ValidationIssues,
    ) -> IdmanResult<()> {
        let existing: BTreeSet<String> = self
            .directory
            .list_permission_sets()
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        let mut conflicts = Vec::new();
        let mut checked: BTreeSet<&str> = BTreeSet::new();
        for permission_set in &backup.permission_sets {
            if existing.contains(&permission_set.name) {
                issues.add_warning(format!(
                    "permission set '{}' already exists and may be overwritten",
                    permission_set.name
                ));
                conflicts.push(permission_set.name.clone());
            }
            for policy_arn in &permission_set.managed_policies {
                if !checked.insert(policy_arn) {
                    continue;
                }
                if !self.directory.managed_policy_exists(policy_arn).await? {
                    issues.add_error(format!("managed policy not found: {policy_arn}"));
                }
            }
        }
        issues.add_detail("permission_set_conflicts", serde_json::json!(conflicts));
        Ok(())
    }

    fn validate_limits(&self, backup: &BackupData, issues: &mut ValidationIssues) {
        if backup.users.len() > USER_COUNT_WARNING {
            issues.add_warning(format!(
                "large number of users ({}) may approach service limits",
                backup.users.len()
            ));
        }
        if backup.groups.len() > GROUP_COUNT_WARNING {
            issues.add_warning(format!(
                "large number of groups ({}) may approach service limits",
                backup.groups.len()
            ));
        }
        if backup.permission_sets.len() > PERMISSION_SET_COUNT_WARNING {
            issues.add_warning(format!(
                "large number of permission sets ({}) may approach service limits",
                backup.permission_sets.len()
            ));
        }
    }

    fn validate_cross_account(
        &self,
        backup: &BackupData,
        target_instance_arn: &str,
        issues: &mut ValidationIssues,
    ) {
        let Some((target_region, target_account)) = parse_instance_arn(target_instance_arn)
        else {
            return;
        };
        issues.add_detail("target_account", serde_json::json!(target_account));
        issues.add_detail("target_region", serde_json::json!(target_region));
        issues.add_detail(
            "source_account",
            serde_json::json!(backup.metadata.source_account),
        );
        issues.add_detail(
            "source_region",
            serde_json::json!(backup.metadata.source_region),
        );

        if target_account != backup.metadata.source_account {
            issues.add_warning(
                "cross-account restore detected, ensure the assumed role has the required access"
                    .to_string(),
            );
            issues.add_detail("cross_account", serde_json::json!(true));
        }
        if target_region != backup.metadata.source_region {
            issues.add_warning(
                "cross-region restore detected, verify region-specific resources".to_string(),
            );
            issues.add_detail("cross_region", serde_json::json!(true));
        }
    }
}
