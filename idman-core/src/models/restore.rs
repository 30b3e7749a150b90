//! Restore options, conflict records, and result types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource kinds a restore can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Users,
    Groups,
    PermissionSets,
    Assignments,
    All,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceType::Users => "users",
            ResourceType::Groups => "groups",
            ResourceType::PermissionSets => "permission_sets",
            ResourceType::Assignments => "assignments",
            ResourceType::All => "all",
        };
        write!(f, "{label}")
    }
}

/// How to resolve a conflict with an existing resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Always replace the existing resource.
    Overwrite,
    /// Always keep the existing resource (default).
    #[default]
    Skip,
    /// Semantics-aware merge; falls back to overwrite for kinds where a
    /// field-level merge is not meaningful.
    Merge,
    /// Ask the injected prompter; non-interactive contexts use the
    /// conflict's suggested action, else skip.
    Prompt,
}

/// Concrete action chosen for a single conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    Overwrite,
    Skip,
    Merge,
}

/// A detected collision between a backup record and the live instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub resource_type: ResourceType,
    /// Natural key of the conflicting resource.
    pub resource_id: String,
    pub conflict_type: String,
    pub existing_value: serde_json::Value,
    pub new_value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<ConflictAction>,
}

/// Assumed-role configuration for restoring into another account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossAccountConfig {
    pub target_account_id: String,
    pub role_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_region: Option<String>,
}

/// Rewrites applied to backup data before a cross-namespace restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMapping {
    pub source_account_id: String,
    pub target_account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_region: Option<String>,
    /// Optional permission set renames, source name -> target name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permission_set_name_map: BTreeMap<String, String>,
}

/// Options controlling a restore run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreOptions {
    /// Resource kinds to replay; `All` expands to every kind.
    pub target_resources: Vec<ResourceType>,
    pub conflict_strategy: ConflictStrategy,
    pub dry_run: bool,
    /// Instance to restore into; defaults to the backup's source instance.
    pub target_instance_arn: Option<String>,
    pub cross_account: Option<CrossAccountConfig>,
    pub resource_mappings: Vec<ResourceMapping>,
    pub skip_validation: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            target_resources: vec![ResourceType::All],
            conflict_strategy: ConflictStrategy::default(),
            dry_run: false,
            target_instance_arn: None,
            cross_account: None,
            resource_mappings: Vec::new(),
            skip_validation: false,
        }
    }
}

impl RestoreOptions {
    /// Whether `kind` is selected by the target-resources filter.
    pub fn targets(&self, kind: ResourceType) -> bool {
        self.target_resources.contains(&kind) || self.target_resources.contains(&ResourceType::All)
    }
}

/// Outcome of walking the rollback journal after a failed restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackSummary {
    pub success: bool,
    pub applied_changes_reverted: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Outcome of a restore run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResult {
    pub success: bool,
    pub message: String,
    pub operation_id: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Resource kind -> number of changes applied.
    #[serde(default)]
    pub changes_applied: BTreeMap<String, usize>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackSummary>,
}

/// What a restore would do, without doing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestorePreview {
    /// Resource kind -> number of records that would be processed.
    #[serde(default)]
    pub changes_summary: BTreeMap<String, usize>,
    #[serde(default)]
    pub conflicts: Vec<ConflictInfo>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_targets_every_kind() {
        let options = RestoreOptions::default();
        assert!(options.targets(ResourceType::Users));
        assert!(options.targets(ResourceType::Assignments));
    }

    #[test]
    fn explicit_targets_are_exclusive() {
        let options = RestoreOptions {
            target_resources: vec![ResourceType::Groups],
            ..Default::default()
        };
        assert!(options.targets(ResourceType::Groups));
        assert!(!options.targets(ResourceType::Users));
    }
}
