//! Resource mapping: rewrite a backup into a target namespace.
//!
//! Builds a new [`BackupData`] with the mapped fields rewritten rather
//! than deep-copying and mutating in place, so it is explicit which
//! fields change: permission set arns and names, assignment account ids
//! and arns, and the source account/region in the metadata.

use idman_core::models::{BackupData, ResourceMapping};

/// Apply `mappings` to a backup, returning the rewritten copy. The
/// original is untouched; the copy is re-sealed.
pub fn apply_resource_mappings(backup: &BackupData, mappings: &[ResourceMapping]) -> BackupData {
    if mappings.is_empty() {
        return backup.clone();
    }

    let mut mapped = BackupData::new(backup.metadata.clone());
    mapped.users = backup.users.clone();
    mapped.groups = backup.groups.clone();

    mapped.permission_sets = backup
        .permission_sets
        .iter()
        .map(|permission_set| {
            let mut rewritten = permission_set.clone();
            rewritten.permission_set_arn = map_arn(&rewritten.permission_set_arn, mappings);
            rewritten.name = map_name(&rewritten.name, mappings);
            rewritten
        })
        .collect();

    mapped.assignments = backup
        .assignments
        .iter()
        .map(|assignment| {
            let mut rewritten = assignment.clone();
            rewritten.account_id = map_account(&rewritten.account_id, mappings);
            rewritten.permission_set_arn = map_arn(&rewritten.permission_set_arn, mappings);
            rewritten
        })
        .collect();

    // Metadata follows the first mapping's target namespace.
    let primary = &mappings[0];
    mapped.metadata.source_account = primary.target_account_id.clone();
    if let Some(region) = &primary.target_region {
        mapped.metadata.source_region = region.clone();
    }

    mapped.seal();
    tracing::info!(
        "mapping: applied {} resource mappings to backup {}",
        mappings.len(),
        backup.metadata.backup_id
    );
    mapped
}

fn map_arn(arn: &str, mappings: &[ResourceMapping]) -> String {
    let mut mapped = arn.to_string();
    for mapping in mappings {
        if mapped.contains(&mapping.source_account_id) {
            mapped = mapped.replace(&mapping.source_account_id, &mapping.target_account_id);
        }
        if let (Some(source), Some(target)) = (&mapping.source_region, &mapping.target_region) {
            if mapped.contains(source.as_str()) {
                mapped = mapped.replace(source.as_str(), target.as_str());
            }
        }
    }
    mapped
}

fn map_account(account_id: &str, mappings: &[ResourceMapping]) -> String {
    for mapping in mappings {
        if account_id == mapping.source_account_id {
            return mapping.target_account_id.clone();
        }
    }
    account_id.to_string()
}

fn map_name(name: &str, mappings: &[ResourceMapping]) -> String {
    for mapping in mappings {
        if let Some(mapped) = mapping.permission_set_name_map.get(name) {
            return mapped.clone();
        }
    }
    name.to_string()
}
