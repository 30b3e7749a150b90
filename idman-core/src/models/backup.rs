//! Backup aggregate: record lists, relationship map, metadata, integrity.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::{AssignmentData, GroupData, PermissionSetData, UserData};
use super::retention::RetentionPolicy;
use crate::constants::BACKUP_FORMAT_VERSION;

/// Whether a backup captured everything or only changes since a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BackupType {
    #[default]
    Full,
    Incremental,
}

/// How the stored payload was encrypted, carried alongside the data so
/// the provider can decrypt it later. `"none"` means plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionMetadata {
    pub algorithm: String,
    pub key_id: Option<String>,
}

impl Default for EncryptionMetadata {
    fn default() -> Self {
        Self {
            algorithm: "none".to_string(),
            key_id: None,
        }
    }
}

/// Derived cross-references between the flat record lists.
///
/// Rebuildable from the records themselves; persisted so consumers can
/// answer membership questions without re-deriving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMap {
    /// user id -> group ids the user belongs to.
    #[serde(default)]
    pub user_groups: BTreeMap<String, Vec<String>>,
    /// group id -> member user ids.
    #[serde(default)]
    pub group_members: BTreeMap<String, Vec<String>>,
    /// permission set arn -> assignment keys referencing it.
    #[serde(default)]
    pub permission_set_assignments: BTreeMap<String, Vec<String>>,
}

/// Descriptive record stored next to every backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub backup_id: String,
    pub timestamp: DateTime<Utc>,
    pub instance_arn: String,
    pub source_account: String,
    pub source_region: String,
    #[serde(default)]
    pub backup_type: BackupType,
    pub version: String,
    #[serde(default)]
    pub retention_policy: RetentionPolicy,
    #[serde(default)]
    pub encryption: EncryptionMetadata,
    /// Resource kind -> record count at capture time.
    #[serde(default)]
    pub resource_counts: BTreeMap<String, usize>,
    #[serde(default)]
    pub size_bytes: u64,
    /// Hex blake3 digest of the normalised record graph.
    #[serde(default)]
    pub checksum: String,
}

impl BackupMetadata {
    /// Fresh metadata for a new capture of `instance_arn`.
    pub fn new(instance_arn: &str, source_account: &str, source_region: &str) -> Self {
        Self {
            backup_id: format!("backup-{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            instance_arn: instance_arn.to_string(),
            source_account: source_account.to_string(),
            source_region: source_region.to_string(),
            backup_type: BackupType::Full,
            version: BACKUP_FORMAT_VERSION.to_string(),
            retention_policy: RetentionPolicy::default(),
            encryption: EncryptionMetadata::default(),
            resource_counts: BTreeMap::new(),
            size_bytes: 0,
            checksum: String::new(),
        }
    }
}

/// Complete snapshot of an instance's identity configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    pub metadata: BackupMetadata,
    #[serde(default)]
    pub users: Vec<UserData>,
    #[serde(default)]
    pub groups: Vec<GroupData>,
    #[serde(default)]
    pub permission_sets: Vec<PermissionSetData>,
    #[serde(default)]
    pub assignments: Vec<AssignmentData>,
    #[serde(default)]
    pub relationships: RelationshipMap,
}

impl BackupData {
    /// Empty backup shell for the given metadata.
    pub fn new(metadata: BackupMetadata) -> Self {
        Self {
            metadata,
            users: Vec::new(),
            groups: Vec::new(),
            permission_sets: Vec::new(),
            assignments: Vec::new(),
            relationships: RelationshipMap::default(),
        }
    }

    /// Total records across all four kinds.
    pub fn total_resources(&self) -> usize {
        self.users.len() + self.groups.len() + self.permission_sets.len() + self.assignments.len()
    }

    /// Rebuild the relationship map from the flat record lists.
    pub fn rebuild_relationships(&mut self) {
        let mut map = RelationshipMap::default();
        for group in &self.groups {
            map.group_members
                .insert(group.group_id.clone(), group.members.clone());
            for member in &group.members {
                map.user_groups
                    .entry(member.clone())
                    .or_default()
                    .push(group.group_id.clone());
            }
        }
        for assignment in &self.assignments {
            map.permission_set_assignments
                .entry(assignment.permission_set_arn.clone())
                .or_default()
                .push(assignment.assignment_key());
        }
        self.relationships = map;
    }

    /// Recompute counts, relationships, size, and checksum.
    ///
    /// Call after the record lists are final and before handing the
    /// backup to storage.
    pub fn seal(&mut self) {
        self.rebuild_relationships();
        let mut counts = BTreeMap::new();
        counts.insert("users".to_string(), self.users.len());
        counts.insert("groups".to_string(), self.groups.len());
        counts.insert("permission_sets".to_string(), self.permission_sets.len());
        counts.insert("assignments".to_string(), self.assignments.len());
        self.metadata.resource_counts = counts;
        self.metadata.checksum = self.compute_checksum();
        self.metadata.size_bytes = serde_json::to_vec(self).map(|v| v.len() as u64).unwrap_or(0);
    }

    /// Deterministic digest of the normalised record graph.
    ///
    /// Normalisation: users sorted by user name, groups by display name,
    /// permission sets by name, assignments by the identity 4-tuple; each
    /// section serialized independently and fed length-prefixed into one
    /// hasher. Metadata is excluded (it contains the checksum itself).
    pub fn compute_checksum(&self) -> String {
        let mut users = self.users.clone();
        users.sort_by(|a, b| a.user_name.cmp(&b.user_name));
        let mut groups = self.groups.clone();
        groups.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        let mut permission_sets = self.permission_sets.clone();
        permission_sets.sort_by(|a, b| a.name.cmp(&b.name));
        let mut assignments = self.assignments.clone();
        assignments.sort();

        let mut hasher = blake3::Hasher::new();
        for section in [
            serde_json::to_vec(&users).unwrap_or_default(),
            serde_json::to_vec(&groups).unwrap_or_default(),
            serde_json::to_vec(&permission_sets).unwrap_or_default(),
            serde_json::to_vec(&assignments).unwrap_or_default(),
        ] {
            hasher.update(&(section.len() as u64).to_le_bytes());
            hasher.update(&section);
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Whether the stored checksum matches a recomputation.
    pub fn verify_integrity(&self) -> bool {
        !self.metadata.checksum.is_empty() && self.metadata.checksum == self.compute_checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrincipalType;

    fn sample_backup() -> BackupData {
        let mut backup = BackupData::new(BackupMetadata::new(
            "arn:aws:sso:::instance/ins-1",
            "123456789012",
            "us-east-1",
        ));
        backup.users.push(UserData {
            user_id: "u-1".to_string(),
            user_name: "alice".to_string(),
            display_name: Some("Alice".to_string()),
            email: Some("alice@example.com".to_string()),
            given_name: None,
            family_name: None,
            active: true,
            external_ids: BTreeMap::new(),
            last_modified: None,
        });
        backup.groups.push(GroupData {
            group_id: "g-1".to_string(),
            display_name: "devs".to_string(),
            description: None,
            members: vec!["u-1".to_string()],
            last_modified: None,
        });
        backup.assignments.push(AssignmentData {
            account_id: "123456789012".to_string(),
            permission_set_arn: "arn:aws:sso:::permissionSet/ins-1/ps-1".to_string(),
            principal_type: PrincipalType::User,
            principal_id: "u-1".to_string(),
        });
        backup
    }

    #[test]
    fn seal_fills_counts_relationships_and_checksum() {
        let mut backup = sample_backup();
        backup.seal();
        assert_eq!(backup.metadata.resource_counts["users"], 1);
        assert_eq!(backup.metadata.resource_counts["assignments"], 1);
        assert_eq!(backup.relationships.user_groups["u-1"], vec!["g-1"]);
        assert!(backup.verify_integrity());
        assert!(backup.metadata.size_bytes > 0);
    }

    #[test]
    fn checksum_is_order_insensitive() {
        let mut a = sample_backup();
        a.users.push(UserData {
            user_id: "u-2".to_string(),
            user_name: "bob".to_string(),
            display_name: None,
            email: None,
            given_name: None,
            family_name: None,
            active: true,
            external_ids: BTreeMap::new(),
            last_modified: None,
        });
        let mut b = a.clone();
        b.users.reverse();
        assert_eq!(a.compute_checksum(), b.compute_checksum());
    }

    #[test]
    fn mutation_breaks_integrity() {
        let mut backup = sample_backup();
        backup.seal();
        backup.users[0].email = Some("other@example.com".to_string());
        assert!(!backup.verify_integrity());
    }
}
