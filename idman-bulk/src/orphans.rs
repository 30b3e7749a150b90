//! Orphaned-assignment detection with a short-lived on-disk cache.
//!
//! An assignment is orphaned when its principal no longer exists in the
//! identity store. Detection walks every assignment, so results are
//! cached per profile under the OS temp directory and reused within a
//! validity window (default one hour); stale files are ignored and
//! removed.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use idman_core::constants::DEFAULT_ORPHAN_CACHE_TTL_SECS;
use idman_core::errors::{IdmanResult, StorageError};
use idman_core::models::AssignmentData;
use idman_core::traits::IDirectory;

/// One assignment whose principal could not be resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanedAssignment {
    #[serde(flatten)]
    pub assignment: AssignmentData,
    pub permission_set_name: String,
    pub account_name: String,
    pub reason: String,
}

/// Cached detection outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanDetectionResult {
    pub timestamp: DateTime<Utc>,
    pub profile: String,
    pub orphaned_assignments: Vec<OrphanedAssignment>,
}

/// Walk all assignments and flag those whose principal is gone.
pub async fn detect_orphans(
    directory: Arc<dyn IDirectory>,
    profile: &str,
) -> IdmanResult<OrphanDetectionResult> {
    let assignments = directory.list_all_assignments().await?;
    let user_ids: BTreeSet<String> = directory
        .list_users()
        .await?
        .into_iter()
        .map(|u| u.user_id)
        .collect();
    let group_ids: BTreeSet<String> = directory
        .list_groups()
        .await?
        .into_iter()
        .map(|g| g.group_id)
        .collect();
    let permission_sets = directory.list_permission_sets().await?;
    let accounts = directory.list_accounts().await?;

    let mut orphaned = Vec::new();
    for assignment in assignments {
        let known = match assignment.principal_type {
            idman_core::models::PrincipalType::User => user_ids.contains(&assignment.principal_id),
            idman_core::models::PrincipalType::Group => {
                group_ids.contains(&assignment.principal_id)
            }
        };
        if known {
            continue;
        }
        let permission_set_name = permission_sets
            .iter()
            .find(|p| p.permission_set_arn == assignment.permission_set_arn)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| assignment.permission_set_arn.clone());
        let account_name = accounts
            .iter()
            .find(|a| a.account_id == assignment.account_id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| assignment.account_id.clone());
        orphaned.push(OrphanedAssignment {
            reason: format!(
                "{} {} not found in identity store",
                assignment.principal_type, assignment.principal_id
            ),
            permission_set_name,
            account_name,
            assignment,
        });
    }
    tracing::info!(
        "orphans: detected {} orphaned assignments for profile {profile}",
        orphaned.len()
    );
    Ok(OrphanDetectionResult {
        timestamp: Utc::now(),
        profile: profile.to_string(),
        orphaned_assignments: orphaned,
    })
}

/// Per-profile detection-result cache under the OS temp directory.
#[derive(Debug, Clone)]
pub struct OrphanCache {
    root: PathBuf,
    ttl: Duration,
}

impl Default for OrphanCache {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir(),
            ttl: Duration::from_secs(DEFAULT_ORPHAN_CACHE_TTL_SECS),
        }
    }
}

impl OrphanCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    /// Override the cache root (tests).
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = root;
        self
    }

    /// `<root>/idman/orphaned_cleanup/<profile>_orphaned_assignments.json`
    pub fn cache_file_path(&self, profile: &str) -> PathBuf {
        self.root
            .join("idman")
            .join("orphaned_cleanup")
            .join(format!("{profile}_orphaned_assignments.json"))
    }

    /// Persist a detection result for later reuse.
    pub fn save(&self, result: &OrphanDetectionResult) -> IdmanResult<PathBuf> {
        let path = self.cache_file_path(&result.profile);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::WriteFailed {
                key: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        let payload =
            serde_json::to_vec_pretty(result).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        std::fs::write(&path, payload).map_err(|e| StorageError::WriteFailed {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(path)
    }

    /// Load a fresh cached result, or None when the cache is missing,
    /// unreadable, or older than the validity window (stale files are
    /// deleted).
    pub fn load(&self, profile: &str) -> Option<OrphanDetectionResult> {
        let path = self.cache_file_path(profile);
        let content = std::fs::read_to_string(&path).ok()?;
        let result: OrphanDetectionResult = serde_json::from_str(&content).ok()?;
        let age = Utc::now().signed_duration_since(result.timestamp);
        if age.num_seconds() < 0 || age.num_seconds() as u64 > self.ttl.as_secs() {
            let _ = std::fs::remove_file(&path);
            return None;
        }
        Some(result)
    }

    /// Drop a profile's cache file if present.
    pub fn clear(&self, profile: &str) {
        let _ = std::fs::remove_file(self.cache_file_path(profile));
    }
}
