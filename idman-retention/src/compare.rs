//! Structured comparison between two backup versions.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use idman_core::models::BackupMetadata;

/// Version facts extracted from backup metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupVersion {
    pub backup_id: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub size_bytes: u64,
    pub resource_counts: BTreeMap<String, usize>,
    pub checksum: String,
}

impl From<&BackupMetadata> for BackupVersion {
    fn from(metadata: &BackupMetadata) -> Self {
        Self {
            backup_id: metadata.backup_id.clone(),
            timestamp: metadata.timestamp,
            version: metadata.version.clone(),
            size_bytes: metadata.size_bytes,
            resource_counts: metadata.resource_counts.clone(),
            checksum: metadata.checksum.clone(),
        }
    }
}

/// Per-kind count delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub source_count: usize,
    pub target_count: usize,
    pub difference: i64,
    /// Percent relative to the source count; zero when the source had
    /// none.
    pub percent_change: f64,
}

/// The full comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupComparison {
    pub source_version: BackupVersion,
    pub target_version: BackupVersion,
    pub resource_changes: BTreeMap<String, ResourceChange>,
    pub size_difference: i64,
    pub time_difference_secs: i64,
    /// Mean per-kind count ratio over the observed kinds, in [0, 1].
    pub similarity_score: f64,
}

/// Compare two backups by their metadata.
pub fn compare_metadata(source: &BackupMetadata, target: &BackupMetadata) -> BackupComparison {
    BackupComparison {
        source_version: BackupVersion::from(source),
        target_version: BackupVersion::from(target),
        resource_changes: resource_changes(&source.resource_counts, &target.resource_counts),
        size_difference: target.size_bytes as i64 - source.size_bytes as i64,
        time_difference_secs: (target.timestamp - source.timestamp).num_seconds().abs(),
        similarity_score: similarity_score(&source.resource_counts, &target.resource_counts),
    }
}

fn resource_changes(
    source: &BTreeMap<String, usize>,
    target: &BTreeMap<String, usize>,
) -> BTreeMap<String, ResourceChange> {
    let kinds: BTreeSet<&String> = source.keys().chain(target.keys()).collect();
    let mut changes = BTreeMap::new();
    for kind in kinds {
        let source_count = source.get(kind).copied().unwrap_or(0);
        let target_count = target.get(kind).copied().unwrap_or(0);
        let difference = target_count as i64 - source_count as i64;
        let percent_change = if source_count > 0 {
            difference as f64 / source_count as f64 * 100.0
        } else {
            0.0
        };
        changes.insert(
            kind.clone(),
            ResourceChange {
                source_count,
                target_count,
                difference,
                percent_change,
            },
        );
    }
    changes
}

/// Mean of `min(a,b)/max(a,b)` over the observed resource kinds (those
/// with a nonzero count on either side). Two backups with no observed
/// kinds are identical by definition.
pub fn similarity_score(
    source: &BTreeMap<String, usize>,
    target: &BTreeMap<String, usize>,
) -> f64 {
    let observed: BTreeSet<&String> = source
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(kind, _)| kind)
        .chain(
            target
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(kind, _)| kind),
        )
        .collect();
    if observed.is_empty() {
        return 1.0;
    }
    let mut total = 0.0;
    for kind in &observed {
        let a = source.get(*kind).copied().unwrap_or(0);
        let b = target.get(*kind).copied().unwrap_or(0);
        total += if a == 0 || b == 0 {
            0.0
        } else {
            a.min(b) as f64 / a.max(b) as f64
        };
    }
    total / observed.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn identical_counts_score_one() {
        let a = counts(&[("users", 5), ("groups", 2)]);
        assert_eq!(similarity_score(&a, &a), 1.0);
    }

    #[test]
    fn disjoint_kinds_score_zero() {
        let a = counts(&[("users", 5), ("groups", 0)]);
        let b = counts(&[("users", 0), ("groups", 3)]);
        assert_eq!(similarity_score(&a, &b), 0.0);
    }

    #[test]
    fn empty_backups_are_identical() {
        let a = counts(&[("users", 0)]);
        let b = counts(&[]);
        assert_eq!(similarity_score(&a, &b), 1.0);
    }

    #[test]
    fn partial_overlap_is_the_mean_ratio() {
        let a = counts(&[("users", 4)]);
        let b = counts(&[("users", 2)]);
        assert!((similarity_score(&a, &b) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn percent_change_is_zero_for_empty_source() {
        let changes = resource_changes(&counts(&[("users", 0)]), &counts(&[("users", 10)]));
        let change = &changes["users"];
        assert_eq!(change.difference, 10);
        assert_eq!(change.percent_change, 0.0);
    }
}
