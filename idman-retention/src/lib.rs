//! # idman-retention
//!
//! Retention over stored backups: age categorisation, keep-N
//! enforcement, storage usage accounting with limit alerts, structured
//! comparison between backup versions, and policy recommendations.

pub mod compare;
pub mod engine;
pub mod usage;

pub use compare::{BackupComparison, BackupVersion, ResourceChange};
pub use engine::{CleanupResult, RetentionManager, RetentionPeriod};
pub use usage::{AlertLevel, Recommendation, StorageAlert, StorageUsage};
