//! # idman-bulk
//!
//! Bulk assignment pipeline: file ingestion, name resolution with a
//! memoised single-flight cache, preview/confirmation gating, and the
//! bounded-concurrency batch executor with per-item retry.

pub mod executor;
pub mod ingest;
pub mod orphans;
pub mod preview;
pub mod resolver;
pub mod tuner;

pub use executor::{BatchProcessor, BulkOperation, BulkResults, ItemResult, ItemStatus};
pub use ingest::{parse_file, BulkOperationRecord, InputFormat, ParsedBatch};
pub use orphans::{OrphanCache, OrphanDetectionResult, OrphanedAssignment};
pub use preview::{gate, summarize, PreviewDecision, PreviewSummary};
pub use resolver::{ResolvedAssignment, ResourceResolver};
pub use tuner::{PerformanceConfig, PerformanceTuner};
