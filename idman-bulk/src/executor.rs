//! Bounded-concurrency batch executor with per-item retry.
//!
//! Records are divided into fixed-size batches; within a batch,
//! operations run concurrently under a semaphore bound. Each operation is
//! existence-checked first so repeats are idempotent no-ops, retried on
//! transient failures, and individually timed.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use idman_core::cancel::CancellationToken;
use idman_core::constants::{DEFAULT_ITEM_TIMEOUT_SECS, MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use idman_core::errors::{ExecutionError, IdmanResult};
use idman_core::retry::{retry_with_backoff, RetryConfig};
use idman_core::traits::IDirectory;

use crate::ingest::BulkOperationRecord;
use crate::resolver::ResolvedAssignment;
use crate::tuner::PerformanceConfig;

/// Which way the batch mutates assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperation {
    Assign,
    Revoke,
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkOperation::Assign => write!(f, "assign"),
            BulkOperation::Revoke => write!(f, "revoke"),
        }
    }
}

/// Per-item outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Created,
    Deleted,
    /// Assign target already present: success, no create issued.
    AlreadyExists,
    /// Revoke target already absent: success, no delete issued.
    AlreadyAbsent,
    /// Dry-run: counted, no directory calls.
    DryRun,
    Failed,
    /// Not started because the run was cancelled or stopped on error.
    Cancelled,
}

/// One record's outcome with timing.
#[derive(Debug, Clone)]
pub struct ItemResult {
    pub record: BulkOperationRecord,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Aggregate outcome of a batch run.
#[derive(Debug)]
pub struct BulkResults {
    pub operation: BulkOperation,
    pub successful: Vec<ItemResult>,
    pub failed: Vec<ItemResult>,
    pub skipped: Vec<ItemResult>,
    pub total_processed: usize,
    pub duration_ms: u64,
}

impl BulkResults {
    pub fn success_count(&self) -> usize {
        self.successful.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn skip_count(&self) -> usize {
        self.skipped.len()
    }

    /// True when nothing hard-failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The batch executor.
pub struct BatchProcessor {
    directory: Arc<dyn IDirectory>,
    batch_size: usize,
    max_concurrent: usize,
    rate_delay: Duration,
    item_timeout: Duration,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl BatchProcessor {
    pub fn new(directory: Arc<dyn IDirectory>) -> Self {
        Self {
            directory,
            batch_size: idman_core::constants::DEFAULT_BATCH_SIZE,
            max_concurrent: 10,
            rate_delay: Duration::from_millis(100),
            item_timeout: Duration::from_secs(DEFAULT_ITEM_TIMEOUT_SECS),
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Clamp and set the batch size (valid range 1 to 50).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
        self
    }

    /// Apply a tuner preset.
    pub fn with_tuning(mut self, config: &PerformanceConfig) -> Self {
        self.batch_size = config.batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
        self.max_concurrent = config.max_concurrent_accounts.max(1);
        self.rate_delay = config.rate_limit_delay;
        self.item_timeout = config.item_timeout;
        self.retry.max_retries = config.max_retries;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Apply `operation` to every record.
    ///
    /// `continue_on_error = false` stops dispatching after the first hard
    /// failure; in-flight items finish, un-started items are recorded as
    /// cancelled. Ordering between concurrent items is not guaranteed.
    pub async fn process(
        &self,
        records: Vec<ResolvedAssignment>,
        operation: BulkOperation,
        instance_arn: &str,
        dry_run: bool,
        continue_on_error: bool,
    ) -> BulkResults {
        let started = Instant::now();
        let total = records.len();
        tracing::info!(
            "executor: {operation} of {total} records on {instance_arn} \
             (batch={}, concurrency={}, dry_run={dry_run})",
            self.batch_size,
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let stop = Arc::new(AtomicBool::new(false));
        let mut outcomes: Vec<ItemResult> = Vec::with_capacity(total);

        let mut pending = records.into_iter().peekable();
        while pending.peek().is_some() {
            if self.cancel.is_cancelled() || stop.load(Ordering::SeqCst) {
                break;
            }
            let batch: Vec<ResolvedAssignment> =
                pending.by_ref().take(self.batch_size).collect();

            let mut tasks = JoinSet::new();
            for item in batch {
                let semaphore = Arc::clone(&semaphore);
                let directory = Arc::clone(&self.directory);
                let stop = Arc::clone(&stop);
                let cancel = self.cancel.clone();
                let retry = self.retry;
                let item_timeout = self.item_timeout;
                let rate_delay = self.rate_delay;
                tasks.spawn(async move {
                    let permit = semaphore.acquire_owned().await;
                    if permit.is_err() || stop.load(Ordering::SeqCst) || cancel.is_cancelled() {
                        return cancelled_item(item.record);
                    }
                    let outcome =
                        process_one(directory, item, operation, dry_run, retry, item_timeout)
                            .await;
                    if !rate_delay.is_zero() && !dry_run {
                        tokio::time::sleep(rate_delay).await;
                    }
                    outcome
                });
            }

            while let Some(joined) = tasks.join_next().await {
                if let Ok(item_result) = joined {
                    if item_result.status == ItemStatus::Failed && !continue_on_error {
                        stop.store(true, Ordering::SeqCst);
                    }
                    outcomes.push(item_result);
                }
            }
        }

        // Anything never dispatched was cancelled by stop-on-error or the
        // run-level token.
        for item in pending {
            outcomes.push(cancelled_item(item.record));
        }

        let mut results = BulkResults {
            operation,
            successful: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            total_processed: outcomes.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        for outcome in outcomes {
            match outcome.status {
                ItemStatus::Created | ItemStatus::Deleted | ItemStatus::DryRun => {
                    results.successful.push(outcome)
                }
                ItemStatus::AlreadyExists
                | ItemStatus::AlreadyAbsent
                | ItemStatus::Cancelled => results.skipped.push(outcome),
                ItemStatus::Failed => results.failed.push(outcome),
            }
        }
        tracing::info!(
            "executor: {operation} finished: {} ok, {} failed, {} skipped in {}ms",
            results.success_count(),
            results.failure_count(),
            results.skip_count(),
            results.duration_ms
        );
        results
    }
}

fn cancelled_item(record: BulkOperationRecord) -> ItemResult {
    ItemResult {
        record,
        status: ItemStatus::Cancelled,
        error: Some("not started: run cancelled".to_string()),
        duration_ms: 0,
    }
}

async fn process_one(
    directory: Arc<dyn IDirectory>,
    item: ResolvedAssignment,
    operation: BulkOperation,
    dry_run: bool,
    retry: RetryConfig,
    item_timeout: Duration,
) -> ItemResult {
    let started = Instant::now();
    let record = item.record.clone();

    if dry_run {
        return ItemResult {
            record,
            status: ItemStatus::DryRun,
            error: None,
            duration_ms: started.elapsed().as_millis() as u64,
        };
    }

    let Some(assignment) = item.to_assignment() else {
        return ItemResult {
            record,
            status: ItemStatus::Failed,
            error: Some("record was not fully resolved".to_string()),
            duration_ms: started.elapsed().as_millis() as u64,
        };
    };

    let work = async {
        // Idempotence check before any mutation.
        let existing = {
            let directory = Arc::clone(&directory);
            let assignment = assignment.clone();
            retry_with_backoff(&retry, "list_assignments", move || {
                let directory = Arc::clone(&directory);
                let assignment = assignment.clone();
                async move {
                    directory
                        .list_assignments(&assignment.account_id, &assignment.permission_set_arn)
                        .await
                }
            })
            .await?
        };
        let present = existing.iter().any(|a| {
            a.principal_id == assignment.principal_id
                && a.principal_type == assignment.principal_type
        });

        match (operation, present) {
            (BulkOperation::Assign, true) => Ok(ItemStatus::AlreadyExists),
            (BulkOperation::Revoke, false) => Ok(ItemStatus::AlreadyAbsent),
            (BulkOperation::Assign, false) => {
                let directory = Arc::clone(&directory);
                let assignment = assignment.clone();
                retry_with_backoff(&retry, "create_assignment", move || {
                    let directory = Arc::clone(&directory);
                    let assignment = assignment.clone();
                    async move { directory.create_assignment(&assignment).await }
                })
                .await?;
                Ok(ItemStatus::Created)
            }
            (BulkOperation::Revoke, true) => {
                let directory = Arc::clone(&directory);
                let assignment = assignment.clone();
                retry_with_backoff(&retry, "delete_assignment", move || {
                    let directory = Arc::clone(&directory);
                    let assignment = assignment.clone();
                    async move { directory.delete_assignment(&assignment).await }
                })
                .await?;
                Ok(ItemStatus::Deleted)
            }
        }
    };

    let outcome: IdmanResult<ItemStatus> = match tokio::time::timeout(item_timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(ExecutionError::Timeout {
            operation: format!("{operation} {}", assignment.assignment_key()),
            seconds: item_timeout.as_secs(),
        }
        .into()),
    };

    match outcome {
        Ok(status) => ItemResult {
            record,
            status,
            error: None,
            duration_ms: started.elapsed().as_millis() as u64,
        },
        Err(error) => ItemResult {
            record,
            status: ItemStatus::Failed,
            error: Some(format!("{error}. {}", error.recovery_suggestion())),
            duration_ms: started.elapsed().as_millis() as u64,
        },
    }
}
