//! Preview summary and interactive confirmation gating.

use std::collections::BTreeSet;

use idman_core::traits::IPrompter;

use crate::executor::BulkOperation;
use crate::resolver::ResolvedAssignment;

/// What a planned batch would touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSummary {
    pub operation: BulkOperation,
    pub total: usize,
    pub resolvable: usize,
    pub unresolvable: usize,
    pub principals: BTreeSet<String>,
    pub permission_sets: BTreeSet<String>,
    pub accounts: BTreeSet<String>,
}

/// Outcome of the preview gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewDecision {
    /// Dry-run requested: preview emitted, nothing executes. Exit 0.
    DryRunComplete,
    /// Confirmed (or forced): hand the batch to the executor.
    Proceed,
    /// The user said no at the prompt. Exit 0.
    Cancelled,
    /// Unresolvable records remain and this is not a dry-run. Exit 1.
    AbortUnresolvable,
}

/// Summarise a resolved batch.
pub fn summarize(resolved: &[ResolvedAssignment], operation: BulkOperation) -> PreviewSummary {
    let mut summary = PreviewSummary {
        operation,
        total: resolved.len(),
        resolvable: 0,
        unresolvable: 0,
        principals: BTreeSet::new(),
        permission_sets: BTreeSet::new(),
        accounts: BTreeSet::new(),
    };
    for item in resolved {
        if item.success() {
            summary.resolvable += 1;
        } else {
            summary.unresolvable += 1;
        }
        summary
            .principals
            .insert(item.record.principal_name.clone());
        summary
            .permission_sets
            .insert(item.record.permission_set_name.clone());
        summary.accounts.insert(item.record.account_name.clone());
    }
    summary
}

/// Apply the dry-run / unresolvable / force gates, prompting only when
/// needed.
pub fn gate(
    summary: &PreviewSummary,
    dry_run: bool,
    force: bool,
    prompter: &dyn IPrompter,
) -> PreviewDecision {
    if dry_run {
        return PreviewDecision::DryRunComplete;
    }
    if summary.unresolvable > 0 || summary.resolvable == 0 {
        return PreviewDecision::AbortUnresolvable;
    }
    if force {
        return PreviewDecision::Proceed;
    }
    let question = format!(
        "Proceed with {} of {} assignments ({} principals, {} permission sets, {} accounts)?",
        summary.operation, summary.resolvable, summary.principals.len(),
        summary.permission_sets.len(), summary.accounts.len()
    );
    if prompter.confirm(&question) {
        PreviewDecision::Proceed
    } else {
        PreviewDecision::Cancelled
    }
}
