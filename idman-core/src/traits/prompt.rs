//! Interactive confirmation seam.

use crate::models::{ConflictAction, ConflictInfo};

/// Answers confirmation questions and conflict decisions.
///
/// Injected so restore and bulk flows are testable without a terminal.
pub trait IPrompter: Send + Sync {
    /// Yes/no confirmation before a destructive step.
    fn confirm(&self, question: &str) -> bool;

    /// Decide a single conflict.
    fn resolve_conflict(&self, conflict: &ConflictInfo) -> ConflictAction;
}

/// Non-interactive prompter: the documented fallback for non-TTY contexts.
///
/// Confirms according to `assume_yes`; conflicts use the suggested action
/// when present, otherwise skip.
#[derive(Debug, Clone, Copy)]
pub struct AutoPrompter {
    pub assume_yes: bool,
}

impl Default for AutoPrompter {
    fn default() -> Self {
        Self { assume_yes: true }
    }
}

impl IPrompter for AutoPrompter {
    fn confirm(&self, _question: &str) -> bool {
        self.assume_yes
    }

    fn resolve_conflict(&self, conflict: &ConflictInfo) -> ConflictAction {
        conflict.suggested_action.unwrap_or(ConflictAction::Skip)
    }
}
