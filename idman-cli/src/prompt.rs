//! Terminal prompter with the documented non-interactive fallback.

use std::io::{IsTerminal, Write};

use idman_core::models::{ConflictAction, ConflictInfo};
use idman_core::traits::IPrompter;

/// Prompts on stdin when attached to a terminal; otherwise falls back
/// to the conflict's suggested action (or skip) and declines
/// confirmations.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl IPrompter for StdinPrompter {
    fn confirm(&self, question: &str) -> bool {
        if !std::io::stdin().is_terminal() {
            return false;
        }
        print!("{question} [y/N]: ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }

    fn resolve_conflict(&self, conflict: &ConflictInfo) -> ConflictAction {
        if !std::io::stdin().is_terminal() {
            return conflict.suggested_action.unwrap_or(ConflictAction::Skip);
        }
        print!(
            "conflict on {} '{}': [o]verwrite, [s]kip, [m]erge? ",
            conflict.resource_type, conflict.resource_id
        );
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return ConflictAction::Skip;
        }
        match line.trim() {
            "o" | "overwrite" => ConflictAction::Overwrite,
            "m" | "merge" => ConflictAction::Merge,
            _ => ConflictAction::Skip,
        }
    }
}
