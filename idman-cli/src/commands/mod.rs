pub mod backup;
pub mod bulk;
pub mod export;
pub mod restore;
pub mod retention;
pub mod templates;

use idman_core::errors::IdmanError;

/// Print one failure with its recovery suggestion.
pub fn print_error(error: &IdmanError) {
    eprintln!("error: {error}");
    eprintln!("  suggestion: {}", error.recovery_suggestion());
}
