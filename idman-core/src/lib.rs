//! # idman-core
//!
//! Foundation crate for the idman identity administration toolkit.
//! Defines the typed record graph, error taxonomy, retry discipline,
//! configuration, and the capability traits the domain crates build on.
//! Every other crate in the workspace depends on this.

pub mod arn;
pub mod cancel;
pub mod config;
pub mod constants;
pub mod csvio;
pub mod errors;
pub mod models;
pub mod retry;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use cancel::CancellationToken;
pub use config::IdmanConfig;
pub use errors::{IdmanError, IdmanResult};
pub use models::{
    AssignmentData, BackupData, BackupMetadata, GroupData, PermissionSetData, PrincipalType,
    UserData,
};
