//! # idman-restore
//!
//! Dependency-ordered replay of a backup into a target instance:
//! users, then groups, then permission sets, then assignments, with
//! conflict resolution, compatibility validation, a rollback journal,
//! and checkpointed recovery.

pub mod compat;
pub mod conflict;
pub mod engine;
pub mod mapping;
pub mod rollback;
pub mod state;

pub use compat::CompatibilityValidator;
pub use conflict::ConflictResolver;
pub use engine::RestoreEngine;
pub use mapping::apply_resource_mappings;
pub use rollback::RollbackManager;
pub use state::{
    AppliedChange, ChangeAction, Checkpoint, OperationState, OperationStateStore, OperationSummary,
    RollbackAction,
};
