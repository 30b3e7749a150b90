//! # idman-backup
//!
//! Snapshot collection from the live directory and the storage engine
//! that owns backups at rest.

pub mod collector;
pub mod storage;

pub use collector::{CrossAccountCollection, IDirectoryFactory, IdentityCollector};
pub use storage::{BackupFilters, FsStorageBackend, StorageEngine};
