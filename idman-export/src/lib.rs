//! # idman-export
//!
//! Portable export/import of backup data across three interchange
//! dialects (typed JSON, human-readable YAML, tabular CSV), optional
//! zstd compression with auto-detection, and streaming export.

pub mod compress;
pub mod convert;
pub mod manager;
pub mod stream;

pub use convert::{ExportDialect, ExportFormat};
pub use manager::ExportImportManager;
