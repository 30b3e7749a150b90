//! Streaming export: resources are written one record at a time so the
//! resident size stays bounded by a single record, not the backup.

use std::io::Write;

use idman_core::errors::{IdmanResult, StorageError};
use idman_core::models::BackupData;

fn io_error(e: std::io::Error) -> idman_core::errors::IdmanError {
    StorageError::WriteFailed {
        key: "<stream>".to_string(),
        reason: e.to_string(),
    }
    .into()
}

fn json_error(e: serde_json::Error) -> idman_core::errors::IdmanError {
    StorageError::Serialization {
        reason: e.to_string(),
    }
    .into()
}

/// Write the JSON dialect incrementally. The output is byte-for-byte
/// valid JSON and parses back with [`crate::convert::from_json`].
pub fn stream_json_export(backup: &BackupData, out: &mut dyn Write) -> IdmanResult<()> {
    out.write_all(b"{\"metadata\":").map_err(io_error)?;
    serde_json::to_writer(&mut *out, &backup.metadata).map_err(json_error)?;

    write_array(out, "users", &backup.users)?;
    write_array(out, "groups", &backup.groups)?;
    write_array(out, "permission_sets", &backup.permission_sets)?;
    write_array(out, "assignments", &backup.assignments)?;

    out.write_all(b",\"relationships\":").map_err(io_error)?;
    serde_json::to_writer(&mut *out, &backup.relationships).map_err(json_error)?;
    out.write_all(b"}").map_err(io_error)?;
    Ok(())
}

fn write_array<T: serde::Serialize>(
    out: &mut dyn Write,
    name: &str,
    items: &[T],
) -> IdmanResult<()> {
    write!(out, ",\"{name}\":[").map_err(io_error)?;
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.write_all(b",").map_err(io_error)?;
        }
        serde_json::to_writer(&mut *out, item).map_err(json_error)?;
    }
    out.write_all(b"]").map_err(io_error)?;
    Ok(())
}
