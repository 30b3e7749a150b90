//! Export/import orchestration over the storage engine.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use idman_backup::storage::StorageEngine;
use idman_core::errors::{IdmanResult, ParsingError, StorageError, ValidationError};
use idman_core::models::{BackupData, ValidationIssues};

use crate::compress;
use crate::convert::{self, ExportDialect, ExportFormat};
use crate::stream;

/// Exports stored backups to interchange files and imports them back.
pub struct ExportImportManager {
    storage: Arc<StorageEngine>,
}

impl ExportImportManager {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Export a stored backup to `target_path` in the given format.
    ///
    /// The CSV dialect writes a directory of per-table files; the other
    /// dialects write a single file. JSON exports stream record by
    /// record.
    pub async fn export_backup(
        &self,
        backup_id: &str,
        format: ExportFormat,
        target_path: &Path,
    ) -> IdmanResult<()> {
        let Some(backup) = self.storage.retrieve(backup_id).await? else {
            return Err(StorageError::BackupNotFound {
                backup_id: backup_id.to_string(),
            }
            .into());
        };
        if !backup.verify_integrity() {
            tracing::warn!("export: backup {backup_id} failed its integrity check");
        }
        tracing::info!(
            "export: writing backup {backup_id} to {} as {:?}",
            target_path.display(),
            format.dialect
        );

        if let Some(parent) = target_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::WriteFailed {
                key: target_path.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        match format.dialect {
            ExportDialect::Json => {
                let mut payload = Vec::new();
                stream::stream_json_export(&backup, &mut payload)?;
                write_payload(target_path, payload, format.compressed)?;
            }
            ExportDialect::Yaml => {
                let payload = convert::to_yaml(&backup)?.into_bytes();
                write_payload(target_path, payload, format.compressed)?;
            }
            ExportDialect::Csv => {
                std::fs::create_dir_all(target_path).map_err(|e| StorageError::WriteFailed {
                    key: target_path.display().to_string(),
                    reason: e.to_string(),
                })?;
                for (table, content) in convert::to_csv(&backup)? {
                    let extension = if format.compressed { "csv.zst" } else { "csv" };
                    let file = target_path.join(format!("{table}.{extension}"));
                    write_payload(&file, content.into_bytes(), format.compressed)?;
                }
            }
        }
        Ok(())
    }

    /// Import backup data from a file (or CSV directory), validate it,
    /// and store it under a freshly minted backup id.
    pub async fn import_backup(
        &self,
        source_path: &Path,
        format: ExportFormat,
    ) -> IdmanResult<String> {
        let mut backup = read_source(source_path, format.dialect)?;

        let validation = validate_backup_data(&backup);
        if !validation.is_valid {
            return Err(ValidationError::Invalid {
                context: format!("import of {}", source_path.display()),
                reason: validation.errors.join("; "),
            }
            .into());
        }
        for warning in &validation.warnings {
            tracing::warn!("import: {warning}");
        }

        let backup_id = format!(
            "imported-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        backup.metadata.backup_id = backup_id;
        let stored_id = self.storage.store(backup).await?;
        tracing::info!("import: stored backup {stored_id} from {}", source_path.display());
        Ok(stored_id)
    }

    /// Parse and validate an import source without storing it.
    pub async fn validate_import(
        &self,
        source_path: &Path,
        format: ExportFormat,
    ) -> IdmanResult<ValidationIssues> {
        match read_source(source_path, format.dialect) {
            Ok(backup) => Ok(validate_backup_data(&backup)),
            Err(error) => Ok(ValidationIssues::invalid(format!(
                "format validation failed: {error}"
            ))),
        }
    }

    /// Re-export a stored backup in another dialect.
    pub async fn convert_format(
        &self,
        backup_id: &str,
        to: ExportFormat,
        target_path: &Path,
    ) -> IdmanResult<()> {
        self.export_backup(backup_id, to, target_path).await
    }
}

fn write_payload(path: &Path, payload: Vec<u8>, compressed: bool) -> IdmanResult<()> {
    let payload = if compressed {
        compress::compress(&payload)?
    } else {
        payload
    };
    std::fs::write(path, payload).map_err(|e| {
        StorageError::WriteFailed {
            key: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn read_payload(path: &Path) -> IdmanResult<Vec<u8>> {
    let payload = std::fs::read(path).map_err(|e| ParsingError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    compress::decompress_if_needed(payload)
}

fn read_source(path: &Path, dialect: ExportDialect) -> IdmanResult<BackupData> {
    match dialect {
        ExportDialect::Csv => {
            if !path.is_dir() {
                return Err(ParsingError::Unreadable {
                    path: path.display().to_string(),
                    reason: "CSV import expects a directory of table files".to_string(),
                }
                .into());
            }
            let mut tables = BTreeMap::new();
            let entries = std::fs::read_dir(path).map_err(|e| ParsingError::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            for entry in entries.flatten() {
                let file = entry.path();
                let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let Some(table) = name
                    .strip_suffix(".csv.zst")
                    .or_else(|| name.strip_suffix(".csv"))
                else {
                    continue;
                };
                let payload = read_payload(&file)?;
                let content =
                    String::from_utf8(payload).map_err(|e| ParsingError::Unreadable {
                        path: file.display().to_string(),
                        reason: e.to_string(),
                    })?;
                tables.insert(table.to_string(), content);
            }
            convert::from_csv(&tables)
        }
        dialect => {
            let payload = read_payload(path)?;
            let content = String::from_utf8(payload).map_err(|e| ParsingError::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            match dialect {
                ExportDialect::Json => convert::from_json(&content),
                ExportDialect::Yaml => convert::from_yaml(&content),
                ExportDialect::Csv => unreachable!("handled above"),
            }
        }
    }
}

/// Re-validate imported data before it reaches storage.
pub fn validate_backup_data(backup: &BackupData) -> ValidationIssues {
    let mut issues = ValidationIssues::valid();

    if backup.metadata.backup_id.is_empty() {
        issues.add_error("missing backup id in metadata".to_string());
    }
    if !backup.verify_integrity() {
        issues.add_warning("backup data failed its integrity check".to_string());
    }
    if backup.total_resources() == 0 {
        issues.add_warning("backup contains no resources".to_string());
    }

    for (index, user) in backup.users.iter().enumerate() {
        if user.user_id.is_empty() || user.user_name.is_empty() {
            issues.add_error(format!("invalid user at index {index}: missing required fields"));
        }
    }
    for (index, group) in backup.groups.iter().enumerate() {
        if group.group_id.is_empty() || group.display_name.is_empty() {
            issues.add_error(format!(
                "invalid group at index {index}: missing required fields"
            ));
        }
    }
    for (index, permission_set) in backup.permission_sets.iter().enumerate() {
        if permission_set.permission_set_arn.is_empty() || permission_set.name.is_empty() {
            issues.add_error(format!(
                "invalid permission set at index {index}: missing required fields"
            ));
        }
    }
    for (index, assignment) in backup.assignments.iter().enumerate() {
        if assignment.account_id.is_empty()
            || assignment.permission_set_arn.is_empty()
            || assignment.principal_id.is_empty()
        {
            issues.add_error(format!(
                "invalid assignment at index {index}: missing required fields"
            ));
        }
    }

    issues.add_detail(
        "total_resources",
        serde_json::json!(backup.total_resources()),
    );
    issues
}
