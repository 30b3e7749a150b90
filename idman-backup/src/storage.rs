//! Backup storage engine over a byte-oriented backend.
//!
//! The engine owns backups at rest: `store` seals and writes the data
//! and metadata under `backups/<id>/`, `retrieve` hands an owned value
//! back to the caller. Metadata is always stored plaintext so listings
//! work without the encryption provider.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use idman_core::errors::{IdmanResult, StorageError};
use idman_core::models::{BackupData, BackupMetadata, BackupType, ValidationIssues};
use idman_core::traits::{IEncryptionProvider, IStorageBackend, NoopEncryption};

/// Optional filters for backup listings.
#[derive(Debug, Clone, Default)]
pub struct BackupFilters {
    pub instance_arn: Option<String>,
    pub backup_type: Option<BackupType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl BackupFilters {
    fn matches(&self, metadata: &BackupMetadata) -> bool {
        if let Some(arn) = &self.instance_arn {
            if &metadata.instance_arn != arn {
                return false;
            }
        }
        if let Some(kind) = self.backup_type {
            if metadata.backup_type != kind {
                return false;
            }
        }
        if let Some(since) = self.since {
            if metadata.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if metadata.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// The storage engine.
pub struct StorageEngine {
    backend: Arc<dyn IStorageBackend>,
    encryption: Arc<dyn IEncryptionProvider>,
}

impl StorageEngine {
    pub fn new(backend: Arc<dyn IStorageBackend>) -> Self {
        Self {
            backend,
            encryption: Arc::new(NoopEncryption),
        }
    }

    pub fn with_encryption(mut self, encryption: Arc<dyn IEncryptionProvider>) -> Self {
        self.encryption = encryption;
        self
    }

    fn data_key(backup_id: &str) -> String {
        format!("backups/{backup_id}/data.json")
    }

    fn meta_key(backup_id: &str) -> String {
        format!("backups/{backup_id}/meta.json")
    }

    /// Seal and persist a backup; returns its id.
    pub async fn store(&self, mut backup: BackupData) -> IdmanResult<String> {
        backup.seal();
        let payload =
            serde_json::to_vec(&backup).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        let (payload, encryption) = self.encryption.encrypt(payload, None).await?;
        backup.metadata.encryption = encryption;

        let backup_id = backup.metadata.backup_id.clone();
        let metadata =
            serde_json::to_vec(&backup.metadata).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        self.backend
            .write_data(&Self::data_key(&backup_id), &payload)
            .await?;
        self.backend
            .write_data(&Self::meta_key(&backup_id), &metadata)
            .await?;
        tracing::info!(
            "storage: stored backup {backup_id} ({} bytes)",
            backup.metadata.size_bytes
        );
        Ok(backup_id)
    }

    /// Retrieve a backup; None when unknown.
    pub async fn retrieve(&self, backup_id: &str) -> IdmanResult<Option<BackupData>> {
        let Some(metadata) = self.get_backup_metadata(backup_id).await? else {
            return Ok(None);
        };
        let Some(payload) = self.backend.read_data(&Self::data_key(backup_id)).await? else {
            return Ok(None);
        };
        let payload = self.encryption.decrypt(payload, &metadata.encryption).await?;
        let backup: BackupData =
            serde_json::from_slice(&payload).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        Ok(Some(backup))
    }

    /// Stored metadata, newest first, optionally filtered.
    pub async fn list(&self, filters: Option<&BackupFilters>) -> IdmanResult<Vec<BackupMetadata>> {
        let keys = self.backend.list_keys(Some("backups/")).await?;
        let mut listed = Vec::new();
        for key in keys.iter().filter(|k| k.ends_with("/meta.json")) {
            let Some(payload) = self.backend.read_data(key).await? else {
                continue;
            };
            match serde_json::from_slice::<BackupMetadata>(&payload) {
                Ok(metadata) => {
                    if filters.map(|f| f.matches(&metadata)).unwrap_or(true) {
                        listed.push(metadata);
                    }
                }
                Err(error) => {
                    tracing::warn!("storage: skipping unreadable metadata {key}: {error}");
                }
            }
        }
        listed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(listed)
    }

    /// Delete a backup's data and metadata. False when unknown.
    pub async fn delete(&self, backup_id: &str) -> IdmanResult<bool> {
        let had_data = self.backend.delete_data(&Self::data_key(backup_id)).await?;
        let had_meta = self.backend.delete_data(&Self::meta_key(backup_id)).await?;
        let deleted = had_data || had_meta;
        if deleted {
            tracing::info!("storage: deleted backup {backup_id}");
        }
        Ok(deleted)
    }

    /// Recompute the checksum of a stored backup against its metadata.
    pub async fn verify_integrity(&self, backup_id: &str) -> IdmanResult<ValidationIssues> {
        let mut issues = ValidationIssues::valid();
        let Some(backup) = self.retrieve(backup_id).await? else {
            issues.add_error(format!("backup not found: {backup_id}"));
            return Ok(issues);
        };
        if !backup.verify_integrity() {
            issues.add_error(format!(
                "checksum mismatch for backup {backup_id}: stored {}, recomputed {}",
                backup.metadata.checksum,
                backup.compute_checksum()
            ));
        }
        issues.add_detail(
            "resource_counts",
            serde_json::json!(backup.metadata.resource_counts),
        );
        Ok(issues)
    }

    /// Aggregate storage facts for diagnostics.
    pub async fn get_storage_info(&self) -> IdmanResult<BTreeMap<String, serde_json::Value>> {
        let listed = self.list(None).await?;
        let total_bytes: u64 = listed.iter().map(|m| m.size_bytes).sum();
        let mut info = BTreeMap::new();
        info.insert("backup_count".to_string(), serde_json::json!(listed.len()));
        info.insert("total_size_bytes".to_string(), serde_json::json!(total_bytes));
        info.insert(
            "newest".to_string(),
            serde_json::json!(listed.first().map(|m| m.timestamp.to_rfc3339())),
        );
        info.insert(
            "oldest".to_string(),
            serde_json::json!(listed.last().map(|m| m.timestamp.to_rfc3339())),
        );
        Ok(info)
    }

    /// Metadata for one backup without loading its data.
    pub async fn get_backup_metadata(
        &self,
        backup_id: &str,
    ) -> IdmanResult<Option<BackupMetadata>> {
        let Some(payload) = self.backend.read_data(&Self::meta_key(backup_id)).await? else {
            return Ok(None);
        };
        let metadata =
            serde_json::from_slice(&payload).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        Ok(Some(metadata))
    }
}

/// Filesystem backend: each key is a file under a root directory.
pub struct FsStorageBackend {
    root: PathBuf,
}

impl FsStorageBackend {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are internal slash paths, never user-supplied.
        self.root.join(key)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
    }
}

#[async_trait]
impl IStorageBackend for FsStorageBackend {
    async fn write_data(&self, key: &str, data: &[u8]) -> IdmanResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StorageError::WriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn read_data(&self, key: &str) -> IdmanResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: error.to_string(),
            }
            .into()),
        }
    }

    async fn delete_data(&self, key: &str) -> IdmanResult<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(StorageError::DeleteFailed {
                key: key.to_string(),
                reason: error.to_string(),
            }
            .into()),
        }
    }

    async fn list_keys(&self, prefix: Option<&str>) -> IdmanResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
                Err(error) => {
                    return Err(StorageError::ListFailed {
                        reason: error.to_string(),
                    }
                    .into())
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    if prefix.map(|p| key.starts_with(p)).unwrap_or(true) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> IdmanResult<bool> {
        Ok(self.path_for(key).exists())
    }

    async fn get_metadata(&self, key: &str) -> IdmanResult<Option<BTreeMap<String, String>>> {
        match tokio::fs::metadata(self.path_for(key)).await {
            Ok(meta) => Ok(Some(BTreeMap::from([(
                "size".to_string(),
                meta.len().to_string(),
            )]))),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: error.to_string(),
            }
            .into()),
        }
    }
}
