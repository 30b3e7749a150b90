/// Backing-store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("write failed for key '{key}': {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("read failed for key '{key}': {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("delete failed for key '{key}': {reason}")]
    DeleteFailed { key: String, reason: String },

    #[error("listing storage keys failed: {reason}")]
    ListFailed { reason: String },

    #[error("backup not found: {backup_id}")]
    BackupNotFound { backup_id: String },

    #[error("integrity check failed for backup {backup_id}")]
    IntegrityCheckFailed { backup_id: String },

    #[error("serialization failed: {reason}")]
    Serialization { reason: String },
}

impl StorageError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::WriteFailed { .. } => "STORE_WRITE",
            StorageError::ReadFailed { .. } => "STORE_READ",
            StorageError::DeleteFailed { .. } => "STORE_DELETE",
            StorageError::ListFailed { .. } => "STORE_LIST",
            StorageError::BackupNotFound { .. } => "STORE_NOT_FOUND",
            StorageError::IntegrityCheckFailed { .. } => "STORE_INTEGRITY",
            StorageError::Serialization { .. } => "STORE_SERIALIZATION",
        }
    }
}
