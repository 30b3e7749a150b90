//! Raw byte-oriented storage backend interface.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::IdmanResult;

/// Key/value byte store beneath the storage engine.
///
/// Keys are slash-separated paths; the backend decides how they map onto
/// its medium (files, object keys, ...).
#[async_trait]
pub trait IStorageBackend: Send + Sync {
    async fn write_data(&self, key: &str, data: &[u8]) -> IdmanResult<()>;
    /// None when the key does not exist.
    async fn read_data(&self, key: &str) -> IdmanResult<Option<Vec<u8>>>;
    /// True when something was deleted.
    async fn delete_data(&self, key: &str) -> IdmanResult<bool>;
    async fn list_keys(&self, prefix: Option<&str>) -> IdmanResult<Vec<String>>;
    async fn exists(&self, key: &str) -> IdmanResult<bool>;
    /// Backend metadata for a key (e.g. size), None when absent.
    async fn get_metadata(&self, key: &str) -> IdmanResult<Option<BTreeMap<String, String>>>;
}
