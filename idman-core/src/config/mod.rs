//! Toolkit configuration: profiles, instance bindings, subsystem defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_OPERATION_STATE_TTL_SECS, DEFAULT_ORPHAN_CACHE_TTL_SECS,
};
use crate::errors::{ConfigurationError, IdmanResult};
use crate::models::{RetentionPolicy, StorageLimit};

/// Instance binding for one named profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub instance_arn: String,
    pub identity_store_id: String,
    pub region: Option<String>,
    pub account_id: Option<String>,
    /// State file for the file-backed directory adapter; a concrete
    /// cloud client ignores this.
    pub directory_file: Option<PathBuf>,
}

/// Bulk executor defaults, overridable per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkDefaults {
    /// Records per executor batch. Default: 10.
    pub batch_size: usize,
    /// Concurrency bound override; None lets the tuner decide.
    pub max_concurrent: Option<usize>,
    /// Keep processing after individual failures. Default: true.
    pub continue_on_error: bool,
}

impl Default for BulkDefaults {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent: None,
            continue_on_error: true,
        }
    }
}

/// Top-level configuration, loaded from `~/.idman/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdmanConfig {
    /// Profile used when none is given on the command line.
    pub default_profile: Option<String>,
    pub profiles: BTreeMap<String, ProfileConfig>,
    /// Backup storage root; defaults to `~/.idman/backups`.
    pub storage_root: Option<PathBuf>,
    /// Template store directory; defaults to `~/.idman/templates`.
    pub templates_dir: Option<PathBuf>,
    pub retention: RetentionPolicy,
    pub storage_limits: StorageLimit,
    pub bulk: BulkDefaults,
    /// Validity window for the orphaned-assignment cache. Default: 3600.
    pub orphan_cache_ttl_secs: u64,
    /// Inspection window for completed operation state. Default: 300.
    pub operation_state_ttl_secs: u64,
}

impl Default for IdmanConfig {
    fn default() -> Self {
        Self {
            default_profile: None,
            profiles: BTreeMap::new(),
            storage_root: None,
            templates_dir: None,
            retention: RetentionPolicy::default(),
            storage_limits: StorageLimit::default(),
            bulk: BulkDefaults::default(),
            orphan_cache_ttl_secs: DEFAULT_ORPHAN_CACHE_TTL_SECS,
            operation_state_ttl_secs: DEFAULT_OPERATION_STATE_TTL_SECS,
        }
    }
}

impl IdmanConfig {
    /// Load configuration from a YAML file.
    pub fn load_from(path: &Path) -> IdmanResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: IdmanConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigurationError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(config)
    }

    /// Resolve a profile by name, falling back to the default profile.
    ///
    /// A missing profile or an empty instance binding is a configuration
    /// error (exit 1 at the CLI).
    pub fn profile(&self, name: Option<&str>) -> IdmanResult<(String, ProfileConfig)> {
        let name = name
            .map(str::to_string)
            .or_else(|| self.default_profile.clone())
            .ok_or_else(|| ConfigurationError::MissingProfile {
                profile: "<default>".to_string(),
            })?;
        let profile =
            self.profiles
                .get(&name)
                .cloned()
                .ok_or_else(|| ConfigurationError::MissingProfile {
                    profile: name.clone(),
                })?;
        if profile.instance_arn.is_empty() || profile.identity_store_id.is_empty() {
            return Err(ConfigurationError::MissingInstanceBinding { profile: name }.into());
        }
        Ok((name, profile))
    }
}
