//! Shared command context: configuration, profile binding, and the
//! concrete collaborators behind the capability seams.

use std::path::PathBuf;
use std::sync::Arc;

use idman_backup::storage::{FsStorageBackend, StorageEngine};
use idman_core::config::{IdmanConfig, ProfileConfig};
use idman_core::errors::{ConfigurationError, IdmanResult};
use idman_core::traits::IDirectory;

use crate::directory::FileDirectory;

pub struct CommandContext {
    pub config: IdmanConfig,
    pub profile_name: String,
    pub profile: ProfileConfig,
    pub directory: Arc<dyn IDirectory>,
    pub storage: Arc<StorageEngine>,
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_config_path() -> PathBuf {
    home_dir().join(".idman").join("config.yaml")
}

impl CommandContext {
    /// Load configuration, resolve the profile, and wire up the
    /// directory adapter and storage engine.
    pub fn build(config_path: Option<PathBuf>, profile: Option<&str>) -> IdmanResult<Self> {
        let path = config_path.unwrap_or_else(default_config_path);
        let config = if path.exists() {
            IdmanConfig::load_from(&path)?
        } else {
            IdmanConfig::default()
        };
        let (profile_name, profile) = config.profile(profile)?;

        let directory_file = profile.directory_file.clone().ok_or_else(|| {
            ConfigurationError::InvalidConfig {
                reason: format!(
                    "profile '{profile_name}' has no directory_file; the file-backed \
                     directory adapter needs one"
                ),
            }
        })?;
        let directory: Arc<dyn IDirectory> = Arc::new(FileDirectory::open(directory_file)?);

        let storage_root = config
            .storage_root
            .clone()
            .unwrap_or_else(|| home_dir().join(".idman").join("backups"));
        let storage = Arc::new(StorageEngine::new(Arc::new(FsStorageBackend::new(
            storage_root,
        ))));

        Ok(Self {
            config,
            profile_name,
            profile,
            directory,
            storage,
        })
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.config
            .templates_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".idman").join("templates"))
    }
}
