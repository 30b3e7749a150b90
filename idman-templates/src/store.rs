//! On-disk template store.
//!
//! Templates live as YAML/JSON files in a single directory (default
//! `~/.idman/templates`). Files on disk are owned by the store; loaded
//! templates are plain values.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use idman_core::errors::{IdmanResult, StorageError, ValidationError};

use crate::models::{Template, TemplateMetadata};
use crate::parser::{self, TemplateFormat};

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Summary row for template listings.
#[derive(Debug, Clone)]
pub struct TemplateInfo {
    pub name: String,
    pub file_path: PathBuf,
    pub metadata: TemplateMetadata,
    pub assignment_count: usize,
    pub entity_count: usize,
    pub permission_set_count: usize,
    pub last_modified: DateTime<Utc>,
}

/// Directory-backed template store.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    directory: PathBuf,
}

impl TemplateStore {
    /// Open a store rooted at `directory`, creating it if needed.
    pub fn open(directory: PathBuf) -> IdmanResult<Self> {
        std::fs::create_dir_all(&directory).map_err(|e| StorageError::WriteFailed {
            key: directory.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { directory })
    }

    /// Open the default store under the user's home directory.
    pub fn open_default() -> IdmanResult<Self> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::open(home.join(".idman").join("templates"))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// All templates, sorted by name.
    pub fn list(&self) -> IdmanResult<Vec<TemplateInfo>> {
        let entries = std::fs::read_dir(&self.directory).map_err(|e| StorageError::ListFailed {
            reason: e.to_string(),
        })?;
        let mut templates = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_template = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if !is_template {
                continue;
            }
            match self.info_for(&path) {
                Ok(info) => templates.push(info),
                Err(error) => {
                    tracing::warn!(
                        "templates: skipping unreadable {}: {error}",
                        path.display()
                    );
                }
            }
        }
        templates.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(templates)
    }

    /// Load by exact name first, then by unique partial match.
    pub fn get(&self, name: &str) -> IdmanResult<Option<Template>> {
        if let Some(path) = self.find_exact(name) {
            return parser::parse_file(&path).map(Some);
        }
        let lowered = name.to_lowercase();
        let matches: Vec<TemplateInfo> = self
            .list()?
            .into_iter()
            .filter(|t| t.name.to_lowercase().contains(&lowered))
            .collect();
        match matches.len() {
            1 => parser::parse_file(&matches[0].file_path).map(Some),
            _ => Ok(None),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.find_exact(name).is_some()
    }

    /// Save a template as `<name>.yaml`. `overwrite = false` rejects an
    /// existing name.
    pub fn save(&self, template: &Template, overwrite: bool) -> IdmanResult<PathBuf> {
        let name = &template.metadata.name;
        if !overwrite && self.exists(name) {
            return Err(ValidationError::DuplicateTemplateName { name: name.clone() }.into());
        }
        let path = self.directory.join(format!("{name}.yaml"));
        let content = parser::to_string(template, TemplateFormat::Yaml)?;
        std::fs::write(&path, content).map_err(|e| StorageError::WriteFailed {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::info!("templates: saved {name} to {}", path.display());
        Ok(path)
    }

    /// Delete by name. False when no such template exists.
    pub fn delete(&self, name: &str) -> IdmanResult<bool> {
        let Some(path) = self.find_exact(name) else {
            return Ok(false);
        };
        std::fs::remove_file(&path).map_err(|e| StorageError::DeleteFailed {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::info!("templates: deleted {name}");
        Ok(true)
    }

    /// Copy an existing template under a new name.
    pub fn copy(&self, source_name: &str, target_name: &str) -> IdmanResult<PathBuf> {
        let Some(mut template) = self.get(source_name)? else {
            return Err(StorageError::ReadFailed {
                key: source_name.to_string(),
                reason: "template not found".to_string(),
            }
            .into());
        };
        template.metadata.name = target_name.to_string();
        template.metadata.updated_at = Utc::now();
        self.save(&template, false)
    }

    fn find_exact(&self, name: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.directory.join(format!("{name}.{ext}")))
            .find(|path| path.exists())
    }

    fn info_for(&self, path: &Path) -> IdmanResult<TemplateInfo> {
        let template = parser::parse_file(path)?;
        let last_modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(TemplateInfo {
            name: template.metadata.name.clone(),
            file_path: path.to_path_buf(),
            assignment_count: template.assignments.len(),
            entity_count: template.entity_count(),
            permission_set_count: template.permission_set_count(),
            metadata: template.metadata,
            last_modified,
        })
    }
}
