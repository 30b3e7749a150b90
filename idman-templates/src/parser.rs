//! Template file parsing, YAML or JSON by extension.

use std::path::Path;

use idman_core::errors::{IdmanResult, ParsingError};

use crate::models::Template;

/// Supported template file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Yaml,
    Json,
}

/// Detect the format from the extension; unknown extensions default to
/// YAML.
pub fn detect_format(path: &Path) -> TemplateFormat {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => TemplateFormat::Json,
        Some("yaml") | Some("yml") => TemplateFormat::Yaml,
        other => {
            tracing::warn!(
                "templates: unknown extension {:?}, defaulting to YAML",
                other
            );
            TemplateFormat::Yaml
        }
    }
}

/// Parse a template file.
pub fn parse_file(path: &Path) -> IdmanResult<Template> {
    let content = std::fs::read_to_string(path).map_err(|e| ParsingError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if content.trim().is_empty() {
        return Err(ParsingError::EmptyFile {
            path: path.display().to_string(),
        }
        .into());
    }
    parse_str(&content, detect_format(path))
}

/// Parse template content in the given format.
pub fn parse_str(content: &str, format: TemplateFormat) -> IdmanResult<Template> {
    match format {
        TemplateFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| {
                ParsingError::MalformedYaml {
                    reason: e.to_string(),
                }
                .into()
            })
        }
        TemplateFormat::Json => {
            serde_json::from_str(content).map_err(|e| {
                ParsingError::MalformedJson {
                    reason: e.to_string(),
                }
                .into()
            })
        }
    }
}

/// Serialize a template in the given format.
pub fn to_string(template: &Template, format: TemplateFormat) -> IdmanResult<String> {
    match format {
        TemplateFormat::Yaml => serde_yaml::to_string(template).map_err(|e| {
            ParsingError::MalformedYaml {
                reason: e.to_string(),
            }
            .into()
        }),
        TemplateFormat::Json => serde_json::to_string_pretty(template).map_err(|e| {
            ParsingError::MalformedJson {
                reason: e.to_string(),
            }
            .into()
        }),
    }
}
