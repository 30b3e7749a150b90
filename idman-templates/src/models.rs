//! Template data model.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use idman_core::errors::ValidationError;
use idman_core::models::PrincipalType;

/// Template identity and documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    /// Unique within the template store.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl TemplateMetadata {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            description: None,
            version: None,
            author: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Assignment targets: explicit account ids XOR a tag filter, plus an
/// optional exclusion list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_ids: Option<Vec<String>>,
    /// All pairs must match for an account to be selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_accounts: Option<Vec<String>>,
}

impl TemplateTarget {
    /// Structural check: exactly one of account ids or tags.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let has_ids = self.account_ids.as_ref().is_some_and(|v| !v.is_empty());
        let has_tags = self.account_tags.as_ref().is_some_and(|m| !m.is_empty());
        if !has_ids && !has_tags {
            return Err(ValidationError::Invalid {
                context: "targets".to_string(),
                reason: "either account_ids or account_tags must be specified".to_string(),
            });
        }
        if has_ids && has_tags {
            return Err(ValidationError::Invalid {
                context: "targets".to_string(),
                reason: "cannot specify both account_ids and account_tags".to_string(),
            });
        }
        Ok(())
    }

    /// Account count when statically known; None for tag-based targets.
    pub fn account_count_estimate(&self) -> Option<usize> {
        match (&self.account_ids, &self.account_tags) {
            (Some(ids), _) => Some(ids.len()),
            (None, Some(_)) => None,
            (None, None) => Some(0),
        }
    }
}

/// One assignment block: entities x permission sets x targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateAssignment {
    /// Entity references, `user:name` or `group:name`.
    pub entities: Vec<String>,
    /// Permission set names.
    pub permission_sets: Vec<String>,
    pub targets: TemplateTarget,
}

impl TemplateAssignment {
    /// Structural check: non-empty sequences and valid targets.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entities.is_empty() {
            return Err(ValidationError::Invalid {
                context: "assignment".to_string(),
                reason: "at least one entity must be specified".to_string(),
            });
        }
        if self.permission_sets.is_empty() {
            return Err(ValidationError::Invalid {
                context: "assignment".to_string(),
                reason: "at least one permission set must be specified".to_string(),
            });
        }
        self.targets.validate()
    }

    /// Cross-product size when statically known.
    pub fn total_assignments(&self) -> Option<usize> {
        let accounts = self.targets.account_count_estimate()?;
        Some(self.entities.len() * self.permission_sets.len() * accounts)
    }
}

/// A complete template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub metadata: TemplateMetadata,
    pub assignments: Vec<TemplateAssignment>,
}

impl Template {
    /// All structural errors, empty when the shape is sound.
    pub fn validate_structure(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.metadata.name.trim().is_empty() {
            errors.push("template name is required".to_string());
        }
        if self.assignments.is_empty() {
            errors.push("at least one assignment must be specified".to_string());
        }
        for (index, assignment) in self.assignments.iter().enumerate() {
            if let Err(error) = assignment.validate() {
                errors.push(format!("assignment {}: {error}", index + 1));
            }
        }
        errors
    }

    /// Cross-product size across all blocks; None when any block is
    /// tag-based and needs resolution.
    pub fn total_assignments(&self) -> Option<usize> {
        let mut total = 0usize;
        for assignment in &self.assignments {
            total += assignment.total_assignments()?;
        }
        Some(total)
    }

    /// Distinct entity references across all blocks.
    pub fn entity_count(&self) -> usize {
        self.assignments
            .iter()
            .flat_map(|a| a.entities.iter())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Distinct permission set names across all blocks.
    pub fn permission_set_count(&self) -> usize {
        self.assignments
            .iter()
            .flat_map(|a| a.permission_sets.iter())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Split an entity reference of the form `user:name` or `group:name`.
pub fn parse_entity_reference(
    reference: &str,
) -> Result<(PrincipalType, String), ValidationError> {
    let Some((kind, name)) = reference.split_once(':') else {
        return Err(ValidationError::InvalidEntityReference {
            reference: reference.to_string(),
            reason: "expected the form 'type:name'".to_string(),
        });
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::InvalidEntityReference {
            reference: reference.to_string(),
            reason: "entity name cannot be empty".to_string(),
        });
    }
    let kind = match kind {
        "user" => PrincipalType::User,
        "group" => PrincipalType::Group,
        other => {
            return Err(ValidationError::InvalidEntityReference {
                reference: reference.to_string(),
                reason: format!("entity type must be 'user' or 'group', got '{other}'"),
            })
        }
    };
    Ok((kind, name.to_string()))
}

/// Whether a string looks like a 12-digit account id.
pub fn is_valid_account_id(account_id: &str) -> bool {
    account_id.len() == 12 && account_id.bytes().all(|b| b.is_ascii_digit())
}
