//! Shared validation outcome type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Accumulated errors, warnings, and structured details from a
/// validation pass. Valid iff no errors were recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationIssues {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl ValidationIssues {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        let mut issues = Self::valid();
        issues.add_error(error);
        issues
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn add_detail(&mut self, key: &str, value: serde_json::Value) {
        self.details.insert(key.to_string(), value);
    }

    /// Fold another result into this one; validity is the conjunction.
    pub fn merge(&mut self, other: ValidationIssues) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.details.extend(other.details);
        self.is_valid = self.errors.is_empty();
    }
}
