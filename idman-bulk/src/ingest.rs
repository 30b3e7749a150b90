//! Bulk-assignment file ingestion.
//!
//! Two dialects, dispatched on file extension: tabular with a header row
//! (`.csv`) and structured objects (`.json`). Every structural problem is
//! reported with the row's line number; a batch with any structural error
//! is rejected before resolution starts.

use std::path::Path;

use serde::Deserialize;

use idman_core::csvio;
use idman_core::errors::{IdmanError, IdmanResult, ParsingError, ValidationError};
use idman_core::models::PrincipalType;

/// One row of a bulk-assignment input file, still name-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOperationRecord {
    pub principal_name: String,
    pub permission_set_name: String,
    pub account_name: String,
    pub principal_type: PrincipalType,
    /// 1-based line in the source file, when the dialect has lines.
    pub line_number: Option<usize>,
}

/// Supported input dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

/// Records plus the structural errors found alongside them.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub records: Vec<BulkOperationRecord>,
    pub errors: Vec<IdmanError>,
}

impl ParsedBatch {
    /// Whether the batch can proceed to resolution.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Pick the dialect from the file extension.
pub fn detect_format(path: &Path) -> IdmanResult<InputFormat> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("csv") => Ok(InputFormat::Csv),
        Some("json") => Ok(InputFormat::Json),
        other => Err(ParsingError::UnsupportedExtension {
            extension: other.unwrap_or("<none>").to_string(),
        }
        .into()),
    }
}

/// Read and parse a bulk input file.
pub fn parse_file(path: &Path) -> IdmanResult<ParsedBatch> {
    let format = detect_format(path)?;
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
    match format {
        InputFormat::Csv => parse_csv(&content),
        InputFormat::Json => parse_json(&content),
    }
}

const REQUIRED_COLUMNS: [&str; 3] = ["principal_name", "permission_set_name", "account_name"];

/// Parse the tabular dialect. The header row is required and names the
/// columns; column order is free.
pub fn parse_csv(content: &str) -> IdmanResult<ParsedBatch> {
    let rows = csvio::parse(content)?;
    let mut rows = rows.into_iter();
    let header = rows.next().ok_or_else(|| ParsingError::EmptyFile {
        path: "<csv>".to_string(),
    })?;

    let columns: Vec<String> = header
        .fields
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !columns.iter().any(|c| c == *required))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns {
            columns: missing.join(", "),
        }
        .into());
    }
    let index_of = |name: &str| columns.iter().position(|c| c == name);
    let principal_idx = index_of("principal_name").unwrap();
    let permission_set_idx = index_of("permission_set_name").unwrap();
    let account_idx = index_of("account_name").unwrap();
    let type_idx = index_of("principal_type");

    let mut batch = ParsedBatch::default();
    for row in rows {
        let field = |idx: usize| row.fields.get(idx).map(|f| f.trim()).unwrap_or("");
        let mut row_ok = true;
        for (idx, name) in [
            (principal_idx, "principal_name"),
            (permission_set_idx, "permission_set_name"),
            (account_idx, "account_name"),
        ] {
            if field(idx).is_empty() {
                batch.errors.push(
                    ValidationError::EmptyValue {
                        field: name.to_string(),
                        line: Some(row.line),
                    }
                    .into(),
                );
                row_ok = false;
            }
        }
        let principal_type = match type_idx.map(|i| field(i)).filter(|v| !v.is_empty()) {
            None => PrincipalType::User,
            Some(value) => match value.parse::<PrincipalType>() {
                Ok(kind) => kind,
                Err(_) => {
                    batch.errors.push(
                        ValidationError::InvalidPrincipalType {
                            value: value.to_string(),
                            line: Some(row.line),
                        }
                        .into(),
                    );
                    row_ok = false;
                    PrincipalType::User
                }
            },
        };
        if row_ok {
            batch.records.push(BulkOperationRecord {
                principal_name: field(principal_idx).to_string(),
                permission_set_name: field(permission_set_idx).to_string(),
                account_name: field(account_idx).to_string(),
                principal_type,
                line_number: Some(row.line),
            });
        }
    }
    Ok(batch)
}

#[derive(Debug, Deserialize)]
struct JsonDocument {
    assignments: Vec<JsonAssignment>,
}

#[derive(Debug, Deserialize)]
struct JsonAssignment {
    #[serde(default)]
    principal_name: String,
    #[serde(default)]
    permission_set_name: String,
    #[serde(default)]
    account_name: String,
    #[serde(default)]
    principal_type: Option<String>,
}

/// Parse the structured dialect: `{"assignments": [...]}`.
pub fn parse_json(content: &str) -> IdmanResult<ParsedBatch> {
    let document: JsonDocument =
        serde_json::from_str(content).map_err(|e| ParsingError::MalformedJson {
            reason: e.to_string(),
        })?;

    let mut batch = ParsedBatch::default();
    for (index, entry) in document.assignments.into_iter().enumerate() {
        // Entries are 1-based positions rather than file lines.
        let position = index + 1;
        let mut row_ok = true;
        for (value, name) in [
            (&entry.principal_name, "principal_name"),
            (&entry.permission_set_name, "permission_set_name"),
            (&entry.account_name, "account_name"),
        ] {
            if value.trim().is_empty() {
                batch.errors.push(
                    ValidationError::EmptyValue {
                        field: name.to_string(),
                        line: Some(position),
                    }
                    .into(),
                );
                row_ok = false;
            }
        }
        let principal_type = match entry.principal_type.as_deref().filter(|v| !v.is_empty()) {
            None => PrincipalType::User,
            Some(value) => match value.parse::<PrincipalType>() {
                Ok(kind) => kind,
                Err(_) => {
                    batch.errors.push(
                        ValidationError::InvalidPrincipalType {
                            value: value.to_string(),
                            line: Some(position),
                        }
                        .into(),
                    );
                    row_ok = false;
                    PrincipalType::User
                }
            },
        };
        if row_ok {
            batch.records.push(BulkOperationRecord {
                principal_name: entry.principal_name.trim().to_string(),
                permission_set_name: entry.permission_set_name.trim().to_string(),
                account_name: entry.account_name.trim().to_string(),
                principal_type,
                line_number: Some(position),
            });
        }
    }
    Ok(batch)
}
