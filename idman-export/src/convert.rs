//! Conversion between backup data and the interchange dialects.
//!
//! The CSV dialect is one table per resource kind plus a key/value
//! metadata table; list- and map-valued cells hold embedded JSON.
//! Escaping round-trips commas, quotes, newlines, and tabs in any
//! field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use idman_core::csvio;
use idman_core::errors::{IdmanResult, ParsingError};
use idman_core::models::{
    AssignmentData, BackupData, BackupMetadata, CustomerManagedPolicy, GroupData,
    PermissionSetData, UserData,
};

/// Interchange dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportDialect {
    Json,
    Yaml,
    Csv,
}

impl ExportDialect {
    /// Dialect inferred from a path's extension, if recognisable.
    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Some(ExportDialect::Json),
            Some("yaml") | Some("yml") => Some(ExportDialect::Yaml),
            Some("csv") => Some(ExportDialect::Csv),
            _ => None,
        }
    }
}

/// Full export configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    pub dialect: ExportDialect,
    /// Compress with zstd on export; detection is automatic on import.
    pub compressed: bool,
}

impl ExportFormat {
    pub fn json() -> Self {
        Self {
            dialect: ExportDialect::Json,
            compressed: false,
        }
    }

    pub fn yaml() -> Self {
        Self {
            dialect: ExportDialect::Yaml,
            compressed: false,
        }
    }

    pub fn csv() -> Self {
        Self {
            dialect: ExportDialect::Csv,
            compressed: false,
        }
    }

    pub fn with_compression(mut self) -> Self {
        self.compressed = true;
        self
    }
}

// JSON dialect

pub fn to_json(backup: &BackupData, pretty: bool) -> IdmanResult<String> {
    let result = if pretty {
        serde_json::to_string_pretty(backup)
    } else {
        serde_json::to_string(backup)
    };
    result.map_err(|e| {
        ParsingError::MalformedJson {
            reason: e.to_string(),
        }
        .into()
    })
}

pub fn from_json(content: &str) -> IdmanResult<BackupData> {
    serde_json::from_str(content).map_err(|e| {
        ParsingError::MalformedJson {
            reason: e.to_string(),
        }
        .into()
    })
}

// YAML dialect

pub fn to_yaml(backup: &BackupData) -> IdmanResult<String> {
    serde_yaml::to_string(backup).map_err(|e| {
        ParsingError::MalformedYaml {
            reason: e.to_string(),
        }
        .into()
    })
}

pub fn from_yaml(content: &str) -> IdmanResult<BackupData> {
    serde_yaml::from_str(content).map_err(|e| {
        ParsingError::MalformedYaml {
            reason: e.to_string(),
        }
        .into()
    })
}

// CSV dialect

const USERS_TABLE: &str = "users";
const GROUPS_TABLE: &str = "groups";
const PERMISSION_SETS_TABLE: &str = "permission_sets";
const ASSIGNMENTS_TABLE: &str = "assignments";
const METADATA_TABLE: &str = "metadata";

/// Serialize to the CSV dialect: table name -> CSV content.
pub fn to_csv(backup: &BackupData) -> IdmanResult<BTreeMap<String, String>> {
    let mut tables = BTreeMap::new();
    tables.insert(USERS_TABLE.to_string(), users_to_csv(&backup.users)?);
    tables.insert(GROUPS_TABLE.to_string(), groups_to_csv(&backup.groups)?);
    tables.insert(
        PERMISSION_SETS_TABLE.to_string(),
        permission_sets_to_csv(&backup.permission_sets)?,
    );
    tables.insert(
        ASSIGNMENTS_TABLE.to_string(),
        assignments_to_csv(&backup.assignments),
    );
    tables.insert(
        METADATA_TABLE.to_string(),
        metadata_to_csv(&backup.metadata)?,
    );
    Ok(tables)
}

/// Parse the CSV dialect back into backup data. The metadata table is
/// required; resource tables may be absent.
pub fn from_csv(tables: &BTreeMap<String, String>) -> IdmanResult<BackupData> {
    let metadata_csv = tables.get(METADATA_TABLE).ok_or(ParsingError::EmptyFile {
        path: "metadata.csv".to_string(),
    })?;
    let metadata = metadata_from_csv(metadata_csv)?;
    let mut backup = BackupData::new(metadata);
    if let Some(content) = tables.get(USERS_TABLE) {
        backup.users = users_from_csv(content)?;
    }
    if let Some(content) = tables.get(GROUPS_TABLE) {
        backup.groups = groups_from_csv(content)?;
    }
    if let Some(content) = tables.get(PERMISSION_SETS_TABLE) {
        backup.permission_sets = permission_sets_from_csv(content)?;
    }
    if let Some(content) = tables.get(ASSIGNMENTS_TABLE) {
        backup.assignments = assignments_from_csv(content)?;
    }
    backup.rebuild_relationships();
    Ok(backup)
}

fn json_cell<T: Serialize>(value: &T) -> IdmanResult<String> {
    serde_json::to_string(value).map_err(|e| {
        ParsingError::MalformedJson {
            reason: e.to_string(),
        }
        .into()
    })
}

fn parse_json_cell<T: for<'de> Deserialize<'de> + Default>(cell: &str) -> T {
    if cell.is_empty() {
        T::default()
    } else {
        serde_json::from_str(cell).unwrap_or_default()
    }
}

fn users_to_csv(users: &[UserData]) -> IdmanResult<String> {
    let mut out = String::new();
    out.push_str(&csvio::format_row(&[
        "user_id",
        "user_name",
        "display_name",
        "email",
        "given_name",
        "family_name",
        "active",
        "external_ids",
    ]));
    out.push('\n');
    for user in users {
        let external_ids = if user.external_ids.is_empty() {
            String::new()
        } else {
            json_cell(&user.external_ids)?
        };
        out.push_str(&csvio::format_row(&[
            &user.user_id,
            &user.user_name,
            user.display_name.as_deref().unwrap_or(""),
            user.email.as_deref().unwrap_or(""),
            user.given_name.as_deref().unwrap_or(""),
            user.family_name.as_deref().unwrap_or(""),
            if user.active { "true" } else { "false" },
            &external_ids,
        ]));
        out.push('\n');
    }
    Ok(out)
}

fn users_from_csv(content: &str) -> IdmanResult<Vec<UserData>> {
    let rows = table_rows(content, 8, "users")?;
    Ok(rows
        .into_iter()
        .map(|fields| UserData {
            user_id: fields[0].clone(),
            user_name: fields[1].clone(),
            display_name: optional(&fields[2]),
            email: optional(&fields[3]),
            given_name: optional(&fields[4]),
            family_name: optional(&fields[5]),
            active: fields[6] != "false",
            external_ids: parse_json_cell(&fields[7]),
            last_modified: None,
        })
        .collect())
}

fn groups_to_csv(groups: &[GroupData]) -> IdmanResult<String> {
    let mut out = String::new();
    out.push_str(&csvio::format_row(&[
        "group_id",
        "display_name",
        "description",
        "members",
    ]));
    out.push('\n');
    for group in groups {
        let members = if group.members.is_empty() {
            String::new()
        } else {
            json_cell(&group.members)?
        };
        out.push_str(&csvio::format_row(&[
            &group.group_id,
            &group.display_name,
            group.description.as_deref().unwrap_or(""),
            &members,
        ]));
        out.push('\n');
    }
    Ok(out)
}

fn groups_from_csv(content: &str) -> IdmanResult<Vec<GroupData>> {
    let rows = table_rows(content, 4, "groups")?;
    Ok(rows
        .into_iter()
        .map(|fields| GroupData {
            group_id: fields[0].clone(),
            display_name: fields[1].clone(),
            description: optional(&fields[2]),
            members: parse_json_cell(&fields[3]),
            last_modified: None,
        })
        .collect())
}

fn permission_sets_to_csv(permission_sets: &[PermissionSetData]) -> IdmanResult<String> {
    let mut out = String::new();
    out.push_str(&csvio::format_row(&[
        "permission_set_arn",
        "name",
        "description",
        "session_duration",
        "relay_state",
        "inline_policy",
        "managed_policies",
        "customer_managed_policies",
        "permissions_boundary",
    ]));
    out.push('\n');
    for ps in permission_sets {
        let managed = if ps.managed_policies.is_empty() {
            String::new()
        } else {
            json_cell(&ps.managed_policies)?
        };
        let customer = if ps.customer_managed_policies.is_empty() {
            String::new()
        } else {
            json_cell(&ps.customer_managed_policies)?
        };
        out.push_str(&csvio::format_row(&[
            &ps.permission_set_arn,
            &ps.name,
            ps.description.as_deref().unwrap_or(""),
            ps.session_duration.as_deref().unwrap_or(""),
            ps.relay_state.as_deref().unwrap_or(""),
            ps.inline_policy.as_deref().unwrap_or(""),
            &managed,
            &customer,
            ps.permissions_boundary.as_deref().unwrap_or(""),
        ]));
        out.push('\n');
    }
    Ok(out)
}

fn permission_sets_from_csv(content: &str) -> IdmanResult<Vec<PermissionSetData>> {
    let rows = table_rows(content, 9, "permission_sets")?;
    Ok(rows
        .into_iter()
        .map(|fields| {
            let customer: Vec<CustomerManagedPolicy> = parse_json_cell(&fields[7]);
            PermissionSetData {
                permission_set_arn: fields[0].clone(),
                name: fields[1].clone(),
                description: optional(&fields[2]),
                session_duration: optional(&fields[3]),
                relay_state: optional(&fields[4]),
                inline_policy: optional(&fields[5]),
                managed_policies: parse_json_cell(&fields[6]),
                customer_managed_policies: customer,
                permissions_boundary: optional(&fields[8]),
                last_modified: None,
            }
        })
        .collect())
}

fn assignments_to_csv(assignments: &[AssignmentData]) -> String {
    let mut out = String::new();
    out.push_str(&csvio::format_row(&[
        "account_id",
        "permission_set_arn",
        "principal_type",
        "principal_id",
    ]));
    out.push('\n');
    for assignment in assignments {
        let principal_type = assignment.principal_type.to_string();
        out.push_str(&csvio::format_row(&[
            &assignment.account_id,
            &assignment.permission_set_arn,
            &principal_type,
            &assignment.principal_id,
        ]));
        out.push('\n');
    }
    out
}

fn assignments_from_csv(content: &str) -> IdmanResult<Vec<AssignmentData>> {
    let rows = table_rows(content, 4, "assignments")?;
    let mut assignments = Vec::with_capacity(rows.len());
    for fields in rows {
        let principal_type = fields[2]
            .parse()
            .map_err(|_| ParsingError::MalformedCsv {
                line: 0,
                reason: format!("bad principal type '{}' in assignments table", fields[2]),
            })?;
        assignments.push(AssignmentData {
            account_id: fields[0].clone(),
            permission_set_arn: fields[1].clone(),
            principal_type,
            principal_id: fields[3].clone(),
        });
    }
    Ok(assignments)
}

fn metadata_to_csv(metadata: &BackupMetadata) -> IdmanResult<String> {
    let value = serde_json::to_value(metadata).map_err(|e| ParsingError::MalformedJson {
        reason: e.to_string(),
    })?;
    let object = value.as_object().cloned().unwrap_or_default();

    let mut out = String::new();
    out.push_str(&csvio::format_row(&["key", "value"]));
    out.push('\n');
    for (key, value) in object {
        let cell = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        out.push_str(&csvio::format_row(&[&key, &cell]));
        out.push('\n');
    }
    Ok(out)
}

fn metadata_from_csv(content: &str) -> IdmanResult<BackupMetadata> {
    let rows = table_rows(content, 2, "metadata")?;
    let mut object = serde_json::Map::new();
    for fields in rows {
        let key = fields[0].clone();
        let cell = &fields[1];
        // Only the known structured keys hold embedded JSON; account
        // ids and checksums must stay strings even when fully numeric.
        let value = match key.as_str() {
            "retention_policy" | "encryption" | "resource_counts" | "size_bytes" => {
                serde_json::from_str::<serde_json::Value>(cell)
                    .unwrap_or_else(|_| serde_json::Value::String(cell.clone()))
            }
            _ => serde_json::Value::String(cell.clone()),
        };
        object.insert(key, value);
    }
    serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
        ParsingError::MalformedCsv {
            line: 0,
            reason: format!("metadata table does not form valid metadata: {e}"),
        }
        .into()
    })
}

fn optional(cell: &str) -> Option<String> {
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}

/// Decode a table, checking the column count against its header.
fn table_rows(content: &str, columns: usize, table: &str) -> IdmanResult<Vec<Vec<String>>> {
    let mut records = csvio::parse(content)?.into_iter();
    let Some(header) = records.next() else {
        return Ok(Vec::new());
    };
    if header.fields.len() != columns {
        return Err(ParsingError::MalformedCsv {
            line: header.line,
            reason: format!(
                "{table} table has {} columns, expected {columns}",
                header.fields.len()
            ),
        }
        .into());
    }
    let mut rows = Vec::new();
    for record in records {
        if record.fields.len() != columns {
            return Err(ParsingError::MalformedCsv {
                line: record.line,
                reason: format!(
                    "{table} row has {} fields, expected {columns}",
                    record.fields.len()
                ),
            }
            .into());
        }
        rows.push(record.fields);
    }
    Ok(rows)
}
