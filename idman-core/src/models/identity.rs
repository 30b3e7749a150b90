//! Identity store records: users, groups, permission sets, assignments.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Kind of principal an assignment binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrincipalType {
    User,
    Group,
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalType::User => write!(f, "USER"),
            PrincipalType::Group => write!(f, "GROUP"),
        }
    }
}

impl FromStr for PrincipalType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(PrincipalType::User),
            "GROUP" => Ok(PrincipalType::Group),
            other => Err(ValidationError::InvalidPrincipalType {
                value: other.to_string(),
                line: None,
            }),
        }
    }
}

/// A user in the identity store.
///
/// `user_name` is unique within the store; `user_id` is assigned by the
/// directory and is the stable key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// External identity provider ids, name -> value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<String, String>,
    /// Directory-reported modification stamp, used by incremental collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl UserData {
    /// Whether any scalar identity field differs from `other`.
    /// Drives MERGE conflict resolution for users.
    pub fn identity_differs_from(&self, other: &UserData) -> bool {
        self.display_name != other.display_name
            || self.email != other.email
            || self.given_name != other.given_name
            || self.family_name != other.family_name
            || self.active != other.active
    }
}

/// A group in the identity store. `display_name` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupData {
    pub group_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// User ids of the group members.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// A customer-managed policy reference attached to a permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerManagedPolicy {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A named bundle of policies assignable to a principal in an account.
/// `name` is unique within an instance; `permission_set_arn` is the stable key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSetData {
    pub permission_set_arn: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_policy: Option<String>,
    /// Managed policy arns, in attachment order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_policies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub customer_managed_policies: Vec<CustomerManagedPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions_boundary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// A binding of one principal to one permission set within one account.
///
/// Identity is the full 4-tuple; duplicate assignments are idempotent no-ops.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssignmentData {
    pub account_id: String,
    pub permission_set_arn: String,
    pub principal_type: PrincipalType,
    pub principal_id: String,
}

impl AssignmentData {
    /// Stable identity key for journals, caches, and sorting.
    pub fn assignment_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.account_id, self.permission_set_arn, self.principal_type, self.principal_id
        )
    }
}

/// A top-level instance as reported by the directory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub instance_arn: String,
    pub identity_store_id: String,
}

/// An account visible to the organization listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    pub name: String,
    /// Lifecycle status, e.g. "ACTIVE".
    pub status: String,
}

impl AccountInfo {
    pub fn is_active(&self) -> bool {
        self.status == "ACTIVE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_type_round_trips_through_display() {
        for kind in [PrincipalType::User, PrincipalType::Group] {
            assert_eq!(kind.to_string().parse::<PrincipalType>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_principal_type_is_rejected() {
        assert!("ROLE".parse::<PrincipalType>().is_err());
    }

    #[test]
    fn assignment_key_is_the_four_tuple() {
        let assignment = AssignmentData {
            account_id: "123456789012".to_string(),
            permission_set_arn: "arn:aws:sso:::permissionSet/ins-1/ps-1".to_string(),
            principal_type: PrincipalType::Group,
            principal_id: "g-1".to_string(),
        };
        assert_eq!(
            assignment.assignment_key(),
            "123456789012:arn:aws:sso:::permissionSet/ins-1/ps-1:GROUP:g-1"
        );
    }
}
