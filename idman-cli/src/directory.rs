//! File-backed directory adapter.
//!
//! The cloud directory client is an external collaborator; this adapter
//! implements the same capability interface over a local YAML state
//! file, which keeps every command usable offline and doubles as the
//! reference implementation of the seam. Mutations are written back to
//! the file immediately.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use idman_core::errors::{ExecutionError, IdmanResult, ParsingError, StorageError};
use idman_core::models::{
    AccountInfo, AssignmentData, GroupData, InstanceInfo, PermissionSetData, UserData,
};
use idman_core::traits::IDirectory;

/// Serialized directory state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryState {
    pub instances: Vec<InstanceInfo>,
    pub users: Vec<UserData>,
    pub groups: Vec<GroupData>,
    pub permission_sets: Vec<PermissionSetData>,
    pub assignments: Vec<AssignmentData>,
    pub accounts: Vec<AccountInfo>,
    pub account_tags: BTreeMap<String, BTreeMap<String, String>>,
    pub managed_policies: Vec<String>,
}

/// [`IDirectory`] over a YAML file on disk.
pub struct FileDirectory {
    path: PathBuf,
    state: Mutex<DirectoryState>,
}

impl FileDirectory {
    /// Load the directory state from `path`. A missing file starts
    /// empty and is created on the first mutation.
    pub fn open(path: PathBuf) -> IdmanResult<Self> {
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => {
                serde_yaml::from_str(&content).map_err(|e| ParsingError::MalformedYaml {
                    reason: format!("{}: {e}", path.display()),
                })?
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                DirectoryState::default()
            }
            Err(error) => {
                return Err(ParsingError::Unreadable {
                    path: path.display().to_string(),
                    reason: error.to_string(),
                }
                .into())
            }
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &DirectoryState) -> IdmanResult<()> {
        let content = serde_yaml::to_string(state).map_err(|e| StorageError::Serialization {
            reason: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::WriteFailed {
                key: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(&self.path, content).map_err(|e| StorageError::WriteFailed {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut DirectoryState) -> IdmanResult<T>,
    ) -> IdmanResult<T> {
        let mut state = self.state.lock().unwrap();
        let value = f(&mut state)?;
        self.persist(&state)?;
        Ok(value)
    }

    fn read<T>(&self, f: impl FnOnce(&DirectoryState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

fn unknown(operation: &str, what: &str) -> idman_core::errors::IdmanError {
    ExecutionError::InvalidParameters {
        operation: operation.to_string(),
        reason: format!("unknown {what}"),
    }
    .into()
}

#[async_trait]
impl IDirectory for FileDirectory {
    async fn list_instances(&self) -> IdmanResult<Vec<InstanceInfo>> {
        Ok(self.read(|s| s.instances.clone()))
    }

    async fn list_users(&self) -> IdmanResult<Vec<UserData>> {
        Ok(self.read(|s| s.users.clone()))
    }

    async fn find_user_by_name(&self, user_name: &str) -> IdmanResult<Option<UserData>> {
        Ok(self.read(|s| s.users.iter().find(|u| u.user_name == user_name).cloned()))
    }

    async fn create_user(&self, user: &UserData) -> IdmanResult<String> {
        self.mutate(|s| {
            let mut created = user.clone();
            if created.user_id.is_empty() {
                created.user_id = format!("u-{}", created.user_name);
            }
            let id = created.user_id.clone();
            s.users.push(created);
            Ok(id)
        })
    }

    async fn update_user(&self, user_id: &str, user: &UserData) -> IdmanResult<()> {
        self.mutate(|s| {
            let Some(existing) = s.users.iter_mut().find(|u| u.user_id == user_id) else {
                return Err(unknown("update_user", "user id"));
            };
            let id = existing.user_id.clone();
            *existing = user.clone();
            existing.user_id = id;
            Ok(())
        })
    }

    async fn delete_user(&self, user_id: &str) -> IdmanResult<()> {
        self.mutate(|s| {
            s.users.retain(|u| u.user_id != user_id);
            Ok(())
        })
    }

    async fn list_groups(&self) -> IdmanResult<Vec<GroupData>> {
        Ok(self.read(|s| s.groups.clone()))
    }

    async fn find_group_by_name(&self, display_name: &str) -> IdmanResult<Option<GroupData>> {
        Ok(self.read(|s| {
            s.groups
                .iter()
                .find(|g| g.display_name == display_name)
                .cloned()
        }))
    }

    async fn create_group(&self, group: &GroupData) -> IdmanResult<String> {
        self.mutate(|s| {
            let mut created = group.clone();
            if created.group_id.is_empty() {
                created.group_id = format!("g-{}", created.display_name);
            }
            let id = created.group_id.clone();
            s.groups.push(created);
            Ok(id)
        })
    }

    async fn update_group(&self, group_id: &str, group: &GroupData) -> IdmanResult<()> {
        self.mutate(|s| {
            let Some(existing) = s.groups.iter_mut().find(|g| g.group_id == group_id) else {
                return Err(unknown("update_group", "group id"));
            };
            let id = existing.group_id.clone();
            *existing = group.clone();
            existing.group_id = id;
            Ok(())
        })
    }

    async fn delete_group(&self, group_id: &str) -> IdmanResult<()> {
        self.mutate(|s| {
            s.groups.retain(|g| g.group_id != group_id);
            Ok(())
        })
    }

    async fn list_permission_sets(&self) -> IdmanResult<Vec<PermissionSetData>> {
        Ok(self.read(|s| s.permission_sets.clone()))
    }

    async fn find_permission_set_by_name(
        &self,
        name: &str,
    ) -> IdmanResult<Option<PermissionSetData>> {
        Ok(self.read(|s| s.permission_sets.iter().find(|p| p.name == name).cloned()))
    }

    async fn create_permission_set(
        &self,
        permission_set: &PermissionSetData,
    ) -> IdmanResult<String> {
        self.mutate(|s| {
            let mut created = permission_set.clone();
            if created.permission_set_arn.is_empty() {
                created.permission_set_arn =
                    format!("arn:aws:sso:::permissionSet/local/ps-{}", created.name);
            }
            let arn = created.permission_set_arn.clone();
            s.permission_sets.push(created);
            Ok(arn)
        })
    }

    async fn update_permission_set(
        &self,
        permission_set_arn: &str,
        permission_set: &PermissionSetData,
    ) -> IdmanResult<()> {
        self.mutate(|s| {
            let Some(existing) = s
                .permission_sets
                .iter_mut()
                .find(|p| p.permission_set_arn == permission_set_arn)
            else {
                return Err(unknown("update_permission_set", "permission set arn"));
            };
            let arn = existing.permission_set_arn.clone();
            *existing = permission_set.clone();
            existing.permission_set_arn = arn;
            Ok(())
        })
    }

    async fn delete_permission_set(&self, permission_set_arn: &str) -> IdmanResult<()> {
        self.mutate(|s| {
            s.permission_sets
                .retain(|p| p.permission_set_arn != permission_set_arn);
            Ok(())
        })
    }

    async fn list_assignments(
        &self,
        account_id: &str,
        permission_set_arn: &str,
    ) -> IdmanResult<Vec<AssignmentData>> {
        Ok(self.read(|s| {
            s.assignments
                .iter()
                .filter(|a| {
                    a.account_id == account_id && a.permission_set_arn == permission_set_arn
                })
                .cloned()
                .collect()
        }))
    }

    async fn list_all_assignments(&self) -> IdmanResult<Vec<AssignmentData>> {
        Ok(self.read(|s| s.assignments.clone()))
    }

    async fn create_assignment(&self, assignment: &AssignmentData) -> IdmanResult<()> {
        self.mutate(|s| {
            if !s.assignments.contains(assignment) {
                s.assignments.push(assignment.clone());
            }
            Ok(())
        })
    }

    async fn delete_assignment(&self, assignment: &AssignmentData) -> IdmanResult<()> {
        self.mutate(|s| {
            s.assignments.retain(|a| a != assignment);
            Ok(())
        })
    }

    async fn list_accounts(&self) -> IdmanResult<Vec<AccountInfo>> {
        Ok(self.read(|s| s.accounts.clone()))
    }

    async fn describe_account(&self, account_id: &str) -> IdmanResult<Option<AccountInfo>> {
        Ok(self.read(|s| {
            s.accounts
                .iter()
                .find(|a| a.account_id == account_id)
                .cloned()
        }))
    }

    async fn list_account_tags(
        &self,
        account_id: &str,
    ) -> IdmanResult<BTreeMap<String, String>> {
        Ok(self.read(|s| s.account_tags.get(account_id).cloned().unwrap_or_default()))
    }

    async fn managed_policy_exists(&self, policy_arn: &str) -> IdmanResult<bool> {
        Ok(self.read(|s| s.managed_policies.iter().any(|p| p == policy_arn)))
    }
}
