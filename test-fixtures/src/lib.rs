//! In-memory fakes for the capability traits, shared by integration
//! tests across the workspace.
//!
//! [`MemoryDirectory`] records every call it receives so tests can assert
//! memoisation, idempotence, and zero-mutation guarantees; failures can
//! be injected per operation to exercise retry and rollback paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use idman_core::errors::{ExecutionError, IdmanError, IdmanResult, StorageError};
use idman_core::models::{
    AccountInfo, AssignmentData, GroupData, InstanceInfo, PermissionSetData, PrincipalType,
    UserData,
};
use idman_core::traits::{IDirectory, IStorageBackend};

/// Record builders used by most suites.
pub fn user(name: &str) -> UserData {
    UserData {
        user_id: format!("u-{name}"),
        user_name: name.to_string(),
        display_name: Some(name.to_string()),
        email: Some(format!("{name}@example.com")),
        given_name: None,
        family_name: None,
        active: true,
        external_ids: BTreeMap::new(),
        last_modified: None,
    }
}

pub fn group(name: &str, members: &[&str]) -> GroupData {
    GroupData {
        group_id: format!("g-{name}"),
        display_name: name.to_string(),
        description: None,
        members: members.iter().map(|m| format!("u-{m}")).collect(),
        last_modified: None,
    }
}

pub fn permission_set(name: &str) -> PermissionSetData {
    PermissionSetData {
        permission_set_arn: format!("arn:aws:sso:::permissionSet/ins-1/ps-{name}"),
        name: name.to_string(),
        description: None,
        session_duration: Some("PT1H".to_string()),
        relay_state: None,
        inline_policy: None,
        managed_policies: vec![],
        customer_managed_policies: vec![],
        permissions_boundary: None,
        last_modified: None,
    }
}

pub fn account(id: &str, name: &str) -> AccountInfo {
    AccountInfo {
        account_id: id.to_string(),
        name: name.to_string(),
        status: "ACTIVE".to_string(),
    }
}

pub fn assignment(
    account_id: &str,
    permission_set_arn: &str,
    principal_type: PrincipalType,
    principal_id: &str,
) -> AssignmentData {
    AssignmentData {
        account_id: account_id.to_string(),
        permission_set_arn: permission_set_arn.to_string(),
        principal_type,
        principal_id: principal_id.to_string(),
    }
}

#[derive(Default)]
struct DirectoryState {
    instances: Vec<InstanceInfo>,
    users: Vec<UserData>,
    groups: Vec<GroupData>,
    permission_sets: Vec<PermissionSetData>,
    assignments: Vec<AssignmentData>,
    accounts: Vec<AccountInfo>,
    account_tags: BTreeMap<String, BTreeMap<String, String>>,
    known_policies: Vec<String>,
}

/// In-memory [`IDirectory`] with call logging and failure injection.
#[derive(Default)]
pub struct MemoryDirectory {
    state: Mutex<DirectoryState>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, Vec<IdmanError>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        let directory = Self::default();
        directory.state.lock().unwrap().instances.push(InstanceInfo {
            instance_arn: "arn:aws:sso:us-east-1:123456789012:instance/ins-1".to_string(),
            identity_store_id: "d-1234567890".to_string(),
        });
        directory
    }

    pub fn with_instance(self, instance_arn: &str, identity_store_id: &str) -> Self {
        self.state.lock().unwrap().instances.push(InstanceInfo {
            instance_arn: instance_arn.to_string(),
            identity_store_id: identity_store_id.to_string(),
        });
        self
    }

    pub fn with_user(self, user: UserData) -> Self {
        self.state.lock().unwrap().users.push(user);
        self
    }

    pub fn with_group(self, group: GroupData) -> Self {
        self.state.lock().unwrap().groups.push(group);
        self
    }

    pub fn with_permission_set(self, permission_set: PermissionSetData) -> Self {
        self.state
            .lock()
            .unwrap()
            .permission_sets
            .push(permission_set);
        self
    }

    pub fn with_assignment(self, assignment: AssignmentData) -> Self {
        self.state.lock().unwrap().assignments.push(assignment);
        self
    }

    pub fn with_account(self, account: AccountInfo) -> Self {
        self.state.lock().unwrap().accounts.push(account);
        self
    }

    pub fn with_account_tags(self, account_id: &str, tags: BTreeMap<String, String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .account_tags
            .insert(account_id.to_string(), tags);
        self
    }

    pub fn with_known_policy(self, policy_arn: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .known_policies
            .push(policy_arn.to_string());
        self
    }

    /// Queue `count` copies of `error` for the named operation; once the
    /// queue drains, calls succeed again.
    pub fn fail_times(&self, operation: &str, error: IdmanError, count: usize) {
        let mut failures = self.failures.lock().unwrap();
        let queue = failures.entry(operation.to_string()).or_default();
        for _ in 0..count {
            queue.push(error.clone());
        }
    }

    /// Every recorded call in arrival order, as `operation:detail`.
    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls whose log entry starts with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Number of create/update/delete calls recorded.
    pub fn mutating_call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                c.starts_with("create_") || c.starts_with("update_") || c.starts_with("delete_")
            })
            .count()
    }

    pub fn assignments(&self) -> Vec<AssignmentData> {
        self.state.lock().unwrap().assignments.clone()
    }

    pub fn users(&self) -> Vec<UserData> {
        self.state.lock().unwrap().users.clone()
    }

    pub fn groups(&self) -> Vec<GroupData> {
        self.state.lock().unwrap().groups.clone()
    }

    pub fn permission_sets(&self) -> Vec<PermissionSetData> {
        self.state.lock().unwrap().permission_sets.clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn take_failure(&self, operation: &str) -> Option<IdmanError> {
        let mut failures = self.failures.lock().unwrap();
        failures.get_mut(operation).and_then(|queue| {
            if queue.is_empty() {
                None
            } else {
                Some(queue.remove(0))
            }
        })
    }

    fn check(&self, operation: &str, detail: &str) -> IdmanResult<()> {
        self.record(format!("{operation}:{detail}"));
        match self.take_failure(operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IDirectory for MemoryDirectory {
    async fn list_instances(&self) -> IdmanResult<Vec<InstanceInfo>> {
        self.check("list_instances", "")?;
        Ok(self.state.lock().unwrap().instances.clone())
    }

    async fn list_users(&self) -> IdmanResult<Vec<UserData>> {
        self.check("list_users", "")?;
        Ok(self.state.lock().unwrap().users.clone())
    }

    async fn find_user_by_name(&self, user_name: &str) -> IdmanResult<Option<UserData>> {
        self.check("find_user_by_name", user_name)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.user_name == user_name)
            .cloned())
    }

    async fn create_user(&self, user: &UserData) -> IdmanResult<String> {
        self.check("create_user", &user.user_name)?;
        let mut state = self.state.lock().unwrap();
        let mut created = user.clone();
        if created.user_id.is_empty() {
            created.user_id = format!("u-{}", created.user_name);
        }
        let id = created.user_id.clone();
        state.users.push(created);
        Ok(id)
    }

    async fn update_user(&self, user_id: &str, user: &UserData) -> IdmanResult<()> {
        self.check("update_user", user_id)?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.users.iter_mut().find(|u| u.user_id == user_id) {
            let id = existing.user_id.clone();
            *existing = user.clone();
            existing.user_id = id;
            Ok(())
        } else {
            Err(ExecutionError::InvalidParameters {
                operation: "update_user".to_string(),
                reason: format!("unknown user id {user_id}"),
            }
            .into())
        }
    }

    async fn delete_user(&self, user_id: &str) -> IdmanResult<()> {
        self.check("delete_user", user_id)?;
        self.state
            .lock()
            .unwrap()
            .users
            .retain(|u| u.user_id != user_id);
        Ok(())
    }

    async fn list_groups(&self) -> IdmanResult<Vec<GroupData>> {
        self.check("list_groups", "")?;
        Ok(self.state.lock().unwrap().groups.clone())
    }

    async fn find_group_by_name(&self, display_name: &str) -> IdmanResult<Option<GroupData>> {
        self.check("find_group_by_name", display_name)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .groups
            .iter()
            .find(|g| g.display_name == display_name)
            .cloned())
    }

    async fn create_group(&self, group: &GroupData) -> IdmanResult<String> {
        self.check("create_group", &group.display_name)?;
        let mut state = self.state.lock().unwrap();
        let mut created = group.clone();
        if created.group_id.is_empty() {
            created.group_id = format!("g-{}", created.display_name);
        }
        let id = created.group_id.clone();
        state.groups.push(created);
        Ok(id)
    }

    async fn update_group(&self, group_id: &str, group: &GroupData) -> IdmanResult<()> {
        self.check("update_group", group_id)?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.groups.iter_mut().find(|g| g.group_id == group_id) {
            let id = existing.group_id.clone();
            *existing = group.clone();
            existing.group_id = id;
            Ok(())
        } else {
            Err(ExecutionError::InvalidParameters {
                operation: "update_group".to_string(),
                reason: format!("unknown group id {group_id}"),
            }
            .into())
        }
    }

    async fn delete_group(&self, group_id: &str) -> IdmanResult<()> {
        self.check("delete_group", group_id)?;
        self.state
            .lock()
            .unwrap()
            .groups
            .retain(|g| g.group_id != group_id);
        Ok(())
    }

    async fn list_permission_sets(&self) -> IdmanResult<Vec<PermissionSetData>> {
        self.check("list_permission_sets", "")?;
        Ok(self.state.lock().unwrap().permission_sets.clone())
    }

    async fn find_permission_set_by_name(
        &self,
        name: &str,
    ) -> IdmanResult<Option<PermissionSetData>> {
        self.check("find_permission_set_by_name", name)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .permission_sets
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn create_permission_set(
        &self,
        permission_set: &PermissionSetData,
    ) -> IdmanResult<String> {
        self.check("create_permission_set", &permission_set.name)?;
        let mut state = self.state.lock().unwrap();
        let mut created = permission_set.clone();
        if created.permission_set_arn.is_empty() {
            created.permission_set_arn =
                format!("arn:aws:sso:::permissionSet/ins-1/ps-{}", created.name);
        }
        let arn = created.permission_set_arn.clone();
        state.permission_sets.push(created);
        Ok(arn)
    }

    async fn update_permission_set(
        &self,
        permission_set_arn: &str,
        permission_set: &PermissionSetData,
    ) -> IdmanResult<()> {
        self.check("update_permission_set", permission_set_arn)?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .permission_sets
            .iter_mut()
            .find(|p| p.permission_set_arn == permission_set_arn)
        {
            let arn = existing.permission_set_arn.clone();
            *existing = permission_set.clone();
            existing.permission_set_arn = arn;
            Ok(())
        } else {
            Err(ExecutionError::InvalidParameters {
                operation: "update_permission_set".to_string(),
                reason: format!("unknown permission set {permission_set_arn}"),
            }
            .into())
        }
    }

    async fn delete_permission_set(&self, permission_set_arn: &str) -> IdmanResult<()> {
        self.check("delete_permission_set", permission_set_arn)?;
        self.state
            .lock()
            .unwrap()
            .permission_sets
            .retain(|p| p.permission_set_arn != permission_set_arn);
        Ok(())
    }

    async fn list_assignments(
        &self,
        account_id: &str,
        permission_set_arn: &str,
    ) -> IdmanResult<Vec<AssignmentData>> {
        self.check(
            "list_assignments",
            &format!("{account_id}:{permission_set_arn}"),
        )?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .assignments
            .iter()
            .filter(|a| a.account_id == account_id && a.permission_set_arn == permission_set_arn)
            .cloned()
            .collect())
    }

    async fn list_all_assignments(&self) -> IdmanResult<Vec<AssignmentData>> {
        self.check("list_all_assignments", "")?;
        Ok(self.state.lock().unwrap().assignments.clone())
    }

    async fn create_assignment(&self, assignment: &AssignmentData) -> IdmanResult<()> {
        self.check("create_assignment", &assignment.assignment_key())?;
        let mut state = self.state.lock().unwrap();
        if !state.assignments.contains(assignment) {
            state.assignments.push(assignment.clone());
        }
        Ok(())
    }

    async fn delete_assignment(&self, assignment: &AssignmentData) -> IdmanResult<()> {
        self.check("delete_assignment", &assignment.assignment_key())?;
        self.state
            .lock()
            .unwrap()
            .assignments
            .retain(|a| a != assignment);
        Ok(())
    }

    async fn list_accounts(&self) -> IdmanResult<Vec<AccountInfo>> {
        self.check("list_accounts", "")?;
        Ok(self.state.lock().unwrap().accounts.clone())
    }

    async fn describe_account(&self, account_id: &str) -> IdmanResult<Option<AccountInfo>> {
        self.check("describe_account", account_id)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|a| a.account_id == account_id)
            .cloned())
    }

    async fn list_account_tags(
        &self,
        account_id: &str,
    ) -> IdmanResult<BTreeMap<String, String>> {
        self.check("list_account_tags", account_id)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .account_tags
            .get(account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn managed_policy_exists(&self, policy_arn: &str) -> IdmanResult<bool> {
        self.check("managed_policy_exists", policy_arn)?;
        let state = self.state.lock().unwrap();
        Ok(state.known_policies.iter().any(|p| p == policy_arn))
    }
}

/// In-memory [`IStorageBackend`].
#[derive(Default)]
pub struct MemoryStorageBackend {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a storage error.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    pub fn key_count(&self) -> usize {
        self.data.lock().unwrap().len()
    }
}

#[async_trait]
impl IStorageBackend for MemoryStorageBackend {
    async fn write_data(&self, key: &str, data: &[u8]) -> IdmanResult<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_data(&self, key: &str) -> IdmanResult<Option<Vec<u8>>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn delete_data(&self, key: &str) -> IdmanResult<bool> {
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }

    async fn list_keys(&self, prefix: Option<&str>) -> IdmanResult<Vec<String>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .keys()
            .filter(|k| prefix.map(|p| k.starts_with(p)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn exists(&self, key: &str) -> IdmanResult<bool> {
        Ok(self.data.lock().unwrap().contains_key(key))
    }

    async fn get_metadata(&self, key: &str) -> IdmanResult<Option<BTreeMap<String, String>>> {
        Ok(self.data.lock().unwrap().get(key).map(|v| {
            BTreeMap::from([("size".to_string(), v.len().to_string())])
        }))
    }
}
