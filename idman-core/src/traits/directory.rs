//! Directory service capability interface.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::IdmanResult;
use crate::models::{
    AccountInfo, AssignmentData, GroupData, InstanceInfo, PermissionSetData, UserData,
};

/// The narrow directory capability set the core consumes.
///
/// Implementations own pagination and throttling: list calls return
/// complete vectors. The interface is passed explicitly at construction;
/// there is no hidden global client.
#[async_trait]
pub trait IDirectory: Send + Sync {
    // Instances
    async fn list_instances(&self) -> IdmanResult<Vec<InstanceInfo>>;

    // Users
    async fn list_users(&self) -> IdmanResult<Vec<UserData>>;
    /// Case-sensitive exact lookup by user name.
    async fn find_user_by_name(&self, user_name: &str) -> IdmanResult<Option<UserData>>;
    /// Returns the directory-assigned user id.
    async fn create_user(&self, user: &UserData) -> IdmanResult<String>;
    async fn update_user(&self, user_id: &str, user: &UserData) -> IdmanResult<()>;
    async fn delete_user(&self, user_id: &str) -> IdmanResult<()>;

    // Groups
    async fn list_groups(&self) -> IdmanResult<Vec<GroupData>>;
    /// Case-sensitive exact lookup by display name.
    async fn find_group_by_name(&self, display_name: &str) -> IdmanResult<Option<GroupData>>;
    /// Returns the directory-assigned group id.
    async fn create_group(&self, group: &GroupData) -> IdmanResult<String>;
    async fn update_group(&self, group_id: &str, group: &GroupData) -> IdmanResult<()>;
    async fn delete_group(&self, group_id: &str) -> IdmanResult<()>;

    // Permission sets
    async fn list_permission_sets(&self) -> IdmanResult<Vec<PermissionSetData>>;
    /// Case-sensitive exact lookup by permission set name.
    async fn find_permission_set_by_name(
        &self,
        name: &str,
    ) -> IdmanResult<Option<PermissionSetData>>;
    /// Returns the arn of the created permission set.
    async fn create_permission_set(&self, permission_set: &PermissionSetData)
        -> IdmanResult<String>;
    async fn update_permission_set(
        &self,
        permission_set_arn: &str,
        permission_set: &PermissionSetData,
    ) -> IdmanResult<()>;
    async fn delete_permission_set(&self, permission_set_arn: &str) -> IdmanResult<()>;

    // Assignments
    /// Existing assignments for one (account, permission set) pair.
    async fn list_assignments(
        &self,
        account_id: &str,
        permission_set_arn: &str,
    ) -> IdmanResult<Vec<AssignmentData>>;
    /// Every assignment in the instance.
    async fn list_all_assignments(&self) -> IdmanResult<Vec<AssignmentData>>;
    async fn create_assignment(&self, assignment: &AssignmentData) -> IdmanResult<()>;
    async fn delete_assignment(&self, assignment: &AssignmentData) -> IdmanResult<()>;

    // Accounts
    async fn list_accounts(&self) -> IdmanResult<Vec<AccountInfo>>;
    async fn describe_account(&self, account_id: &str) -> IdmanResult<Option<AccountInfo>>;
    async fn list_account_tags(&self, account_id: &str)
        -> IdmanResult<BTreeMap<String, String>>;

    // Policy existence, used by restore compatibility validation.
    async fn managed_policy_exists(&self, policy_arn: &str) -> IdmanResult<bool>;
}
