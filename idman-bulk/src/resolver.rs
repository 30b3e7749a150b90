//! Name-to-identifier resolution with a batch-scoped memoising cache.
//!
//! The cache is owned by the batch run and passed explicitly; there is no
//! module-global state. Concurrent misses on the same key collapse to a
//! single directory fetch, and negative lookups are cached for the batch
//! lifetime. Matching is case-sensitive and names are not normalised.

use std::sync::Arc;

use moka::future::Cache;

use idman_core::errors::{IdmanError, IdmanResult, ValidationError};
use idman_core::models::{AssignmentData, PrincipalType};
use idman_core::traits::IDirectory;

use crate::ingest::BulkOperationRecord;

const CACHE_CAPACITY: u64 = 100_000;

/// A record enriched with resolved identifiers and per-field errors.
#[derive(Debug, Clone)]
pub struct ResolvedAssignment {
    pub record: BulkOperationRecord,
    pub principal_id: Option<String>,
    pub permission_set_arn: Option<String>,
    pub account_id: Option<String>,
    pub resolution_errors: Vec<String>,
}

impl ResolvedAssignment {
    /// Whether every field resolved.
    pub fn success(&self) -> bool {
        self.resolution_errors.is_empty()
            && self.principal_id.is_some()
            && self.permission_set_arn.is_some()
            && self.account_id.is_some()
    }

    /// Concrete assignment tuple, when fully resolved.
    pub fn to_assignment(&self) -> Option<AssignmentData> {
        Some(AssignmentData {
            account_id: self.account_id.clone()?,
            permission_set_arn: self.permission_set_arn.clone()?,
            principal_type: self.record.principal_type,
            principal_id: self.principal_id.clone()?,
        })
    }
}

/// Batch-scoped resolver over the directory capability.
pub struct ResourceResolver {
    directory: Arc<dyn IDirectory>,
    principals: Cache<(PrincipalType, String), Option<String>>,
    permission_sets: Cache<String, Option<String>>,
    accounts: Cache<String, Option<String>>,
}

impl ResourceResolver {
    pub fn new(directory: Arc<dyn IDirectory>) -> Self {
        Self {
            directory,
            principals: Cache::new(CACHE_CAPACITY),
            permission_sets: Cache::new(CACHE_CAPACITY),
            accounts: Cache::new(CACHE_CAPACITY),
        }
    }

    /// Resolve a principal name to its directory id.
    pub async fn resolve_principal(
        &self,
        name: &str,
        kind: PrincipalType,
    ) -> IdmanResult<String> {
        let directory = Arc::clone(&self.directory);
        let lookup_name = name.to_string();
        let cached = self
            .principals
            .try_get_with((kind, name.to_string()), async move {
                match kind {
                    PrincipalType::User => directory
                        .find_user_by_name(&lookup_name)
                        .await
                        .map(|found| found.map(|u| u.user_id)),
                    PrincipalType::Group => directory
                        .find_group_by_name(&lookup_name)
                        .await
                        .map(|found| found.map(|g| g.group_id)),
                }
            })
            .await
            .map_err(unwrap_shared)?;
        cached.ok_or_else(|| {
            ValidationError::EntityNotFound {
                reference: format!(
                    "{}:{name}",
                    match kind {
                        PrincipalType::User => "user",
                        PrincipalType::Group => "group",
                    }
                ),
            }
            .into()
        })
    }

    /// Resolve a permission set name to its arn.
    pub async fn resolve_permission_set(&self, name: &str) -> IdmanResult<String> {
        let directory = Arc::clone(&self.directory);
        let lookup_name = name.to_string();
        let cached = self
            .permission_sets
            .try_get_with(name.to_string(), async move {
                directory
                    .find_permission_set_by_name(&lookup_name)
                    .await
                    .map(|found| found.map(|p| p.permission_set_arn))
            })
            .await
            .map_err(unwrap_shared)?;
        cached.ok_or_else(|| {
            ValidationError::PermissionSetNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Resolve an account name to its 12-digit id.
    pub async fn resolve_account(&self, name: &str) -> IdmanResult<String> {
        let directory = Arc::clone(&self.directory);
        let lookup_name = name.to_string();
        let cached = self
            .accounts
            .try_get_with(name.to_string(), async move {
                directory.list_accounts().await.map(|accounts| {
                    accounts
                        .into_iter()
                        .find(|a| a.name == lookup_name)
                        .map(|a| a.account_id)
                })
            })
            .await
            .map_err(unwrap_shared)?;
        cached.ok_or_else(|| {
            ValidationError::AccountNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Bulk pre-fetch: one directory round-trip per referenced resource
    /// kind, seeding every cache before per-record resolution begins.
    pub async fn warm_cache_for(&self, records: &[BulkOperationRecord]) -> IdmanResult<()> {
        let wants_users = records
            .iter()
            .any(|r| r.principal_type == PrincipalType::User);
        let wants_groups = records
            .iter()
            .any(|r| r.principal_type == PrincipalType::Group);

        if wants_users {
            for user in self.directory.list_users().await? {
                self.principals
                    .insert(
                        (PrincipalType::User, user.user_name.clone()),
                        Some(user.user_id),
                    )
                    .await;
            }
        }
        if wants_groups {
            for group in self.directory.list_groups().await? {
                self.principals
                    .insert(
                        (PrincipalType::Group, group.display_name.clone()),
                        Some(group.group_id),
                    )
                    .await;
            }
        }
        if !records.is_empty() {
            for permission_set in self.directory.list_permission_sets().await? {
                self.permission_sets
                    .insert(
                        permission_set.name.clone(),
                        Some(permission_set.permission_set_arn),
                    )
                    .await;
            }
            for account in self.directory.list_accounts().await? {
                self.accounts
                    .insert(account.name.clone(), Some(account.account_id))
                    .await;
            }
        }
        tracing::debug!("resolver: cache warmed for {} records", records.len());
        Ok(())
    }

    /// Enrich one record, collecting per-field errors instead of aborting.
    pub async fn resolve_assignment(&self, record: &BulkOperationRecord) -> ResolvedAssignment {
        let mut resolved = ResolvedAssignment {
            record: record.clone(),
            principal_id: None,
            permission_set_arn: None,
            account_id: None,
            resolution_errors: Vec::new(),
        };

        match self
            .resolve_principal(&record.principal_name, record.principal_type)
            .await
        {
            Ok(id) => resolved.principal_id = Some(id),
            Err(error) => resolved
                .resolution_errors
                .push(format!("{error}. {}", error.recovery_suggestion())),
        }
        match self
            .resolve_permission_set(&record.permission_set_name)
            .await
        {
            Ok(arn) => resolved.permission_set_arn = Some(arn),
            Err(error) => resolved
                .resolution_errors
                .push(format!("{error}. {}", error.recovery_suggestion())),
        }
        match self.resolve_account(&record.account_name).await {
            Ok(id) => resolved.account_id = Some(id),
            Err(error) => resolved
                .resolution_errors
                .push(format!("{error}. {}", error.recovery_suggestion())),
        }
        resolved
    }
}

/// Shared errors out of the cache's single-flight loader.
fn unwrap_shared(error: Arc<IdmanError>) -> IdmanError {
    (*error).clone()
}
