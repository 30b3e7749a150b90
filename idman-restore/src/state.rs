//! Operation state: checkpoints, applied changes, rollback journal, and
//! the store that retains completed states for an inspection window.
//!
//! States are guarded by a mutex and keyed by operation id; a single
//! background reaper scans an expiry heap instead of scheduling one
//! timer per operation.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use idman_core::constants::DEFAULT_OPERATION_STATE_TTL_SECS;
use idman_core::models::{
    AssignmentData, GroupData, PermissionSetData, ResourceType, UserData,
};

/// Named progress marker with the resource counts observed at that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// Whether a change created a resource or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
}

/// One applied forward change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedChange {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub action: ChangeAction,
    pub prior_value: Option<serde_json::Value>,
    pub new_value: serde_json::Value,
}

/// Inverse operation recorded before its forward change is issued.
///
/// Creates invert to deletes; updates invert to restoring the prior
/// value. Journal entries are consumed in strict reverse order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RollbackAction {
    DeleteUser { user_name: String },
    DeleteGroup { display_name: String },
    DeletePermissionSet { name: String },
    DeleteAssignment { assignment: AssignmentData },
    RestoreUser { prior: UserData },
    RestoreGroup { prior: GroupData },
    RestorePermissionSet { prior: PermissionSetData },
}

/// Full state of one restore operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationState {
    pub operation_id: String,
    pub operation_type: String,
    pub start_time: DateTime<Utc>,
    pub checkpoints: Vec<Checkpoint>,
    pub applied_changes: Vec<AppliedChange>,
    pub rollback_actions: Vec<RollbackAction>,
    pub completed: bool,
    pub success: bool,
}

impl OperationState {
    pub fn new(operation_id: &str, operation_type: &str) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            operation_type: operation_type.to_string(),
            start_time: Utc::now(),
            checkpoints: Vec::new(),
            applied_changes: Vec::new(),
            rollback_actions: Vec::new(),
            completed: false,
            success: false,
        }
    }

    pub fn add_checkpoint(&mut self, name: &str, details: serde_json::Value) {
        self.checkpoints.push(Checkpoint {
            name: name.to_string(),
            created_at: Utc::now(),
            details,
        });
    }

    pub fn has_checkpoint(&self, name: &str) -> bool {
        self.checkpoints.iter().any(|c| c.name == name)
    }

    pub fn add_rollback_action(&mut self, action: RollbackAction) {
        self.rollback_actions.push(action);
    }

    pub fn add_change(
        &mut self,
        resource_type: ResourceType,
        resource_id: &str,
        action: ChangeAction,
        prior_value: Option<serde_json::Value>,
        new_value: serde_json::Value,
    ) {
        self.applied_changes.push(AppliedChange {
            resource_type,
            resource_id: resource_id.to_string(),
            action,
            prior_value,
            new_value,
        });
    }
}

/// Listing row for tracked operations.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSummary {
    pub operation_id: String,
    pub operation_type: String,
    pub start_time: DateTime<Utc>,
    pub completed: bool,
    pub success: bool,
    pub checkpoint_count: usize,
    pub change_count: usize,
    pub rollback_action_count: usize,
}

type SharedState = Arc<tokio::sync::Mutex<OperationState>>;

#[derive(Default)]
struct StoreInner {
    states: HashMap<String, SharedState>,
    expiry: BinaryHeap<Reverse<(Instant, String)>>,
}

/// Mutex-guarded operation-state map with delayed eviction.
#[derive(Clone)]
pub struct OperationStateStore {
    inner: Arc<Mutex<StoreInner>>,
    ttl: Duration,
}

impl Default for OperationStateStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_OPERATION_STATE_TTL_SECS))
    }
}

impl OperationStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            ttl,
        }
    }

    /// Track a new state, returning its shared handle.
    pub fn insert(&self, state: OperationState) -> SharedState {
        let id = state.operation_id.clone();
        let shared = Arc::new(tokio::sync::Mutex::new(state));
        self.inner
            .lock()
            .unwrap()
            .states
            .insert(id, Arc::clone(&shared));
        shared
    }

    pub fn get(&self, operation_id: &str) -> Option<SharedState> {
        self.inner
            .lock()
            .unwrap()
            .states
            .get(operation_id)
            .cloned()
    }

    /// Schedule eviction after the inspection window.
    pub fn schedule_eviction(&self, operation_id: &str) {
        let deadline = Instant::now() + self.ttl;
        self.inner
            .lock()
            .unwrap()
            .expiry
            .push(Reverse((deadline, operation_id.to_string())));
    }

    pub async fn list(&self) -> Vec<OperationSummary> {
        let shared: Vec<SharedState> = {
            let inner = self.inner.lock().unwrap();
            inner.states.values().cloned().collect()
        };
        let mut summaries = Vec::with_capacity(shared.len());
        for state in shared {
            let state = state.lock().await;
            summaries.push(OperationSummary {
                operation_id: state.operation_id.clone(),
                operation_type: state.operation_type.clone(),
                start_time: state.start_time,
                completed: state.completed,
                success: state.success,
                checkpoint_count: state.checkpoints.len(),
                change_count: state.applied_changes.len(),
                rollback_action_count: state.rollback_actions.len(),
            });
        }
        summaries.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        summaries
    }

    /// Evict every state whose deadline has passed; returns the count.
    pub fn evict_due(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        let mut evicted = 0;
        while let Some(Reverse((deadline, _))) = inner.expiry.peek() {
            if *deadline > now {
                break;
            }
            let Reverse((_, id)) = inner.expiry.pop().unwrap();
            if inner.states.remove(&id).is_some() {
                evicted += 1;
                tracing::debug!("state: evicted operation {id}");
            }
        }
        evicted
    }

    /// Spawn the single background reaper scanning the expiry heap.
    pub fn spawn_reaper(&self) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                let next_deadline = {
                    let inner = store.inner.lock().unwrap();
                    inner.expiry.peek().map(|Reverse((deadline, _))| *deadline)
                };
                let sleep_until =
                    next_deadline.unwrap_or_else(|| Instant::now() + store.ttl.max(Duration::from_secs(1)));
                tokio::time::sleep_until(sleep_until).await;
                store.evict_due();
            }
        })
    }
}
