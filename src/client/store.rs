use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use tracing::warn;

use crate::client::error::StoreError;
use crate::client::form::TaskDraft;
use crate::client::remote::RemoteTasks;
use crate::models::{Task, TaskStatus, UpdateTaskRequest};

struct Inner {
    tasks: Vec<Task>,
    revision: u64,
}

/// Outcome of a bulk delete. Tasks whose remote delete confirmed are listed
/// in `removed` (and dropped locally); the rest are in `failed` with the
/// error each one hit, so the caller knows exactly which deletions to retry.
#[derive(Debug, Default)]
pub struct BulkRemoveReport {
    pub removed: Vec<String>,
    pub failed: Vec<(String, StoreError)>,
}

impl BulkRemoveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// UI-session-scoped view of one user's task collection.
///
/// The collection is not authoritative: every mutation round-trips through
/// the injected [`RemoteTasks`] backend, and the entry is overwritten with
/// whatever the backend returns. The one optimistic exception is
/// [`toggle_status`](TaskStore::toggle_status), which flips locally before
/// the call and rolls back to its snapshot on failure.
///
/// The lock is only ever held for synchronous snapshot/apply work, never
/// across an await, so overlapping operations on different tasks interleave
/// freely and each applies against the latest collection state.
pub struct TaskStore {
    remote: Arc<dyn RemoteTasks>,
    inner: Mutex<Inner>,
}

impl TaskStore {
    pub fn new(remote: Arc<dyn RemoteTasks>) -> Self {
        Self {
            remote,
            inner: Mutex::new(Inner {
                tasks: Vec::new(),
                revision: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current ordered collection, newest first.
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Monotonic counter, bumped on every visible mutation. View code keys
    /// its memoization on this.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    pub fn snapshot(&self) -> (u64, Vec<Task>) {
        let inner = self.lock();
        (inner.revision, inner.tasks.clone())
    }

    /// Applies `mutate` to the collection and returns the pre-mutation
    /// snapshot for a later [`rollback`](TaskStore::rollback). Transactional
    /// seam for optimistic updates: snapshot, apply, restore on failure.
    fn apply<F>(&self, mutate: F) -> Result<Vec<Task>, StoreError>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<(), StoreError>,
    {
        let mut inner = self.lock();
        let snapshot = inner.tasks.clone();
        mutate(&mut inner.tasks)?;
        inner.revision += 1;
        Ok(snapshot)
    }

    fn rollback(&self, snapshot: Vec<Task>) {
        let mut inner = self.lock();
        inner.tasks = snapshot;
        inner.revision += 1;
    }

    /// Overwrites the entry for `id` with the backend's authoritative task.
    /// A no-op when the entry vanished in the meantime (concurrent remove).
    fn reconcile(&self, id: &str, task: Task) {
        let mut inner = self.lock();
        if let Some(slot) = inner.tasks.iter_mut().find(|t| t.id == id) {
            *slot = task;
            inner.revision += 1;
        }
    }

    /// Replaces the collection with the backend's listing. On failure the
    /// prior collection is left untouched.
    pub async fn load(&self) -> Result<(), StoreError> {
        let fetched = self.remote.list().await?;
        let mut inner = self.lock();
        inner.tasks = fetched;
        inner.revision += 1;
        Ok(())
    }

    /// Validates the draft first; the backend is never called for a draft
    /// that fails validation. On success the server-assigned task is
    /// prepended (collections are ordered newest first).
    pub async fn create(&self, draft: &TaskDraft) -> Result<Task, StoreError> {
        let payload = draft.validate()?;
        let task = self.remote.insert(payload.into_new_request()).await?;

        let mut inner = self.lock();
        inner.tasks.insert(0, task.clone());
        inner.revision += 1;
        Ok(task)
    }

    /// Merges `patch` over the local entry (unset fields fall back to the
    /// current values) and sends the merged update. No optimistic step: the
    /// entry only changes once the backend confirms.
    pub async fn update(&self, id: &str, patch: UpdateTaskRequest) -> Result<Task, StoreError> {
        let merged = {
            let inner = self.lock();
            let current = inner
                .tasks
                .iter()
                .find(|t| t.id == id)
                .ok_or(StoreError::NotFound)?;
            UpdateTaskRequest {
                title: patch.title.or_else(|| Some(current.title.clone())),
                description: patch.description.or_else(|| current.description.clone()),
                status: patch.status.or(Some(current.status)),
                priority: patch.priority.or(Some(current.priority)),
                due_date: patch.due_date.or_else(|| current.due_date.clone()),
            }
        };

        let task = self.remote.update(id, merged).await?;
        self.reconcile(id, task.clone());
        Ok(task)
    }

    /// Optimistic toggle: the flip is visible locally before the backend
    /// call is issued. On success the entry is overwritten with the
    /// backend's authoritative task (which may differ from the local
    /// prediction); on failure the whole collection reverts to its
    /// pre-toggle snapshot.
    pub async fn toggle_status(&self, id: &str) -> Result<Task, StoreError> {
        let snapshot = self.apply(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(StoreError::NotFound)?;
            task.status = task.status.toggled();
            Ok(())
        })?;

        match self.remote.toggle_status(id).await {
            Ok(task) => {
                self.reconcile(id, task.clone());
                Ok(task)
            }
            Err(err) => {
                self.rollback(snapshot);
                Err(err)
            }
        }
    }

    /// Deletes remotely first; the local entry is only dropped on
    /// confirmation.
    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.remote.delete(id).await?;

        let mut inner = self.lock();
        inner.tasks.retain(|t| t.id != id);
        inner.revision += 1;
        Ok(())
    }

    /// Deletes every task with the given status, one concurrent backend
    /// call per task, and waits for all of them to settle. Only confirmed
    /// deletions are applied locally; failures are reported per id.
    pub async fn remove_all_by_status(&self, status: TaskStatus) -> BulkRemoveReport {
        let ids: Vec<String> = {
            let inner = self.lock();
            inner
                .tasks
                .iter()
                .filter(|t| t.status == status)
                .map(|t| t.id.clone())
                .collect()
        };

        let results = join_all(ids.iter().map(|id| self.remote.delete(id))).await;

        let mut report = BulkRemoveReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(()) => report.removed.push(id),
                Err(err) => report.failed.push((id, err)),
            }
        }

        if !report.removed.is_empty() {
            let mut inner = self.lock();
            inner.tasks.retain(|t| !report.removed.contains(&t.id));
            inner.revision += 1;
        }

        for (id, err) in &report.failed {
            warn!("bulk delete left task {} in place: {}", id, err);
        }

        report
    }
}
