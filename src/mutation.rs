//! Optimistic Mutation Core
//!
//! Every operation edits the cached todo list synchronously, in invocation
//! order, and hands back a future that performs the network call and
//! reconciles the cache with its outcome:
//!
//! - update: patch one record in place; on failure restore that record only
//! - delete: remove one record; on failure apply [`DeleteFailurePolicy`]
//! - create: no speculative insert; the refetch brings the new record in
//!
//! Settled mutations share one refetch per batch of overlapping mutations
//! (see [`SettleBatch`]).

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::commands::TodoRepository;
use crate::context::{BatchTicket, OperationKind, PendingFlags, PendingMutation, SettleBatch};
use crate::error::RemoteResult;
use crate::models::{NewTodo, Todo, TodoPatch};
use crate::store::{
    store_insert_todo_at, store_remove_todo, store_replace_todo, store_update_todo, QueryCache, QueryKey,
};

/// What a failed delete does to the optimistically removed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteFailurePolicy {
    /// Leave it out until the refetch brings it back
    #[default]
    KeepRemoved,
    /// Put it back where it was immediately
    Restore,
}

/// Coordinates todo mutations against the query cache.
///
/// Cloning is cheap; clones share the cache and bookkeeping.
#[derive(Clone)]
pub struct TodoMutations {
    repo: Arc<dyn TodoRepository>,
    cache: QueryCache,
    key: QueryKey,
    owner: Arc<RwLock<Option<String>>>,
    batch: SettleBatch,
    flags: Arc<PendingFlags>,
    delete_policy: DeleteFailurePolicy,
}

impl TodoMutations {
    pub fn new(repo: Arc<dyn TodoRepository>, cache: QueryCache) -> Self {
        Self {
            repo,
            cache,
            key: QueryKey::todos(),
            owner: Arc::new(RwLock::new(None)),
            batch: SettleBatch::new(),
            flags: PendingFlags::new(),
            delete_policy: DeleteFailurePolicy::default(),
        }
    }

    pub fn with_delete_policy(mut self, policy: DeleteFailurePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Set whose todos the list query loads
    pub fn set_owner(&self, owner_id: Option<String>) {
        *self.owner.write().unwrap_or_else(PoisonError::into_inner) = owner_id;
    }

    pub fn owner(&self) -> Option<String> {
        self.owner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Current cached list (empty before the first fetch)
    pub fn snapshot(&self) -> Vec<Todo> {
        self.cache.get(&self.key).unwrap_or_default()
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.flags.is_pending(kind)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.cache.subscribe()
    }

    /// Load the list if it was never loaded or has been invalidated
    pub async fn fetch_todos(&self) -> RemoteResult<Vec<Todo>> {
        if self.cache.is_stale(&self.key) {
            self.refetch().await?;
        }
        Ok(self.snapshot())
    }

    /// Reload the list from the backend.
    ///
    /// Returns `Ok(false)` when there is no owner or when the response was
    /// discarded because the query was cancelled in the meantime.
    pub async fn refetch(&self) -> RemoteResult<bool> {
        let Some(owner) = self.owner() else {
            return Ok(false);
        };
        let generation = self.cache.begin_fetch(&self.key);
        let _pending = self.flags.start(OperationKind::ListFetch);

        match self.repo.list_todos(&owner).await {
            Ok(todos) => {
                let count = todos.len();
                let stored = self.cache.finish_fetch(&self.key, generation, todos);
                if stored {
                    info!(count, "Todo list refreshed");
                } else {
                    debug!(generation, "Discarded superseded list response");
                }
                Ok(stored)
            }
            Err(err) => {
                warn!(error = %err, "Todo list refetch failed");
                Err(err)
            }
        }
    }

    /// Drop the cached list, e.g. on logout
    pub fn discard(&self) {
        self.cache.cancel(&self.key);
        self.cache.remove(&self.key);
    }

    /// Optimistically merge `patch` into the todo with `id`.
    ///
    /// The cache edit is visible as soon as this returns. The returned
    /// future performs the remote update; on failure it restores the record
    /// to its pre-edit value and yields the error.
    pub fn apply_update(
        &self,
        id: &str,
        patch: TodoPatch,
    ) -> impl Future<Output = RemoteResult<()>> + Send + 'static {
        // Responses already in flight would overwrite the edit below
        self.cache.cancel(&self.key);

        let mut pending = PendingMutation::new(id);
        let previous = store_update_todo(&self.cache, &self.key, id, &patch);
        if previous.is_none() {
            debug!(id, "Update target not cached; sending without local edit");
        }
        pending.speculate(previous, None);

        let ticket = self.batch.enter(&self.cache, &self.key);
        let guard = self.flags.start(OperationKind::Update);
        let this = self.clone();
        let id = id.to_string();

        async move {
            let _guard = guard;
            let result = this.repo.update_todo(&id, &patch).await;

            match &result {
                Ok(()) => pending.commit(),
                Err(err) => {
                    warn!(id = %id, error = %err, "Update failed, rolling back");
                    if let Some((_, previous)) = pending.roll_back() {
                        store_replace_todo(&this.cache, &this.key, previous);
                    }
                }
            }

            this.settle(ticket, true).await;
            pending.reset();
            result
        }
    }

    /// Create a todo. Nothing is inserted locally; on success the list is
    /// invalidated so the server record (with its id) arrives by refetch.
    pub fn apply_create(&self, fields: NewTodo) -> impl Future<Output = RemoteResult<Todo>> + Send + 'static {
        let ticket = self.batch.enter(&self.cache, &self.key);
        let guard = self.flags.start(OperationKind::Create);
        let this = self.clone();

        async move {
            let _guard = guard;
            let result = this.repo.create_todo(&fields).await;

            match &result {
                Ok(todo) => info!(id = %todo.id, "Todo created"),
                Err(err) => warn!(error = %err, "Create failed"),
            }

            this.settle(ticket, result.is_ok()).await;
            result
        }
    }

    /// Optimistically remove the todo with `id`.
    ///
    /// The removal is visible as soon as this returns. A failed remote delete
    /// is reported and handled per the configured [`DeleteFailurePolicy`].
    pub fn apply_delete(&self, id: &str) -> impl Future<Output = RemoteResult<()>> + Send + 'static {
        self.cache.cancel(&self.key);

        let mut pending = PendingMutation::new(id);
        match store_remove_todo(&self.cache, &self.key, id) {
            Some((index, removed)) => pending.speculate(Some(removed), Some(index)),
            None => pending.speculate(None, None),
        }

        let ticket = self.batch.enter(&self.cache, &self.key);
        let guard = self.flags.start(OperationKind::Delete);
        let this = self.clone();
        let id = id.to_string();

        async move {
            let _guard = guard;
            let result = this.repo.delete_todo(&id).await;

            let wants_refetch = match &result {
                Ok(()) => {
                    pending.commit();
                    false
                }
                Err(err) => {
                    warn!(id = %id, error = %err, policy = ?this.delete_policy, "Delete failed");
                    let removed = pending.roll_back();
                    if let (DeleteFailurePolicy::Restore, Some((index, todo))) = (this.delete_policy, removed) {
                        store_insert_todo_at(&this.cache, &this.key, index.unwrap_or(0), todo);
                    }
                    true
                }
            };

            this.settle(ticket, wants_refetch).await;
            pending.reset();
            result
        }
    }

    /// Leave the settle batch; the last one out refetches if anyone asked
    async fn settle(&self, ticket: BatchTicket, wants_refetch: bool) {
        if !ticket.settle(wants_refetch) {
            return;
        }
        self.cache.invalidate(&self.key);
        // Failure is already logged and leaves the entry stale for next read
        let _ = self.refetch().await;
    }
}
