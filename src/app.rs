//! Todo App
//!
//! Wires the session gate, the mutation core and the assignee feed into the
//! operations the screens call.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::commands::{AssigneeFeed, AuthProvider, PocketBaseClient, RandomUserFeed, TodoRepository};
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult, RemoteError, ValidationError};
use crate::models::{validate_title, AssigneeCandidate, NewTodo, Todo, TodoPatch, UserIdentity};
use crate::mutation::TodoMutations;
use crate::session::SessionGate;
use crate::storage::LocalStorage;
use crate::store::QueryCache;
use crate::theme::ThemeStore;

pub struct TodoApp {
    gate: SessionGate,
    mutations: TodoMutations,
    feed: Arc<dyn AssigneeFeed>,
    assignees: RwLock<Vec<AssigneeCandidate>>,
    assignee_count: usize,
    theme: ThemeStore,
}

impl TodoApp {
    pub fn new(
        repo: Arc<dyn TodoRepository>,
        auth: Arc<dyn AuthProvider>,
        feed: Arc<dyn AssigneeFeed>,
        storage: Arc<LocalStorage>,
        config: &ClientConfig,
    ) -> Self {
        let mutations =
            TodoMutations::new(repo, QueryCache::new()).with_delete_policy(config.delete_failure_policy);
        let gate = SessionGate::new(auth, storage.clone());
        mutations.set_owner(gate.current_user().map(|u| u.id));

        Self {
            gate,
            mutations,
            feed,
            assignees: RwLock::new(Vec::new()),
            assignee_count: config.assignee_count,
            theme: ThemeStore::load(storage),
        }
    }

    /// Build against a PocketBase backend and the configured feed
    pub fn from_config(config: &ClientConfig) -> AppResult<Self> {
        let backend = Arc::new(PocketBaseClient::new(&config.backend_url, config.request_timeout())?);
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Remote(RemoteError::Transport(e.to_string())))?;
        let feed = Arc::new(RandomUserFeed::new(&config.assignee_feed_url, http));
        let storage = Arc::new(LocalStorage::open(&config.storage_path)?);

        Ok(Self::new(backend.clone(), backend, feed, storage, config))
    }

    pub fn session(&self) -> &SessionGate {
        &self.gate
    }

    pub fn mutations(&self) -> &TodoMutations {
        &self.mutations
    }

    pub fn theme(&self) -> &ThemeStore {
        &self.theme
    }

    /// Restore the session and load the list when logged in
    pub async fn start(&self) -> AppResult<Option<UserIdentity>> {
        let user = self.gate.ensure_auth_ready().await;
        self.mutations.set_owner(user.as_ref().map(|u| u.id.clone()));
        if user.is_some() {
            self.mutations.fetch_todos().await?;
        }
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<UserIdentity> {
        let user = self.gate.login(email, password).await?;
        self.mutations.discard();
        self.mutations.set_owner(Some(user.id.clone()));
        self.mutations.fetch_todos().await?;
        Ok(user)
    }

    /// Clear the session and everything cached for it
    pub fn logout(&self) -> AppResult<()> {
        self.gate.logout()?;
        self.mutations.set_owner(None);
        self.mutations.discard();
        self.assignees.write().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.mutations.snapshot()
    }

    /// Fetch a fresh set of assignee candidates for this session
    pub async fn load_assignees(&self) -> AppResult<Vec<AssigneeCandidate>> {
        let candidates = self.feed.fetch_candidates(self.assignee_count).await?;
        info!(count = candidates.len(), "Assignee candidates loaded");
        *self.assignees.write().unwrap_or_else(PoisonError::into_inner) = candidates.clone();
        Ok(candidates)
    }

    pub fn assignees(&self) -> Vec<AssigneeCandidate> {
        self.assignees.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn find_assignee(&self, name: &str) -> Result<AssigneeCandidate, ValidationError> {
        self.assignees
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|candidate| candidate.name == name)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownAssignee(name.to_string()))
    }

    fn find_todo(&self, id: &str) -> Result<Todo, ValidationError> {
        self.todos()
            .into_iter()
            .find(|todo| todo.id == id)
            .ok_or_else(|| ValidationError::UnknownTodo(id.to_string()))
    }

    /// Add-todo form submit
    pub async fn add_todo(&self, title: &str, assignee: Option<&str>) -> AppResult<Todo> {
        validate_title(title)?;
        let user = self.gate.require_auth()?;

        let mut fields = NewTodo::new(title, user.id);
        if let Some(name) = assignee {
            self.find_assignee(name)?.apply_to(&mut fields);
        }
        Ok(self.mutations.apply_create(fields).await?)
    }

    /// Flip `completed` on a loaded todo
    pub async fn toggle(&self, id: &str) -> AppResult<()> {
        let todo = self.find_todo(id)?;
        Ok(self.mutations.apply_update(id, TodoPatch::completed(!todo.completed)).await?)
    }

    pub async fn rename(&self, id: &str, title: &str) -> AppResult<()> {
        validate_title(title)?;
        Ok(self.mutations.apply_update(id, TodoPatch::title(title)).await?)
    }

    pub async fn assign(&self, id: &str, assignee: &str) -> AppResult<()> {
        let candidate = self.find_assignee(assignee)?;
        Ok(self.mutations.apply_update(id, candidate.to_patch()).await?)
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Ok(self.mutations.apply_delete(id).await?)
    }
}
