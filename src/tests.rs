//! Mutation Core Integration Tests
//!
//! Drives the core and the app facade against a scripted in-memory backend.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::commands::{AssigneeFeed, AuthProvider, TodoRepository};
    use crate::config::ClientConfig;
    use crate::context::OperationKind;
    use crate::error::{AppError, AuthError, RemoteError, RemoteResult, SchemaError, ValidationError};
    use crate::models::{AssigneeCandidate, AuthSession, NewTodo, Todo, TodoPatch, UserIdentity};
    use crate::mutation::{DeleteFailurePolicy, TodoMutations};
    use crate::session::{Redirect, Route, SessionGate, AUTH_STORAGE_KEY};
    use crate::storage::LocalStorage;
    use crate::store::{QueryCache, QueryKey};
    use crate::TodoApp;

    const OWNER: &str = "u1";

    fn todo(id: &str, title: &str) -> Todo {
        Todo {
            id: id.into(),
            title: title.into(),
            completed: false,
            user: OWNER.into(),
            assignee_name: String::new(),
            assignee_avatar: String::new(),
        }
    }

    fn server_error() -> RemoteError {
        RemoteError::Status {
            status: 500,
            message: "boom".into(),
        }
    }

    /// In-memory backend; gates hold calls until permits are released
    struct FakeBackend {
        todos: Mutex<Vec<Todo>>,
        next_id: AtomicUsize,
        fail_updates: Mutex<HashSet<String>>,
        fail_deletes: Mutex<HashSet<String>>,
        fail_create: AtomicBool,
        fail_list: AtomicBool,
        update_gate: Semaphore,
        list_gate: Semaphore,
        list_calls: AtomicUsize,
        update_calls: AtomicUsize,
        /// List response captured when the call started
        list_snapshot_at_start: AtomicBool,
    }

    impl FakeBackend {
        fn new(todos: Vec<Todo>) -> Arc<Self> {
            Arc::new(Self {
                todos: Mutex::new(todos),
                next_id: AtomicUsize::new(100),
                fail_updates: Mutex::new(HashSet::new()),
                fail_deletes: Mutex::new(HashSet::new()),
                fail_create: AtomicBool::new(false),
                fail_list: AtomicBool::new(false),
                update_gate: Semaphore::new(Semaphore::MAX_PERMITS),
                list_gate: Semaphore::new(Semaphore::MAX_PERMITS),
                list_calls: AtomicUsize::new(0),
                update_calls: AtomicUsize::new(0),
                list_snapshot_at_start: AtomicBool::new(false),
            })
        }

        /// Updates wait for `release_updates`
        fn gated(todos: Vec<Todo>) -> Arc<Self> {
            let backend = Self::new(todos);
            backend.update_gate.forget_permits(Semaphore::MAX_PERMITS);
            backend
        }

        fn release_updates(&self, n: usize) {
            self.update_gate.add_permits(n);
        }

        fn gate_lists(&self) {
            self.list_gate.forget_permits(Semaphore::MAX_PERMITS);
            self.list_snapshot_at_start.store(true, Ordering::SeqCst);
        }

        fn release_lists(&self, n: usize) {
            self.list_gate.add_permits(n);
        }

        fn fail_update(&self, id: &str) {
            self.fail_updates.lock().unwrap().insert(id.to_string());
        }

        fn fail_delete(&self, id: &str) {
            self.fail_deletes.lock().unwrap().insert(id.to_string());
        }

        fn server_todos(&self) -> Vec<Todo> {
            self.todos.lock().unwrap().clone()
        }

        fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TodoRepository for FakeBackend {
        async fn list_todos(&self, owner_id: &str) -> RemoteResult<Vec<Todo>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let early: Vec<Todo> = self.server_todos();
            self.list_gate.acquire().await.unwrap().forget();

            if self.fail_list.load(Ordering::SeqCst) {
                return Err(server_error());
            }
            let todos = if self.list_snapshot_at_start.load(Ordering::SeqCst) {
                early
            } else {
                self.server_todos()
            };
            Ok(todos.into_iter().filter(|t| t.user == owner_id).collect())
        }

        async fn create_todo(&self, fields: &NewTodo) -> RemoteResult<Todo> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(server_error());
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            let created = Todo {
                id,
                title: fields.title.clone(),
                completed: fields.completed,
                user: fields.user.clone(),
                assignee_name: fields.assignee_name.clone(),
                assignee_avatar: fields.assignee_avatar.clone(),
            };
            self.todos.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn update_todo(&self, id: &str, patch: &TodoPatch) -> RemoteResult<()> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            self.update_gate.acquire().await.unwrap().forget();

            if self.fail_updates.lock().unwrap().contains(id) {
                return Err(server_error());
            }
            let mut todos = self.todos.lock().unwrap();
            match todos.iter_mut().find(|t| t.id == id) {
                Some(todo) => {
                    todo.apply(patch);
                    Ok(())
                }
                None => Err(RemoteError::Status {
                    status: 404,
                    message: "The requested resource wasn't found.".into(),
                }),
            }
        }

        async fn delete_todo(&self, id: &str) -> RemoteResult<()> {
            if self.fail_deletes.lock().unwrap().contains(id) {
                return Err(server_error());
            }
            self.todos.lock().unwrap().retain(|t| t.id != id);
            Ok(())
        }
    }

    /// Auth double with a configurable refresh outcome
    struct FakeAuth {
        refresh_ok: AtomicBool,
        active_token: Mutex<Option<String>>,
    }

    impl FakeAuth {
        fn new(refresh_ok: bool) -> Arc<Self> {
            Arc::new(Self {
                refresh_ok: AtomicBool::new(refresh_ok),
                active_token: Mutex::new(None),
            })
        }
    }

    fn user() -> UserIdentity {
        UserIdentity {
            id: OWNER.into(),
            email: "demo@example.com".into(),
            name: "Demo".into(),
        }
    }

    /// Unsigned token with an `exp` far in the future
    fn valid_token(tag: &str) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"id":"{}","exp":4102444800}}"#, tag));
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", payload)
    }

    #[async_trait]
    impl AuthProvider for FakeAuth {
        async fn authenticate(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
            if email == "demo@example.com" && password == "demo1234" {
                let session = AuthSession {
                    token: valid_token("login"),
                    record: user(),
                };
                self.use_session(Some(&session));
                Ok(session)
            } else {
                Err(AuthError::Rejected("Failed to authenticate.".into()))
            }
        }

        async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
            if self.refresh_ok.load(Ordering::SeqCst) {
                Ok(AuthSession {
                    token: valid_token("refreshed"),
                    record: session.record.clone(),
                })
            } else {
                Err(AuthError::RefreshFailed("token revoked".into()))
            }
        }

        fn use_session(&self, session: Option<&AuthSession>) {
            *self.active_token.lock().unwrap() = session.map(|s| s.token.clone());
        }
    }

    struct FakeFeed;

    #[async_trait]
    impl AssigneeFeed for FakeFeed {
        async fn fetch_candidates(&self, _count: usize) -> Result<Vec<AssigneeCandidate>, SchemaError> {
            crate::commands::parse_candidates(
                r#"{"results": [
                    {"name": {"first": "John", "last": "Doe"}, "picture": {"thumbnail": "u1"}},
                    {"name": {"first": "Jane", "last": "Roe"}, "picture": {"thumbnail": "u2"}}
                ]}"#,
            )
        }
    }

    async fn core_with(backend: &Arc<FakeBackend>) -> TodoMutations {
        let core = TodoMutations::new(backend.clone(), QueryCache::new());
        core.set_owner(Some(OWNER.to_string()));
        core.fetch_todos().await.unwrap();
        core
    }

    // ========================
    // Optimistic update
    // ========================

    #[tokio::test]
    async fn test_update_visible_before_network_and_rolled_back_on_failure() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let core = core_with(&backend).await;
        backend.fail_update("1");

        let pending = core.apply_update("1", TodoPatch::completed(true));
        assert!(core.snapshot()[0].completed);
        assert!(core.is_pending(OperationKind::Update));

        let result = pending.await;
        assert!(result.is_err());
        assert!(!core.snapshot()[0].completed);
        assert!(!core.is_pending(OperationKind::Update));
    }

    #[tokio::test]
    async fn test_update_touches_only_target() {
        let backend = FakeBackend::new(vec![todo("1", "A"), todo("2", "B"), todo("3", "C")]);
        let core = core_with(&backend).await;
        let before = core.snapshot();

        let pending = core.apply_update("2", TodoPatch::title("B2"));
        let after = core.snapshot();

        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
        assert_eq!(after[1].id, "2");
        assert_eq!(after[1].title, "B2");

        pending.await.unwrap();
        assert_eq!(core.snapshot()[1].title, "B2");
    }

    #[tokio::test]
    async fn test_update_of_uncached_id_still_calls_remote() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let core = core_with(&backend).await;
        let before = core.snapshot();

        let pending = core.apply_update("missing", TodoPatch::completed(true));
        assert_eq!(core.snapshot(), before);

        assert!(pending.await.is_err());
        assert_eq!(backend.update_calls.load(Ordering::SeqCst), 1);
        assert_eq!(core.snapshot(), before);
    }

    #[tokio::test]
    async fn test_rollback_leaves_other_speculative_edits() {
        let backend = FakeBackend::gated(vec![todo("1", "A"), todo("2", "B")]);
        let core = core_with(&backend).await;
        backend.fail_update("1");
        // Keep the post-settle refetch from replacing the cache
        backend.fail_list.store(true, Ordering::SeqCst);

        let first = core.apply_update("1", TodoPatch::completed(true));
        let second = core.apply_update("2", TodoPatch::title("B2"));

        let (first, second, _) = tokio::join!(first, second, async {
            backend.release_updates(2);
        });
        assert!(first.is_err());
        assert!(second.is_ok());

        let todos = core.snapshot();
        assert!(!todos[0].completed);
        assert_eq!(todos[0].title, "A");
        assert_eq!(todos[1].title, "B2");
        assert!(core.cache().is_stale(core.key()));
    }

    #[tokio::test]
    async fn test_concurrent_settles_refetch_once() {
        let backend = FakeBackend::gated(vec![todo("1", "A"), todo("2", "B"), todo("3", "C")]);
        let core = core_with(&backend).await;
        assert_eq!(backend.list_calls(), 1);

        let a = core.apply_update("1", TodoPatch::completed(true));
        let b = core.apply_update("2", TodoPatch::completed(true));
        let c = core.apply_update("3", TodoPatch::completed(true));

        let (a, b, c, _) = tokio::join!(a, b, c, async {
            backend.release_updates(3);
        });
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(backend.list_calls(), 2);
        assert!(core.snapshot().iter().all(|t| t.completed));
    }

    #[tokio::test]
    async fn test_sequential_mutations_each_refetch() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let core = core_with(&backend).await;

        core.apply_update("1", TodoPatch::completed(true)).await.unwrap();
        core.apply_update("1", TodoPatch::title("A2")).await.unwrap();
        assert_eq!(backend.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_repeated_toggle_converges() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let core = core_with(&backend).await;

        let first = core.apply_update("1", TodoPatch::completed(true));
        let second = core.apply_update("1", TodoPatch::completed(true));
        first.await.unwrap();
        assert!(core.snapshot()[0].completed);
        second.await.unwrap();

        assert!(core.snapshot()[0].completed);
        assert!(backend.server_todos()[0].completed);
    }

    #[tokio::test]
    async fn test_refetch_started_before_edit_is_discarded() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let core = core_with(&backend).await;
        backend.gate_lists();

        let refetch = tokio::spawn({
            let core = core.clone();
            async move { core.refetch().await }
        });
        while backend.list_calls() < 2 {
            tokio::task::yield_now().await;
        }

        let pending = core.apply_update("1", TodoPatch::completed(true));
        backend.release_lists(1);
        let stored = refetch.await.unwrap().unwrap();

        assert!(!stored);
        assert!(core.snapshot()[0].completed);

        backend.release_lists(1);
        pending.await.unwrap();
        assert!(core.snapshot()[0].completed);
    }

    #[tokio::test]
    async fn test_abandoned_update_does_not_block_later_refetch() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let core = core_with(&backend).await;

        drop(core.apply_update("1", TodoPatch::title("X")));
        assert_eq!(core.snapshot()[0].title, "X");
        assert!(core.cache().is_stale(core.key()));
        assert!(!core.is_pending(OperationKind::Update));

        core.apply_update("1", TodoPatch::completed(true)).await.unwrap();
        assert_eq!(backend.list_calls(), 2);
        // The abandoned title never reached the server
        assert_eq!(core.snapshot()[0].title, "A");
        assert!(core.snapshot()[0].completed);
    }

    #[tokio::test]
    async fn test_abandoned_delete_healed_by_fetch() {
        let backend = FakeBackend::new(vec![todo("1", "A"), todo("2", "B")]);
        let core = core_with(&backend).await;

        drop(core.apply_delete("1"));
        assert_eq!(core.snapshot(), vec![todo("2", "B")]);

        core.fetch_todos().await.unwrap();
        assert_eq!(backend.list_calls(), 2);
        assert_eq!(core.snapshot(), vec![todo("1", "A"), todo("2", "B")]);
    }

    #[tokio::test]
    async fn test_mutation_cut_off_by_timeout() {
        let backend = FakeBackend::gated(vec![todo("1", "A"), todo("2", "B")]);
        let core = core_with(&backend).await;

        let slow = core.apply_update("1", TodoPatch::title("A2"));
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), slow).await;
        assert!(timed_out.is_err());

        backend.release_updates(1);
        core.apply_delete("2").await.unwrap();
        // A successful delete alone would not refetch
        assert_eq!(backend.list_calls(), 2);
        assert_eq!(core.snapshot(), vec![todo("1", "A")]);
    }

    // ========================
    // Create
    // ========================

    #[tokio::test]
    async fn test_create_is_not_speculative() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let core = core_with(&backend).await;
        let before = core.snapshot();

        let pending = core.apply_create(NewTodo::new("B", OWNER));
        assert_eq!(core.snapshot(), before);
        assert!(core.is_pending(OperationKind::Create));

        let created = pending.await.unwrap();
        let todos = core.snapshot();
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[1].id, created.id);
        assert!(!core.is_pending(OperationKind::Create));
    }

    #[tokio::test]
    async fn test_create_failure_surfaces_and_keeps_cache() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let core = core_with(&backend).await;
        backend.fail_create.store(true, Ordering::SeqCst);

        let result = core.apply_create(NewTodo::new("B", OWNER)).await;
        assert_eq!(result, Err(server_error()));
        assert_eq!(core.snapshot(), vec![todo("1", "A")]);
        assert_eq!(backend.list_calls(), 1);
    }

    // ========================
    // Delete
    // ========================

    #[tokio::test]
    async fn test_delete_removes_synchronously() {
        let backend = FakeBackend::new(vec![todo("1", "A"), todo("2", "B"), todo("3", "C")]);
        let core = core_with(&backend).await;

        let pending = core.apply_delete("1");
        assert_eq!(core.snapshot(), vec![todo("2", "B"), todo("3", "C")]);

        pending.await.unwrap();
        assert_eq!(core.snapshot(), vec![todo("2", "B"), todo("3", "C")]);
        // Success does not refetch
        assert_eq!(backend.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_removed_by_default() {
        let backend = FakeBackend::new(vec![todo("1", "A"), todo("2", "B")]);
        let core = core_with(&backend).await;
        backend.fail_delete("1");
        backend.fail_list.store(true, Ordering::SeqCst);

        let result = core.apply_delete("1").await;
        assert!(result.is_err());
        assert_eq!(core.snapshot(), vec![todo("2", "B")]);
        assert!(core.cache().is_stale(core.key()));
    }

    #[tokio::test]
    async fn test_delete_failure_healed_by_refetch() {
        let backend = FakeBackend::new(vec![todo("1", "A"), todo("2", "B")]);
        let core = core_with(&backend).await;
        backend.fail_delete("1");

        assert!(core.apply_delete("1").await.is_err());
        assert_eq!(core.snapshot(), vec![todo("1", "A"), todo("2", "B")]);
    }

    #[tokio::test]
    async fn test_delete_failure_restore_policy() {
        let backend = FakeBackend::new(vec![todo("1", "A"), todo("2", "B"), todo("3", "C")]);
        let core = TodoMutations::new(backend.clone(), QueryCache::new())
            .with_delete_policy(DeleteFailurePolicy::Restore);
        core.set_owner(Some(OWNER.into()));
        core.fetch_todos().await.unwrap();
        backend.fail_delete("2");
        backend.fail_list.store(true, Ordering::SeqCst);

        let pending = core.apply_delete("2");
        assert_eq!(core.snapshot().len(), 2);
        assert!(pending.await.is_err());

        let ids: Vec<_> = core.snapshot().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_discard_drops_cache() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let core = core_with(&backend).await;
        core.discard();
        assert!(core.snapshot().is_empty());
        assert!(core.cache().get(&QueryKey::todos()).is_none());
    }

    // ========================
    // Session
    // ========================

    fn persisted_session(storage: &LocalStorage) {
        storage
            .set_item(
                AUTH_STORAGE_KEY,
                &AuthSession {
                    token: valid_token("stored"),
                    record: user(),
                },
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_restored_session_refreshed() {
        let storage = Arc::new(LocalStorage::in_memory());
        persisted_session(&storage);
        let auth = FakeAuth::new(true);
        let gate = SessionGate::new(auth.clone(), storage.clone());

        let user = gate.ensure_auth_ready().await;
        assert_eq!(user.map(|u| u.id), Some(OWNER.to_string()));
        assert!(gate.is_auth_ready());
        assert_eq!(
            storage.get_item::<AuthSession>(AUTH_STORAGE_KEY).unwrap().token,
            valid_token("refreshed")
        );
        assert_eq!(*auth.active_token.lock().unwrap(), Some(valid_token("refreshed")));
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_session() {
        let storage = Arc::new(LocalStorage::in_memory());
        persisted_session(&storage);
        let auth = FakeAuth::new(false);
        let gate = SessionGate::new(auth.clone(), storage.clone());
        assert!(gate.is_logged_in());

        assert!(gate.ensure_auth_ready().await.is_none());
        assert!(!gate.is_logged_in());
        assert!(gate.is_auth_ready());
        assert!(storage.get_item::<AuthSession>(AUTH_STORAGE_KEY).is_none());
        assert_eq!(gate.guard(Route::Home), Err(Redirect(Route::Login)));
        assert!(auth.active_token.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_logout_and_routes() {
        let storage = Arc::new(LocalStorage::in_memory());
        let gate = SessionGate::new(FakeAuth::new(true), storage.clone());
        assert_eq!(gate.require_auth(), Err(AuthError::NotLoggedIn));

        assert_eq!(gate.guard(Route::Login), Ok(Route::Login));

        let rejected = gate.login("demo@example.com", "wrong-pass").await;
        assert!(matches!(rejected, Err(AppError::Auth(AuthError::Rejected(_)))));

        let invalid = gate.login("demo", "demo1234").await;
        assert!(matches!(invalid, Err(AppError::Validation(ValidationError::InvalidEmail))));

        let user = gate.login("demo@example.com", "demo1234").await.unwrap();
        assert_eq!(user.id, OWNER);
        assert_eq!(gate.guard(Route::Login), Err(Redirect(Route::Home)));
        assert_eq!(gate.guard(Route::Home), Ok(Route::Home));
        assert!(storage.get_item::<AuthSession>(AUTH_STORAGE_KEY).is_some());

        gate.logout().unwrap();
        assert_eq!(gate.guard(Route::Home), Err(Redirect(Route::Login)));
        assert!(storage.get_item::<AuthSession>(AUTH_STORAGE_KEY).is_none());
    }

    // ========================
    // App facade
    // ========================

    fn app_with(backend: &Arc<FakeBackend>, storage: Arc<LocalStorage>) -> TodoApp {
        TodoApp::new(
            backend.clone(),
            FakeAuth::new(true),
            Arc::new(FakeFeed),
            storage,
            &ClientConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_add_todo_with_assignee() {
        let backend = FakeBackend::new(vec![]);
        let app = app_with(&backend, Arc::new(LocalStorage::in_memory()));
        app.login("demo@example.com", "demo1234").await.unwrap();

        let candidates = app.load_assignees().await.unwrap();
        assert_eq!(candidates[0].name, "John Doe");

        let created = app.add_todo("Write report", Some("John Doe")).await.unwrap();
        assert_eq!(created.assignee_name, "John Doe");
        assert_eq!(created.assignee_avatar, "u1");
        assert_eq!(created.user, OWNER);
        assert_eq!(app.todos(), vec![created]);
    }

    #[tokio::test]
    async fn test_add_todo_validation() {
        let backend = FakeBackend::new(vec![]);
        let app = app_with(&backend, Arc::new(LocalStorage::in_memory()));

        assert!(matches!(
            app.add_todo("x", None).await,
            Err(AppError::Auth(AuthError::NotLoggedIn))
        ));

        app.login("demo@example.com", "demo1234").await.unwrap();
        assert!(matches!(
            app.add_todo("", None).await,
            Err(AppError::Validation(ValidationError::EmptyTitle))
        ));
        assert!(matches!(
            app.add_todo("x", Some("Nobody")).await,
            Err(AppError::Validation(ValidationError::UnknownAssignee(_)))
        ));
        assert!(backend.server_todos().is_empty());
    }

    #[tokio::test]
    async fn test_theme_and_logout_without_backend() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        backend.fail_list.store(true, Ordering::SeqCst);
        let storage = Arc::new(LocalStorage::in_memory());
        persisted_session(&storage);
        let app = app_with(&backend, storage.clone());

        app.theme().set_theme(crate::theme::Theme::Dark).unwrap();
        assert_eq!(app.theme().theme(), crate::theme::Theme::Dark);
        app.logout().unwrap();

        assert_eq!(backend.list_calls(), 0);
        assert!(storage.get_item::<AuthSession>(AUTH_STORAGE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_toggle_assign_and_logout() {
        let backend = FakeBackend::new(vec![todo("1", "A")]);
        let storage = Arc::new(LocalStorage::in_memory());
        let app = app_with(&backend, storage.clone());
        app.login("demo@example.com", "demo1234").await.unwrap();

        app.toggle("1").await.unwrap();
        assert!(app.todos()[0].completed);
        app.toggle("1").await.unwrap();
        assert!(!app.todos()[0].completed);

        app.load_assignees().await.unwrap();
        app.assign("1", "Jane Roe").await.unwrap();
        assert_eq!(app.todos()[0].assignee_avatar, "u2");

        assert!(matches!(
            app.toggle("9").await,
            Err(AppError::Validation(ValidationError::UnknownTodo(_)))
        ));

        app.logout().unwrap();
        assert!(app.todos().is_empty());
        assert!(app.assignees().is_empty());
    }

    #[tokio::test]
    async fn test_start_restores_and_loads() {
        let backend = FakeBackend::new(vec![todo("1", "A"), Todo { user: "other".into(), ..todo("2", "B") }]);
        let storage = Arc::new(LocalStorage::in_memory());
        persisted_session(&storage);
        let app = app_with(&backend, storage);

        let user = app.start().await.unwrap();
        assert_eq!(user.map(|u| u.id), Some(OWNER.to_string()));
        assert_eq!(app.todos(), vec![todo("1", "A")]);
    }
}
