//! Query Cache
//!
//! Holds the cached list snapshots keyed by query identity. Renderers only
//! read from it; writes come from the mutation core and from refetches.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;

use crate::models::{Todo, TodoPatch};

/// Logical identity of a cached query, e.g. `["todos"]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// The todo list query
    pub fn todos() -> Self {
        Self::new(["todos"])
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

#[derive(Debug, Default)]
struct QueryEntry {
    data: Option<Vec<Todo>>,
    stale: bool,
    /// Bumped on every fetch start and cancellation; a fetch may only store
    /// its result while its generation is still current.
    generation: u64,
}

/// Shared, cloneable handle to the cache
#[derive(Debug, Clone)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<QueryKey, QueryEntry>>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            version: Arc::new(version),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, QueryEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, QueryEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    /// Receiver bumped on every change to any entry
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Copy of the cached list, if one was loaded
    pub fn get(&self, key: &QueryKey) -> Option<Vec<Todo>> {
        self.read().get(key).and_then(|entry| entry.data.clone())
    }

    /// Replace the cached list wholesale
    pub fn set(&self, key: &QueryKey, data: Vec<Todo>) {
        {
            let mut entries = self.write();
            let entry = entries.entry(key.clone()).or_default();
            entry.data = Some(data);
            entry.stale = false;
        }
        self.notify();
    }

    /// Edit the cached list in place. Does nothing when nothing is cached.
    pub fn update<R>(&self, key: &QueryKey, f: impl FnOnce(&mut Vec<Todo>) -> R) -> Option<R> {
        let result = {
            let mut entries = self.write();
            entries
                .get_mut(key)
                .and_then(|entry| entry.data.as_mut())
                .map(f)
        };
        if result.is_some() {
            self.notify();
        }
        result
    }

    pub fn remove(&self, key: &QueryKey) -> Option<Vec<Todo>> {
        let removed = self.write().remove(key).and_then(|entry| entry.data);
        self.notify();
        removed
    }

    /// Discard the results of fetches already in flight for `key`
    pub fn cancel(&self, key: &QueryKey) -> u64 {
        let mut entries = self.write();
        let entry = entries.entry(key.clone()).or_default();
        entry.generation += 1;
        entry.generation
    }

    /// Start a fetch; any older fetch for the same key becomes obsolete
    pub fn begin_fetch(&self, key: &QueryKey) -> u64 {
        self.cancel(key)
    }

    /// Store a fetch result if no cancellation happened since `generation`
    pub fn finish_fetch(&self, key: &QueryKey, generation: u64, data: Vec<Todo>) -> bool {
        let stored = {
            let mut entries = self.write();
            let entry = entries.entry(key.clone()).or_default();
            if entry.generation == generation {
                entry.data = Some(data);
                entry.stale = false;
                true
            } else {
                false
            }
        };
        if stored {
            self.notify();
        }
        stored
    }

    /// Mark the entry stale so the next read refetches
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(entry) = self.write().get_mut(key) {
            entry.stale = true;
        }
    }

    /// True when invalidated or never loaded
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.read()
            .get(key)
            .map(|entry| entry.stale || entry.data.is_none())
            .unwrap_or(true)
    }
}

// ========================
// Store Helper Functions
// ========================

/// Merge a patch into the todo with `id`, returning its previous value
pub fn store_update_todo(cache: &QueryCache, key: &QueryKey, id: &str, patch: &TodoPatch) -> Option<Todo> {
    cache
        .update(key, |todos| {
            todos.iter_mut().find(|todo| todo.id == id).map(|todo| {
                let previous = todo.clone();
                todo.apply(patch);
                previous
            })
        })
        .flatten()
}

/// Replace the todo with the same id, leaving the rest untouched
pub fn store_replace_todo(cache: &QueryCache, key: &QueryKey, replacement: Todo) -> bool {
    cache
        .update(key, |todos| {
            todos
                .iter_mut()
                .find(|todo| todo.id == replacement.id)
                .map(|todo| *todo = replacement)
                .is_some()
        })
        .unwrap_or(false)
}

/// Remove the todo with `id`, returning where it was and what it was
pub fn store_remove_todo(cache: &QueryCache, key: &QueryKey, id: &str) -> Option<(usize, Todo)> {
    cache
        .update(key, |todos| {
            todos
                .iter()
                .position(|todo| todo.id == id)
                .map(|index| (index, todos.remove(index)))
        })
        .flatten()
}

/// Insert a todo at `index` (clamped to the list length)
pub fn store_insert_todo_at(cache: &QueryCache, key: &QueryKey, index: usize, todo: Todo) -> bool {
    cache
        .update(key, |todos| {
            if todos.iter().any(|existing| existing.id == todo.id) {
                return false;
            }
            let index = index.min(todos.len());
            todos.insert(index, todo);
            true
        })
        .unwrap_or(false)
}
