//! Todo Sync
//!
//! Todo list client over a PocketBase backend:
//! - store: query cache holding the list snapshot
//! - context: per-mutation bookkeeping and settle batching
//! - mutation: optimistic create/update/delete with rollback
//! - commands: backend and assignee feed clients
//! - session, theme, storage: local client state
//! - app: the facade screens talk to

pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod mutation;
pub mod session;
pub mod storage;
pub mod store;
pub mod theme;

#[cfg(test)]
mod tests;

pub use app::TodoApp;
pub use config::{ClientConfig, ConfigReport};
pub use context::{MutationState, OperationKind};
pub use error::{AppError, AppResult, AuthError, RemoteError, SchemaError, ValidationError};
pub use models::{AssigneeCandidate, AuthSession, NewTodo, Todo, TodoPatch, UserIdentity};
pub use mutation::{DeleteFailurePolicy, TodoMutations};
pub use store::{QueryCache, QueryKey};
