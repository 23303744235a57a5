//! Backend Command Wrappers
//!
//! Remote data access, organized by domain. The traits are the seams the
//! core depends on; `PocketBaseClient` and `RandomUserFeed` implement them
//! over HTTP.

mod assignee;
mod auth;
mod todo;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AuthError, RemoteError, RemoteResult, SchemaError};
use crate::models::{AssigneeCandidate, AuthSession, NewTodo, Todo, TodoPatch};

pub use assignee::{parse_candidates, RandomUserFeed};
pub use todo::owner_filter;

/// CRUD access to the todo collection
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// All todos owned by `owner_id`, in server order
    async fn list_todos(&self, owner_id: &str) -> RemoteResult<Vec<Todo>>;

    async fn create_todo(&self, fields: &NewTodo) -> RemoteResult<Todo>;

    async fn update_todo(&self, id: &str, patch: &TodoPatch) -> RemoteResult<()>;

    async fn delete_todo(&self, id: &str) -> RemoteResult<()>;
}

/// Password authentication against the users collection
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Exchange a session for a fresh token
    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError>;

    /// Act as `session` for subsequent requests (`None` = anonymous)
    fn use_session(&self, session: Option<&AuthSession>);
}

/// Source of assignee candidates
#[async_trait]
pub trait AssigneeFeed: Send + Sync {
    async fn fetch_candidates(&self, count: usize) -> Result<Vec<AssigneeCandidate>, SchemaError>;
}

/// HTTP client for a PocketBase backend
#[derive(Clone)]
pub struct PocketBaseClient {
    base_url: String,
    http: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
}

impl PocketBaseClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Attach the auth header when a session is active
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.token() {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, token),
            None => builder,
        }
    }
}

/// PocketBase error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Turn non-2xx responses into `RemoteError::Status`
async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => status.canonical_reason().unwrap_or("Unknown error").to_string(),
    };
    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}
