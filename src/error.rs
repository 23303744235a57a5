//! Error Types
//!
//! One enum per failure family. Every failure is local to a single
//! operation; nothing here is fatal to the process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Network or service failure during a CRUD or auth call
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RemoteError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Local precondition violated at a form boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Todo text must not be empty.")]
    EmptyTitle,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must contain at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Unknown assignee: {0}")]
    UnknownAssignee(String),

    #[error("Todo {0} is not loaded")]
    UnknownTodo(String),
}

/// External feed response does not match the expected shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Feed request failed: {0}")]
    Fetch(String),

    #[error("Unexpected feed response: {0}")]
    Shape(String),
}

/// Credential rejection or session refresh failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    Rejected(String),

    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Top-level error for the application facade and binary
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = RemoteError::Status { status: 404, message: "Missing".into() };
        assert_eq!(err.to_string(), "Service returned 404: Missing");
        assert_eq!(ValidationError::EmptyTitle.to_string(), "Todo text must not be empty.");
    }

    #[test]
    fn test_app_error_wraps_sources() {
        let err: AppError = AuthError::NotLoggedIn.into();
        assert!(matches!(err, AppError::Auth(AuthError::NotLoggedIn)));
        assert_eq!(err.to_string(), "Not logged in");
    }
}
