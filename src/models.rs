//! Models
//!
//! Data structures matching backend records.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Todo record (matches the `todos` collection)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Server-assigned, immutable
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    /// Owner id
    pub user: String,
    #[serde(default)]
    pub assignee_name: String,
    #[serde(default)]
    pub assignee_avatar: String,
}

impl Todo {
    /// Merge a patch into this record, field by field
    pub fn apply(&mut self, patch: &TodoPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(name) = &patch.assignee_name {
            self.assignee_name = name.clone();
        }
        if let Some(avatar) = &patch.assignee_avatar {
            self.assignee_avatar = avatar.clone();
        }
    }

    pub fn has_assignee(&self) -> bool {
        !self.assignee_name.is_empty()
    }
}

/// Partial update covering the mutable todo fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_avatar: Option<String>,
}

impl TodoPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn assignee(name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            assignee_name: Some(name.into()),
            assignee_avatar: Some(avatar.into()),
            ..Default::default()
        }
    }
}

/// Fields sent when creating a todo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    pub title: String,
    pub user: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub assignee_name: String,
    #[serde(default)]
    pub assignee_avatar: String,
}

impl NewTodo {
    pub fn new(title: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            user: user.into(),
            completed: false,
            assignee_name: String::new(),
            assignee_avatar: String::new(),
        }
    }
}

/// Authenticated user record (`users` collection)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Token plus the user it was issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub record: UserIdentity,
}

/// Someone a todo can be assigned to.
///
/// Assigning copies `name`/`avatar` onto the todo; later feed changes never
/// touch existing todos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeCandidate {
    pub name: String,
    pub avatar: String,
}

impl AssigneeCandidate {
    pub fn new(first: &str, last: &str, avatar: impl Into<String>) -> Self {
        Self {
            name: full_name(first, last),
            avatar: avatar.into(),
        }
    }

    /// Copy this candidate onto a todo being created
    pub fn apply_to(&self, fields: &mut NewTodo) {
        fields.assignee_name = self.name.clone();
        fields.assignee_avatar = self.avatar.clone();
    }

    /// Patch assigning this candidate to an existing todo
    pub fn to_patch(&self) -> TodoPatch {
        TodoPatch::assignee(self.name.clone(), self.avatar.clone())
    }
}

pub fn full_name(first: &str, last: &str) -> String {
    format!("{} {}", first, last)
}

/// Title check applied by the add/edit forms before the core is involved
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        Err(ValidationError::EmptyTitle)
    } else {
        Ok(())
    }
}
