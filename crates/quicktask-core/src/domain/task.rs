use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::SyncError;
use super::ids::{CanonicalId, LocalId, TaskId};

/// A task as the UI currently understands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,

    /// Server-computed. `None` until the create has been reconciled.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Provisional entry inserted by an optimistic add.
    pub fn provisional(id: LocalId, draft: &NewTask) -> Self {
        Self {
            id: TaskId::Local(id),
            title: draft.title.clone(),
            description: draft.description.clone(),
            completed: false,
            created_at: None,
        }
    }

    /// Optimistic result of applying `patch`. Fields absent from the patch are kept.
    pub fn apply(&self, patch: &TaskPatch) -> Self {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        if let Some(description) = &patch.description {
            next.description = description.clone();
        }
        if let Some(completed) = patch.completed {
            next.completed = completed;
        }
        next
    }

    /// Equality of the user-editable fields.
    ///
    /// The id and server-computed `created_at` are ignored, so a provisional
    /// entry matches the server copy of the same task.
    pub fn same_content(&self, other: &Task) -> bool {
        self.title == other.title
            && self.description == other.description
            && self.completed == other.completed
    }
}

/// A task as returned by the server. The id is canonical by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTask {
    pub id: CanonicalId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<CanonicalTask> for Task {
    fn from(task: CanonicalTask) -> Self {
        Self {
            id: TaskId::Canonical(task.id),
            title: task.title,
            description: task.description,
            completed: task.completed,
            created_at: task.created_at,
        }
    }
}

/// Create payload (`POST /tasks`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        validate_title(&self.title)
    }
}

/// Partial update payload (`PUT /tasks/<id>`).
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }
}

fn validate_title(title: &str) -> Result<(), SyncError> {
    if title.trim().is_empty() {
        return Err(SyncError::Validation {
            field: "title",
            reason: "task title cannot be empty".to_string(),
        });
    }
    Ok(())
}
