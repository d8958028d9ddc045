use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Runner-side completion state for one task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    #[serde(default)]
    pub completed: bool,
    /// Runner-entered note (not the template's guidance note)
    #[serde(default)]
    pub note: String,
}

/// A single field change applied by the runner write path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskUpdate {
    Completed(bool),
    Note(String),
}

impl TaskState {
    /// Shallow-merge one field into this entry
    pub fn apply(&mut self, update: &TaskUpdate) {
        match update {
            TaskUpdate::Completed(done) => self.completed = *done,
            TaskUpdate::Note(note) => self.note = note.clone(),
        }
    }
}

/// Per-deployment completion record, keyed by task id.
///
/// Sparse: tasks added to the template after the instance was created have
/// no entry, and entries for tasks since deleted from the template are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "taskState", default)]
    pub task_state: IndexMap<TaskId, TaskState>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update` to the entry for `task_id`, creating it from the default if absent.
    /// Returns the resulting state.
    pub fn update(&mut self, task_id: &TaskId, update: &TaskUpdate) -> &TaskState {
        let entry = self.task_state.entry(task_id.clone()).or_default();
        entry.apply(update);
        entry
    }
}
