//! Reconciliation of a template with one instance's completion record.
//!
//! The template is only ever borrowed: the merged view carries its own
//! task-state map next to a shared reference to the tree.

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::ids::{SectionId, TaskId};
use crate::model::instance::{Instance, TaskState};
use crate::model::template::{Section, Template};

/// A template paired with a complete task-state map.
///
/// `task_state` has exactly one entry per task reachable in the template,
/// in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedView<'a> {
    pub template: &'a Template,
    pub task_state: IndexMap<TaskId, TaskState>,
}

/// Completed/total counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Combine `template` with `instance`. Entries present in the instance are
/// copied through, missing ones get the default state, stale ones are
/// ignored (and stay in the instance).
pub fn merge<'a>(template: &'a Template, instance: &Instance) -> MergedView<'a> {
    let task_state = template
        .tasks()
        .into_iter()
        .map(|task| {
            let state = instance
                .task_state
                .get(&task.id)
                .cloned()
                .unwrap_or_default();
            (task.id.clone(), state)
        })
        .collect();
    MergedView {
        template,
        task_state,
    }
}

impl MergedView<'_> {
    pub fn state(&self, task_id: &TaskId) -> Option<&TaskState> {
        self.task_state.get(task_id)
    }

    /// Mutable access for the runner write path. Only tasks in the template have entries.
    pub fn state_mut(&mut self, task_id: &TaskId) -> Option<&mut TaskState> {
        self.task_state.get_mut(task_id)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.task_state.values().filter(|s| s.completed).count(),
            total: self.task_state.len(),
        }
    }

    /// Progress per section, in reading order
    pub fn section_progress(&self) -> Vec<(SectionId, Progress)> {
        self.template
            .sorted_sections()
            .into_iter()
            .map(|section| (section.id.clone(), self.progress_of(section)))
            .collect()
    }

    fn progress_of(&self, section: &Section) -> Progress {
        let mut progress = Progress::default();
        for task in section.subsections.iter().flat_map(|sub| &sub.tasks) {
            progress.total += 1;
            if self.state(&task.id).is_some_and(|s| s.completed) {
                progress.completed += 1;
            }
        }
        progress
    }
}

/// Instance entries whose task is no longer in the template
pub fn stale_ids(template: &Template, instance: &Instance) -> Vec<TaskId> {
    instance
        .task_state
        .keys()
        .filter(|id| template.find_task(id).is_none())
        .cloned()
        .collect()
}

/// The explicit prune step: drop stale entries from `instance`.
/// Never run implicitly by `merge` or the write path. Returns what was removed.
pub fn prune_stale(instance: &mut Instance, template: &Template) -> Vec<TaskId> {
    let stale = stale_ids(template, instance);
    instance.task_state.retain(|id, _| !stale.contains(id));
    stale
}
