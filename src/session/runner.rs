use chrono::Utc;

use crate::io::fs_store::{InstanceStore, StoreError};
use crate::io::recovery::{RecoveryCategory, RecoveryEntry};
use crate::model::ids::TaskId;
use crate::model::instance::{Instance, TaskState, TaskUpdate};
use crate::model::template::Template;
use crate::ops::merge::{MergedView, merge, prune_stale, stale_ids};
use crate::session::draft::LoadOutcome;

/// Error type for runner sessions
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("task {0} is not in the template")]
    UnknownTask(TaskId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One instance being worked through against a template.
///
/// Writes touch a single field of a single task entry: the current record is
/// fetched, the field merged in, and the record saved. Other entries,
/// including stale ones, are carried through unchanged. There is no
/// locking; concurrent runners on one instance get last-write-wins per
/// record.
pub struct Runner<'t, S: InstanceStore> {
    id: String,
    view: MergedView<'t>,
    store: S,
}

/// Load an instance, replacing an unreadable record with an empty one after
/// recording its raw text.
pub fn load_or_recover<S: InstanceStore>(store: &mut S, id: &str) -> Result<(Instance, bool), StoreError> {
    match store.load_instance(id) {
        Ok(instance) => Ok((instance, false)),
        Err(StoreError::Malformed { path, raw, source }) => {
            store.record(
                RecoveryEntry::new(RecoveryCategory::Parser, format!("unreadable instance {}", id))
                    .field("Source", path.display())
                    .field("Error", &source)
                    .body(raw),
            );
            Ok((Instance::new(), true))
        }
        Err(e) => Err(e),
    }
}

impl<'t, S: InstanceStore> Runner<'t, S> {
    /// Merge the stored instance `id` with `template`. Returns
    /// [`LoadOutcome::Recovered`] when the stored record was unreadable.
    pub fn open(template: &'t Template, mut store: S, id: &str) -> Result<(Self, LoadOutcome), RunnerError> {
        let (instance, recovered) = load_or_recover(&mut store, id)?;
        let outcome = if recovered {
            LoadOutcome::Recovered
        } else {
            LoadOutcome::Loaded
        };
        let runner = Runner {
            id: id.to_string(),
            view: merge(template, &instance),
            store,
        };
        Ok((runner, outcome))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn view(&self) -> &MergedView<'t> {
        &self.view
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn set_completed(&mut self, task_id: &TaskId, completed: bool) -> Result<TaskState, RunnerError> {
        self.write(task_id, TaskUpdate::Completed(completed))
    }

    pub fn toggle(&mut self, task_id: &TaskId) -> Result<TaskState, RunnerError> {
        let completed = self
            .view
            .state(task_id)
            .ok_or_else(|| RunnerError::UnknownTask(task_id.clone()))?
            .completed;
        self.set_completed(task_id, !completed)
    }

    pub fn set_note(&mut self, task_id: &TaskId, note: impl Into<String>) -> Result<TaskState, RunnerError> {
        self.write(task_id, TaskUpdate::Note(note.into()))
    }

    fn write(&mut self, task_id: &TaskId, update: TaskUpdate) -> Result<TaskState, RunnerError> {
        let state = self
            .view
            .state_mut(task_id)
            .ok_or_else(|| RunnerError::UnknownTask(task_id.clone()))?;
        state.apply(&update);
        let state = state.clone();

        let (mut current, _) = load_or_recover(&mut self.store, &self.id)?;
        current.update(task_id, &update);
        current.updated_at = Some(Utc::now());
        self.store.save_instance(&self.id, &current)?;
        Ok(state)
    }

    /// Entries in the stored record for tasks no longer in the template
    pub fn stale(&mut self) -> Result<Vec<TaskId>, RunnerError> {
        let (current, _) = load_or_recover(&mut self.store, &self.id)?;
        Ok(stale_ids(self.view.template, &current))
    }

    /// Drop stale entries from the stored record. Writes only when something
    /// was removed.
    pub fn prune(&mut self) -> Result<Vec<TaskId>, RunnerError> {
        let (mut current, _) = load_or_recover(&mut self.store, &self.id)?;
        let removed = prune_stale(&mut current, self.view.template);
        if !removed.is_empty() {
            current.updated_at = Some(Utc::now());
            self.store.save_instance(&self.id, &current)?;
        }
        Ok(removed)
    }
}
