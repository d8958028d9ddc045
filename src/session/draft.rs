use crate::io::fs_store::{StoreError, TemplateStore};
use crate::io::recovery::{RecoveryCategory, RecoveryEntry};
use crate::model::ids::{IdGenerator, RandomIds};
use crate::model::template::Template;
use crate::ops::clean::export_json;
use crate::ops::template_ops::{self, EditError, NodePath, ParentPath, Removed};

/// Error type for draft sessions
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How [`Draft::open`] obtained its template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The stored document was read
    Loaded,
    /// Nothing was stored yet; the default was used
    Seeded,
    /// The stored document was unreadable; its text went to the recovery
    /// log and the default replaced it
    Recovered,
}

/// The template being edited, bound to the key it is stored under.
///
/// Every mutation is applied in memory first and then the whole document
/// is saved. If the save fails the error is returned and the in-memory
/// edit stays. There is no locking: two sessions on the same key overwrite
/// each other and the last save wins.
pub struct Draft<S: TemplateStore> {
    key: String,
    template: Template,
    store: S,
    ids: Box<dyn IdGenerator>,
}

impl<S: TemplateStore> Draft<S> {
    /// Load the draft stored under `key`, falling back to `default`.
    ///
    /// The loaded tree is normalized so that array position and `order`
    /// agree before any edit. An unreadable document is replaced on disk by
    /// the default once its raw text has been recorded.
    pub fn open(mut store: S, key: &str, default: &Template) -> Result<(Self, LoadOutcome), DraftError> {
        let (mut template, outcome) = match store.load_template(key) {
            Ok(Some(template)) => (template, LoadOutcome::Loaded),
            Ok(None) => (default.clone(), LoadOutcome::Seeded),
            Err(StoreError::Malformed { path, raw, source }) => {
                store.record(
                    RecoveryEntry::new(RecoveryCategory::Parser, format!("unreadable draft {}", key))
                        .field("Source", path.display())
                        .field("Error", &source)
                        .body(raw),
                );
                (default.clone(), LoadOutcome::Recovered)
            }
            Err(e) => return Err(e.into()),
        };
        template_ops::normalize_template(&mut template);

        let mut draft = Draft {
            key: key.to_string(),
            template,
            store,
            ids: Box::new(RandomIds::new()),
        };
        if outcome == LoadOutcome::Recovered {
            draft.save()?;
        }
        Ok((draft, outcome))
    }

    /// Use another id source for nodes created from now on
    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Write the current tree. A failed write keeps the unsaved document in
    /// the recovery log.
    pub fn save(&mut self) -> Result<(), DraftError> {
        if let Err(e) = self.store.save_template(&self.key, &self.template) {
            let mut entry = RecoveryEntry::new(RecoveryCategory::Write, "draft write failed")
                .field("Draft", &self.key)
                .field("Error", &e);
            if let Ok(body) = export_json(&self.template) {
                entry = entry.body(body);
            }
            self.store.record(entry);
            return Err(e.into());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Structural edits
    // -----------------------------------------------------------------------

    pub fn add(&mut self, parent: ParentPath) -> Result<NodePath, DraftError> {
        let path = template_ops::add(&mut self.template, parent, self.ids.as_mut())?;
        self.save()?;
        Ok(path)
    }

    pub fn duplicate(&mut self, path: NodePath) -> Result<NodePath, DraftError> {
        let copy = template_ops::duplicate(&mut self.template, path, self.ids.as_mut())?;
        self.save()?;
        Ok(copy)
    }

    /// Remove a node and its subtree. The removed subtree is recorded before
    /// the draft is saved.
    pub fn delete(&mut self, path: NodePath) -> Result<Removed, DraftError> {
        let removed = template_ops::delete(&mut self.template, path)?;
        self.store.record(
            RecoveryEntry::new(
                RecoveryCategory::Delete,
                format!("{} {} deleted", path.kind(), path),
            )
            .field("Draft", &self.key)
            .field("Nodes", removed.total())
            .body(removed.to_json()),
        );
        self.save()?;
        Ok(removed)
    }

    /// Returns whether anything moved. Nothing is written for a no-op.
    pub fn move_up(&mut self, path: NodePath) -> Result<bool, DraftError> {
        let moved = template_ops::move_up(&mut self.template, path)?;
        if moved {
            self.save()?;
        }
        Ok(moved)
    }

    /// Returns whether anything moved. Nothing is written for a no-op.
    pub fn move_down(&mut self, path: NodePath) -> Result<bool, DraftError> {
        let moved = template_ops::move_down(&mut self.template, path)?;
        if moved {
            self.save()?;
        }
        Ok(moved)
    }

    // -----------------------------------------------------------------------
    // Field edits
    // -----------------------------------------------------------------------

    pub fn set_title(&mut self, path: NodePath, title: impl Into<String>) -> Result<(), DraftError> {
        template_ops::set_title(&mut self.template, path, title.into())?;
        self.save()
    }

    pub fn set_task_text(&mut self, path: NodePath, text: impl Into<String>) -> Result<(), DraftError> {
        template_ops::set_task_text(&mut self.template, path, text.into())?;
        self.save()
    }

    pub fn set_task_note(&mut self, path: NodePath, note: impl Into<String>) -> Result<(), DraftError> {
        template_ops::set_task_note(&mut self.template, path, note.into())?;
        self.save()
    }

    pub fn toggle_collapsed(&mut self, path: NodePath) -> Result<bool, DraftError> {
        let collapsed = template_ops::toggle_collapsed(&mut self.template, path)?;
        self.save()?;
        Ok(collapsed)
    }

    /// Replace the whole tree (e.g. resetting to the published template)
    pub fn replace(&mut self, mut template: Template) -> Result<(), DraftError> {
        template_ops::normalize_template(&mut template);
        self.template = template;
        self.save()
    }
}
