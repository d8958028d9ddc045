use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::recovery::{RecoveryEntry, atomic_write, log_recovery};
use crate::model::instance::Instance;
use crate::model::template::Template;

/// Error type for template and instance storage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    /// The stored document exists but is not valid JSON for its type.
    /// `raw` holds the unreadable text so callers can preserve it.
    #[error("could not parse {path}: {source}")]
    Malformed {
        path: PathBuf,
        raw: String,
        source: serde_json::Error,
    },
    #[error("invalid key {0:?}: use letters, digits, '-' and '_'")]
    InvalidKey(String),
    #[error("could not serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Somewhere to put data that could not be saved or read normally
pub trait RecoverySink {
    fn record(&mut self, entry: RecoveryEntry);
}

/// Keyed storage for template drafts
pub trait TemplateStore: RecoverySink {
    /// `Ok(None)` when no document is stored under `key`
    fn load_template(&self, key: &str) -> Result<Option<Template>, StoreError>;
    fn save_template(&mut self, key: &str, template: &Template) -> Result<(), StoreError>;
}

/// Keyed storage for per-instance completion records
pub trait InstanceStore: RecoverySink {
    /// A missing record is an empty instance, not an error
    fn load_instance(&self, id: &str) -> Result<Instance, StoreError>;
    fn save_instance(&mut self, id: &str, instance: &Instance) -> Result<(), StoreError>;
}

/// Check that a key is usable as a file stem
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

fn to_document<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

// ---------------------------------------------------------------------------
// FsStore
// ---------------------------------------------------------------------------

/// JSON documents under a project's `checklist/` directory:
/// `drafts/<key>.json` and `instances/<id>.json`.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn draft_path(&self, key: &str) -> PathBuf {
        self.dir.join("drafts").join(format!("{}.json", key))
    }

    pub fn instance_path(&self, id: &str) -> PathBuf {
        self.dir.join("instances").join(format!("{}.json", id))
    }

    /// Read a file, `Ok(None)` if it does not exist
    fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn write(path: &Path, content: &str) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        atomic_write(path, content.as_bytes()).map_err(write_err)
    }
}

fn parse_document<T: serde::de::DeserializeOwned>(path: &Path, raw: String) -> Result<T, StoreError> {
    serde_json::from_str(&raw).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        raw,
        source,
    })
}

impl RecoverySink for FsStore {
    fn record(&mut self, entry: RecoveryEntry) {
        log_recovery(&self.dir, entry);
    }
}

impl TemplateStore for FsStore {
    fn load_template(&self, key: &str) -> Result<Option<Template>, StoreError> {
        validate_key(key)?;
        let path = self.draft_path(key);
        match Self::read_optional(&path)? {
            Some(raw) => parse_document(&path, raw).map(Some),
            None => Ok(None),
        }
    }

    fn save_template(&mut self, key: &str, template: &Template) -> Result<(), StoreError> {
        validate_key(key)?;
        Self::write(&self.draft_path(key), &to_document(template)?)
    }
}

impl InstanceStore for FsStore {
    fn load_instance(&self, id: &str) -> Result<Instance, StoreError> {
        validate_key(id)?;
        let path = self.instance_path(id);
        match Self::read_optional(&path)? {
            Some(raw) => parse_document(&path, raw),
            None => Ok(Instance::new()),
        }
    }

    fn save_instance(&mut self, id: &str, instance: &Instance) -> Result<(), StoreError> {
        validate_key(id)?;
        Self::write(&self.instance_path(id), &to_document(instance)?)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store holding serialized documents.
///
/// Documents are kept as text so tests can plant malformed records, and
/// `fail_writes` makes every save return `StoreError::Write`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub templates: HashMap<String, String>,
    pub instances: HashMap<String, String>,
    pub recovered: Vec<RecoveryEntry>,
    pub fail_writes: bool,
    pub writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn memory_path(kind: &str, key: &str) -> PathBuf {
        PathBuf::from(format!("memory:{}/{}", kind, key))
    }

    fn check_writable(&self, path: PathBuf) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write {
                path,
                source: io::Error::other("writes disabled"),
            });
        }
        Ok(())
    }
}

impl RecoverySink for MemoryStore {
    fn record(&mut self, entry: RecoveryEntry) {
        self.recovered.push(entry);
    }
}

impl TemplateStore for MemoryStore {
    fn load_template(&self, key: &str) -> Result<Option<Template>, StoreError> {
        validate_key(key)?;
        match self.templates.get(key) {
            Some(raw) => parse_document(&Self::memory_path("drafts", key), raw.clone()).map(Some),
            None => Ok(None),
        }
    }

    fn save_template(&mut self, key: &str, template: &Template) -> Result<(), StoreError> {
        validate_key(key)?;
        self.check_writable(Self::memory_path("drafts", key))?;
        self.templates.insert(key.to_string(), to_document(template)?);
        self.writes += 1;
        Ok(())
    }
}

impl InstanceStore for MemoryStore {
    fn load_instance(&self, id: &str) -> Result<Instance, StoreError> {
        validate_key(id)?;
        match self.instances.get(id) {
            Some(raw) => parse_document(&Self::memory_path("instances", id), raw.clone()),
            None => Ok(Instance::new()),
        }
    }

    fn save_instance(&mut self, id: &str, instance: &Instance) -> Result<(), StoreError> {
        validate_key(id)?;
        self.check_writable(Self::memory_path("instances", id))?;
        self.instances.insert(id.to_string(), to_document(instance)?);
        self.writes += 1;
        Ok(())
    }
}
