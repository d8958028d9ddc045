use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::{RecoveryCategory, RecoveryEntry, atomic_write, log_recovery};
use crate::model::config::ProjectConfig;
use crate::model::project::Project;
use crate::model::template::Template;
use crate::ops::template_ops::normalize_template;

/// Name of the per-project directory
pub const PROJECT_DIR: &str = "checklist";

/// Error type for project I/O operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("not a checklist project: no checklist/checklist.toml found")]
    NotAProject,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse checklist.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit checklist.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Discover the project by walking up from the given directory,
/// looking for `checklist/checklist.toml`.
pub fn discover_project(start: &Path) -> Result<PathBuf, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        let dir = current.join(PROJECT_DIR);
        if dir.is_dir() && dir.join("checklist.toml").exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ProjectError::NotAProject);
        }
    }
}

/// Load the project rooted at the given directory.
pub fn load_project(root: &Path) -> Result<Project, ProjectError> {
    let dir = root.join(PROJECT_DIR);
    if !dir.is_dir() {
        return Err(ProjectError::NotAProject);
    }

    let config_path = dir.join("checklist.toml");
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: ProjectConfig = toml::from_str(&config_text)?;

    Ok(Project {
        root: root.to_path_buf(),
        dir,
        config,
    })
}

/// Load the published template, or the built-in default when none has been
/// exported yet. An unreadable file also falls back to the built-in default
/// after its raw text is kept in the recovery log. The result is normalized.
pub fn load_published(project: &Project) -> Result<Template, ProjectError> {
    let path = project.published_path();
    let mut template = match fs::read_to_string(&path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(template) => template,
            Err(e) => {
                log_recovery(
                    &project.dir,
                    RecoveryEntry::new(RecoveryCategory::Parser, "unreadable published template")
                        .field("Source", path.display())
                        .field("Error", &e)
                        .body(text),
                );
                eprintln!(
                    "warning: published template {} could not be read; using the built-in template (see `cf recovery`)",
                    path.display()
                );
                Template::builtin_default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Template::builtin_default(),
        Err(e) => return Err(ProjectError::ReadError { path, source: e }),
    };
    normalize_template(&mut template);
    Ok(template)
}

/// Write rendered template JSON to `path`. On failure the content is kept in
/// the recovery log.
pub fn save_published(project: &Project, path: &Path, content: &str) -> Result<(), ProjectError> {
    if let Err(e) = atomic_write(path, content.as_bytes()) {
        log_recovery(
            &project.dir,
            RecoveryEntry::new(RecoveryCategory::Write, "template export failed")
                .field("Target", path.display())
                .field("Error", &e)
                .body(content),
        );
        return Err(ProjectError::WriteError {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}
