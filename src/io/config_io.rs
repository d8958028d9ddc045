use std::fs;
use std::path::Path;

use crate::io::project_io::ProjectError;
use crate::io::recovery::atomic_write;
use crate::model::config::ProjectConfig;

/// Read the project config, returning both the parsed config and the raw
/// toml_edit Document for round-trip-safe editing.
pub fn read_config(dir: &Path) -> Result<(ProjectConfig, toml_edit::DocumentMut), ProjectError> {
    let config_path = dir.join("checklist.toml");
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: ProjectConfig = toml::from_str(&config_text)?;
    let doc: toml_edit::DocumentMut = config_text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ProjectError> {
    let config_path = dir.join("checklist.toml");
    atomic_write(&config_path, doc.to_string().as_bytes()).map_err(|e| ProjectError::WriteError {
        path: config_path,
        source: e,
    })?;
    Ok(())
}

/// Point `[template] draft` at another draft key
pub fn set_active_draft(doc: &mut toml_edit::DocumentMut, key: &str) {
    if !doc.contains_key("template") {
        doc["template"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["template"]["draft"] = toml_edit::value(key);
}

/// Set `[project] name`
pub fn set_project_name(doc: &mut toml_edit::DocumentMut, name: &str) {
    if !doc.contains_key("project") {
        doc["project"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["project"]["name"] = toml_edit::value(name);
}
