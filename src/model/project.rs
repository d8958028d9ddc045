use std::path::PathBuf;

use super::config::ProjectConfig;

/// A located checklist project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of `checklist/`)
    pub root: PathBuf,
    /// Path to the `checklist/` directory
    pub dir: PathBuf,
    /// Parsed checklist.toml
    pub config: ProjectConfig,
}

impl Project {
    /// Path of the published (canonical default) template
    pub fn published_path(&self) -> PathBuf {
        self.dir.join(&self.config.template.published)
    }
}
