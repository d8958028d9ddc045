use serde::{Deserialize, Serialize};

use super::ids::NodeKind;

/// Configuration from checklist.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: ProjectInfo,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub ids: IdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Key of the draft being edited (stored as drafts/<key>.json)
    #[serde(default = "default_draft")]
    pub draft: String,
    /// Canonical published template, relative to the checklist/ directory.
    /// The built-in default is used while this file does not exist.
    #[serde(default = "default_published")]
    pub published: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        TemplateConfig {
            draft: default_draft(),
            published: default_published(),
        }
    }
}

fn default_draft() -> String {
    "master".to_string()
}

fn default_published() -> String {
    "template.json".to_string()
}

/// Id prefixes per tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_section_prefix")]
    pub section: String,
    #[serde(default = "default_subsection_prefix")]
    pub subsection: String,
    #[serde(default = "default_task_prefix")]
    pub task: String,
}

impl Default for IdConfig {
    fn default() -> Self {
        IdConfig {
            section: default_section_prefix(),
            subsection: default_subsection_prefix(),
            task: default_task_prefix(),
        }
    }
}

impl IdConfig {
    pub fn prefix(&self, kind: NodeKind) -> &str {
        match kind {
            NodeKind::Section => &self.section,
            NodeKind::Subsection => &self.subsection,
            NodeKind::Task => &self.task,
        }
    }
}

fn default_section_prefix() -> String {
    NodeKind::Section.default_prefix().to_string()
}

fn default_subsection_prefix() -> String {
    NodeKind::Subsection.default_prefix().to_string()
}

fn default_task_prefix() -> String {
    NodeKind::Task.default_prefix().to_string()
}
