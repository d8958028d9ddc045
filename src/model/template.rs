use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ids::{SectionId, SubsectionId, TaskId};

/// The canonical default template, published by exporting a cleaned draft.
const DEFAULT_TEMPLATE_JSON: &str = include_str!("../templates/default_template.json");

/// A node that lives in an ordered sibling list.
///
/// `order` is 1-based and must equal array position + 1 after every
/// structural edit (see `ops::tree_ops::renumber`).
pub trait Ordered {
    fn order(&self) -> u32;
    fn set_order(&mut self, order: u32);
}

/// A checklist template: the root aggregate edited by the draft editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: u32,
    /// Presentation only: whether the editor shows this section folded
    #[serde(default, alias = "_collapsed")]
    pub collapsed: bool,
    #[serde(default)]
    pub subsections: Vec<Subsection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    pub id: SubsectionId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default, alias = "_collapsed")]
    pub collapsed: bool,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub text: String,
    /// Editor-supplied guidance (distinct from the runner's per-instance note)
    #[serde(default)]
    pub note: String,
}

fn default_version() -> u32 {
    1
}

macro_rules! impl_ordered {
    ($($ty:ty),*) => {
        $(impl Ordered for $ty {
            fn order(&self) -> u32 {
                self.order
            }

            fn set_order(&mut self, order: u32) {
                self.order = order;
            }
        })*
    };
}

impl_ordered!(Section, Subsection, Task);

/// Borrow `items` sorted by `order` (stable, so ties keep array position).
pub fn sorted_by_order<T: Ordered>(items: &[T]) -> Vec<&T> {
    let mut refs: Vec<&T> = items.iter().collect();
    refs.sort_by_key(|item| item.order());
    refs
}

impl Template {
    /// The built-in default used when no draft or published template exists
    pub fn builtin_default() -> Template {
        serde_json::from_str(DEFAULT_TEMPLATE_JSON).expect("built-in template is valid JSON")
    }

    /// Sections in reading order
    pub fn sorted_sections(&self) -> Vec<&Section> {
        sorted_by_order(&self.sections)
    }

    /// All tasks in reading order (section, then subsection, then task order)
    pub fn tasks(&self) -> Vec<&Task> {
        let mut out = Vec::new();
        for section in self.sorted_sections() {
            for sub in section.sorted_subsections() {
                out.extend(sub.sorted_tasks());
            }
        }
        out
    }

    pub fn task_count(&self) -> usize {
        self.sections.iter().map(Section::task_count).sum()
    }

    pub fn subsection_count(&self) -> usize {
        self.sections.iter().map(|s| s.subsections.len()).sum()
    }

    /// Every id in every tier, as plain strings. Fresh ids are checked against this.
    pub fn all_ids(&self) -> HashSet<String> {
        let mut ids = HashSet::new();
        for section in &self.sections {
            ids.insert(section.id.to_string());
            for sub in &section.subsections {
                ids.insert(sub.id.to_string());
                for task in &sub.tasks {
                    ids.insert(task.id.to_string());
                }
            }
        }
        ids
    }

    pub fn find_task(&self, id: &TaskId) -> Option<&Task> {
        self.sections
            .iter()
            .flat_map(|s| &s.subsections)
            .flat_map(|sub| &sub.tasks)
            .find(|t| &t.id == id)
    }
}

impl Section {
    pub fn sorted_subsections(&self) -> Vec<&Subsection> {
        sorted_by_order(&self.subsections)
    }

    pub fn task_count(&self) -> usize {
        self.subsections.iter().map(|s| s.tasks.len()).sum()
    }
}

impl Subsection {
    pub fn sorted_tasks(&self) -> Vec<&Task> {
        sorted_by_order(&self.tasks)
    }
}
