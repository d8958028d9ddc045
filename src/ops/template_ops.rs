use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::model::ids::{IdGenerator, NodeKind, SectionId, SubsectionId, TaskId};
use crate::model::template::{Ordered, Section, Subsection, Task, Template};
use crate::ops::tree_ops;

/// Error type for template edits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("no node at {0}")]
    NotFound(NodePath),
    #[error("no parent at {0}")]
    ParentNotFound(ParentPath),
    #[error("cannot {op} a {kind}")]
    WrongTier { op: &'static str, kind: NodeKind },
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub const NEW_SECTION_TITLE: &str = "New Section";
pub const NEW_SUBSECTION_TITLE: &str = "New Subsection";
pub const NEW_TASK_TEXT: &str = "New task";

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// Position of a node in the tree: 0-based array indices from the root.
///
/// Displayed and parsed 1-based and dotted: `2`, `2.1`, `2.1.3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodePath {
    Section(usize),
    Subsection(usize, usize),
    Task(usize, usize, usize),
}

/// Where `add` appends: the root (new section), a section (new subsection)
/// or a subsection (new task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentPath {
    Root,
    Section(usize),
    Subsection(usize, usize),
}

impl NodePath {
    pub fn kind(self) -> NodeKind {
        match self {
            NodePath::Section(_) => NodeKind::Section,
            NodePath::Subsection(..) => NodeKind::Subsection,
            NodePath::Task(..) => NodeKind::Task,
        }
    }

    /// Index within the sibling list
    pub fn index(self) -> usize {
        match self {
            NodePath::Section(s) => s,
            NodePath::Subsection(_, j) => j,
            NodePath::Task(_, _, k) => k,
        }
    }

    pub fn parent(self) -> ParentPath {
        match self {
            NodePath::Section(_) => ParentPath::Root,
            NodePath::Subsection(s, _) => ParentPath::Section(s),
            NodePath::Task(s, j, _) => ParentPath::Subsection(s, j),
        }
    }

    fn with_index(self, index: usize) -> NodePath {
        match self {
            NodePath::Section(_) => NodePath::Section(index),
            NodePath::Subsection(s, _) => NodePath::Subsection(s, index),
            NodePath::Task(s, j, _) => NodePath::Task(s, j, index),
        }
    }
}

impl ParentPath {
    /// Tier of the nodes this parent holds
    pub fn child_kind(self) -> NodeKind {
        match self {
            ParentPath::Root => NodeKind::Section,
            ParentPath::Section(_) => NodeKind::Subsection,
            ParentPath::Subsection(..) => NodeKind::Task,
        }
    }

    pub fn child(self, index: usize) -> NodePath {
        match self {
            ParentPath::Root => NodePath::Section(index),
            ParentPath::Section(s) => NodePath::Subsection(s, index),
            ParentPath::Subsection(s, j) => NodePath::Task(s, j, index),
        }
    }
}

impl From<NodePath> for ParentPath {
    /// A section or subsection used as a parent. Tasks have no children,
    /// so a task path maps to its own subsection.
    fn from(path: NodePath) -> Self {
        match path {
            NodePath::Section(s) => ParentPath::Section(s),
            NodePath::Subsection(s, j) => ParentPath::Subsection(s, j),
            NodePath::Task(s, j, _) => ParentPath::Subsection(s, j),
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodePath::Section(s) => write!(f, "{}", s + 1),
            NodePath::Subsection(s, j) => write!(f, "{}.{}", s + 1, j + 1),
            NodePath::Task(s, j, k) => write!(f, "{}.{}.{}", s + 1, j + 1, k + 1),
        }
    }
}

impl fmt::Display for ParentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentPath::Root => write!(f, "root"),
            ParentPath::Section(s) => write!(f, "{}", s + 1),
            ParentPath::Subsection(s, j) => write!(f, "{}.{}", s + 1, j + 1),
        }
    }
}

/// Parse `1`, `1.2` or `1.2.3` into 0-based indices
fn parse_dotted(s: &str) -> Result<Vec<usize>, EditError> {
    let invalid = || EditError::InvalidPath(s.to_string());
    let parts: Vec<usize> = s
        .split('.')
        .map(|p| p.trim().parse::<usize>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    if parts.is_empty() || parts.len() > 3 || parts.contains(&0) {
        return Err(invalid());
    }
    Ok(parts.into_iter().map(|p| p - 1).collect())
}

impl FromStr for NodePath {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_dotted(s)?.as_slice() {
            [a] => Ok(NodePath::Section(*a)),
            [a, b] => Ok(NodePath::Subsection(*a, *b)),
            [a, b, c] => Ok(NodePath::Task(*a, *b, *c)),
            _ => Err(EditError::InvalidPath(s.to_string())),
        }
    }
}

impl FromStr for ParentPath {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("root") {
            return Ok(ParentPath::Root);
        }
        match parse_dotted(s)?.as_slice() {
            [a] => Ok(ParentPath::Section(*a)),
            [a, b] => Ok(ParentPath::Subsection(*a, *b)),
            _ => Err(EditError::InvalidPath(s.to_string())),
        }
    }
}

/// Find a node by id in any tier
pub fn find_path(template: &Template, id: &str) -> Option<NodePath> {
    for (s, section) in template.sections.iter().enumerate() {
        if section.id.as_str() == id {
            return Some(NodePath::Section(s));
        }
        for (j, sub) in section.subsections.iter().enumerate() {
            if sub.id.as_str() == id {
                return Some(NodePath::Subsection(s, j));
            }
            if let Some(k) = sub.tasks.iter().position(|t| t.id.as_str() == id) {
                return Some(NodePath::Task(s, j, k));
            }
        }
    }
    None
}

fn section_mut(template: &mut Template, s: usize) -> Option<&mut Section> {
    template.sections.get_mut(s)
}

fn subsection_mut(template: &mut Template, s: usize, j: usize) -> Option<&mut Subsection> {
    template.sections.get_mut(s)?.subsections.get_mut(j)
}

fn task_mut(template: &mut Template, s: usize, j: usize, k: usize) -> Option<&mut Task> {
    subsection_mut(template, s, j)?.tasks.get_mut(k)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Sort every sibling list by its stored `order` and renumber it 1..N
pub fn normalize_template(template: &mut Template) {
    tree_ops::normalize(&mut template.sections);
    for section in &mut template.sections {
        tree_ops::normalize(&mut section.subsections);
        for sub in &mut section.subsections {
            tree_ops::normalize(&mut sub.tasks);
        }
    }
}

// ---------------------------------------------------------------------------
// Id minting
// ---------------------------------------------------------------------------

/// Ask `ids` for a new id until it is not in `taken`, then reserve it.
pub fn fresh_id(kind: NodeKind, taken: &mut HashSet<String>, ids: &mut dyn IdGenerator) -> String {
    loop {
        let id = ids.new_id(kind);
        if taken.insert(id.clone()) {
            return id;
        }
    }
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

/// Append a new default node under `parent`. Returns its path.
pub fn add(
    template: &mut Template,
    parent: ParentPath,
    ids: &mut dyn IdGenerator,
) -> Result<NodePath, EditError> {
    let mut taken = template.all_ids();
    let id = fresh_id(parent.child_kind(), &mut taken, ids);

    let index = match parent {
        ParentPath::Root => tree_ops::push(
            &mut template.sections,
            Section {
                id: SectionId::new(id),
                title: NEW_SECTION_TITLE.to_string(),
                order: 0,
                collapsed: false,
                subsections: Vec::new(),
            },
        ),
        ParentPath::Section(s) => {
            let section = section_mut(template, s).ok_or(EditError::ParentNotFound(parent))?;
            tree_ops::push(
                &mut section.subsections,
                Subsection {
                    id: SubsectionId::new(id),
                    title: NEW_SUBSECTION_TITLE.to_string(),
                    order: 0,
                    collapsed: false,
                    tasks: Vec::new(),
                },
            )
        }
        ParentPath::Subsection(s, j) => {
            let sub = subsection_mut(template, s, j).ok_or(EditError::ParentNotFound(parent))?;
            tree_ops::push(
                &mut sub.tasks,
                Task {
                    id: TaskId::new(id),
                    order: 0,
                    text: NEW_TASK_TEXT.to_string(),
                    note: String::new(),
                },
            )
        }
    };
    Ok(parent.child(index))
}

// ---------------------------------------------------------------------------
// Duplicate
// ---------------------------------------------------------------------------

/// Copy a task under a fresh id
pub fn clone_task(task: &Task, taken: &mut HashSet<String>, ids: &mut dyn IdGenerator) -> Task {
    Task {
        id: TaskId::new(fresh_id(NodeKind::Task, taken, ids)),
        order: task.order,
        text: task.text.clone(),
        note: task.note.clone(),
    }
}

/// Copy a subsection and its tasks, all under fresh ids. The copy starts expanded.
pub fn clone_subsection(
    sub: &Subsection,
    taken: &mut HashSet<String>,
    ids: &mut dyn IdGenerator,
) -> Subsection {
    Subsection {
        id: SubsectionId::new(fresh_id(NodeKind::Subsection, taken, ids)),
        title: sub.title.clone(),
        order: sub.order,
        collapsed: false,
        tasks: sub.tasks.iter().map(|t| clone_task(t, taken, ids)).collect(),
    }
}

/// Copy a section and its whole subtree, all under fresh ids. The copy starts expanded.
pub fn clone_section(
    section: &Section,
    taken: &mut HashSet<String>,
    ids: &mut dyn IdGenerator,
) -> Section {
    Section {
        id: SectionId::new(fresh_id(NodeKind::Section, taken, ids)),
        title: section.title.clone(),
        order: section.order,
        collapsed: false,
        subsections: section
            .subsections
            .iter()
            .map(|sub| clone_subsection(sub, taken, ids))
            .collect(),
    }
}

/// Deep-copy the node at `path` with fresh ids and insert the copy right
/// after it. Returns the path of the copy.
pub fn duplicate(
    template: &mut Template,
    path: NodePath,
    ids: &mut dyn IdGenerator,
) -> Result<NodePath, EditError> {
    let mut taken = template.all_ids();
    let not_found = EditError::NotFound(path);

    let index = match path {
        NodePath::Section(s) => {
            let copy = clone_section(
                template.sections.get(s).ok_or(not_found)?,
                &mut taken,
                ids,
            );
            tree_ops::insert_after(&mut template.sections, s, copy)
        }
        NodePath::Subsection(s, j) => {
            let section = section_mut(template, s).ok_or(not_found.clone())?;
            let copy = clone_subsection(
                section.subsections.get(j).ok_or(not_found)?,
                &mut taken,
                ids,
            );
            tree_ops::insert_after(&mut section.subsections, j, copy)
        }
        NodePath::Task(s, j, k) => {
            let sub = subsection_mut(template, s, j).ok_or(not_found.clone())?;
            let copy = clone_task(sub.tasks.get(k).ok_or(not_found)?, &mut taken, ids);
            tree_ops::insert_after(&mut sub.tasks, k, copy)
        }
    };
    Ok(path.with_index(index))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// A node detached by [`delete`], with the size of what went with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub node: RemovedNode,
    pub sections: usize,
    pub subsections: usize,
    pub tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovedNode {
    Section(Section),
    Subsection(Subsection),
    Task(Task),
}

impl Removed {
    /// Total number of nodes removed, including the node itself
    pub fn total(&self) -> usize {
        self.sections + self.subsections + self.tasks
    }

    /// The removed subtree as pretty JSON (for the recovery log)
    pub fn to_json(&self) -> String {
        let value = match &self.node {
            RemovedNode::Section(s) => serde_json::to_string_pretty(s),
            RemovedNode::Subsection(s) => serde_json::to_string_pretty(s),
            RemovedNode::Task(t) => serde_json::to_string_pretty(t),
        };
        value.unwrap_or_default()
    }
}

/// Remove the node at `path` with everything below it and renumber its siblings.
pub fn delete(template: &mut Template, path: NodePath) -> Result<Removed, EditError> {
    let not_found = EditError::NotFound(path);
    match path {
        NodePath::Section(s) => {
            let section = tree_ops::remove_at(&mut template.sections, s).ok_or(not_found)?;
            Ok(Removed {
                sections: 1,
                subsections: section.subsections.len(),
                tasks: section.task_count(),
                node: RemovedNode::Section(section),
            })
        }
        NodePath::Subsection(s, j) => {
            let section = section_mut(template, s).ok_or(not_found.clone())?;
            let sub = tree_ops::remove_at(&mut section.subsections, j).ok_or(not_found)?;
            Ok(Removed {
                sections: 0,
                subsections: 1,
                tasks: sub.tasks.len(),
                node: RemovedNode::Subsection(sub),
            })
        }
        NodePath::Task(s, j, k) => {
            let sub = subsection_mut(template, s, j).ok_or(not_found.clone())?;
            let task = tree_ops::remove_at(&mut sub.tasks, k).ok_or(not_found)?;
            Ok(Removed {
                sections: 0,
                subsections: 0,
                tasks: 1,
                node: RemovedNode::Task(task),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// Move a node one place up among its siblings.
///
/// Boundary and out-of-range indices are silent no-ops (`Ok(false)`): callers
/// are expected to hide the affordance rather than handle an error. A missing
/// parent is still an error.
pub fn move_up(template: &mut Template, path: NodePath) -> Result<bool, EditError> {
    shift(template, path, Direction::Up)
}

/// Move a node one place down among its siblings. Same policy as [`move_up`].
pub fn move_down(template: &mut Template, path: NodePath) -> Result<bool, EditError> {
    shift(template, path, Direction::Down)
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

fn shift_list<T: Ordered>(list: &mut [T], index: usize, direction: Direction) -> bool {
    match direction {
        Direction::Up => tree_ops::move_up(list, index),
        Direction::Down => tree_ops::move_down(list, index),
    }
}

fn shift(template: &mut Template, path: NodePath, direction: Direction) -> Result<bool, EditError> {
    let parent = path.parent();
    let missing = EditError::ParentNotFound(parent);
    let moved = match path {
        NodePath::Section(s) => shift_list(&mut template.sections, s, direction),
        NodePath::Subsection(s, j) => {
            let section = section_mut(template, s).ok_or(missing)?;
            shift_list(&mut section.subsections, j, direction)
        }
        NodePath::Task(s, j, k) => {
            let sub = subsection_mut(template, s, j).ok_or(missing)?;
            shift_list(&mut sub.tasks, k, direction)
        }
    };
    Ok(moved)
}

// ---------------------------------------------------------------------------
// Field edits
// ---------------------------------------------------------------------------

/// Set the title of a section or subsection
pub fn set_title(template: &mut Template, path: NodePath, title: String) -> Result<(), EditError> {
    match path {
        NodePath::Section(s) => {
            section_mut(template, s).ok_or(EditError::NotFound(path))?.title = title;
        }
        NodePath::Subsection(s, j) => {
            subsection_mut(template, s, j)
                .ok_or(EditError::NotFound(path))?
                .title = title;
        }
        NodePath::Task(..) => {
            return Err(EditError::WrongTier {
                op: "set the title of",
                kind: NodeKind::Task,
            });
        }
    }
    Ok(())
}

fn task_at<'a>(
    template: &'a mut Template,
    path: NodePath,
    op: &'static str,
) -> Result<&'a mut Task, EditError> {
    match path {
        NodePath::Task(s, j, k) => task_mut(template, s, j, k).ok_or(EditError::NotFound(path)),
        other => Err(EditError::WrongTier {
            op,
            kind: other.kind(),
        }),
    }
}

pub fn set_task_text(template: &mut Template, path: NodePath, text: String) -> Result<(), EditError> {
    task_at(template, path, "set the text of")?.text = text;
    Ok(())
}

pub fn set_task_note(template: &mut Template, path: NodePath, note: String) -> Result<(), EditError> {
    task_at(template, path, "set the note of")?.note = note;
    Ok(())
}

/// Flip the presentation-only `collapsed` flag. Returns the new value.
pub fn toggle_collapsed(template: &mut Template, path: NodePath) -> Result<bool, EditError> {
    let flag = match path {
        NodePath::Section(s) => &mut section_mut(template, s).ok_or(EditError::NotFound(path))?.collapsed,
        NodePath::Subsection(s, j) => {
            &mut subsection_mut(template, s, j)
                .ok_or(EditError::NotFound(path))?
                .collapsed
        }
        NodePath::Task(..) => {
            return Err(EditError::WrongTier {
                op: "collapse",
                kind: NodeKind::Task,
            });
        }
    };
    *flag = !*flag;
    Ok(*flag)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
