use serde::Serialize;

use crate::io::recovery::RecoveryEntry;
use crate::model::instance::TaskState;
use crate::model::template::{Section, Subsection, Template};
use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::merge::{MergedView, Progress};
use crate::ops::template_ops::{NodePath, Removed};
use crate::util::unicode::{single_line, truncate_to_width};

/// Line width used for text output
pub const DEFAULT_WIDTH: usize = 100;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NodeJson {
    pub path: String,
    pub id: String,
    pub kind: String,
}

#[derive(Serialize)]
pub struct RemovedJson {
    pub path: String,
    pub sections: usize,
    pub subsections: usize,
    pub tasks: usize,
}

#[derive(Serialize)]
pub struct MoveJson {
    pub moved: bool,
    pub path: String,
}

#[derive(Serialize)]
pub struct RunTaskJson {
    pub path: String,
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub guidance: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
}

#[derive(Serialize)]
pub struct SectionProgressJson {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub progress: Progress,
}

#[derive(Serialize)]
pub struct RunViewJson {
    pub instance: String,
    pub template: String,
    pub version: u32,
    pub progress: Progress,
    pub sections: Vec<SectionProgressJson>,
    pub tasks: Vec<RunTaskJson>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stale: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn node_to_json(template: &Template, path: NodePath) -> NodeJson {
    NodeJson {
        path: path.to_string(),
        id: node_id(template, path).unwrap_or_default(),
        kind: path.kind().to_string(),
    }
}

pub fn removed_to_json(path: NodePath, removed: &Removed) -> RemovedJson {
    RemovedJson {
        path: path.to_string(),
        sections: removed.sections,
        subsections: removed.subsections,
        tasks: removed.tasks,
    }
}

pub fn run_view_to_json(instance: &str, view: &MergedView<'_>, stale: &[String]) -> RunViewJson {
    let template = view.template;
    let mut tasks = Vec::new();
    for (s, section) in template.sections.iter().enumerate() {
        for (j, sub) in section.subsections.iter().enumerate() {
            for (k, task) in sub.tasks.iter().enumerate() {
                let state = view.state(&task.id).cloned().unwrap_or_default();
                tasks.push(RunTaskJson {
                    path: NodePath::Task(s, j, k).to_string(),
                    id: task.id.to_string(),
                    text: task.text.clone(),
                    guidance: task.note.clone(),
                    completed: state.completed,
                    note: state.note,
                });
            }
        }
    }

    let sections = view
        .section_progress()
        .into_iter()
        .map(|(id, progress)| SectionProgressJson {
            title: template
                .sections
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.title.clone())
                .unwrap_or_default(),
            id: id.to_string(),
            progress,
        })
        .collect();

    RunViewJson {
        instance: instance.to_string(),
        template: template.id.clone(),
        version: template.version,
        progress: view.progress(),
        sections,
        tasks,
        stale: stale.to_vec(),
    }
}

/// Id of the node at `path`, if it exists
pub fn node_id(template: &Template, path: NodePath) -> Option<String> {
    match path {
        NodePath::Section(s) => template.sections.get(s).map(|n| n.id.to_string()),
        NodePath::Subsection(s, j) => template
            .sections
            .get(s)?
            .subsections
            .get(j)
            .map(|n| n.id.to_string()),
        NodePath::Task(s, j, k) => template
            .sections
            .get(s)?
            .subsections
            .get(j)?
            .tasks
            .get(k)
            .map(|n| n.id.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Options for [`format_template_tree`]
#[derive(Debug, Clone, Copy)]
pub struct TreeOptions {
    pub show_ids: bool,
    /// Show children of collapsed nodes
    pub expand: bool,
    pub width: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        TreeOptions {
            show_ids: false,
            expand: false,
            width: DEFAULT_WIDTH,
        }
    }
}

fn label(text: &str, placeholder: &str) -> String {
    let line = single_line(text);
    if line.is_empty() {
        placeholder.to_string()
    } else {
        line
    }
}

fn node_head(path: NodePath, id: &str, show_ids: bool) -> String {
    if show_ids {
        format!("{} [{}]", path, id)
    } else {
        path.to_string()
    }
}

fn collapsed_hint(subsections: usize, tasks: usize) -> String {
    if subsections > 0 {
        format!(" [+{}, {}]", plural(subsections, "subsection"), plural(tasks, "task"))
    } else {
        format!(" [+{}]", plural(tasks, "task"))
    }
}

/// Render a template as an indented outline with dotted positions
pub fn format_template_tree(template: &Template, opts: TreeOptions) -> Vec<String> {
    let mut lines = vec![format!(
        "{} (v{})",
        label(&template.title, "(untitled template)"),
        template.version
    )];

    for (s, section) in template.sections.iter().enumerate() {
        format_section(&mut lines, section, s, opts);
    }

    lines
        .into_iter()
        .map(|l| truncate_to_width(&l, opts.width))
        .collect()
}

fn format_section(lines: &mut Vec<String>, section: &Section, s: usize, opts: TreeOptions) {
    let path = NodePath::Section(s);
    let mut line = format!(
        "{} {}",
        node_head(path, section.id.as_str(), opts.show_ids),
        label(&section.title, "(untitled)")
    );
    let hidden = section.collapsed && !opts.expand;
    if hidden {
        line.push_str(&collapsed_hint(section.subsections.len(), section.task_count()));
    }
    lines.push(line);
    if hidden {
        return;
    }
    for (j, sub) in section.subsections.iter().enumerate() {
        format_subsection(lines, sub, s, j, opts);
    }
}

fn format_subsection(lines: &mut Vec<String>, sub: &Subsection, s: usize, j: usize, opts: TreeOptions) {
    let path = NodePath::Subsection(s, j);
    let mut line = format!(
        "  {} {}",
        node_head(path, sub.id.as_str(), opts.show_ids),
        label(&sub.title, "(untitled)")
    );
    let hidden = sub.collapsed && !opts.expand;
    if hidden {
        line.push_str(&collapsed_hint(0, sub.tasks.len()));
    }
    lines.push(line);
    if hidden {
        return;
    }
    for (k, task) in sub.tasks.iter().enumerate() {
        let head = node_head(NodePath::Task(s, j, k), task.id.as_str(), opts.show_ids);
        lines.push(format!("    {} {}", head, label(&task.text, "(no text)")));
        if !task.note.trim().is_empty() {
            let pad = " ".repeat(4 + head.len() + 1);
            lines.push(format!("{}note: {}", pad, single_line(&task.note)));
        }
    }
}

fn checkbox(state: Option<&TaskState>) -> &'static str {
    if state.is_some_and(|s| s.completed) {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Render a merged view: the whole tree with completion marks and runner notes
pub fn format_run_tree(instance: &str, view: &MergedView<'_>, width: usize) -> Vec<String> {
    let template = view.template;
    let progress = view.progress();
    let mut lines = vec![format!(
        "{}: {}/{} tasks complete ({} v{})",
        instance, progress.completed, progress.total, template.id, template.version
    )];

    let per_section = view.section_progress();
    for (s, section) in template.sections.iter().enumerate() {
        let p = per_section
            .iter()
            .find(|(id, _)| *id == section.id)
            .map(|(_, p)| *p)
            .unwrap_or_default();
        lines.push(format!(
            "{} {} ({}/{})",
            NodePath::Section(s),
            label(&section.title, "(untitled)"),
            p.completed,
            p.total
        ));
        for (j, sub) in section.subsections.iter().enumerate() {
            lines.push(format!(
                "  {} {}",
                NodePath::Subsection(s, j),
                label(&sub.title, "(untitled)")
            ));
            for (k, task) in sub.tasks.iter().enumerate() {
                let state = view.state(&task.id);
                lines.push(format!(
                    "    {} {} {}",
                    checkbox(state),
                    NodePath::Task(s, j, k),
                    label(&task.text, "(no text)")
                ));
                if let Some(note) = state.map(|st| single_line(&st.note)).filter(|n| !n.is_empty()) {
                    lines.push(format!("        > {}", note));
                }
            }
        }
    }

    lines
        .into_iter()
        .map(|l| truncate_to_width(&l, width))
        .collect()
}

/// One-line summary of a delete
pub fn format_removed(path: NodePath, removed: &Removed) -> String {
    let mut parts = Vec::new();
    if removed.sections > 0 {
        parts.push(plural(removed.sections, "section"));
    }
    if removed.subsections > 0 {
        parts.push(plural(removed.subsections, "subsection"));
    }
    if removed.tasks > 0 {
        parts.push(plural(removed.tasks, "task"));
    }
    format!("deleted {} ({})", path, parts.join(", "))
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

pub fn format_check_result(result: &CheckResult) -> Vec<String> {
    let mut lines = Vec::new();
    if !result.errors.is_empty() {
        lines.push("Errors:".to_string());
        for err in &result.errors {
            match err {
                CheckError::DuplicateId { kind, id, paths } => {
                    lines.push(format!("  {} id {} is used at {}", kind, id, paths.join(", ")));
                }
                CheckError::OrderGap { parent, orders } => {
                    let orders: Vec<String> = orders.iter().map(u32::to_string).collect();
                    lines.push(format!(
                        "  children of {} are numbered {} (expected 1..{})",
                        parent,
                        orders.join(", "),
                        orders.len()
                    ));
                }
            }
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            lines.push(String::new());
        }
        lines.push("Warnings:".to_string());
        for warn in &result.warnings {
            match warn {
                CheckWarning::EmptyText { kind, path } => {
                    let what = if *kind == crate::model::ids::NodeKind::Task { "text" } else { "title" };
                    lines.push(format!("  {} {} has no {}", kind, path, what));
                }
                CheckWarning::UnprefixedId {
                    kind,
                    id,
                    expected_prefix,
                } => {
                    lines.push(format!(
                        "  {} id {} does not start with {}_",
                        kind, id, expected_prefix
                    ));
                }
                CheckWarning::StaleState { task_id } => {
                    lines.push(format!("  instance has state for unknown task {}", task_id));
                }
            }
        }
    }
    if result.valid {
        lines.push("\u{2713} template is valid".to_string());
    } else {
        lines.push("\u{2717} template has errors".to_string());
    }
    lines
}

pub fn format_recovery_entry(entry: &RecoveryEntry) -> Vec<String> {
    let mut lines = vec![format!(
        "{} [{}] {}",
        entry
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        entry.category,
        entry.description
    )];
    for (key, value) in &entry.fields {
        lines.push(format!("  {}: {}", key, value));
    }
    if !entry.body.is_empty() {
        for line in entry.body.lines() {
            lines.push(format!("    {}", line));
        }
    }
    lines
}
