use std::collections::HashMap;

use serde::Serialize;

use crate::model::config::IdConfig;
use crate::model::ids::NodeKind;
use crate::model::instance::Instance;
use crate::model::template::{Ordered, Template};
use crate::ops::merge::stale_ids;
use crate::ops::template_ops::NodePath;
use crate::ops::tree_ops::is_contiguous;

/// Structured result from `cf check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A validation error (breaks an invariant the editor relies on).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// The same id is used by more than one node of one tier
    #[serde(rename = "duplicate_id")]
    DuplicateId {
        kind: NodeKind,
        id: String,
        paths: Vec<String>,
    },
    /// A sibling list whose `order` values are not 1..N in array order.
    /// `parent` is `root` for the section list.
    #[serde(rename = "order_gap")]
    OrderGap { parent: String, orders: Vec<u32> },
}

/// A validation warning (non-critical issue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// A section or subsection without a title, or a task without text
    #[serde(rename = "empty_text")]
    EmptyText { kind: NodeKind, path: String },
    /// An id that does not carry the configured prefix for its tier
    #[serde(rename = "unprefixed_id")]
    UnprefixedId {
        kind: NodeKind,
        id: String,
        expected_prefix: String,
    },
    /// An instance entry for a task that is not in the template
    #[serde(rename = "stale_state")]
    StaleState { task_id: String },
}

/// Validate a template. Read-only.
///
/// Checks performed:
/// 1. Ids are unique within each tier
/// 2. Every sibling list is numbered 1..N
/// 3. Titles and task texts are non-empty (warning)
/// 4. Ids carry the configured tier prefix (warning)
pub fn check_template(template: &Template, prefixes: &IdConfig) -> CheckResult {
    let mut result = CheckResult::default();
    let mut seen: HashMap<(NodeKind, String), Vec<String>> = HashMap::new();

    check_order(&mut result, "root".to_string(), &template.sections);

    for (s, section) in template.sections.iter().enumerate() {
        let path = NodePath::Section(s);
        visit_node(
            &mut result,
            &mut seen,
            prefixes,
            (NodeKind::Section, section.id.as_str(), section.title.as_str()),
            path,
        );
        check_order(&mut result, path.to_string(), &section.subsections);

        for (j, sub) in section.subsections.iter().enumerate() {
            let path = NodePath::Subsection(s, j);
            visit_node(
                &mut result,
                &mut seen,
                prefixes,
                (NodeKind::Subsection, sub.id.as_str(), sub.title.as_str()),
                path,
            );
            check_order(&mut result, path.to_string(), &sub.tasks);

            for (k, task) in sub.tasks.iter().enumerate() {
                visit_node(
                    &mut result,
                    &mut seen,
                    prefixes,
                    (NodeKind::Task, task.id.as_str(), task.text.as_str()),
                    NodePath::Task(s, j, k),
                );
            }
        }
    }

    let mut duplicates: Vec<CheckError> = seen
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|((kind, id), paths)| CheckError::DuplicateId { kind, id, paths })
        .collect();
    duplicates.sort_by(|a, b| format!("{:?}", a).cmp(&format!("{:?}", b)));
    result.errors.extend(duplicates);

    result.valid = result.errors.is_empty();
    result
}

/// Validate a template and, in addition, report stale entries in an instance.
pub fn check_with_instance(
    template: &Template,
    prefixes: &IdConfig,
    instance: &Instance,
) -> CheckResult {
    let mut result = check_template(template, prefixes);
    result
        .warnings
        .extend(stale_ids(template, instance).into_iter().map(|id| {
            CheckWarning::StaleState {
                task_id: id.to_string(),
            }
        }));
    result
}

fn visit_node(
    result: &mut CheckResult,
    seen: &mut HashMap<(NodeKind, String), Vec<String>>,
    prefixes: &IdConfig,
    (kind, id, text): (NodeKind, &str, &str),
    path: NodePath,
) {
    seen.entry((kind, id.to_string()))
        .or_default()
        .push(path.to_string());

    if text.trim().is_empty() {
        result.warnings.push(CheckWarning::EmptyText {
            kind,
            path: path.to_string(),
        });
    }

    let prefix = prefixes.prefix(kind);
    if !id.starts_with(&format!("{}_", prefix)) && !id.starts_with(&format!("{}-", prefix)) {
        result.warnings.push(CheckWarning::UnprefixedId {
            kind,
            id: id.to_string(),
            expected_prefix: prefix.to_string(),
        });
    }
}

fn check_order<T: Ordered>(result: &mut CheckResult, parent: String, list: &[T]) {
    if !is_contiguous(list) {
        result.errors.push(CheckError::OrderGap {
            parent,
            orders: list.iter().map(Ordered::order).collect(),
        });
    }
}
