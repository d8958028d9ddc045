use crate::model::template::{Section, Subsection, Task, Template};
use crate::ops::tree_ops::renumber;

/// Produce the publishable form of a draft.
///
/// Works on a copy; the draft itself is never touched. Steps, bottom-up:
/// 1. trim every title, text and note
/// 2. drop tasks with no text
/// 3. drop subsections with no title and no tasks
/// 4. drop sections with no title and no subsections
/// 5. renumber every list and clear `collapsed`
///
/// Applying it twice gives the same result as applying it once.
pub fn build_clean_template(draft: &Template) -> Template {
    let mut clean = draft.clone();
    clean.title = clean.title.trim().to_string();

    for section in &mut clean.sections {
        clean_section(section);
    }
    clean
        .sections
        .retain(|s| !(s.title.is_empty() && s.subsections.is_empty()));
    renumber(&mut clean.sections);
    clean
}

fn clean_section(section: &mut Section) {
    section.title = section.title.trim().to_string();
    section.collapsed = false;
    for sub in &mut section.subsections {
        clean_subsection(sub);
    }
    section
        .subsections
        .retain(|sub| !(sub.title.is_empty() && sub.tasks.is_empty()));
    renumber(&mut section.subsections);
}

fn clean_subsection(sub: &mut Subsection) {
    sub.title = sub.title.trim().to_string();
    sub.collapsed = false;
    for task in &mut sub.tasks {
        clean_task(task);
    }
    sub.tasks.retain(|t| !t.text.is_empty());
    renumber(&mut sub.tasks);
}

fn clean_task(task: &mut Task) {
    task.text = task.text.trim().to_string();
    task.note = task.note.trim().to_string();
}

/// Serialize a template in the versionable publishing format (pretty JSON, trailing newline)
pub fn export_json(template: &Template) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(template)?;
    out.push('\n');
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::tree_ops::is_contiguous;
    use pretty_assertions::assert_eq;

    fn messy_draft() -> Template {
        serde_json::from_str(
            r#"{"id":"m","version":2,"title":"  Permit  ","sections":[
                {"id":"s1","title":"  Reports ","order":1,"collapsed":true,"subsections":[
                    {"id":"u1","title":"General","order":1,"tasks":[
                        {"id":"t1","order":1,"text":"  Planning report\n","note":" see council "},
                        {"id":"t2","order":2,"text":"   ","note":"orphan note"},
                        {"id":"t3","order":3,"text":"Landscape plan","note":""}
                    ]},
                    {"id":"u2","title":"  ","order":2,"tasks":[
                        {"id":"t4","order":1,"text":"","note":""}
                    ]},
                    {"id":"u3","title":"","order":3,"tasks":[
                        {"id":"t5","order":1,"text":"Untitled but kept","note":""}
                    ]}
                ]},
                {"id":"s2","title":" ","order":2,"subsections":[
                    {"id":"u4","title":"","order":1,"tasks":[]}
                ]},
                {"id":"s3","title":"","order":3,"subsections":[]},
                {"id":"s4","title":"Plans","order":4,"subsections":[]}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_trims_text_fields() {
        let clean = build_clean_template(&messy_draft());
        assert_eq!(clean.title, "Permit");
        assert_eq!(clean.sections[0].title, "Reports");
        let t1 = &clean.sections[0].subsections[0].tasks[0];
        assert_eq!(t1.text, "Planning report");
        assert_eq!(t1.note, "see council");
    }

    #[test]
    fn test_prunes_bottom_up() {
        let clean = build_clean_template(&messy_draft());

        // s2 only held an empty subsection, s3 was empty; s4 has a title so it stays
        let sections: Vec<&str> = clean.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(sections, vec!["s1", "s4"]);

        // u2 lost its only task, then its (blank) title made it removable
        let subs: Vec<&str> = clean.sections[0]
            .subsections
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(subs, vec!["u1", "u3"]);

        let tasks: Vec<&str> = clean.sections[0].subsections[0]
            .tasks
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(tasks, vec!["t1", "t3"]);
    }

    #[test]
    fn test_renumbers_and_clears_collapsed() {
        let clean = build_clean_template(&messy_draft());
        assert!(is_contiguous(&clean.sections));
        for section in &clean.sections {
            assert!(!section.collapsed);
            assert!(is_contiguous(&section.subsections));
            for sub in &section.subsections {
                assert!(is_contiguous(&sub.tasks));
            }
        }
        assert_eq!(clean.sections[0].subsections[0].tasks[1].order, 2);
    }

    #[test]
    fn test_does_not_mutate_draft() {
        let draft = messy_draft();
        let before = draft.clone();
        let _ = build_clean_template(&draft);
        assert_eq!(draft, before);
    }

    #[test]
    fn test_idempotent() {
        let once = build_clean_template(&messy_draft());
        let twice = build_clean_template(&once);
        assert_eq!(twice, once);

        let builtin = Template::builtin_default();
        let clean = build_clean_template(&builtin);
        assert_eq!(build_clean_template(&clean), clean);
    }

    #[test]
    fn test_export_json_round_trips() {
        let clean = build_clean_template(&messy_draft());
        let json = export_json(&clean).unwrap();
        assert!(json.ends_with("}\n"));
        assert!(json.contains("\n  \"sections\": ["));
        let back: Template = serde_json::from_str(&json).unwrap();
        assert_eq!(back, clean);
    }
}
