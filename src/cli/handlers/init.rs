use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io;
use crate::io::fs_store::{FsStore, TemplateStore};
use crate::io::project_io::{self, PROJECT_DIR};
use crate::model::template::Template;

const CHECKLIST_TOML_TEMPLATE: &str = r##"[project]
name = ""

[template]
# Draft being edited, stored as checklist/drafts/<draft>.json.
# Switch with: cf draft use <key>
draft = "master"
# Published template written by `cf export`, relative to checklist/.
# The built-in planning permit checklist is used until it exists.
published = "template.json"

# --- ID Prefixes ---
# Prefixes for ids minted by add and duplicate. Existing ids are never renamed.
[ids]
section = "sec"
subsection = "sub"
task = "task"
"##;

/// Infer a project name from a directory name: replace hyphens with spaces, title-case.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + chars.as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render checklist.toml with the project name filled in. The name goes
/// through toml_edit so quotes and backslashes are escaped.
fn render_checklist_toml(name: &str) -> Result<String, toml_edit::TomlError> {
    let mut doc: toml_edit::DocumentMut = CHECKLIST_TOML_TEMPLATE.parse()?;
    config_io::set_project_name(&mut doc, name);
    Ok(doc.to_string())
}

pub fn cmd_init(args: InitArgs, cwd: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let dir = cwd.join(PROJECT_DIR);

    if dir.join("checklist.toml").exists() && !args.force {
        return Err("checklist project already exists in ./checklist/ (use --force to reinitialize)".into());
    }

    if let Some(parent) = cwd.parent()
        && let Ok(parent_root) = project_io::discover_project(parent)
    {
        eprintln!(
            "Note: parent project found at {}/",
            parent_root.join(PROJECT_DIR).display()
        );
        eprintln!("Creating new project in ./checklist/");
    }

    let name = args.name.unwrap_or_else(|| {
        cwd.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Untitled".to_string())
    });

    fs::create_dir_all(dir.join("drafts"))?;
    fs::create_dir_all(dir.join("instances"))?;
    fs::write(dir.join("checklist.toml"), render_checklist_toml(&name)?)?;

    // Seed the master draft so there is something to edit right away
    let mut store = FsStore::new(&dir);
    let seeded = if matches!(store.load_template("master"), Ok(None)) {
        store.save_template("master", &Template::builtin_default())?;
        true
    } else {
        false
    };

    println!("Initialized checklist project: {}", name);
    if seeded {
        println!("  draft: master (from the built-in template)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::ProjectConfig;

    #[test]
    fn test_infer_name() {
        assert_eq!(infer_name("planning-permit"), "Planning Permit");
        assert_eq!(infer_name("site_audit"), "Site Audit");
        assert_eq!(infer_name("checks"), "Checks");
        assert_eq!(infer_name("--"), "");
    }

    #[test]
    fn test_render_checklist_toml() {
        let text = render_checklist_toml("Council \"A\" Permits").unwrap();
        let config: ProjectConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.project.name, "Council \"A\" Permits");
        assert_eq!(config.template.draft, "master");
        assert_eq!(config.ids.task, "task");
        assert!(text.contains("# --- ID Prefixes ---"));
    }

    #[test]
    fn test_init_creates_project_and_seeds_draft() {
        let tmp = tempfile::TempDir::new().unwrap();
        cmd_init(
            InitArgs {
                name: Some("Permits".into()),
                force: false,
            },
            tmp.path(),
        )
        .unwrap();

        let project = project_io::load_project(tmp.path()).unwrap();
        assert_eq!(project.config.project.name, "Permits");
        let store = FsStore::new(&project.dir);
        assert_eq!(
            store.load_template("master").unwrap().unwrap(),
            Template::builtin_default()
        );
        assert!(project.dir.join("instances").is_dir());
    }

    #[test]
    fn test_init_refuses_existing_project() {
        let tmp = tempfile::TempDir::new().unwrap();
        let args = || InitArgs {
            name: None,
            force: false,
        };
        cmd_init(args(), tmp.path()).unwrap();
        assert!(cmd_init(args(), tmp.path()).is_err());
        cmd_init(
            InitArgs {
                name: None,
                force: true,
            },
            tmp.path(),
        )
        .unwrap();
    }
}
