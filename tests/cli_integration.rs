//! Integration tests for the `cf` CLI.
//!
//! Each test creates a temp project directory, runs `cf` as a subprocess,
//! and verifies stdout and/or file contents.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use pretty_assertions::assert_eq;

/// Path to the built `cf` binary.
fn cf_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_cf"))
}

/// Run `cf` with the given args in the given directory, returning (stdout, stderr, success).
fn run_cf(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(cf_bin())
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run cf");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `cf` expecting success, return stdout.
fn run_cf_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_cf(dir, args);
    if !success {
        panic!(
            "cf {:?} failed:\nstdout: {}\nstderr: {}",
            args, stdout, stderr
        );
    }
    stdout
}

/// Run `cf` expecting failure, return stderr.
fn run_cf_err(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_cf(dir, args);
    if success {
        panic!("cf {:?} should have failed:\nstdout: {}", args, stdout);
    }
    stderr
}

/// A fresh project seeded with the built-in template
fn init_project() -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().unwrap();
    run_cf_ok(tmp.path(), &["init", "--name", "Test Permits"]);
    tmp
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn draft_json(root: &Path) -> serde_json::Value {
    read_json(&root.join("checklist/drafts/master.json"))
}

// ---------------------------------------------------------------------------
// Init and read commands
// ---------------------------------------------------------------------------

#[test]
fn test_init_creates_layout() {
    let tmp = init_project();
    let dir = tmp.path().join("checklist");
    assert!(dir.join("checklist.toml").exists());
    assert!(dir.join("drafts/master.json").exists());
    assert!(dir.join("instances").is_dir());

    let toml = fs::read_to_string(dir.join("checklist.toml")).unwrap();
    assert!(toml.contains("name = \"Test Permits\""));
}

#[test]
fn test_init_twice_fails() {
    let tmp = init_project();
    let err = run_cf_err(tmp.path(), &["init"]);
    assert!(err.contains("already exists"));
}

#[test]
fn test_not_a_project() {
    let tmp = tempfile::TempDir::new().unwrap();
    let err = run_cf_err(tmp.path(), &["show"]);
    assert!(err.starts_with("error: not a checklist project"));
}

#[test]
fn test_show_tree() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["show"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "Planning Permit Checklist (v1)");
    assert_eq!(lines[1], "1 Reports");
    assert_eq!(lines[2], "  1.1 General");
    assert!(lines[3].starts_with("    1.1.1 Planning report"));
    assert_eq!(lines[4], "          note: Use Council template if available.");
    assert_eq!(lines[5], "    1.1.2 Landscape plan.");
}

#[test]
fn test_show_ids_and_json() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["show", "--ids"]);
    assert!(out.contains("1 [sec-1] Reports"));
    assert!(out.contains("1.1.2 [t-2] Landscape plan."));

    let out = run_cf_ok(tmp.path(), &["--json", "show"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["id"], "planning-permit-master");
    assert_eq!(parsed["sections"][0]["subsections"][0]["tasks"][1]["id"], "t-2");
}

#[test]
fn test_subdirectory_and_project_dir_flag() {
    let tmp = init_project();
    let sub = tmp.path().join("checklist/drafts");
    let out = run_cf_ok(&sub, &["show"]);
    assert!(out.contains("1 Reports"));

    let elsewhere = tempfile::TempDir::new().unwrap();
    let root = tmp.path().to_str().unwrap();
    let out = run_cf_ok(elsewhere.path(), &["-C", root, "show"]);
    assert!(out.contains("1 Reports"));
}

#[test]
fn test_check_valid() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["check"]);
    assert!(out.contains("template is valid"));

    let out = run_cf_ok(tmp.path(), &["check", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["valid"], true);
}

#[test]
fn test_check_reports_duplicate_ids() {
    let tmp = init_project();
    let path = tmp.path().join("checklist/drafts/master.json");
    let mut draft = read_json(&path);
    draft["sections"][0]["subsections"][0]["tasks"][1]["id"] = "t-1".into();
    fs::write(&path, serde_json::to_string(&draft).unwrap()).unwrap();

    let out = run_cf_ok(tmp.path(), &["check", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["valid"], false);
    assert_eq!(parsed["errors"][0]["type"], "duplicate_id");
    assert_eq!(parsed["errors"][0]["id"], "t-1");
}

// ---------------------------------------------------------------------------
// Draft edits
// ---------------------------------------------------------------------------

#[test]
fn test_add_section_with_title() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["add", "root", "--title", "Plans"]);
    assert!(out.starts_with("2 sec_"), "got: {}", out);

    let draft = draft_json(tmp.path());
    assert_eq!(draft["sections"][1]["title"], "Plans");
    assert_eq!(draft["sections"][1]["order"], 2);
    assert_eq!(draft["sections"][1]["collapsed"], false);
}

#[test]
fn test_add_task_by_parent_id() {
    let tmp = init_project();
    let out = run_cf_ok(
        tmp.path(),
        &["add", "sub-1", "--text", "Traffic report", "--note", "If > 10 lots"],
    );
    assert!(out.starts_with("1.1.3 task_"), "got: {}", out);

    let task = &draft_json(tmp.path())["sections"][0]["subsections"][0]["tasks"][2];
    assert_eq!(task["text"], "Traffic report");
    assert_eq!(task["note"], "If > 10 lots");
    assert_eq!(task["order"], 3);
}

#[test]
fn test_add_defaults() {
    let tmp = init_project();
    run_cf_ok(tmp.path(), &["add", "1"]);
    let draft = draft_json(tmp.path());
    assert_eq!(draft["sections"][0]["subsections"][1]["title"], "New Subsection");
    assert_eq!(
        draft["sections"][0]["subsections"][1]["tasks"]
            .as_array()
            .unwrap()
            .len(),
        0
    );
}

#[test]
fn test_add_rejects_mismatched_flags() {
    let tmp = init_project();
    let err = run_cf_err(tmp.path(), &["add", "1.1", "--title", "x"]);
    assert!(err.contains("--title is for sections and subsections"));
    let err = run_cf_err(tmp.path(), &["add", "root", "--text", "x"]);
    assert!(err.contains("--text and --note are for tasks"));
    let err = run_cf_err(tmp.path(), &["add", "t-1"]);
    assert!(err.contains("tasks have no children"));
}

#[test]
fn test_add_under_missing_parent() {
    let tmp = init_project();
    let err = run_cf_err(tmp.path(), &["add", "3.1"]);
    assert!(err.contains("no parent at 3.1"));
}

#[test]
fn test_dup_subsection() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["dup", "1.1"]);
    assert!(out.starts_with("1.2 sub_"), "got: {}", out);

    let draft = draft_json(tmp.path());
    let subs = draft["sections"][0]["subsections"].as_array().unwrap();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[1]["title"], "General");
    assert_eq!(subs[1]["order"], 2);
    let copy_tasks = subs[1]["tasks"].as_array().unwrap();
    assert_eq!(copy_tasks.len(), 2);
    assert_ne!(copy_tasks[0]["id"], "t-1");
    assert_ne!(copy_tasks[0]["id"], copy_tasks[1]["id"]);
    assert_eq!(copy_tasks[1]["text"], "Landscape plan.");
}

#[test]
fn test_rm_with_yes() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["rm", "1", "--yes"]);
    assert_eq!(out.trim(), "deleted 1 (1 section, 1 subsection, 2 tasks)");
    assert_eq!(draft_json(tmp.path())["sections"].as_array().unwrap().len(), 0);

    // The removed subtree went to the recovery log
    let out = run_cf_ok(tmp.path(), &["recovery"]);
    assert!(out.contains("[delete] section 1 deleted"));
    assert!(out.contains("Landscape plan."));
}

#[test]
fn test_rm_without_confirmation_is_cancelled() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["rm", "1.1.2"]);
    assert_eq!(out.trim(), "cancelled");
    assert_eq!(
        draft_json(tmp.path())["sections"][0]["subsections"][0]["tasks"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn test_rm_missing_node() {
    let tmp = init_project();
    let err = run_cf_err(tmp.path(), &["rm", "1.1.5", "--yes"]);
    assert!(err.contains("no node at 1.1.5"));
}

#[test]
fn test_move_down_and_boundary() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["down", "t-1"]);
    assert_eq!(out.trim(), "1.1.1 -> 1.1.2");

    let tasks = &draft_json(tmp.path())["sections"][0]["subsections"][0]["tasks"];
    assert_eq!(tasks[0]["id"], "t-2");
    assert_eq!(tasks[0]["order"], 1);
    assert_eq!(tasks[1]["id"], "t-1");
    assert_eq!(tasks[1]["order"], 2);

    let out = run_cf_ok(tmp.path(), &["down", "1.1.2"]);
    assert_eq!(out.trim(), "1.1.2 unchanged");
    let out = run_cf_ok(tmp.path(), &["up", "1"]);
    assert_eq!(out.trim(), "1 unchanged");

    let out = run_cf_ok(tmp.path(), &["--json", "up", "1.1.2"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["moved"], true);
    assert_eq!(parsed["path"], "1.1.1");
}

#[test]
fn test_field_edits() {
    let tmp = init_project();
    run_cf_ok(tmp.path(), &["title", "1", "Documents"]);
    run_cf_ok(tmp.path(), &["text", "1.1.2", "Landscape plan (A1)."]);
    run_cf_ok(tmp.path(), &["note", "t-2", "Two copies"]);

    let draft = draft_json(tmp.path());
    assert_eq!(draft["sections"][0]["title"], "Documents");
    let task = &draft["sections"][0]["subsections"][0]["tasks"][1];
    assert_eq!(task["text"], "Landscape plan (A1).");
    assert_eq!(task["note"], "Two copies");

    let err = run_cf_err(tmp.path(), &["title", "1.1.1", "x"]);
    assert!(err.contains("cannot set the title of a task"));
    let err = run_cf_err(tmp.path(), &["text", "1", "x"]);
    assert!(err.contains("cannot set the text of a section"));
}

#[test]
fn test_collapse_toggles_and_hides_children() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["collapse", "1"]);
    assert_eq!(out.trim(), "collapsed 1");

    let out = run_cf_ok(tmp.path(), &["show"]);
    assert!(out.contains("1 Reports [+1 subsection, 2 tasks]"));
    assert!(!out.contains("1.1 General"));

    let out = run_cf_ok(tmp.path(), &["show", "--expand"]);
    assert!(out.contains("1.1 General"));

    let out = run_cf_ok(tmp.path(), &["collapse", "1"]);
    assert_eq!(out.trim(), "expanded 1");
}

// ---------------------------------------------------------------------------
// Export and draft management
// ---------------------------------------------------------------------------

#[test]
fn test_export_cleans_and_publishes() {
    let tmp = init_project();
    run_cf_ok(tmp.path(), &["add", "1.1", "--text", "   "]);
    run_cf_ok(tmp.path(), &["add", "root"]);
    run_cf_ok(tmp.path(), &["title", "2", ""]);
    run_cf_ok(tmp.path(), &["collapse", "1.1"]);

    let out = run_cf_ok(tmp.path(), &["export"]);
    assert!(out.starts_with("exported planning-permit-master v1 to "));
    assert!(out.trim_end().ends_with("(2 tasks)"));

    let published = read_json(&tmp.path().join("checklist/template.json"));
    assert_eq!(published["sections"].as_array().unwrap().len(), 1);
    let sub = &published["sections"][0]["subsections"][0];
    assert_eq!(sub["collapsed"], false);
    assert_eq!(sub["tasks"].as_array().unwrap().len(), 2);

    // The draft itself keeps the blank task
    let draft = draft_json(tmp.path());
    assert_eq!(
        draft["sections"][0]["subsections"][0]["tasks"]
            .as_array()
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn test_export_bump_and_out() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["export", "--bump", "--out", "v2.json"]);
    assert!(out.starts_with("exported planning-permit-master v2"));
    let exported = read_json(&tmp.path().join("v2.json"));
    assert_eq!(exported["version"], 2);
    assert_eq!(draft_json(tmp.path())["version"], 2);
    assert!(!tmp.path().join("checklist/template.json").exists());
}

#[test]
fn test_export_dry_run() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["export", "--dry-run"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["id"], "planning-permit-master");
    assert!(!tmp.path().join("checklist/template.json").exists());
}

#[test]
fn test_draft_use_and_list() {
    let tmp = init_project();
    run_cf_ok(tmp.path(), &["title", "1", "Edited"]);
    run_cf_ok(tmp.path(), &["draft", "use", "site-b"]);

    let toml = fs::read_to_string(tmp.path().join("checklist/checklist.toml")).unwrap();
    assert!(toml.contains("draft = \"site-b\""));
    // Comments in the config survive the edit
    assert!(toml.contains("# --- ID Prefixes ---"));

    // A new draft starts from the published template, not the other draft
    let out = run_cf_ok(tmp.path(), &["show"]);
    assert!(out.contains("1 Reports"));

    let out = run_cf_ok(tmp.path(), &["draft", "list"]);
    assert_eq!(out, "  master\n* site-b\n");

    let err = run_cf_err(tmp.path(), &["draft", "use", "../x"]);
    assert!(err.contains("invalid key"));
}

#[test]
fn test_draft_reset() {
    let tmp = init_project();
    run_cf_ok(tmp.path(), &["rm", "1", "--yes"]);
    run_cf_ok(tmp.path(), &["draft", "reset", "--yes"]);
    let out = run_cf_ok(tmp.path(), &["show"]);
    assert!(out.contains("1 Reports"));
}

#[test]
fn test_malformed_draft_falls_back() {
    let tmp = init_project();
    fs::write(tmp.path().join("checklist/drafts/master.json"), "{ broken").unwrap();

    let (stdout, stderr, success) = run_cf(tmp.path(), &["show"]);
    assert!(success);
    assert!(stderr.contains("warning: draft 'master' could not be read"));
    assert!(stdout.contains("1 Reports"));

    let out = run_cf_ok(tmp.path(), &["recovery"]);
    assert!(out.contains("[parser] unreadable draft master"));
    assert!(out.contains("{ broken"));
}

#[test]
fn test_malformed_published_falls_back() {
    let tmp = init_project();
    run_cf_ok(tmp.path(), &["add", "root", "--title", "A"]);
    fs::write(tmp.path().join("checklist/template.json"), "{ broken").unwrap();

    // Edits on a valid draft keep working
    let (stdout, stderr, success) = run_cf(tmp.path(), &["add", "root", "--title", "B"]);
    assert!(success, "stderr: {}", stderr);
    assert!(stderr.contains("warning: published template"));
    assert!(stdout.starts_with("3 sec_"), "got: {}", stdout);
    assert_eq!(draft_json(tmp.path())["sections"][2]["title"], "B");

    // Runs use the built-in template instead
    let out = run_cf_ok(tmp.path(), &["run", "show", "site-1"]);
    assert!(out.starts_with("site-1: 0/2 tasks complete"));

    let out = run_cf_ok(tmp.path(), &["recovery"]);
    assert!(out.contains("[parser] unreadable published template"));
    assert!(out.contains("{ broken"));
}

// ---------------------------------------------------------------------------
// Instance runs
// ---------------------------------------------------------------------------

#[test]
fn test_run_done_and_show() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["run", "done", "site-1", "1.1.1"]);
    assert_eq!(out.trim(), "[x] t-1");

    let out = run_cf_ok(tmp.path(), &["run", "show", "site-1"]);
    assert!(out.starts_with("site-1: 1/2 tasks complete"));
    assert!(out.contains("1 Reports (1/2)"));
    assert!(out.contains("[x] 1.1.1 Planning report"));
    assert!(out.contains("[ ] 1.1.2 Landscape plan."));

    let inst = read_json(&tmp.path().join("checklist/instances/site-1.json"));
    assert_eq!(inst["taskState"]["t-1"]["completed"], true);
    assert!(inst["taskState"].get("t-2").is_none());
    assert!(inst["updatedAt"].is_string());
}

#[test]
fn test_run_note_undo_toggle() {
    let tmp = init_project();
    run_cf_ok(tmp.path(), &["run", "note", "site-1", "t-2", "Drawn by Smith"]);
    run_cf_ok(tmp.path(), &["run", "toggle", "site-1", "t-2"]);
    let out = run_cf_ok(tmp.path(), &["--json", "run", "undo", "site-1", "t-2"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["completed"], false);
    assert_eq!(parsed["note"], "Drawn by Smith");

    let out = run_cf_ok(tmp.path(), &["run", "show", "site-1"]);
    assert!(out.contains("> Drawn by Smith"));
}

#[test]
fn test_run_unknown_task() {
    let tmp = init_project();
    let err = run_cf_err(tmp.path(), &["run", "done", "site-1", "sec-1"]);
    assert!(err.contains("task sec-1 is not in the template"));
    assert!(!tmp.path().join("checklist/instances/site-1.json").exists());
}

#[test]
fn test_run_uses_published_template_and_prunes() {
    let tmp = init_project();
    run_cf_ok(tmp.path(), &["run", "done", "site-1", "t-2"]);

    // Publish a template without t-2
    run_cf_ok(tmp.path(), &["rm", "1.1.2", "--yes"]);
    run_cf_ok(tmp.path(), &["export"]);

    let out = run_cf_ok(tmp.path(), &["run", "show", "site-1"]);
    assert!(out.starts_with("site-1: 0/1 tasks complete"));
    assert!(out.contains("1 stale entries"));

    // Stale state is kept until pruned explicitly
    let inst = read_json(&tmp.path().join("checklist/instances/site-1.json"));
    assert_eq!(inst["taskState"]["t-2"]["completed"], true);

    let out = run_cf_ok(tmp.path(), &["run", "prune", "site-1"]);
    assert!(out.starts_with("pruned 1 stale entries"));
    let inst = read_json(&tmp.path().join("checklist/instances/site-1.json"));
    assert!(inst["taskState"].get("t-2").is_none());
}

#[test]
fn test_run_show_json() {
    let tmp = init_project();
    run_cf_ok(tmp.path(), &["run", "done", "site-1", "t-2"]);
    let out = run_cf_ok(tmp.path(), &["--json", "run", "show", "site-1"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["progress"]["completed"], 1);
    assert_eq!(parsed["progress"]["total"], 2);
    assert_eq!(parsed["tasks"][1]["id"], "t-2");
    assert_eq!(parsed["tasks"][1]["completed"], true);
}

#[test]
fn test_run_malformed_instance() {
    let tmp = init_project();
    fs::write(tmp.path().join("checklist/instances/site-1.json"), "nope").unwrap();
    let (stdout, stderr, success) = run_cf(tmp.path(), &["run", "show", "site-1"]);
    assert!(success);
    assert!(stderr.contains("warning: instance 'site-1' could not be read"));
    assert!(stdout.starts_with("site-1: 0/2 tasks complete"));
}

#[test]
fn test_check_with_malformed_instance() {
    let tmp = init_project();
    fs::write(tmp.path().join("checklist/instances/site-1.json"), "nope").unwrap();
    let (stdout, stderr, success) = run_cf(tmp.path(), &["check", "--instance", "site-1"]);
    assert!(success, "stderr: {}", stderr);
    assert!(stderr.contains("warning: instance 'site-1' could not be read"));
    assert!(stdout.contains("template is valid"));
}

#[test]
fn test_check_reports_stale_instance_entries() {
    let tmp = init_project();
    fs::write(
        tmp.path().join("checklist/instances/site-1.json"),
        r#"{"taskState":{"t-1":{"completed":true},"gone":{}}}"#,
    )
    .unwrap();
    let out = run_cf_ok(tmp.path(), &["check", "--instance", "site-1"]);
    assert!(out.contains("instance has state for unknown task gone"));
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[test]
fn test_recovery_empty_and_prune() {
    let tmp = init_project();
    let out = run_cf_ok(tmp.path(), &["recovery"]);
    assert_eq!(out.trim(), "recovery log is empty");

    run_cf_ok(tmp.path(), &["rm", "1.1.1", "--yes"]);
    let out = run_cf_ok(tmp.path(), &["--json", "recovery"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 1);
    assert_eq!(parsed[0]["category"], "delete");

    let out = run_cf_ok(tmp.path(), &["recovery", "prune", "--all"]);
    assert_eq!(out.trim(), "pruned 1 recovery entries");

    let out = run_cf_ok(tmp.path(), &["recovery", "path"]);
    assert!(out.trim().ends_with(".recovery.log"));
}
