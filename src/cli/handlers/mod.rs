mod init;
pub use init::cmd_init;

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::fs_store::{FsStore, validate_key};
use crate::io::project_io::{self, ProjectError};
use crate::io::recovery;
use crate::model::ids::{NodeKind, RandomIds, TaskId};
use crate::model::instance::TaskState;
use crate::model::project::Project;
use crate::model::template::Template;
use crate::ops::template_ops::{self, NodePath, ParentPath};
use crate::ops::{check, clean};
use crate::session::runner::load_or_recover;
use crate::session::{Draft, LoadOutcome, Runner};
use crate::util::unicode::{single_line, truncate_to_width};

type CmdResult = Result<(), Box<dyn Error>>;

/// Where the command runs and how it reports
struct Ctx {
    start: PathBuf,
    json: bool,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let start = match cli.project_dir {
        Some(ref dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir()?,
    };
    let ctx = Ctx {
        start,
        json: cli.json,
    };

    match cli.command {
        Commands::Init(args) => cmd_init(args, &ctx.start),

        // Read commands
        Commands::Show(args) => cmd_show(args, &ctx),
        Commands::Check(args) => cmd_check(args, &ctx),

        // Draft edits
        Commands::Add(args) => cmd_add(args, &ctx),
        Commands::Dup(args) => cmd_dup(args, &ctx),
        Commands::Rm(args) => cmd_rm(args, &ctx),
        Commands::Up(args) => cmd_move(args, Direction::Up, &ctx),
        Commands::Down(args) => cmd_move(args, Direction::Down, &ctx),
        Commands::Title(args) => cmd_set_field(args, Field::Title, &ctx),
        Commands::Text(args) => cmd_set_field(args, Field::Text, &ctx),
        Commands::Note(args) => cmd_set_field(args, Field::Note, &ctx),
        Commands::Collapse(args) => cmd_collapse(args, &ctx),

        // Publishing and draft management
        Commands::Export(args) => cmd_export(args, &ctx),
        Commands::Draft(cmd) => match cmd.action {
            DraftAction::Use(args) => cmd_draft_use(args, &ctx),
            DraftAction::Reset(args) => cmd_draft_reset(args, &ctx),
            DraftAction::List => cmd_draft_list(&ctx),
        },

        // Instances
        Commands::Run(cmd) => cmd_run(cmd, &ctx),

        // Maintenance
        Commands::Recovery(cmd) => cmd_recovery(cmd, &ctx),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_project(ctx: &Ctx) -> Result<Project, ProjectError> {
    let root = project_io::discover_project(&ctx.start)?;
    project_io::load_project(&root)
}

/// Open the active draft. The published template is the fallback when the
/// draft does not exist yet or cannot be read.
fn open_draft(project: &Project) -> Result<Draft<FsStore>, Box<dyn Error>> {
    let default = project_io::load_published(project)?;
    let key = &project.config.template.draft;
    let (draft, outcome) = Draft::open(FsStore::new(&project.dir), key, &default)?;
    if outcome == LoadOutcome::Recovered {
        eprintln!(
            "warning: draft '{}' could not be read and was reset to the published template (see `cf recovery`)",
            key
        );
    }
    Ok(draft.with_ids(RandomIds::with_prefixes(project.config.ids.clone())))
}

/// A node by dotted position or by id
fn resolve_node(template: &Template, arg: &str) -> Result<NodePath, Box<dyn Error>> {
    if let Ok(path) = arg.parse::<NodePath>() {
        return Ok(path);
    }
    template_ops::find_path(template, arg)
        .ok_or_else(|| format!("no node at position or with id '{}'", arg).into())
}

/// An insertion parent: `root`, a dotted position, or the id of a section or subsection
fn resolve_parent(template: &Template, arg: &str) -> Result<ParentPath, Box<dyn Error>> {
    if let Ok(parent) = arg.parse::<ParentPath>() {
        return Ok(parent);
    }
    match template_ops::find_path(template, arg) {
        Some(NodePath::Task(..)) => Err(format!("'{}' is a task; tasks have no children", arg).into()),
        Some(path) => Ok(ParentPath::from(path)),
        None => Err(format!("no section or subsection at position or with id '{}'", arg).into()),
    }
}

/// A task id from a dotted position or an id. Unknown ids are passed through
/// so the runner can reject them.
fn resolve_task(template: &Template, arg: &str) -> Result<TaskId, Box<dyn Error>> {
    match arg.parse::<NodePath>() {
        Ok(path @ NodePath::Task(..)) => node_id(template, path)
            .map(TaskId::new)
            .ok_or_else(|| format!("no task at {}", path).into()),
        Ok(path) => Err(format!("{} is a {}, not a task", path, path.kind()).into()),
        Err(_) => Ok(TaskId::from(arg)),
    }
}

fn node_label(template: &Template, path: NodePath) -> String {
    let text = match path {
        NodePath::Section(s) => template.sections.get(s).map(|n| n.title.clone()),
        NodePath::Subsection(s, j) => template
            .sections
            .get(s)
            .and_then(|n| n.subsections.get(j))
            .map(|n| n.title.clone()),
        NodePath::Task(s, j, k) => template
            .sections
            .get(s)
            .and_then(|n| n.subsections.get(j))
            .and_then(|n| n.tasks.get(k))
            .map(|n| n.text.clone()),
    };
    truncate_to_width(&single_line(&text.unwrap_or_default()), 50)
}

/// Ask on stderr, read y/n from stdin. Anything but `y` declines.
fn confirm(prompt: &str) -> std::io::Result<bool> {
    eprint!("{} [y/n] ", prompt);
    std::io::stderr().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_node(template: &Template, path: NodePath, ctx: &Ctx) -> CmdResult {
    let node = node_to_json(template, path);
    if ctx.json {
        return print_json(&node);
    }
    println!("{} {}", node.path, node.id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_show(args: ShowArgs, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let template = if args.published {
        project_io::load_published(&project)?
    } else {
        open_draft(&project)?.template().clone()
    };

    if ctx.json {
        return print_json(&template);
    }
    let opts = TreeOptions {
        show_ids: args.ids,
        expand: args.expand,
        ..TreeOptions::default()
    };
    for line in format_template_tree(&template, opts) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_check(args: CheckArgs, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let draft = open_draft(&project)?;
    let result = match args.instance {
        Some(ref id) => {
            validate_key(id)?;
            let (instance, recovered) = load_or_recover(&mut FsStore::new(&project.dir), id)?;
            if recovered {
                eprintln!(
                    "warning: instance '{}' could not be read and was checked as empty (see `cf recovery`)",
                    id
                );
            }
            check::check_with_instance(draft.template(), &project.config.ids, &instance)
        }
        None => check::check_template(draft.template(), &project.config.ids),
    };

    if ctx.json {
        return print_json(&result);
    }
    for line in format_check_result(&result) {
        println!("{}", line);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Draft edit handlers
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let mut draft = open_draft(&project)?;
    let parent = resolve_parent(draft.template(), &args.parent)?;

    let is_task = parent.child_kind() == NodeKind::Task;
    if is_task && args.title.is_some() {
        return Err("--title is for sections and subsections; use --text for a task".into());
    }
    if !is_task && (args.text.is_some() || args.note.is_some()) {
        return Err(format!(
            "--text and --note are for tasks; a {} takes --title",
            parent.child_kind()
        )
        .into());
    }

    let path = draft.add(parent)?;
    if let Some(title) = args.title {
        draft.set_title(path, title)?;
    }
    if let Some(text) = args.text {
        draft.set_task_text(path, text)?;
    }
    if let Some(note) = args.note {
        draft.set_task_note(path, note)?;
    }
    print_node(draft.template(), path, ctx)
}

fn cmd_dup(args: PathArg, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let mut draft = open_draft(&project)?;
    let path = resolve_node(draft.template(), &args.path)?;
    let copy = draft.duplicate(path)?;
    print_node(draft.template(), copy, ctx)
}

fn cmd_rm(args: RmArgs, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let mut draft = open_draft(&project)?;
    let path = resolve_node(draft.template(), &args.path)?;

    if !args.yes {
        let prompt = format!(
            "Delete {} {} \"{}\" and everything under it?",
            path.kind(),
            path,
            node_label(draft.template(), path)
        );
        if !confirm(&prompt)? {
            println!("cancelled");
            return Ok(());
        }
    }

    let removed = draft.delete(path)?;
    if ctx.json {
        return print_json(&removed_to_json(path, &removed));
    }
    println!("{}", format_removed(path, &removed));
    Ok(())
}

#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}

fn cmd_move(args: PathArg, direction: Direction, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let mut draft = open_draft(&project)?;
    let path = resolve_node(draft.template(), &args.path)?;

    let (moved, new_path) = match direction {
        Direction::Up => {
            let moved = draft.move_up(path)?;
            (moved, shifted(path, moved, -1))
        }
        Direction::Down => {
            let moved = draft.move_down(path)?;
            (moved, shifted(path, moved, 1))
        }
    };

    if ctx.json {
        return print_json(&MoveJson {
            moved,
            path: new_path.to_string(),
        });
    }
    if moved {
        println!("{} -> {}", path, new_path);
    } else {
        println!("{} unchanged", path);
    }
    Ok(())
}

fn shifted(path: NodePath, moved: bool, delta: isize) -> NodePath {
    if !moved {
        return path;
    }
    let index = path.index().saturating_add_signed(delta);
    match path {
        NodePath::Section(_) => NodePath::Section(index),
        NodePath::Subsection(s, _) => NodePath::Subsection(s, index),
        NodePath::Task(s, j, _) => NodePath::Task(s, j, index),
    }
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Text,
    Note,
}

fn cmd_set_field(args: SetTextArgs, field: Field, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let mut draft = open_draft(&project)?;
    let path = resolve_node(draft.template(), &args.path)?;
    match field {
        Field::Title => draft.set_title(path, args.text)?,
        Field::Text => draft.set_task_text(path, args.text)?,
        Field::Note => draft.set_task_note(path, args.text)?,
    }
    print_node(draft.template(), path, ctx)
}

fn cmd_collapse(args: PathArg, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let mut draft = open_draft(&project)?;
    let path = resolve_node(draft.template(), &args.path)?;
    let collapsed = draft.toggle_collapsed(path)?;

    if ctx.json {
        return print_json(&serde_json::json!({
            "path": path.to_string(),
            "collapsed": collapsed,
        }));
    }
    println!("{} {}", if collapsed { "collapsed" } else { "expanded" }, path);
    Ok(())
}

// ---------------------------------------------------------------------------
// Publishing and draft management
// ---------------------------------------------------------------------------

fn cmd_export(args: ExportArgs, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let mut draft = open_draft(&project)?;

    if args.bump && !args.dry_run {
        let mut bumped = draft.template().clone();
        bumped.version += 1;
        draft.replace(bumped)?;
    }
    let mut clean = clean::build_clean_template(draft.template());
    if args.bump && args.dry_run {
        clean.version += 1;
    }
    let content = clean::export_json(&clean)?;

    if args.dry_run {
        print!("{}", content);
        return Ok(());
    }

    let target = match args.out {
        Some(ref out) => ctx.start.join(out),
        None => project.published_path(),
    };
    project_io::save_published(&project, &target, &content)?;

    if ctx.json {
        return print_json(&serde_json::json!({
            "path": target.display().to_string(),
            "version": clean.version,
            "sections": clean.sections.len(),
            "subsections": clean.subsection_count(),
            "tasks": clean.task_count(),
        }));
    }
    println!(
        "exported {} v{} to {} ({} tasks)",
        clean.id,
        clean.version,
        target.display(),
        clean.task_count()
    );
    Ok(())
}

fn cmd_draft_use(args: DraftKeyArg, ctx: &Ctx) -> CmdResult {
    validate_key(&args.key)?;
    let project = load_project(ctx)?;
    let (_config, mut doc) = config_io::read_config(&project.dir)?;
    config_io::set_active_draft(&mut doc, &args.key);
    config_io::write_config(&project.dir, &doc)?;
    println!("active draft: {}", args.key);
    Ok(())
}

fn cmd_draft_reset(args: ResetArgs, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let mut draft = open_draft(&project)?;
    if !args.yes && !confirm(&format!("Discard all edits in draft '{}'?", draft.key()))? {
        println!("cancelled");
        return Ok(());
    }
    draft.replace(project_io::load_published(&project)?)?;
    println!("draft {} reset to the published template", draft.key());
    Ok(())
}

fn cmd_draft_list(ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let active = &project.config.template.draft;
    let mut keys = list_drafts(&project.dir.join("drafts"))?;
    if !keys.contains(active) {
        keys.push(active.clone());
        keys.sort();
    }

    if ctx.json {
        return print_json(&serde_json::json!({ "active": active, "drafts": keys }));
    }
    for key in keys {
        let marker = if &key == active { "*" } else { " " };
        println!("{} {}", marker, key);
    }
    Ok(())
}

fn list_drafts(dir: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut keys = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            keys.push(stem.to_string());
        }
    }
    keys.sort();
    Ok(keys)
}

// ---------------------------------------------------------------------------
// Instance handlers
// ---------------------------------------------------------------------------

fn cmd_run(cmd: RunCmd, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;
    let template = project_io::load_published(&project)?;
    let instance = match &cmd.action {
        RunAction::Show(a) | RunAction::Prune(a) => a.instance.clone(),
        RunAction::Done(a) | RunAction::Undo(a) | RunAction::Toggle(a) => a.instance.clone(),
        RunAction::Note(a) => a.instance.clone(),
    };
    validate_key(&instance)?;

    let (mut runner, outcome) = Runner::open(&template, FsStore::new(&project.dir), &instance)?;
    if outcome == LoadOutcome::Recovered {
        eprintln!(
            "warning: instance '{}' could not be read and starts empty (see `cf recovery`)",
            instance
        );
    }

    match cmd.action {
        RunAction::Show(_) => {
            let stale: Vec<String> = runner.stale()?.iter().map(TaskId::to_string).collect();
            if ctx.json {
                return print_json(&run_view_to_json(&instance, runner.view(), &stale));
            }
            for line in format_run_tree(&instance, runner.view(), DEFAULT_WIDTH) {
                println!("{}", line);
            }
            if !stale.is_empty() {
                println!(
                    "({} stale entries for removed tasks; `cf run prune {}` drops them)",
                    stale.len(),
                    instance
                );
            }
            Ok(())
        }
        RunAction::Done(a) => {
            let task = resolve_task(&template, &a.task)?;
            let state = runner.set_completed(&task, true)?;
            print_task_state(&task, &state, ctx)
        }
        RunAction::Undo(a) => {
            let task = resolve_task(&template, &a.task)?;
            let state = runner.set_completed(&task, false)?;
            print_task_state(&task, &state, ctx)
        }
        RunAction::Toggle(a) => {
            let task = resolve_task(&template, &a.task)?;
            let state = runner.toggle(&task)?;
            print_task_state(&task, &state, ctx)
        }
        RunAction::Note(a) => {
            let task = resolve_task(&template, &a.task)?;
            let state = runner.set_note(&task, a.text)?;
            print_task_state(&task, &state, ctx)
        }
        RunAction::Prune(_) => {
            let removed: Vec<String> = runner.prune()?.iter().map(TaskId::to_string).collect();
            if ctx.json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("pruned {} stale entries", removed.len());
            for id in removed {
                println!("  {}", id);
            }
            Ok(())
        }
    }
}

fn print_task_state(task: &TaskId, state: &TaskState, ctx: &Ctx) -> CmdResult {
    if ctx.json {
        return print_json(&serde_json::json!({
            "id": task.as_str(),
            "completed": state.completed,
            "note": state.note,
        }));
    }
    let mark = if state.completed { "[x]" } else { "[ ]" };
    println!("{} {}", mark, task);
    Ok(())
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, Box<dyn Error>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e).into())
}

fn cmd_recovery(cmd: RecoveryCmd, ctx: &Ctx) -> CmdResult {
    let project = load_project(ctx)?;

    match cmd.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(&project.dir).display());
            Ok(())
        }
        Some(RecoveryAction::Prune(args)) => {
            let before = args.before.as_deref().map(parse_timestamp).transpose()?;
            let removed = recovery::prune_recovery(&project.dir, before, args.all)?;
            println!("pruned {} recovery entries", removed);
            Ok(())
        }
        None => {
            let since = cmd.since.as_deref().map(parse_timestamp).transpose()?;
            let limit = cmd.limit.unwrap_or(10);
            let entries: Vec<_> = recovery::read_recovery_entries(&project.dir, None)
                .into_iter()
                .filter(|e| since.is_none_or(|ts| e.timestamp > ts))
                .take(limit)
                .collect();

            if ctx.json {
                let values: Vec<_> = entries.iter().map(|e| e.to_json()).collect();
                return print_json(&values);
            }
            if entries.is_empty() {
                println!("recovery log is empty");
                return Ok(());
            }
            for (i, entry) in entries.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                for line in format_recovery_entry(entry) {
                    println!("{}", line);
                }
            }
            Ok(())
        }
    }
}
