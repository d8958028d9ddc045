use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cf", about = concat!("checkforge v", env!("CARGO_PKG_VERSION"), " - checklist templates and the instances run against them"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a checklist project in the current directory
    Init(InitArgs),
    /// Show the draft template as a tree
    Show(ShowArgs),
    /// Validate the draft template
    Check(CheckArgs),
    /// Append a section (parent "root"), subsection (parent "S") or task (parent "S.J")
    Add(AddArgs),
    /// Duplicate a node and its subtree right after itself
    Dup(PathArg),
    /// Delete a node and its subtree
    Rm(RmArgs),
    /// Move a node one place up among its siblings
    Up(PathArg),
    /// Move a node one place down among its siblings
    Down(PathArg),
    /// Set the title of a section or subsection
    Title(SetTextArgs),
    /// Set the text of a task
    Text(SetTextArgs),
    /// Set the guidance note of a task
    Note(SetTextArgs),
    /// Collapse or expand a section or subsection
    Collapse(PathArg),
    /// Clean the draft and publish it as the template
    Export(ExportArgs),
    /// Switch or reset the active draft
    Draft(DraftCmd),
    /// Work through an instance of the template
    Run(RunCmd),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Project name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Reinitialize even if checklist/ already exists
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    /// Show node ids next to positions
    #[arg(long)]
    pub ids: bool,
    /// Show the published template instead of the draft
    #[arg(long)]
    pub published: bool,
    /// Show the contents of collapsed sections and subsections
    #[arg(long)]
    pub expand: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Also report stale entries in this instance
    #[arg(long)]
    pub instance: Option<String>,
}

// ---------------------------------------------------------------------------
// Draft edit args
// ---------------------------------------------------------------------------

/// A node given by dotted position (`2.1.3`) or id
#[derive(Args)]
pub struct PathArg {
    /// Node position (e.g. 2.1) or id
    pub path: String,
}

#[derive(Args)]
pub struct AddArgs {
    /// "root", a section (2) or a subsection (2.1), by position or id
    pub parent: String,
    /// Title for a new section or subsection
    #[arg(long)]
    pub title: Option<String>,
    /// Text for a new task
    #[arg(long)]
    pub text: Option<String>,
    /// Guidance note for a new task
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args)]
pub struct RmArgs {
    /// Node position (e.g. 2.1) or id
    pub path: String,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct SetTextArgs {
    /// Node position (e.g. 2.1.3) or id
    pub path: String,
    /// New value
    pub text: String,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Write to this file instead of the configured published template
    #[arg(long)]
    pub out: Option<String>,
    /// Increment the template version before exporting
    #[arg(long)]
    pub bump: bool,
    /// Print the cleaned template instead of writing it
    #[arg(long)]
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Draft management
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct DraftCmd {
    #[command(subcommand)]
    pub action: DraftAction,
}

#[derive(Subcommand)]
pub enum DraftAction {
    /// Make <key> the active draft (created from the published template on first edit)
    Use(DraftKeyArg),
    /// Replace the active draft with the published template
    Reset(ResetArgs),
    /// List stored drafts
    List,
}

#[derive(Args)]
pub struct DraftKeyArg {
    /// Draft key (letters, digits, '-' and '_')
    pub key: String,
}

#[derive(Args)]
pub struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

// ---------------------------------------------------------------------------
// Instance runs
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RunCmd {
    #[command(subcommand)]
    pub action: RunAction,
}

#[derive(Subcommand)]
pub enum RunAction {
    /// Show the template with this instance's progress
    Show(InstanceArg),
    /// Mark a task completed
    Done(RunTaskArgs),
    /// Mark a task not completed
    Undo(RunTaskArgs),
    /// Flip a task's completion
    Toggle(RunTaskArgs),
    /// Set the runner note on a task
    Note(RunNoteArgs),
    /// Remove entries for tasks no longer in the template
    Prune(InstanceArg),
}

#[derive(Args)]
pub struct InstanceArg {
    /// Instance id (letters, digits, '-' and '_')
    pub instance: String,
}

#[derive(Args)]
pub struct RunTaskArgs {
    /// Instance id
    pub instance: String,
    /// Task position (e.g. 1.1.2) or id
    pub task: String,
}

#[derive(Args)]
pub struct RunNoteArgs {
    /// Instance id
    pub instance: String,
    /// Task position (e.g. 1.1.2) or id
    pub task: String,
    /// Note text
    pub text: String,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Show entries after this timestamp (ISO-8601)
    #[arg(long)]
    pub since: Option<String>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
