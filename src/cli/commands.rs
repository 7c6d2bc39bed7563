use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tb", about = concat!("taskboard v", env!("CARGO_PKG_VERSION"), " - kanban tasks, synced through a shared folder"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory
    #[arg(short = 'D', long = "data-dir", global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory with the default columns
    Init,
    /// Project management
    Project(ProjectCmd),
    /// Column management
    Column(ColumnCmd),
    /// Label management
    Label(LabelCmd),
    /// Add a task
    Add(AddArgs),
    /// Add a subtask under an existing task
    Sub(SubArgs),
    /// Show the board, column by column
    List(ListArgs),
    /// Show task details
    Show(IdArg),
    /// Edit task fields
    Edit(EditArgs),
    /// Mark a task and its subtasks completed
    Done(IdArg),
    /// Mark a task and its subtasks not completed
    Undone(IdArg),
    /// Move a task to another column
    Mv(MvArgs),
    /// Reorder the tasks of one column, or the subtasks of one task
    Reorder(ReorderArgs),
    /// Move a task under another task, or back to the top level
    Parent(ParentArgs),
    /// Move a task to the trash
    Trash(IdArg),
    /// Take a task out of the trash
    Restore(IdArg),
    /// Permanently delete a task and its subtasks
    Delete(IdArg),
    /// Derived task views
    View(ViewCmd),
    /// Search task titles and descriptions by regex
    Search(SearchArgs),
    /// Shared-folder sync
    Sync(SyncCmd),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
    /// Edit config.toml
    Config(ConfigCmd),
}

#[derive(Args)]
pub struct IdArg {
    /// Task ID
    pub id: String,
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ProjectCmd {
    #[command(subcommand)]
    pub action: ProjectAction,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project
    Add(NamedColorArgs),
    /// List projects
    List,
    /// Change a project's name, colour or icon
    Edit(ProjectEditArgs),
    /// Delete a project (its tasks are kept)
    Rm(RefArg),
    /// Set the project order: every project id, in the new order
    Mv(OrderArgs),
    /// Set the project new tasks go to, or clear it with no argument
    Use(UseArgs),
}

#[derive(Args)]
pub struct NamedColorArgs {
    pub name: String,
    /// Colour name (default: next palette colour)
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct ProjectEditArgs {
    /// Project ID or name
    pub project: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long, conflicts_with = "clear_icon")]
    pub icon: Option<String>,
    #[arg(long)]
    pub clear_icon: bool,
}

#[derive(Args)]
pub struct RefArg {
    /// ID or name
    pub target: String,
}

#[derive(Args)]
pub struct OrderArgs {
    /// IDs or names, in the new order
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct UseArgs {
    /// Project ID or name
    pub project: Option<String>,
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ColumnCmd {
    #[command(subcommand)]
    pub action: ColumnAction,
}

#[derive(Subcommand)]
pub enum ColumnAction {
    /// Create a column at the end of the board
    Add(ColumnAddArgs),
    /// List columns with their designations
    List,
    /// Rename a column
    Rename(ColumnRenameArgs),
    /// Delete a column
    Rm(RefArg),
    /// Set the column order: every column id, in the new order
    Mv(OrderArgs),
    /// Make a column the completed column
    Done(RefArg),
    /// Toggle whether a column counts as in progress
    Progress(RefArg),
}

#[derive(Args)]
pub struct ColumnAddArgs {
    pub name: String,
}

#[derive(Args)]
pub struct ColumnRenameArgs {
    /// Column ID or name
    pub column: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LabelCmd {
    #[command(subcommand)]
    pub action: LabelAction,
}

#[derive(Subcommand)]
pub enum LabelAction {
    /// Create a label
    Add(NamedColorArgs),
    /// List labels
    List,
    /// Delete a label and remove it from all tasks
    Rm(RefArg),
    /// Set the label order: every label id, in the new order
    Mv(OrderArgs),
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Optional task fields shared by add and sub
#[derive(Args)]
pub struct TaskFieldArgs {
    /// Description (markdown)
    #[arg(short, long)]
    pub description: Option<String>,
    /// negligible, low, medium, high or urgent
    #[arg(long)]
    pub priority: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,
    /// Label ID or name (repeatable)
    #[arg(short, long = "label")]
    pub labels: Vec<String>,
}

#[derive(Args)]
pub struct AddArgs {
    pub title: String,
    /// Project ID or name (default: the active project)
    #[arg(short, long)]
    pub project: Option<String>,
    /// Column ID or name (default: draft.default_column from config)
    #[arg(short, long)]
    pub column: Option<String>,
    #[command(flatten)]
    pub fields: TaskFieldArgs,
}

#[derive(Args)]
pub struct SubArgs {
    /// Parent task ID
    pub parent: String,
    pub title: String,
    #[command(flatten)]
    pub fields: TaskFieldArgs,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only this project (ID or name)
    #[arg(short, long)]
    pub project: Option<String>,
    /// Only this column (ID or name)
    #[arg(short, long)]
    pub column: Option<String>,
    /// Include trashed tasks
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(short, long, conflicts_with = "clear_description")]
    pub description: Option<String>,
    #[arg(long)]
    pub clear_description: bool,
    #[arg(long, conflicts_with = "clear_priority")]
    pub priority: Option<String>,
    #[arg(long)]
    pub clear_priority: bool,
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    #[arg(long)]
    pub clear_due: bool,
    #[arg(long, conflicts_with = "clear_start")]
    pub start: Option<String>,
    #[arg(long)]
    pub clear_start: bool,
    #[arg(long)]
    pub location: Option<String>,
    /// Move to another project (ID or name)
    #[arg(short, long)]
    pub project: Option<String>,
    /// Move to another column (ID or name)
    #[arg(short, long)]
    pub column: Option<String>,
    /// Replace the label set (repeatable)
    #[arg(short, long = "label")]
    pub labels: Vec<String>,
    /// Remove all labels
    #[arg(long, conflicts_with = "labels")]
    pub clear_labels: bool,
}

#[derive(Args)]
pub struct MvArgs {
    /// Task ID
    pub id: String,
    /// Target column ID or name
    pub column: String,
    /// Position in the target column (0 = top)
    #[arg(long)]
    pub index: Option<usize>,
}

#[derive(Args)]
pub struct ReorderArgs {
    /// Every task of one column (or every subtask of one task), in the new order
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct ParentArgs {
    /// Task ID
    pub id: String,
    /// New parent task ID (omit to make it a top-level task)
    pub parent: Option<String>,
}

// ---------------------------------------------------------------------------
// Views and search
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ViewCmd {
    #[command(subcommand)]
    pub view: ViewKind,
}

#[derive(Subcommand)]
pub enum ViewKind {
    /// Open tasks starting today
    Today,
    /// Open tasks starting in the next few days
    Upcoming(UpcomingArgs),
    /// Open tasks in progressing columns
    Progressing,
    /// Completed tasks
    Completed,
    /// Trashed tasks
    Trashed,
    /// Tasks starting or due within a date range
    Calendar(CalendarArgs),
}

#[derive(Args)]
pub struct UpcomingArgs {
    /// Window length in days (default: views.upcoming_days from config)
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Args)]
pub struct CalendarArgs {
    /// First day (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub from: Option<String>,
    /// Last day (YYYY-MM-DD, default: 6 days after --from)
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern
    pub pattern: String,
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SyncCmd {
    #[command(subcommand)]
    pub action: SyncAction,
}

#[derive(Subcommand)]
pub enum SyncAction {
    /// Sync through a folder: load its file if present, otherwise create it
    Folder(FolderArgs),
    /// Write the shared file now
    Now,
    /// Show sync folder, last sync and last error
    Status,
    /// Stop syncing and forget the folder
    Stop,
    /// Keep running, reloading whenever another device writes the file
    Watch,
}

#[derive(Args)]
pub struct FolderArgs {
    pub path: String,
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

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set a value, e.g. `tb config set views.upcoming_days 7`
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// section.key
    pub key: String,
    pub value: String,
}
