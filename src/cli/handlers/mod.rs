mod init;
pub use init::cmd_init;

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use regex::Regex;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::lock::DataLock;
use crate::io::recovery;
use crate::io::state;
use crate::io::sync::{FsStorage, SyncEngine, SyncRequest};
use crate::io::watcher::SyncWatcher;
use crate::model::board::{Board, ChangeEvent};
use crate::model::column::ColumnPatch;
use crate::model::config::Config;
use crate::model::project::ProjectPatch;
use crate::model::task::{Task, TaskPatch};
use crate::ops::draft::{NewTaskDefaults, TaskModal, Validation};
use crate::ops::views;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let dir = data_dir(cli.data_dir.as_deref())?;

    // bare `tb` shows the board
    let command = cli.command.unwrap_or(Commands::List(ListArgs {
        project: None,
        column: None,
        all: false,
    }));

    match command {
        // these manage files directly rather than the board
        Commands::Init => cmd_init(&dir),
        Commands::Recovery(args) => cmd_recovery(&dir, args, json),
        Commands::Config(args) => cmd_config(&dir, args),
        Commands::Sync(SyncCmd {
            action: SyncAction::Watch,
        }) => cmd_sync_watch(&dir),

        command => {
            let mut session = Session::open(&dir)?;
            run(&mut session, command, json)?;
            session.finish()
        }
    }
}

fn run(s: &mut Session, command: Commands, json: bool) -> CmdResult {
    match command {
        Commands::Project(args) => cmd_project(s, args.action, json),
        Commands::Column(args) => cmd_column(s, args.action, json),
        Commands::Label(args) => cmd_label(s, args.action, json),

        // Read commands
        Commands::List(args) => cmd_list(s, args, json),
        Commands::Show(args) => cmd_show(s, args, json),
        Commands::View(args) => cmd_view(s, args.view, json),
        Commands::Search(args) => cmd_search(s, args, json),

        // Write commands
        Commands::Add(args) => cmd_add(s, args),
        Commands::Sub(args) => cmd_sub(s, args),
        Commands::Edit(args) => cmd_edit(s, args),
        Commands::Done(args) => cmd_set_completed(s, args, true),
        Commands::Undone(args) => cmd_set_completed(s, args, false),
        Commands::Mv(args) => cmd_mv(s, args),
        Commands::Reorder(args) => cmd_reorder(s, args),
        Commands::Parent(args) => cmd_parent(s, args),
        Commands::Trash(args) => cmd_trash(s, args, true),
        Commands::Restore(args) => cmd_trash(s, args, false),
        Commands::Delete(args) => cmd_delete(s, args),

        Commands::Sync(args) => cmd_sync(s, args.action, json),

        Commands::Init | Commands::Recovery(_) | Commands::Config(_) => {
            unreachable!("handled in dispatch")
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Data directory: --data-dir, then $TASKBOARD_DIR, then
/// $XDG_DATA_HOME/taskboard, then ~/.local/share/taskboard.
pub fn data_dir(flag: Option<&str>) -> Result<PathBuf, String> {
    if let Some(dir) = flag {
        return Ok(PathBuf::from(dir));
    }
    let non_empty = |name: &str| env::var_os(name).filter(|v| !v.is_empty());
    if let Some(dir) = non_empty("TASKBOARD_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join("taskboard"));
    }
    non_empty("HOME")
        .map(|home| PathBuf::from(home).join(".local/share/taskboard"))
        .ok_or_else(|| "cannot find a data directory; pass --data-dir or set TASKBOARD_DIR".to_string())
}

/// One locked run over the data directory: load, sync in, mutate, sync out, save.
struct Session {
    dir: PathBuf,
    config: Config,
    board: Board,
    engine: SyncEngine,
    /// Any event here means the board differs from the store files.
    changes: mpsc::Receiver<ChangeEvent>,
    _lock: DataLock,
}

impl Session {
    fn open(dir: &Path) -> Result<Session, Box<dyn std::error::Error>> {
        fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
        let lock = DataLock::acquire_default(dir)?;
        let (config, _) = config_io::read_config(dir)?;
        let mut board = state::load_board(dir);
        let changes = board.subscribe();

        let mut engine = SyncEngine::new(Arc::new(FsStorage))
            .with_file_name(&config.sync.file_name)
            .with_recovery_dir(dir);
        engine.restore(&state::load_sync_settings(dir));
        if config.sync.auto_sync && engine.folder().is_some() {
            engine.init_sync(&mut board);
        }

        Ok(Session {
            dir: dir.to_path_buf(),
            config,
            board,
            engine,
            changes,
            _lock: lock,
        })
    }

    /// Push pending changes to the sync file, then persist the board if
    /// anything changed. Read-only runs leave the store files untouched.
    fn finish(mut self) -> CmdResult {
        self.engine.wait_idle();
        self.engine.poll(&self.board);
        self.engine.wait_idle();
        if self.changes.try_iter().count() > 0 {
            state::save_board(&self.dir, &self.board)?;
        }
        state::save_sync_settings(&self.dir, &self.engine.settings())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn find_task<'a>(board: &'a Board, id: &str) -> Result<&'a Task, String> {
    board
        .tasks()
        .get(id)
        .ok_or_else(|| format!("task not found: {}", id))
}

fn resolve_project(board: &Board, id_or_name: &str) -> Result<String, String> {
    board
        .projects()
        .resolve(id_or_name)
        .map(|p| p.id.clone())
        .ok_or_else(|| format!("project not found: {}", id_or_name))
}

fn resolve_column(board: &Board, id_or_name: &str) -> Result<String, String> {
    board
        .columns()
        .resolve(id_or_name)
        .map(|c| c.id.clone())
        .ok_or_else(|| format!("column not found: {} (run `tb init` to create the default columns)", id_or_name))
}

fn resolve_labels(board: &Board, refs: &[String]) -> Result<Vec<String>, String> {
    refs.iter()
        .map(|r| {
            board
                .labels()
                .resolve(r)
                .map(|l| l.id.clone())
                .ok_or_else(|| format!("label not found: {}", r))
        })
        .collect()
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    views::parse_date(value).ok_or_else(|| format!("invalid date '{}' (expected YYYY-MM-DD)", value))
}

/// A task date field, validated but stored as given.
fn date_arg(value: &str) -> Result<String, String> {
    parse_day(value).map(|_| value.to_string())
}

fn print_task_list(board: &Board, tasks: &[&Task], json: bool) -> CmdResult {
    if json {
        let out: Vec<TaskJson> = tasks.iter().map(|t| task_to_json(board.tasks(), t)).collect();
        return print_json(&out);
    }
    for task in tasks {
        println!("{}", format_task_line(task, board.labels()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Projects, columns, labels
// ---------------------------------------------------------------------------

fn cmd_project(s: &mut Session, action: ProjectAction, json: bool) -> CmdResult {
    let board = &mut s.board;
    match action {
        ProjectAction::Add(args) => {
            let id = board.add_project(&args.name, args.color.as_deref());
            println!("{}", id);
        }
        ProjectAction::List => {
            let active = board.projects().active_project_id();
            let count = |id: &str| {
                board
                    .tasks()
                    .by_project(id)
                    .iter()
                    .filter(|t| !t.trashed())
                    .count()
            };
            if json {
                let out: Vec<ProjectInfoJson> = board
                    .projects()
                    .iter()
                    .map(|p| project_to_json(p, active == Some(p.id.as_str()), count(&p.id)))
                    .collect();
                return print_json(&out);
            }
            for p in board.projects().iter() {
                println!("{}", format_project_info(p, active == Some(p.id.as_str()), count(&p.id)));
            }
        }
        ProjectAction::Edit(args) => {
            let id = resolve_project(board, &args.project)?;
            let icon = if args.clear_icon {
                Some(None)
            } else {
                args.icon.map(Some)
            };
            board.update_project(
                &id,
                ProjectPatch {
                    name: args.name,
                    color: args.color,
                    icon,
                },
            );
            println!("{}", id);
        }
        ProjectAction::Rm(args) => {
            let id = resolve_project(board, &args.target)?;
            board.delete_project(&id);
            let orphaned = board.tasks().by_project(&id).len();
            if orphaned > 0 {
                eprintln!("warning: {} tasks still reference project {}", orphaned, id);
            }
            println!("removed {}", id);
        }
        ProjectAction::Mv(args) => {
            let ids = args
                .ids
                .iter()
                .map(|r| resolve_project(board, r))
                .collect::<Result<Vec<_>, _>>()?;
            if !board.reorder_projects(&ids) {
                return Err("list every project exactly once".into());
            }
        }
        ProjectAction::Use(args) => match args.project {
            Some(r) => {
                let id = resolve_project(board, &r)?;
                board.set_active_project(Some(&id));
                println!("{}", id);
            }
            None => {
                board.set_active_project(None);
            }
        },
    }
    Ok(())
}

fn cmd_column(s: &mut Session, action: ColumnAction, json: bool) -> CmdResult {
    let board = &mut s.board;
    match action {
        ColumnAction::Add(args) => {
            let id = board.add_column(&args.name);
            println!("{}", id);
        }
        ColumnAction::List => {
            let count = |id: &str| {
                board
                    .tasks()
                    .by_column(id, None)
                    .iter()
                    .filter(|t| !t.trashed())
                    .count()
            };
            let columns = board.columns();
            if json {
                let out: Vec<ColumnInfoJson> = columns
                    .ordered()
                    .into_iter()
                    .map(|c| column_to_json(c, columns, count(&c.id)))
                    .collect();
                return print_json(&out);
            }
            for c in columns.ordered() {
                println!("{}", format_column_info(c, columns, count(&c.id)));
            }
        }
        ColumnAction::Rename(args) => {
            let id = resolve_column(board, &args.column)?;
            board.update_column(
                &id,
                ColumnPatch {
                    name: Some(args.name),
                    ..Default::default()
                },
            );
            println!("{}", id);
        }
        ColumnAction::Rm(args) => {
            let id = resolve_column(board, &args.target)?;
            board.delete_column(&id);
            let orphaned = board.tasks().by_column(&id, None).len();
            if orphaned > 0 {
                eprintln!("warning: {} tasks still reference column {}", orphaned, id);
            }
            println!("removed {}", id);
        }
        ColumnAction::Mv(args) => {
            let ids = args
                .ids
                .iter()
                .map(|r| resolve_column(board, r))
                .collect::<Result<Vec<_>, _>>()?;
            if !board.reorder_columns(&ids) {
                return Err("list every column exactly once".into());
            }
        }
        ColumnAction::Done(args) => {
            let id = resolve_column(board, &args.target)?;
            board.set_completed_column(&id);
            println!("{}", id);
        }
        ColumnAction::Progress(args) => {
            let id = resolve_column(board, &args.target)?;
            if board.columns().completed_column_id() == id {
                return Err("the completed column cannot be a progressing column".into());
            }
            board.toggle_progressing_column(&id);
            let state = if board.columns().is_progressing(&id) {
                "progressing"
            } else {
                "not progressing"
            };
            println!("{} {}", id, state);
        }
    }
    Ok(())
}

fn cmd_label(s: &mut Session, action: LabelAction, json: bool) -> CmdResult {
    let board = &mut s.board;
    match action {
        LabelAction::Add(args) => {
            let id = board.add_label(&args.name, args.color.as_deref());
            println!("{}", id);
        }
        LabelAction::List => {
            if json {
                return print_json(&board.labels().to_vec());
            }
            for label in board.labels().iter() {
                let count = board
                    .tasks()
                    .iter()
                    .filter(|t| !t.trashed() && t.labels.contains(&label.id))
                    .count();
                println!("{}", format_label_info(label, count));
            }
        }
        LabelAction::Rm(args) => {
            let id = board
                .labels()
                .resolve(&args.target)
                .map(|l| l.id.clone())
                .ok_or_else(|| format!("label not found: {}", args.target))?;
            board.delete_label(&id);
            println!("removed {}", id);
        }
        LabelAction::Mv(args) => {
            let ids = resolve_labels(board, &args.ids)?;
            if !board.reorder_labels(&ids) {
                return Err("list every label exactly once".into());
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(s: &mut Session, args: ListArgs, json: bool) -> CmdResult {
    let board = &s.board;
    let project = args
        .project
        .as_deref()
        .map(|p| resolve_project(board, p))
        .transpose()?;
    let only_column = args
        .column
        .as_deref()
        .map(|c| resolve_column(board, c))
        .transpose()?;

    let columns = board.columns();
    let selected = columns
        .ordered()
        .into_iter()
        .filter(|c| only_column.as_ref().is_none_or(|only| *only == c.id));

    let mut listings = Vec::new();
    for column in selected {
        let tasks: Vec<&Task> = board
            .tasks()
            .by_column(&column.id, project.as_deref())
            .into_iter()
            .filter(|t| args.all || !t.trashed())
            .collect();
        listings.push((column, tasks));
    }

    if json {
        let out: Vec<ColumnListingJson> = listings
            .iter()
            .map(|(column, tasks)| ColumnListingJson {
                column: column.id.clone(),
                name: column.name.clone(),
                tasks: tasks.iter().map(|t| task_to_json(board.tasks(), t)).collect(),
            })
            .collect();
        return print_json(&out);
    }

    if listings.is_empty() {
        eprintln!("no columns yet (run `tb init` to create the default columns)");
    }
    for (i, (column, tasks)) in listings.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_lines(&format_column_listing(column, columns, board.labels(), board.tasks(), tasks));
    }
    Ok(())
}

fn cmd_show(s: &mut Session, args: IdArg, json: bool) -> CmdResult {
    let board = &s.board;
    let task = find_task(board, &args.id)?;
    if json {
        return print_json(&task_to_json(board.tasks(), task));
    }
    let project = board.projects().get(&task.project_id);
    print_lines(&format_task_detail(
        task,
        board.tasks(),
        board.columns(),
        board.labels(),
        project,
    ));
    Ok(())
}

fn cmd_view(s: &mut Session, view: ViewKind, json: bool) -> CmdResult {
    let board = &s.board;
    let today = views::today();
    let tasks = match view {
        ViewKind::Today => views::today_tasks(board.tasks(), today),
        ViewKind::Upcoming(args) => {
            let days = args.days.unwrap_or(s.config.views.upcoming_days);
            views::upcoming(board.tasks(), today, days)
        }
        ViewKind::Progressing => views::progressing(board.tasks(), board.columns()),
        ViewKind::Completed => views::completed(board.tasks()),
        ViewKind::Trashed => views::trashed(board.tasks()),
        ViewKind::Calendar(args) => {
            let from = match args.from.as_deref() {
                Some(d) => parse_day(d)?,
                None => today,
            };
            let to = match args.to.as_deref() {
                Some(d) => parse_day(d)?,
                None => from
                    .checked_add_days(Days::new(6))
                    .ok_or("date out of range")?,
            };
            if to < from {
                return Err(format!("--to {} is before --from {}", to, from).into());
            }
            views::scheduled_between(board.tasks(), from, to)
        }
    };
    print_task_list(board, &tasks, json)
}

fn cmd_search(s: &mut Session, args: SearchArgs, json: bool) -> CmdResult {
    let board = &s.board;
    let re = Regex::new(&args.pattern)?;
    let hits = views::search(board.tasks(), &re);

    if json {
        let out: Vec<SearchHitJson> = hits.iter().map(|h| search_hit_to_json(h, board.tasks())).collect();
        return print_json(&out);
    }

    // one line per task even when title and description both match
    let mut seen = HashSet::new();
    for hit in &hits {
        if seen.insert(hit.task_id.as_str())
            && let Some(task) = board.tasks().get(&hit.task_id)
        {
            println!("{}", format_task_line(task, board.labels()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

/// Fill a draft through the task dialog and save it.
fn save_new_task(s: &mut Session, defaults: NewTaskDefaults, title: String, fields: TaskFieldArgs) -> CmdResult {
    let board = &mut s.board;
    let priority = fields.priority.as_deref().map(parse_priority).transpose()?;
    let mut defaults = defaults;
    defaults.labels.extend(resolve_labels(board, &fields.labels)?);
    if let Some(start) = fields.start.as_deref() {
        defaults.start_date = Some(date_arg(start)?);
    }
    if let Some(due) = fields.due.as_deref() {
        defaults.due_date = Some(date_arg(due)?);
    }

    let mut modal = TaskModal::new(&s.config.draft.default_column);
    modal.open_new_task(defaults);
    let draft = modal.draft_mut();
    draft.title = title;
    draft.description = fields.description.unwrap_or_default();
    draft.priority = priority;

    if modal.validate()? == Validation::Empty {
        return Err("task title cannot be empty".into());
    }
    let column = modal.draft().column_id.clone();
    if !board.columns().contains(&column) {
        return Err(format!("column not found: {} (run `tb init` to create the default columns)", column).into());
    }

    match modal.save_draft(board)? {
        Some(id) => {
            println!("{}", id);
            Ok(())
        }
        None => Err("task was not saved".into()),
    }
}

fn cmd_add(s: &mut Session, args: AddArgs) -> CmdResult {
    let project_id = match args.project.as_deref() {
        Some(p) => Some(resolve_project(&s.board, p)?),
        None => s.board.projects().active_project_id().map(str::to_string),
    };
    let column_id = args
        .column
        .as_deref()
        .map(|c| resolve_column(&s.board, c))
        .transpose()?;
    let defaults = NewTaskDefaults {
        project_id,
        column_id,
        ..Default::default()
    };
    save_new_task(s, defaults, args.title, args.fields)
}

fn cmd_sub(s: &mut Session, args: SubArgs) -> CmdResult {
    let parent = find_task(&s.board, &args.parent)?;
    let defaults = NewTaskDefaults {
        project_id: Some(parent.project_id.clone()),
        column_id: Some(parent.column_id.clone()),
        parent_id: Some(parent.id.clone()),
        ..Default::default()
    };
    save_new_task(s, defaults, args.title, args.fields)
}

fn cmd_edit(s: &mut Session, args: EditArgs) -> CmdResult {
    let board = &mut s.board;
    find_task(board, &args.id)?;

    let clearable = |clear: bool, value: Option<String>| if clear { Some(None) } else { value.map(Some) };
    let priority = if args.clear_priority {
        Some(None)
    } else {
        args.priority
            .as_deref()
            .map(parse_priority)
            .transpose()?
            .map(Some)
    };
    let start = args.start.as_deref().map(date_arg).transpose()?;
    let due = args.due.as_deref().map(date_arg).transpose()?;
    let labels = if args.clear_labels {
        Some(Vec::new())
    } else if args.labels.is_empty() {
        None
    } else {
        Some(resolve_labels(board, &args.labels)?)
    };

    let patch = TaskPatch {
        project_id: args
            .project
            .as_deref()
            .map(|p| resolve_project(board, p))
            .transpose()?,
        column_id: args
            .column
            .as_deref()
            .map(|c| resolve_column(board, c))
            .transpose()?,
        title: args.title,
        description: clearable(args.clear_description, args.description),
        priority,
        due_date: clearable(args.clear_due, due),
        start_date: clearable(args.clear_start, start),
        labels,
        location: args.location.map(|l| Some(l).filter(|l| !l.is_empty())),
        ..Default::default()
    };
    board.update_task(&args.id, patch);
    println!("{}", args.id);
    Ok(())
}

fn cmd_set_completed(s: &mut Session, args: IdArg, value: bool) -> CmdResult {
    find_task(&s.board, &args.id)?;
    s.board.set_completed(&args.id, value);
    println!("{}", args.id);
    Ok(())
}

fn cmd_mv(s: &mut Session, args: MvArgs) -> CmdResult {
    find_task(&s.board, &args.id)?;
    let column = resolve_column(&s.board, &args.column)?;
    s.board.move_task(&args.id, &column, args.index);
    println!("{}", args.id);
    Ok(())
}

/// The scope is taken from the first id: a subtask reorders its parent's
/// children, a top-level task its project and column.
fn cmd_reorder(s: &mut Session, args: ReorderArgs) -> CmdResult {
    let board = &mut s.board;
    let first_id = args.ids.first().ok_or("no task ids given")?;
    let first = find_task(board, first_id)?;
    let ok = match first.parent_id.clone() {
        Some(parent) => board.reorder_subtasks(&parent, &args.ids),
        None => {
            let (project, column) = (first.project_id.clone(), first.column_id.clone());
            board.reorder_tasks(&project, &column, &args.ids)
        }
    };
    if !ok {
        return Err("list every task of the column (or every subtask of the parent) exactly once".into());
    }
    Ok(())
}

fn cmd_parent(s: &mut Session, args: ParentArgs) -> CmdResult {
    find_task(&s.board, &args.id)?;
    if let Some(parent) = args.parent.as_deref() {
        find_task(&s.board, parent)?;
    }
    s.board.reparent_task(&args.id, args.parent.as_deref())?;
    println!("{}", args.id);
    Ok(())
}

fn cmd_trash(s: &mut Session, args: IdArg, trashed: bool) -> CmdResult {
    find_task(&s.board, &args.id)?;
    if trashed {
        s.board.trash_task(&args.id);
    } else {
        s.board.restore_task(&args.id);
    }
    println!("{}", args.id);
    Ok(())
}

fn cmd_delete(s: &mut Session, args: IdArg) -> CmdResult {
    find_task(&s.board, &args.id)?;
    let removed = s.board.delete_task(&args.id);
    recovery::log_task_deletion(&s.dir, &removed);
    println!("deleted {} tasks", removed.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

fn cmd_sync(s: &mut Session, action: SyncAction, json: bool) -> CmdResult {
    match action {
        SyncAction::Folder(args) => {
            let folder = fs::canonicalize(&args.path)
                .map_err(|e| format!("cannot use {}: {}", args.path, e))?;
            if !folder.is_dir() {
                return Err(format!("not a directory: {}", folder.display()).into());
            }
            s.engine.select_folder(&mut Some(folder), &mut s.board);
            if let Some(path) = s.engine.file_path() {
                println!("syncing with {}", path.display());
            }
        }
        SyncAction::Now => {
            if s.engine.sync(&s.board) == SyncRequest::Unconfigured {
                return Err("sync is not configured (run `tb sync folder <path>`)".into());
            }
            s.engine.wait_idle();
            if let Some(error) = s.engine.error() {
                return Err(error.to_string().into());
            }
            println!("synced at {}", s.engine.last_sync_time().unwrap_or("?"));
        }
        SyncAction::Status => {
            if json {
                return print_json(&sync_status_to_json(&s.engine));
            }
            print_lines(&format_sync_status(&s.engine));
        }
        SyncAction::Stop => {
            s.engine.stop_sync();
            println!("sync stopped");
        }
        SyncAction::Watch => unreachable!("handled in dispatch"),
    }
    Ok(())
}

/// Reload the board whenever the shared file changes. Each reload takes the
/// data directory lock for just as long as it runs.
fn cmd_sync_watch(dir: &Path) -> CmdResult {
    let (folder, file_name) = {
        let session = Session::open(dir)?;
        let folder = session
            .engine
            .folder()
            .ok_or("sync is not configured (run `tb sync folder <path>`)")?
            .to_path_buf();
        let file_name = session.config.sync.file_name.clone();
        session.finish()?;
        (folder, file_name)
    };

    let watcher = SyncWatcher::start(&folder, &file_name)?;
    println!("watching {}", folder.join(&file_name).display());
    loop {
        thread::sleep(Duration::from_millis(250));
        if !watcher.poll() {
            continue;
        }
        let mut session = Session::open(dir)?;
        // with auto_sync the open already reloaded the file
        if !session.engine.is_watching() {
            session.engine.reload_remote(&mut session.board);
        }
        let when = session.engine.last_sync_time().unwrap_or("?").to_string();
        session.finish()?;
        println!("reloaded at {}", when);
    }
}

// ---------------------------------------------------------------------------
// Recovery log and config
// ---------------------------------------------------------------------------

fn cmd_recovery(dir: &Path, args: RecoveryCmd, json: bool) -> CmdResult {
    match args.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(dir).display());
        }
        Some(RecoveryAction::Prune(prune)) => {
            let before = prune
                .before
                .as_deref()
                .map(|b| {
                    DateTime::parse_from_rfc3339(b)
                        .map(|d| d.with_timezone(&Utc))
                        .map_err(|e| format!("invalid --before '{}': {}", b, e))
                })
                .transpose()?;
            let removed = recovery::prune_recovery(dir, before, prune.all)?;
            println!("pruned {} entries", removed);
        }
        None => {
            let entries = recovery::read_recovery_entries(dir, Some(args.limit.unwrap_or(10)));
            if json {
                let out: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
                return print_json(&out);
            }
            if entries.is_empty() {
                println!("no recovery entries");
            }
            for entry in &entries {
                print!("{}", entry.to_markdown());
            }
        }
    }
    Ok(())
}

fn cmd_config(dir: &Path, args: ConfigCmd) -> CmdResult {
    match args.action {
        ConfigAction::Set(set) => {
            fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
            let _lock = DataLock::acquire_default(dir)?;
            let (_, mut doc) = config_io::read_config(dir)?;
            config_io::set_value(&mut doc, &set.key, &set.value)?;
            config_io::write_config(dir, &doc)?;
            println!("{} = {}", set.key, set.value);
        }
    }
    Ok(())
}
