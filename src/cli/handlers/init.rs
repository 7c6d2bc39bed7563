use std::fs;
use std::path::Path;

use crate::io::config_io::CONFIG_FILE;
use crate::io::lock::DataLock;
use crate::io::state;

const CONFIG_TEMPLATE: &str = r##"# taskboard configuration. Edit by hand or with: tb config set <section.key> <value>

[sync]
# name of the shared file inside the sync folder
file_name = "task-manager-data.json"
# write the shared file after every change and reload it on start
auto_sync = true

[views]
# length of the `tb view upcoming` window, in days
upcoming_days = 3

[draft]
# column new tasks land in when `tb add` gets no --column
default_column = "todo"
"##;

/// Columns a fresh board starts with: id, name.
const DEFAULT_COLUMNS: [(&str, &str); 3] = [("todo", "To Do"), ("doing", "In Progress"), ("done", "Done")];

/// Create the data directory, a commented config.toml and the default
/// columns. Existing config and columns are left alone.
pub fn cmd_init(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(data_dir)
        .map_err(|e| format!("cannot create {}: {}", data_dir.display(), e))?;
    let _lock = DataLock::acquire_default(data_dir)?;

    let config_path = data_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        fs::write(&config_path, CONFIG_TEMPLATE)?;
    }

    let mut board = state::load_board(data_dir);
    if board.columns().is_empty() {
        for (id, name) in DEFAULT_COLUMNS {
            board.add_column_with_id(id, name);
        }
        board.toggle_progressing_column("doing");
        board.set_completed_column("done");
        state::save_board(data_dir, &board)?;
    } else {
        eprintln!("warning: {} already has columns, leaving them as they are", data_dir.display());
    }

    println!("initialized {}", data_dir.display());
    Ok(())
}
