pub mod config_io;
pub mod lock;
pub mod recovery;
pub mod state;
pub mod sync;
pub mod sync_file;
pub mod watcher;
