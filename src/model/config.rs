use serde::{Deserialize, Serialize};

/// Configuration from config.toml. Every section and field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    #[serde(default)]
    pub draft: DraftConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Name of the shared file inside the sync folder.
    #[serde(default = "default_sync_file")]
    pub file_name: String,
    /// Write the shared file after every command that changes the board.
    #[serde(default = "default_true")]
    pub auto_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            file_name: default_sync_file(),
            auto_sync: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// Length of the "upcoming" window, in days after today.
    #[serde(default = "default_upcoming_days")]
    pub upcoming_days: u32,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        ViewsConfig {
            upcoming_days: default_upcoming_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftConfig {
    #[serde(default = "default_column")]
    pub default_column: String,
}

impl Default for DraftConfig {
    fn default() -> Self {
        DraftConfig {
            default_column: default_column(),
        }
    }
}

pub const DEFAULT_SYNC_FILE: &str = "task-manager-data.json";

fn default_sync_file() -> String {
    DEFAULT_SYNC_FILE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_upcoming_days() -> u32 {
    3
}

fn default_column() -> String {
    "todo".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.sync.file_name, "task-manager-data.json");
        assert!(config.sync.auto_sync);
        assert_eq!(config.views.upcoming_days, 3);
        assert_eq!(config.draft.default_column, "todo");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str("[sync]\nauto_sync = false\n").unwrap();
        assert!(!config.sync.auto_sync);
        assert_eq!(config.sync.file_name, DEFAULT_SYNC_FILE);
    }
}
