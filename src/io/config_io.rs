use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::Config;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Edit(#[from] toml_edit::TomlError),
    #[error("config key must look like section.key, got {0:?}")]
    BadKey(String),
}

/// Read config.toml, returning the parsed config and the raw document for
/// format-preserving edits. A missing file is an empty config.
pub fn read_config(data_dir: &Path) -> Result<(Config, toml_edit::DocumentMut), ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    let config: Config = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

pub fn write_config(data_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    fs::write(&path, doc.to_string()).map_err(|source| ConfigError::Write { path, source })
}

/// Set `section.key` to `raw`, typed as a bool or integer when it parses as
/// one and as a string otherwise. The edited document must still parse as
/// a valid config.
pub fn set_value(doc: &mut toml_edit::DocumentMut, key: &str, raw: &str) -> Result<Config, ConfigError> {
    let Some((section, field)) = key.split_once('.').filter(|(s, f)| !s.is_empty() && !f.is_empty()) else {
        return Err(ConfigError::BadKey(key.to_string()));
    };

    let value = if let Ok(b) = raw.parse::<bool>() {
        toml_edit::value(b)
    } else if let Ok(n) = raw.parse::<i64>() {
        toml_edit::value(n)
    } else {
        toml_edit::value(raw)
    };

    if !doc.contains_key(section) {
        doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[section][field] = value;

    Ok(toml::from_str(&doc.to_string())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
# shared folder settings
[sync]
file_name = \"tasks.json\" # keep in step with the phone

[views]
upcoming_days = 7
";

    #[test]
    fn missing_file_is_default_config() {
        let tmp = TempDir::new().unwrap();
        let (config, doc) = read_config(tmp.path()).unwrap();
        assert_eq!(config.views.upcoming_days, 3);
        assert!(doc.to_string().is_empty());
    }

    #[test]
    fn read_write_preserves_formatting() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), SAMPLE).unwrap();
        let (config, doc) = read_config(tmp.path()).unwrap();
        assert_eq!(config.sync.file_name, "tasks.json");
        assert_eq!(config.views.upcoming_days, 7);

        write_config(tmp.path(), &doc).unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join(CONFIG_FILE)).unwrap(), SAMPLE);
    }

    #[test]
    fn set_value_types_and_keeps_comments() {
        let mut doc: toml_edit::DocumentMut = SAMPLE.parse().unwrap();
        let config = set_value(&mut doc, "sync.auto_sync", "false").unwrap();
        assert!(!config.sync.auto_sync);
        let config = set_value(&mut doc, "draft.default_column", "backlog").unwrap();
        assert_eq!(config.draft.default_column, "backlog");

        let text = doc.to_string();
        assert!(text.contains("# keep in step with the phone"));
        assert!(text.contains("auto_sync = false"));
        assert!(text.contains("[draft]"));
    }

    #[test]
    fn set_value_rejects_bad_keys_and_types() {
        let mut doc = toml_edit::DocumentMut::new();
        assert!(matches!(set_value(&mut doc, "nodot", "1"), Err(ConfigError::BadKey(_))));
        assert!(matches!(
            set_value(&mut doc, "views.upcoming_days", "soon"),
            Err(ConfigError::Parse(_))
        ));
    }
}
