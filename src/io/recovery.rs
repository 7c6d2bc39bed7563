use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tempfile::NamedTempFile;

use crate::io::lock::try_flock;
use crate::model::task::Task;

/// Log size above which old entries are trimmed before appending.
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Entries older than this are dropped by a default prune.
pub const PRUNE_AGE_DAYS: i64 = 30;

const FILE_HEADER: &str = "\
<!-- taskboard recovery log
     Data that was discarded, overwritten or could not be written lands here.
     View with: tb recovery
     Prune old entries: tb recovery prune -->

---
";

/// Why an entry was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// A sync file key that failed validation and was skipped.
    Quarantine,
    /// Local collections overwritten by a load-replace.
    Conflict,
    /// A sync write that failed.
    Write,
    /// Task records removed by `tb delete`.
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryCategory::Quarantine => "quarantine",
            RecoveryCategory::Conflict => "conflict",
            RecoveryCategory::Write => "write",
            RecoveryCategory::Delete => "delete",
        };
        f.write_str(name)
    }
}

impl FromStr for RecoveryCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "quarantine" => Ok(RecoveryCategory::Quarantine),
            "conflict" => Ok(RecoveryCategory::Conflict),
            "write" => Ok(RecoveryCategory::Write),
            "delete" => Ok(RecoveryCategory::Delete),
            _ => Err(()),
        }
    }
}

/// One block of the recovery log.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Markdown block: `## <timestamp> [<category>] <description>`, then
    /// `Key: value` lines, then the body in a fenced block.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} [{}] {}\n\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            out.push_str("\n```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }

    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "category": self.category.to_string(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }
}

pub fn recovery_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(".recovery.log")
}

/// Write `content` to `path` via a temp file in the same directory and a rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Appending
// ---------------------------------------------------------------------------

/// Append an entry. Failures are reported on stderr and otherwise ignored.
pub fn log_recovery(data_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(data_dir, &entry) {
        eprintln!("warning: could not write to recovery log: {}", e);
    }
}

fn append_entry(data_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(data_dir);
    if fs::metadata(&path).is_ok_and(|m| m.len() > MAX_LOG_SIZE) {
        trim_in_place(&path);
    }
    let needs_header = fs::metadata(&path).map_or(true, |m| m.len() == 0);

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())
}

/// Drop entries past the prune age, skipping the trim if someone else holds the log.
fn trim_in_place(path: &Path) {
    let Ok(file) = OpenOptions::new().read(true).write(true).open(path) else {
        return;
    };
    if try_flock(&file).is_err() {
        return;
    }
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let trimmed = retain_since(&content, Utc::now() - Duration::days(PRUNE_AGE_DAYS));
    if trimmed.len() < content.len() {
        let _ = fs::write(path, trimmed);
    }
}

/// Record the subtree removed by a delete.
pub fn log_task_deletion(data_dir: &Path, removed: &[Task]) {
    let Some(root) = removed.last() else {
        return;
    };
    let body = serde_json::to_string_pretty(removed).unwrap_or_default();
    log_recovery(
        data_dir,
        RecoveryEntry::new(RecoveryCategory::Delete, format!("task {} deleted", root.id))
            .field("Title", root.title.clone())
            .field("Records", removed.len().to_string())
            .body(body),
    );
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Entries newest first, at most `limit` of them.
pub fn read_recovery_entries(data_dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let Ok(content) = fs::read_to_string(recovery_log_path(data_dir)) else {
        return Vec::new();
    };
    let mut entries = parse_entries(&content);
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let Some((timestamp, category, description)) =
            line.strip_prefix("## ").and_then(parse_header)
        else {
            continue;
        };
        let mut entry = RecoveryEntry {
            timestamp,
            category,
            description,
            fields: Vec::new(),
            body: String::new(),
        };

        let mut in_body = false;
        for line in lines.by_ref() {
            if in_body {
                if line == "```" {
                    in_body = false;
                } else {
                    if !entry.body.is_empty() {
                        entry.body.push('\n');
                    }
                    entry.body.push_str(line);
                }
            } else if line == "---" {
                break;
            } else if line.starts_with("```") {
                in_body = true;
            } else if let Some((key, value)) = line.trim().split_once(": ") {
                entry.fields.push((key.to_string(), value.to_string()));
            }
        }
        entries.push(entry);
    }
    entries
}

/// `<timestamp> [<category>] <description>`.
fn parse_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (timestamp, rest) = header.split_once(" [")?;
    let (category, description) = rest.split_once("] ")?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp).ok()?.with_timezone(&Utc);
    Some((timestamp, category.parse().ok()?, description.to_string()))
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Remove entries older than `before` (default: the prune age), or every
/// entry with `all`. Returns the number removed.
pub fn prune_recovery(data_dir: &Path, before: Option<DateTime<Utc>>, all: bool) -> io::Result<usize> {
    let path = recovery_log_path(data_dir);
    if !path.exists() {
        return Ok(0);
    }

    let file = OpenOptions::new().read(true).write(true).open(&path)?;
    let mut locked = false;
    for _ in 0..10 {
        if try_flock(&file).is_ok() {
            locked = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    if !locked {
        return Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "recovery log is in use, try again later",
        ));
    }

    let content = fs::read_to_string(&path)?;
    let before_count = parse_entries(&content).len();
    let kept = if all {
        FILE_HEADER.to_string()
    } else {
        let cutoff = before.unwrap_or_else(|| Utc::now() - Duration::days(PRUNE_AGE_DAYS));
        retain_since(&content, cutoff)
    };
    let after_count = parse_entries(&kept).len();
    fs::write(&path, kept)?;
    Ok(before_count - after_count)
}

/// Keep the file header and every entry stamped at or after `cutoff`.
fn retain_since(content: &str, cutoff: DateTime<Utc>) -> String {
    let mut out = String::new();
    let mut block = String::new();
    let mut block_time: Option<DateTime<Utc>> = None;
    let mut in_header = true;

    let flush = |out: &mut String, block: &str, time: Option<DateTime<Utc>>| {
        if time.is_some_and(|t| t >= cutoff) {
            out.push_str(block);
        }
    };

    for line in content.lines() {
        if in_header {
            out.push_str(line);
            out.push('\n');
            in_header = line != "---";
            continue;
        }
        if let Some(header) = line.strip_prefix("## ") {
            flush(&mut out, &block, block_time);
            block.clear();
            block_time = parse_header(header).map(|(t, _, _)| t);
        }
        block.push_str(line);
        block.push('\n');
    }
    flush(&mut out, &block, block_time);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry_at(days_ago: i64, description: &str) -> RecoveryEntry {
        RecoveryEntry {
            timestamp: Utc::now() - Duration::days(days_ago),
            ..RecoveryEntry::new(RecoveryCategory::Write, description)
        }
    }

    #[test]
    fn markdown_layout() {
        let md = RecoveryEntry::new(RecoveryCategory::Quarantine, "key \"tasks\" rejected")
            .field("File", "/mnt/drive/task-manager-data.json")
            .body("[1, 2]")
            .to_markdown();
        assert!(md.starts_with("## "));
        assert!(md.contains("[quarantine] key \"tasks\" rejected\n"));
        assert!(md.contains("File: /mnt/drive/task-manager-data.json\n"));
        assert!(md.contains("```json\n[1, 2]\n```\n"));
        assert!(md.ends_with("---\n"));
    }

    #[test]
    fn log_then_read_newest_first() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), RecoveryEntry::new(RecoveryCategory::Write, "first"));
        log_recovery(
            tmp.path(),
            RecoveryEntry::new(RecoveryCategory::Conflict, "second")
                .field("Folder", "/sync")
                .body("{\n  \"tasks\": []\n}"),
        );

        let content = fs::read_to_string(recovery_log_path(tmp.path())).unwrap();
        assert!(content.starts_with("<!-- taskboard recovery log"));

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "second");
        assert_eq!(entries[0].category, RecoveryCategory::Conflict);
        assert_eq!(entries[0].fields, vec![("Folder".to_string(), "/sync".to_string())]);
        assert_eq!(entries[0].body, "{\n  \"tasks\": []\n}");

        assert_eq!(read_recovery_entries(tmp.path(), Some(1)).len(), 1);
    }

    #[test]
    fn missing_log_reads_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(read_recovery_entries(tmp.path(), None).is_empty());
        assert_eq!(prune_recovery(tmp.path(), None, false).unwrap(), 0);
    }

    #[test]
    fn prune_drops_old_entries_only() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry_at(45, "old"));
        log_recovery(tmp.path(), entry_at(1, "recent"));

        assert_eq!(prune_recovery(tmp.path(), None, false).unwrap(), 1);
        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "recent");
    }

    #[test]
    fn prune_all_keeps_header() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry_at(0, "a"));
        log_recovery(tmp.path(), entry_at(0, "b"));
        assert_eq!(prune_recovery(tmp.path(), None, true).unwrap(), 2);
        let content = fs::read_to_string(recovery_log_path(tmp.path())).unwrap();
        assert_eq!(content, FILE_HEADER);
    }

    #[test]
    fn deletion_entry_lists_removed_records() {
        let tmp = TempDir::new().unwrap();
        let removed: Vec<Task> = serde_json::from_str(
            r#"[
                {"id":"2","projectId":"p","columnId":"todo","title":"child","parentId":"1"},
                {"id":"1","projectId":"p","columnId":"todo","title":"parent"}
            ]"#,
        )
        .unwrap();
        log_task_deletion(tmp.path(), &removed);

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries[0].description, "task 1 deleted");
        assert!(entries[0].body.contains("\"child\""));
        log_task_deletion(tmp.path(), &[]);
        assert_eq!(read_recovery_entries(tmp.path(), None).len(), 1);
    }

    #[test]
    fn atomic_write_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.json");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn header_parse_rejects_garbage() {
        assert!(parse_header("not a header").is_none());
        assert!(parse_header("2024-01-01T00:00:00Z [bogus] x").is_none());
        assert!(parse_header("2024-01-01T00:00:00Z [write] failed").is_some());
    }
}
