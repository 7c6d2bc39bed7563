use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const LOCK_FILE: &str = ".lock";

/// How long a `tb` invocation waits for another one to finish.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Advisory lock on a data directory.
///
/// Held for the whole of a `tb` invocation, so two processes never
/// interleave load and save of the same store files. The lock file stays
/// in place after release: unlinking it would let a waiter lock the old
/// inode while a newcomer locks a fresh one. It holds the pid of the
/// current owner, which is reported when another process gives up waiting.
pub struct DataLock {
    _file: File,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is locked by another tb process{}", holder_suffix(.holder))]
    Busy { path: PathBuf, holder: Option<u32> },
}

fn holder_suffix(holder: &Option<u32>) -> String {
    holder.map(|pid| format!(" (pid {})", pid)).unwrap_or_default()
}

impl DataLock {
    /// Lock `<data_dir>/.lock`, retrying until `wait` has passed.
    pub fn acquire(data_dir: &Path, wait: Duration) -> Result<Self, LockError> {
        let path = data_dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + wait;
        while try_flock(&file).is_err() {
            if Instant::now() >= deadline {
                let holder = read_holder(&mut file);
                return Err(LockError::Busy { path, holder });
            }
            std::thread::sleep(RETRY_INTERVAL);
        }

        // the pid is informational; a lock whose note failed still works
        let _ = write_holder(&mut file);
        Ok(DataLock { _file: file })
    }

    pub fn acquire_default(data_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(data_dir, DEFAULT_WAIT)
    }
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}

fn write_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())
}

/// Non-blocking exclusive flock. Released when the descriptor closes.
#[cfg(unix)]
pub(crate) fn try_flock(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub(crate) fn try_flock(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lock_file_outlives_the_lock() {
        let tmp = TempDir::new().unwrap();
        let lock = DataLock::acquire_default(tmp.path()).unwrap();
        let note = fs::read_to_string(tmp.path().join(LOCK_FILE)).unwrap();
        assert_eq!(note.trim(), std::process::id().to_string());

        drop(lock);
        assert!(tmp.path().join(LOCK_FILE).exists());
        assert!(DataLock::acquire_default(tmp.path()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn busy_lock_names_its_holder() {
        let tmp = TempDir::new().unwrap();
        let _held = DataLock::acquire_default(tmp.path()).unwrap();

        let err = match DataLock::acquire(tmp.path(), Duration::from_millis(50)) {
            Err(e) => e,
            Ok(_) => panic!("second lock should not be granted"),
        };
        let pid = std::process::id();
        assert!(matches!(err, LockError::Busy { holder: Some(p), .. } if p == pid));
        assert!(err.to_string().ends_with(&format!("(pid {})", pid)));
    }
}
