use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use tracing::warn;

/// Locks older than this are assumed abandoned by a crashed writer.
const STALE_LOCK_SECS: i64 = 60;

/// Write `content` to `path` via a sibling temp file, fsync and rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let temp_path = dir.join(format!(".{}.tmp", temp_suffix()));

    let mut file = std::fs::File::create(&temp_path)
        .with_context(|| format!("cannot create temp file for {}", path.display()))?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("cannot rename temp to {}", path.display()))?;
    Ok(())
}

fn temp_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{}-{nanos:x}", std::process::id())
}

/// Advisory lock on a session file, held as `<file>.lock` containing the
/// owner pid and acquisition time.
pub struct SessionLock {
    lock_path: PathBuf,
}

impl SessionLock {
    /// Acquire the lock, breaking it if it is stale.
    pub fn acquire(session_path: &Path) -> Result<Self> {
        let mut lock_path = session_path.as_os_str().to_owned();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);

        if lock_path.exists() {
            let content = std::fs::read_to_string(&lock_path).unwrap_or_default();
            let taken_at = content.lines().nth(1).and_then(|ts| ts.parse::<i64>().ok());
            match taken_at {
                Some(ts) if chrono::Utc::now().timestamp() - ts <= STALE_LOCK_SECS => {
                    bail!(
                        "session is locked by another process (lock: {})",
                        lock_path.display()
                    );
                }
                _ => {
                    warn!(lock = %lock_path.display(), "breaking stale session lock");
                    let _ = std::fs::remove_file(&lock_path);
                }
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .with_context(|| format!("cannot acquire lock {}", lock_path.display()))?;
        writeln!(file, "{}", std::process::id())?;
        writeln!(file, "{}", chrono::Utc::now().timestamp())?;

        Ok(Self { lock_path })
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    pub fn release(self) -> Result<()> {
        if self.lock_path.exists() {
            std::fs::remove_file(&self.lock_path)
                .with_context(|| format!("cannot release lock {}", self.lock_path.display()))?;
        }
        Ok(())
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.lock_path);
    }
}
