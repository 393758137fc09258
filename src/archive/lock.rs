use crate::error::ArchiveError;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".sync.lock";

/// Exclusive advisory lock over an archive directory, held for one sync run.
#[derive(Debug)]
pub struct ArchiveLock {
    file: File,
    path: PathBuf,
}

impl ArchiveLock {
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            return Err(ArchiveError::Locked {
                path: root.to_path_buf(),
            }
            .into());
        }

        file.set_len(0)
            .with_context(|| format!("failed to truncate {}", path.display()))?;
        let payload = serde_json::json!({
            "pid": std::process::id(),
            "build_uuid": env!("BUILD_UUID"),
        });
        writeln!(file, "{payload}").with_context(|| format!("failed to write {}", path.display()))?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// The file itself stays on disk. Unlinking it would let a waiter lock the
// orphaned inode while a newcomer locks a fresh file at the same path.
impl Drop for ArchiveLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(
                lock = %self.path.display(),
                error = %err,
                "failed to release archive lock"
            );
        }
    }
}
