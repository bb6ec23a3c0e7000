//! One orchestrated run per repository, enforced with an OS file lock.

use crate::error::RunError;
use chrono::Utc;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOCK_FILE_NAME: &str = ".run.lock";

/// Held for the duration of a run; released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Takes the exclusive lock at `<root>/.run.lock` without waiting.
    ///
    /// Fails with [`RunError::RunInProgress`] naming the current holder when
    /// another run owns it.
    pub fn acquire(root: &Path) -> Result<Self, RunError> {
        std::fs::create_dir_all(root).map_err(anyhow::Error::from)?;
        let path = root.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| anyhow::anyhow!("Failed to open run lock {}: {}", path.display(), e))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                let mut holder = String::new();
                let _ = file.read_to_string(&mut holder);
                let holder = holder.trim();
                return Err(RunError::RunInProgress {
                    holder: if holder.is_empty() {
                        "unknown".to_string()
                    } else {
                        holder.to_string()
                    },
                });
            }
            Err(e) => {
                return Err(anyhow::anyhow!("Failed to acquire run lock: {}", e).into());
            }
        }

        let holder = format!(
            "{} pid {} since {}",
            gethostname::gethostname().to_string_lossy(),
            std::process::id(),
            Utc::now().to_rfc3339()
        );
        file.set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.write_all(holder.as_bytes()))
            .and_then(|_| file.flush())
            .map_err(anyhow::Error::from)?;
        debug!(path = %path.display(), holder = %holder, "Acquired run lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to release run lock");
        }
    }
}
