//! Home-based storage paths for per-user unitflow state.
//!
//! Repository-scoped stores (registry, workspace metadata, run reports) live
//! inside the repository. Everything else lives under `~/.unitflow/`:
//! - `logs/<repo-hash>/events.jsonl` - structured run event log
//!
//! `UNITFLOW_HOME` replaces the home directory when set.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// The name of the unitflow directory inside the home directory.
const UNITFLOW_DIR: &str = ".unitflow";

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "UNITFLOW_HOME";

/// Returns the home-based unitflow directory: `~/.unitflow/`
///
/// Creates the directory if it doesn't exist.
///
/// # Errors
///
/// Returns an error if:
/// - Home directory cannot be determined
/// - Directory creation fails
pub fn unitflow_home_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(HOME_ENV) {
        Some(custom) => PathBuf::from(custom),
        None => dirs::home_dir()
            .context("Could not determine home directory for unitflow storage")?
            .join(UNITFLOW_DIR),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create unitflow directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the logs directory for a repository: `~/.unitflow/logs/<repo-hash>/`
///
/// Creates the directory if it doesn't exist.
pub fn logs_dir(repo_root: &Path) -> Result<PathBuf> {
    let dir = unitflow_home_dir()?
        .join("logs")
        .join(repo_hash(repo_root));
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

/// Computes a short stable hash of a repository path.
///
/// The path is canonicalized first so symlinked checkouts share one log
/// directory. Returns 12 lowercase hex characters.
pub fn repo_hash(path: &Path) -> String {
    let bytes = match fs::canonicalize(path) {
        Ok(canonical) => canonical.to_string_lossy().into_owned().into_bytes(),
        Err(_) => {
            #[cfg(unix)]
            {
                use std::os::unix::ffi::OsStrExt;
                path.as_os_str().as_bytes().to_vec()
            }
            #[cfg(not(unix))]
            {
                path.to_string_lossy().into_owned().into_bytes()
            }
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let result = hasher.finalize();

    hex_encode(&result[..6])
}

/// Encodes bytes as lowercase hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "tests/paths_tests.rs"]
mod tests;
