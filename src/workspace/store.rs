use super::model::Workspace;
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::fs_util::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File-backed workspace metadata.
///
/// Active records live at `<root>/.metadata/<name>.json`; cleaned records are
/// archived to `<root>/.metadata/archived/<name>-<YYYYmmdd-HHMMSS>.json`.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    metadata_dir: PathBuf,
    archive_dir: PathBuf,
}

impl WorkspaceStore {
    pub fn new(root: &Path) -> Self {
        let metadata_dir = root.join(".metadata");
        let archive_dir = metadata_dir.join("archived");
        Self {
            metadata_dir,
            archive_dir,
        }
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.metadata_dir.join(format!("{}.json", name))
    }

    pub fn save(&self, workspace: &Workspace) -> WorkspaceResult<()> {
        write_json_atomic(&self.record_path(&workspace.name), workspace)
    }

    pub fn load(&self, name: &str) -> WorkspaceResult<Option<Workspace>> {
        let path = self.record_path(name);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn remove(&self, name: &str) -> WorkspaceResult<()> {
        let path = self.record_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// All active records, newest first. Unreadable records are skipped.
    pub fn list(&self) -> WorkspaceResult<Vec<Workspace>> {
        let mut records = read_dir_records(&self.metadata_dir)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Writes a cleaned record to the archive and returns the archive path.
    pub fn archive(&self, workspace: &Workspace, at: DateTime<Utc>) -> WorkspaceResult<PathBuf> {
        let file_name = format!("{}-{}.json", workspace.name, at.format("%Y%m%d-%H%M%S"));
        let path = self.archive_dir.join(file_name);
        write_json_atomic::<_, WorkspaceError>(&path, workspace)?;
        Ok(path)
    }

    /// Archived records, most recently cleaned first.
    pub fn list_archived(&self) -> WorkspaceResult<Vec<Workspace>> {
        let mut records = read_dir_records(&self.archive_dir)?;
        records.sort_by_key(|w| std::cmp::Reverse(w.cleaned_at.unwrap_or(w.created_at)));
        Ok(records)
    }
}

fn read_dir_records(dir: &Path) -> WorkspaceResult<Vec<Workspace>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut records = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match read_json::<Workspace, WorkspaceError>(&path) {
            Ok(workspace) => records.push(workspace),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable workspace record"),
        }
    }
    Ok(records)
}
