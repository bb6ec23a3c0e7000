use super::model::{StatusUpdate, Workspace, WorkspaceStatus};
use super::store::WorkspaceStore;
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::git;
use chrono::{Duration, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Owns workspace provisioning, status tracking, and teardown for one repository.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    repo_root: PathBuf,
    root: PathBuf,
    store: WorkspaceStore,
}

/// One domain's entry in a provisioning batch.
#[derive(Debug, Clone)]
pub struct WorkspaceRequest {
    pub domain: String,
    pub task_description: String,
}

impl WorkspaceManager {
    /// `root` is resolved against `repo_root` when relative.
    pub fn new(repo_root: &Path, root: &Path) -> Self {
        let root = repo_root.join(root);
        Self {
            repo_root: repo_root.to_path_buf(),
            store: WorkspaceStore::new(&root),
            root,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn branch_name(unit_id: &str, domain: &str) -> String {
        format!(
            "unitflow/{}/{}",
            git::sanitize_ref_component(unit_id),
            git::sanitize_ref_component(&domain.to_lowercase())
        )
    }

    /// Creates a branch from `base_branch` and a worktree tracking it.
    pub fn create(
        &self,
        unit_id: &str,
        domain: &str,
        base_branch: &str,
        task_description: &str,
    ) -> WorkspaceResult<Workspace> {
        let creation_error = |reason: String| WorkspaceError::Creation {
            unit_id: unit_id.to_string(),
            domain: domain.to_string(),
            reason,
        };

        if !git::branch_exists(&self.repo_root, base_branch) {
            return Err(creation_error(format!(
                "base branch '{}' does not exist",
                base_branch
            )));
        }
        let branch = Self::branch_name(unit_id, domain);
        if git::branch_exists(&self.repo_root, &branch) {
            return Err(creation_error(format!("branch '{}' already exists", branch)));
        }

        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let name = format!(
            "{}-{}-{}",
            git::sanitize_ref_component(unit_id),
            git::sanitize_ref_component(&domain.to_lowercase()),
            suffix
        );
        let path = self.root.join(&name);

        debug!(workspace = %name, branch = %branch, base = %base_branch, "Creating workspace");
        std::fs::create_dir_all(&self.root)?;
        git::add_worktree(&self.repo_root, &path, &branch, base_branch)
            .map_err(|e| creation_error(e.to_string()))?;

        let workspace = Workspace {
            name,
            unit_id: unit_id.to_string(),
            domain: domain.to_string(),
            task_description: task_description.to_string(),
            path,
            branch,
            base_branch: base_branch.to_string(),
            worker_id: None,
            status: WorkspaceStatus::Created,
            created_at: Utc::now(),
            assigned_at: None,
            started_at: None,
            completed_at: None,
            merged_at: None,
            cleaned_at: None,
            commits: Vec::new(),
            error_message: None,
        };
        self.store.save(&workspace)?;
        info!(workspace = %workspace.name, branch = %workspace.branch, "Created workspace");
        Ok(workspace)
    }

    /// Creates one workspace per request, or none.
    ///
    /// On the first failure every workspace created earlier in the batch is
    /// force-cleaned with its branch deleted, then the creation error is returned.
    pub fn provision(
        &self,
        unit_id: &str,
        requests: &[WorkspaceRequest],
        base_branch: &str,
    ) -> WorkspaceResult<Vec<Workspace>> {
        let mut created: Vec<Workspace> = Vec::with_capacity(requests.len());
        for request in requests {
            match self.create(unit_id, &request.domain, base_branch, &request.task_description) {
                Ok(workspace) => created.push(workspace),
                Err(err) => {
                    warn!(
                        unit = %unit_id,
                        domain = %request.domain,
                        error = %err,
                        rollback = created.len(),
                        "Provisioning failed; rolling back sibling workspaces"
                    );
                    for sibling in &created {
                        if let Err(e) = self.cleanup(&sibling.name, true, true) {
                            error!(workspace = %sibling.name, error = %e, "Rollback cleanup failed");
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(created)
    }

    /// Active workspaces filtered by unit and status, newest first.
    pub fn list(
        &self,
        unit_id: Option<&str>,
        status: Option<WorkspaceStatus>,
    ) -> WorkspaceResult<Vec<Workspace>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|w| unit_id.is_none_or(|u| w.unit_id == u))
            .filter(|w| status.is_none_or(|s| w.status == s))
            .collect())
    }

    pub fn get(&self, name: &str) -> WorkspaceResult<Workspace> {
        self.store
            .load(name)?
            .ok_or_else(|| WorkspaceError::NotFound(name.to_string()))
    }

    /// Records a status change, stamping its timestamp on first entry.
    pub fn update_status(
        &self,
        name: &str,
        status: WorkspaceStatus,
        update: StatusUpdate,
    ) -> WorkspaceResult<Workspace> {
        let mut workspace = self.get(name)?;
        workspace.transition(status, Utc::now());
        workspace.apply(update);
        self.store.save(&workspace)?;
        debug!(workspace = %name, status = %status, "Updated workspace status");
        Ok(workspace)
    }

    /// Commits on the workspace branch that are not on its base branch.
    pub fn commits_since_base(&self, workspace: &Workspace) -> WorkspaceResult<Vec<String>> {
        git::commits_between(&self.repo_root, &workspace.base_branch, &workspace.branch)
    }

    /// Removes the worktree, optionally the branch, and archives the record.
    ///
    /// Without `force` the workspace must be terminal; past that check the
    /// cleanup always completes. Uncommitted changes in the worktree are
    /// discarded. A branch is deleted only when forced or already merged into
    /// its base; an unmerged branch is kept so its commits survive.
    pub fn cleanup(&self, name: &str, delete_branch: bool, force: bool) -> WorkspaceResult<Workspace> {
        let mut workspace = self.get(name)?;
        if !workspace.status.is_terminal() && !force {
            return Err(WorkspaceError::NotTerminal {
                name: name.to_string(),
                status: workspace.status.to_string(),
            });
        }

        let has_branch = delete_branch && git::branch_exists(&self.repo_root, &workspace.branch);
        let drop_branch = has_branch && (force || self.branch_merged(&workspace));
        if has_branch && !drop_branch {
            warn!(
                workspace = %name,
                branch = %workspace.branch,
                base = %workspace.base_branch,
                "Branch has commits not on its base; keeping it"
            );
        }

        self.remove_worktree(&workspace)?;
        if drop_branch {
            if let Err(e) = git::delete_branch(&self.repo_root, &workspace.branch, true) {
                warn!(workspace = %name, branch = %workspace.branch, error = %e, "Branch deletion failed");
            }
        }

        let now = Utc::now();
        workspace.transition(WorkspaceStatus::Cleaned, now);
        self.store.archive(&workspace, now)?;
        self.store.remove(name)?;
        info!(workspace = %name, branch_deleted = drop_branch, "Cleaned up workspace");
        Ok(workspace)
    }

    fn branch_merged(&self, workspace: &Workspace) -> bool {
        git::is_ancestor(&self.repo_root, &workspace.branch, &workspace.base_branch).unwrap_or_else(|e| {
            warn!(branch = %workspace.branch, error = %e, "Could not compare branch with its base");
            false
        })
    }

    /// Force-removes the worktree, falling back to deleting the directory.
    fn remove_worktree(&self, workspace: &Workspace) -> WorkspaceResult<()> {
        if !workspace.path.exists() {
            warn!(workspace = %workspace.name, path = %workspace.path.display(), "Workspace directory already gone");
            return git::prune_worktrees(&self.repo_root);
        }
        if let Err(e) = git::remove_worktree(&self.repo_root, &workspace.path, true) {
            warn!(workspace = %workspace.name, error = %e, "git worktree remove failed; removing directory");
            std::fs::remove_dir_all(&workspace.path)?;
            git::prune_worktrees(&self.repo_root)?;
        }
        Ok(())
    }

    /// Cleans every terminal workspace of a unit; failures are logged and skipped.
    pub fn cleanup_batch(&self, unit_id: &str, delete_branches: bool) -> usize {
        let candidates = match self.list(Some(unit_id), None) {
            Ok(all) => all
                .into_iter()
                .filter(|w| w.status.is_terminal())
                .collect::<Vec<_>>(),
            Err(e) => {
                error!(unit = %unit_id, error = %e, "Failed to list workspaces for cleanup");
                return 0;
            }
        };

        let mut cleaned = 0;
        for workspace in &candidates {
            match self.cleanup(&workspace.name, delete_branches, false) {
                Ok(_) => cleaned += 1,
                Err(e) => error!(workspace = %workspace.name, error = %e, "Cleanup failed"),
            }
        }
        info!(unit = %unit_id, cleaned, total = candidates.len(), "Batch cleanup finished");
        cleaned
    }

    /// Force-cleans workspaces stuck before completion for longer than `max_age`.
    pub fn cleanup_abandoned(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let abandoned: Vec<Workspace> = match self.list(None, None) {
            Ok(all) => all
                .into_iter()
                .filter(|w| {
                    matches!(
                        w.status,
                        WorkspaceStatus::Created | WorkspaceStatus::Assigned | WorkspaceStatus::InProgress
                    )
                })
                .filter(|w| w.last_activity() < cutoff)
                .collect(),
            Err(e) => {
                error!(error = %e, "Failed to list workspaces for abandoned sweep");
                return 0;
            }
        };

        let mut cleaned = 0;
        for workspace in &abandoned {
            warn!(
                workspace = %workspace.name,
                status = %workspace.status,
                idle_days = (Utc::now() - workspace.last_activity()).num_days(),
                "Cleaning abandoned workspace"
            );
            match self.cleanup(&workspace.name, true, true) {
                Ok(_) => cleaned += 1,
                Err(e) => error!(workspace = %workspace.name, error = %e, "Abandoned cleanup failed"),
            }
        }
        cleaned
    }

    pub fn list_archived(&self, unit_id: Option<&str>) -> WorkspaceResult<Vec<Workspace>> {
        Ok(self
            .store
            .list_archived()?
            .into_iter()
            .filter(|w| unit_id.is_none_or(|u| w.unit_id == u))
            .collect())
    }

    /// Overwrites an active record as-is.
    pub fn save(&self, workspace: &Workspace) -> WorkspaceResult<()> {
        self.store.save(workspace)
    }
}

#[cfg(test)]
#[path = "tests/manager_tests.rs"]
mod tests;
