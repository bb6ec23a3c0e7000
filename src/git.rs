//! Thin wrappers over the `git` CLI for worktrees, branches, and merges.
//!
//! Every helper runs `git` with an explicit working directory; nothing here
//! depends on the process's current directory.

use crate::error::{WorkspaceError, WorkspaceResult};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured result of one git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// Combined stderr/stdout text for error messages.
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs `git <args>` in `dir`, failing only when git cannot be spawned.
pub fn run_git(dir: &Path, args: &[&str]) -> WorkspaceResult<GitOutput> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .map_err(|e| WorkspaceError::Git(format!("Failed to run git {}: {}", args.join(" "), e)))?;
    Ok(GitOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Runs `git <args>` in `dir` and maps a non-zero exit to [`WorkspaceError::Git`].
fn git_checked(dir: &Path, args: &[&str]) -> WorkspaceResult<GitOutput> {
    let output = run_git(dir, args)?;
    if !output.success {
        return Err(WorkspaceError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            output.message()
        )));
    }
    Ok(output)
}

/// Check if a directory is inside a git repository.
pub fn is_git_repo(path: &Path) -> bool {
    run_git(path, &["rev-parse", "--git-dir"])
        .map(|o| o.success)
        .unwrap_or(false)
}

/// Returns the top-level directory of the repository containing `path`.
pub fn repo_root(path: &Path) -> WorkspaceResult<PathBuf> {
    let output = git_checked(path, &["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(output.stdout.trim()))
}

/// Returns the checked-out branch, or `None` on a detached HEAD.
pub fn current_branch(repo: &Path) -> WorkspaceResult<Option<String>> {
    let output = git_checked(repo, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let branch = output.stdout.trim();
    Ok((branch != "HEAD").then(|| branch.to_string()))
}

pub fn branch_exists(repo: &Path, branch: &str) -> bool {
    let reference = format!("refs/heads/{}", branch);
    run_git(repo, &["rev-parse", "--verify", "--quiet", &reference])
        .map(|o| o.success)
        .unwrap_or(false)
}

/// Creates `branch` from `base` and checks it out at `path`.
pub fn add_worktree(repo: &Path, path: &Path, branch: &str, base: &str) -> WorkspaceResult<()> {
    let path_str = path.to_string_lossy();
    git_checked(repo, &["worktree", "add", "-b", branch, &path_str, base])?;
    Ok(())
}

/// Removes a registered worktree. `force` discards local modifications.
pub fn remove_worktree(repo: &Path, path: &Path, force: bool) -> WorkspaceResult<()> {
    let path_str = path.to_string_lossy();
    let mut args = vec!["worktree", "remove"];
    if force {
        args.push("--force");
    }
    args.push(&path_str);
    git_checked(repo, &args)?;
    Ok(())
}

/// Drops administrative entries for worktrees whose directories are gone.
pub fn prune_worktrees(repo: &Path) -> WorkspaceResult<()> {
    git_checked(repo, &["worktree", "prune"])?;
    Ok(())
}

/// Deletes a local branch (`-d`, or `-D` when forced).
pub fn delete_branch(repo: &Path, branch: &str, force: bool) -> WorkspaceResult<()> {
    let flag = if force { "-D" } else { "-d" };
    git_checked(repo, &["branch", flag, branch])?;
    Ok(())
}

/// Whether every commit on `branch` is already reachable from `base`.
pub fn is_ancestor(repo: &Path, branch: &str, base: &str) -> WorkspaceResult<bool> {
    Ok(run_git(repo, &["merge-base", "--is-ancestor", branch, base])?.success)
}

/// Commits reachable from `branch` but not from `base`, oldest first.
pub fn commits_between(repo: &Path, base: &str, branch: &str) -> WorkspaceResult<Vec<String>> {
    let range = format!("{}..{}", base, branch);
    let output = git_checked(repo, &["rev-list", "--reverse", &range])?;
    Ok(output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn checkout(repo: &Path, branch: &str) -> WorkspaceResult<()> {
    git_checked(repo, &["checkout", branch])?;
    Ok(())
}

/// Attempts `git merge --no-ff`; the caller inspects the output.
pub fn merge_no_ff(repo: &Path, branch: &str, message: &str) -> WorkspaceResult<GitOutput> {
    run_git(repo, &["merge", "--no-ff", "-m", message, branch])
}

/// Paths left unmerged by an in-progress merge.
pub fn conflicted_files(repo: &Path) -> WorkspaceResult<Vec<String>> {
    let output = git_checked(repo, &["diff", "--name-only", "--diff-filter=U"])?;
    Ok(output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn abort_merge(repo: &Path) -> WorkspaceResult<()> {
    git_checked(repo, &["merge", "--abort"])?;
    Ok(())
}

/// Replaces characters that are awkward in ref names and directory names.
pub fn sanitize_ref_component(raw: &str) -> String {
    let safe: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = safe.trim_matches('-');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[path = "tests/git_tests.rs"]
mod tests;
