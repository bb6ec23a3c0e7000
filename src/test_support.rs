//! Shared fixtures for tests that need a real git repository.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

pub fn git_cmd(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("git should be installed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Creates a repository on branch `main` with one initial commit.
pub fn init_repo() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path();
    git_cmd(path, &["init", "--quiet"]);
    git_cmd(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git_cmd(path, &["config", "user.email", "dev@example.com"]);
    git_cmd(path, &["config", "user.name", "Dev"]);
    git_cmd(path, &["config", "commit.gpgsign", "false"]);
    std::fs::write(path.join(".gitignore"), ".worktrees/\n.tasks/\n").unwrap();
    std::fs::write(path.join("README.md"), "# fixture\n").unwrap();
    git_cmd(path, &["add", "."]);
    git_cmd(path, &["commit", "--quiet", "-m", "initial"]);
    dir
}

/// Writes `content` to `rel` inside `dir` and commits it.
pub fn commit_file(dir: &Path, rel: &str, content: &str, message: &str) {
    let target = dir.join(rel);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&target, content).unwrap();
    git_cmd(dir, &["add", rel]);
    git_cmd(dir, &["commit", "--quiet", "-m", message]);
}
