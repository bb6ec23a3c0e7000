use super::*;
use crate::test_support::{commit_file, git_cmd, init_repo};
use tempfile::TempDir;

fn manager() -> (TempDir, WorkspaceManager) {
    let repo = init_repo();
    let manager = WorkspaceManager::new(repo.path(), Path::new(".worktrees"));
    (repo, manager)
}

fn request(domain: &str) -> WorkspaceRequest {
    WorkspaceRequest {
        domain: domain.to_string(),
        task_description: format!("{domain} work"),
    }
}

#[test]
fn test_create_persists_metadata_and_worktree() {
    let (_repo, manager) = manager();

    let ws = manager
        .create("UNIT-001", "backend", "main", "Backend API implementation (2 files)")
        .unwrap();

    assert_eq!(ws.status, WorkspaceStatus::Created);
    assert_eq!(ws.branch, "unitflow/UNIT-001/backend");
    assert!(ws.name.starts_with("UNIT-001-backend-"));
    assert_eq!(ws.name.len(), "UNIT-001-backend-".len() + 8);
    assert!(ws.path.join("README.md").exists());
    assert!(manager
        .root()
        .join(".metadata")
        .join(format!("{}.json", ws.name))
        .exists());
    assert_eq!(manager.get(&ws.name).unwrap(), ws);
}

#[test]
fn test_create_rejects_missing_base_branch() {
    let (_repo, manager) = manager();
    let err = manager.create("UNIT-001", "backend", "develop", "").unwrap_err();
    match err {
        WorkspaceError::Creation { reason, .. } => assert!(reason.contains("develop")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_create_rejects_existing_branch() {
    let (repo, manager) = manager();
    git_cmd(repo.path(), &["branch", "unitflow/UNIT-001/backend"]);

    let err = manager.create("UNIT-001", "backend", "main", "").unwrap_err();
    assert!(matches!(err, WorkspaceError::Creation { .. }));
    assert!(manager.list(None, None).unwrap().is_empty());
}

#[test]
fn test_provision_rolls_back_siblings_on_failure() {
    let (repo, manager) = manager();
    git_cmd(repo.path(), &["branch", "unitflow/UNIT-001/frontend"]);

    let err = manager
        .provision(
            "UNIT-001",
            &[request("backend"), request("database"), request("frontend")],
            "main",
        )
        .unwrap_err();

    assert!(matches!(err, WorkspaceError::Creation { ref domain, .. } if domain == "frontend"));
    assert!(manager.list(Some("UNIT-001"), None).unwrap().is_empty());
    assert!(!git::branch_exists(repo.path(), "unitflow/UNIT-001/backend"));
    assert!(!git::branch_exists(repo.path(), "unitflow/UNIT-001/database"));
    assert_eq!(manager.list_archived(Some("UNIT-001")).unwrap().len(), 2);
}

#[test]
fn test_list_filters_and_orders_newest_first() {
    let (_repo, manager) = manager();
    let first = manager.create("UNIT-001", "backend", "main", "").unwrap();
    let second = manager.create("UNIT-001", "frontend", "main", "").unwrap();
    let other = manager.create("UNIT-002", "backend", "main", "").unwrap();
    manager
        .update_status(&second.name, WorkspaceStatus::Assigned, StatusUpdate::worker("frontend-worker"))
        .unwrap();

    let unit_one: Vec<String> = manager
        .list(Some("UNIT-001"), None)
        .unwrap()
        .into_iter()
        .map(|w| w.name)
        .collect();
    assert_eq!(unit_one, vec![second.name.clone(), first.name.clone()]);

    let assigned = manager.list(None, Some(WorkspaceStatus::Assigned)).unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].worker_id.as_deref(), Some("frontend-worker"));

    assert_eq!(manager.list(Some("UNIT-002"), None).unwrap()[0].name, other.name);
}

#[test]
fn test_update_status_stamps_timestamps_once() {
    let (_repo, manager) = manager();
    let ws = manager.create("UNIT-001", "backend", "main", "").unwrap();

    let started = manager
        .update_status(&ws.name, WorkspaceStatus::InProgress, StatusUpdate::default())
        .unwrap();
    let again = manager
        .update_status(&ws.name, WorkspaceStatus::InProgress, StatusUpdate::default())
        .unwrap();
    assert!(started.started_at.is_some());
    assert_eq!(started.started_at, again.started_at);

    let failed = manager
        .update_status(&ws.name, WorkspaceStatus::Failed, StatusUpdate::error("worker crashed"))
        .unwrap();
    assert!(failed.completed_at.is_some());
    assert_eq!(failed.error_message.as_deref(), Some("worker crashed"));
}

#[test]
fn test_update_status_unknown_workspace() {
    let (_repo, manager) = manager();
    let err = manager
        .update_status("nope", WorkspaceStatus::Failed, StatusUpdate::default())
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::NotFound(_)));
}

#[test]
fn test_cleanup_requires_terminal_status_without_force() {
    let (_repo, manager) = manager();
    for status in [
        WorkspaceStatus::Created,
        WorkspaceStatus::Assigned,
        WorkspaceStatus::InProgress,
        WorkspaceStatus::Conflict,
    ] {
        let domain = format!("d{}", status.as_str().replace('_', ""));
        let ws = manager.create("UNIT-001", &domain, "main", "").unwrap();
        manager.update_status(&ws.name, status, StatusUpdate::default()).unwrap();

        let err = manager.cleanup(&ws.name, false, false).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotTerminal { .. }), "{status}");
        assert!(manager.get(&ws.name).is_ok());
    }
}

#[test]
fn test_cleanup_terminal_removes_record_and_archives() {
    let (repo, manager) = manager();
    for status in [
        WorkspaceStatus::Completed,
        WorkspaceStatus::Failed,
        WorkspaceStatus::Merged,
    ] {
        let domain = format!("d{}", status.as_str());
        let ws = manager.create("UNIT-001", &domain, "main", "").unwrap();
        manager.update_status(&ws.name, status, StatusUpdate::default()).unwrap();

        let cleaned = manager.cleanup(&ws.name, true, false).unwrap();
        assert_eq!(cleaned.status, WorkspaceStatus::Cleaned);
        assert!(cleaned.cleaned_at.is_some());
        assert!(!ws.path.exists());
        assert!(!git::branch_exists(repo.path(), &ws.branch));
        assert!(matches!(manager.get(&ws.name), Err(WorkspaceError::NotFound(_))));
    }
    assert_eq!(manager.list_archived(None).unwrap().len(), 3);
}

#[test]
fn test_forced_cleanup_of_dirty_unmerged_workspace() {
    let (repo, manager) = manager();
    let ws = manager.create("UNIT-001", "backend", "main", "").unwrap();
    commit_file(&ws.path, "src/api/a.py", "a\n", "work");
    std::fs::write(ws.path.join("scratch.txt"), "uncommitted").unwrap();
    manager
        .update_status(&ws.name, WorkspaceStatus::InProgress, StatusUpdate::default())
        .unwrap();

    manager.cleanup(&ws.name, true, true).unwrap();
    assert!(!ws.path.exists());
    assert!(!git::branch_exists(repo.path(), &ws.branch));
}

#[test]
fn test_cleanup_of_failed_workspace_discards_uncommitted_files() {
    let (_repo, manager) = manager();
    let ws = manager.create("UNIT-001", "backend", "main", "").unwrap();
    std::fs::write(ws.path.join("README.md"), "half-edited\n").unwrap();
    std::fs::write(ws.path.join("scratch.txt"), "untracked").unwrap();
    manager
        .update_status(&ws.name, WorkspaceStatus::Failed, StatusUpdate::error("worker crashed"))
        .unwrap();

    let cleaned = manager.cleanup(&ws.name, false, false).unwrap();

    assert_eq!(cleaned.status, WorkspaceStatus::Cleaned);
    assert!(!ws.path.exists());
    assert!(matches!(manager.get(&ws.name), Err(WorkspaceError::NotFound(_))));
    assert_eq!(manager.list_archived(Some("UNIT-001")).unwrap().len(), 1);
}

#[test]
fn test_cleanup_keeps_unmerged_branch_and_still_archives() {
    let (repo, manager) = manager();
    let ws = manager.create("UNIT-001", "backend", "main", "").unwrap();
    commit_file(&ws.path, "src/api/a.py", "a\n", "unmerged work");
    manager
        .update_status(&ws.name, WorkspaceStatus::Failed, StatusUpdate::default())
        .unwrap();

    manager.cleanup(&ws.name, true, false).unwrap();

    assert!(!ws.path.exists());
    assert!(git::branch_exists(repo.path(), &ws.branch));
    let log = git_cmd(repo.path(), &["log", "--format=%s", &ws.branch]);
    assert!(log.contains("unmerged work"));
    assert!(matches!(manager.get(&ws.name), Err(WorkspaceError::NotFound(_))));
    assert!(manager.list(None, None).unwrap().is_empty());
}

#[test]
fn test_cleanup_deletes_branch_once_merged() {
    let (repo, manager) = manager();
    let ws = manager.create("UNIT-001", "backend", "main", "").unwrap();
    commit_file(&ws.path, "src/api/a.py", "a\n", "work");
    git_cmd(repo.path(), &["merge", "--no-ff", "--quiet", "-m", "merge", &ws.branch]);
    manager
        .update_status(&ws.name, WorkspaceStatus::Merged, StatusUpdate::default())
        .unwrap();

    manager.cleanup(&ws.name, true, false).unwrap();

    assert!(!git::branch_exists(repo.path(), &ws.branch));
}

#[test]
fn test_cleanup_batch_skips_non_terminal() {
    let (_repo, manager) = manager();
    let done = manager.create("UNIT-001", "backend", "main", "").unwrap();
    let busy = manager.create("UNIT-001", "frontend", "main", "").unwrap();
    let foreign = manager.create("UNIT-002", "backend", "main", "").unwrap();
    manager.update_status(&done.name, WorkspaceStatus::Completed, StatusUpdate::default()).unwrap();
    manager.update_status(&busy.name, WorkspaceStatus::InProgress, StatusUpdate::default()).unwrap();
    manager.update_status(&foreign.name, WorkspaceStatus::Completed, StatusUpdate::default()).unwrap();

    assert_eq!(manager.cleanup_batch("UNIT-001", true), 1);
    let remaining: Vec<String> = manager.list(None, None).unwrap().into_iter().map(|w| w.name).collect();
    assert!(remaining.contains(&busy.name));
    assert!(remaining.contains(&foreign.name));
    assert!(!remaining.contains(&done.name));
}

#[test]
fn test_cleanup_abandoned_ages_out_stale_active_workspaces() {
    let (_repo, manager) = manager();
    let stale = manager.create("UNIT-001", "backend", "main", "").unwrap();
    let fresh = manager.create("UNIT-001", "frontend", "main", "").unwrap();
    let finished = manager.create("UNIT-001", "docs", "main", "").unwrap();

    let mut aged = manager
        .update_status(&stale.name, WorkspaceStatus::Assigned, StatusUpdate::default())
        .unwrap();
    aged.created_at = Utc::now() - Duration::days(10);
    aged.assigned_at = Some(Utc::now() - Duration::days(9));
    manager.save(&aged).unwrap();

    let mut old_done = manager
        .update_status(&finished.name, WorkspaceStatus::Completed, StatusUpdate::default())
        .unwrap();
    old_done.created_at = Utc::now() - Duration::days(30);
    old_done.completed_at = Some(Utc::now() - Duration::days(30));
    manager.save(&old_done).unwrap();

    assert_eq!(manager.cleanup_abandoned(Duration::days(7)), 1);
    let remaining: Vec<String> = manager.list(None, None).unwrap().into_iter().map(|w| w.name).collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&fresh.name));
    assert!(remaining.contains(&finished.name));
}

#[test]
fn test_commits_since_base() {
    let (_repo, manager) = manager();
    let ws = manager.create("UNIT-001", "backend", "main", "").unwrap();
    assert!(manager.commits_since_base(&ws).unwrap().is_empty());

    commit_file(&ws.path, "src/api/a.py", "a\n", "one");
    commit_file(&ws.path, "src/api/b.py", "b\n", "two");
    assert_eq!(manager.commits_since_base(&ws).unwrap().len(), 2);
}
