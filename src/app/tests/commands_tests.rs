use super::*;
use crate::registry::UnitStatus;
use crate::test_support::init_repo;
use clap::Parser;
use tempfile::TempDir;

fn cli(repo: &Path, args: &[&str]) -> Cli {
    let mut argv = vec![
        "unitflow".to_string(),
        "--repo".to_string(),
        repo.display().to_string(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    Cli::try_parse_from(argv).unwrap()
}

async fn exit_code(repo: &Path, args: &[&str]) -> i32 {
    execute(cli(repo, args)).await.unwrap()
}

#[tokio::test]
async fn registry_commands_drive_unit_lifecycle() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path();

    assert_eq!(exit_code(repo, &["registry", "init", "demo"]).await, EXIT_SUCCESS);
    assert_eq!(exit_code(repo, &["registry", "add", "Schema"]).await, EXIT_SUCCESS);
    assert_eq!(
        exit_code(repo, &["registry", "add", "API", "--blocked-by", "UNIT-001"]).await,
        EXIT_SUCCESS
    );

    assert_eq!(exit_code(repo, &["registry", "next"]).await, EXIT_NOTHING_SELECTED);
    assert_eq!(
        exit_code(repo, &["registry", "status", "UNIT-002", "ready"]).await,
        EXIT_SUCCESS
    );
    assert_eq!(exit_code(repo, &["registry", "next"]).await, EXIT_NOTHING_SELECTED);
    assert_eq!(
        exit_code(repo, &["registry", "status", "UNIT-001", "ready"]).await,
        EXIT_SUCCESS
    );
    assert_eq!(exit_code(repo, &["registry", "next"]).await, EXIT_SUCCESS);
    assert_eq!(exit_code(repo, &["registry", "order"]).await, EXIT_SUCCESS);
    assert_eq!(
        exit_code(
            repo,
            &["registry", "tracker", "UNIT-001", "42", "https://tracker.example/42"]
        )
        .await,
        EXIT_SUCCESS
    );
    assert_eq!(
        exit_code(repo, &["registry", "list", "--status", "ready"]).await,
        EXIT_SUCCESS
    );

    let config = UnitflowConfig::default_config().unwrap();
    let registry = Registry::load(&config.registry_path(repo)).unwrap();
    let schema = registry.get("UNIT-001").unwrap();
    assert!(schema.dependencies.blocks.contains("UNIT-002"));
    assert_eq!(schema.status, UnitStatus::Ready);
    assert!(repo.join(&schema.directory).is_dir());
    assert_eq!(schema.tracker_issue, Some(42));
}

#[tokio::test]
async fn registry_rejects_status_regression() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path();
    exit_code(repo, &["registry", "init", "demo"]).await;
    exit_code(repo, &["registry", "add", "Schema"]).await;
    exit_code(repo, &["registry", "status", "UNIT-001", "ready"]).await;

    let err = execute(cli(repo, &["registry", "status", "UNIT-001", "prepared"]))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Status regression"), "{err}");
}

#[tokio::test]
async fn registry_init_refuses_existing_registry() {
    let dir = TempDir::new().unwrap();
    exit_code(dir.path(), &["registry", "init", "demo"]).await;

    assert!(execute(cli(dir.path(), &["registry", "init", "demo"]))
        .await
        .is_err());
}

#[tokio::test]
async fn registry_coverage_is_computed_and_saved() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path();
    exit_code(repo, &["registry", "init", "demo", "--master-spec", "docs/reqs.md"]).await;
    exit_code(repo, &["registry", "add", "Accounts"]).await;
    std::fs::create_dir_all(repo.join("docs")).unwrap();
    std::fs::write(repo.join("docs/reqs.md"), "- REQ-001: Signup\n- REQ-002: Login\n").unwrap();

    let config = UnitflowConfig::default_config().unwrap();
    let unit_dir = Registry::load(&config.registry_path(repo))
        .unwrap()
        .get("UNIT-001")
        .unwrap()
        .directory
        .clone();
    std::fs::write(repo.join(unit_dir).join("spec.md"), "Delivers REQ-002.").unwrap();

    assert_eq!(exit_code(repo, &["registry", "coverage"]).await, EXIT_SUCCESS);

    let registry = Registry::load(&config.registry_path(repo)).unwrap();
    let coverage = registry.data().master_spec_coverage.clone().unwrap();
    assert_eq!(coverage.covered_requirements, 1);
    assert_eq!(coverage.uncovered_requirements, vec!["REQ-001"]);
}

#[tokio::test]
async fn analyze_exit_code_follows_viability() {
    let dir = TempDir::new().unwrap();
    let parallel = "src/api/users.py,src/api/auth.py,src/components/Login.tsx,\
                    src/components/Signup.tsx,migrations/001_users.sql";
    assert_eq!(
        exit_code(dir.path(), &["analyze", "--files", parallel]).await,
        EXIT_SUCCESS
    );
    assert_eq!(
        exit_code(dir.path(), &["analyze", "--files", "src/api/users.py,src/api/auth.py"]).await,
        EXIT_NOT_VIABLE
    );
    assert_eq!(
        exit_code(
            dir.path(),
            &["analyze", "--files", "src/api/users.py,src/components/A.tsx", "--min-files", "2"]
        )
        .await,
        EXIT_SUCCESS
    );
}

#[tokio::test]
async fn analyze_reads_task_plan() {
    let dir = TempDir::new().unwrap();
    let plan = dir.path().join("file-tasks.md");
    std::fs::write(
        &plan,
        "## Files\n\n- `src/api/users.py` - endpoints\n- `src/components/Users.tsx` - page\n",
    )
    .unwrap();
    let plan_arg = plan.display().to_string();

    assert_eq!(
        exit_code(dir.path(), &["analyze", &plan_arg, "--min-files", "2"]).await,
        EXIT_SUCCESS
    );
}

#[tokio::test]
async fn workspace_commands_require_git() {
    let dir = TempDir::new().unwrap();
    let err = execute(cli(dir.path(), &["workspace", "list"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Not a git repository"), "{err}");
}

#[tokio::test]
async fn workspace_list_is_empty_in_fresh_repo() {
    let repo = init_repo();
    assert_eq!(exit_code(repo.path(), &["workspace", "list"]).await, EXIT_SUCCESS);
    assert_eq!(exit_code(repo.path(), &["workspace", "sweep"]).await, EXIT_SUCCESS);
}

#[tokio::test]
async fn run_requires_worker_command() {
    let repo = init_repo();
    let err = execute(cli(repo.path(), &["run"])).await.unwrap_err();
    assert!(err.to_string().contains("worker.command"), "{err}");
}

#[test]
fn resolve_program_pins_relative_paths_to_repo() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("worker.sh"), "#!/bin/sh\n").unwrap();

    assert_eq!(
        resolve_program(dir.path(), "./worker.sh").unwrap(),
        dir.path().join("./worker.sh")
    );
    assert!(resolve_program(dir.path(), "./missing.sh").is_err());
    assert!(resolve_program(dir.path(), "sh").unwrap().is_absolute());
    assert!(resolve_program(dir.path(), "unitflow-no-such-worker").is_err());
}
