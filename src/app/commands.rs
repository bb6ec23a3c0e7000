//! Command handlers. Each returns the process exit code.

use super::cli::{AnalyzeArgs, Cli, Command, RegistryCommand, WorkspaceCommand};
use crate::analysis::{analyze, parse_file_tasks, DomainClassifier};
use crate::config::{UnitflowConfig, CONFIG_FILE_NAME};
use crate::git;
use crate::orchestrator::Orchestrator;
use crate::registry::{NewUnit, Registry, Selection};
use crate::worker::{CommandWorker, WorkerCommandConfig};
use crate::workspace::WorkspaceManager;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const EXIT_SUCCESS: i32 = 0;
/// `analyze` on a plan that should run sequentially.
pub const EXIT_NOT_VIABLE: i32 = 1;
/// `run` finished with any status other than `succeeded`.
pub const EXIT_RUN_FAILED: i32 = 2;
/// `registry next` found nothing to select.
pub const EXIT_NOTHING_SELECTED: i32 = 3;

pub async fn execute(cli: Cli) -> Result<i32> {
    let Cli {
        repo,
        config,
        command,
    } = cli;
    debug!(repo = %repo.display(), git_sha = env!("UNITFLOW_GIT_SHA"), "Starting unitflow");

    match command {
        Command::Analyze(args) => {
            let repo = resolve_repo(&repo)?;
            let config = UnitflowConfig::resolve(&repo, config.as_deref())?;
            analyze_command(&config, &args)
        }
        Command::Registry(cmd) => {
            let repo = resolve_repo(&repo)?;
            let config = UnitflowConfig::resolve(&repo, config.as_deref())?;
            registry_command(&repo, &config, cmd)
        }
        Command::Workspace(cmd) => {
            let repo = resolve_git_repo(&repo)?;
            let config = UnitflowConfig::resolve(&repo, config.as_deref())?;
            workspace_command(&repo, &config, cmd)
        }
        Command::Run { unit_id } => {
            let repo = resolve_git_repo(&repo)?;
            let config = UnitflowConfig::resolve(&repo, config.as_deref())?;
            run_command(&repo, config, unit_id.as_deref()).await
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The enclosing repository's top level when inside git, else the directory itself.
fn resolve_repo(repo: &Path) -> Result<PathBuf> {
    if git::is_git_repo(repo) {
        return Ok(git::repo_root(repo)?);
    }
    repo.canonicalize()
        .with_context(|| format!("Repository directory not found: {}", repo.display()))
}

fn resolve_git_repo(repo: &Path) -> Result<PathBuf> {
    anyhow::ensure!(
        git::is_git_repo(repo),
        "Not a git repository: {}",
        repo.display()
    );
    Ok(git::repo_root(repo)?)
}

fn analyze_command(config: &UnitflowConfig, args: &AnalyzeArgs) -> Result<i32> {
    let files = match (&args.files, &args.file_tasks) {
        (Some(files), _) => files.clone(),
        (None, Some(path)) => {
            let markdown = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read file task plan: {}", path.display()))?;
            parse_file_tasks(&markdown).context("Failed to build file task parser")?
        }
        (None, None) => anyhow::bail!("Provide a file task plan or --files"),
    };

    let mut thresholds = config.analysis;
    if let Some(n) = args.min_files {
        thresholds.min_files = n;
    }
    if let Some(n) = args.min_domains {
        thresholds.min_domains = n;
    }
    if let Some(pct) = args.max_overlap {
        thresholds.max_overlap_pct = pct;
    }

    let classifier = DomainClassifier::new(&config.domains).context("Invalid domain patterns")?;
    let plan = analyze(&classifier, &files, &thresholds, args.description.as_deref());
    print_json(&plan)?;
    Ok(if plan.viable {
        EXIT_SUCCESS
    } else {
        EXIT_NOT_VIABLE
    })
}

fn load_registry(repo: &Path, config: &UnitflowConfig) -> Result<Registry> {
    let path = config.registry_path(repo);
    Registry::load(&path).with_context(|| format!("Failed to load registry: {}", path.display()))
}

fn registry_command(repo: &Path, config: &UnitflowConfig, cmd: RegistryCommand) -> Result<i32> {
    match cmd {
        RegistryCommand::Init {
            project,
            master_spec,
        } => {
            let path = config.registry_path(repo);
            let mut registry = Registry::init(&path, &project)
                .with_context(|| format!("Failed to create registry: {}", path.display()))?;
            if let Some(master_spec) = master_spec {
                registry.set_master_spec_path(master_spec);
                registry.save()?;
            }
            info!(path = %path.display(), "Initialized registry");
            print_json(registry.data())?;
        }
        RegistryCommand::Add {
            title,
            slug,
            description,
            tags,
            blocked_by,
            integrates_with,
        } => {
            let mut registry = load_registry(repo, config)?;
            let unit = registry.new_unit(NewUnit {
                title,
                slug,
                description,
                tags: tags.into_iter().collect(),
                blocked_by: blocked_by.into_iter().collect(),
                integrates_with: integrates_with.into_iter().collect(),
            });
            registry.create(unit.clone())?;
            registry.save()?;
            let dir = repo.join(&unit.directory);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create unit directory: {}", dir.display()))?;
            info!(unit = %unit.unit_id, dir = %dir.display(), "Defined unit");
            print_json(registry.get(&unit.unit_id).unwrap_or(&unit))?;
        }
        RegistryCommand::Status { unit_id, status } => {
            let mut registry = load_registry(repo, config)?;
            if registry.update_status(&unit_id, status)? {
                registry.save()?;
                info!(unit = %unit_id, status = %status, "Updated unit status");
            }
            print_json(&registry.get(&unit_id))?;
        }
        RegistryCommand::Show { unit_id } => {
            let registry = load_registry(repo, config)?;
            let unit = registry
                .get(&unit_id)
                .with_context(|| format!("Unknown unit: {}", unit_id))?;
            print_json(unit)?;
        }
        RegistryCommand::Tracker {
            unit_id,
            issue,
            url,
        } => {
            let mut registry = load_registry(repo, config)?;
            registry.set_tracker(&unit_id, issue, &url)?;
            registry.save()?;
            print_json(&registry.get(&unit_id))?;
        }
        RegistryCommand::List { status } => {
            let registry = load_registry(repo, config)?;
            let units: Vec<_> = match status {
                Some(status) => registry.units_by_status(status),
                None => registry.units().iter().collect(),
            };
            print_json(&units)?;
        }
        RegistryCommand::Order => {
            let registry = load_registry(repo, config)?;
            print_json(&registry.topological_order()?)?;
        }
        RegistryCommand::Coverage => {
            let mut registry = load_registry(repo, config)?;
            let coverage = registry.refresh_coverage(repo)?.clone();
            registry.save()?;
            print_json(&serde_json::json!({
                "master_spec": registry.data().master_spec_path,
                "coverage": coverage,
                "suggested": coverage.suggested(),
            }))?;
        }
        RegistryCommand::Next => {
            let registry = load_registry(repo, config)?;
            match crate::registry::select_next(registry.units()) {
                Selection::Selected(unit) => print_json(&unit)?,
                Selection::NoReadyUnits => {
                    eprintln!("No units are ready");
                    return Ok(EXIT_NOTHING_SELECTED);
                }
                Selection::AllBlocked { blocked } => {
                    eprintln!("All ready units are blocked: {}", blocked.join(", "));
                    return Ok(EXIT_NOTHING_SELECTED);
                }
            }
        }
    }
    Ok(EXIT_SUCCESS)
}

fn workspace_command(repo: &Path, config: &UnitflowConfig, cmd: WorkspaceCommand) -> Result<i32> {
    let manager = WorkspaceManager::new(repo, &config.workspace.root);
    match cmd {
        WorkspaceCommand::List { unit, status } => {
            print_json(&manager.list(unit.as_deref(), status)?)?;
        }
        WorkspaceCommand::Cleanup {
            name,
            delete_branch,
            force,
        } => {
            print_json(&manager.cleanup(&name, delete_branch, force)?)?;
        }
        WorkspaceCommand::CleanupUnit {
            unit_id,
            delete_branches,
        } => {
            let cleaned = manager.cleanup_batch(&unit_id, delete_branches);
            print_json(&serde_json::json!({ "unit_id": unit_id, "cleaned": cleaned }))?;
        }
        WorkspaceCommand::Sweep { max_age_days } => {
            let days = max_age_days.unwrap_or(config.workspace.abandoned_after_days);
            let cleaned = manager.cleanup_abandoned(chrono::Duration::days(i64::from(days)));
            print_json(&serde_json::json!({ "max_age_days": days, "cleaned": cleaned }))?;
        }
        WorkspaceCommand::Archived { unit } => {
            print_json(&manager.list_archived(unit.as_deref())?)?;
        }
    }
    Ok(EXIT_SUCCESS)
}

async fn run_command(repo: &Path, config: UnitflowConfig, unit_id: Option<&str>) -> Result<i32> {
    let worker = command_worker(repo, &config)?;
    let orchestrator = Orchestrator::new(repo, config, Arc::new(worker));
    let report = orchestrator.run(unit_id).await?;
    print_json(&report)?;
    Ok(if report.succeeded() {
        EXIT_SUCCESS
    } else {
        EXIT_RUN_FAILED
    })
}

fn command_worker(repo: &Path, config: &UnitflowConfig) -> Result<CommandWorker> {
    let Some(program) = config.worker.command.as_deref() else {
        anyhow::bail!(
            "No worker command configured; set worker.command in {}",
            CONFIG_FILE_NAME
        );
    };
    let program = resolve_program(repo, program)?;
    let worker_config =
        WorkerCommandConfig::new(program.to_string_lossy(), config.worker.args.clone())
            .with_timeout(Duration::from_secs(config.worker.timeout_secs));
    Ok(CommandWorker::new(worker_config))
}

/// Workers run inside worktrees, so relative program paths are pinned to the
/// repository and bare names are looked up on `PATH` up front.
fn resolve_program(repo: &Path, program: &str) -> Result<PathBuf> {
    if program.contains('/') {
        let path = repo.join(program);
        anyhow::ensure!(path.exists(), "Worker command not found: {}", path.display());
        return Ok(path);
    }
    which::which(program).with_context(|| format!("Worker command '{}' not found on PATH", program))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
