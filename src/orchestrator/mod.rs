//! End-to-end execution of one work unit.
//!
//! A run selects a ready unit, decides between parallel and sequential
//! execution, provisions one workspace per domain, dispatches workers, merges
//! their branches in priority order, validates the merged result, and records
//! the outcome in the registry. Each run leaves a [`RunReport`] on disk and a
//! trail of structured events.

mod lock;
mod report;

pub use lock::{RunLock, LOCK_FILE_NAME};
pub use report::{RunReport, RunStatus, RUNS_DIR};

use crate::analysis::{
    analyze, dedup_preserving_order, parse_file_tasks, task_description, DomainClassifier,
    ParallelPlan,
};
use crate::config::UnitflowConfig;
use crate::error::RunError;
use crate::merge::{MergeCoordinator, MergeOutcome, MergeStatus, MergeSummary, WorkspaceRun};
use crate::paths;
use crate::registry::{select_next, ExecutionMode, Registry, Selection, UnitStatus, WorkUnit};
use crate::structured_logger::StructuredLogger;
use crate::validation::{
    run_validation_loop, CommandRepairWorker, CommandVerifier, RepairWorker, ValidationOutcome,
    ValidationReport, Verifier,
};
use crate::worker::{dispatch_all, ExecutionWorker, WorkerRequest, WorkerResult};
use crate::workspace::{StatusUpdate, Workspace, WorkspaceManager, WorkspaceRequest, WorkspaceStatus};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Task plan location inside a unit directory.
pub const FILE_TASKS_PATH: &str = "implementation-details/file-tasks.md";

/// Domain label used for the single workspace of a sequential run.
pub const SEQUENTIAL_DOMAIN: &str = "all";

/// Directory under the workspace root where workers write result files.
const RESULTS_DIR: &str = ".results";

/// One workspace's worth of work, before provisioning.
#[derive(Debug, Clone)]
struct Assignment {
    domain: String,
    task_description: String,
    files: Vec<String>,
}

/// Emits a structured event for every phase change.
struct PhaseLog<'a> {
    logger: &'a StructuredLogger,
    current: &'static str,
}

impl<'a> PhaseLog<'a> {
    fn new(logger: &'a StructuredLogger) -> Self {
        Self {
            logger,
            current: "Selected",
        }
    }

    fn enter(&mut self, next: &'static str) {
        self.logger.log_phase_transition(self.current, next);
        info!(from = self.current, to = next, "Run phase");
        self.current = next;
    }
}

pub struct Orchestrator {
    repo_root: PathBuf,
    config: UnitflowConfig,
    worker: Arc<dyn ExecutionWorker>,
    verifier: Option<Arc<dyn Verifier>>,
    repairer: Option<Arc<dyn RepairWorker>>,
    logs_dir: Option<PathBuf>,
}

impl Orchestrator {
    /// Builds an orchestrator whose verifier and repairer come from the
    /// `validation` section of `config`.
    pub fn new(repo_root: &Path, config: UnitflowConfig, worker: Arc<dyn ExecutionWorker>) -> Self {
        let verifier = config.validation.verify.as_ref().map(|cmd| {
            Arc::new(CommandVerifier::new(cmd.clone(), repo_root)) as Arc<dyn Verifier>
        });
        let repairer = config.validation.repair.as_ref().map(|cmd| {
            Arc::new(CommandRepairWorker::new(cmd.clone(), repo_root)) as Arc<dyn RepairWorker>
        });
        Self {
            repo_root: repo_root.to_path_buf(),
            config,
            worker,
            verifier,
            repairer,
            logs_dir: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_repairer(mut self, repairer: Arc<dyn RepairWorker>) -> Self {
        self.repairer = Some(repairer);
        self
    }

    /// Overrides where the JSONL event log is written.
    pub fn with_logs_dir(mut self, dir: PathBuf) -> Self {
        self.logs_dir = Some(dir);
        self
    }

    fn workspace_manager(&self) -> WorkspaceManager {
        WorkspaceManager::new(&self.repo_root, &self.config.workspace.root)
    }

    /// Runs `unit_id`, or the next selectable unit when `None`.
    ///
    /// Errors are reserved for failures before a unit is chosen (lock,
    /// registry, selection) and for store failures mid-run. Every other
    /// failure is reported through [`RunReport::status`].
    pub async fn run(&self, unit_id: Option<&str>) -> Result<RunReport, RunError> {
        let workspace_root = self.config.workspace_root(&self.repo_root);
        let _lock = RunLock::acquire(&workspace_root)?;

        let registry_path = self.config.registry_path(&self.repo_root);
        let registry = Registry::load(&registry_path)?;
        let unit = select_unit(&registry, unit_id)?;
        info!(unit = %unit.unit_id, title = %unit.title, "Selected unit");

        let run_id = Uuid::new_v4().to_string();
        let logs_dir = match &self.logs_dir {
            Some(dir) => dir.clone(),
            None => paths::logs_dir(&self.repo_root)?,
        };
        let logger = StructuredLogger::new(&run_id, &logs_dir)?;

        let mut report = self.execute(&unit, &run_id, &logger).await?;
        report.finished_at = Utc::now();
        let path = report.save(&workspace_root)?;
        logger.log_run_complete(&report.unit_id, report.status, &report.reason);
        info!(
            unit = %report.unit_id,
            status = %report.status,
            report = %path.display(),
            events = %logger.path().display(),
            "Run finished: {}",
            report.reason
        );
        Ok(report)
    }

    async fn execute(
        &self,
        unit: &WorkUnit,
        run_id: &str,
        logger: &StructuredLogger,
    ) -> Result<RunReport, RunError> {
        let started_at = Utc::now();
        let mut phases = PhaseLog::new(logger);

        phases.enter("Analyzing");
        let files = self.read_file_tasks(unit)?;
        let classifier = DomainClassifier::new(&self.config.domains)
            .context("Invalid domain patterns")?;
        let plan = analyze(
            &classifier,
            &files,
            &self.config.analysis,
            unit.description.as_deref(),
        );
        logger.log(
            "Analyzer",
            serde_json::json!({
                "type": "Plan",
                "viable": plan.viable,
                "reason": plan.reason,
                "file_count": plan.file_count,
                "domain_count": plan.domain_count,
                "overlap_pct": plan.overlap_pct,
            }),
        );
        let (mode, assignments) = assignments_for(unit, &plan, &files);
        info!(unit = %unit.unit_id, mode = %mode, workspaces = assignments.len(), "{}", plan.reason);

        let mut report = new_report(run_id, unit, started_at, mode, plan);

        phases.enter("Provisioning");
        let manager = self.workspace_manager();
        let requests: Vec<WorkspaceRequest> = assignments
            .iter()
            .map(|a| WorkspaceRequest {
                domain: a.domain.clone(),
                task_description: a.task_description.clone(),
            })
            .collect();
        let workspaces = match manager.provision(
            &unit.unit_id,
            &requests,
            &self.config.workspace.base_branch,
        ) {
            Ok(workspaces) => workspaces,
            Err(e) => {
                error!(unit = %unit.unit_id, error = %e, "Provisioning failed");
                report.status = RunStatus::ProvisioningFailed;
                report.reason = RunError::Provisioning(e).to_string();
                return Ok(report);
            }
        };
        report.workspaces = workspaces.iter().map(|w| w.name.clone()).collect();

        phases.enter("Executing");
        let (results, runs) = self
            .run_workers(&manager, unit, &workspaces, &assignments, logger)
            .await?;
        report.worker_results = results;

        phases.enter("Merging");
        let coordinator = MergeCoordinator::new(manager.clone(), self.config.merge_order.clone());
        let summary = coordinator.merge(&unit.unit_id, &self.config.workspace.base_branch, &runs)?;
        for step in &summary.steps {
            logger.log_merge_step(step);
        }
        report.merge = Some(summary.clone());

        if summary.status != MergeStatus::Success {
            report.status = if summary.blocked_domains.is_empty() {
                RunStatus::MergeFailed
            } else {
                RunStatus::WorkersFailed
            };
            report.reason = summary.reason.clone();
            phases.enter("CleaningUp");
            cleanup_merged(&manager, &summary);
            return Ok(report);
        }

        phases.enter("Validating");
        let validation = self.validate().await;
        for attempt in &validation.attempts {
            logger.log_validation_attempt(attempt);
        }

        phases.enter("Recording");
        self.record_implemented(unit, mode, &report.worker_results)?;

        phases.enter("CleaningUp");
        cleanup_merged(&manager, &summary);

        let (status, reason) = match validation.outcome {
            ValidationOutcome::Passed { attempts } => (
                RunStatus::Succeeded,
                format!(
                    "{}; validation passed after {} attempt(s)",
                    summary.reason, attempts
                ),
            ),
            ValidationOutcome::Skipped => (
                RunStatus::Succeeded,
                format!(
                    "{}; validation skipped ({})",
                    summary.reason,
                    validation.note.as_deref().unwrap_or("no verifier")
                ),
            ),
            ValidationOutcome::Exhausted { attempts } => (
                RunStatus::ValidationFailed,
                format!(
                    "{}; validation still failing after {} attempt(s)",
                    summary.reason, attempts
                ),
            ),
        };
        report.status = status;
        report.reason = reason;
        report.validation = Some(validation);
        Ok(report)
    }

    fn read_file_tasks(&self, unit: &WorkUnit) -> Result<Vec<String>, RunError> {
        let path = self.repo_root.join(&unit.directory).join(FILE_TASKS_PATH);
        if !path.exists() {
            warn!(unit = %unit.unit_id, path = %path.display(), "No file task plan; running with an empty file list");
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file task plan: {}", path.display()))?;
        Ok(parse_file_tasks(&content).context("Failed to build file task parser")?)
    }

    async fn run_workers(
        &self,
        manager: &WorkspaceManager,
        unit: &WorkUnit,
        workspaces: &[Workspace],
        assignments: &[Assignment],
        logger: &StructuredLogger,
    ) -> Result<(BTreeMap<String, WorkerResult>, Vec<WorkspaceRun>), RunError> {
        let results_dir = manager.root().join(RESULTS_DIR);
        let mut requests = Vec::with_capacity(workspaces.len());
        for (ws, assignment) in workspaces.iter().zip(assignments) {
            manager.update_status(
                &ws.name,
                WorkspaceStatus::Assigned,
                StatusUpdate::worker(format!("{}-worker", ws.domain)),
            )?;
            manager.update_status(&ws.name, WorkspaceStatus::InProgress, StatusUpdate::default())?;
            logger.log_worker_dispatch(&ws.domain, &ws.name, assignment.files.len());
            requests.push(WorkerRequest {
                unit_id: unit.unit_id.clone(),
                domain: ws.domain.clone(),
                workspace_name: ws.name.clone(),
                workspace_path: ws.path.clone(),
                task_description: ws.task_description.clone(),
                files: assignment.files.clone(),
                result_path: results_dir.join(format!("{}.json", ws.name)),
            });
        }

        let timeout = Duration::from_secs(self.config.worker.timeout_secs);
        let results = dispatch_all(Arc::clone(&self.worker), requests, timeout).await;

        let mut runs = Vec::with_capacity(workspaces.len());
        for ws in workspaces {
            let result = results
                .get(&ws.domain)
                .cloned()
                .unwrap_or_else(|| WorkerResult::failed("No result reported"));
            logger.log_worker_complete(&ws.domain, result.outcome);
            let updated = if result.succeeded() {
                let commits = manager.commits_since_base(ws).unwrap_or_else(|e| {
                    warn!(workspace = %ws.name, error = %e, "Could not list workspace commits");
                    Vec::new()
                });
                manager.update_status(&ws.name, WorkspaceStatus::Completed, StatusUpdate::commits(commits))?
            } else {
                let message = if result.issues.is_empty() {
                    format!("Worker reported {}", result.outcome)
                } else {
                    result.issues.join("; ")
                };
                manager.update_status(&ws.name, WorkspaceStatus::Failed, StatusUpdate::error(message))?
            };
            runs.push(WorkspaceRun {
                workspace: updated,
                outcome: result.outcome,
            });
        }
        Ok((results, runs))
    }

    async fn validate(&self) -> ValidationReport {
        match &self.verifier {
            Some(verifier) => {
                run_validation_loop(
                    verifier.as_ref(),
                    self.repairer.as_deref(),
                    self.config.validation.max_attempts,
                )
                .await
            }
            None => ValidationReport::skipped("no verify command configured"),
        }
    }

    /// Marks the unit implemented and records execution statistics.
    fn record_implemented(
        &self,
        unit: &WorkUnit,
        mode: ExecutionMode,
        results: &BTreeMap<String, WorkerResult>,
    ) -> Result<(), RunError> {
        let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        let created: usize = results.values().map(|r| r.files_created.len()).sum();
        let modified: usize = results.values().map(|r| r.files_modified.len()).sum();

        let mut registry = Registry::load(&self.config.registry_path(&self.repo_root))?;
        registry.update_status(&unit.unit_id, UnitStatus::Implemented)?;
        registry.record_execution(&unit.unit_id, mode, Some(count(created)), Some(count(modified)))?;
        registry.save()?;
        Ok(())
    }
}

fn select_unit(registry: &Registry, unit_id: Option<&str>) -> Result<WorkUnit, RunError> {
    match unit_id {
        Some(id) => {
            let unit = registry
                .get(id)
                .ok_or_else(|| RunError::UnitNotFound(id.to_string()))?;
            if unit.status != UnitStatus::Ready {
                return Err(RunError::UnitNotReady {
                    unit_id: id.to_string(),
                    status: unit.status.to_string(),
                });
            }
            Ok(unit.clone())
        }
        None => match select_next(registry.units()) {
            Selection::Selected(unit) => Ok(unit),
            Selection::NoReadyUnits => Err(RunError::NothingSelected("no units are ready".to_string())),
            Selection::AllBlocked { blocked } => Err(RunError::NothingSelected(format!(
                "all ready units are blocked: {}",
                blocked.join(", ")
            ))),
        },
    }
}

/// One assignment per planned domain when viable, otherwise a single
/// sequential assignment covering every file.
fn assignments_for(
    unit: &WorkUnit,
    plan: &ParallelPlan,
    files: &[String],
) -> (ExecutionMode, Vec<Assignment>) {
    if let Some(execution) = plan.plan.as_ref().filter(|_| plan.viable) {
        let assignments = execution
            .tasks
            .iter()
            .map(|(domain, task)| Assignment {
                domain: domain.clone(),
                task_description: task.task_description.clone(),
                files: task.files.clone(),
            })
            .collect();
        return (ExecutionMode::Parallel, assignments);
    }

    let files = dedup_preserving_order(files);
    let summary = unit.description.as_deref().unwrap_or(&unit.title);
    let assignment = Assignment {
        domain: SEQUENTIAL_DOMAIN.to_string(),
        task_description: task_description(Some(summary), "Sequential implementation", files.len()),
        files,
    };
    (ExecutionMode::Sequential, vec![assignment])
}

fn new_report(
    run_id: &str,
    unit: &WorkUnit,
    started_at: DateTime<Utc>,
    mode: ExecutionMode,
    plan: ParallelPlan,
) -> RunReport {
    RunReport {
        run_id: run_id.to_string(),
        unit_id: unit.unit_id.clone(),
        started_at,
        finished_at: started_at,
        execution_mode: mode,
        plan,
        workspaces: Vec::new(),
        worker_results: BTreeMap::new(),
        merge: None,
        validation: None,
        status: RunStatus::Succeeded,
        reason: String::new(),
    }
}

/// Removes merged workspaces and their branches. Failed and conflicted
/// workspaces stay for manual resolution.
fn cleanup_merged(manager: &WorkspaceManager, summary: &MergeSummary) {
    for step in summary.steps.iter().filter(|s| s.outcome == MergeOutcome::Merged) {
        if let Err(e) = manager.cleanup(&step.workspace, true, false) {
            warn!(workspace = %step.workspace, error = %e, "Cleanup of merged workspace failed");
        }
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
