//! Sequential integration of domain branches into the target branch.

use crate::error::WorkspaceResult;
use crate::git;
use crate::worker::WorkerOutcome;
use crate::workspace::{StatusUpdate, Workspace, WorkspaceManager, WorkspaceStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    Merged,
    Conflict,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Success,
    Partial,
    Blocked,
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Blocked => "blocked",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeStep {
    pub domain: String,
    pub workspace: String,
    pub branch: String,
    pub outcome: MergeOutcome,
    #[serde(default)]
    pub conflict_files: Vec<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub unit_id: String,
    pub target_branch: String,
    pub status: MergeStatus,
    pub steps: Vec<MergeStep>,
    /// Domains whose worker did not report success.
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    pub reason: String,
}

impl MergeSummary {
    pub fn merged_domains(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter(|s| s.outcome == MergeOutcome::Merged)
            .map(|s| s.domain.as_str())
    }
}

/// A finished workspace and its worker's outcome.
#[derive(Debug, Clone)]
pub struct WorkspaceRun {
    pub workspace: Workspace,
    pub outcome: WorkerOutcome,
}

/// Merges workspace branches into a target branch, one domain at a time, in
/// a fixed priority order. Conflicts are detected and surfaced, never resolved.
#[derive(Debug, Clone)]
pub struct MergeCoordinator {
    manager: WorkspaceManager,
    merge_order: Vec<String>,
}

impl MergeCoordinator {
    pub fn new(manager: WorkspaceManager, merge_order: Vec<String>) -> Self {
        Self {
            manager,
            merge_order,
        }
    }

    /// Rank of a domain in the merge order; unlisted domains sort after, by name.
    fn rank<'a>(&self, domain: &'a str) -> (usize, &'a str) {
        let position = self
            .merge_order
            .iter()
            .position(|d| d == domain)
            .unwrap_or(self.merge_order.len());
        (position, domain)
    }

    pub fn merge(
        &self,
        unit_id: &str,
        target_branch: &str,
        runs: &[WorkspaceRun],
    ) -> WorkspaceResult<MergeSummary> {
        let mut ordered: Vec<&WorkspaceRun> = runs.iter().collect();
        ordered.sort_by(|a, b| self.rank(&a.workspace.domain).cmp(&self.rank(&b.workspace.domain)));

        let blocked_domains: Vec<String> = ordered
            .iter()
            .filter(|r| r.outcome != WorkerOutcome::Success)
            .map(|r| r.workspace.domain.clone())
            .collect();
        if !blocked_domains.is_empty() {
            let detail: Vec<String> = ordered
                .iter()
                .filter(|r| r.outcome != WorkerOutcome::Success)
                .map(|r| format!("{} ({})", r.workspace.domain, r.outcome))
                .collect();
            let reason = format!("Workers did not succeed: {}", detail.join(", "));
            warn!(unit = %unit_id, blocked = ?blocked_domains, "Merge blocked");
            return Ok(MergeSummary {
                unit_id: unit_id.to_string(),
                target_branch: target_branch.to_string(),
                status: MergeStatus::Blocked,
                steps: Vec::new(),
                blocked_domains,
                reason,
            });
        }
        if ordered.is_empty() {
            return Ok(MergeSummary {
                unit_id: unit_id.to_string(),
                target_branch: target_branch.to_string(),
                status: MergeStatus::Blocked,
                steps: Vec::new(),
                blocked_domains: Vec::new(),
                reason: "No workspaces to merge".to_string(),
            });
        }

        let mut steps: Vec<MergeStep> = Vec::with_capacity(ordered.len());
        let mut stopped: Option<String> = None;
        for run in &ordered {
            let ws = &run.workspace;
            if stopped.is_some() {
                steps.push(step(ws, MergeOutcome::Skipped, Vec::new(), "Skipped after earlier failure"));
                continue;
            }
            let merge_step = self.merge_one(unit_id, target_branch, ws)?;
            if merge_step.outcome != MergeOutcome::Merged {
                stopped = Some(format!("{} on {}: {}", outcome_label(merge_step.outcome), ws.domain, merge_step.message));
            }
            steps.push(merge_step);
        }

        let merged = steps.iter().filter(|s| s.outcome == MergeOutcome::Merged).count();
        let (status, reason) = match stopped {
            None => (
                MergeStatus::Success,
                format!("Merged {} domain(s) into {}", merged, target_branch),
            ),
            Some(cause) if merged > 0 => (
                MergeStatus::Partial,
                format!("Merged {} of {} domain(s); {}", merged, steps.len(), cause),
            ),
            Some(cause) => (MergeStatus::Blocked, format!("Nothing merged; {}", cause)),
        };
        info!(unit = %unit_id, target = %target_branch, status = %status, merged, "Merge finished");
        Ok(MergeSummary {
            unit_id: unit_id.to_string(),
            target_branch: target_branch.to_string(),
            status,
            steps,
            blocked_domains: Vec::new(),
            reason,
        })
    }

    fn merge_one(&self, unit_id: &str, target_branch: &str, ws: &Workspace) -> WorkspaceResult<MergeStep> {
        let repo = self.manager.repo_root();
        if let Err(e) = git::checkout(repo, target_branch) {
            error!(branch = %target_branch, error = %e, "Checkout of merge target failed");
            return Ok(step(ws, MergeOutcome::Failed, Vec::new(), &e.to_string()));
        }

        let message = format!("Merge {} work for {} ({})", ws.domain, unit_id, ws.name);
        let output = git::merge_no_ff(repo, &ws.branch, &message)?;
        if output.success {
            self.manager
                .update_status(&ws.name, WorkspaceStatus::Merged, StatusUpdate::default())?;
            info!(workspace = %ws.name, branch = %ws.branch, "Merged workspace branch");
            return Ok(step(ws, MergeOutcome::Merged, Vec::new(), &message));
        }

        let conflicts = git::conflicted_files(repo).unwrap_or_default();
        if let Err(e) = git::abort_merge(repo) {
            error!(workspace = %ws.name, error = %e, "git merge --abort failed");
        }
        if conflicts.is_empty() {
            warn!(workspace = %ws.name, error = %output.message(), "Merge failed without conflicts");
            return Ok(step(ws, MergeOutcome::Failed, Vec::new(), &output.message()));
        }

        let detail = format!("Conflict in {}", conflicts.join(", "));
        self.manager
            .update_status(&ws.name, WorkspaceStatus::Conflict, StatusUpdate::error(detail.clone()))?;
        warn!(workspace = %ws.name, files = ?conflicts, "Merge conflict");
        Ok(step(ws, MergeOutcome::Conflict, conflicts, &detail))
    }
}

fn outcome_label(outcome: MergeOutcome) -> &'static str {
    match outcome {
        MergeOutcome::Merged => "merged",
        MergeOutcome::Conflict => "conflict",
        MergeOutcome::Failed => "merge failed",
        MergeOutcome::Skipped => "skipped",
    }
}

fn step(ws: &Workspace, outcome: MergeOutcome, conflict_files: Vec<String>, message: &str) -> MergeStep {
    MergeStep {
        domain: ws.domain.clone(),
        workspace: ws.name.clone(),
        branch: ws.branch.clone(),
        outcome,
        conflict_files,
        message: message.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/merge_tests.rs"]
mod tests;
