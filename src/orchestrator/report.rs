use crate::analysis::ParallelPlan;
use crate::fs_util::write_json_atomic;
use crate::merge::MergeSummary;
use crate::registry::ExecutionMode;
use crate::validation::ValidationReport;
use crate::worker::WorkerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Directory under the workspace root holding run reports.
pub const RUNS_DIR: &str = ".runs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    ValidationFailed,
    MergeFailed,
    WorkersFailed,
    ProvisioningFailed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::ValidationFailed => "validation_failed",
            Self::MergeFailed => "merge_failed",
            Self::WorkersFailed => "workers_failed",
            Self::ProvisioningFailed => "provisioning_failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record of one orchestrated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub unit_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub execution_mode: ExecutionMode,
    pub plan: ParallelPlan,
    /// Workspace names provisioned for the run.
    #[serde(default)]
    pub workspaces: Vec<String>,
    /// Worker results keyed by domain.
    #[serde(default)]
    pub worker_results: BTreeMap<String, WorkerResult>,
    #[serde(default)]
    pub merge: Option<MergeSummary>,
    #[serde(default)]
    pub validation: Option<ValidationReport>,
    pub status: RunStatus,
    pub reason: String,
}

impl RunReport {
    /// Writes the report to `<workspace_root>/.runs/<unit>-<timestamp>.json`.
    pub fn save(&self, workspace_root: &Path) -> anyhow::Result<PathBuf> {
        let path = workspace_root.join(RUNS_DIR).join(format!(
            "{}-{}.json",
            self.unit_id,
            self.finished_at.format("%Y%m%d-%H%M%S")
        ));
        write_json_atomic::<_, anyhow::Error>(&path, self)?;
        Ok(path)
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}
