//! Execution workers: the external processes that do a domain's work inside
//! its workspace.
//!
//! The orchestrator only sees the [`ExecutionWorker`] trait. [`CommandWorker`]
//! is the process-backed implementation; [`dispatch_all`] fans a batch of
//! requests out concurrently and waits for every one to report.

mod command;
mod dispatch;

pub use command::{CommandWorker, WorkerCommandConfig, DEFAULT_WORKER_TIMEOUT};
pub use dispatch::dispatch_all;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerOutcome {
    Success,
    Partial,
    Failed,
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        })
    }
}

/// Everything a worker needs to run one domain task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerRequest {
    pub unit_id: String,
    pub domain: String,
    pub workspace_name: String,
    pub workspace_path: PathBuf,
    pub task_description: String,
    pub files: Vec<String>,
    /// Where the worker is asked to write its result JSON.
    pub result_path: PathBuf,
}

/// Report returned by a worker when it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub outcome: WorkerOutcome,
    #[serde(default)]
    pub files_created: Vec<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub clarifications: Vec<String>,
    #[serde(default = "Utc::now")]
    pub completed_at: DateTime<Utc>,
}

impl WorkerResult {
    /// A `failed` result carrying `issue` as its only issue.
    pub fn failed(issue: impl Into<String>) -> Self {
        Self {
            outcome: WorkerOutcome::Failed,
            files_created: Vec::new(),
            files_modified: Vec::new(),
            issues: vec![issue.into()],
            clarifications: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == WorkerOutcome::Success
    }
}

#[async_trait]
pub trait ExecutionWorker: Send + Sync {
    /// Runs the request to completion. Failures are reported in the result,
    /// never as a panic or an error.
    async fn execute(&self, request: WorkerRequest) -> WorkerResult;
}
