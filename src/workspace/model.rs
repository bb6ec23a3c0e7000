use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle of a workspace.
///
/// `created -> assigned -> in_progress -> completed|failed -> merged|conflict -> cleaned`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    Created,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Merged,
    Conflict,
    Cleaned,
}

impl WorkspaceStatus {
    /// Statuses that may be cleaned up without `force`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Merged)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Merged => "merged",
            Self::Conflict => "conflict",
            Self::Cleaned => "cleaned",
        }
    }
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkspaceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created" => Self::Created,
            "assigned" => Self::Assigned,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "merged" => Self::Merged,
            "conflict" => Self::Conflict,
            "cleaned" => Self::Cleaned,
            other => return Err(format!("unknown workspace status: {other}")),
        })
    }
}

/// Persisted metadata for one isolated domain workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    /// `<unit>-<domain>-<8 hex>`
    pub name: String,
    pub unit_id: String,
    pub domain: String,
    #[serde(default)]
    pub task_description: String,
    pub path: PathBuf,
    pub branch: String,
    pub base_branch: String,
    #[serde(default)]
    pub worker_id: Option<String>,
    pub status: WorkspaceStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cleaned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commits: Vec<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Optional fields applied alongside a status change.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub worker_id: Option<String>,
    pub error_message: Option<String>,
    pub commits: Option<Vec<String>>,
}

impl StatusUpdate {
    pub fn worker(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: Some(worker_id.into()),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn commits(commits: Vec<String>) -> Self {
        Self {
            commits: Some(commits),
            ..Self::default()
        }
    }
}

impl Workspace {
    /// Sets the status and stamps the matching timestamp on first entry.
    pub fn transition(&mut self, status: WorkspaceStatus, at: DateTime<Utc>) {
        self.status = status;
        let slot = match status {
            WorkspaceStatus::Created => None,
            WorkspaceStatus::Assigned => Some(&mut self.assigned_at),
            WorkspaceStatus::InProgress => Some(&mut self.started_at),
            WorkspaceStatus::Completed | WorkspaceStatus::Failed => Some(&mut self.completed_at),
            WorkspaceStatus::Merged | WorkspaceStatus::Conflict => Some(&mut self.merged_at),
            WorkspaceStatus::Cleaned => Some(&mut self.cleaned_at),
        };
        if let Some(slot) = slot {
            slot.get_or_insert(at);
        }
    }

    pub fn apply(&mut self, update: StatusUpdate) {
        if let Some(worker_id) = update.worker_id {
            self.worker_id = Some(worker_id);
        }
        if let Some(message) = update.error_message {
            self.error_message = Some(message);
        }
        if let Some(commits) = update.commits {
            self.commits = commits;
        }
    }

    /// Most recent progress timestamp, used to age out abandoned workspaces.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.completed_at
            .or(self.started_at)
            .or(self.assigned_at)
            .unwrap_or(self.created_at)
    }
}
