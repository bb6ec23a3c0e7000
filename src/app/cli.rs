use crate::registry::UnitStatus;
use crate::workspace::WorkspaceStatus;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "unitflow")]
#[command(about = "Parallel work-unit orchestration over git worktrees")]
#[command(version)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Repository to operate on (defaults to the current directory)
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Configuration file (defaults to <repo>/unitflow.yaml, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decide whether a file set can be split into parallel domain tasks
    Analyze(AnalyzeArgs),

    /// Manage the work unit registry
    #[command(subcommand)]
    Registry(RegistryCommand),

    /// Inspect and clean up domain workspaces
    #[command(subcommand)]
    Workspace(WorkspaceCommand),

    /// Execute a ready unit end to end
    Run {
        /// Unit to run; the highest-priority unblocked ready unit when omitted
        unit_id: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Markdown task plan listing the files to create or modify
    #[arg(required_unless_present = "files", conflicts_with = "files")]
    pub file_tasks: Option<PathBuf>,

    /// Comma-separated file list instead of a task plan
    #[arg(long, value_delimiter = ',')]
    pub files: Option<Vec<String>>,

    /// Unit description used to prefix domain task descriptions
    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub min_files: Option<usize>,

    #[arg(long)]
    pub min_domains: Option<usize>,

    /// Overlap percentage at or above which the plan is not viable
    #[arg(long)]
    pub max_overlap: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// Create an empty registry
    Init {
        project: String,

        /// Master spec listing REQ- requirements (defaults to .tasks/master_spec.md)
        #[arg(long)]
        master_spec: Option<PathBuf>,
    },

    /// Define a new unit with the next sequential ID
    Add {
        title: String,

        #[arg(long)]
        slug: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Tag, repeatable; critical, high, medium or low sets priority
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long = "blocked-by")]
        blocked_by: Vec<String>,

        #[arg(long = "integrates-with")]
        integrates_with: Vec<String>,
    },

    /// Move a unit forward in its lifecycle
    Status { unit_id: String, status: UnitStatus },

    Show { unit_id: String },

    /// Link a unit to its tracker issue
    Tracker {
        unit_id: String,
        issue: u64,
        url: String,
    },

    List {
        #[arg(long)]
        status: Option<UnitStatus>,
    },

    /// Print unit IDs with every blocker before the units it blocks
    Order,

    /// Print the unit the next run would select
    Next,

    /// Measure master spec requirements referenced by unit specs
    Coverage,
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// Active workspaces, newest first
    List {
        #[arg(long)]
        unit: Option<String>,

        #[arg(long)]
        status: Option<WorkspaceStatus>,
    },

    /// Remove one workspace and archive its record
    Cleanup {
        name: String,

        #[arg(long)]
        delete_branch: bool,

        /// Clean up even when the workspace is not in a terminal status
        #[arg(long)]
        force: bool,
    },

    /// Clean every terminal workspace of a unit
    CleanupUnit {
        unit_id: String,

        #[arg(long)]
        delete_branches: bool,
    },

    /// Force-clean workspaces idle before completion
    Sweep {
        /// Defaults to workspace.abandoned_after_days
        #[arg(long)]
        max_age_days: Option<u32>,
    },

    /// Cleaned workspace records
    Archived {
        #[arg(long)]
        unit: Option<String>,
    },
}
