//! Typed error taxonomy for the library stores and the run boundary.

use thiserror::Error;

/// Result type for workspace operations.
pub type WorkspaceResult<T> = std::result::Result<T, WorkspaceError>;

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Workspace lifecycle errors.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// Base branch missing, branch name collision, or `git worktree add` failure.
    #[error("Workspace creation failed for {unit_id}/{domain}: {reason}")]
    Creation {
        unit_id: String,
        domain: String,
        reason: String,
    },

    /// Cleanup requested on a workspace that has not reached a terminal status.
    #[error("Workspace '{name}' is not terminal (status: {status}); use force to clean up")]
    NotTerminal { name: String, status: String },

    #[error("Workspace not found: {0}")]
    NotFound(String),

    #[error("Git command failed: {0}")]
    Git(String),

    #[error("Workspace store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workspace metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Registry integrity and persistence errors.
///
/// Integrity errors are raised before any mutation, so the registry is left
/// unchanged when one is returned.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Duplicate unit ID: {0}")]
    DuplicateId(String),

    #[error("Out-of-sequence unit number: expected {expected}, got {actual}")]
    OutOfSequence { expected: u32, actual: u32 },

    #[error("Unit {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Status regression for {unit_id}: {from} -> {to}")]
    StatusRegression {
        unit_id: String,
        from: String,
        to: String,
    },

    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid requirement pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors that stop an orchestrated run before it can produce a report.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Another run is in progress for this repository (lock held by {holder})")]
    RunInProgress { holder: String },

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Unit {unit_id} is not ready (status: {status})")]
    UnitNotReady { unit_id: String, status: String },

    #[error("No unit selected: {0}")]
    NothingSelected(String),

    #[error("Workspace provisioning failed: {0}")]
    Provisioning(#[source] WorkspaceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_joins_path() {
        let err = RegistryError::DependencyCycle(vec![
            "UNIT-001".into(),
            "UNIT-002".into(),
            "UNIT-001".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Dependency cycle detected: UNIT-001 -> UNIT-002 -> UNIT-001"
        );
    }

    #[test]
    fn not_terminal_names_status() {
        let err = WorkspaceError::NotTerminal {
            name: "UNIT-001-backend-1234abcd".into(),
            status: "in_progress".into(),
        };
        assert!(err.to_string().contains("in_progress"));
    }
}
