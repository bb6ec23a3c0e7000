//! Isolated git worktrees, one per domain of a unit's run.

pub mod manager;
pub mod model;
pub mod store;

pub use manager::{WorkspaceManager, WorkspaceRequest};
pub use model::{StatusUpdate, Workspace, WorkspaceStatus};
pub use store::WorkspaceStore;
