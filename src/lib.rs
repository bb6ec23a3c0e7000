//! Orchestrates parallel implementation of planned work units.
//!
//! A unit's planned file set is classified into domains. When the split is
//! worthwhile each domain gets its own git worktree and worker, and the
//! resulting branches are merged back in dependency order before the merged
//! tree is validated.

pub mod analysis;
pub mod app;
pub mod config;
pub mod error;
pub mod fs_util;
pub mod git;
pub mod merge;
pub mod orchestrator;
pub mod paths;
pub mod registry;
pub mod structured_logger;
pub mod validation;
pub mod worker;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;
