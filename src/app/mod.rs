//! Command-line surface: argument definitions and handlers.

pub mod cli;
mod commands;

pub use cli::Cli;
pub use commands::{
    execute, EXIT_NOTHING_SELECTED, EXIT_NOT_VIABLE, EXIT_RUN_FAILED, EXIT_SUCCESS,
};
