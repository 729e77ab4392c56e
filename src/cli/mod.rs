//! Command-line surface.

pub mod appraise;
pub mod args;

pub use args::{AppraiseArgs, Cli, Commands, OutputFormat};
