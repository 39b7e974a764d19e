//! Clauding execution daemon: runs agent commands for feature worktrees.

pub mod commands;
pub mod env_inject;
pub mod hook;
pub mod orchestrator;
pub mod prompt_builder;
pub mod state_machine;
pub mod variables;

pub use commands::*;
pub use env_inject::*;
pub use hook::*;
pub use orchestrator::*;
pub use prompt_builder::*;
pub use state_machine::*;
pub use variables::*;
