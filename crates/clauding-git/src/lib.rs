//! Minimal `git` plumbing needed by the execution core.

pub mod command;
pub mod error;
pub mod repo;

pub use command::*;
pub use error::*;
pub use repo::*;
