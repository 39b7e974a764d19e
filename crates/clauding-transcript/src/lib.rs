//! Reconstructs conversation events from raw agent terminal captures.

pub mod ansi;
pub mod parse;
pub mod render;

pub use ansi::*;
pub use parse::*;
pub use render::*;
