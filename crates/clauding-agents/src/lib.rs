pub mod adapter;
pub mod error;
pub mod pty;
pub mod stability;
pub mod status_store;
pub mod terminal;
pub mod types;
mod util;

pub use adapter::*;
pub use error::*;
pub use pty::*;
pub use stability::*;
pub use status_store::*;
pub use terminal::*;
pub use types::*;
pub use util::shell_quote;
