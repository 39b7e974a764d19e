pub mod config;
pub mod state;
pub mod status;
pub mod types;
pub mod validation;

pub use config::*;
pub use state::*;
pub use status::*;
pub use types::*;
pub use validation::*;
