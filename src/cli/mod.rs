pub mod analyze;
pub mod commands;
pub mod progress;
pub mod validate;

pub use commands::{Cli, Commands};
